//! Planner — the tool-free planning turn for plan-then-execute mode.
//!
//! Asks the model for an ordered, concrete list of the tool calls it
//! intends to make, without letting any tool run: the full registry is
//! advertised for reference, but `tool_choice: none` forbids structured
//! calls at the protocol level. The caller appends the returned message
//! to the conversation — this function does not mutate the log.

use crate::inference::backend::{ChatBackend, TokenSink};
use crate::inference::types::{ChatMessage, ChatRequest, Role};
use crate::tools::ToolRegistry;

use super::errors::AgentError;

/// Instruction appended as a system turn for the planning request.
const PLANNING_INSTRUCTION: &str =
    "First, produce a concise ordered plan of the exact tool calls you will \
     make (and their arguments) to satisfy the user's request. Do NOT execute \
     any tool. Output the plan in plain text.";

/// Produce the plan turn.
///
/// Returns the assistant message to append to the history and its plain
/// text content. With `stream` set, partial text is forwarded to `sink`
/// as it arrives; the terminal content is identical either way.
pub async fn plan(
    backend: &dyn ChatBackend,
    history: Vec<ChatMessage>,
    registry: &ToolRegistry,
    stream: bool,
    sink: &dyn TokenSink,
) -> Result<(ChatMessage, String), AgentError> {
    let mut messages = history;
    messages.push(ChatMessage::text(Role::System, PLANNING_INSTRUCTION));

    let request = ChatRequest::plan_only(messages, registry.definitions());

    let turn = if stream {
        backend.complete_streaming(request, sink).await?
    } else {
        backend.complete(request).await?
    };

    let content = turn.content.clone().unwrap_or_default();
    tracing::info!(plan_len = content.len(), "planning turn produced");

    Ok((turn.to_message(), content))
}

// ─── Tests ──────────────────────────────────────────────────────────────────
