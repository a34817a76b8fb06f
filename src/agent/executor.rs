//! Executor — the tool-calling loop and its state machine.
//!
//! One round: submit the full history to the model, append its turn
//! unconditionally, then either
//! - terminate with the turn's text (no tool calls),
//! - dispatch the tool batch in emission order and go again, or
//! - dispatch the batch and, because it contained `finish`, issue exactly
//!   one more tool-free request whose content becomes the final answer.
//!
//! Per-call failures (unknown tool, bad arguments, handler errors) are
//! folded into the corresponding tool message so the model can observe
//! and recover on its next turn — they never abort the loop.

use rand::rngs::StdRng;

use crate::dataset::TicketTable;
use crate::inference::backend::{ChatBackend, TokenSink};
use crate::inference::types::{ChatMessage, ChatRequest, Role, ToolCall};
use crate::tools::{execute, ResultCache, ToolContext, ToolRegistry};

use super::conversation::ConversationLog;
use super::errors::AgentError;

// ─── Constants ──────────────────────────────────────────────────────────────

/// Maximum tool rounds per user message.
///
/// The model normally terminates by calling `finish` or answering in
/// plain text; this guard keeps a confused model from looping forever.
/// When the cap is hit the loop stops advertising tools and asks for a
/// final synthesis from whatever results were gathered.
const MAX_TOOL_ROUNDS: usize = 10;

/// Maximum characters of a tool result echoed into log previews.
const RESULT_PREVIEW_CHARS: usize = 200;

// ─── Executor ───────────────────────────────────────────────────────────────

/// Borrowed view of one session's state, driving the loop for one user
/// message.
pub struct Executor<'a> {
    pub backend: &'a dyn ChatBackend,
    pub registry: &'a ToolRegistry,
    pub table: &'a TicketTable,
    pub conversation: &'a mut ConversationLog,
    pub cache: &'a mut ResultCache,
    pub rng: &'a mut StdRng,
}

/// What a dispatched batch told the loop to do next.
enum BatchOutcome {
    /// Keep looping — the model needs to see the results.
    Continue,
    /// The batch contained the completion signal; synthesize the answer.
    FinishRequested,
}

impl Executor<'_> {
    /// Run the tool-enabled loop until a terminal state, returning the
    /// final answer text.
    ///
    /// `stream` only affects the delivery of the final synthesis after
    /// `finish` — tool-calling rounds are never streamed.
    pub async fn run_tool_loop(
        &mut self,
        stream: bool,
        sink: &dyn TokenSink,
    ) -> Result<String, AgentError> {
        for round in 1..=MAX_TOOL_ROUNDS {
            let request = ChatRequest::with_tools(
                self.conversation.messages(),
                self.registry.definitions(),
            );
            let turn = self.backend.complete(request).await?;

            tracing::info!(
                round,
                has_tool_calls = turn.has_tool_calls(),
                content_len = turn.content.as_deref().map(str::len).unwrap_or(0),
                "model turn received"
            );

            // The turn goes into the history unconditionally, tool calls
            // and all.
            self.conversation.push_assistant(turn.to_message());

            if !turn.has_tool_calls() {
                return Ok(turn.content.unwrap_or_default());
            }

            match self.dispatch_batch(&turn.tool_calls) {
                BatchOutcome::FinishRequested => {
                    return Ok(self.final_answer(stream, sink).await);
                }
                BatchOutcome::Continue => {}
            }
        }

        tracing::warn!(
            max_rounds = MAX_TOOL_ROUNDS,
            "tool round limit reached without completion signal"
        );
        Ok(self.final_answer(stream, sink).await)
    }

    /// Dispatch every call in the batch, in the order the model emitted
    /// them — later calls may depend on cache state written by earlier
    /// ones in the same batch.
    fn dispatch_batch(&mut self, calls: &[ToolCall]) -> BatchOutcome {
        let mut finish_requested = false;

        for call in calls {
            let content = match self.registry.parse(&call.name, &call.arguments) {
                Ok(invocation) => {
                    if invocation.is_finish() {
                        finish_requested = true;
                    }

                    let mut ctx = ToolContext {
                        table: self.table,
                        cache: &mut *self.cache,
                        rng: &mut *self.rng,
                    };
                    match execute(&invocation, &mut ctx) {
                        Ok(result) => result,
                        Err(e) => format!("Error executing tool {}: {e}", call.name),
                    }
                }
                Err(e) => format!("Error executing tool {}: {e}", call.name),
            };

            tracing::info!(
                tool = %call.name,
                call_id = %call.id,
                result_preview = %truncate_utf8(&content, RESULT_PREVIEW_CHARS),
                "tool dispatched"
            );

            self.conversation.push_tool_result(&call.id, &content);
        }

        if finish_requested {
            BatchOutcome::FinishRequested
        } else {
            BatchOutcome::Continue
        }
    }

    /// The single extra completion after `finish`: tool advertisement is
    /// omitted to bias the model toward a text answer synthesized from
    /// the accumulated tool results. A failure here degrades to a
    /// best-effort message instead of propagating.
    async fn final_answer(&mut self, stream: bool, sink: &dyn TokenSink) -> String {
        let request = ChatRequest::text_only(self.conversation.messages());

        let result = if stream {
            self.backend.complete_streaming(request, sink).await
        } else {
            self.backend.complete(request).await
        };

        match result {
            Ok(turn) => {
                let text = turn.content.clone().unwrap_or_default();
                self.conversation.push_assistant(turn.to_message());
                text
            }
            Err(e) => {
                tracing::warn!(error = %e, "final answer synthesis failed");
                let text =
                    format!("I encountered an error while processing your request: {e}");
                self.conversation
                    .push_assistant(ChatMessage::text(Role::Assistant, text.clone()));
                text
            }
        }
    }
}

/// Truncate to at most `max_bytes`, backing up to a char boundary.
fn truncate_utf8(s: &str, max_bytes: usize) -> &str {
    if s.len() <= max_bytes {
        return s;
    }
    let mut end = max_bytes;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}

// ─── Tests ──────────────────────────────────────────────────────────────────
