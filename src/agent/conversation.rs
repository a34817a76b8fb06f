//! Conversation log — the ordered message history for one session.
//!
//! Responsibilities:
//! - Own the append-only sequence of system/user/assistant/tool turns
//! - Inject the dataset system prompt exactly once, on first use
//! - Hand the executor a wire-ready snapshot of the history
//!
//! The log belongs to a single `AgentSession`; two sessions in one process
//! never share history.

use chrono::{DateTime, Utc};

use crate::dataset::TicketTable;
use crate::inference::types::{ChatMessage, Role};

/// The exact reply required for questions unrelated to the dataset.
pub const OUT_OF_SCOPE_REPLY: &str = "this question is out of scope";

/// A logged turn with its arrival time.
#[derive(Debug, Clone)]
pub struct LogEntry {
    pub message: ChatMessage,
    pub recorded_at: DateTime<Utc>,
}

/// Ordered, append-only message history.
///
/// Structural invariant: every `tool`-role entry answers exactly one tool
/// call emitted by the immediately preceding assistant turn. The executor
/// is the only writer of tool turns and maintains this by construction.
#[derive(Debug, Default)]
pub struct ConversationLog {
    entries: Vec<LogEntry>,
}

impl ConversationLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether the one-time system turn has been injected.
    pub fn is_initialized(&self) -> bool {
        !self.entries.is_empty()
    }

    /// Inject the system turn describing the dataset and the usage rules.
    /// Subsequent calls are no-ops.
    pub fn ensure_initialized(&mut self, table: &TicketTable) {
        if self.is_initialized() {
            return;
        }

        let prompt = build_system_prompt(table);
        self.push(ChatMessage::text(Role::System, prompt));
        tracing::debug!("conversation initialized with dataset system prompt");
    }

    pub fn push_user(&mut self, content: &str) {
        self.push(ChatMessage::text(Role::User, content));
    }

    /// Append an assistant turn as returned by the model — including turns
    /// that carry tool calls.
    pub fn push_assistant(&mut self, message: ChatMessage) {
        self.push(message);
    }

    /// Append a `tool`-role turn answering the given call id.
    pub fn push_tool_result(&mut self, tool_call_id: &str, content: &str) {
        self.push(ChatMessage::tool_result(tool_call_id, content));
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[LogEntry] {
        &self.entries
    }

    /// Wire-ready snapshot of the history for a chat request.
    pub fn messages(&self) -> Vec<ChatMessage> {
        self.entries.iter().map(|e| e.message.clone()).collect()
    }

    fn push(&mut self, message: ChatMessage) {
        self.entries.push(LogEntry {
            message,
            recorded_at: Utc::now(),
        });
    }
}

/// The dataset description and usage rules the model sees exactly once.
fn build_system_prompt(table: &TicketTable) -> String {
    format!(
        "You are a helpful assistant that can answer questions related to a \
         customer support ticket dataset with {rows} entries. Each entry \
         contains the following fields:\n\
         \n\
         - instruction: a user request text\n\
         - category: category of the user request\n\
         - intent: the intent corresponding to the user instruction\n\
         - response: an example expected response from the virtual assistant\n\
         \n\
         INSTRUCTIONS:\n\
         \n\
         1. Use the available tools to answer user questions.\n\
         2. Some tools are dependent on other tools. You must use them in the \
         correct order:\n\
         - select_semantic_category() should be used before count_category()\n\
         - select_semantic_intent() should be used before count_intent()\n\
         3. IMPORTANT: Always call finish() when you have enough data to \
         answer the question.\n\
         4. You can make multiple tool calls in one response.\n\
         5. If you have counted several categories/intents and can determine \
         the biggest one, call finish() immediately.\n\
         6. If the user's question is not related to the dataset, respond \
         exactly with:\n\
         \"{out_of_scope}\"\n\
         (and do not call any tools).",
        rows = table.len(),
        out_of_scope = OUT_OF_SCOPE_REPLY,
    )
}

// ─── Tests ──────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::TicketRecord;

    fn table() -> TicketTable {
        TicketTable::new(vec![TicketRecord {
            category: "ORDER".into(),
            intent: "cancel_order".into(),
            instruction: "cancel".into(),
            response: "ok".into(),
        }])
    }

    #[test]
    fn test_initialization_happens_once() {
        let table = table();
        let mut log = ConversationLog::new();

        assert!(!log.is_initialized());
        log.ensure_initialized(&table);
        assert_eq!(log.len(), 1);
        assert_eq!(log.entries()[0].message.role, Role::System);

        log.ensure_initialized(&table);
        assert_eq!(log.len(), 1, "second init must not duplicate the system turn");
    }

    #[test]
    fn test_system_prompt_carries_rules() {
        let table = table();
        let mut log = ConversationLog::new();
        log.ensure_initialized(&table);

        let prompt = log.entries()[0].message.content.as_deref().unwrap();
        assert!(prompt.contains("select_semantic_intent"));
        assert!(prompt.contains("finish()"));
        assert!(prompt.contains(OUT_OF_SCOPE_REPLY));
    }

    #[test]
    fn test_appends_preserve_order() {
        let table = table();
        let mut log = ConversationLog::new();
        log.ensure_initialized(&table);

        log.push_user("how many cancellations?");
        log.push_assistant(ChatMessage::text(Role::Assistant, "checking"));
        log.push_tool_result("call_1", "42");

        let messages = log.messages();
        assert_eq!(messages.len(), 4);
        assert_eq!(messages[1].role, Role::User);
        assert_eq!(messages[2].role, Role::Assistant);
        assert_eq!(messages[3].role, Role::Tool);
        assert_eq!(messages[3].tool_call_id.as_deref(), Some("call_1"));
    }

    #[test]
    fn test_entries_are_timestamped() {
        let table = table();
        let mut log = ConversationLog::new();
        log.ensure_initialized(&table);
        assert!(log.entries()[0].recorded_at <= Utc::now());
    }
}
