//! AgentSession — the per-session context object and orchestration entry
//! point.
//!
//! One session owns one conversation log, one result cache, one tool
//! registry, and one RNG. Nothing is process-global: two sessions in the
//! same process are fully isolated, and `&mut self` on `run` serializes
//! access within a session.

use std::str::FromStr;
use std::sync::Arc;

use rand::rngs::StdRng;
use rand::SeedableRng;

use crate::dataset::TicketTable;
use crate::inference::backend::{ChatBackend, NullSink, TokenSink};
use crate::inference::{InferenceClient, ModelConfig};
use crate::tools::{ResultCache, ToolRegistry};

use super::conversation::ConversationLog;
use super::errors::AgentError;
use super::executor::Executor;
use super::planner;

/// Injected after the plan turn to switch the model into execution.
const EXECUTE_PLAN_DIRECTIVE: &str = "Please execute the plan step-by-step.";

// ─── Mode ───────────────────────────────────────────────────────────────────

/// Reasoning mode for one entry-point invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// Direct tool use: the loop starts tool-enabled immediately.
    React,
    /// Plan-then-execute: one tool-free planning turn first.
    Planning,
}

impl FromStr for Mode {
    type Err = AgentError;

    /// Case-insensitive; accepts the UI's `reAct` spelling.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "react" => Ok(Mode::React),
            "planning" => Ok(Mode::Planning),
            _ => Err(AgentError::InvalidMode {
                given: s.to_string(),
            }),
        }
    }
}

// ─── AgentSession ───────────────────────────────────────────────────────────

/// One logical conversation: history, cache, catalog, and model handle.
pub struct AgentSession<B: ChatBackend> {
    backend: B,
    table: Arc<TicketTable>,
    registry: ToolRegistry,
    conversation: ConversationLog,
    cache: ResultCache,
    rng: StdRng,
}

impl AgentSession<InferenceClient> {
    /// Build a session against the configured hosted model.
    pub fn new(config: ModelConfig, table: Arc<TicketTable>) -> Result<Self, AgentError> {
        let backend = InferenceClient::new(config).map_err(AgentError::Inference)?;
        Ok(Self::with_backend(backend, table))
    }
}

impl<B: ChatBackend> AgentSession<B> {
    /// Build a session over any backend (tests use a scripted one).
    pub fn with_backend(backend: B, table: Arc<TicketTable>) -> Self {
        let registry = ToolRegistry::new(&table);
        Self {
            backend,
            table,
            registry,
            conversation: ConversationLog::new(),
            cache: ResultCache::new(),
            rng: StdRng::from_entropy(),
        }
    }

    /// Same, with a fixed RNG seed for reproducible sampling.
    pub fn with_backend_seeded(backend: B, table: Arc<TicketTable>, seed: u64) -> Self {
        let mut session = Self::with_backend(backend, table);
        session.rng = StdRng::seed_from_u64(seed);
        session
    }

    /// Answer one user utterance. See [`run_with_sink`](Self::run_with_sink).
    pub async fn run(
        &mut self,
        user_input: &str,
        mode: &str,
        stream: bool,
    ) -> Result<String, AgentError> {
        self.run_with_sink(user_input, mode, stream, &NullSink).await
    }

    /// Answer one user utterance, forwarding incremental text to `sink`.
    ///
    /// `mode` is `"react"` or `"planning"` (case-insensitive); anything
    /// else fails before a model call is made. `stream` only affects how
    /// text is delivered during planning and final-answer synthesis — it
    /// never changes which tools run or the returned text.
    pub async fn run_with_sink(
        &mut self,
        user_input: &str,
        mode: &str,
        stream: bool,
        sink: &dyn TokenSink,
    ) -> Result<String, AgentError> {
        let mode = Mode::from_str(mode)?;

        self.conversation.ensure_initialized(&self.table);
        self.conversation.push_user(user_input);

        tracing::info!(
            ?mode,
            stream,
            history_len = self.conversation.len(),
            "processing user input"
        );

        if mode == Mode::Planning {
            let (plan_message, plan_text) = planner::plan(
                &self.backend,
                self.conversation.messages(),
                &self.registry,
                stream,
                sink,
            )
            .await?;

            self.conversation.push_assistant(plan_message);
            self.conversation.push_user(EXECUTE_PLAN_DIRECTIVE);

            tracing::debug!(plan = %plan_text, "executing plan");
        }

        let mut executor = Executor {
            backend: &self.backend,
            registry: &self.registry,
            table: &*self.table,
            conversation: &mut self.conversation,
            cache: &mut self.cache,
            rng: &mut self.rng,
        };
        executor.run_tool_loop(stream, sink).await
    }

    /// The session's conversation history (read-only).
    pub fn conversation(&self) -> &ConversationLog {
        &self.conversation
    }

    /// The dataset this session answers questions about.
    pub fn table(&self) -> &TicketTable {
        &self.table
    }
}

// ─── Tests ──────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::conversation::OUT_OF_SCOPE_REPLY;
    use crate::agent::testkit::{CollectingSink, ScriptedBackend};
    use crate::dataset::TicketRecord;
    use crate::inference::backend::AssistantTurn;
    use crate::inference::types::{Role, ToolCall, ToolChoice};
    use serde_json::json;

    fn record(category: &str, intent: &str) -> TicketRecord {
        TicketRecord {
            category: category.to_string(),
            intent: intent.to_string(),
            instruction: format!("help with {intent}"),
            response: "ok".to_string(),
        }
    }

    fn table() -> Arc<TicketTable> {
        Arc::new(TicketTable::new(vec![
            record("ORDER", "cancel_order"),
            record("ORDER", "cancel_order"),
            record("ORDER", "place_order"),
            record("REFUND", "get_refund"),
        ]))
    }

    fn text_turn(content: &str) -> AssistantTurn {
        AssistantTurn {
            content: Some(content.to_string()),
            tool_calls: Vec::new(),
        }
    }

    fn call_turn(calls: Vec<(&str, &str, serde_json::Value)>) -> AssistantTurn {
        AssistantTurn {
            content: None,
            tool_calls: calls
                .into_iter()
                .map(|(id, name, arguments)| ToolCall {
                    id: id.to_string(),
                    name: name.to_string(),
                    arguments,
                })
                .collect(),
        }
    }

    #[tokio::test]
    async fn test_invalid_mode_fails_before_any_model_call() {
        let backend = ScriptedBackend::new(vec![text_turn("never used")]);
        let mut session = AgentSession::with_backend(backend, table());

        let err = session.run("hello", "turbo", false).await.unwrap_err();
        assert!(matches!(err, AgentError::InvalidMode { .. }));
        // No request reached the model, and nothing was appended.
        // (The mode check runs before initialization.)
        assert_eq!(session.backend.request_count(), 0);
        assert_eq!(session.conversation().len(), 0);
    }

    #[test]
    fn test_mode_parsing_is_case_insensitive() {
        assert_eq!(Mode::from_str("reAct").unwrap(), Mode::React);
        assert_eq!(Mode::from_str("REACT").unwrap(), Mode::React);
        assert_eq!(Mode::from_str("Planning").unwrap(), Mode::Planning);
        assert!(Mode::from_str("").is_err());
    }

    #[tokio::test]
    async fn test_system_turn_initialized_exactly_once_across_runs() {
        let backend = ScriptedBackend::new(vec![
            text_turn("first answer"),
            text_turn("second answer"),
        ]);
        let mut session = AgentSession::with_backend(backend, table());

        session.run("what is the most frequent intent", "react", false)
            .await
            .unwrap();
        session.run("and the least frequent?", "react", false)
            .await
            .unwrap();

        let system_turns = session
            .conversation()
            .messages()
            .iter()
            .filter(|m| m.role == Role::System)
            .count();
        assert_eq!(system_turns, 1);
    }

    #[tokio::test]
    async fn test_out_of_scope_literal_with_zero_tool_calls() {
        let backend = ScriptedBackend::new(vec![text_turn(OUT_OF_SCOPE_REPLY)]);
        let mut session = AgentSession::with_backend(backend, table());

        let answer = session
            .run("what's the weather today?", "react", false)
            .await
            .unwrap();

        assert_eq!(answer, "this question is out of scope");
        let tool_turns = session
            .conversation()
            .messages()
            .iter()
            .filter(|m| m.role == Role::Tool)
            .count();
        assert_eq!(tool_turns, 0);
    }

    #[tokio::test]
    async fn test_react_end_to_end_with_selection_and_count() {
        let backend = ScriptedBackend::new(vec![
            call_turn(vec![(
                "c1",
                "select_semantic_intent",
                json!({"intent_names": ["cancel_order"]}),
            )]),
            call_turn(vec![
                ("c2", "count_intent", json!({"intent_name": "cancel_order"})),
                ("c3", "finish", json!({})),
            ]),
            text_turn("cancel_order appears 2 times"),
        ]);
        let mut session = AgentSession::with_backend(backend, table());

        let answer = session
            .run("how often do people cancel?", "react", false)
            .await
            .unwrap();
        assert_eq!(answer, "cancel_order appears 2 times");

        let messages = session.conversation().messages();
        let tool_contents: Vec<&str> = messages
            .iter()
            .filter(|m| m.role == Role::Tool)
            .map(|m| m.content.as_deref().unwrap())
            .collect();
        assert_eq!(tool_contents.len(), 3);
        assert!(tool_contents[0].contains("2 rows"));
        assert_eq!(tool_contents[1], "2");
        assert_eq!(tool_contents[2], "Conversation finished.");

        // Final answer is part of the history.
        let last = messages.last().unwrap();
        assert_eq!(last.role, Role::Assistant);
        assert_eq!(last.content.as_deref(), Some("cancel_order appears 2 times"));
    }

    #[tokio::test]
    async fn test_planning_mode_transcript_shape() {
        let backend = ScriptedBackend::new(vec![
            // Planning turn — text only
            text_turn("1. select cancel_order 2. count it 3. finish"),
            // Execution rounds
            call_turn(vec![("c1", "finish", json!({}))]),
            text_turn("planned and done"),
        ]);
        let mut session = AgentSession::with_backend(backend, table());

        let answer = session
            .run("count cancellations", "planning", false)
            .await
            .unwrap();
        assert_eq!(answer, "planned and done");

        let messages = session.conversation().messages();
        // system, user, assistant(plan), user(directive), assistant(finish),
        // tool, assistant(final)
        assert_eq!(messages.len(), 7);
        assert_eq!(messages[2].role, Role::Assistant);
        assert!(messages[2].tool_calls.is_none(), "plan turn has no tool calls");
        assert_eq!(
            messages[3].content.as_deref(),
            Some("Please execute the plan step-by-step.")
        );

        // The planning request forbade tool calls at the protocol level;
        // the execution round re-enabled them.
        let requests = session.backend.requests();
        assert_eq!(requests[0].tool_choice, Some(ToolChoice::None));
        assert_eq!(requests[1].tool_choice, Some(ToolChoice::Auto));
        assert!(requests[2].tools.is_none(), "final synthesis is toolless");
    }

    #[tokio::test]
    async fn test_streaming_does_not_change_final_text() {
        let script = || {
            ScriptedBackend::new(vec![
                text_turn("the plan"),
                call_turn(vec![("c1", "finish", json!({}))]),
                text_turn("final text"),
            ])
        };

        let mut plain = AgentSession::with_backend(script(), table());
        let plain_answer = plain.run("q", "planning", false).await.unwrap();

        let mut streamed = AgentSession::with_backend(script(), table());
        let sink = CollectingSink::new();
        let streamed_answer = streamed
            .run_with_sink("q", "planning", true, &sink)
            .await
            .unwrap();

        assert_eq!(plain_answer, streamed_answer);
        // The sink saw the plan and the final answer.
        let collected = sink.collected();
        assert!(collected.contains("the plan"));
        assert!(collected.contains("final text"));
    }

    #[tokio::test]
    async fn test_out_of_enum_argument_keeps_conversation_alive() {
        let backend = ScriptedBackend::new(vec![
            call_turn(vec![(
                "c1",
                "select_semantic_intent",
                json!({"intent_names": ["fly_to_moon"]}),
            )]),
            text_turn("let me try something else"),
        ]);
        let mut session = AgentSession::with_backend(backend, table());

        let answer = session.run("question", "react", false).await.unwrap();
        assert_eq!(answer, "let me try something else");

        let messages = session.conversation().messages();
        let tool_msg = messages.iter().find(|m| m.role == Role::Tool).unwrap();
        assert!(tool_msg
            .content
            .as_deref()
            .unwrap()
            .starts_with("Error executing tool select_semantic_intent:"));
    }

    #[tokio::test]
    async fn test_repeated_selection_is_idempotent() {
        let select = |id: &str| {
            call_turn(vec![(
                id,
                "select_semantic_category",
                json!({"category_names": ["ORDER"]}),
            )])
        };
        let backend = ScriptedBackend::new(vec![
            select("c1"),
            select("c2"),
            text_turn("done"),
        ]);
        let mut session = AgentSession::with_backend(backend, table());
        session.run("q", "react", false).await.unwrap();

        let messages = session.conversation().messages();
        let tool_contents: Vec<&str> = messages
            .iter()
            .filter(|m| m.role == Role::Tool)
            .map(|m| m.content.as_deref().unwrap())
            .collect();
        assert_eq!(tool_contents.len(), 2);
        assert_eq!(tool_contents[0], tool_contents[1]);
        assert!(tool_contents[0].contains("3 rows"));
    }

    #[tokio::test]
    async fn test_sessions_are_isolated() {
        let backend_a = ScriptedBackend::new(vec![
            call_turn(vec![(
                "c1",
                "select_semantic_intent",
                json!({"intent_names": ["get_refund"]}),
            )]),
            text_turn("a done"),
        ]);
        let backend_b = ScriptedBackend::new(vec![
            call_turn(vec![(
                "c1",
                "count_intent",
                json!({"intent_name": "cancel_order"}),
            )]),
            text_turn("b done"),
        ]);

        let table = table();
        let mut a = AgentSession::with_backend(backend_a, Arc::clone(&table));
        let mut b = AgentSession::with_backend(backend_b, table);

        a.run("select refunds", "react", false).await.unwrap();
        b.run("count cancels", "react", false).await.unwrap();

        // Session B's count ran against the full table (its own untouched
        // cache), not session A's refund selection.
        let b_messages = b.conversation().messages();
        let count = b_messages
            .iter()
            .find(|m| m.role == Role::Tool)
            .and_then(|m| m.content.as_deref())
            .unwrap();
        assert_eq!(count, "2");
    }

    #[tokio::test]
    async fn test_show_examples_flow_with_seeded_rng() {
        let backend = ScriptedBackend::new(vec![
            call_turn(vec![
                (
                    "c1",
                    "select_semantic_category",
                    json!({"category_names": ["ORDER"]}),
                ),
                ("c2", "show_examples", json!({"n": 2})),
                ("c3", "finish", json!({})),
            ]),
            text_turn("here are two examples"),
        ]);
        let mut session = AgentSession::with_backend_seeded(backend, table(), 42);

        session.run("show me examples", "react", false).await.unwrap();

        let messages = session.conversation().messages();
        let examples = messages
            .iter()
            .filter(|m| m.role == Role::Tool)
            .nth(1)
            .and_then(|m| m.content.as_deref())
            .unwrap();
        let parsed: Vec<serde_json::Value> = serde_json::from_str(examples).unwrap();
        assert_eq!(parsed.len(), 2);
        for example in &parsed {
            assert_eq!(example["category"], "ORDER");
        }
    }
}
