//! The model seam: a trait the orchestration layer talks to instead of a
//! concrete HTTP client.
//!
//! `InferenceClient` is the production implementation; tests drive the
//! executor with a scripted implementation. Incremental delivery goes
//! through `TokenSink` so the "produce final text" contract stays
//! independent of the "report partial progress" contract.

use async_trait::async_trait;

use super::errors::InferenceError;
use super::types::{
    ChatMessage, ChatRequest, FunctionCallResponse, Role, ToolCall, ToolCallResponse,
};

/// A parsed assistant turn: either text, tool calls, or both.
#[derive(Debug, Clone)]
pub struct AssistantTurn {
    pub content: Option<String>,
    pub tool_calls: Vec<ToolCall>,
}

impl AssistantTurn {
    pub fn has_tool_calls(&self) -> bool {
        !self.tool_calls.is_empty()
    }

    /// Convert back into the wire message appended to the history.
    pub fn to_message(&self) -> ChatMessage {
        let tool_calls = if self.tool_calls.is_empty() {
            None
        } else {
            Some(
                self.tool_calls
                    .iter()
                    .map(|tc| ToolCallResponse {
                        id: tc.id.clone(),
                        r#type: "function".to_string(),
                        function: FunctionCallResponse {
                            name: tc.name.clone(),
                            arguments: serde_json::to_string(&tc.arguments)
                                .unwrap_or_default(),
                        },
                    })
                    .collect(),
            )
        };

        ChatMessage {
            role: Role::Assistant,
            content: self.content.clone(),
            tool_call_id: None,
            tool_calls,
        }
    }
}

/// Receives incremental text during streaming delivery.
pub trait TokenSink: Send + Sync {
    fn emit(&self, token: &str);
}

/// Sink that discards everything — used when the caller asked for
/// non-streaming delivery.
pub struct NullSink;

impl TokenSink for NullSink {
    fn emit(&self, _token: &str) {}
}

/// A chat model the Planner and Executor can submit turns to.
#[async_trait]
pub trait ChatBackend: Send + Sync {
    /// Submit a request and wait for the complete assistant turn.
    async fn complete(&self, request: ChatRequest) -> Result<AssistantTurn, InferenceError>;

    /// Submit a request, forwarding text tokens to `sink` as they arrive.
    ///
    /// The returned turn carries the same terminal content the sink saw —
    /// delivery mode must never change the final text.
    async fn complete_streaming(
        &self,
        request: ChatRequest,
        sink: &dyn TokenSink,
    ) -> Result<AssistantTurn, InferenceError>;
}

// ─── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_to_message_text_only() {
        let turn = AssistantTurn {
            content: Some("hello".to_string()),
            tool_calls: Vec::new(),
        };
        let msg = turn.to_message();
        assert_eq!(msg.role, Role::Assistant);
        assert_eq!(msg.content.as_deref(), Some("hello"));
        assert!(msg.tool_calls.is_none());
    }

    #[test]
    fn test_to_message_round_trips_arguments() {
        let turn = AssistantTurn {
            content: None,
            tool_calls: vec![ToolCall {
                id: "call_1".to_string(),
                name: "count_intent".to_string(),
                arguments: serde_json::json!({"intent_name": "cancel_order"}),
            }],
        };
        let msg = turn.to_message();
        let calls = msg.tool_calls.unwrap();
        assert_eq!(calls[0].function.name, "count_intent");

        let parsed: serde_json::Value =
            serde_json::from_str(&calls[0].function.arguments).unwrap();
        assert_eq!(parsed["intent_name"], "cancel_order");
    }
}
