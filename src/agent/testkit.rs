//! Test doubles for the orchestration layer.
//!
//! `ScriptedBackend` replays a fixed sequence of assistant turns and
//! records every request it receives, so tests can assert on both the
//! conversation the model saw and the tool traffic it produced.

use std::sync::Mutex;

use async_trait::async_trait;

use crate::inference::backend::{AssistantTurn, ChatBackend, TokenSink};
use crate::inference::errors::InferenceError;
use crate::inference::types::ChatRequest;

/// A model stand-in that replays scripted turns in order.
pub struct ScriptedBackend {
    turns: Mutex<Vec<AssistantTurn>>,
    requests: Mutex<Vec<ChatRequest>>,
}

impl ScriptedBackend {
    pub fn new(turns: Vec<AssistantTurn>) -> Self {
        let mut reversed = turns;
        reversed.reverse();
        Self {
            turns: Mutex::new(reversed),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Every request submitted so far, in order.
    pub fn requests(&self) -> Vec<ChatRequest> {
        self.requests.lock().unwrap().clone()
    }

    /// Number of requests submitted so far.
    pub fn request_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    fn next_turn(&self, request: ChatRequest) -> Result<AssistantTurn, InferenceError> {
        self.requests.lock().unwrap().push(request);
        self.turns
            .lock()
            .unwrap()
            .pop()
            .ok_or(InferenceError::StreamError {
                reason: "scripted backend exhausted".to_string(),
            })
    }
}

#[async_trait]
impl ChatBackend for ScriptedBackend {
    async fn complete(&self, request: ChatRequest) -> Result<AssistantTurn, InferenceError> {
        self.next_turn(request)
    }

    async fn complete_streaming(
        &self,
        request: ChatRequest,
        sink: &dyn TokenSink,
    ) -> Result<AssistantTurn, InferenceError> {
        let turn = self.next_turn(request)?;
        if let Some(ref content) = turn.content {
            sink.emit(content);
        }
        Ok(turn)
    }
}

/// Sink that appends every token to a shared buffer.
pub struct CollectingSink {
    buffer: Mutex<String>,
}

impl CollectingSink {
    pub fn new() -> Self {
        Self {
            buffer: Mutex::new(String::new()),
        }
    }

    pub fn collected(&self) -> String {
        self.buffer.lock().unwrap().clone()
    }
}

impl TokenSink for CollectingSink {
    fn emit(&self, token: &str) {
        self.buffer.lock().unwrap().push_str(token);
    }
}
