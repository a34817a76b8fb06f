//! SSE streaming response parser for OpenAI-compatible chat completions.
//!
//! Reads a `reqwest::Response` as a byte stream, splits on SSE boundaries
//! (`data: …\n\n`), parses each chunk as JSON, and accumulates tool call
//! fragments across multiple deltas until the model signals completion.

use futures::stream::{self, Stream, StreamExt};
use serde::Deserialize;
use uuid::Uuid;

use super::errors::InferenceError;
use super::types::{ChatCompletionChunk, StreamChunk, ToolCall};

// ─── SSE line parser ─────────────────────────────────────────────────────────

/// Parse raw SSE bytes into `StreamChunk`s.
///
/// This is the main entry point for streaming. It:
/// 1. Splits the HTTP body into SSE events
/// 2. Parses each `data:` line as a `ChatCompletionChunk`
/// 3. Accumulates tool call fragments across deltas
/// 4. Emits complete `StreamChunk`s for each event
pub fn parse_sse_stream(
    response: reqwest::Response,
) -> impl Stream<Item = Result<StreamChunk, InferenceError>> {
    let byte_stream = response.bytes_stream();

    // Buffer for incomplete SSE lines across chunk boundaries
    let state = StreamState::new();

    stream::unfold(
        (byte_stream, state, String::new()),
        |(mut byte_stream, mut state, mut buffer)| async move {
            loop {
                // Check if we have a complete SSE event in the buffer
                if let Some(event_end) = buffer.find("\n\n") {
                    let event = buffer[..event_end].to_string();
                    buffer = buffer[event_end + 2..].to_string();

                    match state.process_event(&event) {
                        Ok(Some(chunk)) => return Some((Ok(chunk), (byte_stream, state, buffer))),
                        Ok(None) => continue, // [DONE] or keep-alive
                        Err(e) => return Some((Err(e), (byte_stream, state, buffer))),
                    }
                }

                // Need more data from the stream
                match byte_stream.next().await {
                    Some(Ok(bytes)) => {
                        let text = String::from_utf8_lossy(&bytes);
                        buffer.push_str(&text);
                    }
                    Some(Err(e)) => {
                        return Some((
                            Err(InferenceError::StreamError {
                                reason: format!("stream read error: {e}"),
                            }),
                            (byte_stream, state, buffer),
                        ));
                    }
                    None => {
                        // Stream ended — check for any remaining buffer content
                        if !buffer.trim().is_empty() {
                            match state.process_event(buffer.trim()) {
                                Ok(Some(chunk)) => {
                                    buffer.clear();
                                    return Some((Ok(chunk), (byte_stream, state, buffer)));
                                }
                                Ok(None) => return None,
                                Err(e) => return Some((Err(e), (byte_stream, state, buffer))),
                            }
                        }
                        return None;
                    }
                }
            }
        },
    )
}

// ─── Stream State ────────────────────────────────────────────────────────────

/// Mutable state for accumulating tool call fragments across SSE events.
struct StreamState {
    /// In-progress tool calls: `(index, id, name, arguments_buffer)`.
    pending_tool_calls: Vec<(u32, Option<String>, String, String)>,
}

impl StreamState {
    fn new() -> Self {
        Self {
            pending_tool_calls: Vec::new(),
        }
    }

    /// Process a single SSE event string (may contain multiple `data:` lines).
    fn process_event(&mut self, event: &str) -> Result<Option<StreamChunk>, InferenceError> {
        let mut data_content = String::new();

        for line in event.lines() {
            if let Some(data) = line.strip_prefix("data: ").or_else(|| line.strip_prefix("data:")) {
                let data = data.trim();
                if data == "[DONE]" {
                    // Stream complete — flush any pending tool calls
                    return self.finalize();
                }
                data_content.push_str(data);
            }
            // Ignore non-data lines (comments, event types, etc.)
        }

        if data_content.is_empty() {
            return Ok(None); // Keep-alive or comment
        }

        let chunk: ChatCompletionChunk =
            serde_json::from_str(&data_content).map_err(|e| InferenceError::StreamError {
                reason: format!("failed to parse SSE chunk: {e} (data: {data_content})"),
            })?;

        self.process_chunk(chunk)
    }

    /// Process a parsed `ChatCompletionChunk`.
    fn process_chunk(
        &mut self,
        chunk: ChatCompletionChunk,
    ) -> Result<Option<StreamChunk>, InferenceError> {
        let choice = match chunk.choices.first() {
            Some(c) => c,
            None => return Ok(None),
        };

        let mut result = StreamChunk {
            token: None,
            tool_calls: None,
            finish_reason: choice.finish_reason.clone(),
        };

        if let Some(ref content) = choice.delta.content {
            if !content.is_empty() {
                result.token = Some(content.clone());
            }
        }

        // Accumulate tool call deltas by index
        if let Some(ref tool_calls) = choice.delta.tool_calls {
            for tc in tool_calls {
                let index = tc.index.unwrap_or(0);

                let pending = self
                    .pending_tool_calls
                    .iter_mut()
                    .find(|(idx, _, _, _)| *idx == index);

                match pending {
                    Some((_, ref mut id, ref mut name, ref mut args)) => {
                        if let Some(ref f) = tc.function {
                            if let Some(ref n) = f.name {
                                name.push_str(n);
                            }
                            if let Some(ref a) = f.arguments {
                                args.push_str(a);
                            }
                        }
                        if tc.id.is_some() {
                            *id = tc.id.clone();
                        }
                    }
                    None => {
                        let name = tc
                            .function
                            .as_ref()
                            .and_then(|f| f.name.clone())
                            .unwrap_or_default();
                        let args = tc
                            .function
                            .as_ref()
                            .and_then(|f| f.arguments.clone())
                            .unwrap_or_default();
                        self.pending_tool_calls
                            .push((index, tc.id.clone(), name, args));
                    }
                }
            }
        }

        if let Some(ref reason) = result.finish_reason {
            if reason == "tool_calls" {
                result.tool_calls = Some(self.drain_tool_calls()?);
            }
        }

        Ok(Some(result))
    }

    /// Finalize accumulated tool calls, preserving emission order.
    fn drain_tool_calls(&mut self) -> Result<Vec<ToolCall>, InferenceError> {
        let mut pending = std::mem::take(&mut self.pending_tool_calls);
        pending.sort_by_key(|(index, _, _, _)| *index);

        let mut calls = Vec::with_capacity(pending.len());
        for (_index, id, name, args) in pending {
            calls.push(build_tool_call(id.as_deref(), &name, &args)?);
        }

        Ok(calls)
    }

    /// Flush at end of stream — emits any tool calls the model never
    /// terminated with an explicit `tool_calls` finish reason.
    fn finalize(&mut self) -> Result<Option<StreamChunk>, InferenceError> {
        if self.pending_tool_calls.is_empty() {
            return Ok(None);
        }

        let calls = self.drain_tool_calls()?;
        Ok(Some(StreamChunk {
            token: None,
            tool_calls: Some(calls),
            finish_reason: Some("tool_calls".into()),
        }))
    }
}

/// Build a `ToolCall` from accumulated fragments, parsing the argument text.
fn build_tool_call(
    id: Option<&str>,
    name: &str,
    raw_arguments: &str,
) -> Result<ToolCall, InferenceError> {
    let arguments: serde_json::Value = if raw_arguments.trim().is_empty() {
        serde_json::json!({})
    } else {
        serde_json::from_str(raw_arguments).map_err(|e| InferenceError::ToolCallParseError {
            raw_arguments: raw_arguments.to_string(),
            reason: format!("invalid JSON: {e}"),
        })?
    };

    Ok(ToolCall {
        id: id
            .map(String::from)
            .unwrap_or_else(|| format!("call_{}", Uuid::new_v4())),
        name: name.to_string(),
        arguments,
    })
}

// ─── Non-streaming parser ────────────────────────────────────────────────────

/// Parse a non-streaming response body into content and tool calls.
pub fn parse_completion_response(body: &str) -> Result<StreamChunk, InferenceError> {
    #[derive(Deserialize)]
    struct CompletionResponse {
        choices: Vec<CompletionChoice>,
    }

    #[derive(Deserialize)]
    struct CompletionChoice {
        message: CompletionMessage,
        finish_reason: Option<String>,
    }

    #[derive(Deserialize)]
    struct CompletionMessage {
        content: Option<String>,
        tool_calls: Option<Vec<CompletionToolCall>>,
    }

    #[derive(Deserialize)]
    struct CompletionToolCall {
        id: Option<String>,
        function: CompletionFunction,
    }

    #[derive(Deserialize)]
    struct CompletionFunction {
        name: String,
        arguments: String,
    }

    let resp: CompletionResponse =
        serde_json::from_str(body).map_err(|e| InferenceError::StreamError {
            reason: format!("failed to parse completion response: {e}"),
        })?;

    let choice = resp.choices.first().ok_or(InferenceError::StreamError {
        reason: "empty choices array".into(),
    })?;

    let content = choice.message.content.clone().filter(|c| !c.is_empty());

    let mut tool_calls = Vec::new();
    if let Some(ref tcs) = choice.message.tool_calls {
        for tc in tcs {
            tool_calls.push(build_tool_call(
                tc.id.as_deref(),
                &tc.function.name,
                &tc.function.arguments,
            )?);
        }
    }

    let finish_reason = if !tool_calls.is_empty() {
        Some("tool_calls".into())
    } else {
        choice.finish_reason.clone()
    };

    Ok(StreamChunk {
        token: content,
        tool_calls: if tool_calls.is_empty() {
            None
        } else {
            Some(tool_calls)
        },
        finish_reason,
    })
}

// ─── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_completion_with_content() {
        let body = r#"{
            "choices": [{
                "message": {"role": "assistant", "content": "Hello, world!"},
                "finish_reason": "stop"
            }]
        }"#;

        let chunk = parse_completion_response(body).unwrap();
        assert_eq!(chunk.token.as_deref(), Some("Hello, world!"));
        assert!(chunk.tool_calls.is_none());
        assert_eq!(chunk.finish_reason.as_deref(), Some("stop"));
    }

    #[test]
    fn test_parse_completion_with_tool_calls() {
        let body = r#"{
            "choices": [{
                "message": {
                    "role": "assistant",
                    "content": null,
                    "tool_calls": [{
                        "id": "call_abc",
                        "type": "function",
                        "function": {
                            "name": "count_intent",
                            "arguments": "{\"intent_name\": \"cancel_order\"}"
                        }
                    }]
                },
                "finish_reason": "tool_calls"
            }]
        }"#;

        let chunk = parse_completion_response(body).unwrap();
        let calls = chunk.tool_calls.unwrap();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].name, "count_intent");
        assert_eq!(calls[0].arguments["intent_name"], "cancel_order");
    }

    #[test]
    fn test_parse_completion_preserves_call_order() {
        let body = r#"{
            "choices": [{
                "message": {
                    "role": "assistant",
                    "content": null,
                    "tool_calls": [
                        {"id": "c1", "type": "function",
                         "function": {"name": "select_semantic_intent",
                                      "arguments": "{\"intent_names\": [\"cancel_order\"]}"}},
                        {"id": "c2", "type": "function",
                         "function": {"name": "count_intent",
                                      "arguments": "{\"intent_name\": \"cancel_order\"}"}}
                    ]
                },
                "finish_reason": "tool_calls"
            }]
        }"#;

        let chunk = parse_completion_response(body).unwrap();
        let calls = chunk.tool_calls.unwrap();
        assert_eq!(calls[0].name, "select_semantic_intent");
        assert_eq!(calls[1].name, "count_intent");
    }

    #[test]
    fn test_parse_completion_malformed_arguments() {
        let body = r#"{
            "choices": [{
                "message": {
                    "role": "assistant",
                    "content": null,
                    "tool_calls": [{
                        "id": "call_abc",
                        "type": "function",
                        "function": {"name": "count_intent", "arguments": "{not json"}
                    }]
                },
                "finish_reason": "tool_calls"
            }]
        }"#;

        let result = parse_completion_response(body);
        assert!(matches!(
            result,
            Err(InferenceError::ToolCallParseError { .. })
        ));
    }

    #[test]
    fn test_parse_completion_empty_choices() {
        let body = r#"{"choices": []}"#;
        let result = parse_completion_response(body);
        assert!(result.is_err());
    }

    #[test]
    fn test_parse_completion_generates_missing_call_id() {
        let body = r#"{
            "choices": [{
                "message": {
                    "role": "assistant",
                    "content": null,
                    "tool_calls": [{
                        "function": {"name": "finish", "arguments": ""}
                    }]
                },
                "finish_reason": "tool_calls"
            }]
        }"#;

        let chunk = parse_completion_response(body).unwrap();
        let calls = chunk.tool_calls.unwrap();
        assert!(calls[0].id.starts_with("call_"));
        assert_eq!(calls[0].arguments, serde_json::json!({}));
    }

    #[test]
    fn test_stream_state_accumulates_fragments() {
        let mut state = StreamState::new();

        let first = r#"data: {"id":"x","choices":[{"delta":{"tool_calls":[{"index":0,"id":"call_1","function":{"name":"count_intent","arguments":"{\"intent_"}}]},"finish_reason":null}]}"#;
        let second = r#"data: {"id":"x","choices":[{"delta":{"tool_calls":[{"index":0,"function":{"arguments":"name\": \"cancel_order\"}"}}]},"finish_reason":"tool_calls"}]}"#;

        let chunk = state.process_event(first).unwrap().unwrap();
        assert!(chunk.tool_calls.is_none());

        let chunk = state.process_event(second).unwrap().unwrap();
        let calls = chunk.tool_calls.unwrap();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].id, "call_1");
        assert_eq!(calls[0].arguments["intent_name"], "cancel_order");
    }

    #[test]
    fn test_stream_state_text_tokens() {
        let mut state = StreamState::new();

        let event = r#"data: {"id":"x","choices":[{"delta":{"content":"Hel"},"finish_reason":null}]}"#;
        let chunk = state.process_event(event).unwrap().unwrap();
        assert_eq!(chunk.token.as_deref(), Some("Hel"));

        let done = state.process_event("data: [DONE]").unwrap();
        assert!(done.is_none());
    }

    #[test]
    fn test_stream_state_done_flushes_pending_calls() {
        let mut state = StreamState::new();

        let event = r#"data: {"id":"x","choices":[{"delta":{"tool_calls":[{"index":0,"id":"call_9","function":{"name":"finish","arguments":""}}]},"finish_reason":null}]}"#;
        state.process_event(event).unwrap();

        let flushed = state.process_event("data: [DONE]").unwrap().unwrap();
        let calls = flushed.tool_calls.unwrap();
        assert_eq!(calls[0].name, "finish");
        assert_eq!(flushed.finish_reason.as_deref(), Some("tool_calls"));
    }
}
