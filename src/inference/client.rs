//! OpenAI-compatible inference client.
//!
//! Sends chat completion requests to the configured endpoint, either as a
//! single blocking call or as an SSE stream whose text deltas are forwarded
//! to a `TokenSink`. Timeouts are per-call: a hung endpoint fails the turn
//! instead of stalling the orchestration forever.

use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use reqwest::Client as HttpClient;

use super::backend::{AssistantTurn, ChatBackend, TokenSink};
use super::config::ModelConfig;
use super::errors::InferenceError;
use super::streaming::{parse_completion_response, parse_sse_stream};
use super::types::{ChatCompletionRequest, ChatRequest, ToolCall};

// ─── Constants ───────────────────────────────────────────────────────────────

/// TCP connection timeout.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Total request timeout for non-streaming calls.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Total request timeout for streaming calls.
///
/// Streaming responses take longer end to end — the whole completion has
/// to finish within this window, not just the first token.
const STREAM_REQUEST_TIMEOUT: Duration = Duration::from_secs(180);

// ─── InferenceClient ─────────────────────────────────────────────────────────

/// Client for the OpenAI-compatible chat completions endpoint.
pub struct InferenceClient {
    /// HTTP client for non-streaming requests (30s timeout).
    http: HttpClient,
    /// HTTP client for streaming requests (180s timeout).
    http_stream: HttpClient,
    config: ModelConfig,
}

impl InferenceClient {
    /// Create a new inference client from the model configuration.
    ///
    /// Does NOT check connectivity — that happens on the first request.
    pub fn new(config: ModelConfig) -> Result<Self, InferenceError> {
        if config.api_key.is_empty() {
            tracing::warn!(
                base_url = %config.base_url,
                "no API key configured — requests will likely be rejected"
            );
        }

        let http = HttpClient::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| InferenceError::ConnectionFailed {
                endpoint: config.base_url.clone(),
                reason: format!("failed to build HTTP client: {e}"),
            })?;

        let http_stream = HttpClient::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .timeout(STREAM_REQUEST_TIMEOUT)
            .build()
            .map_err(|e| InferenceError::ConnectionFailed {
                endpoint: config.base_url.clone(),
                reason: format!("failed to build streaming HTTP client: {e}"),
            })?;

        Ok(Self {
            http,
            http_stream,
            config,
        })
    }

    /// The model identifier requests are issued for.
    pub fn model(&self) -> &str {
        &self.config.model
    }

    fn completions_url(&self) -> String {
        format!("{}/chat/completions", self.config.base_url)
    }

    fn build_body(&self, request: ChatRequest, stream: bool) -> ChatCompletionRequest {
        ChatCompletionRequest {
            model: self.config.model.clone(),
            messages: request.messages,
            tools: request.tools,
            tool_choice: request.tool_choice,
            temperature: self.config.temperature,
            max_tokens: self.config.max_tokens,
            stream,
        }
    }

    fn map_send_error(&self, url: &str, e: reqwest::Error) -> InferenceError {
        if e.is_timeout() {
            InferenceError::Timeout {
                duration_secs: REQUEST_TIMEOUT.as_secs(),
            }
        } else {
            InferenceError::ConnectionFailed {
                endpoint: url.to_string(),
                reason: e.to_string(),
            }
        }
    }
}

#[async_trait]
impl ChatBackend for InferenceClient {
    async fn complete(&self, request: ChatRequest) -> Result<AssistantTurn, InferenceError> {
        let url = self.completions_url();
        let body = self.build_body(request, false);

        tracing::info!(
            url = %url,
            model = %body.model,
            message_count = body.messages.len(),
            has_tools = body.tools.is_some(),
            tool_choice = ?body.tool_choice,
            "chat completion request"
        );

        let response = self
            .http
            .post(&url)
            .bearer_auth(&self.config.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| self.map_send_error(&url, e))?;

        let status = response.status();
        let text = response.text().await.unwrap_or_default();
        if !status.is_success() {
            return Err(InferenceError::HttpError {
                status: status.as_u16(),
                body: text,
            });
        }

        let chunk = parse_completion_response(&text)?;
        Ok(AssistantTurn {
            content: chunk.token,
            tool_calls: chunk.tool_calls.unwrap_or_default(),
        })
    }

    async fn complete_streaming(
        &self,
        request: ChatRequest,
        sink: &dyn TokenSink,
    ) -> Result<AssistantTurn, InferenceError> {
        let url = self.completions_url();
        let body = self.build_body(request, true);

        tracing::info!(
            url = %url,
            model = %body.model,
            message_count = body.messages.len(),
            has_tools = body.tools.is_some(),
            "streaming chat completion request"
        );

        let response = self
            .http_stream
            .post(&url)
            .bearer_auth(&self.config.api_key)
            .json(&body)
            .header("Accept", "text/event-stream")
            .send()
            .await
            .map_err(|e| self.map_send_error(&url, e))?;

        let status = response.status();
        if !status.is_success() {
            let body_text = response.text().await.unwrap_or_default();
            return Err(InferenceError::HttpError {
                status: status.as_u16(),
                body: body_text,
            });
        }

        let stream = parse_sse_stream(response);
        futures::pin_mut!(stream);

        let mut content = String::new();
        let mut tool_calls: Vec<ToolCall> = Vec::new();

        while let Some(chunk) = stream.next().await {
            let chunk = chunk?;
            if let Some(ref token) = chunk.token {
                sink.emit(token);
                content.push_str(token);
            }
            if let Some(calls) = chunk.tool_calls {
                tool_calls.extend(calls);
            }
        }

        Ok(AssistantTurn {
            content: if content.is_empty() {
                None
            } else {
                Some(content)
            },
            tool_calls,
        })
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────
