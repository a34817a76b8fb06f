//! Inference — OpenAI-compatible API client for the hosted chat model.
//!
//! This module handles all communication with the model endpoint:
//! - Streaming and non-streaming chat completions
//! - SSE stream parsing and tool-call accumulation
//! - Model configuration loading from `ticketlens.yaml`
//! - The `ChatBackend` seam the orchestration layer depends on
//!
//! The client speaks the OpenAI Chat Completions API, making the model
//! interchangeable via config.

pub mod backend;
pub mod client;
pub mod config;
pub mod errors;
pub mod streaming;
pub mod types;

// Re-exports for convenience
pub use backend::{AssistantTurn, ChatBackend, NullSink, TokenSink};
pub use client::InferenceClient;
pub use config::ModelConfig;
pub use errors::InferenceError;
pub use types::{ChatMessage, ChatRequest, Role, ToolCall, ToolChoice, ToolDefinition};
