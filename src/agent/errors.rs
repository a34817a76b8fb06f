//! Agent-level error types.

use thiserror::Error;

use crate::inference::InferenceError;

/// Errors surfaced by the orchestration entry point.
///
/// Per-tool-call failures never appear here — they are folded into the
/// conversation as tool-message content so the model can recover.
#[derive(Debug, Error)]
pub enum AgentError {
    /// The caller passed a reasoning mode outside the contract. This is a
    /// programming error in the caller, surfaced before any model call.
    #[error("mode must be either 'react' or 'planning' (got '{given}')")]
    InvalidMode { given: String },

    /// A model call failed in a position where no local recovery applies.
    #[error(transparent)]
    Inference(#[from] InferenceError),
}
