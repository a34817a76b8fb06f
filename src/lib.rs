//! ticketlens — a tool-calling agent over a customer-support ticket dataset.
//!
//! A hosted OpenAI-compatible chat model answers questions about the
//! dataset by calling a closed catalog of deterministic query tools
//! (select, count, sample) instead of guessing numbers. The crate's core
//! is the orchestration engine in [`agent`]; [`tools`], [`dataset`], and
//! [`inference`] supply the catalog, the data view, and the model client.

pub mod agent;
pub mod dataset;
pub mod inference;
pub mod tools;

pub use agent::{AgentError, AgentSession, Mode};
pub use dataset::{load_csv, TicketTable};
pub use inference::{InferenceClient, ModelConfig};
