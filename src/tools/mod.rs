//! Tools — the closed catalog the model may call, plus the single-slot
//! result cache the tools read and write.
//!
//! Submodules:
//! - `registry`: schemas (closed enums, strict) and argument validation
//! - `invocation`: typed invocations and recoverable per-call errors
//! - `handlers`: handler execution over the dataset view and cache
//! - `cache`: the last-write-wins selection slot

pub mod cache;
pub mod handlers;
pub mod invocation;
pub mod registry;

pub use cache::ResultCache;
pub use handlers::{execute, ToolContext};
pub use invocation::{ToolError, ToolInvocation};
pub use registry::ToolRegistry;
