//! Typed tool invocations and per-call errors.
//!
//! The catalog is closed: every callable tool is a variant here, resolved
//! once by the registry from the model's `(name, arguments)` pair. Unknown
//! names and malformed arguments become `ToolError` values that the
//! dispatcher folds back into the conversation — they never abort the loop.

use thiserror::Error;

/// A validated call to one of the catalog tools.
#[derive(Debug, Clone, PartialEq)]
pub enum ToolInvocation {
    /// Filter by intent names and replace the cache slot.
    SelectIntent { intent_names: Vec<String> },
    /// Filter by category names and replace the cache slot.
    SelectCategory { category_names: Vec<String> },
    /// Count cached rows with the given intent.
    CountIntent { intent_name: String },
    /// Count cached rows with the given category.
    CountCategory { category_name: String },
    /// The full intent universe, independent of the cache.
    GetAllIntents,
    /// The full category universe, independent of the cache.
    GetAllCategories,
    /// Random sample of up to `n` cached rows.
    ShowExamples { n: u64 },
    /// Echo-style summary of a request.
    Summarize { user_request: String },
    /// Integer addition.
    Sum { a: i64, b: i64 },
    /// Completion signal consumed by the executor.
    Finish,
}

impl ToolInvocation {
    /// Whether this call is the completion signal.
    pub fn is_finish(&self) -> bool {
        matches!(self, ToolInvocation::Finish)
    }

    /// The catalog name this invocation dispatches as.
    pub fn tool_name(&self) -> &'static str {
        match self {
            ToolInvocation::SelectIntent { .. } => "select_semantic_intent",
            ToolInvocation::SelectCategory { .. } => "select_semantic_category",
            ToolInvocation::CountIntent { .. } => "count_intent",
            ToolInvocation::CountCategory { .. } => "count_category",
            ToolInvocation::GetAllIntents => "get_all_intents",
            ToolInvocation::GetAllCategories => "get_all_categories",
            ToolInvocation::ShowExamples { .. } => "show_examples",
            ToolInvocation::Summarize { .. } => "summarize",
            ToolInvocation::Sum { .. } => "sum",
            ToolInvocation::Finish => "finish",
        }
    }
}

/// Recoverable per-call failures.
///
/// These are data, not faults: the dispatcher renders them into the
/// corresponding `tool`-role message so the model can adapt on its next
/// turn.
#[derive(Debug, Error, PartialEq)]
pub enum ToolError {
    /// The model asked for a name outside the closed catalog.
    #[error("unknown tool: {name}")]
    UnknownTool { name: String },

    /// Arguments are structurally invalid (missing/extra fields, wrong types).
    #[error("invalid arguments for {tool}: {reason}")]
    InvalidArguments { tool: String, reason: String },

    /// A category/intent value outside the declared enumeration.
    #[error("unknown {field} value for {tool}: '{value}'")]
    UnknownValue {
        tool: String,
        field: String,
        value: String,
    },

    /// `show_examples` on a cache holding zero rows.
    #[error("no data available in the current selection")]
    NoDataAvailable,
}

// ─── Tests ──────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_finish() {
        assert!(ToolInvocation::Finish.is_finish());
        assert!(!ToolInvocation::GetAllIntents.is_finish());
    }

    #[test]
    fn test_tool_name_round_trip() {
        let inv = ToolInvocation::CountIntent {
            intent_name: "cancel_order".into(),
        };
        assert_eq!(inv.tool_name(), "count_intent");
    }

    #[test]
    fn test_error_display() {
        let err = ToolError::UnknownValue {
            tool: "count_intent".into(),
            field: "intent_name".into(),
            value: "teleport_order".into(),
        };
        assert_eq!(
            err.to_string(),
            "unknown intent_name value for count_intent: 'teleport_order'"
        );
    }
}
