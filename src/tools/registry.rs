//! Tool registry — the closed catalog of callable tools.
//!
//! Provides:
//! - Tool schemas in OpenAI function-calling format, with the category and
//!   intent universes embedded as closed enums
//! - Validation that a tool call matches the catalog and its schema
//! - Parsing of raw arguments into typed `ToolInvocation` values
//!
//! The catalog is fixed at construction and not extensible at runtime.

use serde_json::{json, Map, Value};

use crate::dataset::TicketTable;
use crate::inference::types::{FunctionDefinition, ToolDefinition};

use super::invocation::{ToolError, ToolInvocation};

// ─── ToolRegistry ───────────────────────────────────────────────────────────

/// Catalog of tool schemas bound to one dataset's value universes.
#[derive(Debug, Clone)]
pub struct ToolRegistry {
    definitions: Vec<ToolDefinition>,
    intents: Vec<String>,
    categories: Vec<String>,
}

impl ToolRegistry {
    /// Build the catalog, deriving the enum universes from the table.
    pub fn new(table: &TicketTable) -> Self {
        let intents = table.intents().to_vec();
        let categories = table.categories().to_vec();
        let definitions = build_definitions(&intents, &categories);

        Self {
            definitions,
            intents,
            categories,
        }
    }

    /// All tool schemas, ready to advertise in a chat request.
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        self.definitions.clone()
    }

    /// Number of tools in the catalog.
    pub fn len(&self) -> usize {
        self.definitions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.definitions.is_empty()
    }

    /// Resolve a `(name, arguments)` pair into a typed invocation.
    ///
    /// Every failure is a recoverable `ToolError` — the dispatcher feeds it
    /// back into the conversation instead of aborting the loop.
    pub fn parse(&self, name: &str, arguments: &Value) -> Result<ToolInvocation, ToolError> {
        match name {
            "select_semantic_intent" => {
                let args = require_object(name, arguments)?;
                reject_unknown_keys(name, args, &["intent_names"])?;
                let intent_names = require_name_list(name, args, "intent_names")?;
                check_enum_values(name, "intent_names", &intent_names, &self.intents)?;
                Ok(ToolInvocation::SelectIntent { intent_names })
            }
            "select_semantic_category" => {
                let args = require_object(name, arguments)?;
                reject_unknown_keys(name, args, &["category_names"])?;
                let category_names = require_name_list(name, args, "category_names")?;
                check_enum_values(name, "category_names", &category_names, &self.categories)?;
                Ok(ToolInvocation::SelectCategory { category_names })
            }
            "count_intent" => {
                let args = require_object(name, arguments)?;
                reject_unknown_keys(name, args, &["intent_name"])?;
                let intent_name = require_string(name, args, "intent_name")?;
                check_enum_values(
                    name,
                    "intent_name",
                    std::slice::from_ref(&intent_name),
                    &self.intents,
                )?;
                Ok(ToolInvocation::CountIntent { intent_name })
            }
            "count_category" => {
                let args = require_object(name, arguments)?;
                reject_unknown_keys(name, args, &["category_name"])?;
                let category_name = require_string(name, args, "category_name")?;
                check_enum_values(
                    name,
                    "category_name",
                    std::slice::from_ref(&category_name),
                    &self.categories,
                )?;
                Ok(ToolInvocation::CountCategory { category_name })
            }
            "get_all_intents" => {
                require_no_arguments(name, arguments)?;
                Ok(ToolInvocation::GetAllIntents)
            }
            "get_all_categories" => {
                require_no_arguments(name, arguments)?;
                Ok(ToolInvocation::GetAllCategories)
            }
            "show_examples" => {
                let args = require_object(name, arguments)?;
                reject_unknown_keys(name, args, &["n"])?;
                let n = require_u64(name, args, "n")?;
                Ok(ToolInvocation::ShowExamples { n })
            }
            "summarize" => {
                let args = require_object(name, arguments)?;
                reject_unknown_keys(name, args, &["user_request"])?;
                let user_request = require_string(name, args, "user_request")?;
                Ok(ToolInvocation::Summarize { user_request })
            }
            "sum" => {
                let args = require_object(name, arguments)?;
                reject_unknown_keys(name, args, &["a", "b"])?;
                let a = require_i64(name, args, "a")?;
                let b = require_i64(name, args, "b")?;
                Ok(ToolInvocation::Sum { a, b })
            }
            "finish" => {
                require_no_arguments(name, arguments)?;
                Ok(ToolInvocation::Finish)
            }
            _ => Err(ToolError::UnknownTool {
                name: name.to_string(),
            }),
        }
    }
}

// ─── Schema construction ────────────────────────────────────────────────────

fn build_definitions(intents: &[String], categories: &[String]) -> Vec<ToolDefinition> {
    vec![
        function(
            "select_semantic_intent",
            "Filter the dataset by a list of intent names, cache the result, \
             and return a confirmation with the row count.",
            json!({
                "type": "object",
                "properties": {
                    "intent_names": {
                        "type": "array",
                        "items": {"type": "string", "enum": intents},
                        "description": "List of intent names to filter by"
                    }
                },
                "required": ["intent_names"],
                "additionalProperties": false
            }),
        ),
        function(
            "select_semantic_category",
            "Filter the dataset by a list of category names, cache the result, \
             and return a confirmation with the row count.",
            json!({
                "type": "object",
                "properties": {
                    "category_names": {
                        "type": "array",
                        "items": {"type": "string", "enum": categories},
                        "description": "List of category names to filter by"
                    }
                },
                "required": ["category_names"],
                "additionalProperties": false
            }),
        ),
        function(
            "count_intent",
            "Count how many rows in the current selection have the given intent \
             name and return that number.",
            json!({
                "type": "object",
                "properties": {
                    "intent_name": {
                        "type": "string",
                        "enum": intents,
                        "description": "The intent name whose frequency you want to count."
                    }
                },
                "required": ["intent_name"],
                "additionalProperties": false
            }),
        ),
        function(
            "count_category",
            "Count how many rows in the current selection have the given category \
             name and return that number.",
            json!({
                "type": "object",
                "properties": {
                    "category_name": {
                        "type": "string",
                        "enum": categories,
                        "description": "The category name whose frequency you want to count."
                    }
                },
                "required": ["category_name"],
                "additionalProperties": false
            }),
        ),
        function(
            "get_all_intents",
            "Return a list of all available intent names.",
            empty_schema(),
        ),
        function(
            "get_all_categories",
            "Return a list of all available category names.",
            empty_schema(),
        ),
        function(
            "show_examples",
            "Return a random sample of n examples from the current selection.",
            json!({
                "type": "object",
                "properties": {
                    "n": {
                        "type": "integer",
                        "description": "The number of examples to show"
                    }
                },
                "required": ["n"],
                "additionalProperties": false
            }),
        ),
        function(
            "summarize",
            "Summarise an arbitrary user request.",
            json!({
                "type": "object",
                "properties": {
                    "user_request": {
                        "type": "string",
                        "description": "The user request to summarise"
                    }
                },
                "required": ["user_request"],
                "additionalProperties": false
            }),
        ),
        function(
            "sum",
            "Function that sums two integers and returns the result.",
            json!({
                "type": "object",
                "properties": {
                    "a": {"type": "integer", "description": "The first integer to sum"},
                    "b": {"type": "integer", "description": "The second integer to sum"}
                },
                "required": ["a", "b"],
                "additionalProperties": false
            }),
        ),
        function(
            "finish",
            "Signal that the assistant now has enough data to answer the question \
             and should produce a final response.",
            empty_schema(),
        ),
    ]
}

fn function(name: &str, description: &str, parameters: Value) -> ToolDefinition {
    ToolDefinition {
        r#type: "function".to_string(),
        function: FunctionDefinition {
            name: name.to_string(),
            description: description.to_string(),
            parameters,
            strict: Some(true),
        },
    }
}

fn empty_schema() -> Value {
    json!({
        "type": "object",
        "properties": {},
        "required": [],
        "additionalProperties": false
    })
}

// ─── Argument validation ────────────────────────────────────────────────────

fn require_object<'a>(tool: &str, arguments: &'a Value) -> Result<&'a Map<String, Value>, ToolError> {
    arguments.as_object().ok_or_else(|| ToolError::InvalidArguments {
        tool: tool.to_string(),
        reason: "arguments must be a JSON object".to_string(),
    })
}

/// `additionalProperties: false` — the schema forbids keys we don't declare,
/// so a call carrying one is rejected rather than silently ignored.
fn reject_unknown_keys(
    tool: &str,
    args: &Map<String, Value>,
    allowed: &[&str],
) -> Result<(), ToolError> {
    for key in args.keys() {
        if !allowed.contains(&key.as_str()) {
            return Err(ToolError::InvalidArguments {
                tool: tool.to_string(),
                reason: format!("unexpected field: '{key}'"),
            });
        }
    }
    Ok(())
}

fn require_field<'a>(
    tool: &str,
    args: &'a Map<String, Value>,
    field: &str,
) -> Result<&'a Value, ToolError> {
    args.get(field).ok_or_else(|| ToolError::InvalidArguments {
        tool: tool.to_string(),
        reason: format!("missing required field: '{field}'"),
    })
}

fn require_string(tool: &str, args: &Map<String, Value>, field: &str) -> Result<String, ToolError> {
    require_field(tool, args, field)?
        .as_str()
        .map(String::from)
        .ok_or_else(|| ToolError::InvalidArguments {
            tool: tool.to_string(),
            reason: format!("field '{field}' must be a string"),
        })
}

/// A list of names. A bare string is accepted and wrapped — models
/// occasionally send `"x"` where the schema says `["x"]`.
fn require_name_list(
    tool: &str,
    args: &Map<String, Value>,
    field: &str,
) -> Result<Vec<String>, ToolError> {
    let value = require_field(tool, args, field)?;
    match value {
        Value::String(s) => Ok(vec![s.clone()]),
        Value::Array(items) => {
            let mut names = Vec::with_capacity(items.len());
            for item in items {
                let s = item.as_str().ok_or_else(|| ToolError::InvalidArguments {
                    tool: tool.to_string(),
                    reason: format!("field '{field}' must contain only strings"),
                })?;
                names.push(s.to_string());
            }
            Ok(names)
        }
        _ => Err(ToolError::InvalidArguments {
            tool: tool.to_string(),
            reason: format!("field '{field}' must be an array of strings"),
        }),
    }
}

fn require_u64(tool: &str, args: &Map<String, Value>, field: &str) -> Result<u64, ToolError> {
    require_field(tool, args, field)?
        .as_u64()
        .ok_or_else(|| ToolError::InvalidArguments {
            tool: tool.to_string(),
            reason: format!("field '{field}' must be a non-negative integer"),
        })
}

fn require_i64(tool: &str, args: &Map<String, Value>, field: &str) -> Result<i64, ToolError> {
    require_field(tool, args, field)?
        .as_i64()
        .ok_or_else(|| ToolError::InvalidArguments {
            tool: tool.to_string(),
            reason: format!("field '{field}' must be an integer"),
        })
}

fn require_no_arguments(tool: &str, arguments: &Value) -> Result<(), ToolError> {
    match arguments {
        Value::Null => Ok(()),
        Value::Object(map) if map.is_empty() => Ok(()),
        Value::Object(map) => Err(ToolError::InvalidArguments {
            tool: tool.to_string(),
            reason: format!(
                "takes no arguments, got: {}",
                map.keys().cloned().collect::<Vec<_>>().join(", ")
            ),
        }),
        _ => Err(ToolError::InvalidArguments {
            tool: tool.to_string(),
            reason: "arguments must be a JSON object".to_string(),
        }),
    }
}

/// Enforce the closed enumeration for category/intent-valued fields.
fn check_enum_values(
    tool: &str,
    field: &str,
    values: &[String],
    universe: &[String],
) -> Result<(), ToolError> {
    for value in values {
        if !universe.contains(value) {
            return Err(ToolError::UnknownValue {
                tool: tool.to_string(),
                field: field.to_string(),
                value: value.clone(),
            });
        }
    }
    Ok(())
}

// ─── Tests ──────────────────────────────────────────────────────────────────
