//! Tool handlers — deterministic query operations over the dataset view
//! and the result cache.
//!
//! Each handler is a pure function of `(table, cache, rng, arguments)`.
//! The returned string becomes the content of the `tool`-role message;
//! failures are `ToolError` values the dispatcher folds into the
//! conversation.

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use serde_json::json;

use crate::dataset::TicketTable;

use super::cache::ResultCache;
use super::invocation::{ToolError, ToolInvocation};

/// Everything a handler may touch.
pub struct ToolContext<'a> {
    pub table: &'a TicketTable,
    pub cache: &'a mut ResultCache,
    pub rng: &'a mut StdRng,
}

/// Execute a validated invocation and render its result for the
/// conversation.
pub fn execute(invocation: &ToolInvocation, ctx: &mut ToolContext<'_>) -> Result<String, ToolError> {
    match invocation {
        ToolInvocation::SelectIntent { intent_names } => {
            let rows = ctx.table.rows_with_intent_in(intent_names);
            let count = rows.len();
            ctx.cache.replace(rows);
            Ok(format!("Cached intents {intent_names:?} with {count} rows"))
        }
        ToolInvocation::SelectCategory { category_names } => {
            let rows = ctx.table.rows_with_category_in(category_names);
            let count = rows.len();
            ctx.cache.replace(rows);
            Ok(format!(
                "Cached categories {category_names:?} with {count} rows"
            ))
        }
        ToolInvocation::CountIntent { intent_name } => {
            let count = count_cached(ctx, |record| &record.intent == intent_name);
            Ok(count.to_string())
        }
        ToolInvocation::CountCategory { category_name } => {
            let count = count_cached(ctx, |record| &record.category == category_name);
            Ok(count.to_string())
        }
        ToolInvocation::GetAllIntents => {
            Ok(json!(ctx.table.intents()).to_string())
        }
        ToolInvocation::GetAllCategories => {
            Ok(json!(ctx.table.categories()).to_string())
        }
        ToolInvocation::ShowExamples { n } => show_examples(ctx, *n),
        ToolInvocation::Summarize { user_request } => Ok(format!("Summary: {user_request}")),
        ToolInvocation::Sum { a, b } => Ok((a + b).to_string()),
        ToolInvocation::Finish => Ok("Conversation finished.".to_string()),
    }
}

/// Count cached rows matching the predicate. An empty selection counts as
/// zero; an untouched cache counts over the full table.
fn count_cached(
    ctx: &ToolContext<'_>,
    predicate: impl Fn(&crate::dataset::TicketRecord) -> bool,
) -> usize {
    match ctx.cache.selection() {
        Some(rows) => rows
            .iter()
            .filter(|&&row| predicate(ctx.table.record(row)))
            .count(),
        None => ctx.table.records().iter().filter(|r| predicate(r)).count(),
    }
}

/// Sample up to `n` distinct rows from the current selection.
fn show_examples(ctx: &mut ToolContext<'_>, n: u64) -> Result<String, ToolError> {
    if ctx.cache.is_empty(ctx.table) {
        return Err(ToolError::NoDataAvailable);
    }

    let rows = ctx.cache.rows(ctx.table);
    let sample_size = (n as usize).min(rows.len());

    let sampled: Vec<serde_json::Value> = rows
        .choose_multiple(ctx.rng, sample_size)
        .map(|&row| {
            let record = ctx.table.record(row);
            json!({
                "category": record.category,
                "intent": record.intent,
                "instruction": record.instruction,
                "response": record.response,
            })
        })
        .collect();

    Ok(json!(sampled).to_string())
}

// ─── Tests ──────────────────────────────────────────────────────────────────
