//! In-memory ticket table with derived enumerations.
//!
//! The table is immutable after construction. Tools never hand out owned
//! row copies for filtering — subsets are index lists into the table, so
//! the single-slot result cache stays cheap to overwrite.

use serde::{Deserialize, Serialize};

/// One support-ticket record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TicketRecord {
    /// Coarse category of the user request (e.g., "ORDER", "REFUND").
    pub category: String,
    /// Fine-grained intent label (e.g., "cancel_order").
    pub intent: String,
    /// The user's request text.
    pub instruction: String,
    /// An example assistant response for this request.
    pub response: String,
}

/// The full dataset plus the derived category/intent universes.
///
/// The universes are sorted and deduplicated once at construction and
/// embedded into every tool schema that accepts a category or intent, so
/// the model cannot request a token outside the known value sets.
#[derive(Debug, Clone)]
pub struct TicketTable {
    records: Vec<TicketRecord>,
    categories: Vec<String>,
    intents: Vec<String>,
}

impl TicketTable {
    pub fn new(records: Vec<TicketRecord>) -> Self {
        let categories = sorted_unique(records.iter().map(|r| r.category.as_str()));
        let intents = sorted_unique(records.iter().map(|r| r.intent.as_str()));
        Self {
            records,
            categories,
            intents,
        }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn record(&self, row: usize) -> &TicketRecord {
        &self.records[row]
    }

    pub fn records(&self) -> &[TicketRecord] {
        &self.records
    }

    /// Sorted, deduplicated category universe.
    pub fn categories(&self) -> &[String] {
        &self.categories
    }

    /// Sorted, deduplicated intent universe.
    pub fn intents(&self) -> &[String] {
        &self.intents
    }

    /// Row indices whose intent is one of `names`.
    pub fn rows_with_intent_in(&self, names: &[String]) -> Vec<usize> {
        self.records
            .iter()
            .enumerate()
            .filter(|(_, r)| names.iter().any(|n| n == &r.intent))
            .map(|(i, _)| i)
            .collect()
    }

    /// Row indices whose category is one of `names`.
    pub fn rows_with_category_in(&self, names: &[String]) -> Vec<usize> {
        self.records
            .iter()
            .enumerate()
            .filter(|(_, r)| names.iter().any(|n| n == &r.category))
            .map(|(i, _)| i)
            .collect()
    }
}

fn sorted_unique<'a>(values: impl Iterator<Item = &'a str>) -> Vec<String> {
    let mut out: Vec<String> = values.map(String::from).collect();
    out.sort();
    out.dedup();
    out
}

// ─── Tests ──────────────────────────────────────────────────────────────────
