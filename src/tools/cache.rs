//! Single-slot result cache.
//!
//! Holds the most recently selected subset of the dataset as a row-index
//! list. Selection tools replace it atomically — last write wins, never
//! merged. Read-only tools observe whatever is currently cached; before
//! any selection has happened the slot reads as the full table.

use crate::dataset::TicketTable;

/// The "current subset" slot shared by the selection and read tools.
#[derive(Debug, Default)]
pub struct ResultCache {
    /// `None` until the first selection; then the selected row indices.
    selection: Option<Vec<usize>>,
}

impl ResultCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Overwrite the slot with a new selection. The previous subset is
    /// discarded entirely.
    pub fn replace(&mut self, rows: Vec<usize>) {
        self.selection = Some(rows);
    }

    /// The current selection, or `None` when no selection has occurred
    /// (read as the full table by callers).
    pub fn selection(&self) -> Option<&[usize]> {
        self.selection.as_deref()
    }

    /// Number of rows the cache currently exposes.
    pub fn len(&self, table: &TicketTable) -> usize {
        match self.selection {
            Some(ref rows) => rows.len(),
            None => table.len(),
        }
    }

    pub fn is_empty(&self, table: &TicketTable) -> bool {
        self.len(table) == 0
    }

    /// Materialize the cached row indices (full table when untouched).
    pub fn rows(&self, table: &TicketTable) -> Vec<usize> {
        match self.selection {
            Some(ref rows) => rows.clone(),
            None => (0..table.len()).collect(),
        }
    }
}

// ─── Tests ──────────────────────────────────────────────────────────────────
