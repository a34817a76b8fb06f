//! CSV import for the ticket dataset.
//!
//! Expects the four-column export (`category`, `intent`, `instruction`,
//! `response`) with a header row. Extra columns are ignored by serde.

use std::path::Path;

use thiserror::Error;

use super::table::{TicketRecord, TicketTable};

/// Errors that can occur while importing the dataset.
#[derive(Debug, Error)]
pub enum DatasetError {
    #[error("failed to read dataset {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse dataset {path}: {source}")]
    Csv {
        path: String,
        #[source]
        source: csv::Error,
    },

    /// A dataset with zero rows produces empty enumerations, which would
    /// make every selection tool schema vacuous.
    #[error("dataset {path} contains no records")]
    Empty { path: String },
}

/// Load a ticket table from a CSV file.
pub fn load_csv(path: &Path) -> Result<TicketTable, DatasetError> {
    let path_str = path.display().to_string();

    let mut reader = csv::Reader::from_path(path).map_err(|e| match e.kind() {
        csv::ErrorKind::Io(_) => {
            // Surface file-not-found and friends as an Io error with the path.
            DatasetError::Io {
                path: path_str.clone(),
                source: std::io::Error::other(e.to_string()),
            }
        }
        _ => DatasetError::Csv {
            path: path_str.clone(),
            source: e,
        },
    })?;

    let mut records = Vec::new();
    for row in reader.deserialize::<TicketRecord>() {
        let record = row.map_err(|e| DatasetError::Csv {
            path: path_str.clone(),
            source: e,
        })?;
        records.push(record);
    }

    if records.is_empty() {
        return Err(DatasetError::Empty { path: path_str });
    }

    tracing::info!(
        path = %path_str,
        rows = records.len(),
        "loaded ticket dataset"
    );

    Ok(TicketTable::new(records))
}

// ─── Tests ──────────────────────────────────────────────────────────────────
