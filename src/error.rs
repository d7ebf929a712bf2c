//! Error handling for record extraction runs.
//!
//! Only two conditions are fatal to a run: a source path that does not
//! resolve to a readable file, and an I/O or format fault while reading.
//! Per-record mapping failures are absorbed into the invalid lists of the
//! delivered batches and never cross the pipeline boundary.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SheetError {
    #[error("source file not found: {path}")]
    SourceNotFound { path: PathBuf },

    #[error("cannot read {name} as {format}: {reason}")]
    SourceUnreadable {
        name: String,
        format: String,
        reason: String,
    },
}

impl SheetError {
    /// Create a not-found error for a source path.
    pub fn not_found(path: impl Into<PathBuf>) -> Self {
        Self::SourceNotFound { path: path.into() }
    }

    /// Create an unreadable-source error carrying the attempted format.
    pub fn unreadable(
        name: impl Into<String>,
        format: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self::SourceUnreadable {
            name: name.into(),
            format: format.into(),
            reason: reason.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, SheetError>;
