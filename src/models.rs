//! Core data model shared across the pipeline.

use std::collections::HashMap;
use std::fmt;

/// Unmapped field map extracted from one source row or JSON element.
///
/// Keys are external header/key names; `None` marks an empty cell.
/// Ephemeral: created per logical record and discarded after mapping.
pub type RawRecord = HashMap<String, Option<String>>;

/// A raw record paired with its 1-based logical source row number.
///
/// Only appears in the invalid list of a [`BatchEnvelope`], so callers can
/// locate the offending source row without re-scanning the file.
#[derive(Debug, Clone, PartialEq)]
pub struct RowDescriptor {
    pub row_number: u64,
    pub record: RawRecord,
}

impl RowDescriptor {
    pub fn new(row_number: u64, record: RawRecord) -> Self {
        Self { row_number, record }
    }
}

/// One delivery unit: ordered valid records plus the invalid rows produced
/// in the same window, handed to the consumer atomically per batch boundary.
#[derive(Debug)]
pub struct BatchEnvelope<T> {
    pub valid: Vec<T>,
    pub invalid: Vec<RowDescriptor>,
}

impl<T> BatchEnvelope<T> {
    pub(crate) fn new(valid: Vec<T>, invalid: Vec<RowDescriptor>) -> Self {
        Self { valid, invalid }
    }

    /// Combined record count, valid and invalid.
    pub fn len(&self) -> usize {
        self.valid.len() + self.invalid.len()
    }

    pub fn is_empty(&self) -> bool {
        self.valid.is_empty() && self.invalid.is_empty()
    }
}

/// Tabular source formats handled by [`crate::SheetReader`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SheetFormat {
    /// Delimited text (CSV and friends).
    Delimited,
    /// Spreadsheet workbook, first sheet only.
    Spreadsheet,
    /// Legacy fixed-schema binary row file (dBASE).
    Dbf,
}

impl SheetFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            SheetFormat::Delimited => "delimited",
            SheetFormat::Spreadsheet => "spreadsheet",
            SheetFormat::Dbf => "dbf",
        }
    }
}

impl fmt::Display for SheetFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
