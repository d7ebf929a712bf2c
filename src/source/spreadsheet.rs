//! Spreadsheet (workbook) source adapter.
//!
//! Reads the first worksheet of a workbook, with an optional header row
//! offset for files whose column headers sit below the first row. Cell
//! values are coerced to strings here, in this adapter only:
//!
//! - date-formatted numeric cells render as ISO-8601 date-time strings;
//! - numeric cells in declared percent columns are multiplied by 100;
//! - all other numerics render with zero decimal digits and never in
//!   scientific notation, so large identifiers survive exactly;
//! - string and boolean cells pass through natively.
//!
//! Formula cells arrive as their cached results, so they coerce like any
//! plain value. Workbook readers expose no per-cell number-format styles,
//! so percent columns are declared explicitly in
//! [`crate::ReadOptions::percent_columns`].
//!
//! Unlike the other adapters, the first worksheet is materialized in full
//! at open: the workbook format offers no row-at-a-time reading. Records
//! are still handed out one per call from the in-memory range.

use std::collections::HashSet;
use std::path::Path;

use calamine::{Data, Range, Reader, open_workbook_auto};
use tracing::debug;

use super::RawRecordSource;
use crate::constants::ISO_DATE_TIME_FORMAT;
use crate::error::{Result, SheetError};
use crate::models::{RawRecord, SheetFormat};

/// Row-at-a-time reader over the first sheet of a workbook.
pub struct SpreadsheetSource {
    range: Range<Data>,
    headers: Vec<Option<String>>,
    percent_columns: HashSet<String>,
    cursor: usize,
    height: usize,
}

impl SpreadsheetSource {
    /// Open a workbook and position on the first sheet.
    ///
    /// `header_row` is the zero-based row holding the column headers;
    /// data rows start immediately below it.
    pub fn open(path: &Path, header_row: usize, percent_columns: &[String]) -> Result<Self> {
        if !path.is_file() {
            return Err(SheetError::not_found(path));
        }
        let name = path.display().to_string();

        let mut workbook =
            open_workbook_auto(path).map_err(|err| unreadable(&name, err.to_string()))?;
        let range = workbook
            .worksheet_range_at(0)
            .ok_or_else(|| unreadable(&name, "workbook has no sheets".to_string()))?
            .map_err(|err| unreadable(&name, err.to_string()))?;

        let height = range.height();
        if header_row >= height {
            return Err(unreadable(
                &name,
                format!("header row {header_row} is past the sheet end ({height} rows)"),
            ));
        }

        let headers: Vec<Option<String>> = (0..range.width())
            .map(|column| {
                range
                    .get((header_row, column))
                    .map(|cell| cell.to_string().trim().to_string())
                    .filter(|header| !header.is_empty())
            })
            .collect();
        debug!(
            source = %name,
            columns = headers.iter().filter(|h| h.is_some()).count(),
            rows = height,
            "opened first worksheet"
        );

        Ok(Self {
            range,
            headers,
            percent_columns: percent_columns.iter().cloned().collect(),
            cursor: header_row + 1,
            height,
        })
    }
}

impl RawRecordSource for SpreadsheetSource {
    fn next_record(&mut self) -> Result<Option<(u64, RawRecord)>> {
        if self.cursor >= self.height {
            return Ok(None);
        }
        let row_index = self.cursor;
        self.cursor += 1;

        let mut record = RawRecord::with_capacity(self.headers.len());
        for (column, header) in self.headers.iter().enumerate() {
            let Some(header) = header else { continue };
            let percent = self.percent_columns.contains(header);
            let value = self
                .range
                .get((row_index, column))
                .and_then(|cell| coerce_cell(cell, percent));
            record.insert(header.clone(), value);
        }

        Ok(Some(((row_index + 1) as u64, record)))
    }
}

/// Coerce one cell to its raw string form, `None` for empty/error cells.
fn coerce_cell(cell: &Data, percent: bool) -> Option<String> {
    match cell {
        Data::Empty | Data::Error(_) => None,
        Data::String(text) => {
            let trimmed = text.trim();
            (!trimmed.is_empty()).then(|| trimmed.to_string())
        }
        Data::Bool(value) => Some(value.to_string()),
        Data::Int(value) => Some(if percent {
            render_decimal(*value as f64 * 100.0)
        } else {
            value.to_string()
        }),
        Data::Float(value) => Some(if percent {
            render_decimal(value * 100.0)
        } else {
            format!("{value:.0}")
        }),
        Data::DateTime(value) => value
            .as_datetime()
            .map(|datetime| datetime.format(ISO_DATE_TIME_FORMAT).to_string()),
        Data::DateTimeIso(text) | Data::DurationIso(text) => Some(text.clone()),
    }
}

/// Render a percent-scaled value without float noise or an exponent.
fn render_decimal(value: f64) -> String {
    if value == value.trunc() {
        format!("{value:.0}")
    } else {
        let text = format!("{value:.6}");
        text.trim_end_matches('0').trim_end_matches('.').to_string()
    }
}

fn unreadable(name: &str, reason: String) -> SheetError {
    SheetError::unreadable(name, SheetFormat::Spreadsheet.as_str(), reason)
}
