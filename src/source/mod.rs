//! Format-specific raw record sources.
//!
//! Each adapter produces a lazy, finite sequence of raw field maps directly
//! from an open file handle, one logical record per call, with only as much
//! look-ahead as the format needs to detect a record boundary. None of them
//! load the whole file into memory up front.

mod dbf;
mod delimited;
mod spreadsheet;

pub use dbf::DbfSource;
pub use delimited::DelimitedSource;
pub use spreadsheet::SpreadsheetSource;

use std::fs::File;
use std::path::Path;

use crate::error::{Result, SheetError};
use crate::models::{RawRecord, SheetFormat};

/// Lazy, finite sequence of raw records read incrementally from a source.
pub trait RawRecordSource {
    /// Produce the next logical record as `(row_number, record)`, or
    /// `None` once the source is exhausted.
    ///
    /// Row numbers are 1-based and refer to the source file, so an invalid
    /// row can be located without re-scanning. After `None` or an error no
    /// further records are produced.
    fn next_record(&mut self) -> Result<Option<(u64, RawRecord)>>;
}

/// Open a source file, mapping a missing path to [`SheetError::SourceNotFound`].
pub(crate) fn open_file(path: &Path, format: SheetFormat) -> Result<File> {
    File::open(path).map_err(|err| {
        if err.kind() == std::io::ErrorKind::NotFound || !path.is_file() {
            SheetError::not_found(path)
        } else {
            SheetError::unreadable(path.display().to_string(), format.as_str(), err.to_string())
        }
    })
}
