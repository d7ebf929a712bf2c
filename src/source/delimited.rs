//! Delimited-text source adapter.
//!
//! Streams one parsed row at a time from a CSV-style file. The parser
//! configuration is constructed fresh for every source, so no settings
//! leak between runs. The header row is consumed at open; data rows are
//! numbered from 2 (the header is row 1).

use std::fs::File;
use std::io::Read;
use std::path::Path;

use tracing::debug;

use super::{RawRecordSource, open_file};
use crate::constants::FIRST_DATA_ROW;
use crate::error::{Result, SheetError};
use crate::models::{RawRecord, SheetFormat};

/// Streaming reader over a delimited text file.
pub struct DelimitedSource<R: Read> {
    reader: csv::Reader<R>,
    headers: Vec<String>,
    record: csv::StringRecord,
    next_row: u64,
    name: String,
}

impl DelimitedSource<File> {
    /// Open a delimited file and read its header row.
    pub fn open(path: &Path, delimiter: Option<u8>) -> Result<Self> {
        let file = open_file(path, SheetFormat::Delimited)?;
        Self::from_reader(file, delimiter, path.display().to_string())
    }
}

impl<R: Read> DelimitedSource<R> {
    /// Wrap an already-open reader holding delimited text.
    pub fn from_reader(reader: R, delimiter: Option<u8>, name: String) -> Result<Self> {
        let mut builder = csv::ReaderBuilder::new();
        builder.has_headers(true).flexible(true);
        if let Some(delimiter) = delimiter {
            builder.delimiter(delimiter);
        }
        let mut reader = builder.from_reader(reader);

        let headers: Vec<String> = reader
            .headers()
            .map_err(|err| unreadable(&name, err))?
            .iter()
            .map(|header| header.trim().to_string())
            .collect();
        debug!(source = %name, columns = headers.len(), "read delimited header row");

        Ok(Self {
            reader,
            headers,
            record: csv::StringRecord::new(),
            next_row: FIRST_DATA_ROW,
            name,
        })
    }
}

impl<R: Read> RawRecordSource for DelimitedSource<R> {
    fn next_record(&mut self) -> Result<Option<(u64, RawRecord)>> {
        let more = self
            .reader
            .read_record(&mut self.record)
            .map_err(|err| unreadable(&self.name, err))?;
        if !more {
            return Ok(None);
        }

        let mut record = RawRecord::with_capacity(self.headers.len());
        for (index, header) in self.headers.iter().enumerate() {
            // Short rows leave trailing columns null; extra fields beyond
            // the header width are dropped.
            let value = self
                .record
                .get(index)
                .map(str::trim)
                .filter(|value| !value.is_empty())
                .map(str::to_string);
            record.insert(header.clone(), value);
        }

        let row_number = self.next_row;
        self.next_row += 1;
        Ok(Some((row_number, record)))
    }
}

fn unreadable(name: &str, err: csv::Error) -> SheetError {
    SheetError::unreadable(name, SheetFormat::Delimited.as_str(), err.to_string())
}
