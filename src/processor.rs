//! Run driver: wires a raw record source to the mapper, validator and
//! batch coordinator.
//!
//! Each run owns exactly one open file handle, acquired for the duration
//! of the run and released on every exit path. Records are produced,
//! validated and delivered strictly in source order; the pipeline never
//! launches its own workers.

use std::path::Path;

use serde::de::DeserializeOwned;
use tracing::{debug, info};

use crate::batch::BatchCoordinator;
use crate::constants::DEFAULT_BATCH_LIMIT;
use crate::correspondence::FieldCorrespondence;
use crate::error::Result;
use crate::mapper::FieldMapper;
use crate::models::{BatchEnvelope, RowDescriptor, SheetFormat};
use crate::source::{DbfSource, DelimitedSource, RawRecordSource, SpreadsheetSource};

/// Per-run reading options. Constructed fresh for every run; nothing is
/// shared across runs.
#[derive(Debug, Clone)]
pub struct ReadOptions {
    /// Combined (valid + invalid) records per delivered batch.
    pub batch_limit: usize,
    /// Zero-based header row for spreadsheets whose headers are offset.
    pub header_row: usize,
    /// Delimiter override for delimited files.
    pub delimiter: Option<u8>,
    /// Spreadsheet columns whose numeric cells carry a percent style.
    pub percent_columns: Vec<String>,
}

impl Default for ReadOptions {
    fn default() -> Self {
        Self {
            batch_limit: DEFAULT_BATCH_LIMIT,
            header_row: 0,
            delimiter: None,
            percent_columns: Vec::new(),
        }
    }
}

type Validator<T> = Box<dyn Fn(&T) -> bool>;

/// Driver for one tabular source format.
///
/// Opens the format's adapter, maps each raw record into `T`, classifies
/// it through the optional validator, and pages results to the consumer
/// through a [`BatchCoordinator`] until the source is exhausted or the
/// consumer signals stop.
pub struct SheetReader<T> {
    format: SheetFormat,
    options: ReadOptions,
    validator: Option<Validator<T>>,
}

impl<T: DeserializeOwned> SheetReader<T> {
    pub fn new(format: SheetFormat) -> Self {
        Self {
            format,
            options: ReadOptions::default(),
            validator: None,
        }
    }

    pub fn with_options(mut self, options: ReadOptions) -> Self {
        self.options = options;
        self
    }

    pub fn with_batch_limit(mut self, batch_limit: usize) -> Self {
        self.options.batch_limit = batch_limit;
        self
    }

    pub fn with_header_row(mut self, header_row: usize) -> Self {
        self.options.header_row = header_row;
        self
    }

    pub fn with_delimiter(mut self, delimiter: u8) -> Self {
        self.options.delimiter = Some(delimiter);
        self
    }

    pub fn with_percent_columns(mut self, columns: &[&str]) -> Self {
        self.options.percent_columns = columns.iter().map(|c| (*c).to_string()).collect();
        self
    }

    /// Classify mapped records with a pure predicate; records it rejects
    /// land in the invalid list. Without a validator, only type-coercion
    /// failures produce invalid rows.
    pub fn with_validator(mut self, validator: impl Fn(&T) -> bool + 'static) -> Self {
        self.validator = Some(Box::new(validator));
        self
    }

    /// Process the file at `path`, delivering batches to `on_batch` until
    /// the source is exhausted or the consumer returns false.
    ///
    /// Returns the total number of records processed, valid and invalid.
    pub fn read<F>(
        &self,
        path: &Path,
        correspondence: &FieldCorrespondence,
        on_batch: F,
    ) -> Result<u64>
    where
        F: FnMut(BatchEnvelope<T>) -> bool,
    {
        info!(path = %path.display(), format = %self.format, "reading sheet");
        let total = match self.format {
            SheetFormat::Delimited => {
                let source = DelimitedSource::open(path, self.options.delimiter)?;
                self.read_source(source, correspondence, on_batch)?
            }
            SheetFormat::Spreadsheet => {
                let source = SpreadsheetSource::open(
                    path,
                    self.options.header_row,
                    &self.options.percent_columns,
                )?;
                self.read_source(source, correspondence, on_batch)?
            }
            SheetFormat::Dbf => {
                let source = DbfSource::open(path)?;
                self.read_source(source, correspondence, on_batch)?
            }
        };
        info!(path = %path.display(), total, "sheet processed");
        Ok(total)
    }

    /// Drive any raw record source through mapping, validation and
    /// batching. Exposed for callers with their own source adapters.
    pub fn read_source<S, F>(
        &self,
        mut source: S,
        correspondence: &FieldCorrespondence,
        on_batch: F,
    ) -> Result<u64>
    where
        S: RawRecordSource,
        F: FnMut(BatchEnvelope<T>) -> bool,
    {
        let mapper = FieldMapper::new(correspondence);
        let mut coordinator = BatchCoordinator::new(self.options.batch_limit, on_batch);

        while let Some((row_number, raw)) = source.next_record()? {
            let proceed = match mapper.map_record::<T>(&raw) {
                Ok(record) => {
                    let valid = self.validator.as_ref().is_none_or(|validate| validate(&record));
                    if valid {
                        coordinator.push_valid(record)
                    } else {
                        coordinator.push_invalid(RowDescriptor::new(row_number, raw))
                    }
                }
                Err(failure) => {
                    debug!(
                        row = row_number,
                        field = failure.field.as_deref().unwrap_or("<record>"),
                        message = %failure.message,
                        "row failed type mapping"
                    );
                    coordinator.push_invalid(RowDescriptor::new(row_number, raw))
                }
            };
            if !proceed {
                debug!(
                    total = coordinator.total_processed(),
                    "consumer requested stop"
                );
                return Ok(coordinator.total_processed());
            }
        }

        coordinator.finish();
        Ok(coordinator.total_processed())
    }
}
