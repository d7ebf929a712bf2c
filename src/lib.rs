//! SheetStream
//!
//! A Rust library for streaming typed records out of tabular files and
//! JSON documents, delivering them to a consumer in bounded batches.
//!
//! This library provides tools for:
//! - Reading delimited text, spreadsheet workbooks, and legacy dBASE files
//!   one record at a time without loading whole files into memory
//! - Mapping raw column values into caller-defined typed records through an
//!   explicit column-to-field correspondence table
//! - Segregating records that fail type mapping or a caller-supplied
//!   validator into an invalid list that keeps their source row numbers
//! - Paging results to a consumer in batches with a configurable size
//!   limit and an early-stop protocol
//! - Extracting one keyed array from a JSON document in a single pass,
//!   including arrays wrapped inside an escaped JSON string
//!
//! ```no_run
//! use serde::Deserialize;
//! use sheetstream::{FieldCorrespondence, SheetFormat, SheetReader};
//!
//! #[derive(Deserialize)]
//! struct Holding {
//!     isin: String,
//!     units: f64,
//! }
//!
//! # fn main() -> sheetstream::Result<()> {
//! let correspondence = FieldCorrespondence::new()
//!     .field("ISIN", "isin")
//!     .field("Units", "units");
//!
//! let total = SheetReader::<Holding>::new(SheetFormat::Delimited)
//!     .with_batch_limit(500)
//!     .read(std::path::Path::new("holdings.csv"), &correspondence, |batch| {
//!         println!("{} valid, {} invalid", batch.valid.len(), batch.invalid.len());
//!         true
//!     })?;
//! println!("processed {total} records");
//! # Ok(())
//! # }
//! ```

pub mod batch;
pub mod constants;
pub mod correspondence;
pub mod error;
pub mod json_scanner;
pub mod mapper;
pub mod models;
pub mod processor;
pub mod source;

// Re-export commonly used types
pub use batch::BatchCoordinator;
pub use correspondence::FieldCorrespondence;
pub use error::{Result, SheetError};
pub use json_scanner::{KeyedArrayScanner, extract_keyed_array, extract_keyed_array_from_path};
pub use mapper::{FieldMapper, MappingFailure};
pub use models::{BatchEnvelope, RawRecord, RowDescriptor, SheetFormat};
pub use processor::{ReadOptions, SheetReader};
pub use source::{DbfSource, DelimitedSource, RawRecordSource, SpreadsheetSource};
