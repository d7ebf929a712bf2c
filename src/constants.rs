//! Constants for the record extraction pipeline.

/// Default combined batch size (valid + invalid) before a flush.
pub const DEFAULT_BATCH_LIMIT: usize = 1000;

/// 1-based row number of the first data row in sources with a header row.
pub const FIRST_DATA_ROW: u64 = 2;

/// ISO-8601 rendering for date-formatted spreadsheet cells.
pub const ISO_DATE_TIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

/// dBASE file layout constants.
pub mod dbf {
    /// Size of the fixed preamble before the field descriptor array.
    pub const PREAMBLE_LEN: usize = 32;

    /// Size of one field descriptor entry.
    pub const FIELD_DESCRIPTOR_LEN: usize = 32;

    /// Terminator byte closing the field descriptor array.
    pub const HEADER_TERMINATOR: u8 = 0x0d;

    /// Deletion flag marking a record as removed.
    pub const DELETED_MARKER: u8 = b'*';

    /// End-of-data marker after the last record.
    pub const EOF_MARKER: u8 = 0x1a;

    /// Offset of the little-endian u16 total header length.
    pub const HEADER_LEN_OFFSET: usize = 8;

    /// Offset of the little-endian u16 record length.
    pub const RECORD_LEN_OFFSET: usize = 10;

    /// Length of the NUL-padded field name inside a descriptor.
    pub const FIELD_NAME_LEN: usize = 11;

    /// Offset of the field length byte inside a descriptor.
    pub const FIELD_LEN_OFFSET: usize = 16;
}
