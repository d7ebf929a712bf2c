//! Legacy binary (dBASE) source adapter.
//!
//! dBASE files carry their fixed schema in the file header: a 32-byte
//! preamble holding the header and record lengths, then one 32-byte
//! descriptor per field up to a 0x0D terminator. Records follow as
//! fixed-width rows prefixed by a one-byte deletion flag; 0x1A marks
//! end-of-data. The reader streams one row per call, skipping deleted
//! rows, and never buffers more than a single record.

use std::fs::File;
use std::io::{BufReader, ErrorKind, Read};
use std::path::Path;

use tracing::debug;

use super::{RawRecordSource, open_file};
use crate::constants::dbf;
use crate::error::{Result, SheetError};
use crate::models::{RawRecord, SheetFormat};

#[derive(Debug, Clone)]
struct DbfField {
    name: String,
    length: usize,
}

/// Streaming reader over a dBASE row file.
pub struct DbfSource<R: Read> {
    reader: R,
    fields: Vec<DbfField>,
    row_buf: Vec<u8>,
    next_row: u64,
    name: String,
    done: bool,
}

impl DbfSource<BufReader<File>> {
    /// Open a dBASE file and parse its schema header.
    pub fn open(path: &Path) -> Result<Self> {
        let file = open_file(path, SheetFormat::Dbf)?;
        Self::from_reader(BufReader::new(file), path.display().to_string())
    }
}

impl<R: Read> DbfSource<R> {
    /// Wrap an already-open reader positioned at the start of a dBASE file.
    pub fn from_reader(mut reader: R, name: String) -> Result<Self> {
        let mut preamble = [0u8; dbf::PREAMBLE_LEN];
        reader
            .read_exact(&mut preamble)
            .map_err(|err| unreadable(&name, format!("truncated header: {err}")))?;

        let header_len = u16::from_le_bytes([
            preamble[dbf::HEADER_LEN_OFFSET],
            preamble[dbf::HEADER_LEN_OFFSET + 1],
        ]) as usize;
        let record_len = u16::from_le_bytes([
            preamble[dbf::RECORD_LEN_OFFSET],
            preamble[dbf::RECORD_LEN_OFFSET + 1],
        ]) as usize;
        if record_len == 0 {
            return Err(unreadable(&name, "record length is zero".to_string()));
        }

        let mut fields = Vec::new();
        let mut consumed = dbf::PREAMBLE_LEN;
        loop {
            let mut first = [0u8; 1];
            reader
                .read_exact(&mut first)
                .map_err(|err| unreadable(&name, format!("truncated field descriptors: {err}")))?;
            consumed += 1;
            if first[0] == dbf::HEADER_TERMINATOR {
                break;
            }

            let mut rest = [0u8; dbf::FIELD_DESCRIPTOR_LEN - 1];
            reader
                .read_exact(&mut rest)
                .map_err(|err| unreadable(&name, format!("truncated field descriptor: {err}")))?;
            consumed += rest.len();

            let mut name_bytes = [0u8; dbf::FIELD_NAME_LEN];
            name_bytes[0] = first[0];
            name_bytes[1..].copy_from_slice(&rest[..dbf::FIELD_NAME_LEN - 1]);
            let name_end = name_bytes
                .iter()
                .position(|&byte| byte == 0)
                .unwrap_or(name_bytes.len());
            let field_name = latin1(&name_bytes[..name_end]).trim().to_string();
            let length = rest[dbf::FIELD_LEN_OFFSET - 1] as usize;
            fields.push(DbfField {
                name: field_name,
                length,
            });

            if consumed >= header_len {
                return Err(unreadable(
                    &name,
                    "field descriptors overrun the declared header length".to_string(),
                ));
            }
        }
        if fields.is_empty() {
            return Err(unreadable(&name, "no field descriptors".to_string()));
        }

        let fields_len: usize = fields.iter().map(|field| field.length).sum();
        if fields_len + 1 > record_len {
            return Err(unreadable(
                &name,
                format!("field lengths ({fields_len}) exceed the record length ({record_len})"),
            ));
        }

        // Some writers pad the header past the terminator; skip to the data.
        if header_len > consumed {
            let mut padding = vec![0u8; header_len - consumed];
            reader
                .read_exact(&mut padding)
                .map_err(|err| unreadable(&name, format!("truncated header padding: {err}")))?;
        }

        debug!(source = %name, fields = fields.len(), record_len, "parsed dbf schema");

        Ok(Self {
            reader,
            fields,
            row_buf: vec![0u8; record_len - 1],
            next_row: 1,
            name,
            done: false,
        })
    }
}

impl<R: Read> RawRecordSource for DbfSource<R> {
    fn next_record(&mut self) -> Result<Option<(u64, RawRecord)>> {
        if self.done {
            return Ok(None);
        }
        loop {
            let mut flag = [0u8; 1];
            match self.reader.read_exact(&mut flag) {
                Ok(()) => {}
                Err(err) if err.kind() == ErrorKind::UnexpectedEof => {
                    self.done = true;
                    return Ok(None);
                }
                Err(err) => return Err(unreadable(&self.name, err.to_string())),
            }
            if flag[0] == dbf::EOF_MARKER {
                self.done = true;
                return Ok(None);
            }

            self.reader
                .read_exact(&mut self.row_buf)
                .map_err(|err| unreadable(&self.name, format!("truncated record: {err}")))?;
            if flag[0] == dbf::DELETED_MARKER {
                continue;
            }

            let mut record = RawRecord::with_capacity(self.fields.len());
            let mut offset = 0;
            for field in &self.fields {
                let raw = &self.row_buf[offset..offset + field.length];
                offset += field.length;
                let text = latin1(raw);
                let trimmed = text.trim();
                record.insert(
                    field.name.clone(),
                    (!trimmed.is_empty()).then(|| trimmed.to_string()),
                );
            }

            let row_number = self.next_row;
            self.next_row += 1;
            return Ok(Some((row_number, record)));
        }
    }
}

fn latin1(bytes: &[u8]) -> String {
    bytes.iter().map(|&byte| byte as char).collect()
}

fn unreadable(name: &str, reason: String) -> SheetError {
    SheetError::unreadable(name, SheetFormat::Dbf.as_str(), reason)
}
