//! Single-pass scanner for one keyed array inside a JSON document.
//!
//! Given a byte stream and a key name, the scanner locates the first
//! occurrence of the key as a quoted literal, positions on the array
//! bound to it, and yields the array's elements one at a time without
//! parsing the rest of the document. Elements are split by tracking
//! bracket depth and string state, so commas and brackets inside nested
//! values or string literals never split an element.
//!
//! Some documents bind the key to a JSON *string* that itself contains
//! an escaped array (`"Rows": "[{\"a\":1}]"`). The scanner detects this
//! wrapped form when the first character inside the string is `[` and
//! transparently unescapes `\"` and `\\` while scanning, treating the
//! unescaped closing quote as end-of-data.
//!
//! A missing key is an empty result, not an error; so is a scalar bound
//! to the key. Real extractions log their outcome at debug level.

use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use serde::de::DeserializeOwned;
use tracing::{debug, info};

use crate::batch::BatchCoordinator;
use crate::error::{Result, SheetError};
use crate::models::{BatchEnvelope, RawRecord, RowDescriptor};

/// Byte offset into the scanned stream, for diagnostics.
#[derive(Debug, Default, Clone, Copy)]
struct ScanCursor {
    offset: u64,
}

impl ScanCursor {
    fn advance(&mut self) {
        self.offset += 1;
    }
}

/// Byte supplier over the underlying reader.
///
/// In plain mode it hands bytes through untouched. Once `unescape` is
/// set (wrapped-string arrays) it resolves `\"` and `\\` and reports
/// the unescaped closing quote as end-of-data.
struct ByteFeed<R: Read> {
    bytes: std::io::Bytes<R>,
    cursor: ScanCursor,
    name: String,
    unescape: bool,
    pending: Option<u8>,
}

impl<R: Read> ByteFeed<R> {
    fn new(reader: R, name: String) -> Self {
        Self {
            bytes: reader.bytes(),
            cursor: ScanCursor::default(),
            name,
            unescape: false,
            pending: None,
        }
    }

    fn next_raw(&mut self) -> Result<Option<u8>> {
        match self.bytes.next() {
            None => Ok(None),
            Some(Ok(byte)) => {
                self.cursor.advance();
                Ok(Some(byte))
            }
            Some(Err(err)) => Err(SheetError::unreadable(&self.name, "json", err.to_string())),
        }
    }

    /// Next byte of array data, `None` at end-of-data.
    fn next_data(&mut self) -> Result<Option<u8>> {
        if let Some(byte) = self.pending.take() {
            return Ok(Some(byte));
        }
        let Some(byte) = self.next_raw()? else {
            return Ok(None);
        };
        if !self.unescape {
            return Ok(Some(byte));
        }
        match byte {
            // An unescaped quote closes the wrapping string.
            b'"' => Ok(None),
            b'\\' => match self.next_raw()? {
                Some(b'"') => Ok(Some(b'"')),
                Some(b'\\') => Ok(Some(b'\\')),
                Some(other) => {
                    self.pending = Some(other);
                    Ok(Some(b'\\'))
                }
                None => Ok(Some(b'\\')),
            },
            _ => Ok(Some(byte)),
        }
    }
}

/// Scanner positioned over one keyed array in a JSON document.
pub struct KeyedArrayScanner<R: Read> {
    feed: ByteFeed<R>,
    key: String,
    done: bool,
}

impl KeyedArrayScanner<BufReader<File>> {
    /// Open a JSON file for scanning.
    pub fn open(path: &Path, key: &str) -> Result<Self> {
        let file = File::open(path).map_err(|err| {
            if err.kind() == std::io::ErrorKind::NotFound {
                SheetError::not_found(path)
            } else {
                SheetError::unreadable(path.display().to_string(), "json", err.to_string())
            }
        })?;
        Ok(Self::new(BufReader::new(file), key, path.display().to_string()))
    }
}

impl<R: Read> KeyedArrayScanner<R> {
    pub fn new(reader: R, key: &str, name: String) -> Self {
        Self {
            feed: ByteFeed::new(reader, name),
            key: key.to_string(),
            done: false,
        }
    }

    /// Advance to the first quoted literal matching the key.
    ///
    /// Returns false if the document ends without the key appearing.
    fn seek_key(&mut self) -> Result<bool> {
        let mut literal: Vec<u8> = Vec::new();
        let mut in_string = false;
        let mut escaped = false;
        while let Some(byte) = self.feed.next_raw()? {
            if in_string {
                if escaped {
                    escaped = false;
                    literal.push(byte);
                } else if byte == b'\\' {
                    escaped = true;
                    literal.push(byte);
                } else if byte == b'"' {
                    in_string = false;
                    if literal == self.key.as_bytes() {
                        debug!(key = %self.key, offset = self.feed.cursor.offset, "located key");
                        return Ok(true);
                    }
                } else {
                    literal.push(byte);
                }
            } else if byte == b'"' {
                in_string = true;
                literal.clear();
            }
        }
        Ok(false)
    }

    /// Advance past the separator to the opening `[` of the value.
    ///
    /// Returns false when the key binds anything other than an array;
    /// that is a clean zero-record end, not an error.
    fn skip_to_value(&mut self) -> Result<bool> {
        while let Some(byte) = self.feed.next_raw()? {
            match byte {
                b':' | b' ' | b'\t' | b'\r' | b'\n' => continue,
                b'[' => return Ok(true),
                b'"' => {
                    // String value; only a wrapped array qualifies.
                    self.feed.unescape = true;
                    return Ok(matches!(self.feed.next_data()?, Some(b'[')));
                }
                _ => return Ok(false),
            }
        }
        Ok(false)
    }

    /// Yield the next array element as its raw JSON text.
    ///
    /// Elements are delimited by depth-zero commas; the depth-zero `]`
    /// ends the array. A stream that ends mid-element drops the partial
    /// element rather than yielding malformed text.
    fn next_element(&mut self) -> Result<Option<String>> {
        if self.done {
            return Ok(None);
        }
        let mut fragment: Vec<u8> = Vec::new();
        let mut depth = 0usize;
        let mut in_string = false;
        let mut escaped = false;

        while let Some(byte) = self.feed.next_data()? {
            if in_string {
                fragment.push(byte);
                if escaped {
                    escaped = false;
                } else if byte == b'\\' {
                    escaped = true;
                } else if byte == b'"' {
                    in_string = false;
                }
                continue;
            }
            match byte {
                b'"' => {
                    in_string = true;
                    fragment.push(byte);
                }
                b'{' | b'[' => {
                    depth += 1;
                    fragment.push(byte);
                }
                b']' if depth == 0 => {
                    self.done = true;
                    return finish_fragment(&self.feed.name, fragment);
                }
                // A closer with nothing open is a format fault, not data.
                b'}' if depth == 0 => {
                    self.done = true;
                    return Err(SheetError::unreadable(
                        &self.feed.name,
                        "json",
                        "unbalanced '}' in array element",
                    ));
                }
                b'}' | b']' => {
                    depth -= 1;
                    fragment.push(byte);
                }
                b',' if depth == 0 => {
                    match finish_fragment(&self.feed.name, fragment)? {
                        Some(element) => return Ok(Some(element)),
                        // Blank slot between commas; keep scanning.
                        None => fragment = Vec::new(),
                    }
                }
                _ => fragment.push(byte),
            }
        }

        // Stream ended before the array closed; the partial tail is dropped.
        self.done = true;
        Ok(None)
    }
}

fn finish_fragment(name: &str, fragment: Vec<u8>) -> Result<Option<String>> {
    let text = String::from_utf8(fragment)
        .map_err(|err| SheetError::unreadable(name, "json", err.to_string()))?;
    let trimmed = text.trim();
    Ok((!trimmed.is_empty()).then(|| trimmed.to_string()))
}

/// Extract the array bound to `key` from a JSON byte stream, delivering
/// deserialized elements in batches of at most `batch_limit`.
///
/// Elements that fail to deserialize into `T` are delivered through the
/// batch's invalid list, carrying their 1-based position in the array.
/// Returns the total number of elements processed; a missing key or a
/// non-array value yields zero.
pub fn extract_keyed_array<T, R, F>(
    reader: R,
    key: &str,
    batch_limit: usize,
    on_batch: F,
) -> Result<u64>
where
    T: DeserializeOwned,
    R: Read,
    F: FnMut(BatchEnvelope<T>) -> bool,
{
    scan(
        KeyedArrayScanner::new(reader, key, "<stream>".to_string()),
        batch_limit,
        on_batch,
    )
}

/// File-path variant of [`extract_keyed_array`].
pub fn extract_keyed_array_from_path<T, F>(
    path: &Path,
    key: &str,
    batch_limit: usize,
    on_batch: F,
) -> Result<u64>
where
    T: DeserializeOwned,
    F: FnMut(BatchEnvelope<T>) -> bool,
{
    scan(KeyedArrayScanner::open(path, key)?, batch_limit, on_batch)
}

fn scan<T, R, F>(mut scanner: KeyedArrayScanner<R>, batch_limit: usize, on_batch: F) -> Result<u64>
where
    T: DeserializeOwned,
    R: Read,
    F: FnMut(BatchEnvelope<T>) -> bool,
{
    if !scanner.seek_key()? {
        info!(key = %scanner.key, "key not present in document");
        return Ok(0);
    }
    if !scanner.skip_to_value()? {
        debug!(key = %scanner.key, "key does not bind an array");
        return Ok(0);
    }

    let mut coordinator = BatchCoordinator::new(batch_limit, on_batch);
    let mut element_index: u64 = 0;
    while let Some(fragment) = scanner.next_element()? {
        element_index += 1;
        let proceed = match serde_json::from_str::<T>(&fragment) {
            Ok(element) => coordinator.push_valid(element),
            Err(err) => {
                debug!(element = element_index, error = %err, "element failed to deserialize");
                coordinator.push_invalid(RowDescriptor::new(
                    element_index,
                    raw_from_fragment(&fragment),
                ))
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
    let total = coordinator.total_processed();
    info!(key = %scanner.key, total, "keyed array extracted");
    Ok(total)
}

/// Recover a field map from a rejected element so the invalid list still
/// carries its content. Non-object elements land under a single key.
fn raw_from_fragment(fragment: &str) -> RawRecord {
    match serde_json::from_str::<serde_json::Value>(fragment) {
        Ok(serde_json::Value::Object(map)) => map
            .into_iter()
            .map(|(key, value)| {
                let text = match value {
                    serde_json::Value::Null => None,
                    serde_json::Value::String(text) => Some(text),
                    other => Some(other.to_string()),
                };
                (key, text)
            })
            .collect(),
        _ => {
            let mut record = RawRecord::new();
            record.insert("element".to_string(), Some(fragment.to_string()));
            record
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn scanner(document: &str, key: &str) -> KeyedArrayScanner<Cursor<Vec<u8>>> {
        KeyedArrayScanner::new(
            Cursor::new(document.as_bytes().to_vec()),
            key,
            "test.json".to_string(),
        )
    }

    fn elements(document: &str, key: &str) -> Vec<String> {
        let mut scanner = scanner(document, key);
        assert!(scanner.seek_key().unwrap());
        assert!(scanner.skip_to_value().unwrap());
        let mut out = Vec::new();
        while let Some(element) = scanner.next_element().unwrap() {
            out.push(element);
        }
        out
    }

    #[test]
    fn test_yields_plain_array_elements() {
        let doc = r#"{"meta": 1, "rows": [{"a": 1}, {"a": 2}], "after": true}"#;
        assert_eq!(elements(doc, "rows"), vec![r#"{"a": 1}"#, r#"{"a": 2}"#]);
    }

    #[test]
    fn test_nested_values_do_not_split_elements() {
        let doc = r#"{"rows": [{"a": [1, 2], "b": {"c": 3}}, {"a": []}]}"#;
        assert_eq!(
            elements(doc, "rows"),
            vec![r#"{"a": [1, 2], "b": {"c": 3}}"#, r#"{"a": []}"#]
        );
    }

    #[test]
    fn test_brackets_inside_strings_are_inert() {
        let doc = r#"{"rows": [{"note": "a,b]"}, {"note": "[x"}]}"#;
        assert_eq!(
            elements(doc, "rows"),
            vec![r#"{"note": "a,b]"}"#, r#"{"note": "[x"}"#]
        );
    }

    #[test]
    fn test_wrapped_string_array_is_unescaped() {
        let doc = r#"{"rows": "[{\"a\": 1}, {\"a\": \"x,y\"}]"}"#;
        assert_eq!(
            elements(doc, "rows"),
            vec![r#"{"a": 1}"#, r#"{"a": "x,y"}"#]
        );
    }

    #[test]
    fn test_missing_key_reports_not_found() {
        let mut scanner = scanner(r#"{"other": [1]}"#, "rows");
        assert!(!scanner.seek_key().unwrap());
    }

    #[test]
    fn test_key_inside_string_value_still_matches_literal() {
        // Any quoted literal equal to the key counts as the key.
        let doc = r#"{"label": "rows", "rows": [1]}"#;
        let mut scanner = scanner(doc, "rows");
        assert!(scanner.seek_key().unwrap());
    }

    #[test]
    fn test_scalar_under_key_yields_no_elements() {
        let mut scanner = scanner(r#"{"rows": 42}"#, "rows");
        assert!(scanner.seek_key().unwrap());
        assert!(!scanner.skip_to_value().unwrap());
    }

    #[test]
    fn test_string_scalar_under_key_yields_no_elements() {
        let mut scanner = scanner(r#"{"rows": "plain text"}"#, "rows");
        assert!(scanner.seek_key().unwrap());
        assert!(!scanner.skip_to_value().unwrap());
    }

    #[test]
    fn test_truncated_array_drops_partial_element() {
        let mut scanner = scanner(r#"{"rows": [{"a": 1}, {"a":"#, "rows");
        assert!(scanner.seek_key().unwrap());
        assert!(scanner.skip_to_value().unwrap());
        assert_eq!(scanner.next_element().unwrap(), Some(r#"{"a": 1}"#.to_string()));
        assert_eq!(scanner.next_element().unwrap(), None);
    }

    #[test]
    fn test_empty_array_yields_nothing() {
        assert!(elements(r#"{"rows": []}"#, "rows").is_empty());
    }

    #[test]
    fn test_stray_close_brace_is_unreadable() {
        let mut scanner = scanner(r#"{"rows": [}]}"#, "rows");
        assert!(scanner.seek_key().unwrap());
        assert!(scanner.skip_to_value().unwrap());
        assert!(matches!(
            scanner.next_element(),
            Err(SheetError::SourceUnreadable { .. })
        ));
    }

    #[test]
    fn test_unbalanced_closer_mid_array_is_unreadable() {
        let doc = r#"{"rows": [{"a": 1}, }]}"#;
        let mut scanner = scanner(doc, "rows");
        assert!(scanner.seek_key().unwrap());
        assert!(scanner.skip_to_value().unwrap());
        assert_eq!(
            scanner.next_element().unwrap(),
            Some(r#"{"a": 1}"#.to_string())
        );
        assert!(scanner.next_element().is_err());
    }

    #[derive(Debug, serde::Deserialize, PartialEq)]
    struct Row {
        a: i64,
    }

    #[test]
    fn test_extract_batches_and_counts() {
        let doc = r#"{"rows": [{"a":1},{"a":2},{"a":3},{"a":4},{"a":5}]}"#;
        let mut sizes = Vec::new();
        let total = extract_keyed_array::<Row, _, _>(
            Cursor::new(doc.as_bytes().to_vec()),
            "rows",
            2,
            |batch| {
                sizes.push(batch.valid.len() + batch.invalid.len());
                true
            },
        )
        .unwrap();
        assert_eq!(total, 5);
        assert_eq!(sizes, vec![2, 2, 1]);
    }

    #[test]
    fn test_invalid_element_carries_position_and_content() {
        let doc = r#"{"rows": [{"a":1},{"a":"bad"},{"a":3}]}"#;
        let mut invalid = Vec::new();
        let total = extract_keyed_array::<Row, _, _>(
            Cursor::new(doc.as_bytes().to_vec()),
            "rows",
            10,
            |batch| {
                invalid.extend(batch.invalid);
                true
            },
        )
        .unwrap();
        assert_eq!(total, 3);
        assert_eq!(invalid.len(), 1);
        assert_eq!(invalid[0].row_number, 2);
        assert_eq!(invalid[0].record["a"], Some("bad".to_string()));
    }

    #[test]
    fn test_malformed_document_surfaces_error() {
        let result = extract_keyed_array::<Row, _, _>(
            Cursor::new(br#"{"rows": [}]}"#.to_vec()),
            "rows",
            10,
            |_batch| true,
        );
        assert!(matches!(result, Err(SheetError::SourceUnreadable { .. })));
    }

    #[test]
    fn test_missing_key_extracts_zero() {
        let total = extract_keyed_array::<Row, _, _>(
            Cursor::new(br#"{"other": 1}"#.to_vec()),
            "rows",
            10,
            |_| panic!("no batches expected"),
        )
        .unwrap();
        assert_eq!(total, 0);
    }
}
