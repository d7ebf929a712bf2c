//! Header-name to field-name correspondence tables.
//!
//! A [`FieldCorrespondence`] maps the external header or key names found in
//! a source file to the internal field names of one target record type. It
//! is built explicitly, once per type, and stays read-only for the duration
//! of a run; it may be cached and shared across runs for the same type.

use std::collections::HashMap;

/// External-header to internal-field lookup table for one target type.
#[derive(Debug, Clone, Default)]
pub struct FieldCorrespondence {
    fields: HashMap<String, String>,
}

impl FieldCorrespondence {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare one header-to-field pair.
    pub fn field(mut self, external: impl Into<String>, internal: impl Into<String>) -> Self {
        self.fields.insert(external.into(), internal.into());
        self
    }

    /// Build a table from `(external, internal)` pairs.
    pub fn from_pairs(pairs: &[(&str, &str)]) -> Self {
        let mut table = Self::new();
        for (external, internal) in pairs {
            table.fields.insert((*external).to_string(), (*internal).to_string());
        }
        table
    }

    /// Internal field name for an external header, if declared.
    pub fn name_for(&self, external: &str) -> Option<&str> {
        self.fields.get(external).map(String::as_str)
    }

    pub fn has_header(&self, external: &str) -> bool {
        self.fields.contains_key(external)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup() {
        let table = FieldCorrespondence::new()
            .field("Scheme Name", "scheme_name")
            .field("IFSC", "ifsc");

        assert_eq!(table.name_for("Scheme Name"), Some("scheme_name"));
        assert_eq!(table.name_for("IFSC"), Some("ifsc"));
        assert_eq!(table.name_for("Unknown Column"), None);
        assert!(table.has_header("IFSC"));
        assert_eq!(table.len(), 2);
    }

    #[test]
    fn test_from_pairs() {
        let table = FieldCorrespondence::from_pairs(&[("A", "a"), ("B", "b")]);
        assert_eq!(table.name_for("A"), Some("a"));
        assert_eq!(table.name_for("B"), Some("b"));
        assert!(!table.is_empty());
    }
}
