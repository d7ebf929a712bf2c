//! Raw-record to typed-record mapping.
//!
//! Translates one [`RawRecord`] into an instance of the caller's target
//! type, using a [`FieldCorrespondence`] to resolve header names. Columns
//! without a declared field are skipped with a low-severity log, so source
//! files may carry extra columns freely. Type coercion is lenient (string
//! values populate numeric, boolean and optional fields); a value the
//! target type cannot absorb yields a [`MappingFailure`] that the driver
//! turns into an invalid row, never a fatal error.

use serde::de::DeserializeOwned;
use tracing::trace;

use crate::correspondence::FieldCorrespondence;
use crate::models::RawRecord;

/// A single record's raw values could not populate the target type.
///
/// Recovered locally: the driver classifies the row invalid and carries on.
#[derive(Debug, Clone)]
pub struct MappingFailure {
    /// Internal field name implicated, when it can be resolved.
    pub field: Option<String>,
    pub message: String,
}

impl MappingFailure {
    fn from_csv(headers: &csv::StringRecord, err: csv::Error) -> Self {
        let field = match err.kind() {
            csv::ErrorKind::Deserialize { err: de, .. } => de
                .field()
                .and_then(|index| headers.get(index as usize))
                .map(str::to_string),
            _ => None,
        };
        Self {
            field,
            message: err.to_string(),
        }
    }
}

/// Converts raw field maps into typed records for one target type.
pub struct FieldMapper<'a> {
    correspondence: &'a FieldCorrespondence,
}

impl<'a> FieldMapper<'a> {
    pub fn new(correspondence: &'a FieldCorrespondence) -> Self {
        Self { correspondence }
    }

    /// Map one raw record into the target type.
    ///
    /// Null raw values surface as empty fields, which deserialize to
    /// `None` for `Option` targets.
    pub fn map_record<T: DeserializeOwned>(
        &self,
        raw: &RawRecord,
    ) -> std::result::Result<T, MappingFailure> {
        let mut headers = csv::StringRecord::new();
        let mut values = csv::StringRecord::new();

        for (external, value) in raw {
            match self.correspondence.name_for(external) {
                Some(internal) => {
                    headers.push_field(internal);
                    values.push_field(value.as_deref().unwrap_or(""));
                }
                None => trace!(column = %external, "column has no declared field, ignoring"),
            }
        }

        values
            .deserialize(Some(&headers))
            .map_err(|err| MappingFailure::from_csv(&headers, err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Deserialize, PartialEq)]
    struct Profile {
        name: String,
        age: Option<u32>,
        country: Option<String>,
    }

    fn correspondence() -> FieldCorrespondence {
        FieldCorrespondence::from_pairs(&[
            ("Name", "name"),
            ("Age", "age"),
            ("Country", "country"),
        ])
    }

    fn raw(fields: &[(&str, Option<&str>)]) -> RawRecord {
        fields
            .iter()
            .map(|(k, v)| ((*k).to_string(), v.map(str::to_string)))
            .collect()
    }

    #[test]
    fn test_map_record() {
        let table = correspondence();
        let mapper = FieldMapper::new(&table);
        let record = raw(&[
            ("Name", Some("Ada")),
            ("Age", Some("36")),
            ("Country", Some("UK")),
        ]);

        let profile: Profile = mapper.map_record(&record).unwrap();
        assert_eq!(
            profile,
            Profile {
                name: "Ada".to_string(),
                age: Some(36),
                country: Some("UK".to_string()),
            }
        );
    }

    #[test]
    fn test_extra_columns_ignored() {
        let table = correspondence();
        let mapper = FieldMapper::new(&table);
        let record = raw(&[
            ("Name", Some("Ada")),
            ("Age", Some("36")),
            ("Country", Some("UK")),
            ("Unrelated", Some("noise")),
        ]);

        let profile: Profile = mapper.map_record(&record).unwrap();
        assert_eq!(profile.name, "Ada");
    }

    #[test]
    fn test_null_value_maps_to_none() {
        let table = correspondence();
        let mapper = FieldMapper::new(&table);
        let record = raw(&[("Name", Some("Ada")), ("Age", None), ("Country", None)]);

        let profile: Profile = mapper.map_record(&record).unwrap();
        assert_eq!(profile.age, None);
        assert_eq!(profile.country, None);
    }

    #[test]
    fn test_coercion_failure_reports_field() {
        let table = correspondence();
        let mapper = FieldMapper::new(&table);
        let record = raw(&[
            ("Name", Some("Ada")),
            ("Age", Some("not-a-number")),
            ("Country", Some("UK")),
        ]);

        let failure = mapper.map_record::<Profile>(&record).unwrap_err();
        assert_eq!(failure.field.as_deref(), Some("age"));
    }
}
