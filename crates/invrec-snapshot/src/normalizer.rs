use invrec_collection::{normalize_hostname, NormalizationError, Normalizer};
use invrec_config::FieldMaps;
use invrec_schemas::{CanonicalItem, FieldValue};
use serde_json::Value;

use crate::source::SnapshotRecord;

/// Exported object -> canonical item.
///
/// Scalar fields are kept (numbers become their decimal text, `hostname` is
/// put in canonical short form). A field with a `fields.<name>` table is
/// translated through it; values missing from the table pass through as-is.
/// Arrays and objects have no canonical form and fail the record.
#[derive(Debug, Clone, Default)]
pub struct SnapshotNormalizer {
    tables: FieldMaps,
}

impl SnapshotNormalizer {
    pub fn new(tables: FieldMaps) -> Self {
        Self { tables }
    }

    fn translate(&self, field: &str, raw: String) -> String {
        match self.tables.lookup(field, &raw) {
            Some(mapped) => mapped.to_string(),
            None => raw,
        }
    }
}

impl Normalizer for SnapshotNormalizer {
    type Record = SnapshotRecord;

    fn itemize(&self, record: &SnapshotRecord) -> Result<CanonicalItem, NormalizationError> {
        let mut item = CanonicalItem::new();
        for (field, value) in record {
            let v = match value {
                Value::Null => FieldValue::Null,
                Value::Bool(b) => FieldValue::Bool(*b),
                Value::Number(n) => FieldValue::Str(self.translate(field, n.to_string())),
                Value::String(s) if field == "hostname" => {
                    FieldValue::Str(self.translate(field, normalize_hostname(s)))
                }
                Value::String(s) => FieldValue::Str(self.translate(field, s.clone())),
                Value::Array(_) | Value::Object(_) => {
                    return Err(NormalizationError::InvalidField {
                        field: field.clone(),
                        reason: "nested values are not supported".to_string(),
                    })
                }
            };
            item.insert(field.clone(), v);
        }
        Ok(item)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn record(json: &str) -> SnapshotRecord {
        serde_json::from_str(json).unwrap()
    }

    fn tables() -> FieldMaps {
        FieldMaps::new(BTreeMap::from([(
            "os_name".to_string(),
            BTreeMap::from([("iosxe".to_string(), "ios-xe".to_string())]),
        )]))
    }

    #[test]
    fn scalars_are_kept_and_numbers_stringified() {
        let n = SnapshotNormalizer::default();
        let item = n
            .itemize(&record(
                r#"{"hostname": "SW1.corp", "rack": 12, "managed": false, "serial": null}"#,
            ))
            .unwrap();
        assert_eq!(item.str_field("hostname"), Some("sw1"));
        assert_eq!(item.str_field("rack"), Some("12"));
        assert_eq!(item.get("managed"), Some(&FieldValue::Bool(false)));
        assert_eq!(item.get("serial"), Some(&FieldValue::Null));
    }

    #[test]
    fn field_tables_translate_known_values_only() {
        let n = SnapshotNormalizer::new(tables());
        let a = n.itemize(&record(r#"{"os_name": "iosxe"}"#)).unwrap();
        let b = n.itemize(&record(r#"{"os_name": "eos"}"#)).unwrap();
        assert_eq!(a.str_field("os_name"), Some("ios-xe"));
        assert_eq!(b.str_field("os_name"), Some("eos"));
    }

    #[test]
    fn nested_values_fail_the_record() {
        let err = SnapshotNormalizer::default()
            .itemize(&record(r#"{"hostname": "sw1", "tags": ["a"]}"#))
            .unwrap_err();
        assert!(matches!(err, NormalizationError::InvalidField { ref field, .. } if field == "tags"));
    }
}
