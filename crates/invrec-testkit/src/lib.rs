//! invrec-testkit
//!
//! Deterministic in-memory backend for exercising collections, the diff
//! engine and the apply runner end to end. No network, no files.
//!
//! - [`MemorySource`]: open/close flag with optional login rejection
//! - [`MemoryStore`]: canonical rows keyed by configurable fields, full
//!   create/update/delete, per-key failure and latency injection, in-flight
//!   accounting
//! - [`RowNormalizer`]: pass-through itemization with required fields and
//!   hostname canonicalization

mod memory;

pub use memory::{MemorySource, MemoryStore, StoreCall};

use std::sync::Arc;

use invrec_collection::{normalize_hostname, Capabilities, Collection, NormalizationError, Normalizer};
use invrec_schemas::{CanonicalItem, FieldValue};

/// Itemizes canonical rows: copies every field, canonicalizes `hostname`, and
/// fails rows missing any required field.
#[derive(Debug, Clone, Default)]
pub struct RowNormalizer {
    required: Vec<String>,
}

impl RowNormalizer {
    pub fn requiring<S: Into<String>>(fields: impl IntoIterator<Item = S>) -> Self {
        Self {
            required: fields.into_iter().map(Into::into).collect(),
        }
    }
}

impl Normalizer for RowNormalizer {
    type Record = CanonicalItem;

    fn itemize(&self, row: &CanonicalItem) -> Result<CanonicalItem, NormalizationError> {
        for field in &self.required {
            if !row.contains(field) {
                return Err(NormalizationError::MissingField(field.clone()));
            }
        }
        Ok(row
            .iter()
            .map(|(name, value)| {
                let value = match (name, value) {
                    ("hostname", FieldValue::Str(h)) => FieldValue::Str(normalize_hostname(h)),
                    _ => value.clone(),
                };
                (name.to_string(), value)
            })
            .collect())
    }
}

pub type MemoryCollection = Collection<MemoryStore, RowNormalizer>;

/// Open in-memory device collection keyed by `hostname`, holding `rows`.
pub fn memory_devices(
    name: &str,
    caps: Capabilities,
    rows: Vec<CanonicalItem>,
) -> (Arc<MemoryStore>, MemoryCollection) {
    let source = Arc::new(MemorySource::new(name));
    let store = Arc::new(MemoryStore::new(source, "devices", ["hostname"], caps));
    for row in rows {
        store.seed(row);
    }
    // a fresh source has no login rejection configured
    let _ = store.source_handle().open_now();
    let collection = Collection::new(Arc::clone(&store), RowNormalizer::requiring(["hostname"]));
    (store, collection)
}

/// Device row builder used throughout the scenarios.
pub fn device(host: &str, ip: Option<&str>, site: &str, os_name: &str) -> CanonicalItem {
    CanonicalItem::new()
        .with("hostname", host)
        .with("ipaddr", ip)
        .with("site", site)
        .with("os_name", os_name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn row_normalizer_requires_fields_and_shortens_hostname() {
        let n = RowNormalizer::requiring(["hostname", "site"]);
        let item = n.itemize(&device("SW1.corp", None, "hq", "ios-xe")).unwrap();
        assert_eq!(item.str_field("hostname"), Some("sw1"));
        assert_eq!(item.get("ipaddr"), Some(&FieldValue::Null));

        let err = n
            .itemize(&CanonicalItem::new().with("hostname", "sw1"))
            .unwrap_err();
        assert_eq!(err, NormalizationError::MissingField("site".to_string()));
    }
}
