use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};

use invrec_collection::{Capabilities, FetchError, RecordStore};
use invrec_source::{Source, SourceError};
use serde_json::{Map, Value};

/// One flat exported object.
pub type SnapshotRecord = Map<String, Value>;

/// Field equality filters: a record is kept when every pair matches.
/// Non-string values compare by their JSON text (`true`, `42`).
pub type SnapshotFilters = BTreeMap<String, String>;

// ---------------------------------------------------------------------------
// Source
// ---------------------------------------------------------------------------

#[derive(Debug)]
pub struct SnapshotSource {
    path: PathBuf,
    records: RwLock<Option<Arc<Vec<SnapshotRecord>>>>,
}

impl SnapshotSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            records: RwLock::new(None),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn loaded(&self) -> Option<Arc<Vec<SnapshotRecord>>> {
        self.records
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    fn set_loaded(&self, records: Option<Arc<Vec<SnapshotRecord>>>) {
        *self
            .records
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = records;
    }
}

fn parse_records(raw: &str) -> Result<Vec<SnapshotRecord>, String> {
    let v: Value = serde_json::from_str(raw).map_err(|e| format!("invalid json: {e}"))?;
    let Value::Array(rows) = v else {
        return Err("expected a top-level array of objects".to_string());
    };
    rows.into_iter()
        .enumerate()
        .map(|(i, row)| match row {
            Value::Object(obj) => Ok(obj),
            _ => Err(format!("element {i} is not an object")),
        })
        .collect()
}

#[async_trait::async_trait]
impl Source for SnapshotSource {
    fn name(&self) -> &str {
        "snapshot"
    }

    async fn open(&self) -> Result<(), SourceError> {
        if self.is_connected() {
            return Ok(());
        }
        let raw = tokio::fs::read_to_string(&self.path).await.map_err(|e| {
            SourceError::Connect(format!("cannot read {}: {e}", self.path.display()))
        })?;
        let records = parse_records(&raw)
            .map_err(|e| SourceError::Connect(format!("{}: {e}", self.path.display())))?;

        tracing::info!(path = %self.path.display(), records = records.len(), "snapshot loaded");
        self.set_loaded(Some(Arc::new(records)));
        Ok(())
    }

    async fn close(&self) {
        self.set_loaded(None);
    }

    fn is_connected(&self) -> bool {
        self.records
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .is_some()
    }
}

// ---------------------------------------------------------------------------
// Store
// ---------------------------------------------------------------------------

/// Read-only store over a [`SnapshotSource`]. Every mutation is unsupported.
pub struct SnapshotStore {
    source: Arc<SnapshotSource>,
    collection_name: String,
}

impl SnapshotStore {
    pub fn new(source: Arc<SnapshotSource>, collection_name: impl Into<String>) -> Self {
        Self {
            source,
            collection_name: collection_name.into(),
        }
    }
}

fn matches(record: &SnapshotRecord, filters: &SnapshotFilters) -> bool {
    filters.iter().all(|(field, want)| match record.get(field) {
        Some(Value::String(s)) => s == want,
        Some(other) => other.to_string() == *want,
        None => false,
    })
}

#[async_trait::async_trait]
impl RecordStore for SnapshotStore {
    type Record = SnapshotRecord;
    type Filters = SnapshotFilters;

    fn collection_name(&self) -> &str {
        &self.collection_name
    }

    fn source(&self) -> &dyn Source {
        self.source.as_ref()
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities::NONE
    }

    async fn list(&self, filters: Option<&SnapshotFilters>) -> Result<Vec<SnapshotRecord>, FetchError> {
        let records = self.source.loaded().ok_or_else(|| FetchError::NotConnected {
            source: self.source.name().to_string(),
        })?;
        Ok(records
            .iter()
            .filter(|r| filters.map_or(true, |f| matches(r, f)))
            .cloned()
            .collect())
    }
}
