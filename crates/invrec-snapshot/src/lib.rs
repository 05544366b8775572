//! invrec-snapshot
//!
//! Read-only plugin over a JSON export: a file holding an array of flat
//! objects, one per record. Useful as the origin side of a reconciliation
//! when the system of record can only hand over a dump, and for offline diffs.
//!
//! The file is read once on `open`; `close` drops the loaded records.

mod normalizer;
mod source;

pub use normalizer::SnapshotNormalizer;
pub use source::{SnapshotFilters, SnapshotRecord, SnapshotSource, SnapshotStore};

use std::path::PathBuf;
use std::sync::Arc;

use invrec_collection::Collection;
use invrec_config::FieldMaps;

pub type SnapshotCollection = Collection<SnapshotStore, SnapshotNormalizer>;

/// Snapshot-backed collection for the export at `path`.
pub fn snapshot_collection(
    path: impl Into<PathBuf>,
    collection_name: impl Into<String>,
    fields: FieldMaps,
) -> SnapshotCollection {
    let source = Arc::new(SnapshotSource::new(path));
    let store = SnapshotStore::new(source, collection_name);
    Collection::new(Arc::new(store), SnapshotNormalizer::new(fields))
}
