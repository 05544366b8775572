use std::collections::BTreeMap;
use std::sync::Arc;

use tracing::{debug, warn};

use invrec_schemas::{CanonicalItem, IdentityKey, ItemChange, KeyIndex};
use invrec_source::Source;

use crate::error::{FetchError, NormalizationError, UnsupportedOperation};
use crate::normalizer::Normalizer;
use crate::runner::{ApplyReport, ApplyRunner, MutationBatch, OutcomeCallback};
use crate::store::{Capabilities, RecordStore};

/// Counts from the most recent `make_keys` call.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct KeyStats {
    pub records: usize,
    pub indexed: usize,
    pub dropped: usize,
    pub filtered: usize,
    pub collisions: usize,
}

/// Normalization + mutation boundary for one record type from one source.
///
/// One collection serves one reconciliation pass: fetch, build keys, then
/// optionally apply mutations. The raw buffer and key index are never reused
/// across passes; call [`Collection::clear`] or build a new collection.
pub struct Collection<S, N>
where
    S: RecordStore,
{
    store: Arc<S>,
    normalizer: N,
    runner: ApplyRunner,
    records: Vec<S::Record>,
    keys: KeyIndex,
    stats: KeyStats,
}

impl<S, N> Collection<S, N>
where
    S: RecordStore,
    N: Normalizer<Record = S::Record>,
{
    pub fn new(store: Arc<S>, normalizer: N) -> Self {
        Self {
            store,
            normalizer,
            runner: ApplyRunner::default(),
            records: Vec::new(),
            keys: KeyIndex::default(),
            stats: KeyStats::default(),
        }
    }

    /// Replace the runner used by the mutation entry points.
    pub fn with_runner(mut self, runner: ApplyRunner) -> Self {
        self.runner = runner;
        self
    }

    pub fn name(&self) -> &str {
        self.store.collection_name()
    }

    pub fn source(&self) -> &dyn Source {
        self.store.source()
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn capabilities(&self) -> Capabilities {
        self.store.capabilities()
    }

    // -----------------------------------------------------------------------
    // Read path
    // -----------------------------------------------------------------------

    /// Fetch raw records and append them to the buffer.
    ///
    /// Repeated calls accumulate without deduplication. A failed call leaves
    /// the buffer exactly as it was.
    pub async fn fetch(&mut self, filters: Option<&S::Filters>) -> Result<usize, FetchError> {
        let source = self.store.source();
        if !source.is_connected() {
            return Err(FetchError::NotConnected {
                source: source.name().to_string(),
            });
        }

        let batch = self.store.list(filters).await?;
        let n = batch.len();
        debug!(
            source = source.name(),
            collection = self.store.collection_name(),
            fetched = n,
            "fetch"
        );
        self.records.extend(batch);
        Ok(n)
    }

    pub fn records(&self) -> &[S::Record] {
        &self.records
    }

    /// Drop the raw buffer and key index.
    pub fn clear(&mut self) {
        self.records.clear();
        self.keys = KeyIndex::default();
        self.stats = KeyStats::default();
    }

    pub fn itemize(&self, record: &S::Record) -> Result<CanonicalItem, NormalizationError> {
        self.normalizer.itemize(record)
    }

    /// Rebuild the key index from every buffered record.
    pub fn make_keys(&mut self, key_fields: &[&str]) -> &KeyIndex {
        self.build_keys(key_fields, |_: &mut CanonicalItem| true)
    }

    /// Like [`Collection::make_keys`], keeping only items the filter accepts.
    ///
    /// The filter sees the item mutably and may rewrite fields (e.g. translate
    /// an OS name) before keying.
    pub fn make_keys_with_filter<F>(&mut self, key_fields: &[&str], filter: F) -> &KeyIndex
    where
        F: FnMut(&mut CanonicalItem) -> bool,
    {
        self.build_keys(key_fields, filter)
    }

    fn build_keys<F>(&mut self, key_fields: &[&str], mut filter: F) -> &KeyIndex
    where
        F: FnMut(&mut CanonicalItem) -> bool,
    {
        let mut index = KeyIndex::new(key_fields.iter().copied());
        let mut stats = KeyStats {
            records: self.records.len(),
            ..KeyStats::default()
        };

        for record in &self.records {
            let mut item = match self.normalizer.itemize(record) {
                Ok(item) => item,
                Err(e) => {
                    debug!(collection = self.store.collection_name(), error = %e, "record dropped");
                    stats.dropped += 1;
                    continue;
                }
            };

            if !filter(&mut item) {
                stats.filtered += 1;
                continue;
            }

            let Some(key) = IdentityKey::from_item(&item, key_fields) else {
                let missing = key_fields
                    .iter()
                    .find(|f| item.value_or_null(f).is_null())
                    .copied()
                    .unwrap_or_default();
                let e = NormalizationError::MissingKeyField(missing.to_string());
                debug!(collection = self.store.collection_name(), error = %e, "record dropped");
                stats.dropped += 1;
                continue;
            };

            if index.insert(key.clone(), item).is_some() {
                warn!(
                    collection = self.store.collection_name(),
                    key = %key,
                    "identity key collision; keeping last record"
                );
            }
        }

        stats.indexed = index.len();
        stats.collisions = index.collisions();
        debug!(
            collection = self.store.collection_name(),
            records = stats.records,
            indexed = stats.indexed,
            dropped = stats.dropped,
            filtered = stats.filtered,
            collisions = stats.collisions,
            "make_keys"
        );

        self.keys = index;
        self.stats = stats;
        &self.keys
    }

    pub fn key_index(&self) -> &KeyIndex {
        &self.keys
    }

    pub fn key_stats(&self) -> KeyStats {
        self.stats
    }

    // -----------------------------------------------------------------------
    // Write path
    // -----------------------------------------------------------------------

    pub async fn add_items(
        &self,
        items: BTreeMap<IdentityKey, CanonicalItem>,
        callback: Option<OutcomeCallback<'_>>,
    ) -> Result<ApplyReport, UnsupportedOperation> {
        self.runner
            .apply(MutationBatch::Create(items), self, callback)
            .await
    }

    pub async fn update_items(
        &self,
        items: BTreeMap<IdentityKey, ItemChange>,
        callback: Option<OutcomeCallback<'_>>,
    ) -> Result<ApplyReport, UnsupportedOperation> {
        self.runner
            .apply(MutationBatch::Update(items), self, callback)
            .await
    }

    pub async fn delete_items(
        &self,
        items: BTreeMap<IdentityKey, CanonicalItem>,
        callback: Option<OutcomeCallback<'_>>,
    ) -> Result<ApplyReport, UnsupportedOperation> {
        self.runner
            .apply(MutationBatch::Delete(items), self, callback)
            .await
    }
}
