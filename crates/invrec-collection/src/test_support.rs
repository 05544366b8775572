//! In-crate fixtures for unit tests: a toggleable source and a row store
//! with per-key failure and delay injection.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use invrec_schemas::{CanonicalItem, IdentityKey, ItemChange};
use invrec_source::{Source, SourceError};

use crate::error::{FetchError, MutationError, NormalizationError};
use crate::normalizer::{normalize_hostname, FnNormalizer};
use crate::store::{Capabilities, RecordStore};

pub(crate) type Row = BTreeMap<String, String>;

pub(crate) fn row(pairs: &[(&str, &str)]) -> Row {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

pub(crate) struct TestSource {
    open: AtomicBool,
}

#[async_trait::async_trait]
impl Source for TestSource {
    fn name(&self) -> &str {
        "test"
    }

    async fn open(&self) -> Result<(), SourceError> {
        self.open.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn close(&self) {
        self.open.store(false, Ordering::SeqCst);
    }

    fn is_connected(&self) -> bool {
        self.open.load(Ordering::SeqCst)
    }
}

pub(crate) struct TestStore {
    source: TestSource,
    caps: Capabilities,
    pages: Mutex<Vec<Result<Vec<Row>, FetchError>>>,
    fail_hosts: BTreeSet<String>,
    delays_ms: BTreeMap<String, u64>,
    pub(crate) calls: AtomicUsize,
    in_flight: AtomicUsize,
    pub(crate) peak_in_flight: AtomicUsize,
    pub(crate) written: Mutex<Vec<(String, IdentityKey)>>,
}

impl TestStore {
    pub(crate) fn new(caps: Capabilities) -> Self {
        Self {
            source: TestSource {
                open: AtomicBool::new(true),
            },
            caps,
            pages: Mutex::new(Vec::new()),
            fail_hosts: BTreeSet::new(),
            delays_ms: BTreeMap::new(),
            calls: AtomicUsize::new(0),
            in_flight: AtomicUsize::new(0),
            peak_in_flight: AtomicUsize::new(0),
            written: Mutex::new(Vec::new()),
        }
    }

    /// Queue the result of the next `list` call (served in push order).
    pub(crate) fn push_page(&self, page: Result<Vec<Row>, FetchError>) {
        self.pages.lock().unwrap().insert(0, page);
    }

    pub(crate) fn failing(mut self, host: &str) -> Self {
        self.fail_hosts.insert(host.to_string());
        self
    }

    pub(crate) fn delayed(mut self, host: &str, ms: u64) -> Self {
        self.delays_ms.insert(host.to_string(), ms);
        self
    }

    pub(crate) fn disconnected(self) -> Self {
        self.source.open.store(false, Ordering::SeqCst);
        self
    }

    async fn write(&self, op: &str, key: &IdentityKey) -> Result<(), MutationError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak_in_flight.fetch_max(now, Ordering::SeqCst);

        let host = key.values()[0].as_str().unwrap_or_default().to_string();
        if let Some(ms) = self.delays_ms.get(&host) {
            tokio::time::sleep(Duration::from_millis(*ms)).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        if self.fail_hosts.contains(&host) {
            return Err(MutationError::Api {
                code: Some(422),
                message: format!("{host} rejected"),
            });
        }
        self.written
            .lock()
            .unwrap()
            .push((op.to_string(), key.clone()));
        Ok(())
    }
}

#[async_trait::async_trait]
impl RecordStore for TestStore {
    type Record = Row;
    type Filters = ();

    fn collection_name(&self) -> &str {
        "devices"
    }

    fn source(&self) -> &dyn Source {
        &self.source
    }

    fn capabilities(&self) -> Capabilities {
        self.caps
    }

    async fn list(&self, _filters: Option<&()>) -> Result<Vec<Row>, FetchError> {
        self.pages.lock().unwrap().pop().unwrap_or_else(|| Ok(Vec::new()))
    }

    async fn create(&self, key: &IdentityKey, _item: &CanonicalItem) -> Result<(), MutationError> {
        self.write("create", key).await
    }

    async fn update(&self, key: &IdentityKey, _change: &ItemChange) -> Result<(), MutationError> {
        self.write("update", key).await
    }
}

pub(crate) type RowNormalizer =
    FnNormalizer<Row, fn(&Row) -> Result<CanonicalItem, NormalizationError>>;

fn itemize_row(r: &Row) -> Result<CanonicalItem, NormalizationError> {
    let name = r
        .get("name")
        .ok_or_else(|| NormalizationError::MissingField("name".to_string()))?;
    let mut item = CanonicalItem::new().with("hostname", normalize_hostname(name));
    for (k, v) in r.iter().filter(|(k, _)| k.as_str() != "name") {
        item.insert(k.clone(), v.clone());
    }
    Ok(item)
}

pub(crate) fn row_normalizer() -> RowNormalizer {
    FnNormalizer::new(itemize_row as fn(&Row) -> Result<CanonicalItem, NormalizationError>)
}

pub(crate) fn shared(store: TestStore) -> Arc<TestStore> {
    Arc::new(store)
}
