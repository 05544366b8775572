//! In-memory source and store.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use invrec_collection::{Capabilities, FetchError, MutationError, RecordStore};
use invrec_schemas::{CanonicalItem, IdentityKey, ItemChange};
use invrec_source::{Source, SourceError};

// ---------------------------------------------------------------------------
// Source
// ---------------------------------------------------------------------------

#[derive(Debug)]
pub struct MemorySource {
    name: String,
    open: AtomicBool,
    reject_login: AtomicBool,
    logins: AtomicUsize,
}

impl MemorySource {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            open: AtomicBool::new(false),
            reject_login: AtomicBool::new(false),
            logins: AtomicUsize::new(0),
        }
    }

    /// Make subsequent logins fail with `SourceError::Auth`.
    pub fn reject_logins(&self) {
        self.reject_login.store(true, Ordering::SeqCst);
    }

    pub fn logins(&self) -> usize {
        self.logins.load(Ordering::SeqCst)
    }

    /// Synchronous form of [`Source::open`].
    pub fn open_now(&self) -> Result<(), SourceError> {
        if self.is_connected() {
            return Ok(());
        }
        if self.reject_login.load(Ordering::SeqCst) {
            return Err(SourceError::Auth(format!("{}: credentials rejected", self.name)));
        }
        self.logins.fetch_add(1, Ordering::SeqCst);
        self.open.store(true, Ordering::SeqCst);
        Ok(())
    }

    pub fn close_now(&self) {
        self.open.store(false, Ordering::SeqCst);
    }
}

#[async_trait::async_trait]
impl Source for MemorySource {
    fn name(&self) -> &str {
        &self.name
    }

    async fn open(&self) -> Result<(), SourceError> {
        self.open_now()
    }

    async fn close(&self) {
        self.close_now();
    }

    fn is_connected(&self) -> bool {
        self.open.load(Ordering::SeqCst)
    }
}

// ---------------------------------------------------------------------------
// Store
// ---------------------------------------------------------------------------

/// One mutation call as seen by the store, in arrival order.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StoreCall {
    Create(IdentityKey),
    Update(IdentityKey, BTreeSet<String>),
    Delete(IdentityKey),
}

#[derive(Default)]
struct Faults {
    failing: BTreeSet<IdentityKey>,
    latency: BTreeMap<IdentityKey, Duration>,
}

pub struct MemoryStore {
    source: Arc<MemorySource>,
    collection_name: String,
    key_fields: Vec<String>,
    caps: Capabilities,
    rows: Mutex<BTreeMap<IdentityKey, CanonicalItem>>,
    faults: Mutex<Faults>,
    calls: Mutex<Vec<StoreCall>>,
    in_flight: AtomicUsize,
    peak_in_flight: AtomicUsize,
}

impl MemoryStore {
    pub fn new<S: Into<String>>(
        source: Arc<MemorySource>,
        collection_name: impl Into<String>,
        key_fields: impl IntoIterator<Item = S>,
        caps: Capabilities,
    ) -> Self {
        Self {
            source,
            collection_name: collection_name.into(),
            key_fields: key_fields.into_iter().map(Into::into).collect(),
            caps,
            rows: Mutex::new(BTreeMap::new()),
            faults: Mutex::new(Faults::default()),
            calls: Mutex::new(Vec::new()),
            in_flight: AtomicUsize::new(0),
            peak_in_flight: AtomicUsize::new(0),
        }
    }

    pub fn source_handle(&self) -> &Arc<MemorySource> {
        &self.source
    }

    /// Insert a raw row. Rows without every key field are kept under a
    /// synthetic key so they still come back from `list`.
    pub fn seed(&self, row: CanonicalItem) {
        let mut rows = lock(&self.rows);
        let key = IdentityKey::from_item(&row, self.key_fields.as_slice())
            .unwrap_or_else(|| IdentityKey::single(format!("~unkeyed-{}", rows.len())));
        rows.insert(key, row);
    }

    /// Every mutation for `key` fails with an API error.
    pub fn fail_on(&self, key: IdentityKey) {
        lock(&self.faults).failing.insert(key);
    }

    /// Mutations for `key` take `delay` before resolving.
    pub fn delay_on(&self, key: IdentityKey, delay: Duration) {
        lock(&self.faults).latency.insert(key, delay);
    }

    pub fn rows(&self) -> BTreeMap<IdentityKey, CanonicalItem> {
        lock(&self.rows).clone()
    }

    pub fn calls(&self) -> Vec<StoreCall> {
        lock(&self.calls).clone()
    }

    pub fn peak_in_flight(&self) -> usize {
        self.peak_in_flight.load(Ordering::SeqCst)
    }

    /// Shared prologue of every mutation: record the call, apply latency and
    /// injected failures.
    async fn enter(&self, key: &IdentityKey, call: StoreCall) -> Result<(), MutationError> {
        lock(&self.calls).push(call);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak_in_flight.fetch_max(now, Ordering::SeqCst);

        let (delay, fail) = {
            let faults = lock(&self.faults);
            (faults.latency.get(key).copied(), faults.failing.contains(key))
        };
        if let Some(d) = delay {
            tokio::time::sleep(d).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        if fail {
            return Err(MutationError::Api {
                code: Some(422),
                message: format!("{key} rejected"),
            });
        }
        Ok(())
    }
}

fn lock<T>(m: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[async_trait::async_trait]
impl RecordStore for MemoryStore {
    type Record = CanonicalItem;
    /// Field equality on the raw row.
    type Filters = CanonicalItem;

    fn collection_name(&self) -> &str {
        &self.collection_name
    }

    fn source(&self) -> &dyn Source {
        self.source.as_ref()
    }

    fn capabilities(&self) -> Capabilities {
        self.caps
    }

    async fn list(&self, filters: Option<&CanonicalItem>) -> Result<Vec<CanonicalItem>, FetchError> {
        if !self.source.is_connected() {
            return Err(FetchError::NotConnected {
                source: self.source.name().to_string(),
            });
        }
        let rows = lock(&self.rows);
        Ok(rows
            .values()
            .filter(|row| {
                filters.map_or(true, |f| f.iter().all(|(k, v)| row.get(k) == Some(v)))
            })
            .cloned()
            .collect())
    }

    async fn create(&self, key: &IdentityKey, item: &CanonicalItem) -> Result<(), MutationError> {
        self.enter(key, StoreCall::Create(key.clone())).await?;
        let mut rows = lock(&self.rows);
        if rows.contains_key(key) {
            return Err(MutationError::Api {
                code: Some(409),
                message: format!("{key} already exists"),
            });
        }
        rows.insert(key.clone(), item.clone());
        Ok(())
    }

    async fn update(&self, key: &IdentityKey, change: &ItemChange) -> Result<(), MutationError> {
        self.enter(key, StoreCall::Update(key.clone(), change.fields.clone()))
            .await?;
        let mut rows = lock(&self.rows);
        let Some(row) = rows.get_mut(key) else {
            return Err(MutationError::Api {
                code: Some(404),
                message: format!("{key} not found"),
            });
        };
        for (field, value) in change.desired_values().iter() {
            row.insert(field, value.clone());
        }
        Ok(())
    }

    async fn delete(&self, key: &IdentityKey, _item: &CanonicalItem) -> Result<(), MutationError> {
        self.enter(key, StoreCall::Delete(key.clone())).await?;
        match lock(&self.rows).remove(key) {
            Some(_) => Ok(()),
            None => Err(MutationError::Api {
                code: Some(404),
                message: format!("{key} not found"),
            }),
        }
    }
}
