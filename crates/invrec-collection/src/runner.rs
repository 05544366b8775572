//! Apply/task runner: drives a collection's store mutations with bounded
//! fan-out and reports every item's outcome.
//!
//! Contract:
//! - capability is checked before anything is dispatched;
//! - every dispatched item resolves to exactly one [`MutationOutcome`];
//! - the callback fires as each item completes, not at the end;
//! - one failing item never cancels the others;
//! - `apply` returns only after all items resolved.
//!
//! Items run as futures on the caller's task (cooperative concurrency), so no
//! locking is needed around the report and the store is borrowed, not cloned.
//! Dropping the `apply` future abandons in-flight calls without rollback.

use std::collections::BTreeMap;
use std::fmt;

use futures_util::stream::{self, StreamExt};
use tracing::{debug, info, warn};

use invrec_schemas::{CanonicalItem, IdentityKey, ItemChange};

use crate::collection::Collection;
use crate::error::{MutationError, UnsupportedOperation};
use crate::normalizer::Normalizer;
use crate::store::{Operation, RecordStore};

/// Default bound on concurrently outstanding remote calls.
pub const DEFAULT_MAX_IN_FLIGHT: usize = 10;

// ---------------------------------------------------------------------------
// Outcomes
// ---------------------------------------------------------------------------

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum MutationOutcome {
    Succeeded,
    Failed(String),
}

impl MutationOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, MutationOutcome::Succeeded)
    }
}

impl fmt::Display for MutationOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MutationOutcome::Succeeded => write!(f, "ok"),
            MutationOutcome::Failed(reason) => write!(f, "failed: {reason}"),
        }
    }
}

/// Called once per item as soon as its remote call resolves.
pub type OutcomeCallback<'a> = &'a mut (dyn FnMut(&IdentityKey, &MutationOutcome) + Send);

/// Every item's outcome for one `apply` call.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ApplyReport {
    pub operation: Operation,
    pub outcomes: BTreeMap<IdentityKey, MutationOutcome>,
}

impl ApplyReport {
    fn new(operation: Operation) -> Self {
        Self {
            operation,
            outcomes: BTreeMap::new(),
        }
    }

    pub fn succeeded(&self) -> usize {
        self.outcomes.values().filter(|o| o.is_success()).count()
    }

    pub fn failed(&self) -> usize {
        self.outcomes.len() - self.succeeded()
    }

    pub fn has_failures(&self) -> bool {
        self.failed() > 0
    }

    pub fn failures(&self) -> impl Iterator<Item = (&IdentityKey, &str)> {
        self.outcomes.iter().filter_map(|(k, o)| match o {
            MutationOutcome::Failed(reason) => Some((k, reason.as_str())),
            MutationOutcome::Succeeded => None,
        })
    }
}

// ---------------------------------------------------------------------------
// Batches
// ---------------------------------------------------------------------------

/// A subset of a reconciliation report, tagged with the write it needs.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum MutationBatch {
    Create(BTreeMap<IdentityKey, CanonicalItem>),
    Update(BTreeMap<IdentityKey, ItemChange>),
    Delete(BTreeMap<IdentityKey, CanonicalItem>),
}

impl MutationBatch {
    pub fn operation(&self) -> Operation {
        match self {
            MutationBatch::Create(_) => Operation::Create,
            MutationBatch::Update(_) => Operation::Update,
            MutationBatch::Delete(_) => Operation::Delete,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            MutationBatch::Create(m) | MutationBatch::Delete(m) => m.len(),
            MutationBatch::Update(m) => m.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn into_tasks(self) -> Vec<(IdentityKey, Mutation)> {
        match self {
            MutationBatch::Create(m) => m
                .into_iter()
                .map(|(k, v)| (k, Mutation::Create(v)))
                .collect(),
            MutationBatch::Update(m) => m
                .into_iter()
                .map(|(k, v)| (k, Mutation::Update(v)))
                .collect(),
            MutationBatch::Delete(m) => m
                .into_iter()
                .map(|(k, v)| (k, Mutation::Delete(v)))
                .collect(),
        }
    }
}

enum Mutation {
    Create(CanonicalItem),
    Update(ItemChange),
    Delete(CanonicalItem),
}

async fn dispatch<S: RecordStore>(
    store: &S,
    key: &IdentityKey,
    mutation: &Mutation,
) -> Result<(), MutationError> {
    match mutation {
        Mutation::Create(item) => store.create(key, item).await,
        Mutation::Update(change) => store.update(key, change).await,
        Mutation::Delete(item) => store.delete(key, item).await,
    }
}

// ---------------------------------------------------------------------------
// Runner
// ---------------------------------------------------------------------------

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ApplyRunner {
    max_in_flight: usize,
}

impl Default for ApplyRunner {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_IN_FLIGHT)
    }
}

impl ApplyRunner {
    /// `max_in_flight` of zero is treated as one.
    pub fn new(max_in_flight: usize) -> Self {
        Self {
            max_in_flight: max_in_flight.max(1),
        }
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight
    }

    /// Apply `batch` through `via`'s store.
    ///
    /// Fails with [`UnsupportedOperation`] before dispatching anything when the
    /// store lacks the batch's operation. Otherwise always returns the full
    /// report; per-item failures are inside it.
    pub async fn apply<S, N>(
        &self,
        batch: MutationBatch,
        via: &Collection<S, N>,
        mut callback: Option<OutcomeCallback<'_>>,
    ) -> Result<ApplyReport, UnsupportedOperation>
    where
        S: RecordStore,
        N: Normalizer<Record = S::Record>,
    {
        let op = batch.operation();
        let store = via.store();

        if !store.capabilities().supports(op) {
            return Err(UnsupportedOperation {
                source: store.source().name().to_string(),
                collection: store.collection_name().to_string(),
                operation: op,
            });
        }

        let total = batch.len();
        let mut report = ApplyReport::new(op);

        let mut in_flight = stream::iter(batch.into_tasks())
            .map(|(key, mutation)| async move {
                let result = dispatch(store, &key, &mutation).await;
                (key, result)
            })
            .buffer_unordered(self.max_in_flight);

        while let Some((key, result)) = in_flight.next().await {
            let outcome = match result {
                Ok(()) => {
                    debug!(operation = %op, key = %key, "item applied");
                    MutationOutcome::Succeeded
                }
                Err(e) => {
                    warn!(operation = %op, key = %key, error = %e, "item failed");
                    MutationOutcome::Failed(e.to_string())
                }
            };
            if let Some(cb) = callback.as_deref_mut() {
                cb(&key, &outcome);
            }
            report.outcomes.insert(key, outcome);
        }

        info!(
            source = store.source().name(),
            collection = store.collection_name(),
            operation = %op,
            total,
            succeeded = report.succeeded(),
            failed = report.failed(),
            "apply complete"
        );

        Ok(report)
    }
}
