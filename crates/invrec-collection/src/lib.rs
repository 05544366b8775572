//! invrec-collection
//!
//! The normalization and mutation boundary between one backend record type and
//! the canonical item shape:
//! - [`RecordStore`]: backend list/create/update/delete (plugin-supplied)
//! - [`Normalizer`]: pure raw-record -> canonical-item strategy (plugin-supplied)
//! - [`Collection`]: fetch buffer, key index construction, mutation entry points
//! - [`ApplyRunner`]: bounded concurrent apply with per-item outcomes
//!
//! Fetch and mutations do IO through the store; itemization and key building
//! never do.

mod collection;
mod error;
mod normalizer;
mod runner;
mod store;

#[cfg(test)]
mod test_support;

pub use collection::{Collection, KeyStats};
pub use error::{FetchError, MutationError, NormalizationError, UnsupportedOperation};
pub use normalizer::{normalize_hostname, FnNormalizer, Normalizer};
pub use runner::{
    ApplyReport, ApplyRunner, MutationBatch, MutationOutcome, OutcomeCallback,
    DEFAULT_MAX_IN_FLIGHT,
};
pub use store::{Capabilities, Operation, RecordStore};
