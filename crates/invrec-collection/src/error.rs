//! Error taxonomy for the collection boundary.
//!
//! Propagation policy:
//! - [`FetchError`] and [`UnsupportedOperation`] are structural and abort the
//!   current pass.
//! - [`NormalizationError`] is per record; `make_keys` turns it into a skip.
//! - [`MutationError`] is per item; the apply runner folds it into a
//!   `MutationOutcome` and never returns it.

use std::fmt;

use crate::store::Operation;

// ---------------------------------------------------------------------------
// Fetch
// ---------------------------------------------------------------------------

/// A read against the backend failed. Nothing from the failed call is kept.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchError {
    /// The collection's source has not been opened.
    NotConnected { source: String },
    /// Network, transport or timeout failure.
    Transport(String),
    /// The backend answered with an application-level error.
    Api { code: Option<u16>, message: String },
    /// A response payload could not be decoded.
    Decode(String),
}

impl fmt::Display for FetchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FetchError::NotConnected { source } => {
                write!(f, "fetch error: source '{source}' is not connected")
            }
            FetchError::Transport(msg) => write!(f, "fetch error: transport: {msg}"),
            FetchError::Api {
                code: Some(c),
                message,
            } => write!(f, "fetch error: api status={c}: {message}"),
            FetchError::Api {
                code: None,
                message,
            } => write!(f, "fetch error: api: {message}"),
            FetchError::Decode(msg) => write!(f, "fetch error: decode: {msg}"),
        }
    }
}

impl std::error::Error for FetchError {}

// ---------------------------------------------------------------------------
// Normalization
// ---------------------------------------------------------------------------

/// A single raw record could not be turned into a canonical item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NormalizationError {
    /// A field the normalizer needs is absent from the raw record.
    MissingField(String),
    /// A field is present but has an unusable shape or value.
    InvalidField { field: String, reason: String },
    /// A lookup table has no entry for the raw value.
    Unmapped { table: String, value: String },
    /// An identity-key field is absent or null on the itemized record.
    MissingKeyField(String),
}

impl fmt::Display for NormalizationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NormalizationError::MissingField(field) => {
                write!(f, "required field '{field}' is missing")
            }
            NormalizationError::InvalidField { field, reason } => {
                write!(f, "field '{field}' is invalid: {reason}")
            }
            NormalizationError::Unmapped { table, value } => {
                write!(f, "no '{table}' mapping for value '{value}'")
            }
            NormalizationError::MissingKeyField(field) => {
                write!(f, "identity key field '{field}' is missing or null")
            }
        }
    }
}

impl std::error::Error for NormalizationError {}

// ---------------------------------------------------------------------------
// Mutation
// ---------------------------------------------------------------------------

/// One item's create/update/delete call failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MutationError {
    /// Network, transport or timeout failure.
    Transport(String),
    /// The backend rejected the write.
    Api { code: Option<u16>, message: String },
    /// The canonical item could not be translated into a backend payload.
    Payload(String),
    /// The store does not implement this operation.
    Unsupported(Operation),
}

impl fmt::Display for MutationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MutationError::Transport(msg) => write!(f, "transport error: {msg}"),
            MutationError::Api {
                code: Some(c),
                message,
            } => write!(f, "api error status={c}: {message}"),
            MutationError::Api {
                code: None,
                message,
            } => write!(f, "api error: {message}"),
            MutationError::Payload(msg) => write!(f, "payload error: {msg}"),
            MutationError::Unsupported(op) => write!(f, "{op} is not supported"),
        }
    }
}

impl std::error::Error for MutationError {}

// ---------------------------------------------------------------------------
// Capability check
// ---------------------------------------------------------------------------

/// A mutation was requested that the collection does not support.
///
/// Raised before any item is dispatched, so nothing was written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnsupportedOperation {
    pub source: String,
    pub collection: String,
    pub operation: Operation,
}

impl fmt::Display for UnsupportedOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "unsupported operation: {} on {}/{} (nothing dispatched)",
            self.operation, self.source, self.collection
        )
    }
}

impl std::error::Error for UnsupportedOperation {}
