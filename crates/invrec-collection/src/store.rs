//! Backend record store contract.
//!
//! A store is implemented once per backend + record type. It knows how to list
//! raw records with backend-specific filters and how to turn canonical items
//! into backend writes. It does **not** normalize; that is the
//! [`Normalizer`](crate::Normalizer)'s job.

use std::fmt;

use invrec_schemas::{CanonicalItem, IdentityKey, ItemChange};
use invrec_source::Source;

use crate::error::{FetchError, MutationError};

// ---------------------------------------------------------------------------
// Operations and capabilities
// ---------------------------------------------------------------------------

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Operation {
    Create,
    Update,
    Delete,
}

impl Operation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::Create => "create",
            Operation::Update => "update",
            Operation::Delete => "delete",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The mutation operations a store actually implements.
///
/// Checked by the apply runner before anything is dispatched.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Capabilities {
    create: bool,
    update: bool,
    delete: bool,
}

impl Capabilities {
    /// Read-only store.
    pub const NONE: Capabilities = Capabilities {
        create: false,
        update: false,
        delete: false,
    };

    pub const ALL: Capabilities = Capabilities {
        create: true,
        update: true,
        delete: true,
    };

    pub const fn with(self, op: Operation) -> Self {
        match op {
            Operation::Create => Capabilities {
                create: true,
                ..self
            },
            Operation::Update => Capabilities {
                update: true,
                ..self
            },
            Operation::Delete => Capabilities {
                delete: true,
                ..self
            },
        }
    }

    pub const fn supports(&self, op: Operation) -> bool {
        match op {
            Operation::Create => self.create,
            Operation::Update => self.update,
            Operation::Delete => self.delete,
        }
    }

    pub fn supported(&self) -> Vec<Operation> {
        [Operation::Create, Operation::Update, Operation::Delete]
            .into_iter()
            .filter(|op| self.supports(*op))
            .collect()
    }
}

// ---------------------------------------------------------------------------
// Store trait
// ---------------------------------------------------------------------------

/// Backend-specific list/create/update/delete for one record type.
///
/// Mutation methods are called concurrently from the apply runner, so
/// implementations must tolerate multiple outstanding requests. Unsupported
/// mutations keep the default body and are left out of
/// [`RecordStore::capabilities`].
#[async_trait::async_trait]
pub trait RecordStore: Send + Sync {
    /// System-native record as returned by the backend.
    type Record: Send + Sync;

    /// Backend-specific fetch filters; passed through unexamined.
    type Filters: Send + Sync;

    /// Record-type name used in logs and errors (e.g. `"devices"`).
    fn collection_name(&self) -> &str;

    /// Connection this store reads and writes through.
    fn source(&self) -> &dyn Source;

    fn capabilities(&self) -> Capabilities;

    /// List raw records. All-or-nothing: on error no records are returned.
    async fn list(&self, filters: Option<&Self::Filters>) -> Result<Vec<Self::Record>, FetchError>;

    async fn create(&self, key: &IdentityKey, item: &CanonicalItem) -> Result<(), MutationError> {
        let _ = (key, item);
        Err(MutationError::Unsupported(Operation::Create))
    }

    async fn update(&self, key: &IdentityKey, change: &ItemChange) -> Result<(), MutationError> {
        let _ = (key, change);
        Err(MutationError::Unsupported(Operation::Update))
    }

    async fn delete(&self, key: &IdentityKey, item: &CanonicalItem) -> Result<(), MutationError> {
        let _ = (key, item);
        Err(MutationError::Unsupported(Operation::Delete))
    }
}
