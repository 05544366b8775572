//! Source boundary: one authenticated connection to a system of record.
//!
//! This crate defines **only** the lifecycle trait and its error type.
//! No record shapes, no normalization, no HTTP; concrete sources live in the
//! plugin crates (`invrec-clearpass`, `invrec-snapshot`).
//!
//! No retries happen here. A failed `open` surfaces immediately and the caller
//! owns retry policy.

use std::fmt;
use std::sync::Arc;

// ---------------------------------------------------------------------------
// Error type
// ---------------------------------------------------------------------------

/// Errors a [`Source`] may return from [`Source::open`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceError {
    /// Network, transport or timeout failure reaching the backend.
    Connect(String),
    /// The backend rejected the supplied credentials.
    Auth(String),
}

impl fmt::Display for SourceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceError::Connect(msg) => write!(f, "connect error: {msg}"),
            SourceError::Auth(msg) => write!(f, "auth error: {msg}"),
        }
    }
}

impl std::error::Error for SourceError {}

// ---------------------------------------------------------------------------
// Source trait
// ---------------------------------------------------------------------------

/// Connection lifecycle of one backend system.
///
/// Methods take `&self`: a source is shared (behind `Arc`) by the collection
/// that fetches through it and by every in-flight mutation task, so
/// implementations keep their connection state behind interior mutability and
/// must tolerate concurrent outstanding requests.
#[async_trait::async_trait]
pub trait Source: Send + Sync {
    /// Human-readable name identifying this backend (e.g. `"clearpass"`).
    fn name(&self) -> &str;

    /// Establish or refresh authentication.
    ///
    /// Calling this on an already open source is a no-op.
    async fn open(&self) -> Result<(), SourceError>;

    /// Release the connection. Safe on an unopened or already closed source.
    async fn close(&self);

    /// Current transport state. Must answer without performing IO.
    fn is_connected(&self) -> bool;
}

#[async_trait::async_trait]
impl<T: Source + ?Sized> Source for Arc<T> {
    fn name(&self) -> &str {
        (**self).name()
    }

    async fn open(&self) -> Result<(), SourceError> {
        (**self).open().await
    }

    async fn close(&self) {
        (**self).close().await
    }

    fn is_connected(&self) -> bool {
        (**self).is_connected()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    /// Minimal in-process source counting real logins.
    struct MockSource {
        open: AtomicBool,
        logins: AtomicUsize,
        reject: bool,
    }

    impl MockSource {
        fn new(reject: bool) -> Self {
            Self {
                open: AtomicBool::new(false),
                logins: AtomicUsize::new(0),
                reject,
            }
        }
    }

    #[async_trait::async_trait]
    impl Source for MockSource {
        fn name(&self) -> &str {
            "mock"
        }

        async fn open(&self) -> Result<(), SourceError> {
            if self.is_connected() {
                return Ok(());
            }
            if self.reject {
                return Err(SourceError::Auth("bad client secret".to_string()));
            }
            self.logins.fetch_add(1, Ordering::SeqCst);
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

    #[tokio::test]
    async fn open_is_idempotent() {
        let src = MockSource::new(false);
        src.open().await.unwrap();
        src.open().await.unwrap();
        assert!(src.is_connected());
        assert_eq!(src.logins.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn close_on_unopened_source_is_noop() {
        let src = MockSource::new(false);
        src.close().await;
        src.close().await;
        assert!(!src.is_connected());
    }

    #[tokio::test]
    async fn auth_failure_leaves_source_closed() {
        let src = MockSource::new(true);
        let err = src.open().await.unwrap_err();
        assert_eq!(err, SourceError::Auth("bad client secret".to_string()));
        assert!(!src.is_connected());
    }

    #[tokio::test]
    async fn arc_dyn_source_delegates() {
        let src: Arc<dyn Source> = Arc::new(MockSource::new(false));
        src.open().await.unwrap();
        assert_eq!(src.name(), "mock");
        assert!(src.is_connected());
    }

    #[test]
    fn source_error_display() {
        assert_eq!(
            SourceError::Connect("connection refused".to_string()).to_string(),
            "connect error: connection refused"
        );
        assert_eq!(
            SourceError::Auth("invalid_client".to_string()).to_string(),
            "auth error: invalid_client"
        );
    }
}
