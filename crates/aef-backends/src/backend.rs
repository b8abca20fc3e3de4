use aef_types::Event;
use async_trait::async_trait;

use crate::error::Result;

/// Uniform write/close contract over event storage.
///
/// A producer-side client holds exactly one backend behind this trait.
/// `write` consumes one batch and either succeeds or fails with an error
/// classified transient/terminal; `close` releases resources and is
/// idempotent, including after a failed write.
#[async_trait]
pub trait Backend: Send + Sync {
    /// Write one batch of events. An empty batch is a no-op.
    async fn write(&self, batch: &[Event]) -> Result<()>;

    /// Release held resources. Safe to call more than once and after a
    /// failed write.
    async fn close(&self) -> Result<()>;

    /// Cheap liveness probe of the underlying storage.
    async fn health_check(&self) -> bool {
        true
    }

    /// Whether this backend retries transient failures internally.
    ///
    /// When true, callers must not wrap `write` in their own retry loop;
    /// the backend is the single source of truth for retry accounting.
    fn retries_writes(&self) -> bool {
        false
    }
}
