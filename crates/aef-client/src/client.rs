use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use aef_backends::{Backend, FileBackend};
use aef_types::Event;

use crate::buffer::{EventBuffer, FlushCallback};
use crate::config::ClientConfig;
use crate::error::Result;

/// Delivery counters for one client.
///
/// Under a reliable backend, `total_flushed + pending = total_emitted`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClientMetrics {
    pub total_emitted: u64,
    pub total_flushed: u64,
    pub total_dropped_overflow: u64,
    pub total_dropped_unrecoverable: u64,
}

#[derive(Default)]
struct Counters {
    emitted: AtomicU64,
    flushed: AtomicU64,
    dropped_unrecoverable: AtomicU64,
}

/// Producer-facing facade over one buffer and one backend.
///
/// `emit` and `emit_many` are fail-safe by contract: a backend failure is
/// retried (for backends without internal retry), then logged and dropped.
/// Nothing a backend does can surface through the emit path, which makes
/// the client safe to install in any agent hot path.
pub struct EventClient {
    buffer: EventBuffer,
    backend: Arc<dyn Backend>,
    counters: Arc<Counters>,
    started: AtomicBool,
}

impl EventClient {
    pub fn new(backend: Arc<dyn Backend>, config: ClientConfig) -> Self {
        let counters = Arc::new(Counters::default());
        let callback = flush_callback(backend.clone(), counters.clone(), &config);
        let buffer = EventBuffer::with_callback(config.buffer.clone(), callback);

        Self {
            buffer,
            backend,
            counters,
            started: AtomicBool::new(false),
        }
    }

    /// Client writing to the environment-resolved JSONL file
    pub fn with_default_backend(config: ClientConfig) -> Self {
        Self::new(Arc::new(FileBackend::from_env()), config)
    }

    /// Launch the periodic flush task. Idempotent.
    pub async fn start(&self) {
        if self.started.swap(true, Ordering::SeqCst) {
            return;
        }
        self.buffer.start();
    }

    /// Stop the buffer (forcing a final flush) and close the backend.
    /// Idempotent.
    pub async fn close(&self) -> Result<()> {
        if !self.started.swap(false, Ordering::SeqCst) {
            return Ok(());
        }
        self.buffer.stop().await?;
        self.backend.close().await?;
        Ok(())
    }

    /// Enqueue one event for delivery, starting the client if needed.
    /// Never fails on backend errors.
    pub async fn emit(&self, event: Event) {
        if !self.is_started() {
            self.start().await;
        }
        self.counters.emitted.fetch_add(1, Ordering::Relaxed);
        if let Err(err) = self.buffer.add(event).await {
            // Unreachable with the fail-safe callback; kept for safety
            tracing::error!(%err, "emit failed to enqueue event");
        }
    }

    /// Enqueue a batch of events, starting the client if needed
    pub async fn emit_many(&self, events: Vec<Event>) {
        if !self.is_started() {
            self.start().await;
        }
        self.counters
            .emitted
            .fetch_add(events.len() as u64, Ordering::Relaxed);
        if let Err(err) = self.buffer.add_many(events).await {
            tracing::error!(%err, "emit_many failed to enqueue events");
        }
    }

    /// Flush all pending events now
    pub async fn flush(&self) -> Result<Vec<Event>> {
        self.buffer.flush().await
    }

    /// Run a future with this client, closing it on the way out regardless
    /// of the outcome
    pub async fn scope<T, Fut>(&self, fut: Fut) -> T
    where
        Fut: Future<Output = T>,
    {
        self.start().await;
        let out = fut.await;
        if let Err(err) = self.close().await {
            tracing::warn!(%err, "failed to close client at scope exit");
        }
        out
    }

    pub fn pending_count(&self) -> usize {
        self.buffer.pending_count()
    }

    pub fn is_started(&self) -> bool {
        self.started.load(Ordering::SeqCst)
    }

    pub fn metrics(&self) -> ClientMetrics {
        ClientMetrics {
            total_emitted: self.counters.emitted.load(Ordering::Relaxed),
            total_flushed: self.counters.flushed.load(Ordering::Relaxed),
            total_dropped_overflow: self.buffer.dropped_overflow(),
            total_dropped_unrecoverable: self
                .counters
                .dropped_unrecoverable
                .load(Ordering::Relaxed),
        }
    }
}

impl Drop for EventClient {
    fn drop(&mut self) {
        if self.is_started() && self.pending_count() > 0 {
            tracing::warn!(
                pending = self.pending_count(),
                "client dropped without close(); pending events lost"
            );
        }
    }
}

/// Write the batch to the backend, fail-safe.
///
/// Transient errors from backends without internal retry are re-attempted
/// up to `max_retry_attempts` total writes. Terminal errors, exhaustion,
/// and any error from a self-retrying backend drop the batch: each event is
/// logged with its id and the reason, and the drop counter advances. The
/// callback itself never fails.
fn flush_callback(
    backend: Arc<dyn Backend>,
    counters: Arc<Counters>,
    config: &ClientConfig,
) -> FlushCallback {
    let max_attempts = config.max_retry_attempts.max(1);
    let backoff = config.retry_backoff;

    Arc::new(move |batch: Vec<Event>| {
        let backend = backend.clone();
        let counters = counters.clone();
        Box::pin(async move {
            let mut attempt = 1;
            loop {
                match backend.write(&batch).await {
                    Ok(()) => {
                        counters
                            .flushed
                            .fetch_add(batch.len() as u64, Ordering::Relaxed);
                        return Ok(());
                    }
                    Err(err)
                        if err.is_retryable()
                            && !backend.retries_writes()
                            && attempt < max_attempts =>
                    {
                        tracing::warn!(attempt, %err, "backend write failed; retrying");
                        tokio::time::sleep(backoff).await;
                        attempt += 1;
                    }
                    Err(err) => {
                        counters
                            .dropped_unrecoverable
                            .fetch_add(batch.len() as u64, Ordering::Relaxed);
                        for event in &batch {
                            tracing::error!(
                                event_id = %event.event_id,
                                reason = %err,
                                "dropping event after delivery failure"
                            );
                        }
                        return Ok(());
                    }
                }
            }
        })
    })
}
