use std::collections::VecDeque;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use aef_types::Event;
use tokio::sync::Notify;
use tokio::task::JoinHandle;

use crate::config::BufferConfig;
use crate::error::Result;

/// Callback invoked with each drained batch
pub type FlushCallback =
    Arc<dyn Fn(Vec<Event>) -> Pin<Box<dyn Future<Output = Result<()>> + Send>> + Send + Sync>;

/// Bounded in-memory queue with size- and time-triggered flushing.
///
/// The queue mutex is only ever held for pending-count reads, inserts and
/// the drain at the start of a flush; it is never held across the flush
/// callback. A separate async gate makes flushes mutually exclusive, so the
/// final flush in [`EventBuffer::stop`] serializes behind any in-flight
/// periodic flush.
pub struct EventBuffer {
    inner: Arc<BufferInner>,
    task: Mutex<Option<JoinHandle<()>>>,
}

struct BufferInner {
    config: BufferConfig,
    queue: Mutex<VecDeque<Event>>,
    on_flush: Option<FlushCallback>,
    flush_gate: tokio::sync::Mutex<()>,
    shutdown: Notify,
    dropped_overflow: AtomicU64,
}

impl EventBuffer {
    pub fn new(config: BufferConfig) -> Self {
        Self::build(config, None)
    }

    pub fn with_callback(config: BufferConfig, on_flush: FlushCallback) -> Self {
        Self::build(config, Some(on_flush))
    }

    fn build(config: BufferConfig, on_flush: Option<FlushCallback>) -> Self {
        Self {
            inner: Arc::new(BufferInner {
                config,
                queue: Mutex::new(VecDeque::new()),
                on_flush,
                flush_gate: tokio::sync::Mutex::new(()),
                shutdown: Notify::new(),
                dropped_overflow: AtomicU64::new(0),
            }),
            task: Mutex::new(None),
        }
    }

    /// Enqueue one event, flushing inline once `flush_size` is reached
    pub async fn add(&self, event: Event) -> Result<()> {
        self.inner.add(event).await
    }

    /// Enqueue a batch. Equivalent to repeated `add`: a flush triggers
    /// mid-sequence as soon as the threshold is crossed.
    pub async fn add_many(&self, events: Vec<Event>) -> Result<()> {
        for event in events {
            self.inner.add(event).await?;
        }
        Ok(())
    }

    /// Drain pending events and hand them to the callback.
    ///
    /// On callback failure the drained events are put back at the head of
    /// the queue in their original order and the error is surfaced.
    pub async fn flush(&self) -> Result<Vec<Event>> {
        self.inner.flush().await
    }

    /// Launch the periodic flush task. Idempotent.
    pub fn start(&self) {
        let mut task = self.task.lock().unwrap();
        if task.is_some() {
            return;
        }
        let inner = self.inner.clone();
        *task = Some(tokio::spawn(async move { inner.run_periodic().await }));
    }

    /// Halt the periodic task and perform one final flush. Idempotent.
    pub async fn stop(&self) -> Result<Vec<Event>> {
        let handle = self.task.lock().unwrap().take();
        if let Some(handle) = handle {
            self.inner.shutdown.notify_one();
            if let Err(err) = handle.await {
                tracing::warn!(%err, "periodic flush task ended abnormally");
            }
        }
        self.inner.flush().await
    }

    pub fn pending_count(&self) -> usize {
        self.inner.queue.lock().unwrap().len()
    }

    pub fn is_running(&self) -> bool {
        self.task.lock().unwrap().is_some()
    }

    /// Whether the size trigger has been reached
    pub fn should_flush(&self) -> bool {
        self.pending_count() >= self.inner.config.flush_size
    }

    /// Events evicted by the overflow policy so far
    pub fn dropped_overflow(&self) -> u64 {
        self.inner.dropped_overflow.load(Ordering::Relaxed)
    }
}

impl BufferInner {
    async fn add(&self, event: Event) -> Result<()> {
        let should_flush = {
            let mut queue = self.queue.lock().unwrap();

            if self.config.max_capacity == 0 {
                // Degenerate configuration: nothing can be held
                self.dropped_overflow.fetch_add(1, Ordering::Relaxed);
                return Ok(());
            }

            if queue.len() >= self.config.max_capacity {
                let drop_count = (self.config.max_capacity / 10).clamp(1, queue.len());
                queue.drain(..drop_count);
                self.dropped_overflow
                    .fetch_add(drop_count as u64, Ordering::Relaxed);
                tracing::warn!(
                    dropped = drop_count,
                    capacity = self.config.max_capacity,
                    "event buffer overflow, dropped oldest events"
                );
            }

            queue.push_back(event);
            queue.len() >= self.config.flush_size
        };

        if should_flush {
            self.flush().await?;
        }
        Ok(())
    }

    async fn flush(&self) -> Result<Vec<Event>> {
        let _gate = self.flush_gate.lock().await;

        let batch: Vec<Event> = {
            let mut queue = self.queue.lock().unwrap();
            queue.drain(..).collect()
        };
        if batch.is_empty() {
            return Ok(batch);
        }

        if let Some(on_flush) = &self.on_flush
            && let Err(err) = on_flush(batch.clone()).await
        {
            let mut queue = self.queue.lock().unwrap();
            for event in batch.into_iter().rev() {
                queue.push_front(event);
            }
            return Err(err);
        }

        Ok(batch)
    }

    async fn run_periodic(&self) {
        loop {
            tokio::select! {
                _ = tokio::time::sleep(self.config.flush_interval) => {
                    if self.queue.lock().unwrap().is_empty() {
                        continue;
                    }
                    if let Err(err) = self.flush().await {
                        tracing::warn!(%err, "periodic flush failed; events re-queued");
                    }
                }
                _ = self.shutdown.notified() => break,
            }
        }
    }
}
