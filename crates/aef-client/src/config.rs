use std::time::Duration;

/// Buffering parameters for [`crate::EventBuffer`]
#[derive(Debug, Clone)]
pub struct BufferConfig {
    /// Pending count that triggers an inline flush
    pub flush_size: usize,

    /// Interval of the periodic background flush
    pub flush_interval: Duration,

    /// Hard upper bound on pending events. When reached, the oldest 10%
    /// are dropped to make room. A capacity of 0 drops every insert
    /// immediately (still counted as overflow).
    pub max_capacity: usize,
}

impl Default for BufferConfig {
    fn default() -> Self {
        Self {
            flush_size: 50,
            flush_interval: Duration::from_secs(1),
            max_capacity: 10_000,
        }
    }
}

/// Construction parameters for [`crate::EventClient`]
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub buffer: BufferConfig,

    /// Total write attempts against a backend that does not retry
    /// internally. Backends that own their retry loop are written once.
    pub max_retry_attempts: u32,

    /// Pause between client-level write attempts
    pub retry_backoff: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            buffer: BufferConfig::default(),
            max_retry_attempts: 3,
            retry_backoff: Duration::from_millis(100),
        }
    }
}
