use std::sync::Mutex;

use aef_types::Event;
use async_trait::async_trait;

use crate::backend::Backend;
use crate::error::{Error, Result};

/// Backend that discards events, retaining them in a test-inspectable
/// accumulator.
///
/// Installing a silent drop in production would be invisible data loss, so
/// construction is refused unless `AEF_ENVIRONMENT=test` is set.
#[derive(Debug)]
pub struct NullBackend {
    events: Mutex<Vec<Event>>,
}

impl NullBackend {
    pub fn new() -> Result<Self> {
        match std::env::var("AEF_ENVIRONMENT") {
            Ok(value) if value == "test" => Ok(Self {
                events: Mutex::new(Vec::new()),
            }),
            _ => Err(Error::Config(
                "NullBackend discards all events and is only available with \
                 AEF_ENVIRONMENT='test'"
                    .to_string(),
            )),
        }
    }

    /// Snapshot of everything written so far, in write order
    pub fn events_received(&self) -> Vec<Event> {
        self.events.lock().unwrap().clone()
    }

    pub fn len(&self) -> usize {
        self.events.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl Backend for NullBackend {
    async fn write(&self, batch: &[Event]) -> Result<()> {
        self.events.lock().unwrap().extend_from_slice(batch);
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        Ok(())
    }
}
