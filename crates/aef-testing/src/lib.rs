//! Testing infrastructure for aef integration tests.
//!
//! - event factories for quickly building pipeline events
//! - scoped guards for the `AEF_ENVIRONMENT` variable, serialized behind a
//!   global lock so parallel tests cannot race on process environment

use std::sync::{Mutex, MutexGuard, OnceLock};

use aef_types::{Event, EventType};
use serde_json::json;

/// A `session.started` event for the given session
pub fn make_event(session_id: impl Into<String>) -> Event {
    Event::new(EventType::SessionStarted, session_id)
}

/// A `tokens.used` event with fixed token counts
pub fn make_tokens_event(session_id: impl Into<String>, input: u64, output: u64) -> Event {
    Event::tokens_used(session_id, input, output, 500)
}

/// A `tool.called` event for the given tool
pub fn make_tool_event(session_id: impl Into<String>, tool_name: &str, blocked: bool) -> Event {
    let record = aef_types::ToolCallRecord {
        blocked,
        ..aef_types::ToolCallRecord::new(tool_name, json!({"arg": "value"}))
    };
    Event::tool_called(session_id, record)
}

static ENV_LOCK: OnceLock<Mutex<()>> = OnceLock::new();

/// Holds `AEF_ENVIRONMENT` at a fixed value for the guard's lifetime.
///
/// The previous value is restored on drop. All guards share one global lock
/// so concurrently running tests never observe each other's environment.
pub struct EnvGuard {
    previous: Option<String>,
    _lock: MutexGuard<'static, ()>,
}

impl Drop for EnvGuard {
    fn drop(&mut self) {
        // Serialized by the lock held in self
        unsafe {
            match &self.previous {
                Some(value) => std::env::set_var("AEF_ENVIRONMENT", value),
                None => std::env::remove_var("AEF_ENVIRONMENT"),
            }
        }
    }
}

fn guard_with(value: Option<&str>) -> EnvGuard {
    let lock = ENV_LOCK
        .get_or_init(|| Mutex::new(()))
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner());

    let previous = std::env::var("AEF_ENVIRONMENT").ok();
    unsafe {
        match value {
            Some(value) => std::env::set_var("AEF_ENVIRONMENT", value),
            None => std::env::remove_var("AEF_ENVIRONMENT"),
        }
    }

    EnvGuard {
        previous,
        _lock: lock,
    }
}

/// `AEF_ENVIRONMENT=test` for the guard's lifetime
pub fn test_environment() -> EnvGuard {
    guard_with(Some("test"))
}

/// `AEF_ENVIRONMENT=<value>` for the guard's lifetime
pub fn scoped_environment(value: &str) -> EnvGuard {
    guard_with(Some(value))
}

/// `AEF_ENVIRONMENT` unset for the guard's lifetime
pub fn cleared_environment() -> EnvGuard {
    guard_with(None)
}
