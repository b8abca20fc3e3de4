//! Core types for the aef event pipeline.
//!
//! The central type is [`Event`]: a single observation emitted by an agent
//! runtime, carrying a closed-set [`EventType`], correlation identifiers
//! (session, workflow, phase, milestone, tool use) and a free-form JSON
//! payload. Events serialize to JSON Lines and travel unchanged through
//! buffers, backends and recordings.

mod error;
mod event;
mod jsonl;
mod record;

pub use error::{Error, Result};
pub use event::{Event, EventType};
pub use jsonl::read_jsonl;
pub use record::{SecurityDecision, ToolCallRecord};
