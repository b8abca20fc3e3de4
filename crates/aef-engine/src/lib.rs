//! Session aggregation engine.
//!
//! Consumes the event stream of one agent run and maintains the counters
//! that make up its end-of-session summary: token totals, tool calls,
//! blocked calls, duration and estimated cost. Used embedded in a producer
//! for live sessions, or replayed over ingested events to reconstruct a
//! summary server-side.

mod enrich;
mod error;
mod session;

pub use enrich::ToolNameCache;
pub use error::{Error, Result};
pub use session::{ModelRates, SessionAggregator, SessionState, SessionSummary};
