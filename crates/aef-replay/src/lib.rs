//! Session recording and replay.
//!
//! A recording is a JSONL file (or a directory holding `events.jsonl` plus
//! a `workspace/` subtree) whose first line is a metadata header and whose
//! remaining lines are events annotated with `_offset_ms` since recording
//! start. The [`Recorder`] produces recordings; the [`Player`] loads them,
//! migrates older event schemas forward and replays them instantly or at a
//! controlled speed.

mod error;
mod fixtures;
mod migrate;
mod player;
mod recorder;

pub use error::{Error, Result};
pub use fixtures::{list_recordings, load_recording, recordings_dir};
pub use migrate::{CURRENT_EVENT_SCHEMA_VERSION, MigrationRegistry};
pub use player::Player;
pub use recorder::{Recorder, RecordingInfo, RecordingMeta};

/// Key carrying per-event timing inside recording files
pub const OFFSET_KEY: &str = "_offset_ms";

/// Key wrapping the metadata header line
pub const RECORDING_KEY: &str = "_recording";
