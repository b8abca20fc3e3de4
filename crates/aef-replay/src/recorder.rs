use std::collections::BTreeMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Instant;

use aef_types::Event;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::error::{Error, Result};
use crate::migrate::CURRENT_EVENT_SCHEMA_VERSION;
use crate::{OFFSET_KEY, RECORDING_KEY};

/// Descriptive fields for a new recording
#[derive(Debug, Clone, Default)]
pub struct RecordingInfo {
    pub cli_version: String,
    pub model: String,
    pub provider: String,
    pub task: String,
    pub session_id: Option<String>,
    pub capture_method: String,
}

/// Metadata header of a recording
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecordingMeta {
    pub version: u32,
    pub event_schema_version: u32,
    pub cli_version: String,
    pub model: String,
    pub provider: String,
    pub task: String,
    pub recorded_at: DateTime<Utc>,
    pub duration_ms: u64,
    pub event_count: usize,
    pub session_id: Option<String>,
    pub capture_method: String,
}

impl RecordingMeta {
    /// Parse a header, tolerating missing fields.
    ///
    /// Defaults mirror what old capture tooling wrote: `version` 1,
    /// `event_schema_version` 0, unknown model/CLI version.
    pub fn from_value(value: &Value) -> Self {
        let recording = value.get(RECORDING_KEY).unwrap_or(value);

        let string_or = |key: &str, default: &str| {
            recording
                .get(key)
                .and_then(Value::as_str)
                .unwrap_or(default)
                .to_string()
        };

        let recorded_at = recording
            .get("recorded_at")
            .and_then(Value::as_str)
            .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
            .map(|dt| dt.with_timezone(&Utc))
            .unwrap_or_else(Utc::now);

        Self {
            version: recording.get("version").and_then(Value::as_u64).unwrap_or(1) as u32,
            event_schema_version: recording
                .get("event_schema_version")
                .and_then(Value::as_u64)
                .unwrap_or(0) as u32,
            cli_version: string_or("cli_version", "unknown"),
            model: string_or("model", "unknown"),
            provider: string_or("provider", "claude"),
            task: string_or("task", ""),
            recorded_at,
            duration_ms: recording
                .get("duration_ms")
                .and_then(Value::as_u64)
                .unwrap_or(0),
            event_count: recording
                .get("event_count")
                .and_then(Value::as_u64)
                .unwrap_or(0) as usize,
            session_id: recording
                .get("session_id")
                .and_then(Value::as_str)
                .map(str::to_string),
            capture_method: string_or("capture_method", "unknown"),
        }
    }
}

/// Captures events with timing offsets into a recording.
///
/// Events are buffered in memory and written on [`Recorder::finish`], which
/// is what lets the header carry the final `duration_ms` and `event_count`.
/// Recording sessions are bounded, so the buffering is acceptable. When
/// workspace files are attached, the directory format is written instead of
/// a single file.
pub struct Recorder {
    path: PathBuf,
    info: RecordingInfo,
    recorded_at: DateTime<Utc>,
    started: Instant,
    session_id: Option<String>,
    events: Vec<Value>,
    last_offset_ms: u64,
    workspace: BTreeMap<String, Vec<u8>>,
    finished: bool,
}

impl Recorder {
    pub fn create(path: impl Into<PathBuf>, info: RecordingInfo) -> Self {
        Self {
            path: path.into(),
            session_id: info.session_id.clone(),
            info,
            recorded_at: Utc::now(),
            started: Instant::now(),
            events: Vec::new(),
            last_offset_ms: 0,
            workspace: BTreeMap::new(),
            finished: false,
        }
    }

    /// Record an event at the current monotonic offset
    pub fn record(&mut self, event: &Event) -> Result<()> {
        let offset_ms = self.started.elapsed().as_millis() as u64;
        self.record_at(event, offset_ms)
    }

    /// Record an event at an explicit offset, for deterministic timing
    pub fn record_at(&mut self, event: &Event, offset_ms: u64) -> Result<()> {
        let mut value = event
            .to_value()
            .map_err(|e| Error::InvalidRecording(e.to_string()))?;
        if let Some(object) = value.as_object_mut() {
            object.insert(OFFSET_KEY.to_string(), json!(offset_ms));
        }

        if self.session_id.is_none() && !event.session_id.is_empty() {
            self.session_id = Some(event.session_id.clone());
        }

        self.last_offset_ms = self.last_offset_ms.max(offset_ms);
        self.events.push(value);
        Ok(())
    }

    /// Attach a file produced by the agent, stored under `workspace/`
    pub fn attach_workspace_file(&mut self, relative_path: impl Into<String>, content: Vec<u8>) {
        self.workspace.insert(relative_path.into(), content);
    }

    pub fn event_count(&self) -> usize {
        self.events.len()
    }

    fn meta(&self) -> RecordingMeta {
        let elapsed_ms = self.started.elapsed().as_millis() as u64;
        RecordingMeta {
            version: 1,
            event_schema_version: CURRENT_EVENT_SCHEMA_VERSION,
            cli_version: self.info.cli_version.clone(),
            model: self.info.model.clone(),
            provider: self.info.provider.clone(),
            task: self.info.task.clone(),
            recorded_at: self.recorded_at,
            duration_ms: elapsed_ms.max(self.last_offset_ms),
            event_count: self.events.len(),
            session_id: self.session_id.clone(),
            capture_method: self.info.capture_method.clone(),
        }
    }

    /// Write the recording out and return the final metadata
    pub fn finish(mut self) -> Result<RecordingMeta> {
        self.finished = true;
        self.write_out()
    }

    fn write_out(&self) -> Result<RecordingMeta> {
        let meta = self.meta();

        let events_path = if self.workspace.is_empty() {
            self.path.clone()
        } else {
            std::fs::create_dir_all(&self.path)?;
            self.write_workspace(&self.path.join("workspace"))?;
            self.path.join("events.jsonl")
        };

        if let Some(parent) = events_path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }

        let mut file = std::fs::File::create(&events_path)?;
        let header = json!({ "_recording": meta });
        writeln!(file, "{}", serde_json::to_string(&header)?)?;
        for event in &self.events {
            writeln!(file, "{}", serde_json::to_string(event)?)?;
        }
        file.sync_all()?;

        Ok(meta)
    }

    fn write_workspace(&self, root: &Path) -> Result<()> {
        for (relative_path, content) in &self.workspace {
            let path = root.join(relative_path);
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::write(path, content)?;
        }
        Ok(())
    }
}

impl Drop for Recorder {
    fn drop(&mut self) {
        if !self.finished && !self.events.is_empty() {
            // Best-effort persistence when the recorder is abandoned
            if let Err(err) = self.write_out() {
                tracing::warn!(path = %self.path.display(), %err, "failed to persist recording");
            }
        }
    }
}
