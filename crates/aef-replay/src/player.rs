use std::collections::BTreeMap;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde_json::Value;

use crate::error::{Error, Result};
use crate::migrate;
use crate::recorder::RecordingMeta;
use crate::{OFFSET_KEY, RECORDING_KEY};

/// Replays a recorded session.
///
/// Accepts both recording layouts: a single legacy `.jsonl` file, or a
/// directory holding `events.jsonl` plus an optional `workspace/` subtree.
/// Events from older recordings are migrated to the current schema on load,
/// using the `event_schema_version` declared in the header.
pub struct Player {
    metadata: RecordingMeta,
    events: Vec<Value>,
    workspace: BTreeMap<String, Vec<u8>>,
}

impl Player {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(Error::NotFound(path.display().to_string()));
        }

        let mut player = if path.is_dir() {
            Self::load_directory(path)?
        } else {
            Self::load_events_file(path)?
        };

        let registry = migrate::registry();
        let from_version = player.metadata.event_schema_version;
        player.events = player
            .events
            .into_iter()
            .map(|event| registry.migrate(event, from_version))
            .collect();

        Ok(player)
    }

    fn load_directory(path: &Path) -> Result<Self> {
        let events_path = path.join("events.jsonl");
        if !events_path.exists() {
            return Err(Error::InvalidRecording(format!(
                "directory recording missing events.jsonl: {}",
                path.display()
            )));
        }

        let mut player = Self::load_events_file(&events_path)?;

        let workspace_root = path.join("workspace");
        if workspace_root.is_dir() {
            player.workspace = load_workspace(&workspace_root)?;
        }
        Ok(player)
    }

    fn load_events_file(path: &Path) -> Result<Self> {
        let values = aef_types::read_jsonl(path).map_err(|err| match err {
            aef_types::Error::Io(err) => Error::Io(err),
            other => Error::InvalidRecording(other.to_string()),
        })?;

        if values.is_empty() {
            return Err(Error::InvalidRecording(format!(
                "empty recording file: {}",
                path.display()
            )));
        }

        let (metadata, events) = if values[0].get(RECORDING_KEY).is_some() {
            (
                RecordingMeta::from_value(&values[0]),
                values[1..].to_vec(),
            )
        } else {
            // Headerless recording from before metadata was written
            let mut metadata = RecordingMeta::from_value(&Value::Null);
            metadata.version = 0;
            metadata.event_count = values.len();
            metadata.session_id = values
                .iter()
                .find_map(|v| v.get("session_id").and_then(Value::as_str))
                .map(str::to_string);
            (metadata, values)
        };

        Ok(Self {
            metadata,
            events,
            workspace: BTreeMap::new(),
        })
    }

    pub fn metadata(&self) -> &RecordingMeta {
        &self.metadata
    }

    pub fn session_id(&self) -> Option<&str> {
        self.metadata.session_id.as_deref()
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// All events, for instant playback. With `strip_timing`, the
    /// `_offset_ms` annotation is removed.
    pub fn events(&self, strip_timing: bool) -> Vec<Value> {
        if !strip_timing {
            return self.events.clone();
        }
        self.events.iter().map(strip_offset).collect()
    }

    /// Play events through `emit_fn` with inter-event delays scaled by
    /// `speed`.
    ///
    /// `speed` must be positive; `f64::INFINITY` replays instantly with no
    /// sleeps. Each event is emitted with timing stripped. An error from
    /// `emit_fn` aborts the replay and propagates. Returns the number of
    /// events played.
    pub async fn play<F, Fut, E>(&self, mut emit_fn: F, speed: f64) -> Result<usize>
    where
        F: FnMut(Value) -> Fut,
        Fut: Future<Output = std::result::Result<(), E>>,
        E: std::fmt::Display,
    {
        if !(speed > 0.0) {
            return Err(Error::Playback(format!(
                "speed must be positive, got {}",
                speed
            )));
        }

        let mut last_offset = 0u64;
        let mut count = 0usize;

        for event in &self.events {
            let offset = event.get(OFFSET_KEY).and_then(Value::as_u64).unwrap_or(0);

            let delay_ms = offset.saturating_sub(last_offset);
            if delay_ms > 0 && speed.is_finite() {
                let delay = Duration::from_secs_f64(delay_ms as f64 / 1000.0 / speed);
                tokio::time::sleep(delay).await;
            }

            emit_fn(strip_offset(event))
                .await
                .map_err(|e| Error::Playback(e.to_string()))?;

            last_offset = offset;
            count += 1;
        }

        Ok(count)
    }

    /// Files the agent produced during the recorded session, keyed by
    /// path relative to the workspace root
    pub fn workspace_files(&self) -> &BTreeMap<String, Vec<u8>> {
        &self.workspace
    }

    pub fn has_workspace(&self) -> bool {
        !self.workspace.is_empty()
    }
}

fn strip_offset(event: &Value) -> Value {
    let mut event = event.clone();
    if let Some(object) = event.as_object_mut() {
        object.remove(OFFSET_KEY);
    }
    event
}

fn load_workspace(root: &Path) -> Result<BTreeMap<String, Vec<u8>>> {
    let mut files = BTreeMap::new();
    let mut pending: Vec<PathBuf> = vec![root.to_path_buf()];

    while let Some(dir) = pending.pop() {
        for entry in std::fs::read_dir(&dir)? {
            let path = entry?.path();
            if path.is_dir() {
                pending.push(path);
            } else {
                let relative = path
                    .strip_prefix(root)
                    .map_err(|e| Error::InvalidRecording(e.to_string()))?
                    .to_string_lossy()
                    .to_string();
                files.insert(relative, std::fs::read(&path)?);
            }
        }
    }

    Ok(files)
}
