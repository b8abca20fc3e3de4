use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use aef_types::Event;
use async_trait::async_trait;

use crate::backend::Backend;
use crate::error::Result;

pub const DEFAULT_OUTPUT_PATH: &str = ".agentic/analytics/events.jsonl";

/// Resolve the event log path based on priority:
/// 1. Explicit path
/// 2. AGENTIC_EVENTS_PATH environment variable
/// 3. Default relative path (`.agentic/analytics/events.jsonl`)
pub fn resolve_output_path(explicit_path: Option<&Path>) -> PathBuf {
    if let Some(path) = explicit_path {
        return path.to_path_buf();
    }

    if let Ok(env_path) = std::env::var("AGENTIC_EVENTS_PATH") {
        return PathBuf::from(env_path);
    }

    PathBuf::from(DEFAULT_OUTPUT_PATH)
}

/// Append-only JSONL backend.
///
/// The file is opened on first write (creating parent directories) and held
/// open for the backend's lifetime. Each event is written as exactly one
/// line with a single `write_all`, so an event is never split across lines;
/// a hard crash leaves at most one truncated tail line, which readers skip.
pub struct FileBackend {
    path: PathBuf,
    file: Mutex<Option<File>>,
}

impl FileBackend {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            file: Mutex::new(None),
        }
    }

    /// File backend at the environment-resolved output path
    pub fn from_env() -> Self {
        Self::new(resolve_output_path(None))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn open(&self) -> Result<File> {
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        Ok(file)
    }
}

#[async_trait]
impl Backend for FileBackend {
    async fn write(&self, batch: &[Event]) -> Result<()> {
        if batch.is_empty() {
            return Ok(());
        }

        let mut guard = self.file.lock().unwrap();
        let file = match &mut *guard {
            Some(file) => file,
            unopened => unopened.insert(self.open()?),
        };

        for event in batch {
            let mut line = serde_json::to_string(event)?;
            line.push('\n');
            file.write_all(line.as_bytes())?;
        }
        file.flush()?;

        Ok(())
    }

    async fn close(&self) -> Result<()> {
        if let Some(file) = self.file.lock().unwrap().take() {
            file.sync_all()?;
        }
        Ok(())
    }
}
