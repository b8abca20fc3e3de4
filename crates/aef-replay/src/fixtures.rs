use std::path::PathBuf;

use crate::error::{Error, Result};
use crate::player::Player;

const DEFAULT_RECORDINGS_DIR: &str = "fixtures/recordings";

/// Directory holding test recordings.
///
/// `AGENTIC_RECORDINGS_DIR` overrides the default relative path, which is
/// what dependent crates use when this library is installed as a
/// dependency.
pub fn recordings_dir() -> PathBuf {
    match std::env::var("AGENTIC_RECORDINGS_DIR") {
        Ok(path) => PathBuf::from(path),
        Err(_) => PathBuf::from(DEFAULT_RECORDINGS_DIR),
    }
}

/// All recordings in the fixtures directory, sorted by name.
///
/// Includes legacy `.jsonl` files and directory recordings (anything with
/// an `events.jsonl` inside).
pub fn list_recordings() -> Vec<PathBuf> {
    let dir = recordings_dir();
    let Ok(entries) = std::fs::read_dir(&dir) else {
        return Vec::new();
    };

    let mut results: Vec<PathBuf> = entries
        .flatten()
        .map(|entry| entry.path())
        .filter(|path| {
            if path.is_dir() {
                path.join("events.jsonl").exists()
            } else {
                path.extension().is_some_and(|ext| ext == "jsonl")
            }
        })
        .collect();

    results.sort();
    results
}

/// Load a recording by name.
///
/// Resolution order: a directory of that exact name, then `<name>.jsonl`,
/// then a unique substring match over everything in the fixtures
/// directory. Zero or multiple matches are an error listing what exists.
pub fn load_recording(name: &str) -> Result<Player> {
    let dir = recordings_dir();

    let dir_path = dir.join(name);
    if dir_path.is_dir() && dir_path.join("events.jsonl").exists() {
        return Player::load(dir_path);
    }

    let file_path = dir.join(format!("{}.jsonl", name));
    if file_path.exists() {
        return Player::load(file_path);
    }

    let matches: Vec<PathBuf> = list_recordings()
        .into_iter()
        .filter(|path| {
            path.file_name()
                .map(|n| n.to_string_lossy().contains(name))
                .unwrap_or(false)
        })
        .collect();

    match matches.as_slice() {
        [single] => Player::load(single),
        [] => {
            let available: Vec<String> = list_recordings()
                .iter()
                .filter_map(|p| p.file_name().map(|n| n.to_string_lossy().to_string()))
                .collect();
            Err(Error::NotFound(format!(
                "no recording matching '{}'; available: {:?}",
                name, available
            )))
        }
        many => Err(Error::NotFound(format!(
            "multiple recordings match '{}': {:?}",
            name,
            many.iter()
                .filter_map(|p| p.file_name().map(|n| n.to_string_lossy().to_string()))
                .collect::<Vec<_>>()
        ))),
    }
}
