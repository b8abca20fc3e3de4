use std::path::Path;

use serde_json::Value;

use crate::error::{Error, Result};

/// Read a JSON Lines file into values.
///
/// Blank lines are skipped. A process crash mid-append can leave one
/// truncated line at the end of the file; such a trailing line is skipped
/// with a warning instead of failing the whole read. Invalid JSON anywhere
/// else is an error.
pub fn read_jsonl(path: &Path) -> Result<Vec<Value>> {
    let content = std::fs::read_to_string(path)?;
    let lines: Vec<&str> = content
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .collect();

    let mut values = Vec::with_capacity(lines.len());
    for (index, line) in lines.iter().enumerate() {
        match serde_json::from_str(line) {
            Ok(value) => values.push(value),
            Err(err) if index == lines.len() - 1 => {
                tracing::warn!(
                    path = %path.display(),
                    %err,
                    "skipping truncated trailing line"
                );
            }
            Err(err) => {
                return Err(Error::Validation(format!(
                    "invalid JSON on line {} of {}: {}",
                    index + 1,
                    path.display(),
                    err
                )));
            }
        }
    }

    Ok(values)
}
