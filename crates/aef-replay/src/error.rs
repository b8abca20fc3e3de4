use std::fmt;

/// Result type for aef-replay operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types that can occur in the recording/replay layer
#[derive(Debug)]
pub enum Error {
    /// IO operation failed
    Io(std::io::Error),

    /// JSON (de)serialization failed
    Json(serde_json::Error),

    /// Recording file or directory is malformed
    InvalidRecording(String),

    /// No recording matches the requested name, or the name is ambiguous
    NotFound(String),

    /// Replay aborted (bad speed, or the emit function failed)
    Playback(String),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Io(err) => write!(f, "IO error: {}", err),
            Error::Json(err) => write!(f, "JSON error: {}", err),
            Error::InvalidRecording(msg) => write!(f, "Invalid recording: {}", msg),
            Error::NotFound(msg) => write!(f, "Recording not found: {}", msg),
            Error::Playback(msg) => write!(f, "Playback error: {}", msg),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Io(err) => Some(err),
            Error::Json(err) => Some(err),
            Error::InvalidRecording(_) | Error::NotFound(_) | Error::Playback(_) => None,
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::Io(err)
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Json(err)
    }
}
