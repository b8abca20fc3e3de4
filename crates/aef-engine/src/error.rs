use std::fmt;

/// Result type for aef-engine operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types that can occur in the aggregation layer
#[derive(Debug)]
pub enum Error {
    /// Event applied in a state that does not accept it
    InvalidTransition(String),

    /// Event belongs to a different session
    SessionMismatch { expected: String, actual: String },
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::InvalidTransition(msg) => write!(f, "Invalid transition: {}", msg),
            Error::SessionMismatch { expected, actual } => {
                write!(
                    f,
                    "Session mismatch: aggregator tracks '{}', event carries '{}'",
                    expected, actual
                )
            }
        }
    }
}

impl std::error::Error for Error {}
