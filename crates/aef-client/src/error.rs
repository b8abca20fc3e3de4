use std::fmt;

/// Result type for aef-client operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types that can occur in the client layer
#[derive(Debug)]
pub enum Error {
    /// Backend write or close failed
    Backend(aef_backends::Error),

    /// Flush callback failed
    Flush(String),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Backend(err) => write!(f, "Backend error: {}", err),
            Error::Flush(msg) => write!(f, "Flush error: {}", msg),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Backend(err) => Some(err),
            Error::Flush(_) => None,
        }
    }
}

impl From<aef_backends::Error> for Error {
    fn from(err: aef_backends::Error) -> Self {
        Error::Backend(err)
    }
}
