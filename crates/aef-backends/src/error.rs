use std::fmt;

/// Result type for aef-backends operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types that can occur in the backend layer.
///
/// Every variant is either transient (worth retrying) or terminal; the
/// split is exposed through [`Error::is_retryable`].
#[derive(Debug)]
pub enum Error {
    /// Backend misconfiguration, raised at construction or first use
    Config(String),

    /// Event could not be represented for this backend
    Invalid(String),

    /// HTTP response with a non-success status
    Status {
        status: u16,
        /// First bytes of the response body, for drop logs
        body: String,
    },

    /// HTTP transport failure (connect, timeout, protocol)
    Transport(reqwest::Error),

    /// Database operation failed
    Database(sqlx::Error),

    /// IO operation failed
    Io(std::io::Error),

    /// JSON (de)serialization failed
    Json(serde_json::Error),
}

impl Error {
    /// Whether a retry of the same operation may succeed.
    ///
    /// Retryable: connection errors, request timeouts, HTTP 5xx and 429,
    /// database IO and pool-exhaustion errors. Everything else (other 4xx,
    /// malformed payloads, configuration) is terminal.
    pub fn is_retryable(&self) -> bool {
        match self {
            Error::Transport(err) => err.is_connect() || err.is_timeout(),
            Error::Status { status, .. } => *status >= 500 || *status == 429,
            Error::Database(err) => matches!(
                err,
                sqlx::Error::Io(_) | sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed
            ),
            Error::Io(_) => true,
            Error::Config(_) | Error::Invalid(_) | Error::Json(_) => false,
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Config(msg) => write!(f, "Configuration error: {}", msg),
            Error::Invalid(msg) => write!(f, "Invalid event: {}", msg),
            Error::Status { status, body } => {
                write!(f, "HTTP status {}: {}", status, body)
            }
            Error::Transport(err) => write!(f, "HTTP transport error: {}", err),
            Error::Database(err) => write!(f, "Database error: {}", err),
            Error::Io(err) => write!(f, "IO error: {}", err),
            Error::Json(err) => write!(f, "JSON error: {}", err),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Transport(err) => Some(err),
            Error::Database(err) => Some(err),
            Error::Io(err) => Some(err),
            Error::Json(err) => Some(err),
            Error::Config(_) | Error::Invalid(_) | Error::Status { .. } => None,
        }
    }
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        Error::Transport(err)
    }
}

impl From<sqlx::Error> for Error {
    fn from(err: sqlx::Error) -> Self {
        Error::Database(err)
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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_classification() {
        let transient = Error::Status {
            status: 500,
            body: String::new(),
        };
        assert!(transient.is_retryable());

        let rate_limited = Error::Status {
            status: 429,
            body: String::new(),
        };
        assert!(rate_limited.is_retryable());

        let terminal = Error::Status {
            status: 400,
            body: String::new(),
        };
        assert!(!terminal.is_retryable());

        let not_found = Error::Status {
            status: 404,
            body: String::new(),
        };
        assert!(!not_found.is_retryable());
    }

    #[test]
    fn config_errors_are_terminal() {
        assert!(!Error::Config("missing base_url".to_string()).is_retryable());
    }

    #[test]
    fn io_errors_are_transient() {
        let err = Error::Io(std::io::Error::other("disk hiccup"));
        assert!(err.is_retryable());
    }
}
