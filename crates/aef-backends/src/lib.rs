//! Storage backends for the aef event pipeline.
//!
//! All backends implement the small [`Backend`] surface (write, close,
//! health check). Delivery errors are classified as transient or terminal
//! via [`Error::is_retryable`]; backends that perform their own retries
//! (HTTP, SQL) report it through [`Backend::retries_writes`] so callers
//! never retry on top of them.

mod backend;
mod error;
mod file;
mod http;
mod null;
mod retry;
mod sql;

pub use backend::Backend;
pub use error::{Error, Result};
pub use file::{FileBackend, resolve_output_path};
pub use http::{HttpBackend, HttpBackendConfig};
pub use null::NullBackend;
pub use retry::RetryPolicy;
pub use sql::{SCHEMA_SQL, SqlBackend, SqlBackendConfig};
