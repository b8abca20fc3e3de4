//! HTTP ingestion endpoint for the aef pipeline.
//!
//! Receives events from remote producers, validates them, and persists
//! them through a configured backend. The endpoint never retries storage
//! internally; producers are clients with their own retry and drop
//! accounting.

mod routes;

pub use routes::{router, serve};
