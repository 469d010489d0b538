//! Error types shared across the crate.

use thiserror::Error;

/// Errors a council adapter can fail with.
///
/// Adapters never retry internally; retry policy belongs to the caller.
#[derive(Error, Debug)]
pub enum AdapterError {
    /// Session establishment was rejected before the data request was made.
    #[error("council session authentication failed with status {0}")]
    Auth(u16),

    /// Transport-level failure before any response status was received.
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The council service answered with a non-success status.
    #[error("council service returned status {0}")]
    Status(u16),

    /// The response did not have the expected shape.
    #[error("unexpected council response: {0}")]
    Parse(String),

    /// A bounded wait elapsed before its condition held.
    #[error("timed out waiting for {0}")]
    Timeout(&'static str),

    /// The requested property or its schedule could not be located.
    #[error("{0}")]
    NotFound(String),
}

/// Errors from the key-value store backing the schedule cache.
///
/// These never surface to a request; the cache degrades to a live fetch.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("cache connection failed: {0}")]
    Connection(String),

    #[error("cache command failed: {0}")]
    Command(#[from] redis::RedisError),
}

/// Request-level errors raised by the aggregation service.
#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("Unknown source: {0}")]
    UnknownSource(String),

    #[error("Address lookup not supported for this source")]
    UnsupportedLookup(String),

    #[error(transparent)]
    Upstream(#[from] AdapterError),
}
