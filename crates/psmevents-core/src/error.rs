//! Error types for `psmevents` core library.

use thiserror::Error;

/// Result type alias using `psmevents` Error.
pub type Result<T> = std::result::Result<T, Error>;

/// Core error types for `psmevents` operations.
#[derive(Debug, Error)]
pub enum Error {
    /// Malformed or truncated JSON on the input stream
    #[error("Failed to decode JSON value: {0}")]
    Decode(#[from] serde_json::Error),

    /// I/O failure on the underlying byte source or connection
    #[error("Connection error: {0}")]
    Connection(#[from] std::io::Error),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),
}
