use std::fmt;

use thiserror::Error;

/// Errors reported by the underlying store.
///
/// These are passed through to callers unchanged; alternator never retries
/// or reinterprets them.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("Resource not found: {0}")]
    ResourceNotFound(String),
    #[error("Resource in use: {0}")]
    ResourceInUse(String),
    #[error("Conditional check failed: {0}")]
    ConditionalCheckFailed(String),
    #[error("Validation error: {0}")]
    Validation(String),
    #[error("Throughput exceeded: {0}")]
    Throughput(String),
    #[error("Service error: {0}")]
    Service(String),
    #[error("Connection failed: {0}")]
    Connection(String),
}

/// The part of a table schema that failed to match.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchemaPart {
    Key,
    Attributes,
}

impl fmt::Display for SchemaPart {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SchemaPart::Key => f.write_str("key"),
            SchemaPart::Attributes => f.write_str("attributes"),
        }
    }
}

/// Errors that can occur during alternator operations.
///
/// Results are shared between every observer of a deferred value, so the
/// error type is `Clone`.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Configuration(String),
    #[error("Table '{table}' {part} did not match - local: {local} remote: {remote}")]
    SchemaMismatch {
        table: String,
        part: SchemaPart,
        local: String,
        remote: String,
    },
    #[error("No item found in table '{table}' for key {key}")]
    NotFound { table: String, key: String },
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl Error {
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration(message.into())
    }
}

/// Result type for alternator operations.
pub type Result<T> = std::result::Result<T, Error>;
