//! Error types for sift.
//!
//! Provider and fetch failures are recovered inside the pipeline and only
//! surface through the failure summary. [`Error`] covers what the caller
//! has to handle: bad input, configuration and the durable cache tier.

use std::time::Duration;

use rmcp::model::{ErrorCode, ErrorData as McpError};
use tokio_rusqlite::rusqlite;

use crate::config::ConfigError;

/// Workspace error type.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Invalid input parameters (e.g., empty query).
    #[error("INVALID_INPUT: {0}")]
    InvalidInput(String),

    /// Database operation failed.
    #[error("CACHE_ERROR: {0}")]
    Database(tokio_rusqlite::Error),

    /// Migration failed to apply.
    #[error("CACHE_ERROR: migration failed: {0}")]
    MigrationFailed(String),

    /// Cached payload could not be encoded or decoded.
    #[error("CACHE_ERROR: invalid payload: {0}")]
    InvalidPayload(#[from] serde_json::Error),

    /// Configuration could not be loaded or is inconsistent.
    #[error("CONFIG_ERROR: {0}")]
    Config(#[from] ConfigError),
}

/// Tagged outcome of a failed provider call.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProviderError {
    /// The provider refused the call (HTTP 429, bot challenge).
    #[error("rate limited")]
    RateLimited { retry_after: Option<Duration> },

    /// Network, authentication or server-side failure.
    #[error("unavailable: {0}")]
    Unavailable(String),

    /// The call succeeded but returned no results.
    #[error("no results")]
    Empty,

    /// The response body could not be decoded.
    #[error("invalid response: {0}")]
    InvalidResponse(String),
}

/// Failure to retrieve or extract a single source URL.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FetchError {
    /// Refused by the policy gate or the address guard.
    #[error("forbidden: {0}")]
    Forbidden(String),

    #[error("timed out after {0:?}")]
    Timeout(Duration),

    #[error("response exceeds {limit} bytes")]
    TooLarge { limit: usize },

    #[error("connection failed: {0}")]
    ConnectionFailed(String),

    #[error("invalid url: {0}")]
    InvalidUrl(String),

    #[error("http status {0}")]
    HttpStatus(u16),

    /// Extraction produced no text.
    #[error("no extractable content")]
    EmptyContent,
}

impl From<tokio_rusqlite::Error<Error>> for Error {
    fn from(err: tokio_rusqlite::Error<Error>) -> Self {
        match err {
            tokio_rusqlite::Error::Error(e) => e,
            tokio_rusqlite::Error::ConnectionClosed => Error::Database(tokio_rusqlite::Error::ConnectionClosed),
            tokio_rusqlite::Error::Close(c) => Error::Database(tokio_rusqlite::Error::Close(c)),
            _ => Error::Database(tokio_rusqlite::Error::ConnectionClosed),
        }
    }
}

impl From<tokio_rusqlite::Error<rusqlite::Error>> for Error {
    fn from(err: tokio_rusqlite::Error<rusqlite::Error>) -> Self {
        Error::Database(err)
    }
}

impl From<rusqlite::Error> for Error {
    fn from(err: rusqlite::Error) -> Self {
        Error::Database(tokio_rusqlite::Error::Error(err))
    }
}

impl From<Error> for McpError {
    fn from(err: Error) -> Self {
        let (code, message) = match &err {
            Error::InvalidInput(msg) => (-32602, msg.clone()),
            Error::Database(e) => (-32002, e.to_string()),
            Error::MigrationFailed(msg) => (-32002, msg.clone()),
            Error::InvalidPayload(e) => (-32002, e.to_string()),
            Error::Config(e) => (-32003, e.to_string()),
        };

        McpError { code: ErrorCode(code), message: message.into(), data: None }
    }
}
