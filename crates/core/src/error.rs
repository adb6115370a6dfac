//! Unified error types for masterbook.
//!
//! Display strings carry a stable code prefix so operators can grep logs and
//! tool responses for the error class.

use rmcp::model::{ErrorCode, ErrorData as McpError};
use tokio_rusqlite::rusqlite;

/// Unified error type shared by the client, store, and server crates.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Caller supplied arguments that can never succeed (rejected before I/O).
    #[error("INVALID_INPUT: {0}")]
    InvalidInput(String),

    /// Remote answered with a non-2xx status or the request failed in flight.
    #[error("HTTP_ERROR: {0}")]
    HttpError(String),

    /// Remote request exceeded its timeout.
    #[error("FETCH_TIMEOUT: {0}")]
    FetchTimeout(String),

    /// Remote body could not be decoded into the expected shape.
    #[error("MALFORMED_BODY: {0}")]
    MalformedBody(String),

    /// A master-data row failed typed parsing; the enclosing batch is aborted.
    #[error("PARSE_FAILED: {0}")]
    ParseFailed(String),

    /// Database operation failed.
    #[error("CACHE_ERROR: {0}")]
    Database(tokio_rusqlite::Error),

    /// Migration failed to apply.
    #[error("CACHE_ERROR: migration failed: {0}")]
    MigrationFailed(String),

    /// A background fetch task panicked or was cancelled.
    #[error("INTERNAL: {0}")]
    Internal(String),
}

impl Error {
    /// True for errors raised while talking to the remote master-data source.
    pub fn is_transport(&self) -> bool {
        matches!(self, Error::HttpError(_) | Error::FetchTimeout(_) | Error::MalformedBody(_))
    }
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
            Error::HttpError(msg) => (-32008, msg.clone()),
            Error::FetchTimeout(msg) => (-32006, msg.clone()),
            Error::MalformedBody(msg) => (-32009, msg.clone()),
            Error::ParseFailed(msg) => (-32010, msg.clone()),
            Error::Database(e) => (-32002, e.to_string()),
            Error::MigrationFailed(msg) => (-32002, msg.clone()),
            Error::Internal(msg) => (-32603, msg.clone()),
        };

        McpError { code: ErrorCode(code), message: message.into(), data: None }
    }
}
