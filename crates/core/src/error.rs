//! Unified error types for dispatch.
//!
//! The `Display` prefixes are stable codes; tool callers match on them.

use rmcp::model::{ErrorCode, ErrorData as McpError};
use tokio_rusqlite::rusqlite;

/// Unified error types for the dispatch data layer.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The named sheet does not exist in the store.
    #[error("SHEET_NOT_FOUND: {0}")]
    SheetNotFound(String),

    /// The store refused access.
    #[error("PERMISSION_DENIED: {0}")]
    PermissionDenied(String),

    /// The store's quota or rate limit was hit.
    #[error("RATE_LIMITED: {0}")]
    RateLimited(String),

    /// Database operation failed.
    #[error("STORE_ERROR: {0}")]
    Database(tokio_rusqlite::Error),

    /// Migration failed to apply.
    #[error("STORE_ERROR: migration failed: {0}")]
    MigrationFailed(String),

    /// A stored cell value could not be encoded or decoded.
    #[error("STORE_ERROR: cell codec: {0}")]
    Codec(String),

    /// Invalid input parameters (e.g., row 0).
    #[error("INVALID_INPUT: {0}")]
    InvalidInput(String),

    /// A column name is not present in the sheet's header row.
    #[error("UNKNOWN_COLUMN: {column} not in {sheet}")]
    UnknownColumn { sheet: String, column: String },

    /// A batched write did not complete. Earlier writes in the batch stay applied.
    #[error("WRITE_FAILED: {sheet} row {row}: {source}")]
    WriteFailed {
        sheet: String,
        row: usize,
        #[source]
        source: Box<Error>,
    },
}

impl Error {
    /// Whether this error came from the store rather than from the caller.
    pub fn is_store_access(&self) -> bool {
        matches!(
            self,
            Error::SheetNotFound(_)
                | Error::PermissionDenied(_)
                | Error::RateLimited(_)
                | Error::Database(_)
                | Error::MigrationFailed(_)
                | Error::Codec(_)
        )
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

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Codec(err.to_string())
    }
}

impl From<Error> for McpError {
    fn from(err: Error) -> Self {
        let code = match &err {
            Error::InvalidInput(_) => -32602,
            Error::SheetNotFound(_) => -32020,
            Error::PermissionDenied(_) => -32021,
            Error::RateLimited(_) => -32022,
            Error::Database(_) | Error::MigrationFailed(_) | Error::Codec(_) => -32023,
            Error::UnknownColumn { .. } => -32024,
            Error::WriteFailed { .. } => -32025,
        };

        McpError { code: ErrorCode(code), message: err.to_string().into(), data: None }
    }
}
