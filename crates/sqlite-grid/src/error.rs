use std::path::PathBuf;

use rusqlite::ErrorCode;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("invalid identifier: {0:?}")]
    InvalidIdentifier(String),

    #[error("row in {table} has no usable primary key value in column {column}")]
    MissingRowIdentifier { table: String, column: String },

    #[error("table not found: {0}")]
    TableNotFound(String),

    #[error("foreign lookup failed: {0}")]
    ForeignLookup(String),

    #[error("path not allowed: {0}")]
    PathNotAllowed(PathBuf),

    #[error("failed to open database: {path}: {source}")]
    DbOpenFailed {
        path: PathBuf,
        #[source]
        source: rusqlite::Error,
    },

    #[error("sql error: {0}")]
    SqlError(String),

    #[error("request cancelled")]
    Cancelled,

    #[error("timeout")]
    Timeout,

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("internal error: {0}")]
    Internal(String),
}

impl From<rusqlite::Error> for AppError {
    fn from(e: rusqlite::Error) -> Self {
        match e.sqlite_error_code() {
            Some(ErrorCode::OperationInterrupted) => AppError::Cancelled,
            _ => AppError::SqlError(e.to_string()),
        }
    }
}

impl AppError {
    pub fn code(&self) -> &'static str {
        match self {
            AppError::InvalidRequest(_) => "INVALID_REQUEST",
            AppError::InvalidIdentifier(_) => "INVALID_IDENTIFIER",
            AppError::MissingRowIdentifier { .. } => "MISSING_ROW_ID",
            AppError::TableNotFound(_) => "TABLE_NOT_FOUND",
            AppError::ForeignLookup(_) => "FOREIGN_LOOKUP",
            AppError::PathNotAllowed(_) => "PATH_NOT_ALLOWED",
            AppError::DbOpenFailed { .. } => "DB_OPEN_FAILED",
            AppError::SqlError(_) => "SQL_ERROR",
            AppError::Cancelled => "CANCELLED",
            AppError::Timeout => "TIMEOUT",
            AppError::Io(_) => "IO_ERROR",
            AppError::Json(_) => "JSON_ERROR",
            AppError::Internal(_) => "INTERNAL",
        }
    }

    /// Errors caused by the caller's input rather than by the database.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            AppError::InvalidRequest(_)
                | AppError::InvalidIdentifier(_)
                | AppError::TableNotFound(_)
                | AppError::PathNotAllowed(_)
        )
    }
}

pub type AppResult<T> = Result<T, AppError>;
