use thiserror::Error;

use crate::model::Id;

pub type StoreResult<T> = Result<T, StoreError>;

/// Failures surfaced by instance store operations.
#[derive(Error, Debug)]
pub enum StoreError {
    /// Malformed or incomplete instance payload.
    #[error("validation failed: {0}")]
    Validation(String),

    #[error("instance {id} not found in document {document_guid}")]
    NotFound { document_guid: Id, id: Id },

    /// The backing database cannot be reached.
    #[error("database unavailable: {0}")]
    Connection(String),

    #[error("internal store error: {0}")]
    Internal(String),
}

impl StoreError {
    pub fn validation(message: impl Into<String>) -> Self {
        StoreError::Validation(message.into())
    }

    pub fn not_found(document_guid: &str, id: &str) -> Self {
        StoreError::NotFound {
            document_guid: document_guid.to_string(),
            id: id.to_string(),
        }
    }

    /// Short machine-readable name used in error bodies and batch results.
    pub fn kind(&self) -> &'static str {
        match self {
            StoreError::Validation(_) => "validation",
            StoreError::NotFound { .. } => "not_found",
            StoreError::Connection(_) => "connection",
            StoreError::Internal(_) => "internal",
        }
    }

    /// Returns true if the caller sent something the store refused (4xx).
    pub fn is_client_error(&self) -> bool {
        matches!(self, StoreError::Validation(_) | StoreError::NotFound { .. })
    }
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::Io(_)
            | sqlx::Error::Tls(_)
            | sqlx::Error::PoolTimedOut
            | sqlx::Error::PoolClosed
            | sqlx::Error::WorkerCrashed => StoreError::Connection(err.to_string()),
            // SQLSTATE class 22: the database refused the data itself
            sqlx::Error::Database(db)
                if db.code().map_or(false, |code| code.starts_with("22")) =>
            {
                StoreError::Validation(db.message().to_string())
            }
            other => StoreError::Internal(other.to_string()),
        }
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        StoreError::Internal(format!("corrupt stored document: {}", err))
    }
}
