//! Error types for the reef metadata store.
//!
//! redb's per-operation error types all collapse into [`StoreError::Backend`]
//! via `From` impls, so store code propagates them with plain `?`. Record
//! encoding failures and the domain-level lookup failures keep their own
//! variants because callers branch on them.

use thiserror::Error;
use uuid::Uuid;

/// Result type alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors that can occur during store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("storage backend: {0}")]
    Backend(String),

    #[error("record encoding: {0}")]
    Codec(#[from] serde_json::Error),

    #[error("endpoint not found: {0}")]
    EndpointNotFound(Uuid),

    #[error("deployment not found: {0}")]
    DeploymentNotFound(Uuid),

    #[error("deployment {0} already exists")]
    DeploymentExists(Uuid),

    #[error("deployment {deployment} does not belong to endpoint {endpoint}")]
    ForeignDeployment { endpoint: Uuid, deployment: Uuid },
}

macro_rules! from_backend {
    ($($err:path),+ $(,)?) => {$(
        impl From<$err> for StoreError {
            fn from(e: $err) -> Self {
                StoreError::Backend(e.to_string())
            }
        }
    )+};
}

from_backend!(
    redb::DatabaseError,
    redb::TransactionError,
    redb::TableError,
    redb::StorageError,
    redb::CommitError,
);
