//! Errors raised by the in-memory store.
//!
//! They reach callers wrapped in [`ServiceError::Store`](docservice_core::error::ServiceError::Store)
//! and can be recovered with `downcast_store_ref::<MemoryStoreError>()`.

use thiserror::Error;

use docservice_core::error::ServiceError;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum MemoryStoreError {
    /// A write would violate a unique index.
    #[error("duplicate key error collection: {collection} index: {index} dup key: {key}")]
    DuplicateKey {
        collection: String,
        index: String,
        key: String,
    },
    #[error("index not found with name [{0}]")]
    IndexNotFound(String),
    /// An index with the same name but different keys or uniqueness already exists.
    #[error("an existing index has the same name as the requested index: {0}")]
    IndexConflict(String),
    #[error("cannot drop _id index")]
    CannotDropIdIndex,
    #[error("unsupported operator: {0}")]
    UnsupportedOperator(String),
    #[error("invalid update: {0}")]
    InvalidUpdate(String),
    #[error("invalid projection: {0}")]
    InvalidProjection(String),
    #[error("invalid pipeline stage: {0}")]
    InvalidStage(String),
}

impl From<MemoryStoreError> for ServiceError {
    fn from(err: MemoryStoreError) -> Self {
        ServiceError::store(err)
    }
}

pub type MemoryStoreResult<T> = Result<T, MemoryStoreError>;
