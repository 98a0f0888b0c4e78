//! Error types and result types for service operations.
//!
//! Validation failures ([`ValidationError`]) are raised before any store I/O takes place.
//! Store failures are carried unchanged inside [`ServiceError::Store`] so callers can
//! downcast them to the driver's own error type.
//! Use [`ServiceResult<T>`] as the return type for fallible operations.

use bson::error::Error as BsonError;
use serde_json::Error as SerdeJsonError;
use std::error::Error as StdError;
use thiserror::Error;

/// A value failed validation at the model boundary.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// The raw value is not a syntactically valid document identifier.
    #[error("Invalid StrObjectId: {0}")]
    InvalidObjectId(String),
    /// The raw value could not be parsed as a date-time.
    #[error("Invalid datetime: {0}")]
    InvalidDateTime(String),
    /// The date-time carries an offset other than UTC.
    #[error("Non-UTC timezone: {0}")]
    NonUtcTimezone(String),
    /// An application-defined rule rejected the data.
    #[error("{0}")]
    Rule(String),
}

/// Represents all possible errors that can occur when using a service.
#[derive(Error, Debug)]
pub enum ServiceError {
    /// Input data failed validation. No store call was made.
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
    /// Serialization/deserialization error when converting between document formats (BSON, JSON).
    #[error("Serialization error: {0}")]
    Serialization(String),
    /// The data does not have the structure of a document.
    #[error("Invalid document: {0}")]
    InvalidDocument(String),
    /// Error during store initialization or connection setup.
    #[error("Initialization error: {0}")]
    Initialization(String),
    /// An error raised by the underlying store, passed through unchanged.
    #[error("Store error: {0}")]
    Store(#[source] Box<dyn StdError + Send + Sync>),
}

impl ServiceError {
    /// Wraps a store error without altering it.
    pub fn store<E>(err: E) -> Self
    where
        E: StdError + Send + Sync + 'static,
    {
        ServiceError::Store(Box::new(err))
    }

    /// Returns the store error as `E` if this is a store error of that type.
    pub fn downcast_store_ref<E: StdError + 'static>(&self) -> Option<&E> {
        match self {
            ServiceError::Store(err) => err.downcast_ref::<E>(),
            _ => None,
        }
    }
}

/// A specialized `Result` type for service operations.
pub type ServiceResult<T> = Result<T, ServiceError>;

impl From<BsonError> for ServiceError {
    fn from(err: BsonError) -> Self {
        ServiceError::Serialization(err.to_string())
    }
}

impl From<SerdeJsonError> for ServiceError {
    fn from(err: SerdeJsonError) -> Self {
        ServiceError::Serialization(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Error)]
    #[error("duplicate key")]
    struct DuplicateKey;

    #[test]
    fn store_errors_stay_downcastable() {
        let err = ServiceError::store(DuplicateKey);

        assert!(err.downcast_store_ref::<DuplicateKey>().is_some());
        assert_eq!(err.to_string(), "Store error: duplicate key");
    }

    #[test]
    fn validation_errors_convert() {
        let err: ServiceError = ValidationError::Rule("name taken".into()).into();

        assert!(matches!(err, ServiceError::Validation(ValidationError::Rule(_))));
        assert!(err.downcast_store_ref::<DuplicateKey>().is_none());
    }
}
