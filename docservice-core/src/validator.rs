//! Asynchronous validators run by the service before writes.
//!
//! A validator receives the insert or update data (and, for updates, the query) and may
//! perform its own lookups, e.g. checking that a name is not taken yet. Failing validators
//! abort the write before the store is called.
//!
//! ```ignore
//! use docservice::{validator::{Validator, ValidateOn}, error::ValidationError};
//!
//! struct NameNotBlank;
//!
//! #[async_trait::async_trait]
//! impl Validator<UserCreate, UserUpdate> for NameNotBlank {
//!     fn scope(&self) -> ValidateOn { ValidateOn::Insert }
//!
//!     async fn validate_insert(&self, data: &UserCreate) -> Result<(), ValidationError> {
//!         if data.name.trim().is_empty() {
//!             return Err(ValidationError::Rule("name must not be blank".into()));
//!         }
//!         Ok(())
//!     }
//! }
//! ```

use async_trait::async_trait;

use crate::{error::ValidationError, query::MongoQuery};

/// The writes a validator applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ValidateOn {
    Insert,
    Update,
    #[default]
    InsertUpdate,
}

impl ValidateOn {
    pub fn inserts(&self) -> bool {
        matches!(self, ValidateOn::Insert | ValidateOn::InsertUpdate)
    }

    pub fn updates(&self) -> bool {
        matches!(self, ValidateOn::Update | ValidateOn::InsertUpdate)
    }
}

/// Validates insert and update data for a service.
#[async_trait]
pub trait Validator<I, U>: Send + Sync
where
    I: Sync,
    U: Sync,
{
    /// The writes this validator applies to.
    fn scope(&self) -> ValidateOn {
        ValidateOn::InsertUpdate
    }

    /// Validates data about to be inserted.
    async fn validate_insert(&self, _data: &I) -> Result<(), ValidationError> {
        Ok(())
    }

    /// Validates an update about to be applied to the documents matching `query`.
    async fn validate_update(&self, _query: Option<&MongoQuery>, _data: &U) -> Result<(), ValidationError> {
        Ok(())
    }
}
