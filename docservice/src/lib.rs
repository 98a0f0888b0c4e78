//! Main docservice crate providing a typed CRUD service layer over document databases.
//!
//! This crate is the primary entry point for users of the docservice project.
//! It re-exports the core types and the derive macros, and provides access to the
//! available store backends.
//!
//! # Features
//!
//! - **Typed models** - Stored documents, insert shapes and partial-update shapes defined with Serde
//! - **Store-native values** - `StrObjectId` and `UtcDateTime` validate at the model boundary
//! - **Generic service** - One `Service` per collection, with overridable insert and update hooks
//! - **Validators** - Asynchronous checks run before every write
//! - **Multiple backends** - In-memory storage for tests, MongoDB behind the `mongodb` feature
//!
//! # Quick Start
//!
//! ```ignore
//! use docservice::{prelude::*, memory::MemoryDatabase};
//! use serde::{Serialize, Deserialize};
//!
//! #[derive(Debug, Serialize, Deserialize, DocumentModel)]
//! pub struct User {
//!     #[serde(rename = "_id")]
//!     pub id: StrObjectId,
//!     pub name: String,
//!     pub created_at: UtcDateTime,
//! }
//!
//! #[derive(Debug, Serialize)]
//! pub struct UserCreate {
//!     pub name: String,
//!     pub created_at: UtcDateTime,
//! }
//!
//! #[derive(Debug, Default, Serialize, UpdateModel)]
//! pub struct UserUpdate {
//!     pub name: Patch<String>,
//! }
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let users: Service<_, UserCreate, UserUpdate> = Service::new(MemoryDatabase::new(), "users");
//!
//!     let created = users
//!         .insert_one(&UserCreate { name: "Alice".into(), created_at: UtcDateTime::now() }, None, None)
//!         .await?;
//!     let id = StrObjectId::try_from(&created.inserted_id)?;
//!
//!     users
//!         .update_by_id(&id, &UserUpdate { name: "Alicia".to_string().into() }, None, None)
//!         .await?;
//!
//!     if let Some(document) = users.get_by_id(&id, None, None, None).await? {
//!         let user = User::from_document(document)?;
//!         println!("{}", user.to_api_json()?);
//!     }
//!
//!     Ok(())
//! }
//! ```
//!
//! # Custom Hooks
//!
//! Override `prepare_for_insert` or `prepare_for_update` to reshape what reaches the store,
//! for example to stamp an update time on every update:
//!
//! ```ignore
//! use docservice::prelude::*;
//!
//! struct Stamped;
//!
//! impl ServiceHooks<UserCreate, UserUpdate> for Stamped {
//!     fn prepare_for_update(&self, data: &UserUpdate) -> ServiceResult<UpdateObject> {
//!         let mut fields = data.to_set_document()?;
//!         fields.insert("updated_at", UtcDateTime::now());
//!         Ok(UpdateObject::set(fields))
//!     }
//! }
//!
//! let users = Service::with_hooks(MemoryDatabase::new(), "users", Stamped);
//! ```
//!
//! # Backends
//!
//! - [`memory`] - In-memory storage for development and testing
//! - [`mongodb`] - MongoDB backend (requires `mongodb` feature)

#[allow(unused_extern_crates)]
extern crate self as docservice;

pub mod prelude;

pub use docservice_core::{
    backend, datetime, error, filter, id, model, options, provider, query, service, validator,
};
pub use docservice_macros::{DocumentModel, UpdateModel};

// Re-exported for generated code and convenience
pub use async_trait;
pub use bson;

/// In-memory storage backend.
pub mod memory {
    pub use docservice_memory::{
        MemoryCollection, MemoryDatabase, MemoryDatabaseBuilder, MemorySession, MemoryStoreError,
    };
}

/// MongoDB storage backend.
///
/// This module is only available when the `mongodb` feature is enabled.
#[cfg(feature = "mongodb")]
pub mod mongodb {
    pub use docservice_mongodb::{MongoCollection, MongoDatabase, MongoDatabaseBuilder};
}
