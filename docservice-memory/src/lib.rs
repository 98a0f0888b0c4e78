//! In-memory document store backend for docservice.
//!
//! This crate provides a thread-safe, in-memory implementation of the `Database` and
//! `CollectionHandle` traits. It uses async-aware read-write locks for concurrent access
//! and is meant for development and tests.
//!
//! # Features
//!
//! - **Query documents** - Equality, comparison, membership, `$exists` and logical operators, dotted paths
//! - **Updates** - `$set`, `$unset`, `$inc`, `$push`, `$setOnInsert`, simple pipeline updates and upserts
//! - **Reads** - Sort, skip, limit and projection, plus a subset of aggregation stages
//! - **Indexes** - Named indexes with unique and sparse enforcement
//!
//! # Quick Start
//!
//! ```ignore
//! use docservice::{prelude::*, memory::MemoryDatabase};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let database = MemoryDatabase::builder().build().await?;
//!     let users: Service<_, UserCreate, UserUpdate> = Service::new(database, "users");
//!
//!     let created = users.insert_one(&UserCreate { name: "Alice".into() }, None, None).await?;
//!     let stored = users.find_one(doc! { "_id": created.inserted_id }, None, None, None).await?;
//!
//!     Ok(())
//! }
//! ```

#[allow(unused_extern_crates)]
extern crate self as docservice_memory;

pub mod error;
mod evaluator;
mod pipeline;
pub mod store;
mod update;

pub use error::MemoryStoreError;
pub use store::{MemoryCollection, MemoryDatabase, MemoryDatabaseBuilder, MemorySession};
