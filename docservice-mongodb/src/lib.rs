//! MongoDB backend for docservice.
//!
//! This crate implements the `Database` and `CollectionHandle` traits on top of the
//! official `mongodb` driver. Operations are forwarded verbatim: queries, updates and
//! pipelines go to the server unmodified, and driver errors surface unchanged inside
//! `ServiceError::Store`.
//!
//! To use this backend, include the `mongodb` feature in your `Cargo.toml`:
//!
//! ```toml
//! [dependencies]
//! docservice = { version = "x.y.z", features = ["mongodb"] }
//! ```
//!
//! # Features
//!
//! - **Option translation** - Every backend-agnostic option maps onto its driver counterpart
//! - **Collection configuration** - Read preference, read concern and write concern per service
//! - **Sessions** - Pass a `ClientSession` to any operation; session cursors are driven with it
//! - **Lazy cursors** - `find`, `aggregate` and `list_indexes` stream batches on demand
//!
//! # Example
//!
//! ```ignore
//! use docservice::{prelude::*, backend::DatabaseBuilder, mongodb::MongoDatabase};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let database = MongoDatabase::builder("mongodb://localhost:27017", "my_database")
//!         .build()
//!         .await?;
//!     let users: Service<_, UserCreate, UserUpdate> = Service::new(database.clone(), "users");
//!
//!     let mut session = database.start_session().await?;
//!     users.insert_one(&UserCreate { name: "Alice".into() }, Some(&mut session), None).await?;
//!
//!     Ok(())
//! }
//! ```

#[allow(unused_extern_crates)]
extern crate self as docservice_mongodb;

mod options;
pub mod store;

pub use store::{MongoCollection, MongoDatabase, MongoDatabaseBuilder};
