//! A typed data-access layer over document databases.
//!
//! This crate is the core of the docservice project and provides:
//!
//! - **Value types** ([`id`], [`datetime`]) - Store identifiers and UTC datetimes with permissive parsing
//! - **Model contracts** ([`model`]) - Stored documents, insert shapes and partial-update shapes
//! - **Store abstraction** ([`backend`]) - Traits a document store implements to back a service
//! - **Option shapes** ([`options`]) - Backend-agnostic per-operation and per-collection options
//! - **Queries** ([`query`], [`filter`]) - Query, update and index shapes plus a typed filter builder
//! - **Service** ([`service`]) - The generic CRUD service with its insert and update hooks
//! - **Validators** ([`validator`]) - Asynchronous checks run before writes
//! - **Providers** ([`provider`]) - Client and database providers for dependency injection
//! - **Error handling** ([`error`]) - Error and result types
//!
//! # Example
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
//! }
//!
//! #[derive(Debug, Serialize)]
//! pub struct UserCreate {
//!     pub name: String,
//! }
//!
//! #[derive(Debug, Default, Serialize, UpdateModel)]
//! pub struct UserUpdate {
//!     pub name: Patch<String>,
//! }
//!
//! let users: Service<_, UserCreate, UserUpdate> = Service::new(MemoryDatabase::new(), "users");
//! ```

#[allow(unused_extern_crates)]
extern crate self as docservice_core;

pub mod backend;
pub mod datetime;
pub mod error;
pub mod filter;
pub mod id;
pub mod model;
pub mod options;
pub mod provider;
pub mod query;
pub mod service;
pub mod validator;
