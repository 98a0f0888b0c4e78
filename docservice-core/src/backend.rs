//! Capabilities the service expects from the underlying store.
//!
//! This module defines the two collaborators the service forwards to:
//!
//! - [`Database`]: a shared database handle that resolves named collections.
//! - [`CollectionHandle`]: a binding to one collection exposing the store's CRUD,
//!   index and aggregation operations.
//!
//! Implementations translate the backend-agnostic option shapes from
//! [`options`](crate::options) to their driver and return results verbatim. They never
//! retry, and store failures surface as [`ServiceError::Store`](crate::error::ServiceError::Store).
//!
//! # Examples
//!
//! ```ignore
//! use docservice::backend::{CollectionHandle, Database};
//! use docservice::options::CollectionOptions;
//! use bson::doc;
//!
//! let users = database.collection("users", &CollectionOptions::default());
//! let result = users.insert_one(doc! { "name": "Alice" }, None, Default::default()).await?;
//! println!("inserted {}", result.inserted_id);
//! ```

use async_trait::async_trait;
use bson::{Bson, Document};
use futures::stream::BoxStream;
use std::{fmt::Debug, sync::Arc};

use crate::{
    error::ServiceResult,
    options::{
        AggregateOptions, CollectionOptions, CreateIndexOptions, DeleteOptions, DropIndexOptions,
        FindOptions, InsertOneOptions, ListIndexesOptions, UpdateManyOptions, UpdateOneOptions,
    },
    query::{IndexKeys, IndexRef, MongoProjection, MongoQuery, UpdateObject},
};

/// A lazy, single-pass stream of documents backed by a store cursor.
///
/// Polling the stream may perform network I/O per batch. Once exhausted it cannot be restarted.
pub type DocumentCursor<'a> = BoxStream<'a, ServiceResult<Document>>;

/// Result of an insert. Exposes the identifier assigned by the store (or the caller).
#[derive(Debug, Clone, PartialEq)]
pub struct InsertOneResult {
    pub inserted_id: Bson,
}

/// Result of an update.
#[derive(Debug, Clone, PartialEq)]
pub struct UpdateResult {
    pub matched_count: u64,
    pub modified_count: u64,
    /// Identifier of the inserted document when an upsert created one.
    pub upserted_id: Option<Bson>,
}

/// Result of a delete.
#[derive(Debug, Clone, PartialEq)]
pub struct DeleteResult {
    pub deleted_count: u64,
}

/// A shared database handle.
///
/// The handle is never mutated or closed by the service; many services may share one.
pub trait Database: Send + Sync + Debug {
    /// The collection handle type produced by this database.
    type Collection: CollectionHandle;

    /// Resolves a handle to the named collection using the given configuration.
    fn collection(&self, name: &str, options: &CollectionOptions) -> Self::Collection;
}

impl<D: Database> Database for &D {
    type Collection = D::Collection;

    fn collection(&self, name: &str, options: &CollectionOptions) -> Self::Collection {
        (**self).collection(name, options)
    }
}

impl<D: Database> Database for Arc<D> {
    type Collection = D::Collection;

    fn collection(&self, name: &str, options: &CollectionOptions) -> Self::Collection {
        (**self).collection(name, options)
    }
}

/// A binding to one named collection.
///
/// Every operation accepts an optional session. Sessions are opaque to the service; they
/// only control store-side transactional scope.
///
/// # Thread Safety
///
/// Implementations must be thread-safe: a single handle is shared by every call a
/// service makes.
#[async_trait]
pub trait CollectionHandle: Send + Sync + Debug {
    /// The store's session type.
    type Session: Send;

    /// Returns the collection name.
    fn name(&self) -> &str;

    /// Runs an aggregation pipeline and returns a cursor over its output.
    async fn aggregate<'a>(
        &'a self,
        pipeline: Vec<Document>,
        session: Option<&'a mut Self::Session>,
        options: AggregateOptions,
    ) -> ServiceResult<DocumentCursor<'a>>;

    /// Creates an index and returns its name.
    async fn create_index(
        &self,
        keys: IndexKeys,
        name: String,
        unique: bool,
        session: Option<&mut Self::Session>,
        options: CreateIndexOptions,
    ) -> ServiceResult<String>;

    /// Drops one index.
    async fn drop_index(
        &self,
        index: IndexRef,
        session: Option<&mut Self::Session>,
        options: DropIndexOptions,
    ) -> ServiceResult<()>;

    /// Drops every index of the collection except the one on `_id`.
    async fn drop_indexes(
        &self,
        session: Option<&mut Self::Session>,
        options: DropIndexOptions,
    ) -> ServiceResult<()>;

    /// Returns a cursor over the index descriptions of the collection.
    async fn list_indexes<'a>(
        &'a self,
        session: Option<&'a mut Self::Session>,
        options: ListIndexesOptions,
    ) -> ServiceResult<DocumentCursor<'a>>;

    /// Deletes the first document matching `query`.
    async fn delete_one(
        &self,
        query: MongoQuery,
        session: Option<&mut Self::Session>,
        options: DeleteOptions,
    ) -> ServiceResult<DeleteResult>;

    /// Deletes every document matching `query`.
    async fn delete_many(
        &self,
        query: MongoQuery,
        session: Option<&mut Self::Session>,
        options: DeleteOptions,
    ) -> ServiceResult<DeleteResult>;

    /// Returns a cursor over the documents matching `query`.
    async fn find<'a>(
        &'a self,
        query: MongoQuery,
        projection: Option<MongoProjection>,
        session: Option<&'a mut Self::Session>,
        options: FindOptions,
    ) -> ServiceResult<DocumentCursor<'a>>;

    /// Returns the first document matching `query`, if any.
    async fn find_one(
        &self,
        query: MongoQuery,
        projection: Option<MongoProjection>,
        session: Option<&mut Self::Session>,
        options: FindOptions,
    ) -> ServiceResult<Option<Document>>;

    /// Inserts one document.
    async fn insert_one(
        &self,
        document: Document,
        session: Option<&mut Self::Session>,
        options: InsertOneOptions,
    ) -> ServiceResult<InsertOneResult>;

    /// Applies `update` to the first document matching `query`.
    async fn update_one(
        &self,
        query: MongoQuery,
        update: UpdateObject,
        session: Option<&mut Self::Session>,
        options: UpdateOneOptions,
    ) -> ServiceResult<UpdateResult>;

    /// Applies `update` to every document matching `query`.
    async fn update_many(
        &self,
        query: MongoQuery,
        update: UpdateObject,
        session: Option<&mut Self::Session>,
        options: UpdateManyOptions,
    ) -> ServiceResult<UpdateResult>;
}

/// Factory trait for creating database handles.
#[async_trait]
pub trait DatabaseBuilder: Send + Sync {
    type Database: Database;

    /// Builds and returns the database handle.
    async fn build(self) -> ServiceResult<Self::Database>;
}
