//! Convenient re-exports of commonly used types from docservice.
//!
//! ```ignore
//! use docservice::prelude::*;
//! ```
//!
//! This provides access to:
//! - Model traits, their derives and the `Patch` field type
//! - Identifier and datetime value types
//! - The service, its hooks and validators
//! - Query, update and index shapes
//! - Store traits and error types

pub use crate::{DocumentModel, UpdateModel};
pub use docservice_core::{
    backend::{
        CollectionHandle, Database, DatabaseBuilder, DeleteResult, DocumentCursor, InsertOneResult, UpdateResult,
    },
    datetime::UtcDateTime,
    error::{ServiceError, ServiceResult, ValidationError},
    filter::{Expr, FieldOp, Filter},
    id::StrObjectId,
    model::{DeleteResultModel, DocumentModel, DocumentModelExt, InsertModel, Patch, UpdateModel},
    options::{
        AggregateOptions, CollectionOptions, CreateIndexOptions, DeleteOptions, DropIndexOptions, FindOptions,
        InsertOneOptions, ListIndexesOptions, UpdateManyOptions, UpdateOneOptions,
    },
    provider::{ClientProvider, DatabaseProvider},
    query::{IndexDirection, IndexKeys, IndexRef, MongoProjection, MongoQuery, UpdateObject},
    service::{DefaultHooks, Service, ServiceHooks},
    validator::{ValidateOn, Validator},
};
pub use bson::doc;
