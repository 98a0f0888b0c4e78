//! Per-operation option shapes.
//!
//! Each operation family has its own options struct. Every field is optional and an unset
//! field means "use the store's own default": the service never fills in defaults itself.
//! Build them with struct update syntax:
//!
//! ```ignore
//! use docservice::options::FindOptions;
//! use bson::doc;
//!
//! let options = FindOptions {
//!     sort: Some(doc! { "created_at": -1 }),
//!     limit: Some(20),
//!     ..Default::default()
//! };
//! ```

use bson::{Bson, Document};
use std::time::Duration;

/// Read preference applied to operations on a collection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReadPreference {
    Primary,
    PrimaryPreferred,
    Secondary,
    SecondaryPreferred,
    Nearest,
}

/// Read concern level applied to reads on a collection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReadConcern {
    Local,
    Majority,
    Linearizable,
    Available,
    Snapshot,
}

/// Acknowledgment requested from the store for writes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Acknowledgment {
    /// Wait for the given number of nodes.
    Nodes(u32),
    /// Wait for a majority of voting nodes.
    Majority,
    /// A custom, tag-based acknowledgment.
    Custom(String),
}

/// Write concern applied to writes on a collection.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WriteConcern {
    pub w: Option<Acknowledgment>,
    pub journal: Option<bool>,
    pub w_timeout: Option<Duration>,
}

/// Collection-level configuration, read once when the collection handle is resolved.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CollectionOptions {
    pub read_preference: Option<ReadPreference>,
    pub write_concern: Option<WriteConcern>,
    pub read_concern: Option<ReadConcern>,
}

/// Cursor behaviour of a find operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CursorType {
    NonTailable,
    Tailable,
    TailableAwait,
}

/// Index hint for an operation.
#[derive(Debug, Clone, PartialEq)]
pub enum Hint {
    /// Index key specification, e.g. `{ "a": 1 }`.
    Keys(Document),
    /// Index name.
    Name(String),
}

impl From<&str> for Hint {
    fn from(name: &str) -> Self {
        Hint::Name(name.to_string())
    }
}

impl From<Document> for Hint {
    fn from(keys: Document) -> Self {
        Hint::Keys(keys)
    }
}

/// Options of `find` and `find_one`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FindOptions {
    pub skip: Option<u64>,
    pub limit: Option<i64>,
    pub no_cursor_timeout: Option<bool>,
    pub cursor_type: Option<CursorType>,
    pub sort: Option<Document>,
    pub allow_partial_results: Option<bool>,
    pub oplog_replay: Option<bool>,
    pub batch_size: Option<u32>,
    /// Collation document, e.g. `{ "locale": "en", "strength": 2 }`.
    pub collation: Option<Document>,
    pub hint: Option<Hint>,
    pub max_scan: Option<u64>,
    pub max_time: Option<Duration>,
    pub max: Option<Document>,
    pub min: Option<Document>,
    pub return_key: Option<bool>,
    pub show_record_id: Option<bool>,
    pub snapshot: Option<bool>,
    pub comment: Option<Bson>,
    pub allow_disk_use: Option<bool>,
    pub let_vars: Option<Document>,
}

/// Options of `insert_one`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InsertOneOptions {
    pub bypass_document_validation: Option<bool>,
    pub comment: Option<Bson>,
}

/// Options of `update_one` and `update_by_id`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UpdateOneOptions {
    pub upsert: Option<bool>,
    pub bypass_document_validation: Option<bool>,
    pub collation: Option<Document>,
    pub array_filters: Option<Vec<Document>>,
    pub hint: Option<Hint>,
    pub let_vars: Option<Document>,
    pub comment: Option<Bson>,
}

/// Options of `update_many`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UpdateManyOptions {
    pub upsert: Option<bool>,
    pub array_filters: Option<Vec<Document>>,
    pub bypass_document_validation: Option<bool>,
    pub collation: Option<Document>,
    pub hint: Option<Hint>,
    pub let_vars: Option<Document>,
    pub comment: Option<Bson>,
}

impl From<UpdateManyOptions> for UpdateOneOptions {
    fn from(options: UpdateManyOptions) -> Self {
        Self {
            upsert: options.upsert,
            bypass_document_validation: options.bypass_document_validation,
            collation: options.collation,
            array_filters: options.array_filters,
            hint: options.hint,
            let_vars: options.let_vars,
            comment: options.comment,
        }
    }
}

/// Options of `delete_one`, `delete_many` and `delete_by_id`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DeleteOptions {
    pub collation: Option<Document>,
    pub hint: Option<Hint>,
    pub let_vars: Option<Document>,
    pub comment: Option<Bson>,
}

/// Options of `aggregate`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AggregateOptions {
    pub allow_disk_use: Option<bool>,
    pub batch_size: Option<u32>,
    pub bypass_document_validation: Option<bool>,
    pub collation: Option<Document>,
    pub hint: Option<Hint>,
    pub max_time: Option<Duration>,
    pub comment: Option<Bson>,
    pub let_vars: Option<Document>,
}

/// Options of `create_index`. The index name and uniqueness are explicit arguments.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CreateIndexOptions {
    pub background: Option<bool>,
    pub collation: Option<Document>,
    pub sparse: Option<bool>,
    pub expire_after: Option<Duration>,
    pub partial_filter_expression: Option<Document>,
    pub max_time: Option<Duration>,
    pub comment: Option<Bson>,
}

/// Options of `drop_index` and `drop_indexes`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DropIndexOptions {
    pub max_time: Option<Duration>,
    pub comment: Option<Bson>,
}

/// Options of `list_indexes`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ListIndexesOptions {
    pub max_time: Option<Duration>,
    pub batch_size: Option<u32>,
    pub comment: Option<Bson>,
}
