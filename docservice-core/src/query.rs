//! Shapes of the objects passed to the store: queries, projections, updates and index keys.
//!
//! Queries and projections are plain BSON documents. Updates are either a single update
//! document or an aggregation pipeline. Index keys and index references are typed so
//! callers cannot pass a malformed key specification.

use bson::{Bson, Document, doc};

/// Store query object, e.g. `{ "name": "Alice" }`.
pub type MongoQuery = Document;

/// Store projection object, e.g. `{ "name": 1, "_id": 0 }`.
pub type MongoProjection = Document;

/// Store update object.
#[derive(Debug, Clone, PartialEq)]
pub enum UpdateObject {
    /// A single update document, e.g. `{ "$set": { "name": "Bob" } }`.
    Document(Document),
    /// An aggregation pipeline update.
    Pipeline(Vec<Document>),
}

impl UpdateObject {
    /// Wraps the given fields in a `$set` directive.
    pub fn set(fields: Document) -> Self {
        UpdateObject::Document(doc! { "$set": fields })
    }
}

impl From<Document> for UpdateObject {
    fn from(document: Document) -> Self {
        UpdateObject::Document(document)
    }
}

impl From<Vec<Document>> for UpdateObject {
    fn from(pipeline: Vec<Document>) -> Self {
        UpdateObject::Pipeline(pipeline)
    }
}

/// Direction or type of one indexed field.
#[derive(Debug, Clone, PartialEq)]
pub enum IndexDirection {
    /// `1`
    Ascending,
    /// `-1`
    Descending,
    /// `"text"`
    Text,
    /// `"hashed"`
    Hashed,
    /// `"2dsphere"`
    Geo2dSphere,
}

impl IndexDirection {
    fn to_bson(&self) -> Bson {
        match self {
            IndexDirection::Ascending => Bson::Int32(1),
            IndexDirection::Descending => Bson::Int32(-1),
            IndexDirection::Text => Bson::String("text".into()),
            IndexDirection::Hashed => Bson::String("hashed".into()),
            IndexDirection::Geo2dSphere => Bson::String("2dsphere".into()),
        }
    }

    fn name_part(&self) -> &'static str {
        match self {
            IndexDirection::Ascending => "1",
            IndexDirection::Descending => "-1",
            IndexDirection::Text => "text",
            IndexDirection::Hashed => "hashed",
            IndexDirection::Geo2dSphere => "2dsphere",
        }
    }
}

/// Key specification of an index.
#[derive(Debug, Clone, PartialEq)]
pub enum IndexKeys {
    /// A single ascending field.
    Field(String),
    /// Ordered field/direction pairs.
    Compound(Vec<(String, IndexDirection)>),
}

impl IndexKeys {
    /// Creates a single-field ascending key specification.
    pub fn field(name: impl Into<String>) -> Self {
        IndexKeys::Field(name.into())
    }

    /// Creates an ordered compound key specification.
    pub fn compound<S: Into<String>>(keys: impl IntoIterator<Item = (S, IndexDirection)>) -> Self {
        IndexKeys::Compound(
            keys.into_iter()
                .map(|(field, direction)| (field.into(), direction))
                .collect(),
        )
    }

    /// Returns the key document, e.g. `{ "a": 1, "b": -1 }`.
    pub fn to_document(&self) -> Document {
        match self {
            IndexKeys::Field(field) => doc! { field.as_str(): 1 },
            IndexKeys::Compound(keys) => keys
                .iter()
                .map(|(field, direction)| (field.clone(), direction.to_bson()))
                .collect(),
        }
    }

    /// Returns the name the server gives this index when none is specified, e.g. `a_1_b_-1`.
    pub fn default_name(&self) -> String {
        match self {
            IndexKeys::Field(field) => format!("{field}_1"),
            IndexKeys::Compound(keys) => keys
                .iter()
                .map(|(field, direction)| format!("{field}_{}", direction.name_part()))
                .collect::<Vec<_>>()
                .join("_"),
        }
    }
}

impl From<&str> for IndexKeys {
    fn from(field: &str) -> Self {
        IndexKeys::Field(field.to_string())
    }
}

/// Identifies an index to drop, either by name or by its key specification.
#[derive(Debug, Clone, PartialEq)]
pub enum IndexRef {
    Name(String),
    Keys(IndexKeys),
}

impl IndexRef {
    /// Resolves the reference to an index name.
    pub fn name(&self) -> String {
        match self {
            IndexRef::Name(name) => name.clone(),
            IndexRef::Keys(keys) => keys.default_name(),
        }
    }
}

impl From<&str> for IndexRef {
    fn from(name: &str) -> Self {
        IndexRef::Name(name.to_string())
    }
}

impl From<String> for IndexRef {
    fn from(name: String) -> Self {
        IndexRef::Name(name)
    }
}

impl From<IndexKeys> for IndexRef {
    fn from(keys: IndexKeys) -> Self {
        IndexRef::Keys(keys)
    }
}
