//! Model contracts: stored documents, insert shapes and update shapes.
//!
//! - [`DocumentModel`] is the canonical shape of a stored record. Its identity field is
//!   `id` in Rust and `_id` on the wire.
//! - [`InsertModel`] is any serializable input for an insert. The whole model is written.
//! - [`UpdateModel`] is an input for a partial update. Only the fields the caller
//!   explicitly set are written; [`Patch`] marks such fields.
//!
//! # Example
//!
//! ```ignore
//! use docservice::prelude::*;
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
//!     pub nickname: Patch<Option<String>>,
//! }
//! ```

use bson::{Bson, Document, de::deserialize_from_document, ser::serialize_to_bson};
use serde::{Deserialize, Serialize, Serializer, de::DeserializeOwned};
use serde_json::{Map, Value};

use crate::{
    backend::DeleteResult,
    error::{ServiceError, ServiceResult},
    id::StrObjectId,
};

/// Name of the store's reserved identifier field.
pub const ID_FIELD: &str = "_id";

/// Core trait of every store-backed domain model.
///
/// The identifier must be declared as `#[serde(rename = "_id")] id: StrObjectId`;
/// `#[derive(DocumentModel)]` checks this at compile time.
pub trait DocumentModel: Serialize + DeserializeOwned + Send + Sync {
    /// Returns the identifier of this document.
    fn id(&self) -> &StrObjectId;
}

/// Conversion helpers for [`DocumentModel`] types.
///
/// Automatically implemented for all document models.
pub trait DocumentModelExt: DocumentModel {
    /// Converts this model to its storage form.
    fn to_document(&self) -> ServiceResult<Document>;

    /// Parses and validates a model from a stored document.
    fn from_document(document: Document) -> ServiceResult<Self>;

    /// Converts this model to its external (API) representation.
    ///
    /// The identifier surfaces as `id`, identifiers render as hex strings and
    /// datetimes as RFC 3339 UTC strings.
    fn to_api_json(&self) -> ServiceResult<Value>;
}

impl<M: DocumentModel> DocumentModelExt for M {
    fn to_document(&self) -> ServiceResult<Document> {
        serialize_document(self)
    }

    fn from_document(document: Document) -> ServiceResult<Self> {
        Ok(deserialize_from_document(document)?)
    }

    fn to_api_json(&self) -> ServiceResult<Value> {
        Ok(document_to_api_json(self.to_document()?))
    }
}

/// Converts a stored document to its external representation.
///
/// A top-level `_id` is renamed to `id`. See [`DocumentModelExt::to_api_json`].
pub fn document_to_api_json(document: Document) -> Value {
    Value::Object(
        document
            .into_iter()
            .map(|(key, value)| {
                let key = if key == ID_FIELD { "id".to_string() } else { key };
                (key, bson_to_api_json(value))
            })
            .collect::<Map<_, _>>(),
    )
}

fn bson_to_api_json(value: Bson) -> Value {
    match value {
        Bson::ObjectId(oid) => Value::String(oid.to_hex()),
        Bson::DateTime(datetime) => Value::String(
            datetime
                .to_chrono()
                .to_rfc3339_opts(chrono::SecondsFormat::AutoSi, true),
        ),
        Bson::Array(items) => Value::Array(items.into_iter().map(bson_to_api_json).collect()),
        Bson::Document(document) => Value::Object(
            document
                .into_iter()
                .map(|(key, value)| (key, bson_to_api_json(value)))
                .collect::<Map<_, _>>(),
        ),
        other => other.into_relaxed_extjson(),
    }
}

/// Serializes a value that must have the structure of a document.
pub fn serialize_document<T: Serialize + ?Sized>(value: &T) -> ServiceResult<Document> {
    match serialize_to_bson(value)? {
        Bson::Document(document) => Ok(document),
        other => Err(ServiceError::InvalidDocument(format!(
            "expected a document, got {:?}",
            other.element_type()
        ))),
    }
}

/// An input shape for inserts.
///
/// Implemented for every serializable type.
pub trait InsertModel: Serialize + Send + Sync {
    /// Serializes the entire model, including fields left at their default value.
    fn to_insert_document(&self) -> ServiceResult<Document> {
        serialize_document(self)
    }
}

impl<T: Serialize + Send + Sync> InsertModel for T {}

/// An input shape for partial updates.
///
/// Derive it with `#[derive(UpdateModel)]`, or implement
/// [`to_set_document`](UpdateModel::to_set_document) by hand.
pub trait UpdateModel: Serialize + Send + Sync {
    /// Serializes only the fields the caller explicitly set.
    fn to_set_document(&self) -> ServiceResult<Document>;
}

/// Reports whether an update-model field was explicitly set.
pub trait FieldState {
    fn is_unset(&self) -> bool;
}

impl<T> FieldState for Option<T> {
    fn is_unset(&self) -> bool {
        self.is_none()
    }
}

impl<T> FieldState for Patch<T> {
    fn is_unset(&self) -> bool {
        matches!(self, Patch::Unset)
    }
}

/// A field of an update model that is either left alone or explicitly set.
///
/// Use `Patch<Option<T>>` to be able to explicitly set a field to null.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Patch<T> {
    #[default]
    Unset,
    Set(T),
}

impl<T> Patch<T> {
    pub fn is_unset(&self) -> bool {
        matches!(self, Patch::Unset)
    }

    pub fn is_set(&self) -> bool {
        !self.is_unset()
    }

    pub fn as_ref(&self) -> Patch<&T> {
        match self {
            Patch::Unset => Patch::Unset,
            Patch::Set(value) => Patch::Set(value),
        }
    }

    pub fn into_option(self) -> Option<T> {
        match self {
            Patch::Unset => None,
            Patch::Set(value) => Some(value),
        }
    }
}

impl<T> From<T> for Patch<T> {
    fn from(value: T) -> Self {
        Patch::Set(value)
    }
}

impl<T: Serialize> Serialize for Patch<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            // Unset fields are dropped from update payloads before they reach the store.
            Patch::Unset => serializer.serialize_none(),
            Patch::Set(value) => value.serialize(serializer),
        }
    }
}

impl<'de, T: Deserialize<'de>> Deserialize<'de> for Patch<T> {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        T::deserialize(deserializer).map(Patch::Set)
    }
}

/// External shape of a delete result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeleteResultModel {
    pub delete_count: u64,
}

impl From<DeleteResult> for DeleteResultModel {
    fn from(result: DeleteResult) -> Self {
        Self { delete_count: result.deleted_count }
    }
}
