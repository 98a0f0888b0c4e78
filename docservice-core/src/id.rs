//! Validated document identifiers.
//!
//! [`StrObjectId`] wraps the store-native [`ObjectId`] and can only be built from a value
//! the store recognizes as a valid identifier. It is stored in its native binary form and
//! exposed to application code as its canonical 24-character hexadecimal string.

use bson::{Bson, oid::ObjectId};
use serde::{Deserialize, Deserializer, Serialize, Serializer, de::Error as DeError};
use std::{fmt, str::FromStr};

use crate::error::ValidationError;

/// A validated document identifier.
///
/// # Example
///
/// ```ignore
/// use docservice::id::StrObjectId;
///
/// let id: StrObjectId = "65a1f0c2e4b0a1b2c3d4e5f6".parse()?;
/// assert_eq!(id.to_string(), "65a1f0c2e4b0a1b2c3d4e5f6");
///
/// assert!(StrObjectId::parse("0123456789").is_err());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct StrObjectId(ObjectId);

impl StrObjectId {
    /// Generates a fresh identifier.
    pub fn new() -> Self {
        Self(ObjectId::new())
    }

    /// Validates and wraps the hexadecimal form of an identifier.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::InvalidObjectId`] unless `raw` is exactly 24 hex digits.
    pub fn parse(raw: &str) -> Result<Self, ValidationError> {
        ObjectId::parse_str(raw)
            .map(Self)
            .map_err(|_| ValidationError::InvalidObjectId(raw.to_string()))
    }

    /// Returns the wrapped store-native identifier.
    pub fn as_object_id(&self) -> &ObjectId {
        &self.0
    }

    /// Returns the canonical lowercase hexadecimal form.
    pub fn to_hex(&self) -> String {
        self.0.to_hex()
    }

    /// Returns the 12-byte binary form.
    pub fn bytes(&self) -> [u8; 12] {
        self.0.bytes()
    }
}

impl Default for StrObjectId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for StrObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0.to_hex())
    }
}

impl FromStr for StrObjectId {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<&str> for StrObjectId {
    type Error = ValidationError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Self::parse(value)
    }
}

impl TryFrom<String> for StrObjectId {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl TryFrom<&Bson> for StrObjectId {
    type Error = ValidationError;

    fn try_from(value: &Bson) -> Result<Self, Self::Error> {
        match value {
            Bson::ObjectId(oid) => Ok(Self(*oid)),
            Bson::String(s) => Self::parse(s),
            other => Err(ValidationError::InvalidObjectId(other.to_string())),
        }
    }
}

impl From<ObjectId> for StrObjectId {
    fn from(oid: ObjectId) -> Self {
        Self(oid)
    }
}

impl From<[u8; 12]> for StrObjectId {
    fn from(bytes: [u8; 12]) -> Self {
        Self(ObjectId::from_bytes(bytes))
    }
}

impl From<StrObjectId> for ObjectId {
    fn from(id: StrObjectId) -> Self {
        id.0
    }
}

impl From<StrObjectId> for Bson {
    fn from(id: StrObjectId) -> Self {
        Bson::ObjectId(id.0)
    }
}

impl Serialize for StrObjectId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.0.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for StrObjectId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        // Bson understands both the native form and `{"$oid": ...}`.
        let raw = Bson::deserialize(deserializer)?;

        StrObjectId::try_from(&raw).map_err(D::Error::custom)
    }
}
