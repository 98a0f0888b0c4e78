//! Application of update objects to stored documents.
//!
//! Supported update operators are `$set`, `$unset`, `$inc`, `$push` and `$setOnInsert`.
//! Pipeline updates support the `$set`, `$addFields` and `$unset` stages with literal
//! values; aggregation expressions are not evaluated.

use bson::{Bson, Document};

use docservice_core::{model::ID_FIELD, query::UpdateObject};

use crate::error::{MemoryStoreError, MemoryStoreResult};

/// Applies `update` to `document` in place.
///
/// `inserting` is set when the document is being created by an upsert, which enables
/// `$setOnInsert`.
pub(crate) fn apply_update(document: &mut Document, update: &UpdateObject, inserting: bool) -> MemoryStoreResult<()> {
    let id = document.get(ID_FIELD).cloned();

    match update {
        UpdateObject::Document(update) => apply_operators(document, update, inserting)?,
        UpdateObject::Pipeline(stages) => {
            for stage in stages {
                apply_stage(document, stage)?;
            }
        }
    }

    if id.is_some() && document.get(ID_FIELD) != id.as_ref() {
        return Err(MemoryStoreError::InvalidUpdate(
            "performing an update on the path '_id' would modify the immutable field '_id'".into(),
        ));
    }

    Ok(())
}

fn apply_operators(document: &mut Document, update: &Document, inserting: bool) -> MemoryStoreResult<()> {
    for (operator, fields) in update {
        let fields = match fields {
            Bson::Document(fields) => fields,
            _ if operator.starts_with('$') => {
                return Err(MemoryStoreError::InvalidUpdate(format!("{operator} expects a document")));
            }
            _ => {
                return Err(MemoryStoreError::InvalidUpdate(
                    "update document requires atomic operators".into(),
                ));
            }
        };

        match operator.as_str() {
            "$set" => {
                for (path, value) in fields {
                    set_path(document, path, value.clone())?;
                }
            }
            "$setOnInsert" if inserting => {
                for (path, value) in fields {
                    set_path(document, path, value.clone())?;
                }
            }
            "$setOnInsert" => {}
            "$unset" => {
                for path in fields.keys() {
                    unset_path(document, path);
                }
            }
            "$inc" => {
                for (path, amount) in fields {
                    let current = crate::evaluator::get_path(document, path).cloned();
                    set_path(document, path, increment(path, current, amount)?)?;
                }
            }
            "$push" => {
                for (path, value) in fields {
                    let mut items = match crate::evaluator::get_path(document, path) {
                        None => Vec::new(),
                        Some(Bson::Array(items)) => items.clone(),
                        Some(_) => {
                            return Err(MemoryStoreError::InvalidUpdate(format!(
                                "the field '{path}' must be an array"
                            )));
                        }
                    };
                    items.push(value.clone());
                    set_path(document, path, Bson::Array(items))?;
                }
            }
            other if other.starts_with('$') => {
                return Err(MemoryStoreError::UnsupportedOperator(other.to_string()));
            }
            _ => {
                return Err(MemoryStoreError::InvalidUpdate(
                    "update document requires atomic operators".into(),
                ));
            }
        }
    }

    Ok(())
}

fn apply_stage(document: &mut Document, stage: &Document) -> MemoryStoreResult<()> {
    let (name, spec) = single_entry(stage)?;

    match (name, spec) {
        ("$set" | "$addFields", Bson::Document(fields)) => {
            for (path, value) in fields {
                set_path(document, path, value.clone())?;
            }
        }
        ("$unset", Bson::String(path)) => unset_path(document, path),
        ("$unset", Bson::Array(paths)) => {
            for path in paths {
                match path {
                    Bson::String(path) => unset_path(document, path),
                    _ => return Err(MemoryStoreError::InvalidStage("$unset expects field names".into())),
                }
            }
        }
        ("$set" | "$addFields" | "$unset", _) => {
            return Err(MemoryStoreError::InvalidStage(format!("malformed {name} stage")));
        }
        (other, _) => return Err(MemoryStoreError::UnsupportedOperator(other.to_string())),
    }

    Ok(())
}

/// Returns the only key and value of a stage document.
pub(crate) fn single_entry(stage: &Document) -> MemoryStoreResult<(&str, &Bson)> {
    let mut entries = stage.iter();

    match (entries.next(), entries.next()) {
        (Some((name, spec)), None) => Ok((name.as_str(), spec)),
        _ => Err(MemoryStoreError::InvalidStage(
            "a pipeline stage must have exactly one field".into(),
        )),
    }
}

fn increment(path: &str, current: Option<Bson>, amount: &Bson) -> MemoryStoreResult<Bson> {
    let invalid = || MemoryStoreError::InvalidUpdate(format!("cannot apply $inc to '{path}'"));

    Ok(match (current.unwrap_or(Bson::Int32(0)), amount) {
        (Bson::Int32(a), Bson::Int32(b)) => a
            .checked_add(*b)
            .map(Bson::Int32)
            .unwrap_or(Bson::Int64(a as i64 + *b as i64)),
        (Bson::Int32(a), Bson::Int64(b)) => Bson::Int64(a as i64 + b),
        (Bson::Int64(a), Bson::Int32(b)) => Bson::Int64(a + *b as i64),
        (Bson::Int64(a), Bson::Int64(b)) => Bson::Int64(a + b),
        (current, amount) => Bson::Double(as_f64(&current).ok_or_else(invalid)? + as_f64(amount).ok_or_else(invalid)?),
    })
}

fn as_f64(value: &Bson) -> Option<f64> {
    match value {
        Bson::Int32(n) => Some(*n as f64),
        Bson::Int64(n) => Some(*n as f64),
        Bson::Double(n) => Some(*n),
        _ => None,
    }
}

/// Sets a possibly dotted field path, creating intermediate documents as needed.
pub(crate) fn set_path(document: &mut Document, path: &str, value: Bson) -> MemoryStoreResult<()> {
    match path.split_once('.') {
        None => {
            document.insert(path, value);
            Ok(())
        }
        Some((head, rest)) => {
            let child = document
                .entry(head.to_string())
                .or_insert_with(|| Bson::Document(Document::new()));

            match child {
                Bson::Document(inner) => set_path(inner, rest, value),
                Bson::Array(items) => match rest.split_once('.') {
                    None => match rest.parse::<usize>().ok().and_then(|index| items.get_mut(index)) {
                        Some(item) => {
                            *item = value;
                            Ok(())
                        }
                        None => Err(MemoryStoreError::InvalidUpdate(format!("cannot set '{path}'"))),
                    },
                    Some((index, rest)) => match index.parse::<usize>().ok().and_then(|index| items.get_mut(index)) {
                        Some(Bson::Document(inner)) => set_path(inner, rest, value),
                        _ => Err(MemoryStoreError::InvalidUpdate(format!("cannot set '{path}'"))),
                    },
                },
                _ => Err(MemoryStoreError::InvalidUpdate(format!(
                    "cannot create field '{rest}' in non-document element '{head}'"
                ))),
            }
        }
    }
}

/// Removes a possibly dotted field path. Missing paths are ignored.
pub(crate) fn unset_path(document: &mut Document, path: &str) {
    match path.split_once('.') {
        None => {
            document.remove(path);
        }
        Some((head, rest)) => {
            if let Some(Bson::Document(inner)) = document.get_mut(head) {
                unset_path(inner, rest);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::doc;

    fn updated(mut document: Document, update: impl Into<UpdateObject>) -> MemoryStoreResult<Document> {
        apply_update(&mut document, &update.into(), false)?;
        Ok(document)
    }

    #[test]
    fn set_leaves_other_fields_alone() {
        let document = updated(doc! { "_id": 1, "a": 1, "b": 2 }, doc! { "$set": { "a": 5, "c.d": true } }).unwrap();

        assert_eq!(document, doc! { "_id": 1, "a": 5, "b": 2, "c": { "d": true } });
    }

    #[test]
    fn unset_inc_and_push() {
        let document = updated(
            doc! { "n": 1, "gone": "x", "tags": ["a"] },
            doc! { "$unset": { "gone": "" }, "$inc": { "n": 2, "m": 1.5 }, "$push": { "tags": "b" } },
        )
        .unwrap();

        assert_eq!(document, doc! { "n": 3, "tags": ["a", "b"], "m": 1.5 });
    }

    #[test]
    fn set_on_insert_only_applies_to_upserts() {
        let update = UpdateObject::from(doc! { "$setOnInsert": { "created": true } });
        let mut existing = doc! {};
        let mut inserted = doc! {};

        apply_update(&mut existing, &update, false).unwrap();
        apply_update(&mut inserted, &update, true).unwrap();

        assert_eq!(existing, doc! {});
        assert_eq!(inserted, doc! { "created": true });
    }

    #[test]
    fn replacement_documents_are_rejected() {
        assert!(matches!(
            updated(doc! { "a": 1 }, doc! { "a": 2 }),
            Err(MemoryStoreError::InvalidUpdate(_)),
        ));
        assert!(matches!(
            updated(doc! { "a": 1 }, doc! { "$rename": { "a": "b" } }),
            Err(MemoryStoreError::UnsupportedOperator(_)),
        ));
    }

    #[test]
    fn identifier_is_immutable() {
        assert!(updated(doc! { "_id": 1 }, doc! { "$set": { "_id": 2 } }).is_err());
    }

    #[test]
    fn pipeline_updates() {
        let document = updated(
            doc! { "a": 1, "b": 2 },
            vec![doc! { "$set": { "c": 3 } }, doc! { "$unset": ["a"] }],
        )
        .unwrap();

        assert_eq!(document, doc! { "b": 2, "c": 3 });
    }
}
