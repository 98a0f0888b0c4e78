//! Sorting, projection and aggregation over in-memory documents.

use bson::{Bson, Document};
use std::cmp::Ordering;

use docservice_core::{error::ServiceResult, model::ID_FIELD, query::UpdateObject};

use crate::{
    error::{MemoryStoreError, MemoryStoreResult},
    evaluator::{Comparable, Matcher, get_path},
    update::{apply_update, set_path, single_entry, unset_path},
};

/// Sorts documents by a sort specification such as `{ "age": -1, "name": 1 }`.
///
/// The sort is stable, so documents with equal keys keep their natural order.
pub(crate) fn sort_documents(documents: &mut [Document], spec: &Document) -> MemoryStoreResult<()> {
    let keys = spec
        .iter()
        .map(|(field, direction)| match direction {
            Bson::Int32(n) if *n != 0 => Ok((field.as_str(), *n < 0)),
            Bson::Int64(n) if *n != 0 => Ok((field.as_str(), *n < 0)),
            Bson::Double(n) if *n != 0.0 => Ok((field.as_str(), *n < 0.0)),
            _ => Err(MemoryStoreError::InvalidStage(format!("invalid sort direction for '{field}'"))),
        })
        .collect::<MemoryStoreResult<Vec<_>>>()?;

    documents.sort_by(|a, b| {
        keys.iter()
            .map(|(field, descending)| {
                let left = get_path(a, field).map(Comparable::from).unwrap_or(Comparable::Null);
                let right = get_path(b, field).map(Comparable::from).unwrap_or(Comparable::Null);
                let ordering = left.sort_cmp(&right);

                if *descending { ordering.reverse() } else { ordering }
            })
            .find(|ordering| *ordering != Ordering::Equal)
            .unwrap_or(Ordering::Equal)
    });

    Ok(())
}

/// Applies an inclusion (`{ "a": 1 }`) or exclusion (`{ "a": 0 }`) projection.
///
/// `_id` is kept unless excluded explicitly. Mixing inclusion and exclusion is only
/// allowed for `_id`.
pub(crate) fn project(mut document: Document, projection: &Document) -> MemoryStoreResult<Document> {
    let mut include_id = true;
    let mut included = Vec::new();
    let mut excluded = Vec::new();

    for (field, flag) in projection {
        let keep = match flag {
            Bson::Boolean(b) => *b,
            Bson::Int32(n) => *n != 0,
            Bson::Int64(n) => *n != 0,
            Bson::Double(n) => *n != 0.0,
            _ => {
                return Err(MemoryStoreError::InvalidProjection(format!(
                    "unsupported projection value for '{field}'"
                )));
            }
        };

        match (field.as_str(), keep) {
            (ID_FIELD, keep) => include_id = keep,
            (field, true) => included.push(field),
            (field, false) => excluded.push(field),
        }
    }

    if !included.is_empty() && !excluded.is_empty() {
        return Err(MemoryStoreError::InvalidProjection(
            "cannot mix inclusion and exclusion".into(),
        ));
    }

    if included.is_empty() {
        for field in excluded {
            unset_path(&mut document, field);
        }
        if !include_id {
            document.remove(ID_FIELD);
        }
        return Ok(document);
    }

    let mut projected = Document::new();
    if include_id {
        if let Some(id) = document.get(ID_FIELD) {
            projected.insert(ID_FIELD, id.clone());
        }
    }
    for field in included {
        if let Some(value) = get_path(&document, field) {
            set_path(&mut projected, field, value.clone())?;
        }
    }

    Ok(projected)
}

/// Runs an aggregation pipeline over the given documents.
///
/// Supported stages are `$match`, `$sort`, `$skip`, `$limit`, `$project`, `$set`,
/// `$addFields`, `$unset` and `$count`.
pub(crate) fn aggregate(mut documents: Vec<Document>, pipeline: &[Document]) -> ServiceResult<Vec<Document>> {
    for stage in pipeline {
        let (name, spec) = single_entry(stage)?;

        documents = match (name, spec) {
            ("$match", Bson::Document(query)) => {
                let matcher = Matcher::new(query)?;
                let mut matched = Vec::with_capacity(documents.len());
                for document in documents {
                    if matcher.matches(&document)? {
                        matched.push(document);
                    }
                }
                matched
            }
            ("$sort", Bson::Document(spec)) => {
                sort_documents(&mut documents, spec)?;
                documents
            }
            ("$skip", count) => documents.into_iter().skip(stage_count(name, count)?).collect(),
            ("$limit", count) => documents.into_iter().take(stage_count(name, count)?).collect(),
            ("$project", Bson::Document(projection)) => documents
                .into_iter()
                .map(|document| project(document, projection))
                .collect::<MemoryStoreResult<_>>()?,
            ("$set" | "$addFields" | "$unset", _) => documents
                .into_iter()
                .map(|mut document| -> MemoryStoreResult<Document> {
                    apply_update(&mut document, &UpdateObject::Pipeline(vec![stage.clone()]), false)?;
                    Ok(document)
                })
                .collect::<MemoryStoreResult<_>>()?,
            ("$count", Bson::String(field)) => {
                let mut result = Document::new();
                result.insert(field.as_str(), documents.len() as i64);
                vec![result]
            }
            ("$match" | "$sort" | "$project" | "$count", _) => {
                return Err(MemoryStoreError::InvalidStage(format!("malformed {name} stage")).into());
            }
            (other, _) => return Err(MemoryStoreError::UnsupportedOperator(other.to_string()).into()),
        };
    }

    Ok(documents)
}

fn stage_count(name: &str, value: &Bson) -> MemoryStoreResult<usize> {
    match value {
        Bson::Int32(n) if *n >= 0 => Ok(*n as usize),
        Bson::Int64(n) if *n >= 0 => Ok(*n as usize),
        _ => Err(MemoryStoreError::InvalidStage(format!("{name} expects a non-negative integer"))),
    }
}
