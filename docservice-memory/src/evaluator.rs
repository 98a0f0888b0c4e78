//! Query evaluation for in-memory document filtering.
//!
//! Query documents are parsed into [`Expr`] trees and walked by [`DocumentEvaluator`].
//! Field paths may be dotted (`address.city`), and a predicate on an array field matches
//! when it matches the array itself or any of its elements.

use bson::{Bson, Document, datetime::DateTime, oid::ObjectId};
use std::{cmp::Ordering, collections::HashMap};

use docservice_core::{
    error::{ServiceError, ServiceResult},
    filter::{Expr, FieldOp, QueryVisitor},
};

/// Type-erased, comparable representation of BSON values.
///
/// All numeric types are normalized to `f64`.
#[derive(Debug)]
pub(crate) enum Comparable<'a> {
    Null,
    Bool(bool),
    Number(f64),
    DateTime(DateTime),
    ObjectId(ObjectId),
    String(&'a str),
    Array(Vec<Comparable<'a>>),
    Map(HashMap<&'a str, Comparable<'a>>),
    Other,
}

impl<'a> From<&'a Bson> for Comparable<'a> {
    fn from(bson: &'a Bson) -> Self {
        match bson {
            Bson::Null | Bson::Undefined => Comparable::Null,
            Bson::Boolean(value) => Comparable::Bool(*value),
            Bson::Int32(value) => Comparable::Number(*value as f64),
            Bson::Int64(value) => Comparable::Number(*value as f64),
            Bson::Double(value) => Comparable::Number(*value),
            Bson::DateTime(value) => Comparable::DateTime(*value),
            Bson::ObjectId(value) => Comparable::ObjectId(*value),
            Bson::String(value) | Bson::Symbol(value) => Comparable::String(value),
            Bson::Array(arr) => Comparable::Array(arr.iter().map(Comparable::from).collect()),
            Bson::Document(doc) => Comparable::Map(
                doc.iter()
                    .map(|(k, v)| (k.as_str(), Comparable::from(v)))
                    .collect(),
            ),
            _ => Comparable::Other,
        }
    }
}

impl Comparable<'_> {
    /// Position of the value's type in the store's cross-type sort order.
    fn type_rank(&self) -> u8 {
        match self {
            Comparable::Null => 1,
            Comparable::Number(_) => 2,
            Comparable::String(_) => 3,
            Comparable::Map(_) => 4,
            Comparable::Array(_) => 5,
            Comparable::ObjectId(_) => 7,
            Comparable::Bool(_) => 8,
            Comparable::DateTime(_) => 9,
            Comparable::Other => 10,
        }
    }

    /// Total order used for sorting, falling back to the type order across types.
    pub(crate) fn sort_cmp(&self, other: &Self) -> Ordering {
        self.partial_cmp(other)
            .unwrap_or_else(|| self.type_rank().cmp(&other.type_rank()))
    }
}

impl PartialEq for Comparable<'_> {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Comparable::Null, Comparable::Null) => true,
            (Comparable::Bool(a), Comparable::Bool(b)) => a == b,
            (Comparable::Number(a), Comparable::Number(b)) => a == b,
            (Comparable::DateTime(a), Comparable::DateTime(b)) => a == b,
            (Comparable::ObjectId(a), Comparable::ObjectId(b)) => a == b,
            (Comparable::String(a), Comparable::String(b)) => a == b,
            (Comparable::Array(a), Comparable::Array(b)) => a == b,
            (Comparable::Map(a), Comparable::Map(b)) => a == b,
            _ => false,
        }
    }
}

impl PartialOrd for Comparable<'_> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        match (self, other) {
            (Comparable::Null, Comparable::Null) => Some(Ordering::Equal),
            (Comparable::Bool(a), Comparable::Bool(b)) => a.partial_cmp(b),
            (Comparable::Number(a), Comparable::Number(b)) => a.partial_cmp(b),
            (Comparable::DateTime(a), Comparable::DateTime(b)) => a.partial_cmp(b),
            (Comparable::ObjectId(a), Comparable::ObjectId(b)) => a.partial_cmp(b),
            (Comparable::String(a), Comparable::String(b)) => a.partial_cmp(b),
            _ => None,
        }
    }
}

/// Resolves a possibly dotted field path inside a document.
pub(crate) fn get_path<'a>(document: &'a Document, path: &str) -> Option<&'a Bson> {
    match path.split_once('.') {
        None => document.get(path),
        Some((head, rest)) => match document.get(head)? {
            Bson::Document(inner) => get_path(inner, rest),
            Bson::Array(items) => rest
                .parse::<usize>()
                .ok()
                .and_then(|index| items.get(index)),
            _ => None,
        },
    }
}

pub(crate) struct DocumentEvaluator<'a> {
    document: &'a Document,
}

impl<'a> DocumentEvaluator<'a> {
    pub fn new(document: &'a Document) -> Self {
        Self { document }
    }

    pub fn evaluate(&mut self, expr: &Expr) -> ServiceResult<bool> {
        self.visit_expr(expr)
    }
}

fn matches_eq(found: Option<&Bson>, target: &Bson) -> bool {
    let target = Comparable::from(target);

    match found {
        None => target == Comparable::Null,
        Some(value @ Bson::Array(items)) => {
            Comparable::from(value) == target || items.iter().any(|item| Comparable::from(item) == target)
        }
        Some(value) => Comparable::from(value) == target,
    }
}

fn matches_ordering(found: Option<&Bson>, op: &FieldOp, target: &Bson) -> bool {
    let target = Comparable::from(target);
    let check = |value: &Bson| match Comparable::from(value).partial_cmp(&target) {
        Some(ordering) => match op {
            FieldOp::Gt => ordering == Ordering::Greater,
            FieldOp::Gte => ordering != Ordering::Less,
            FieldOp::Lt => ordering == Ordering::Less,
            FieldOp::Lte => ordering != Ordering::Greater,
            _ => false,
        },
        None => false,
    };

    match found {
        None => false,
        Some(Bson::Array(items)) => items.iter().any(check),
        Some(value) => check(value),
    }
}

fn candidates<'v>(op: &FieldOp, value: &'v Bson) -> ServiceResult<&'v [Bson]> {
    match value {
        Bson::Array(values) => Ok(values),
        _ => Err(ServiceError::InvalidDocument(format!(
            "{} requires an array value",
            op.operator()
        ))),
    }
}

impl QueryVisitor for DocumentEvaluator<'_> {
    type Output = bool;
    type Error = ServiceError;

    fn visit_and(&mut self, exprs: &[Expr]) -> Result<Self::Output, Self::Error> {
        for expr in exprs {
            if !self.visit_expr(expr)? {
                return Ok(false);
            }
        }

        Ok(true)
    }

    fn visit_or(&mut self, exprs: &[Expr]) -> Result<Self::Output, Self::Error> {
        for expr in exprs {
            if self.visit_expr(expr)? {
                return Ok(true);
            }
        }

        Ok(false)
    }

    fn visit_not(&mut self, expr: &Expr) -> Result<Self::Output, Self::Error> {
        Ok(!self.visit_expr(expr)?)
    }

    fn visit_exists(&mut self, field: &str, should_exist: bool) -> Result<Self::Output, Self::Error> {
        Ok(get_path(self.document, field).is_some() == should_exist)
    }

    fn visit_field(&mut self, field: &str, op: &FieldOp, value: &Bson) -> Result<Self::Output, Self::Error> {
        let found = get_path(self.document, field);

        Ok(match op {
            FieldOp::Eq => matches_eq(found, value),
            FieldOp::Ne => !matches_eq(found, value),
            FieldOp::Gt | FieldOp::Gte | FieldOp::Lt | FieldOp::Lte => matches_ordering(found, op, value),
            FieldOp::AnyOf => candidates(op, value)?
                .iter()
                .any(|candidate| matches_eq(found, candidate)),
            FieldOp::NoneOf => !candidates(op, value)?
                .iter()
                .any(|candidate| matches_eq(found, candidate)),
        })
    }
}

/// A parsed query that can be tested against many documents.
pub(crate) struct Matcher {
    expr: Expr,
}

impl Matcher {
    pub fn new(query: &Document) -> ServiceResult<Self> {
        Ok(Self { expr: Expr::try_from(query)? })
    }

    pub fn matches(&self, document: &Document) -> ServiceResult<bool> {
        DocumentEvaluator::new(document).evaluate(&self.expr)
    }

    pub fn expr(&self) -> &Expr {
        &self.expr
    }
}
