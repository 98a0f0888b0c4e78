//! Typed filter expressions that compile to store query documents.
//!
//! Filters can be built with the [`Filter`] helpers instead of writing raw BSON by hand:
//!
//! ```ignore
//! use docservice::filter::Filter;
//!
//! let query = Filter::eq("status", "active")
//!     .and(Filter::gte("age", 18))
//!     .to_document()?;
//! // { "$and": [ { "status": { "$eq": "active" } }, { "age": { "$gte": 18 } } ] }
//! ```
//!
//! The reverse direction, [`Expr::try_from`] on a query document, lets stores that evaluate
//! filters themselves (such as the in-memory store) walk a query with a [`QueryVisitor`].

use bson::{Bson, Document, doc};

use crate::error::{ServiceError, ServiceResult};

/// Field comparison operators for filter expressions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldOp {
    /// `$eq`
    Eq,
    /// `$ne`
    Ne,
    /// `$gt`
    Gt,
    /// `$gte`
    Gte,
    /// `$lt`
    Lt,
    /// `$lte`
    Lte,
    /// `$in`: the field equals any of the listed values.
    AnyOf,
    /// `$nin`: the field equals none of the listed values.
    NoneOf,
}

impl FieldOp {
    /// Returns the store operator name.
    pub fn operator(&self) -> &'static str {
        match self {
            FieldOp::Eq => "$eq",
            FieldOp::Ne => "$ne",
            FieldOp::Gt => "$gt",
            FieldOp::Gte => "$gte",
            FieldOp::Lt => "$lt",
            FieldOp::Lte => "$lte",
            FieldOp::AnyOf => "$in",
            FieldOp::NoneOf => "$nin",
        }
    }

    fn from_operator(operator: &str) -> Option<Self> {
        Some(match operator {
            "$eq" => FieldOp::Eq,
            "$ne" => FieldOp::Ne,
            "$gt" => FieldOp::Gt,
            "$gte" => FieldOp::Gte,
            "$lt" => FieldOp::Lt,
            "$lte" => FieldOp::Lte,
            "$in" => FieldOp::AnyOf,
            "$nin" => FieldOp::NoneOf,
            _ => return None,
        })
    }
}

/// A filter expression.
///
/// Expressions can be combined using logical operators (`And`, `Or`, `Not`)
/// to build complex filter predicates.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// Logical AND of multiple expressions (all must match). An empty list matches everything.
    And(Vec<Expr>),
    /// Logical OR of multiple expressions (any must match).
    Or(Vec<Expr>),
    /// Logical NOT of an expression.
    Not(Box<Expr>),
    /// Checks if a field exists or doesn't exist.
    Exists(String, bool),
    /// Field comparison expression.
    Field {
        field: String,
        op: FieldOp,
        value: Bson,
    },
}

impl Expr {
    pub(crate) fn field(field: String, op: FieldOp, value: Bson) -> Self {
        Expr::Field { field, op, value }
    }

    /// Combines this expression with another using logical AND.
    ///
    /// If this expression is already an AND, the other expression is appended
    /// to the list. Otherwise, a new AND expression is created.
    pub fn and(self, other: Expr) -> Self {
        match self {
            Expr::And(mut list) => {
                list.push(other);
                Expr::And(list)
            }
            _ => Expr::And(vec![self, other]),
        }
    }

    /// Negates this expression.
    pub fn not(self) -> Self {
        Expr::Not(Box::new(self))
    }

    /// Compiles this expression to a store query document.
    pub fn to_document(&self) -> ServiceResult<Document> {
        QueryTranslator.visit_expr(self)
    }
}

impl TryFrom<&Document> for Expr {
    type Error = ServiceError;

    fn try_from(query: &Document) -> Result<Self, Self::Error> {
        let mut exprs = query
            .iter()
            .map(|(key, value)| parse_clause(key, value))
            .collect::<ServiceResult<Vec<_>>>()?;

        Ok(if exprs.len() == 1 { exprs.remove(0) } else { Expr::And(exprs) })
    }
}

fn parse_clause(key: &str, value: &Bson) -> ServiceResult<Expr> {
    match key {
        "$and" => Ok(Expr::And(parse_list(key, value)?)),
        "$or" => Ok(Expr::Or(parse_list(key, value)?)),
        "$nor" => {
            let mut list = parse_list(key, value)?;
            Ok(if list.len() == 1 { list.remove(0).not() } else { Expr::Or(list).not() })
        }
        operator if operator.starts_with('$') => Err(invalid(format!("unsupported query operator {operator}"))),
        field => match value {
            Bson::Document(ops) if ops.keys().next().is_some_and(|k| k.starts_with('$')) => parse_operators(field, ops),
            _ => Ok(Expr::field(field.to_string(), FieldOp::Eq, value.clone())),
        },
    }
}

fn parse_list(key: &str, value: &Bson) -> ServiceResult<Vec<Expr>> {
    match value {
        Bson::Array(items) => items
            .iter()
            .map(|item| match item {
                Bson::Document(document) => Expr::try_from(document),
                _ => Err(invalid(format!("{key} expects an array of documents"))),
            })
            .collect(),
        _ => Err(invalid(format!("{key} expects an array"))),
    }
}

fn parse_operators(field: &str, ops: &Document) -> ServiceResult<Expr> {
    let mut exprs = ops
        .iter()
        .map(|(operator, value)| match operator.as_str() {
            "$exists" => Ok(Expr::Exists(field.to_string(), truthy(value))),
            "$not" => match value {
                Bson::Document(inner) => Ok(parse_operators(field, inner)?.not()),
                _ => Err(invalid("$not expects an operator document".into())),
            },
            other => FieldOp::from_operator(other)
                .map(|op| Expr::field(field.to_string(), op, value.clone()))
                .ok_or_else(|| invalid(format!("unsupported field operator {other}"))),
        })
        .collect::<ServiceResult<Vec<_>>>()?;

    Ok(if exprs.len() == 1 { exprs.remove(0) } else { Expr::And(exprs) })
}

fn truthy(value: &Bson) -> bool {
    match value {
        Bson::Boolean(b) => *b,
        Bson::Int32(n) => *n != 0,
        Bson::Int64(n) => *n != 0,
        Bson::Double(n) => *n != 0.0,
        Bson::Null => false,
        _ => true,
    }
}

fn invalid(message: String) -> ServiceError {
    ServiceError::InvalidDocument(message)
}

/// Helper for constructing filter expressions.
///
/// All methods accept field names and values as `Into<String>` and `Into<Bson>`.
pub struct Filter;

impl Filter {
    /// Matches documents where the field equals the value.
    pub fn eq(field: impl Into<String>, value: impl Into<Bson>) -> Expr {
        Expr::field(field.into(), FieldOp::Eq, value.into())
    }

    /// Matches documents where the field does not equal the value.
    pub fn ne(field: impl Into<String>, value: impl Into<Bson>) -> Expr {
        Expr::field(field.into(), FieldOp::Ne, value.into())
    }

    /// Matches documents where the field is greater than the value.
    pub fn gt(field: impl Into<String>, value: impl Into<Bson>) -> Expr {
        Expr::field(field.into(), FieldOp::Gt, value.into())
    }

    /// Matches documents where the field is greater than or equal to the value.
    pub fn gte(field: impl Into<String>, value: impl Into<Bson>) -> Expr {
        Expr::field(field.into(), FieldOp::Gte, value.into())
    }

    /// Matches documents where the field is less than the value.
    pub fn lt(field: impl Into<String>, value: impl Into<Bson>) -> Expr {
        Expr::field(field.into(), FieldOp::Lt, value.into())
    }

    /// Matches documents where the field is less than or equal to the value.
    pub fn lte(field: impl Into<String>, value: impl Into<Bson>) -> Expr {
        Expr::field(field.into(), FieldOp::Lte, value.into())
    }

    /// Matches documents where the field equals any of the values.
    pub fn any_of<V: Into<Bson>>(field: impl Into<String>, values: impl IntoIterator<Item = V>) -> Expr {
        Expr::field(field.into(), FieldOp::AnyOf, Bson::Array(values.into_iter().map(Into::into).collect()))
    }

    /// Matches documents where the field equals none of the values.
    pub fn none_of<V: Into<Bson>>(field: impl Into<String>, values: impl IntoIterator<Item = V>) -> Expr {
        Expr::field(field.into(), FieldOp::NoneOf, Bson::Array(values.into_iter().map(Into::into).collect()))
    }

    /// Matches documents where the field is present.
    pub fn exists(field: impl Into<String>) -> Expr {
        Expr::Exists(field.into(), true)
    }

    /// Matches documents where the field is missing.
    pub fn not_exists(field: impl Into<String>) -> Expr {
        Expr::Exists(field.into(), false)
    }

    /// Combines expressions such that all must match.
    pub fn and(exprs: impl IntoIterator<Item = Expr>) -> Expr {
        Expr::And(exprs.into_iter().collect())
    }

    /// Combines expressions such that any can match.
    pub fn or(exprs: impl IntoIterator<Item = Expr>) -> Expr {
        Expr::Or(exprs.into_iter().collect())
    }
}

pub trait QueryVisitor {
    type Output;
    type Error: Into<ServiceError>;

    fn visit_and(&mut self, exprs: &[Expr]) -> Result<Self::Output, Self::Error>;
    fn visit_or(&mut self, exprs: &[Expr]) -> Result<Self::Output, Self::Error>;
    fn visit_not(&mut self, expr: &Expr) -> Result<Self::Output, Self::Error>;
    fn visit_exists(
        &mut self,
        field: &str,
        should_exist: bool,
    ) -> Result<Self::Output, Self::Error>;
    fn visit_field(
        &mut self,
        field: &str,
        op: &FieldOp,
        value: &Bson,
    ) -> Result<Self::Output, Self::Error>;

    fn visit_expr(&mut self, expr: &Expr) -> Result<Self::Output, Self::Error> {
        match expr {
            Expr::And(exprs) => self.visit_and(exprs),
            Expr::Or(exprs) => self.visit_or(exprs),
            Expr::Not(expr) => self.visit_not(expr),
            Expr::Exists(field, should_exist) => self.visit_exists(field, *should_exist),
            Expr::Field { field, op, value } => self.visit_field(field, op, value),
        }
    }
}

/// Translates expressions into store query documents.
struct QueryTranslator;

impl QueryVisitor for QueryTranslator {
    type Output = Document;
    type Error = ServiceError;

    fn visit_and(&mut self, exprs: &[Expr]) -> Result<Self::Output, Self::Error> {
        if exprs.is_empty() {
            return Ok(doc! {});
        }

        Ok(doc! {
            "$and": exprs
                .iter()
                .map(|expr| self.visit_expr(expr))
                .collect::<Result<Vec<_>, _>>()?,
        })
    }

    fn visit_or(&mut self, exprs: &[Expr]) -> Result<Self::Output, Self::Error> {
        Ok(doc! {
            "$or": exprs
                .iter()
                .map(|expr| self.visit_expr(expr))
                .collect::<Result<Vec<_>, _>>()?,
        })
    }

    fn visit_not(&mut self, expr: &Expr) -> Result<Self::Output, Self::Error> {
        Ok(doc! {
            "$nor": [self.visit_expr(expr)?],
        })
    }

    fn visit_exists(&mut self, field: &str, should_exist: bool) -> Result<Self::Output, Self::Error> {
        Ok(doc! {
            field: { "$exists": should_exist },
        })
    }

    fn visit_field(&mut self, field: &str, op: &FieldOp, value: &Bson) -> Result<Self::Output, Self::Error> {
        if matches!(op, FieldOp::AnyOf | FieldOp::NoneOf) && !matches!(value, Bson::Array(_)) {
            return Err(invalid(format!("{} requires an array value", op.operator())));
        }

        Ok(doc! {
            field: { op.operator(): value.clone() },
        })
    }
}
