//! Predicate trees that evaluate locally and compile to S3 Select SQL.
//!
//! The same [`Condition`] is used twice during a query: `check` prunes
//! partitions against values parsed from object keys, and `compile` renders
//! the remaining predicate into the pushed-down `WHERE` clause. Both follow SQL
//! null semantics, so a condition never keeps a partition locally that the
//! remote engine would have filtered out:
//! - `Eq(Null)` is `IS NULL` and `Neq(Null)` is `IS NOT NULL`
//! - any other comparison against `NULL` is false
//!
//! ```
//! use rusty_s3access_query::{Condition, Value};
//!
//! let cond = Condition::And(vec![
//!     Condition::Or(vec![Condition::Eq(7.into()), Condition::Neq(Value::Null)]),
//!     Condition::Gte(2.into()),
//!     Condition::Lt(10.into()),
//! ]);
//! assert_eq!(
//!     cond.compile("foo"),
//!     "((foo = 7) OR (foo IS NOT NULL)) AND (foo >= 2) AND (foo < 10)"
//! );
//! assert!(cond.check(&Value::Int(7)));
//! assert!(!cond.check(&Value::Null));
//! ```

use std::cmp::Ordering;
use std::fmt;

use crate::error::QueryError;
use crate::value::{quote, Value};

/// A node of a predicate tree.
#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
    Eq(Value),
    Lt(Value),
    Gt(Value),
    Neq(Value),
    Lte(Value),
    Gte(Value),
    /// Membership in a non-empty set of values.
    In(Vec<Value>),
    /// All children hold. An empty conjunction is true.
    And(Vec<Condition>),
    /// Any child holds. An empty disjunction is false.
    Or(Vec<Condition>),
}

impl Condition {
    /// Evaluate the condition against a local value.
    ///
    /// # Arguments
    /// * `reference` - The value of the column, e.g. a partition value
    ///
    /// # Returns
    /// `true` if a row with this value would pass the compiled predicate.
    pub fn check(&self, reference: &Value) -> bool {
        match self {
            Condition::Eq(Value::Null) => reference.is_null(),
            Condition::Neq(Value::Null) => !reference.is_null(),
            Condition::Eq(value) => reference.loosely_equals(value),
            Condition::Neq(value) => !reference.is_null() && !reference.loosely_equals(value),
            Condition::Lt(value) => reference.compare(value) == Some(Ordering::Less),
            Condition::Gt(value) => reference.compare(value) == Some(Ordering::Greater),
            Condition::Lte(value) => matches!(
                reference.compare(value),
                Some(Ordering::Less | Ordering::Equal)
            ),
            Condition::Gte(value) => matches!(
                reference.compare(value),
                Some(Ordering::Greater | Ordering::Equal)
            ),
            Condition::In(values) => values.iter().any(|v| reference.loosely_equals(v)),
            Condition::And(children) => children.iter().all(|c| c.check(reference)),
            Condition::Or(children) => children.iter().any(|c| c.check(reference)),
        }
    }

    /// Render the condition as an S3 Select SQL fragment.
    ///
    /// Composite nodes wrap every child fragment in parentheses.
    ///
    /// # Arguments
    /// * `column_ref` - Column reference, e.g. `s.country`
    pub fn compile(&self, column_ref: &str) -> String {
        match self {
            Condition::Eq(Value::Null) => format!("{} IS NULL", column_ref),
            Condition::Neq(Value::Null) => format!("{} IS NOT NULL", column_ref),
            Condition::Eq(value) => format!("{} = {}", column_ref, quote(value)),
            Condition::Neq(value) => format!("{} <> {}", column_ref, quote(value)),
            Condition::Lt(value) => format!("{} < {}", column_ref, quote(value)),
            Condition::Gt(value) => format!("{} > {}", column_ref, quote(value)),
            Condition::Lte(value) => format!("{} <= {}", column_ref, quote(value)),
            Condition::Gte(value) => format!("{} >= {}", column_ref, quote(value)),
            Condition::In(values) => format!("{} IN {}", column_ref, quote_list(values)),
            Condition::And(children) => join_children(children, column_ref, "AND", "TRUE"),
            Condition::Or(children) => join_children(children, column_ref, "OR", "FALSE"),
        }
    }

    /// Whether the compiled fragment needs parentheses when embedded next to
    /// other fragments.
    pub fn is_compound(&self) -> bool {
        match self {
            Condition::And(children) | Condition::Or(children) => children.len() > 1,
            _ => false,
        }
    }

    /// Whether every value in the tree has an SQL literal.
    pub fn has_literals(&self) -> bool {
        match self {
            Condition::Eq(v)
            | Condition::Lt(v)
            | Condition::Gt(v)
            | Condition::Neq(v)
            | Condition::Lte(v)
            | Condition::Gte(v) => v.has_literal(),
            Condition::In(values) => values.iter().all(Value::has_literal),
            Condition::And(children) | Condition::Or(children) => {
                children.iter().all(Condition::has_literals)
            }
        }
    }

    fn name(&self) -> &'static str {
        match self {
            Condition::Eq(_) => "EQ",
            Condition::Lt(_) => "LT",
            Condition::Gt(_) => "GT",
            Condition::Neq(_) => "NEQ",
            Condition::Lte(_) => "LTE",
            Condition::Gte(_) => "GTE",
            Condition::In(_) => "IN",
            Condition::And(_) => "AND",
            Condition::Or(_) => "OR",
        }
    }
}

fn quote_list(values: &[Value]) -> String {
    let parts: Vec<String> = values.iter().map(quote).collect();
    format!("({})", parts.join(", "))
}

fn join_children(children: &[Condition], column_ref: &str, connective: &str, empty: &str) -> String {
    match children {
        [] => empty.to_string(),
        [only] => only.compile(column_ref),
        _ => {
            let fragments: Vec<String> = children
                .iter()
                .map(|c| format!("({})", c.compile(column_ref)))
                .collect();
            fragments.join(&format!(" {} ", connective))
        }
    }
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Condition::Eq(v)
            | Condition::Lt(v)
            | Condition::Gt(v)
            | Condition::Neq(v)
            | Condition::Lte(v)
            | Condition::Gte(v) => write!(f, "{}({})", self.name(), quote(v)),
            Condition::In(values) => write!(f, "IN{}", quote_list(values)),
            Condition::And(children) | Condition::Or(children) => {
                let parts: Vec<String> = children.iter().map(|c| c.to_string()).collect();
                write!(f, "{}({})", self.name(), parts.join(", "))
            }
        }
    }
}

/// Anything accepted where a filter condition is expected.
#[derive(Debug, Clone, PartialEq)]
pub enum Conditionable {
    Value(Value),
    Condition(Condition),
}

impl From<Condition> for Conditionable {
    fn from(c: Condition) -> Self {
        Conditionable::Condition(c)
    }
}

impl From<Value> for Conditionable {
    fn from(v: Value) -> Self {
        Conditionable::Value(v)
    }
}

macro_rules! conditionable_from_scalar {
    ($($ty:ty),*) => {
        $(
            impl From<$ty> for Conditionable {
                fn from(v: $ty) -> Self {
                    Conditionable::Value(Value::from(v))
                }
            }
        )*
    };
}

conditionable_from_scalar!(&str, String, i32, i64, f64, bool);

impl<T: Into<Value>> From<Vec<T>> for Conditionable {
    fn from(v: Vec<T>) -> Self {
        Conditionable::Value(Value::from(v))
    }
}

/// Turn a filter value into a condition.
///
/// A scalar becomes `Eq`, a list becomes `In` and a condition is kept as is.
///
/// # Arguments
/// * `value` - Scalar, list of scalars or condition
///
/// # Errors
/// Returns `QueryError::InvalidFilterValue` for `Null`, empty lists, nested
/// lists and NaN or infinite floats anywhere in the value or condition.
pub fn make_condition(value: impl Into<Conditionable>) -> Result<Condition, QueryError> {
    let condition: Condition = match value.into() {
        Conditionable::Condition(condition) => condition,
        Conditionable::Value(Value::Null) => return Err(QueryError::invalid_filter(
            "a bare NULL is not a condition, use Condition::Eq(Value::Null)",
        )),
        Conditionable::Value(Value::List(values)) => {
            if values.is_empty() {
                return Err(QueryError::invalid_filter("empty value list"));
            }
            if values.iter().any(|v| matches!(v, Value::List(_))) {
                return Err(QueryError::invalid_filter("nested value lists"));
            }
            Condition::In(values)
        }
        Conditionable::Value(scalar) => Condition::Eq(scalar),
    };
    if !condition.has_literals() {
        return Err(QueryError::invalid_filter(format!(
            "{} holds a non-finite float",
            condition
        )));
    }
    Ok(condition)
}
