//! Scalar values, column types and SQL literal quoting.

use std::cmp::Ordering;
use std::fmt;

use serde::{Deserialize, Serialize};

/// A scalar (or list of scalars) used in filters and typed result rows.
///
/// Serialized untagged, so cached tables are plain JSON values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    /// SQL `NULL` / absent value.
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    /// Collection literal, only meaningful for `IN`.
    List(Vec<Value>),
}

impl Value {
    /// Whether this is `Value::Null`.
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Int(i) => Some(*i as f64),
            Value::Float(f) => Some(*f),
            Value::Str(s) => s.trim().parse::<f64>().ok(),
            _ => None,
        }
    }

    /// Compare two values the way a local filter check does.
    ///
    /// Numbers compare numerically across `Int`/`Float`. A string compared
    /// with a number is parsed as a number first, since partition values
    /// extracted from keys are always strings. Anything else involving
    /// different kinds, `NULL` or lists is incomparable.
    pub fn compare(&self, other: &Value) -> Option<Ordering> {
        match (self, other) {
            (Value::Null, _) | (_, Value::Null) => None,
            (Value::List(_), _) | (_, Value::List(_)) => None,
            (Value::Int(a), Value::Int(b)) => Some(a.cmp(b)),
            (Value::Str(a), Value::Str(b)) => Some(a.cmp(b)),
            (Value::Bool(a), Value::Bool(b)) => Some(a.cmp(b)),
            (Value::Str(s), Value::Bool(b)) | (Value::Bool(b), Value::Str(s)) => {
                let parsed: bool = s.parse::<bool>().ok()?;
                if matches!(self, Value::Str(_)) {
                    Some(parsed.cmp(b))
                } else {
                    Some(b.cmp(&parsed))
                }
            }
            (Value::Bool(_), _) | (_, Value::Bool(_)) => None,
            _ => {
                let a: f64 = self.as_f64()?;
                let b: f64 = other.as_f64()?;
                a.partial_cmp(&b)
            }
        }
    }

    /// Non-null equality under `compare` semantics.
    pub fn loosely_equals(&self, other: &Value) -> bool {
        self.compare(other) == Some(Ordering::Equal)
    }

    /// Whether the value has an SQL literal.
    ///
    /// NaN and infinities do not; a list has one when all its items do.
    pub fn has_literal(&self) -> bool {
        match self {
            Value::Float(f) => f.is_finite(),
            Value::List(items) => items.iter().all(Value::has_literal),
            _ => true,
        }
    }

    /// Hashable identity of the value, used to drop duplicate rows.
    pub fn key(&self) -> ValueKey {
        match self {
            Value::Null => ValueKey::Null,
            Value::Bool(b) => ValueKey::Bool(*b),
            Value::Int(i) => ValueKey::Int(*i),
            Value::Float(f) => ValueKey::Float(float_bits(*f)),
            Value::Str(s) => ValueKey::Str(s.clone()),
            Value::List(items) => ValueKey::List(items.iter().map(Value::key).collect()),
        }
    }
}

/// Identity of a [`Value`] with `Eq` and `Hash`.
///
/// Floats are keyed by bit pattern with `-0.0` folded into `0.0` and every
/// NaN folded into one, so equal floats share a key. `Int(1)` and
/// `Float(1.0)` stay distinct.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ValueKey {
    Null,
    Bool(bool),
    Int(i64),
    Float(u64),
    Str(String),
    List(Vec<ValueKey>),
}

fn float_bits(f: f64) -> u64 {
    if f.is_nan() {
        f64::NAN.to_bits()
    } else if f == 0.0 {
        0.0f64.to_bits()
    } else {
        f.to_bits()
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&quote(self))
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Str(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Str(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Int(v as i64)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(Value::Null)
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(v: Vec<T>) -> Self {
        Value::List(v.into_iter().map(Into::into).collect())
    }
}

/// Render a value as an S3 Select SQL literal.
///
/// Strings are single-quoted with embedded quotes doubled, numbers are
/// unquoted, lists become parenthesized comma lists and `NULL` is `NULL`.
///
/// Non-finite floats have no literal (see [`Value::has_literal`]); filters
/// reject them before any text is rendered.
pub fn quote(value: &Value) -> String {
    match value {
        Value::Null => "NULL".to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Int(i) => i.to_string(),
        Value::Float(f) => format!("{:?}", f),
        Value::Str(s) => format!("'{}'", s.replace('\'', "''")),
        Value::List(items) => {
            let parts: Vec<String> = items.iter().map(quote).collect();
            format!("({})", parts.join(", "))
        }
    }
}

/// Declared type of a selected column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ColumnType {
    String,
    Integer,
    Float,
    Boolean,
}

impl ColumnType {
    /// Parse a raw CSV field into a typed value.
    ///
    /// Empty fields are `NULL` for every type.
    ///
    /// # Errors
    /// Returns a description of the problem if the field does not parse.
    pub fn parse(&self, raw: &str) -> Result<Value, String> {
        if raw.is_empty() {
            return Ok(Value::Null);
        }
        match self {
            ColumnType::String => Ok(Value::Str(raw.to_string())),
            ColumnType::Integer => raw
                .trim()
                .parse::<i64>()
                .map(Value::Int)
                .map_err(|e| format!("{:?} is not an integer: {}", raw, e)),
            ColumnType::Float => match raw.trim().parse::<f64>() {
                Ok(f) if f.is_finite() => Ok(Value::Float(f)),
                Ok(_) => Err(format!("{:?} is not a finite float", raw)),
                Err(e) => Err(format!("{:?} is not a float: {}", raw, e)),
            },
            ColumnType::Boolean => match raw.trim().to_ascii_lowercase().as_str() {
                "true" | "1" => Ok(Value::Bool(true)),
                "false" | "0" => Ok(Value::Bool(false)),
                other => Err(format!("{:?} is not a boolean", other)),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quote_scalars() {
        assert_eq!(quote(&Value::Int(3)), "3");
        assert_eq!(quote(&Value::from("3")), "'3'");
        assert_eq!(quote(&Value::from("foo")), "'foo'");
        assert_eq!(quote(&Value::from("foo'")), "'foo'''");
        assert_eq!(quote(&Value::Float(2.5)), "2.5");
        assert_eq!(quote(&Value::Null), "NULL");
    }

    #[test]
    fn test_quote_collections() {
        assert_eq!(quote(&Value::from(vec![1, 2, 3])), "(1, 2, 3)");
        assert_eq!(quote(&Value::from(vec![1])), "(1)");
        assert_eq!(
            quote(&Value::from(vec!["foo", "'bar'"])),
            "('foo', '''bar''')"
        );
    }

    #[test]
    fn test_compare_numeric_across_kinds() {
        assert_eq!(Value::Int(2).compare(&Value::Float(2.5)), Some(Ordering::Less));
        assert!(Value::from("2020").loosely_equals(&Value::Int(2020)));
        assert_eq!(Value::from("abc").compare(&Value::Int(1)), None);
    }

    #[test]
    fn test_compare_null_is_incomparable() {
        assert_eq!(Value::Null.compare(&Value::Null), None);
        assert_eq!(Value::Int(1).compare(&Value::Null), None);
    }

    #[test]
    fn test_column_type_parse() {
        assert_eq!(ColumnType::Integer.parse("42"), Ok(Value::Int(42)));
        assert_eq!(ColumnType::Float.parse("1.5"), Ok(Value::Float(1.5)));
        assert_eq!(ColumnType::Boolean.parse("TRUE"), Ok(Value::Bool(true)));
        assert_eq!(ColumnType::String.parse("x"), Ok(Value::from("x")));
        assert_eq!(ColumnType::Integer.parse(""), Ok(Value::Null));
        assert!(ColumnType::Integer.parse("4.2").is_err());
        assert!(ColumnType::Float.parse("NaN").is_err());
        assert!(ColumnType::Float.parse("inf").is_err());
    }

    #[test]
    fn test_has_literal() {
        assert!(Value::Float(1.5).has_literal());
        assert!(Value::from("NaN").has_literal());
        assert!(!Value::Float(f64::NAN).has_literal());
        assert!(!Value::Float(f64::NEG_INFINITY).has_literal());
        assert!(!Value::from(vec![1.0, f64::INFINITY]).has_literal());
        assert!(Value::from(vec![1.0, 2.0]).has_literal());
    }

    #[test]
    fn test_key_normalizes_floats() {
        assert_eq!(Value::Float(0.0).key(), Value::Float(-0.0).key());
        assert_eq!(Value::Float(f64::NAN).key(), Value::Float(-f64::NAN).key());
        assert_ne!(Value::Int(1).key(), Value::Float(1.0).key());
        assert_ne!(Value::from("1").key(), Value::Int(1).key());
        assert_eq!(
            Value::from(vec![Value::Null, Value::Float(-0.0)]).key(),
            Value::from(vec![Value::Null, Value::Float(0.0)]).key()
        );
    }
}
