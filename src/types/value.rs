//! Value and `DataType` definitions for lazyflow.

use std::cmp::Ordering;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Semantic value types a column can produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DataType {
    /// Boolean.
    Bool,
    /// 64-bit signed integer.
    Int64,
    /// 64-bit floating point.
    Float64,
    /// UTF-8 string.
    String,
}

impl DataType {
    /// Returns the name of the data type.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            DataType::Bool => "BOOL",
            DataType::Int64 => "INT64",
            DataType::Float64 => "FLOAT64",
            DataType::String => "STRING",
        }
    }

    /// Returns whether this type is numeric.
    #[must_use]
    pub fn is_numeric(&self) -> bool {
        matches!(self, DataType::Int64 | DataType::Float64)
    }

    /// Returns the common numeric type of two numeric operands.
    ///
    /// Returns None if either side is not numeric.
    #[must_use]
    pub fn promote(self, other: DataType) -> Option<DataType> {
        match (self, other) {
            (DataType::Int64, DataType::Int64) => Some(DataType::Int64),
            (a, b) if a.is_numeric() && b.is_numeric() => Some(DataType::Float64),
            _ => None,
        }
    }

    /// Parses a type name as written in schemas (case-insensitive).
    #[must_use]
    pub fn parse(name: &str) -> Option<Self> {
        match name.to_ascii_uppercase().as_str() {
            "BOOL" | "BOOLEAN" => Some(DataType::Bool),
            "INT64" | "INT" | "INTEGER" => Some(DataType::Int64),
            "FLOAT64" | "DOUBLE" | "FLOAT" => Some(DataType::Float64),
            "STRING" | "STR" => Some(DataType::String),
            _ => None,
        }
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Runtime value container for one row of one column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    /// Boolean value.
    Bool(bool),
    /// 64-bit signed integer value.
    Int64(i64),
    /// 64-bit floating point value.
    Float64(f64),
    /// String value.
    String(String),
}

impl Value {
    /// Returns the data type of this value.
    #[must_use]
    pub fn data_type(&self) -> DataType {
        match self {
            Value::Bool(_) => DataType::Bool,
            Value::Int64(_) => DataType::Int64,
            Value::Float64(_) => DataType::Float64,
            Value::String(_) => DataType::String,
        }
    }

    /// Attempts to extract a bool value.
    #[must_use]
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Attempts to extract an i64 value.
    #[must_use]
    pub fn as_int64(&self) -> Option<i64> {
        match self {
            Value::Int64(i) => Some(*i),
            _ => None,
        }
    }

    /// Attempts to extract an f64 value.
    #[must_use]
    pub fn as_float64(&self) -> Option<f64> {
        match self {
            Value::Float64(f) => Some(*f),
            _ => None,
        }
    }

    /// Attempts to extract a string reference.
    #[must_use]
    pub fn as_string(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s.as_str()),
            _ => None,
        }
    }

    /// Reads any numeric value as f64.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn to_f64(&self) -> Option<f64> {
        match self {
            Value::Int64(i) => Some(*i as f64),
            Value::Float64(f) => Some(*f),
            _ => None,
        }
    }

    /// Converts this value to the given type.
    ///
    /// Only lossless-by-intent conversions are allowed: identity and
    /// Int64 to Float64. Returns None otherwise.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn cast(self, target: DataType) -> Option<Value> {
        match (self, target) {
            (Value::Int64(i), DataType::Float64) => Some(Value::Float64(i as f64)),
            (v, t) if v.data_type() == t => Some(v),
            _ => None,
        }
    }

    /// Compares two values of the same type, promoting Int64 against Float64.
    ///
    /// Returns None on type mismatch or NaN.
    #[must_use]
    pub fn compare(&self, other: &Value) -> Option<Ordering> {
        match (self, other) {
            (Value::Int64(a), Value::Int64(b)) => Some(a.cmp(b)),
            (Value::Bool(a), Value::Bool(b)) => Some(a.cmp(b)),
            (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
            (a, b) => a.to_f64()?.partial_cmp(&b.to_f64()?),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Bool(b) => write!(f, "{b}"),
            Value::Int64(i) => write!(f, "{i}"),
            Value::Float64(x) => write!(f, "{x:?}"),
            Value::String(s) => write!(f, "{s:?}"),
        }
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int64(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Int64(i64::from(v))
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float64(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::String(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::String(v)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_promote() {
        assert_eq!(DataType::Int64.promote(DataType::Int64), Some(DataType::Int64));
        assert_eq!(DataType::Int64.promote(DataType::Float64), Some(DataType::Float64));
        assert_eq!(DataType::Bool.promote(DataType::Float64), None);
    }

    #[test]
    fn test_cast_int_to_float() {
        assert_eq!(Value::Int64(3).cast(DataType::Float64), Some(Value::Float64(3.0)));
        assert_eq!(Value::Float64(3.0).cast(DataType::Int64), None);
        assert_eq!(Value::Bool(true).cast(DataType::Bool), Some(Value::Bool(true)));
    }

    #[test]
    fn test_compare_mixed_numeric() {
        assert_eq!(Value::Int64(2).compare(&Value::Float64(2.5)), Some(Ordering::Less));
        assert_eq!(Value::Bool(true).compare(&Value::Int64(1)), None);
    }

    #[test]
    fn test_parse_type_names() {
        assert_eq!(DataType::parse("double"), Some(DataType::Float64));
        assert_eq!(DataType::parse("INT64"), Some(DataType::Int64));
        assert_eq!(DataType::parse("blob"), None);
    }
}
