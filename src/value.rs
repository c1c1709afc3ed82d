use chrono::{DateTime, Utc};

/// A scalar value used throughout the quarry query builder.
///
/// This type serves double duty: it is the literal type inside filter and
/// derive expressions, and it is the cell type of a materialized [`Table`].
/// Integers and floats are kept distinct, matching the warehouse's INT64 and
/// FLOAT64 types.
///
/// [`Table`]: crate::table::Table
///
/// # Examples
///
/// ```
/// use quarry::Value;
///
/// let null = Value::Null;
/// let flag = Value::Bool(true);
/// let count = Value::Int(42);
/// let ratio = Value::Float(0.5);
/// let name = Value::Str("widget".to_string());
/// ```
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// SQL NULL
    Null,

    /// Boolean (true/false)
    Bool(bool),

    /// 64-bit signed integer
    Int(i64),

    /// 64-bit floating-point number (kept separate from integers)
    Float(f64),

    /// UTF-8 string
    Str(String),

    /// UTC timestamp
    Timestamp(DateTime<Utc>),
}

impl Value {
    /// Check whether the value is NULL
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Get as boolean
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Get as integer
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(n) => Some(*n),
            _ => None,
        }
    }

    /// Get as float (integers widen)
    pub fn as_float(&self) -> Option<f64> {
        match self {
            Value::Int(n) => Some(*n as f64),
            Value::Float(n) => Some(*n),
            _ => None,
        }
    }

    /// Get as string slice
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    /// Human-readable type name, used in error messages
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "boolean",
            Value::Int(_) => "integer",
            Value::Float(_) => "float",
            Value::Str(_) => "string",
            Value::Timestamp(_) => "timestamp",
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Int(n)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Value::Int(n as i64)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Float(n)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Str(s)
    }
}

impl From<DateTime<Utc>> for Value {
    fn from(ts: DateTime<Utc>) -> Self {
        Value::Timestamp(ts)
    }
}
