//! JSON rendering of materialized tables.
//!
//! A [`Table`] renders as a JSON array of row objects. Output is
//! deterministic: rows keep result order and object keys are sorted, so the
//! same table always prints the same bytes.
//!
//! # Examples
//!
//! ```
//! use quarry::client::{ColumnKind, ColumnSchema};
//! use quarry::output::to_json;
//! use quarry::{Table, Value};
//!
//! let table = Table::new(
//!     vec![ColumnSchema::new("n", ColumnKind::Integer)],
//!     vec![vec![Value::Int(1)], vec![Value::Int(2)]],
//! );
//! assert_eq!(to_json(&table), r#"[{"n":1},{"n":2}]"#);
//! ```

use crate::table::Table;
use crate::value::Value;

/// Convert a single value to its JSON counterpart.
///
/// Timestamps become RFC 3339 strings; a non-finite float becomes `null`
/// (JSON has no NaN or infinity).
pub fn value_to_json(value: &Value) -> serde_json::Value {
    match value {
        Value::Null => serde_json::Value::Null,
        Value::Bool(b) => serde_json::Value::Bool(*b),
        Value::Int(n) => serde_json::Value::from(*n),
        Value::Float(n) => serde_json::Number::from_f64(*n)
            .map(serde_json::Value::Number)
            .unwrap_or(serde_json::Value::Null),
        Value::Str(s) => serde_json::Value::String(s.clone()),
        Value::Timestamp(ts) => serde_json::Value::String(ts.to_rfc3339()),
    }
}

/// Convert a table to a JSON array of row objects.
pub fn table_to_json(table: &Table) -> serde_json::Value {
    let rows = table
        .rows()
        .iter()
        .map(|row| {
            let obj: serde_json::Map<String, serde_json::Value> = table
                .schema()
                .iter()
                .zip(row.iter())
                .map(|(col, cell)| (col.name.clone(), value_to_json(cell)))
                .collect();
            serde_json::Value::Object(obj)
        })
        .collect();
    serde_json::Value::Array(rows)
}

/// Render a table as compact JSON.
pub fn to_json(table: &Table) -> String {
    serde_json::to_string(&table_to_json(table)).expect("table JSON is always serializable")
}

/// Render a table as pretty-printed JSON (2-space indentation).
pub fn to_json_pretty(table: &Table) -> String {
    serde_json::to_string_pretty(&table_to_json(table))
        .expect("table JSON is always serializable")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::{ColumnKind, ColumnSchema};

    #[test]
    fn rows_render_as_objects_in_order() {
        let table = Table::new(
            vec![
                ColumnSchema::new("region", ColumnKind::String),
                ColumnSchema::new("total", ColumnKind::Integer),
            ],
            vec![vec![Value::Str("emea".into()), Value::Int(10)]],
        );
        assert_eq!(to_json(&table), r#"[{"region":"emea","total":10}]"#);
    }

    #[test]
    fn null_and_nan_render_as_json_null() {
        assert_eq!(value_to_json(&Value::Null), serde_json::Value::Null);
        assert_eq!(value_to_json(&Value::Float(f64::NAN)), serde_json::Value::Null);
    }

    #[test]
    fn empty_table_is_empty_array() {
        let table = Table::new(vec![], vec![]);
        assert_eq!(to_json(&table), "[]");
    }
}
