//! Materialized results.
//!
//! A [`Table`] is the local, in-memory outcome of executing a plan: an
//! ordered sequence of named, typed columns plus row data. It is only ever
//! produced by an explicit `execute()`; nothing in the builder materializes
//! implicitly.

use crate::client::{CancelToken, ColumnSchema, QueryError, RowStream};
use crate::value::Value;

/// A local, in-memory result set.
#[derive(Debug, Clone, PartialEq)]
pub struct Table {
    schema: Vec<ColumnSchema>,
    rows: Vec<Vec<Value>>,
}

impl Table {
    /// Build a table directly from a schema and rows.
    pub fn new(schema: Vec<ColumnSchema>, rows: Vec<Vec<Value>>) -> Self {
        Table { schema, rows }
    }

    /// Drain a [`RowStream`] into a table.
    ///
    /// The cancellation token is checked between rows; on cancellation the
    /// partially collected rows are dropped and `QueryError::Cancelled` is
    /// returned. All-or-nothing.
    pub fn from_stream(
        stream: RowStream,
        cancel: Option<&CancelToken>,
    ) -> Result<Table, QueryError> {
        let (schema, rows) = stream.into_parts();
        let mut collected = Vec::new();
        for row in rows {
            if let Some(token) = cancel {
                if token.is_cancelled() {
                    return Err(QueryError::Cancelled);
                }
            }
            collected.push(row?);
        }
        tracing::debug!(rows = collected.len(), "materialized result");
        Ok(Table {
            schema,
            rows: collected,
        })
    }

    /// Column names and types, in result order.
    pub fn schema(&self) -> &[ColumnSchema] {
        &self.schema
    }

    /// Row data, one `Vec<Value>` per row in schema order.
    pub fn rows(&self) -> &[Vec<Value>] {
        &self.rows
    }

    pub fn num_rows(&self) -> usize {
        self.rows.len()
    }

    pub fn num_columns(&self) -> usize {
        self.schema.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// All values of one column, by name.
    pub fn column(&self, name: &str) -> Option<Vec<&Value>> {
        let idx = self.schema.iter().position(|c| c.name == name)?;
        Some(self.rows.iter().map(|row| &row[idx]).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::ColumnKind;

    fn sample_stream() -> RowStream {
        RowStream::from_rows(
            vec![
                ColumnSchema::new("region", ColumnKind::String),
                ColumnSchema::new("total", ColumnKind::Integer),
            ],
            vec![
                vec![Value::Str("emea".into()), Value::Int(10)],
                vec![Value::Str("apac".into()), Value::Int(7)],
            ],
        )
    }

    #[test]
    fn drains_stream_into_rows() {
        let table = Table::from_stream(sample_stream(), None).unwrap();
        assert_eq!(table.num_rows(), 2);
        assert_eq!(table.num_columns(), 2);
        assert_eq!(
            table.column("total").unwrap(),
            vec![&Value::Int(10), &Value::Int(7)]
        );
    }

    #[test]
    fn cancelled_token_yields_no_partial_table() {
        let token = CancelToken::new();
        token.cancel();
        let err = Table::from_stream(sample_stream(), Some(&token)).unwrap_err();
        assert!(matches!(err, QueryError::Cancelled));
    }

    #[test]
    fn unknown_column_lookup_is_none() {
        let table = Table::from_stream(sample_stream(), None).unwrap();
        assert!(table.column("missing").is_none());
    }
}
