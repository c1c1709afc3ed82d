use std::cell::RefCell;
use std::collections::HashMap;
use std::time::Duration;

use quarry::client::{
    CancelToken, ColumnKind, ColumnSchema, ConnectionHandle, Credentials, QueryError,
    QueryOptions, RowStream, Warehouse, WriteDisposition,
};
use quarry::expr::{col, desc, lit, sum};
use quarry::{Plan, TableRef, Value};

/// In-memory warehouse standing in for the real collaborator.
struct MockWarehouse {
    project: String,
    schema: Vec<ColumnSchema>,
    rows: Vec<Vec<Value>>,
    /// Error to return from run_query instead of rows
    fail_with: Option<fn() -> QueryError>,
    /// Every query text received, in call order
    queries: RefCell<Vec<String>>,
    /// Uploaded tables: name -> rows
    tables: RefCell<HashMap<String, Vec<Vec<Value>>>>,
}

impl MockWarehouse {
    fn new() -> Self {
        MockWarehouse {
            project: "acme-analytics".to_string(),
            schema: vec![
                ColumnSchema::new("region", ColumnKind::String),
                ColumnSchema::new("total", ColumnKind::Integer),
            ],
            rows: vec![
                vec![Value::Str("emea".into()), Value::Int(12)],
                vec![Value::Str("apac".into()), Value::Int(7)],
            ],
            fail_with: None,
            queries: RefCell::new(Vec::new()),
            tables: RefCell::new(HashMap::new()),
        }
    }

    fn failing(error: fn() -> QueryError) -> Self {
        let mut wh = Self::new();
        wh.fail_with = Some(error);
        wh
    }
}

impl Warehouse for MockWarehouse {
    fn open_connection(
        &self,
        credentials: &Credentials,
        project: &str,
    ) -> Result<ConnectionHandle, QueryError> {
        if credentials.secret != "hunter2" {
            return Err(QueryError::Authentication("bad secret".to_string()));
        }
        if project != self.project {
            return Err(QueryError::ProjectNotFound(project.to_string()));
        }
        Ok(ConnectionHandle::new(project, "session-1"))
    }

    fn run_query(
        &self,
        _conn: &ConnectionHandle,
        sql: &str,
        _options: &QueryOptions,
    ) -> Result<RowStream, QueryError> {
        self.queries.borrow_mut().push(sql.to_string());
        if let Some(error) = self.fail_with {
            return Err(error());
        }
        Ok(RowStream::from_rows(self.schema.clone(), self.rows.clone()))
    }

    fn create_table(
        &self,
        _conn: &ConnectionHandle,
        table: &TableRef,
        _schema: &[ColumnSchema],
        disposition: WriteDisposition,
    ) -> Result<(), QueryError> {
        let mut tables = self.tables.borrow_mut();
        let key = table.to_string();
        if tables.contains_key(&key) && disposition == WriteDisposition::Fail {
            return Err(QueryError::SyntaxError(format!(
                "table {} already exists",
                key
            )));
        }
        if disposition != WriteDisposition::Append {
            tables.insert(key, Vec::new());
        }
        Ok(())
    }

    fn upload_rows(
        &self,
        _conn: &ConnectionHandle,
        table: &TableRef,
        rows: &[Vec<Value>],
    ) -> Result<(), QueryError> {
        self.tables
            .borrow_mut()
            .entry(table.to_string())
            .or_default()
            .extend(rows.iter().cloned());
        Ok(())
    }
}

fn connect(wh: &MockWarehouse) -> ConnectionHandle {
    wh.open_connection(
        &Credentials::new("svc@acme.example", "hunter2"),
        "acme-analytics",
    )
    .unwrap()
}

fn totals_plan() -> Plan {
    Plan::table("acme-analytics", "sales", "orders")
        .filter(col("amount").gt(lit(5)))
        .group_by(["region"])
        .summarise([("total", sum(col("amount")))])
        .arrange([desc(col("total"))])
}

// ============================================================================
// Connection
// ============================================================================

#[test]
fn bad_credentials_are_rejected() {
    let wh = MockWarehouse::new();
    let err = wh
        .open_connection(&Credentials::new("svc@acme.example", "wrong"), "acme-analytics")
        .unwrap_err();
    assert!(matches!(err, QueryError::Authentication(_)));
}

#[test]
fn unknown_project_is_rejected() {
    let wh = MockWarehouse::new();
    let err = wh
        .open_connection(&Credentials::new("svc@acme.example", "hunter2"), "nope")
        .unwrap_err();
    assert!(matches!(err, QueryError::ProjectNotFound(p) if p == "nope"));
}

// ============================================================================
// Execution
// ============================================================================

#[test]
fn execute_sends_compiled_text_verbatim_and_materializes() {
    let wh = MockWarehouse::new();
    let conn = connect(&wh);
    let plan = totals_plan();

    let table = plan
        .execute(&wh, &conn, &QueryOptions::new().with_timeout(Duration::from_secs(30)))
        .unwrap();

    assert_eq!(table.num_rows(), 2);
    assert_eq!(
        table.column("region").unwrap(),
        vec![&Value::Str("emea".into()), &Value::Str("apac".into())]
    );

    let queries = wh.queries.borrow();
    assert_eq!(queries.len(), 1);
    assert_eq!(queries[0], plan.compile().unwrap());
}

#[test]
fn compile_errors_surface_before_any_network_call() {
    let wh = MockWarehouse::new();
    let conn = connect(&wh);
    let plan = Plan::table("acme-analytics", "sales", "orders")
        .select(["a"])
        .filter(col("b").gt(lit(0)));

    let err = plan.execute(&wh, &conn, &QueryOptions::new()).unwrap_err();
    assert!(matches!(err, QueryError::Compile(_)));
    assert!(wh.queries.borrow().is_empty(), "no query should be sent");
}

#[test]
fn cancellation_is_all_or_nothing() {
    let wh = MockWarehouse::new();
    let conn = connect(&wh);
    let token = CancelToken::new();
    token.cancel();

    let err = totals_plan()
        .execute(&wh, &conn, &QueryOptions::new().with_cancel(token))
        .unwrap_err();
    assert!(matches!(err, QueryError::Cancelled));
}

#[test]
fn remote_errors_surface_verbatim() {
    let cases: Vec<(fn() -> QueryError, &str)> = vec![
        (
            || QueryError::Timeout(Duration::from_secs(30)),
            "Query timed out",
        ),
        (
            || QueryError::QuotaExceeded("daily limit".to_string()),
            "Quota exceeded",
        ),
        (
            || QueryError::RemoteUnavailable("connection reset".to_string()),
            "Warehouse unavailable",
        ),
        (
            || QueryError::SyntaxError("unexpected token".to_string()),
            "rejected by warehouse",
        ),
    ];

    for (error, expected) in cases {
        let wh = MockWarehouse::failing(error);
        let conn = connect(&wh);
        let err = totals_plan()
            .execute(&wh, &conn, &QueryOptions::new())
            .unwrap_err();
        assert!(
            err.to_string().contains(expected),
            "expected '{}' in '{}'",
            expected,
            err
        );
    }
}

// ============================================================================
// Upload workflow
// ============================================================================

#[test]
fn create_table_refuses_existing_by_default() {
    let wh = MockWarehouse::new();
    let conn = connect(&wh);
    let table = TableRef::new("acme-analytics", "sales", "staging");
    let schema = vec![ColumnSchema::new("id", ColumnKind::Integer)];

    wh.create_table(&conn, &table, &schema, WriteDisposition::Fail)
        .unwrap();
    let err = wh
        .create_table(&conn, &table, &schema, WriteDisposition::Fail)
        .unwrap_err();
    assert!(err.to_string().contains("already exists"));

    // Overwrite is allowed.
    wh.create_table(&conn, &table, &schema, WriteDisposition::Overwrite)
        .unwrap();
}

#[test]
fn upload_rows_appends() {
    let wh = MockWarehouse::new();
    let conn = connect(&wh);
    let table = TableRef::new("acme-analytics", "sales", "staging");
    let schema = vec![ColumnSchema::new("id", ColumnKind::Integer)];

    wh.create_table(&conn, &table, &schema, WriteDisposition::Fail)
        .unwrap();
    wh.upload_rows(&conn, &table, &[vec![Value::Int(1)]]).unwrap();
    wh.upload_rows(&conn, &table, &[vec![Value::Int(2)]]).unwrap();

    let tables = wh.tables.borrow();
    assert_eq!(tables["acme-analytics.sales.staging"].len(), 2);
}
