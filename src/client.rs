//! The external warehouse collaborator surface.
//!
//! Everything the builder needs from the outside world goes through the
//! [`Warehouse`] trait: opening a connection, running a compiled query, and
//! the table-upload calls used by the bulk-load workflow. The library ships
//! no network implementation; callers plug in their warehouse client (tests
//! use an in-memory one).
//!
//! [`Plan::execute`](crate::plan::Plan::execute) is the sole blocking point
//! in the crate. It takes a caller-supplied timeout and [`CancelToken`]; a
//! cancelled execution is all-or-nothing and never yields a partial result.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::compile::CompileError;
use crate::plan::TableRef;
use crate::value::Value;

/// Account credentials for [`Warehouse::open_connection`].
#[derive(Debug, Clone)]
pub struct Credentials {
    /// Account identifier (e.g. a service-account email)
    pub account: String,
    /// Account secret (key material, token, ...)
    pub secret: String,
}

impl Credentials {
    pub fn new(account: impl Into<String>, secret: impl Into<String>) -> Self {
        Credentials {
            account: account.into(),
            secret: secret.into(),
        }
    }
}

/// An open connection to one warehouse project.
///
/// Produced by [`Warehouse::open_connection`] and passed back on every call.
#[derive(Debug, Clone)]
pub struct ConnectionHandle {
    /// The project this connection is scoped to
    pub project: String,
    /// Opaque session token minted by the collaborator
    pub session: String,
}

impl ConnectionHandle {
    pub fn new(project: impl Into<String>, session: impl Into<String>) -> Self {
        ConnectionHandle {
            project: project.into(),
            session: session.into(),
        }
    }
}

/// Cooperative cancellation flag for a running execution.
///
/// Cloning shares the flag: cancel from one handle, observe from another.
///
/// # Examples
///
/// ```
/// use quarry::client::CancelToken;
///
/// let token = CancelToken::new();
/// let watcher = token.clone();
/// assert!(!watcher.is_cancelled());
/// token.cancel();
/// assert!(watcher.is_cancelled());
/// ```
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation. Idempotent.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Caller-supplied options for one execution.
#[derive(Debug, Clone, Default)]
pub struct QueryOptions {
    /// Remote-side timeout; `None` waits indefinitely
    pub timeout: Option<Duration>,
    /// Cooperative cancellation; checked between rows while draining results
    pub cancel: Option<CancelToken>,
}

impl QueryOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn with_cancel(mut self, token: CancelToken) -> Self {
        self.cancel = Some(token);
        self
    }
}

/// Column types of a warehouse relation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnKind {
    Integer,
    Float,
    Bool,
    String,
    Timestamp,
}

/// One column of a result or upload schema: a name and a type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnSchema {
    pub name: String,
    pub kind: ColumnKind,
}

impl ColumnSchema {
    pub fn new(name: impl Into<String>, kind: ColumnKind) -> Self {
        ColumnSchema {
            name: name.into(),
            kind,
        }
    }
}

/// Behavior when uploading into a table that already exists.
///
/// The default refuses to touch existing data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WriteDisposition {
    /// Error if the table exists
    #[default]
    Fail,
    /// Replace the table's contents
    Overwrite,
    /// Append to the table's contents
    Append,
}

/// Execution-time errors, surfaced verbatim from the collaborator.
///
/// No automatic retry happens anywhere in this crate; retry policy belongs to
/// the caller. `Compile` is the one local variant: `execute()` compiles the
/// plan first, so scope errors surface before any network round-trip.
#[derive(Debug)]
pub enum QueryError {
    /// Credentials rejected by the warehouse
    Authentication(String),
    /// The requested project does not exist or is not visible
    ProjectNotFound(String),
    /// The remote side gave up within the caller-supplied timeout
    Timeout(Duration),
    /// Project quota exhausted
    QuotaExceeded(String),
    /// The warehouse rejected the query text
    SyntaxError(String),
    /// Transport-level failure reaching the warehouse
    RemoteUnavailable(String),
    /// The caller's [`CancelToken`] fired; no partial result was produced
    Cancelled,
    /// The plan failed to compile; nothing was sent
    Compile(CompileError),
}

impl std::fmt::Display for QueryError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            QueryError::Authentication(msg) => write!(f, "Authentication failed: {}", msg),
            QueryError::ProjectNotFound(project) => {
                write!(f, "Project not found: '{}'", project)
            }
            QueryError::Timeout(d) => write!(f, "Query timed out after {:?}", d),
            QueryError::QuotaExceeded(msg) => write!(f, "Quota exceeded: {}", msg),
            QueryError::SyntaxError(msg) => write!(f, "Query rejected by warehouse: {}", msg),
            QueryError::RemoteUnavailable(msg) => {
                write!(f, "Warehouse unavailable: {}", msg)
            }
            QueryError::Cancelled => write!(f, "Execution cancelled"),
            QueryError::Compile(e) => write!(f, "Compile error: {}", e),
        }
    }
}

impl std::error::Error for QueryError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            QueryError::Compile(e) => Some(e),
            _ => None,
        }
    }
}

impl From<CompileError> for QueryError {
    fn from(e: CompileError) -> Self {
        QueryError::Compile(e)
    }
}

/// Streaming query results: a schema plus a fallible row iterator.
///
/// Rows are pulled one at a time so a large result never has to be buffered
/// by the collaborator; [`Table::from_stream`](crate::table::Table::from_stream)
/// drains it into memory under the caller's cancellation token.
pub struct RowStream {
    schema: Vec<ColumnSchema>,
    rows: Box<dyn Iterator<Item = Result<Vec<Value>, QueryError>>>,
}

impl RowStream {
    pub fn new(
        schema: Vec<ColumnSchema>,
        rows: Box<dyn Iterator<Item = Result<Vec<Value>, QueryError>>>,
    ) -> Self {
        RowStream { schema, rows }
    }

    /// Build a stream over rows already in memory. Convenient for tests and
    /// in-memory collaborators.
    pub fn from_rows(schema: Vec<ColumnSchema>, rows: Vec<Vec<Value>>) -> Self {
        RowStream {
            schema,
            rows: Box::new(rows.into_iter().map(Ok)),
        }
    }

    pub fn schema(&self) -> &[ColumnSchema] {
        &self.schema
    }

    pub fn into_parts(
        self,
    ) -> (
        Vec<ColumnSchema>,
        Box<dyn Iterator<Item = Result<Vec<Value>, QueryError>>>,
    ) {
        (self.schema, self.rows)
    }
}

impl Iterator for RowStream {
    type Item = Result<Vec<Value>, QueryError>;

    fn next(&mut self) -> Option<Self::Item> {
        self.rows.next()
    }
}

/// The warehouse connection/execution service.
///
/// This is the entire surface the core depends on. Authentication, network
/// transport, and SQL execution all live behind it.
pub trait Warehouse {
    /// Authenticate and scope a connection to one project.
    fn open_connection(
        &self,
        credentials: &Credentials,
        project: &str,
    ) -> Result<ConnectionHandle, QueryError>;

    /// Run a compiled query and stream back rows.
    fn run_query(
        &self,
        conn: &ConnectionHandle,
        sql: &str,
        options: &QueryOptions,
    ) -> Result<RowStream, QueryError>;

    /// Create a table with the given schema.
    ///
    /// Used by the upload workflow, not by the query builder.
    fn create_table(
        &self,
        conn: &ConnectionHandle,
        table: &TableRef,
        schema: &[ColumnSchema],
        disposition: WriteDisposition,
    ) -> Result<(), QueryError>;

    /// Append rows to a table.
    ///
    /// Used by the upload workflow, not by the query builder.
    fn upload_rows(
        &self,
        conn: &ConnectionHandle,
        table: &TableRef,
        rows: &[Vec<Value>],
    ) -> Result<(), QueryError>;
}
