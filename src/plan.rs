//! Lazy query plans.
//!
//! A [`Plan`] is a pure value: a base [`TableRef`] plus an ordered list of
//! relational operations. Builder calls never touch the network and never
//! mutate the receiver; each one copies the operation list and appends
//! (copy-on-append), so two plans built from a shared prefix are fully
//! independent.
//!
//! Nothing is validated at build time either. Column names are resolved
//! against the plan's scope by [`compile`](Plan::compile), which is also
//! where the operation sequence is lowered to a single SQL string. The only
//! operation that performs I/O is [`execute`](Plan::execute).
//!
//! # Examples
//!
//! ```
//! use quarry::Plan;
//! use quarry::expr::{col, lit, sum, desc};
//!
//! let orders = Plan::table("acme-analytics", "sales", "orders");
//! let totals = orders
//!     .select(["region", "amount"])
//!     .filter(col("amount").gt(lit(5)))
//!     .group_by(["region"])
//!     .summarise([("total", sum(col("amount")))])
//!     .arrange([desc(col("total"))]);
//!
//! let sql = totals.compile().unwrap();
//! assert!(sql.ends_with("ORDER BY total DESC"));
//! ```

use crate::client::{ConnectionHandle, QueryError, QueryOptions, Warehouse};
use crate::compile::{compile_plan, CompileError};
use crate::expr::{Aggregate, Expr, SortKey};
use crate::table::Table;

/// A remote relation, identified by its (project, dataset, table) triple.
///
/// Immutable once constructed. Rendered as `` `project.dataset.table` `` in
/// compiled SQL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableRef {
    pub project: String,
    pub dataset: String,
    pub table: String,
}

impl TableRef {
    pub fn new(
        project: impl Into<String>,
        dataset: impl Into<String>,
        table: impl Into<String>,
    ) -> Self {
        TableRef {
            project: project.into(),
            dataset: dataset.into(),
            table: table.into(),
        }
    }
}

impl std::fmt::Display for TableRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}.{}", self.project, self.dataset, self.table)
    }
}

/// One stored relational operation.
///
/// Operations are recorded in builder-call order and only interpreted by the
/// compiler.
#[derive(Debug, Clone, PartialEq)]
pub enum Op {
    /// Keep only the named columns, in the given order
    Project(Vec<String>),

    /// Keep only rows matching the predicate
    Filter(Expr),

    /// Add a derived column; the name may shadow an existing column
    /// (last-write-wins for later references)
    Derive { name: String, expr: Expr },

    /// Group by the key columns and compute named aggregates.
    ///
    /// Afterwards the scope is exactly the keys plus the aggregate output
    /// names.
    GroupAggregate {
        keys: Vec<String>,
        aggregates: Vec<(String, Aggregate)>,
    },

    /// Sort by the given keys; emitted only on the outermost clause
    Sort(Vec<SortKey>),
}

/// An unevaluated, composable query over a warehouse table.
///
/// See the [module docs](self) for the builder walkthrough.
#[derive(Debug, Clone, PartialEq)]
pub struct Plan {
    table: TableRef,
    ops: Vec<Op>,
}

impl Plan {
    /// Start a plan over `project.dataset.table`.
    pub fn table(
        project: impl Into<String>,
        dataset: impl Into<String>,
        table: impl Into<String>,
    ) -> Self {
        Plan::new(TableRef::new(project, dataset, table))
    }

    /// Start a plan over an existing [`TableRef`].
    pub fn new(table: TableRef) -> Self {
        Plan {
            table,
            ops: Vec::new(),
        }
    }

    /// The base table this plan reads from.
    pub fn table_ref(&self) -> &TableRef {
        &self.table
    }

    /// The recorded operations, in builder-call order.
    pub fn ops(&self) -> &[Op] {
        &self.ops
    }

    fn append(&self, op: Op) -> Plan {
        let mut ops = self.ops.clone();
        ops.push(op);
        Plan {
            table: self.table.clone(),
            ops,
        }
    }

    /// Keep only the named columns.
    ///
    /// Columns are checked against the plan's scope at compile time, not
    /// here; an unknown name surfaces as `UnknownColumn` from
    /// [`compile`](Plan::compile).
    pub fn select<I, S>(&self, columns: I) -> Plan
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.append(Op::Project(columns.into_iter().map(Into::into).collect()))
    }

    /// Keep only rows where `predicate` holds.
    ///
    /// The predicate is stored, never evaluated locally.
    pub fn filter(&self, predicate: Expr) -> Plan {
        self.append(Op::Filter(predicate))
    }

    /// Add a derived column named `name`.
    ///
    /// The name may shadow an existing column; later operations in the same
    /// plan resolve it to the new definition.
    pub fn mutate(&self, name: impl Into<String>, expr: Expr) -> Plan {
        self.append(Op::Derive {
            name: name.into(),
            expr,
        })
    }

    /// Group by the key columns. Follow with
    /// [`summarise`](GroupedPlan::summarise) to produce aggregates.
    pub fn group_by<I, S>(&self, keys: I) -> GroupedPlan
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        GroupedPlan {
            plan: self.clone(),
            keys: keys.into_iter().map(Into::into).collect(),
        }
    }

    /// Sort the result.
    ///
    /// Accepts [`SortKey`]s from [`asc`](crate::expr::asc) /
    /// [`desc`](crate::expr::desc), or bare column names (ascending).
    pub fn arrange<I, K>(&self, keys: I) -> Plan
    where
        I: IntoIterator<Item = K>,
        K: Into<SortKey>,
    {
        self.append(Op::Sort(keys.into_iter().map(Into::into).collect()))
    }

    /// Lower the plan to a single SQL string.
    ///
    /// Pure and deterministic: the same plan compiles to byte-identical text
    /// on every call. Scope errors (`UnknownColumn`) are raised here, before
    /// any network round-trip.
    pub fn compile(&self) -> Result<String, CompileError> {
        compile_plan(self)
    }

    /// Compile the plan and run it against the warehouse.
    ///
    /// This is the only operation that performs I/O and the only one that can
    /// block. Cancellation via [`QueryOptions::cancel`] is all-or-nothing: a
    /// cancelled execution returns an error, never a partial table.
    pub fn execute<W: Warehouse + ?Sized>(
        &self,
        warehouse: &W,
        conn: &ConnectionHandle,
        options: &QueryOptions,
    ) -> Result<Table, QueryError> {
        let sql = self.compile()?;
        tracing::debug!(table = %self.table, bytes = sql.len(), "executing compiled query");
        let stream = warehouse.run_query(conn, &sql, options)?;
        Table::from_stream(stream, options.cancel.as_ref())
    }
}

/// A plan with grouping keys chosen but aggregates not yet declared.
///
/// Produced by [`Plan::group_by`]; consumed by
/// [`summarise`](GroupedPlan::summarise).
#[derive(Debug, Clone)]
pub struct GroupedPlan {
    plan: Plan,
    keys: Vec<String>,
}

impl GroupedPlan {
    /// Declare the named aggregates and return the grouped plan.
    ///
    /// After this, only the grouping keys and the aggregate output names are
    /// in scope.
    pub fn summarise<I, S>(self, aggregates: I) -> Plan
    where
        I: IntoIterator<Item = (S, Aggregate)>,
        S: Into<String>,
    {
        self.plan.append(Op::GroupAggregate {
            keys: self.keys,
            aggregates: aggregates
                .into_iter()
                .map(|(name, agg)| (name.into(), agg))
                .collect(),
        })
    }
}
