//! Lowering of a [`Plan`] into a single SQL string.
//!
//! The compiler walks the recorded operations in order while maintaining a
//! "current relation" (initially the base table) and a pending clause layer:
//! a select list, derived columns, and WHERE predicates. Operations merge
//! into the pending layer when the target dialect permits it; when they
//! cannot, the layer is rendered, wrapped as a subquery with a sequential
//! alias (`t1`, `t2`, ...), and a fresh layer is started on top.
//!
//! The delicate cases:
//!
//! - A derived column cannot be referenced from the WHERE clause of the same
//!   SELECT, so a `filter` touching a same-layer derive wraps first.
//! - A derive referencing an earlier same-layer derive inlines the earlier
//!   definition instead of wrapping.
//! - `group_by(..).summarise(..)` always closes the layer; pending WHERE
//!   predicates become the pre-aggregation WHERE of the grouped SELECT.
//! - Sort keys are collected as encountered and emitted as one ORDER BY on
//!   the outermost clause only.
//!
//! Compilation is a pure function of the plan. Same plan, same bytes.

use regex::Regex;

use crate::expr::{AggFunc, Aggregate, Direction, Expr, SortKey};
use crate::plan::{Op, Plan, TableRef};
use crate::value::Value;

/// Errors raised while lowering a plan to SQL.
///
/// Both variants are reported synchronously from `compile()` (or from
/// `execute()` before it touches the network), never after a round-trip.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CompileError {
    /// A referenced column is not in the plan's scope at that point.
    ///
    /// The scope starts as the (unknown) column set of the base table and is
    /// narrowed by `select` and `group_by(..).summarise(..)`.
    UnknownColumn(String),

    /// An operation was given nothing to work with (empty projection,
    /// empty sort key list, or a grouping with no keys and no aggregates).
    EmptyClause(&'static str),
}

impl std::fmt::Display for CompileError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CompileError::UnknownColumn(name) => {
                write!(f, "Unknown column: '{}' is not in scope", name)
            }
            CompileError::EmptyClause(what) => {
                write!(f, "Empty clause: {} requires at least one entry", what)
            }
        }
    }
}

impl std::error::Error for CompileError {}

/// Column visibility at a point in the plan.
///
/// The client does not know the base table's columns, so the scope starts
/// open (every name resolves) and stays open until the first projection or
/// aggregation pins it down.
#[derive(Debug, Clone)]
enum Scope {
    /// Base-table scope: any column name resolves
    Open,
    /// Exact output column set of the current relation, in order
    Closed(Vec<String>),
}

impl Scope {
    fn resolves(&self, name: &str) -> bool {
        match self {
            Scope::Open => true,
            Scope::Closed(cols) => cols.iter().any(|c| c == name),
        }
    }

    fn check(&self, name: &str) -> Result<(), CompileError> {
        if self.resolves(name) {
            Ok(())
        } else {
            Err(CompileError::UnknownColumn(name.to_string()))
        }
    }

    fn add(&mut self, name: &str) {
        if let Scope::Closed(cols) = self {
            if !cols.iter().any(|c| c == name) {
                cols.push(name.to_string());
            }
        }
    }
}

/// A derived column pending in the current layer.
#[derive(Debug, Clone)]
struct Derived {
    name: String,
    sql: String,
    /// True when the name shadows a column of the layer's input relation,
    /// which forces `* EXCEPT (name)` under a star select.
    shadows_input: bool,
}

/// The pending select list of the current layer.
#[derive(Debug, Clone)]
enum SelectList {
    /// `SELECT *` plus any derived columns
    Star(Vec<Derived>),
    /// Explicit list; `sql` is None for a bare column passthrough
    Explicit(Vec<(String, Option<String>)>),
}

/// The relation the pending layer reads from.
#[derive(Debug, Clone)]
enum Relation {
    /// The base table, backtick-quoted
    Table(String),
    /// An already-rendered SELECT, to be aliased when used as a FROM item
    Subquery { sql: String, alias: String },
}

impl Relation {
    fn as_from(&self) -> String {
        match self {
            Relation::Table(name) => name.clone(),
            Relation::Subquery { sql, alias } => format!("({}) AS {}", sql, alias),
        }
    }
}

struct Compiler {
    from: Relation,
    list: SelectList,
    wheres: Vec<String>,
    scope: Scope,
    sorts: Vec<SortKey>,
    aliases: usize,
    ident_re: Regex,
}

/// Compile a plan into one SQL string. Entry point used by `Plan::compile`.
pub(crate) fn compile_plan(plan: &Plan) -> Result<String, CompileError> {
    let mut c = Compiler::new(plan.table_ref());
    for op in plan.ops() {
        c.apply(op)?;
    }
    c.finish()
}

impl Compiler {
    fn new(table: &TableRef) -> Self {
        Compiler {
            from: Relation::Table(format!(
                "`{}.{}.{}`",
                table.project, table.dataset, table.table
            )),
            list: SelectList::Star(Vec::new()),
            wheres: Vec::new(),
            scope: Scope::Open,
            sorts: Vec::new(),
            aliases: 0,
            // Identifiers matching this are emitted bare; everything else is
            // backtick-quoted.
            ident_re: Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").unwrap(),
        }
    }

    fn apply(&mut self, op: &Op) -> Result<(), CompileError> {
        match op {
            Op::Project(cols) => self.apply_project(cols),
            Op::Filter(pred) => self.apply_filter(pred),
            Op::Derive { name, expr } => self.apply_derive(name, expr),
            Op::GroupAggregate { keys, aggregates } => self.apply_group(keys, aggregates),
            Op::Sort(keys) => self.apply_sort(keys),
        }
    }

    // -- projection ---------------------------------------------------------

    fn apply_project(&mut self, cols: &[String]) -> Result<(), CompileError> {
        if cols.is_empty() {
            return Err(CompileError::EmptyClause("select"));
        }
        for col in cols {
            self.scope.check(col)?;
        }
        // A projection always merges: it narrows the pending select list and
        // carries over any derived definition for a kept name.
        let computed = self.computed_map();
        let items = cols
            .iter()
            .map(|col| {
                let sql = computed
                    .iter()
                    .find(|(name, _)| name == col)
                    .map(|(_, sql)| sql.clone());
                (col.clone(), sql)
            })
            .collect();
        self.list = SelectList::Explicit(items);
        self.scope = Scope::Closed(cols.to_vec());
        Ok(())
    }

    // -- filtering ----------------------------------------------------------

    fn apply_filter(&mut self, pred: &Expr) -> Result<(), CompileError> {
        // WHERE cannot see select aliases of its own SELECT, so a predicate
        // over a same-layer derive forces a clause boundary.
        if self.references_computed(pred) {
            self.wrap();
        }
        let sql = self.render_expr(pred, false)?;
        self.wheres.push(sql);
        Ok(())
    }

    // -- derived columns ----------------------------------------------------

    fn apply_derive(&mut self, name: &str, expr: &Expr) -> Result<(), CompileError> {
        // Same-layer derives are inlined into the new definition, so a chain
        // of mutates never forces nesting on its own.
        let sql = self.render_expr(expr, true)?;
        match &mut self.list {
            SelectList::Explicit(items) => {
                if let Some(item) = items.iter_mut().find(|(n, _)| n == name) {
                    // Shadowing: last write wins, position preserved
                    item.1 = Some(sql);
                } else {
                    items.push((name.to_string(), Some(sql)));
                }
            }
            SelectList::Star(derives) => {
                if let Some(d) = derives.iter_mut().find(|d| d.name == name) {
                    d.sql = sql;
                } else {
                    let shadows_input = match &self.scope {
                        Scope::Closed(cols) => cols.iter().any(|c| c == name),
                        // Unknown base columns: assume no shadowing. The
                        // warehouse tolerates a duplicate output name.
                        Scope::Open => false,
                    };
                    derives.push(Derived {
                        name: name.to_string(),
                        sql,
                        shadows_input,
                    });
                }
            }
        }
        self.scope.add(name);
        Ok(())
    }

    // -- grouping -----------------------------------------------------------

    fn apply_group(
        &mut self,
        keys: &[String],
        aggregates: &[(String, Aggregate)],
    ) -> Result<(), CompileError> {
        if keys.is_empty() && aggregates.is_empty() {
            return Err(CompileError::EmptyClause("group_by/summarise"));
        }
        for key in keys {
            self.scope.check(key)?;
        }

        let computed = self.computed_map();
        let mut select_items = Vec::new();
        for key in keys {
            match computed.iter().find(|(name, _)| name == key) {
                Some((_, sql)) => {
                    select_items.push(format!("{} AS {}", sql, self.ident(key)))
                }
                None => select_items.push(self.ident(key)),
            }
        }
        for (name, agg) in aggregates {
            let call = self.render_aggregate(agg)?;
            select_items.push(format!("{} AS {}", call, self.ident(name)));
        }

        // Pending WHERE predicates stay on this SELECT: they filter the
        // pre-aggregation relation, never become a HAVING.
        let mut sql = format!(
            "SELECT {} FROM {}",
            select_items.join(", "),
            self.from.as_from()
        );
        if !self.wheres.is_empty() {
            sql.push_str(" WHERE ");
            sql.push_str(&self.wheres.join(" AND "));
        }
        if !keys.is_empty() {
            let key_list: Vec<String> = keys.iter().map(|k| self.ident(k)).collect();
            sql.push_str(" GROUP BY ");
            sql.push_str(&key_list.join(", "));
        }

        self.aliases += 1;
        self.from = Relation::Subquery {
            sql,
            alias: format!("t{}", self.aliases),
        };
        self.list = SelectList::Star(Vec::new());
        self.wheres.clear();

        let mut out: Vec<String> = keys.to_vec();
        out.extend(aggregates.iter().map(|(name, _)| name.clone()));
        self.scope = Scope::Closed(out);
        Ok(())
    }

    // -- sorting ------------------------------------------------------------

    fn apply_sort(&mut self, keys: &[SortKey]) -> Result<(), CompileError> {
        if keys.is_empty() {
            return Err(CompileError::EmptyClause("arrange"));
        }
        // Validate now so a typo is caught at the point of the call; the keys
        // are re-checked against the final scope when flushed.
        for key in keys {
            for name in key.expr.column_refs() {
                self.scope.check(name)?;
            }
        }
        self.sorts.extend_from_slice(keys);
        Ok(())
    }

    // -- final assembly -----------------------------------------------------

    fn finish(mut self) -> Result<String, CompileError> {
        // A trivial layer over an already-rendered SELECT adds nothing;
        // unwrap it instead of emitting `SELECT * FROM (...) AS tN`.
        let mut sql = match (&self.from, self.layer_is_trivial()) {
            (Relation::Subquery { sql, .. }, true) => sql.clone(),
            _ => self.render_layer(),
        };
        if !self.sorts.is_empty() {
            let sorts = std::mem::take(&mut self.sorts);
            let mut rendered = Vec::new();
            for key in &sorts {
                // ORDER BY may reference select aliases of the outer clause,
                // so no inlining here, but the names must still resolve.
                let expr_sql = self.render_expr(&key.expr, false)?;
                let dir = match key.direction {
                    Direction::Ascending => "ASC",
                    Direction::Descending => "DESC",
                };
                rendered.push(format!("{} {}", expr_sql, dir));
            }
            sql.push_str(" ORDER BY ");
            sql.push_str(&rendered.join(", "));
        }
        Ok(sql)
    }

    // -- layer machinery ----------------------------------------------------

    fn layer_is_trivial(&self) -> bool {
        matches!(&self.list, SelectList::Star(derives) if derives.is_empty())
            && self.wheres.is_empty()
    }

    /// Name-to-SQL map of columns computed in the current layer.
    fn computed_map(&self) -> Vec<(String, String)> {
        match &self.list {
            SelectList::Star(derives) => derives
                .iter()
                .map(|d| (d.name.clone(), d.sql.clone()))
                .collect(),
            SelectList::Explicit(items) => items
                .iter()
                .filter_map(|(name, sql)| sql.as_ref().map(|s| (name.clone(), s.clone())))
                .collect(),
        }
    }

    fn references_computed(&self, expr: &Expr) -> bool {
        let computed = self.computed_map();
        expr.column_refs()
            .iter()
            .any(|name| computed.iter().any(|(n, _)| n == name))
    }

    /// Render the pending layer as a full SELECT over the current relation.
    fn render_layer(&self) -> String {
        let list = match &self.list {
            SelectList::Star(derives) => {
                if derives.is_empty() {
                    "*".to_string()
                } else {
                    let shadowed: Vec<String> = derives
                        .iter()
                        .filter(|d| d.shadows_input)
                        .map(|d| self.ident(&d.name))
                        .collect();
                    let mut parts = vec![if shadowed.is_empty() {
                        "*".to_string()
                    } else {
                        format!("* EXCEPT ({})", shadowed.join(", "))
                    }];
                    for d in derives {
                        parts.push(format!("{} AS {}", d.sql, self.ident(&d.name)));
                    }
                    parts.join(", ")
                }
            }
            SelectList::Explicit(items) => items
                .iter()
                .map(|(name, sql)| match sql {
                    Some(sql) => format!("{} AS {}", sql, self.ident(name)),
                    None => self.ident(name),
                })
                .collect::<Vec<_>>()
                .join(", "),
        };
        let mut sql = format!("SELECT {} FROM {}", list, self.from.as_from());
        if !self.wheres.is_empty() {
            sql.push_str(" WHERE ");
            sql.push_str(&self.wheres.join(" AND "));
        }
        sql
    }

    /// Close the pending layer: render it, alias it, and start fresh on top.
    /// The scope is unchanged because every in-scope name is an output column
    /// of the wrapped subquery.
    fn wrap(&mut self) {
        let inner = self.render_layer();
        self.aliases += 1;
        self.from = Relation::Subquery {
            sql: inner,
            alias: format!("t{}", self.aliases),
        };
        self.list = SelectList::Star(Vec::new());
        self.wheres.clear();
    }

    // -- expression rendering -----------------------------------------------

    fn render_expr(&self, expr: &Expr, inline_computed: bool) -> Result<String, CompileError> {
        match expr {
            Expr::Column(name) => {
                if inline_computed {
                    if let Some((_, sql)) =
                        self.computed_map().into_iter().find(|(n, _)| n == name)
                    {
                        return Ok(sql);
                    }
                }
                self.scope.check(name)?;
                Ok(self.ident(name))
            }
            Expr::Literal(v) => Ok(literal_sql(v)),
            Expr::BinaryOp { op, left, right } => Ok(format!(
                "({} {} {})",
                self.render_expr(left, inline_computed)?,
                op.as_sql(),
                self.render_expr(right, inline_computed)?
            )),
            Expr::Not(inner) => Ok(format!(
                "NOT ({})",
                self.render_expr(inner, inline_computed)?
            )),
            Expr::IsNull(inner) => Ok(format!(
                "{} IS NULL",
                self.render_expr(inner, inline_computed)?
            )),
            Expr::IsNotNull(inner) => Ok(format!(
                "{} IS NOT NULL",
                self.render_expr(inner, inline_computed)?
            )),
        }
    }

    fn render_aggregate(&self, agg: &Aggregate) -> Result<String, CompileError> {
        let inner = self.render_expr(&agg.input, true)?;
        let call = match agg.func {
            AggFunc::Sum => format!("SUM({})", inner),
            AggFunc::Avg => format!("AVG({})", inner),
            AggFunc::Min => format!("MIN({})", inner),
            AggFunc::Max => format!("MAX({})", inner),
            AggFunc::Count => format!("COUNT({})", inner),
            AggFunc::CountDistinct => format!("COUNT(DISTINCT {})", inner),
        };
        if agg.ignore_nulls {
            Ok(call)
        } else {
            // Aggregate functions skip NULLs; propagate them explicitly when
            // the caller asked for strict null handling.
            Ok(format!(
                "IF(COUNTIF({} IS NULL) > 0, NULL, {})",
                inner, call
            ))
        }
    }

    fn ident(&self, name: &str) -> String {
        if self.ident_re.is_match(name) {
            name.to_string()
        } else {
            format!("`{}`", name.replace('\\', "\\\\").replace('`', "\\`"))
        }
    }
}

fn literal_sql(v: &Value) -> String {
    match v {
        Value::Null => "NULL".to_string(),
        Value::Bool(true) => "TRUE".to_string(),
        Value::Bool(false) => "FALSE".to_string(),
        Value::Int(n) => n.to_string(),
        Value::Float(n) => format!("{:?}", n),
        Value::Str(s) => format!("'{}'", s.replace('\\', "\\\\").replace('\'', "\\'")),
        Value::Timestamp(ts) => format!("TIMESTAMP '{}'", ts.format("%Y-%m-%dT%H:%M:%SZ")),
    }
}
