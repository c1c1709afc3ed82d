//! Expression trees for filters, derived columns, aggregates, and sort keys.
//!
//! Expressions are pure descriptions. Nothing here evaluates anything: the
//! builder stores expression trees inside a [`Plan`](crate::plan::Plan) and
//! the compiler prints them as SQL text. Column names are plain strings and
//! are resolved against the plan's scope only at compile time.
//!
//! # Examples
//!
//! ```
//! use quarry::expr::{col, lit};
//!
//! // amount > 5 AND region = "emea"
//! let predicate = col("amount").gt(lit(5)).and(col("region").eq(lit("emea")));
//! ```

use crate::value::Value;
use chrono::{DateTime, Utc};

/// Binary operators usable inside filter and derive expressions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinOp {
    // Comparison
    /// Equal (`=`)
    Eq,
    /// Not equal (`!=`)
    NotEq,
    /// Less than (`<`)
    Lt,
    /// Less than or equal (`<=`)
    LtEq,
    /// Greater than (`>`)
    Gt,
    /// Greater than or equal (`>=`)
    GtEq,

    // Arithmetic
    /// Addition (`+`)
    Add,
    /// Subtraction (`-`)
    Subtract,
    /// Multiplication (`*`)
    Multiply,
    /// Division (`/`)
    Divide,

    // Logical
    /// Logical AND
    And,
    /// Logical OR
    Or,
}

impl BinOp {
    /// The SQL spelling of the operator
    pub fn as_sql(&self) -> &'static str {
        match self {
            BinOp::Eq => "=",
            BinOp::NotEq => "!=",
            BinOp::Lt => "<",
            BinOp::LtEq => "<=",
            BinOp::Gt => ">",
            BinOp::GtEq => ">=",
            BinOp::Add => "+",
            BinOp::Subtract => "-",
            BinOp::Multiply => "*",
            BinOp::Divide => "/",
            BinOp::And => "AND",
            BinOp::Or => "OR",
        }
    }
}

/// An unevaluated expression over columns, constants, and operators.
///
/// Built with [`col`], [`lit`], and the chaining methods below, then handed
/// to `Plan::filter` or `Plan::mutate`.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// Reference to a column by name.
    ///
    /// Resolution against the plan's scope happens at compile time; an
    /// unknown name is reported as `UnknownColumn` before any query is sent.
    Column(String),

    /// Literal constant
    Literal(Value),

    /// Binary operation (comparison, arithmetic, logical)
    BinaryOp {
        op: BinOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },

    /// Logical negation (`NOT expr`)
    Not(Box<Expr>),

    /// NULL test (`expr IS NULL`)
    IsNull(Box<Expr>),

    /// Non-NULL test (`expr IS NOT NULL`)
    IsNotNull(Box<Expr>),
}

/// Reference a column by name.
///
/// # Example
/// ```
/// use quarry::expr::{col, lit};
/// let e = col("price").gt(lit(100));
/// ```
pub fn col(name: impl Into<String>) -> Expr {
    Expr::Column(name.into())
}

/// Wrap a constant in an expression.
///
/// Accepts anything convertible to [`Value`]: integers, floats, booleans,
/// strings, timestamps.
pub fn lit(value: impl Into<Value>) -> Expr {
    Expr::Literal(value.into())
}

impl Expr {
    fn binary(self, op: BinOp, rhs: impl Into<Expr>) -> Expr {
        Expr::BinaryOp {
            op,
            left: Box::new(self),
            right: Box::new(rhs.into()),
        }
    }

    /// `self = rhs`
    pub fn eq(self, rhs: impl Into<Expr>) -> Expr {
        self.binary(BinOp::Eq, rhs)
    }

    /// `self != rhs`
    pub fn neq(self, rhs: impl Into<Expr>) -> Expr {
        self.binary(BinOp::NotEq, rhs)
    }

    /// `self < rhs`
    pub fn lt(self, rhs: impl Into<Expr>) -> Expr {
        self.binary(BinOp::Lt, rhs)
    }

    /// `self <= rhs`
    pub fn le(self, rhs: impl Into<Expr>) -> Expr {
        self.binary(BinOp::LtEq, rhs)
    }

    /// `self > rhs`
    pub fn gt(self, rhs: impl Into<Expr>) -> Expr {
        self.binary(BinOp::Gt, rhs)
    }

    /// `self >= rhs`
    pub fn ge(self, rhs: impl Into<Expr>) -> Expr {
        self.binary(BinOp::GtEq, rhs)
    }

    /// `self AND rhs`
    pub fn and(self, rhs: impl Into<Expr>) -> Expr {
        self.binary(BinOp::And, rhs)
    }

    /// `self OR rhs`
    pub fn or(self, rhs: impl Into<Expr>) -> Expr {
        self.binary(BinOp::Or, rhs)
    }

    /// `self + rhs`
    pub fn add(self, rhs: impl Into<Expr>) -> Expr {
        self.binary(BinOp::Add, rhs)
    }

    /// `self - rhs`
    pub fn sub(self, rhs: impl Into<Expr>) -> Expr {
        self.binary(BinOp::Subtract, rhs)
    }

    /// `self * rhs`
    pub fn mul(self, rhs: impl Into<Expr>) -> Expr {
        self.binary(BinOp::Multiply, rhs)
    }

    /// `self / rhs`
    pub fn div(self, rhs: impl Into<Expr>) -> Expr {
        self.binary(BinOp::Divide, rhs)
    }

    /// `NOT self`
    pub fn not(self) -> Expr {
        Expr::Not(Box::new(self))
    }

    /// `self IS NULL`
    pub fn is_null(self) -> Expr {
        Expr::IsNull(Box::new(self))
    }

    /// `self IS NOT NULL`
    pub fn is_not_null(self) -> Expr {
        Expr::IsNotNull(Box::new(self))
    }

    /// Collect every column name referenced anywhere in the tree,
    /// in first-appearance order.
    pub fn column_refs(&self) -> Vec<&str> {
        let mut out = Vec::new();
        self.collect_refs(&mut out);
        out
    }

    fn collect_refs<'a>(&'a self, out: &mut Vec<&'a str>) {
        match self {
            Expr::Column(name) => {
                if !out.contains(&name.as_str()) {
                    out.push(name);
                }
            }
            Expr::Literal(_) => {}
            Expr::BinaryOp { left, right, .. } => {
                left.collect_refs(out);
                right.collect_refs(out);
            }
            Expr::Not(inner) | Expr::IsNull(inner) | Expr::IsNotNull(inner) => {
                inner.collect_refs(out);
            }
        }
    }
}

impl From<Value> for Expr {
    fn from(v: Value) -> Self {
        Expr::Literal(v)
    }
}

impl From<bool> for Expr {
    fn from(b: bool) -> Self {
        Expr::Literal(Value::Bool(b))
    }
}

impl From<i64> for Expr {
    fn from(n: i64) -> Self {
        Expr::Literal(Value::Int(n))
    }
}

impl From<i32> for Expr {
    fn from(n: i32) -> Self {
        Expr::Literal(Value::Int(n as i64))
    }
}

impl From<f64> for Expr {
    fn from(n: f64) -> Self {
        Expr::Literal(Value::Float(n))
    }
}

impl From<&str> for Expr {
    fn from(s: &str) -> Self {
        Expr::Literal(Value::Str(s.to_string()))
    }
}

impl From<String> for Expr {
    fn from(s: String) -> Self {
        Expr::Literal(Value::Str(s))
    }
}

impl From<DateTime<Utc>> for Expr {
    fn from(ts: DateTime<Utc>) -> Self {
        Expr::Literal(Value::Timestamp(ts))
    }
}

/// Aggregate functions accepted by `summarise`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AggFunc {
    /// SUM
    Sum,
    /// AVG
    Avg,
    /// MIN
    Min,
    /// MAX
    Max,
    /// COUNT
    Count,
    /// COUNT(DISTINCT ...)
    CountDistinct,
}

/// An aggregate call: function, input expression, and null handling.
///
/// Warehouse aggregate functions skip NULL inputs by default. Calling
/// [`propagate_nulls`](Aggregate::propagate_nulls) flips that: if any input
/// is NULL the whole aggregate yields NULL.
#[derive(Debug, Clone, PartialEq)]
pub struct Aggregate {
    pub func: AggFunc,
    pub input: Expr,
    pub ignore_nulls: bool,
}

impl Aggregate {
    fn new(func: AggFunc, input: impl Into<Expr>) -> Self {
        Aggregate {
            func,
            input: input.into(),
            ignore_nulls: true,
        }
    }

    /// Make NULL inputs poison the result instead of being skipped.
    pub fn propagate_nulls(mut self) -> Self {
        self.ignore_nulls = false;
        self
    }
}

/// `SUM(input)`
pub fn sum(input: impl Into<Expr>) -> Aggregate {
    Aggregate::new(AggFunc::Sum, input)
}

/// `AVG(input)`
pub fn avg(input: impl Into<Expr>) -> Aggregate {
    Aggregate::new(AggFunc::Avg, input)
}

/// `MIN(input)`
pub fn min(input: impl Into<Expr>) -> Aggregate {
    Aggregate::new(AggFunc::Min, input)
}

/// `MAX(input)`
pub fn max(input: impl Into<Expr>) -> Aggregate {
    Aggregate::new(AggFunc::Max, input)
}

/// `COUNT(input)`
pub fn count(input: impl Into<Expr>) -> Aggregate {
    Aggregate::new(AggFunc::Count, input)
}

/// `COUNT(DISTINCT input)`
pub fn count_distinct(input: impl Into<Expr>) -> Aggregate {
    Aggregate::new(AggFunc::CountDistinct, input)
}

/// Sort direction for `arrange`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Ascending,
    Descending,
}

/// One `ORDER BY` key: an expression plus a direction.
#[derive(Debug, Clone, PartialEq)]
pub struct SortKey {
    pub expr: Expr,
    pub direction: Direction,
}

/// Sort ascending by the given column or expression.
pub fn asc(expr: impl Into<Expr>) -> SortKey {
    SortKey {
        expr: expr.into(),
        direction: Direction::Ascending,
    }
}

/// Sort descending by the given column or expression.
pub fn desc(expr: impl Into<Expr>) -> SortKey {
    SortKey {
        expr: expr.into(),
        direction: Direction::Descending,
    }
}

impl From<&str> for SortKey {
    fn from(name: &str) -> Self {
        asc(col(name))
    }
}

impl From<Expr> for SortKey {
    fn from(expr: Expr) -> Self {
        SortKey {
            expr,
            direction: Direction::Ascending,
        }
    }
}
