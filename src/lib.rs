pub mod client;
#[cfg(feature = "cli")]
pub mod cli;
pub mod compile;
pub mod expr;
pub mod normalize;
pub mod output;
pub mod plan;
pub mod table;
pub mod value;

pub use client::{
    CancelToken, ConnectionHandle, Credentials, QueryError, QueryOptions, RowStream, Warehouse,
};
pub use compile::CompileError;
pub use expr::{Aggregate, BinOp, Expr, SortKey};
pub use normalize::{NormalizeError, Normalizer};
pub use plan::{Op, Plan, TableRef};
pub use table::Table;
pub use value::Value;
