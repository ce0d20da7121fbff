//! Postgres access: statement construction, execution and the lazy pool.
//!
//! Statements are built from a validated [`TableSchema`](crate::registry::TableSchema)
//! and always read rows back as `jsonb`, so no per-table row types exist.

pub mod pool;
pub mod query;
pub mod statement;

pub use pool::{Database, DbError, PoolSettings};
pub use query::{execute, fetch_optional_row, fetch_rows, Row};
pub use statement::{Statement, StatementError};
