//! Dataset access layer for Flowlens.
//!
//! A [`DatasetSource`] is the single read-only gateway between the analysis
//! tools and the underlying storage. Two interchangeable backends exist:
//!
//! - [`MemorySource`] holds the full table as a columnar snapshot loaded
//!   from CSV at startup; free-form SQL runs against an embedded in-memory
//!   SQLite mirror of the same snapshot.
//! - [`SqliteSource`] serves everything from a SQLite database file through
//!   a small connection pool.
//!
//! Both enforce a result row cap and an execution timeout: a query that
//! exceeds either fails with `DataError::ResourceExceeded` instead of
//! hanging or returning unbounded data.

pub mod dataset;
pub mod ingest;
pub mod memory;
pub mod query;
pub mod sqlite;
pub mod table;
pub mod value;

pub use dataset::Dataset;
pub use memory::MemorySource;
pub use query::{QueryLimits, QueryResult};
pub use sqlite::SqliteSource;
pub use table::{Column, ColumnData, ColumnInfo, ColumnKind, SchemaInfo, Table};
pub use value::Value;

use flowlens_common::DataError;

/// Backend-agnostic read-only accessor over the tabular dataset.
///
/// Tools never touch a storage backend directly; every read goes through
/// this trait so resource bounding and backend swapping stay centralized.
pub trait DatasetSource: Send + Sync {
    /// Schema introspection: row/column counts, per-column metadata, and a
    /// textual summary suitable for the reasoning oracle's system prompt.
    fn schema(&self) -> Result<SchemaInfo, DataError>;

    /// Execute a free-form SELECT, honoring the row cap and timeout.
    fn query(&self, sql: &str) -> Result<QueryResult, DataError>;

    /// Up to `n` non-null values from one column.
    fn sample(&self, column: &str, n: usize) -> Result<Vec<Value>, DataError>;

    /// Fetch full typed columns for the analysis tools. A missing column
    /// fails with `DataError::SchemaMismatch`.
    fn materialize(&self, columns: &[&str]) -> Result<Table, DataError>;
}
