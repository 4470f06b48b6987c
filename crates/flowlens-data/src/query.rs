//! Bounded SQL execution shared by both backends.
//!
//! Free-form queries are SELECT-only and run under a result row cap and a
//! wall-clock timeout. The timeout uses SQLite's progress handler so a
//! runaway query is interrupted instead of blocking the worker.

use std::time::{Duration, Instant};

use flowlens_common::DataError;
use rusqlite::Connection;

use crate::value::Value;

/// Resource bounds applied to every query.
#[derive(Debug, Clone, Copy)]
pub struct QueryLimits {
    pub row_cap: usize,
    pub timeout: Duration,
}

impl Default for QueryLimits {
    fn default() -> Self {
        Self {
            row_cap: 10_000,
            timeout: Duration::from_secs(10),
        }
    }
}

/// Result table of a free-form query.
#[derive(Debug, Clone)]
pub struct QueryResult {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Value>>,
    pub row_count: usize,
    pub elapsed: Duration,
}

/// Statements SQLite would treat as writes or schema changes. Matched as
/// whole tokens so column names like `created_dt` pass.
const FORBIDDEN: &[&str] = &[
    "INSERT", "UPDATE", "DELETE", "DROP", "ALTER", "CREATE", "TRUNCATE", "ATTACH", "DETACH",
    "PRAGMA", "VACUUM", "REINDEX",
];

/// Reject anything that is not a plain read.
pub fn ensure_select(sql: &str) -> Result<(), DataError> {
    let trimmed = sql.trim();
    let upper = trimmed.to_uppercase();
    if !(upper.starts_with("SELECT") || upper.starts_with("WITH")) {
        return Err(DataError::QueryRejected(
            "only SELECT queries are allowed".to_string(),
        ));
    }

    for token in upper.split(|c: char| !c.is_ascii_alphanumeric() && c != '_') {
        if FORBIDDEN.contains(&token) {
            return Err(DataError::QueryRejected(format!(
                "{token} operations are not allowed"
            )));
        }
    }
    Ok(())
}

/// Execute a guarded SELECT with the row cap and timeout enforced.
pub(crate) fn run_bounded(
    conn: &Connection,
    sql: &str,
    limits: &QueryLimits,
) -> Result<QueryResult, DataError> {
    ensure_select(sql)?;

    let start = Instant::now();
    let deadline = start + limits.timeout;
    conn.progress_handler(1000, Some(move || Instant::now() >= deadline));

    let result = collect_rows(conn, sql, limits, start);

    conn.progress_handler(0, None::<fn() -> bool>);
    result
}

fn collect_rows(
    conn: &Connection,
    sql: &str,
    limits: &QueryLimits,
    start: Instant,
) -> Result<QueryResult, DataError> {
    let mut stmt = conn.prepare(sql).map_err(map_sqlite_error)?;
    let columns: Vec<String> = stmt.column_names().iter().map(|s| s.to_string()).collect();
    let column_count = columns.len();

    let mut rows = Vec::new();
    let mut raw = stmt.query([]).map_err(map_sqlite_error)?;
    while let Some(row) = raw.next().map_err(map_sqlite_error)? {
        if rows.len() >= limits.row_cap {
            return Err(DataError::ResourceExceeded(format!(
                "query returned more than {} rows; narrow the query",
                limits.row_cap
            )));
        }
        let mut values = Vec::with_capacity(column_count);
        for i in 0..column_count {
            values.push(read_value(row, i)?);
        }
        rows.push(values);
    }

    let row_count = rows.len();
    Ok(QueryResult {
        columns,
        rows,
        row_count,
        elapsed: start.elapsed(),
    })
}

fn read_value(row: &rusqlite::Row<'_>, idx: usize) -> Result<Value, DataError> {
    use rusqlite::types::ValueRef;
    let value = match row.get_ref(idx).map_err(map_sqlite_error)? {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(v) => Value::Int(v),
        ValueRef::Real(v) => Value::Float(v),
        ValueRef::Text(bytes) => Value::Text(String::from_utf8_lossy(bytes).into_owned()),
        ValueRef::Blob(_) => Value::Text("<blob>".to_string()),
    };
    Ok(value)
}

pub(crate) fn map_sqlite_error(err: rusqlite::Error) -> DataError {
    if let rusqlite::Error::SqliteFailure(inner, _) = &err {
        if inner.code == rusqlite::ErrorCode::OperationInterrupted {
            return DataError::ResourceExceeded("query timed out".to_string());
        }
    }
    DataError::Sql(err.to_string())
}
