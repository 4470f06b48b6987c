//! SQLite-backed dataset source.
//!
//! Serves the same contract as the in-memory backend by translating every
//! logical read into SQL. Connections are pooled; each checkout gets the
//! same row cap and timeout bounds.

use std::path::{Path, PathBuf};
use std::sync::Mutex;

use chrono::NaiveDateTime;
use flowlens_common::DataError;
use rusqlite::Connection;
use tracing::info;

use crate::dataset::{column_info, parse_timestamp, summarize, Dataset};
use crate::ingest::populate;
use crate::query::{map_sqlite_error, run_bounded, QueryLimits, QueryResult};
use crate::table::{Column, ColumnData, ColumnInfo, ColumnKind, SchemaInfo, Table};
use crate::value::Value;
use crate::DatasetSource;

pub struct SqliteSource {
    path: PathBuf,
    table: String,
    limits: QueryLimits,
    pool: Mutex<Vec<Connection>>,
    schema: SchemaInfo,
}

impl SqliteSource {
    /// Open an existing database containing `table`.
    pub fn open(path: &Path, table: &str, limits: QueryLimits) -> Result<Self, DataError> {
        let conn = open_connection(path)?;
        if !table_exists(&conn, table)? {
            return Err(DataError::Load(format!(
                "table '{table}' not found in {}",
                path.display()
            )));
        }

        let schema = introspect(&conn, table)?;
        info!(
            table,
            rows = schema.row_count,
            columns = schema.column_count,
            "opened sqlite dataset"
        );

        Ok(Self {
            path: path.to_path_buf(),
            table: table.to_string(),
            limits,
            pool: Mutex::new(vec![conn]),
            schema,
        })
    }

    /// Open a database, loading `table` from a CSV file first when the
    /// database does not contain it yet. Matches the original bootstrap
    /// behavior: an already-populated table is left untouched.
    pub fn bootstrap_from_csv(
        db_path: &Path,
        csv_path: &Path,
        table: &str,
        limits: QueryLimits,
    ) -> Result<Self, DataError> {
        let mut conn = open_connection(db_path)?;
        if !table_exists(&conn, table)? {
            let dataset = Dataset::load_csv(csv_path)?;
            populate(&mut conn, table, &dataset)?;
        } else {
            info!(table, "table already populated, skipping csv load");
        }
        drop(conn);
        Self::open(db_path, table, limits)
    }

    fn with_conn<T>(
        &self,
        f: impl FnOnce(&Connection) -> Result<T, DataError>,
    ) -> Result<T, DataError> {
        let conn = {
            let mut pool = self
                .pool
                .lock()
                .map_err(|_| DataError::Sql("connection pool poisoned".to_string()))?;
            pool.pop()
        };
        let conn = match conn {
            Some(c) => c,
            None => open_connection(&self.path)?,
        };

        let result = f(&conn);

        if let Ok(mut pool) = self.pool.lock() {
            pool.push(conn);
        }
        result
    }

    fn column_kind(&self, name: &str) -> Result<ColumnKind, DataError> {
        self.schema
            .column(name)
            .map(|c| c.kind)
            .ok_or_else(|| DataError::SchemaMismatch(format!("column '{name}' not found")))
    }
}

impl DatasetSource for SqliteSource {
    fn schema(&self) -> Result<SchemaInfo, DataError> {
        Ok(self.schema.clone())
    }

    fn query(&self, sql: &str) -> Result<QueryResult, DataError> {
        self.with_conn(|conn| run_bounded(conn, sql, &self.limits))
    }

    fn sample(&self, column: &str, n: usize) -> Result<Vec<Value>, DataError> {
        // Validates the column name before it is interpolated into SQL.
        self.column_kind(column)?;
        let sql = format!(
            "SELECT \"{column}\" FROM \"{}\" WHERE \"{column}\" IS NOT NULL LIMIT {n}",
            self.table
        );
        let result = self.with_conn(|conn| run_bounded(conn, &sql, &self.limits))?;
        Ok(result.rows.into_iter().map(|mut r| r.remove(0)).collect())
    }

    fn materialize(&self, columns: &[&str]) -> Result<Table, DataError> {
        let kinds: Vec<ColumnKind> = columns
            .iter()
            .map(|name| self.column_kind(name))
            .collect::<Result<_, _>>()?;

        let select_list = columns
            .iter()
            .map(|c| format!("\"{c}\""))
            .collect::<Vec<_>>()
            .join(", ");
        let sql = format!("SELECT {select_list} FROM \"{}\" ORDER BY rowid", self.table);

        // Full-column reads back the deterministic algorithms; only the
        // timeout applies, not the result row cap.
        let limits = QueryLimits {
            row_cap: usize::MAX,
            timeout: self.limits.timeout,
        };
        let result = self.with_conn(|conn| run_bounded(conn, &sql, &limits))?;

        let mut out = Vec::with_capacity(columns.len());
        for (i, (name, kind)) in columns.iter().zip(kinds).enumerate() {
            let cells = result.rows.iter().map(|row| &row[i]);
            out.push(Column {
                name: name.to_string(),
                data: decode_column(kind, cells),
            });
        }
        Ok(Table::new(out))
    }
}

fn decode_column<'a>(
    kind: ColumnKind,
    cells: impl Iterator<Item = &'a Value>,
) -> ColumnData {
    match kind {
        ColumnKind::Integer => ColumnData::Int(
            cells
                .map(|v| match v {
                    Value::Int(i) => Some(*i),
                    Value::Float(f) => Some(*f as i64),
                    _ => None,
                })
                .collect(),
        ),
        ColumnKind::Float => ColumnData::Float(cells.map(|v| v.as_f64()).collect()),
        ColumnKind::Timestamp => ColumnData::Timestamp(
            cells
                .map(|v| match v {
                    Value::Text(s) => parse_timestamp(s),
                    Value::Timestamp(t) => Some(*t),
                    _ => None,
                })
                .collect(),
        ),
        ColumnKind::Text => ColumnData::Text(
            cells
                .map(|v| match v {
                    Value::Null => None,
                    other => Some(other.to_string()),
                })
                .collect(),
        ),
    }
}

fn open_connection(path: &Path) -> Result<Connection, DataError> {
    Connection::open(path)
        .map_err(|e| DataError::Sql(format!("failed to open {}: {e}", path.display())))
}

fn table_exists(conn: &Connection, table: &str) -> Result<bool, DataError> {
    let count: i64 = conn
        .query_row(
            "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = ?1",
            [table],
            |r| r.get(0),
        )
        .map_err(map_sqlite_error)?;
    Ok(count > 0)
}

/// Build schema metadata by materializing each declared column once.
///
/// The dataset is immutable for the session, so this runs a single time at
/// open and the result is cached.
fn introspect(conn: &Connection, table: &str) -> Result<SchemaInfo, DataError> {
    let mut stmt = conn
        .prepare(&format!("PRAGMA table_info(\"{table}\")"))
        .map_err(map_sqlite_error)?;
    let names: Vec<String> = stmt
        .query_map([], |row| row.get::<_, String>(1))
        .map_err(map_sqlite_error)?
        .collect::<Result<_, _>>()
        .map_err(map_sqlite_error)?;

    let mut infos: Vec<ColumnInfo> = Vec::with_capacity(names.len());
    let mut row_count = 0usize;

    for name in &names {
        let sql = format!("SELECT \"{name}\" FROM \"{table}\"");
        let mut col_stmt = conn.prepare(&sql).map_err(map_sqlite_error)?;
        let mut rows = col_stmt.query([]).map_err(map_sqlite_error)?;

        let mut ints: Vec<Option<i64>> = Vec::new();
        let mut floats: Vec<Option<f64>> = Vec::new();
        let mut texts: Vec<Option<String>> = Vec::new();
        let mut timestamps: Vec<Option<NaiveDateTime>> = Vec::new();
        let mut seen = (false, false, false, false); // int, float, text, ts

        while let Some(row) = rows.next().map_err(map_sqlite_error)? {
            use rusqlite::types::ValueRef;
            match row.get_ref(0).map_err(map_sqlite_error)? {
                ValueRef::Null => {
                    ints.push(None);
                    floats.push(None);
                    texts.push(None);
                    timestamps.push(None);
                }
                ValueRef::Integer(v) => {
                    seen.0 = true;
                    ints.push(Some(v));
                    floats.push(Some(v as f64));
                    texts.push(Some(v.to_string()));
                    timestamps.push(None);
                }
                ValueRef::Real(v) => {
                    seen.1 = true;
                    floats.push(Some(v));
                    ints.push(None);
                    texts.push(Some(v.to_string()));
                    timestamps.push(None);
                }
                ValueRef::Text(bytes) => {
                    let s = String::from_utf8_lossy(bytes).into_owned();
                    let ts = parse_timestamp(&s);
                    if ts.is_some() {
                        seen.3 = true;
                    } else {
                        seen.2 = true;
                    }
                    timestamps.push(ts);
                    texts.push(Some(s));
                    ints.push(None);
                    floats.push(None);
                }
                ValueRef::Blob(_) => {
                    seen.2 = true;
                    texts.push(Some("<blob>".to_string()));
                    ints.push(None);
                    floats.push(None);
                    timestamps.push(None);
                }
            }
        }

        row_count = texts.len();
        let data = if seen.2 || (seen.3 && (seen.0 || seen.1)) {
            ColumnData::Text(texts)
        } else if seen.3 {
            ColumnData::Timestamp(timestamps)
        } else if seen.1 {
            ColumnData::Float(floats)
        } else if seen.0 {
            ColumnData::Int(ints)
        } else {
            ColumnData::Text(texts)
        };

        infos.push(column_info(&Column {
            name: name.clone(),
            data,
        }));
    }

    let summary = summarize(row_count, &infos);
    Ok(SchemaInfo {
        row_count,
        column_count: infos.len(),
        columns: infos,
        summary,
    })
}
