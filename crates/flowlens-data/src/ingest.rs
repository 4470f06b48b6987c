//! Loading a columnar snapshot into a SQLite table.
//!
//! Used by the memory backend to build its SQL mirror at startup and by
//! the sqlite backend to bootstrap an empty database from CSV.

use flowlens_common::DataError;
use rusqlite::types::{ToSqlOutput, Value as SqlValue};
use rusqlite::{Connection, ToSql};
use tracing::debug;

use crate::dataset::Dataset;
use crate::query::map_sqlite_error;
use crate::table::ColumnData;
use crate::value::Value;

impl ToSql for Value {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        let out = match self {
            Value::Null => ToSqlOutput::Owned(SqlValue::Null),
            Value::Int(v) => ToSqlOutput::Owned(SqlValue::Integer(*v)),
            Value::Float(v) => ToSqlOutput::Owned(SqlValue::Real(*v)),
            Value::Text(v) => ToSqlOutput::Owned(SqlValue::Text(v.clone())),
            Value::Timestamp(v) => ToSqlOutput::Owned(SqlValue::Text(v.to_string())),
        };
        Ok(out)
    }
}

fn affinity(data: &ColumnData) -> &'static str {
    match data {
        ColumnData::Int(_) => "INTEGER",
        ColumnData::Float(_) => "REAL",
        ColumnData::Text(_) | ColumnData::Timestamp(_) => "TEXT",
    }
}

/// Create `table` from the dataset's shape and insert every row.
pub(crate) fn populate(
    conn: &mut Connection,
    table: &str,
    dataset: &Dataset,
) -> Result<(), DataError> {
    let defs: Vec<String> = dataset
        .columns()
        .iter()
        .map(|c| format!("\"{}\" {}", c.name, affinity(&c.data)))
        .collect();
    conn.execute(
        &format!("CREATE TABLE \"{table}\" ({})", defs.join(", ")),
        [],
    )
    .map_err(map_sqlite_error)?;

    let placeholders = vec!["?"; dataset.column_count()].join(", ");
    let insert = format!("INSERT INTO \"{table}\" VALUES ({placeholders})");

    let tx = conn.transaction().map_err(map_sqlite_error)?;
    {
        let mut stmt = tx.prepare(&insert).map_err(map_sqlite_error)?;
        for row in 0..dataset.row_count() {
            let values: Vec<Value> = dataset
                .columns()
                .iter()
                .map(|c| c.data.value_at(row))
                .collect();
            stmt.execute(rusqlite::params_from_iter(values.iter()))
                .map_err(map_sqlite_error)?;
        }
    }
    tx.commit().map_err(map_sqlite_error)?;

    debug!(table, rows = dataset.row_count(), "populated sql mirror");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::Column;

    #[test]
    fn populate_round_trips_values() {
        let dataset = Dataset::from_columns(vec![
            Column {
                name: "name".into(),
                data: ColumnData::Text(vec![Some("a".into()), None]),
            },
            Column {
                name: "qty".into(),
                data: ColumnData::Float(vec![Some(1.5), Some(2.5)]),
            },
        ]);

        let mut conn = Connection::open_in_memory().unwrap();
        populate(&mut conn, "t", &dataset).unwrap();

        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM t", [], |r| r.get(0))
            .unwrap();
        assert_eq!(count, 2);

        let total: f64 = conn
            .query_row("SELECT SUM(qty) FROM t", [], |r| r.get(0))
            .unwrap();
        assert!((total - 4.0).abs() < 1e-9);

        let nulls: i64 = conn
            .query_row("SELECT COUNT(*) FROM t WHERE name IS NULL", [], |r| r.get(0))
            .unwrap();
        assert_eq!(nulls, 1);
    }
}
