//! In-memory dataset backend.

use std::path::Path;
use std::sync::Mutex;

use flowlens_common::DataError;
use rusqlite::Connection;

use crate::dataset::Dataset;
use crate::ingest::populate;
use crate::query::{run_bounded, QueryLimits, QueryResult};
use crate::table::{Column, SchemaInfo, Table};
use crate::value::Value;
use crate::DatasetSource;

/// Columnar snapshot loaded once at startup. Typed column reads come
/// straight from the snapshot; free-form SQL runs against an embedded
/// in-memory SQLite mirror built from the same snapshot at load time, so
/// both paths see identical data and one dialect serves both backends.
pub struct MemorySource {
    dataset: Dataset,
    schema: SchemaInfo,
    mirror: Mutex<Connection>,
    limits: QueryLimits,
}

impl MemorySource {
    /// Load the dataset from a CSV file.
    pub fn load_csv(path: &Path, table: &str, limits: QueryLimits) -> Result<Self, DataError> {
        let dataset = Dataset::load_csv(path)?;
        Self::from_dataset(dataset, table, limits)
    }

    /// Build a source from an already-constructed snapshot.
    pub fn from_dataset(
        dataset: Dataset,
        table: &str,
        limits: QueryLimits,
    ) -> Result<Self, DataError> {
        let mut conn = Connection::open_in_memory()
            .map_err(|e| DataError::Sql(format!("failed to open in-memory mirror: {e}")))?;
        populate(&mut conn, table, &dataset)?;

        let schema = dataset.schema();
        Ok(Self {
            dataset,
            schema,
            mirror: Mutex::new(conn),
            limits,
        })
    }

    pub fn dataset(&self) -> &Dataset {
        &self.dataset
    }
}

impl DatasetSource for MemorySource {
    fn schema(&self) -> Result<SchemaInfo, DataError> {
        Ok(self.schema.clone())
    }

    fn query(&self, sql: &str) -> Result<QueryResult, DataError> {
        let conn = self
            .mirror
            .lock()
            .map_err(|_| DataError::Sql("mirror connection poisoned".to_string()))?;
        run_bounded(&conn, sql, &self.limits)
    }

    fn sample(&self, column: &str, n: usize) -> Result<Vec<Value>, DataError> {
        let col = self
            .dataset
            .column(column)
            .ok_or_else(|| DataError::SchemaMismatch(format!("column '{column}' not found")))?;

        let mut values = Vec::with_capacity(n);
        for i in 0..col.data.len() {
            let value = col.data.value_at(i);
            if !value.is_null() {
                values.push(value);
                if values.len() == n {
                    break;
                }
            }
        }
        Ok(values)
    }

    fn materialize(&self, columns: &[&str]) -> Result<Table, DataError> {
        let mut out: Vec<Column> = Vec::with_capacity(columns.len());
        for name in columns {
            let col = self
                .dataset
                .column(name)
                .ok_or_else(|| DataError::SchemaMismatch(format!("column '{name}' not found")))?;
            out.push(col.clone());
        }
        Ok(Table::new(out))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::ColumnData;

    pub(crate) fn sample_source() -> MemorySource {
        let dataset = Dataset::from_columns(vec![
            Column {
                name: "pipeline_name".into(),
                data: ColumnData::Text(vec![
                    Some("Pipeline A".into()),
                    Some("Pipeline A".into()),
                    Some("Pipeline B".into()),
                ]),
            },
            Column {
                name: "qty".into(),
                data: ColumnData::Float(vec![Some(10.0), None, Some(30.0)]),
            },
        ]);
        MemorySource::from_dataset(dataset, "pipeline_data", QueryLimits::default()).unwrap()
    }

    #[test]
    fn schema_reflects_snapshot() {
        let source = sample_source();
        let schema = source.schema().unwrap();
        assert_eq!(schema.row_count, 3);
        assert_eq!(schema.column_count, 2);
        assert!(schema.summary.contains("pipeline_name"));
    }

    #[test]
    fn sql_mirror_sees_the_same_data() {
        let source = sample_source();
        let result = source
            .query("SELECT COUNT(*) AS n FROM pipeline_data WHERE qty IS NOT NULL")
            .unwrap();
        assert_eq!(result.rows[0][0], Value::Int(2));
    }

    #[test]
    fn sample_skips_nulls() {
        let source = sample_source();
        let values = source.sample("qty", 5).unwrap();
        assert_eq!(values, vec![Value::Float(10.0), Value::Float(30.0)]);
    }

    #[test]
    fn materialize_unknown_column_is_schema_mismatch() {
        let source = sample_source();
        let err = source.materialize(&["nope"]).unwrap_err();
        assert!(matches!(err, DataError::SchemaMismatch(_)));
    }
}
