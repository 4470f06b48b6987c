//! Typed columnar containers shared by both backends.

use chrono::NaiveDateTime;
use flowlens_common::DataError;
use serde::{Deserialize, Serialize};

use crate::value::Value;

/// Inferred column type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColumnKind {
    Integer,
    Float,
    Text,
    Timestamp,
}

impl ColumnKind {
    pub fn is_numeric(self) -> bool {
        matches!(self, ColumnKind::Integer | ColumnKind::Float)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ColumnKind::Integer => "integer",
            ColumnKind::Float => "float",
            ColumnKind::Text => "text",
            ColumnKind::Timestamp => "timestamp",
        }
    }
}

/// One column of data, nulls preserved positionally.
#[derive(Debug, Clone, PartialEq)]
pub enum ColumnData {
    Int(Vec<Option<i64>>),
    Float(Vec<Option<f64>>),
    Text(Vec<Option<String>>),
    Timestamp(Vec<Option<NaiveDateTime>>),
}

impl ColumnData {
    pub fn len(&self) -> usize {
        match self {
            ColumnData::Int(v) => v.len(),
            ColumnData::Float(v) => v.len(),
            ColumnData::Text(v) => v.len(),
            ColumnData::Timestamp(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn kind(&self) -> ColumnKind {
        match self {
            ColumnData::Int(_) => ColumnKind::Integer,
            ColumnData::Float(_) => ColumnKind::Float,
            ColumnData::Text(_) => ColumnKind::Text,
            ColumnData::Timestamp(_) => ColumnKind::Timestamp,
        }
    }

    pub fn null_count(&self) -> usize {
        match self {
            ColumnData::Int(v) => v.iter().filter(|x| x.is_none()).count(),
            ColumnData::Float(v) => v.iter().filter(|x| x.is_none()).count(),
            ColumnData::Text(v) => v.iter().filter(|x| x.is_none()).count(),
            ColumnData::Timestamp(v) => v.iter().filter(|x| x.is_none()).count(),
        }
    }

    /// Numeric view with integers widened; `None` for non-numeric columns.
    pub fn as_numeric(&self) -> Option<Vec<Option<f64>>> {
        match self {
            ColumnData::Int(v) => Some(v.iter().map(|x| x.map(|i| i as f64)).collect()),
            ColumnData::Float(v) => Some(v.clone()),
            _ => None,
        }
    }

    /// The value at one row position.
    pub fn value_at(&self, idx: usize) -> Value {
        match self {
            ColumnData::Int(v) => v
                .get(idx)
                .and_then(|x| *x)
                .map_or(Value::Null, Value::Int),
            ColumnData::Float(v) => v
                .get(idx)
                .and_then(|x| *x)
                .map_or(Value::Null, Value::Float),
            ColumnData::Text(v) => v
                .get(idx)
                .and_then(|x| x.clone())
                .map_or(Value::Null, Value::Text),
            ColumnData::Timestamp(v) => v
                .get(idx)
                .and_then(|x| *x)
                .map_or(Value::Null, Value::Timestamp),
        }
    }

    /// Stringified view of every value; used for group-by keys.
    pub fn as_labels(&self) -> Vec<Option<String>> {
        match self {
            ColumnData::Int(v) => v.iter().map(|x| x.map(|i| i.to_string())).collect(),
            ColumnData::Float(v) => v.iter().map(|x| x.map(|f| f.to_string())).collect(),
            ColumnData::Text(v) => v.clone(),
            ColumnData::Timestamp(v) => v.iter().map(|x| x.map(|t| t.to_string())).collect(),
        }
    }
}

/// A named column.
#[derive(Debug, Clone)]
pub struct Column {
    pub name: String,
    pub data: ColumnData,
}

/// A set of materialized columns, all of equal length.
#[derive(Debug, Clone, Default)]
pub struct Table {
    pub row_count: usize,
    columns: Vec<Column>,
}

impl Table {
    pub fn new(columns: Vec<Column>) -> Self {
        let row_count = columns.first().map(|c| c.data.len()).unwrap_or(0);
        Self { row_count, columns }
    }

    pub fn column(&self, name: &str) -> Result<&Column, DataError> {
        self.columns
            .iter()
            .find(|c| c.name == name)
            .ok_or_else(|| DataError::SchemaMismatch(format!("column '{name}' not found")))
    }

    /// Numeric values of one column, `SchemaMismatch` if it is not numeric.
    pub fn numeric(&self, name: &str) -> Result<Vec<Option<f64>>, DataError> {
        let col = self.column(name)?;
        col.data
            .as_numeric()
            .ok_or_else(|| DataError::SchemaMismatch(format!("column '{name}' is not numeric")))
    }

    /// Stringified values of one column (any type).
    pub fn labels(&self, name: &str) -> Result<Vec<Option<String>>, DataError> {
        Ok(self.column(name)?.data.as_labels())
    }

    /// Timestamp values of one column.
    pub fn timestamps(&self, name: &str) -> Result<Vec<Option<NaiveDateTime>>, DataError> {
        match &self.column(name)?.data {
            ColumnData::Timestamp(v) => Ok(v.clone()),
            _ => Err(DataError::SchemaMismatch(format!(
                "column '{name}' is not a timestamp"
            ))),
        }
    }
}

/// Per-column schema metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ColumnInfo {
    pub name: String,
    pub kind: ColumnKind,
    pub null_count: usize,
    /// Type-specific detail: value range, date span, or distinct count.
    pub detail: String,
}

/// Dataset-level schema introspection result.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchemaInfo {
    pub row_count: usize,
    pub column_count: usize,
    pub columns: Vec<ColumnInfo>,
    /// Textual summary fed to the reasoning oracle.
    pub summary: String,
}

impl SchemaInfo {
    pub fn column(&self, name: &str) -> Option<&ColumnInfo> {
        self.columns.iter().find(|c| c.name == name)
    }
}

/// Format an integer with thousands separators, e.g. `1234567` → `1,234,567`.
pub fn with_commas(n: usize) -> String {
    let digits = n.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_table() -> Table {
        Table::new(vec![
            Column {
                name: "qty".into(),
                data: ColumnData::Float(vec![Some(1.0), None, Some(3.0)]),
            },
            Column {
                name: "state".into(),
                data: ColumnData::Text(vec![Some("TX".into()), Some("CA".into()), None]),
            },
        ])
    }

    #[test]
    fn missing_column_is_schema_mismatch() {
        let table = sample_table();
        let err = table.column("nope").unwrap_err();
        assert!(matches!(err, DataError::SchemaMismatch(_)));
    }

    #[test]
    fn numeric_rejects_text() {
        let table = sample_table();
        assert!(table.numeric("qty").is_ok());
        assert!(matches!(
            table.numeric("state"),
            Err(DataError::SchemaMismatch(_))
        ));
    }

    #[test]
    fn labels_stringify_any_type() {
        let table = sample_table();
        let labels = table.labels("qty").unwrap();
        assert_eq!(labels[0].as_deref(), Some("1"));
        assert_eq!(labels[1], None);
    }

    #[test]
    fn null_count() {
        let data = ColumnData::Int(vec![Some(1), None, None, Some(4)]);
        assert_eq!(data.null_count(), 2);
    }

    #[test]
    fn comma_grouping() {
        assert_eq!(with_commas(0), "0");
        assert_eq!(with_commas(999), "999");
        assert_eq!(with_commas(1000), "1,000");
        assert_eq!(with_commas(1234567), "1,234,567");
    }
}
