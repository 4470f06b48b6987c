//! In-memory columnar dataset snapshot and CSV loading.
//!
//! The dataset is loaded once at startup and is read-only for the process
//! lifetime. Column types are inferred from the CSV contents: integer,
//! float, timestamp, then text as the fallback.

use std::collections::HashSet;
use std::path::Path;

use chrono::{NaiveDate, NaiveDateTime};
use flowlens_common::DataError;
use tracing::info;

use crate::table::{with_commas, Column, ColumnData, ColumnInfo, ColumnKind, SchemaInfo};

/// Immutable-for-session columnar table.
#[derive(Debug, Clone)]
pub struct Dataset {
    columns: Vec<Column>,
    row_count: usize,
}

impl Dataset {
    pub fn from_columns(columns: Vec<Column>) -> Self {
        let row_count = columns.first().map(|c| c.data.len()).unwrap_or(0);
        Self { columns, row_count }
    }

    /// Load a CSV file, inferring column types from the data.
    pub fn load_csv(path: &Path) -> Result<Self, DataError> {
        let mut reader = csv::Reader::from_path(path)
            .map_err(|e| DataError::Load(format!("failed to open {}: {e}", path.display())))?;

        let headers: Vec<String> = reader
            .headers()
            .map_err(|e| DataError::Load(format!("failed to read headers: {e}")))?
            .iter()
            .map(|h| h.trim().to_string())
            .collect();

        let mut raw: Vec<Vec<Option<String>>> = vec![Vec::new(); headers.len()];
        for record in reader.records() {
            let record =
                record.map_err(|e| DataError::Load(format!("failed to read record: {e}")))?;
            for (i, cell) in record.iter().enumerate() {
                if i >= raw.len() {
                    break;
                }
                let cell = cell.trim();
                raw[i].push(if cell.is_empty() {
                    None
                } else {
                    Some(cell.to_string())
                });
            }
        }

        let columns: Vec<Column> = headers
            .into_iter()
            .zip(raw)
            .map(|(name, cells)| Column {
                name,
                data: infer_column(cells),
            })
            .collect();

        let dataset = Self::from_columns(columns);
        info!(
            "loaded {} rows x {} columns from {}",
            with_commas(dataset.row_count),
            dataset.columns.len(),
            path.display()
        );
        Ok(dataset)
    }

    pub fn row_count(&self) -> usize {
        self.row_count
    }

    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    /// Build full schema introspection, including the oracle-facing summary.
    pub fn schema(&self) -> SchemaInfo {
        let infos: Vec<ColumnInfo> = self.columns.iter().map(column_info).collect();
        let summary = summarize(self.row_count, &infos);
        SchemaInfo {
            row_count: self.row_count,
            column_count: self.columns.len(),
            columns: infos,
            summary,
        }
    }
}

/// Parse a timestamp in the formats the pipeline feeds actually use.
pub fn parse_timestamp(s: &str) -> Option<NaiveDateTime> {
    for fmt in [
        "%Y-%m-%dT%H:%M:%S%.f",
        "%Y-%m-%d %H:%M:%S%.f",
        "%Y-%m-%d %H:%M:%S",
    ] {
        if let Ok(ts) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(ts);
        }
    }
    for fmt in ["%Y-%m-%d", "%m/%d/%Y"] {
        if let Ok(d) = NaiveDate::parse_from_str(s, fmt) {
            return d.and_hms_opt(0, 0, 0);
        }
    }
    None
}

/// Infer the narrowest type every non-null cell of a column fits.
fn infer_column(cells: Vec<Option<String>>) -> ColumnData {
    let non_null: Vec<&str> = cells.iter().flatten().map(String::as_str).collect();

    if !non_null.is_empty() && non_null.iter().all(|s| s.parse::<i64>().is_ok()) {
        return ColumnData::Int(
            cells
                .iter()
                .map(|c| c.as_deref().and_then(|s| s.parse().ok()))
                .collect(),
        );
    }
    if !non_null.is_empty() && non_null.iter().all(|s| s.parse::<f64>().is_ok()) {
        return ColumnData::Float(
            cells
                .iter()
                .map(|c| c.as_deref().and_then(|s| s.parse().ok()))
                .collect(),
        );
    }
    if !non_null.is_empty() && non_null.iter().all(|s| parse_timestamp(s).is_some()) {
        return ColumnData::Timestamp(
            cells
                .iter()
                .map(|c| c.as_deref().and_then(parse_timestamp))
                .collect(),
        );
    }
    ColumnData::Text(cells)
}

/// Compute schema metadata for one column.
pub(crate) fn column_info(col: &Column) -> ColumnInfo {
    let detail = match &col.data {
        ColumnData::Int(_) | ColumnData::Float(_) => {
            let values: Vec<f64> = col
                .data
                .as_numeric()
                .unwrap_or_default()
                .into_iter()
                .flatten()
                .collect();
            match (
                values.iter().cloned().reduce(f64::min),
                values.iter().cloned().reduce(f64::max),
            ) {
                (Some(min), Some(max)) => format!("range [{min:.2}, {max:.2}]"),
                _ => "all null".to_string(),
            }
        }
        ColumnData::Timestamp(v) => {
            let present: Vec<&NaiveDateTime> = v.iter().flatten().collect();
            match (present.iter().min(), present.iter().max()) {
                (Some(min), Some(max)) => format!("{min} to {max}"),
                _ => "all null".to_string(),
            }
        }
        ColumnData::Text(v) => {
            let distinct: HashSet<&str> = v.iter().flatten().map(String::as_str).collect();
            format!("{} unique values", distinct.len())
        }
    };

    ColumnInfo {
        name: col.name.clone(),
        kind: col.data.kind(),
        null_count: col.data.null_count(),
        detail,
    }
}

/// Render the schema summary text the oracle sees.
pub(crate) fn summarize(row_count: usize, infos: &[ColumnInfo]) -> String {
    let mut lines = vec![
        format!(
            "Dataset: {} rows x {} columns",
            with_commas(row_count),
            infos.len()
        ),
        String::new(),
        "Columns:".to_string(),
    ];

    for info in infos {
        let null_pct = if row_count > 0 {
            info.null_count as f64 / row_count as f64 * 100.0
        } else {
            0.0
        };
        lines.push(format!(
            "  - {} ({}): {}, {null_pct:.1}% null",
            info.name,
            info.kind.as_str(),
            info.detail
        ));
    }

    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_csv(content: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "{content}").unwrap();
        file
    }

    #[test]
    fn loads_and_infers_types() {
        let file = write_csv(
            "pipeline_name,qty,gas_day,flag\n\
             Pipeline A,10.5,2024-01-01,1\n\
             Pipeline B,,2024-01-02,2\n\
             Pipeline C,30.25,2024-01-03,3\n",
        );
        let dataset = Dataset::load_csv(file.path()).unwrap();
        assert_eq!(dataset.row_count(), 3);
        assert_eq!(dataset.column_count(), 4);

        assert_eq!(
            dataset.column("pipeline_name").unwrap().data.kind(),
            ColumnKind::Text
        );
        assert_eq!(dataset.column("qty").unwrap().data.kind(), ColumnKind::Float);
        assert_eq!(
            dataset.column("gas_day").unwrap().data.kind(),
            ColumnKind::Timestamp
        );
        assert_eq!(
            dataset.column("flag").unwrap().data.kind(),
            ColumnKind::Integer
        );
    }

    #[test]
    fn empty_cells_become_nulls() {
        let file = write_csv("a,b\n1,x\n,y\n3,\n");
        let dataset = Dataset::load_csv(file.path()).unwrap();
        assert_eq!(dataset.column("a").unwrap().data.null_count(), 1);
        assert_eq!(dataset.column("b").unwrap().data.null_count(), 1);
    }

    #[test]
    fn schema_summary_mentions_shape_and_nulls() {
        let file = write_csv("name,qty\na,1\nb,\nc,3\nd,4\ne,5\n");
        let dataset = Dataset::load_csv(file.path()).unwrap();
        let schema = dataset.schema();

        assert_eq!(schema.row_count, 5);
        assert!(schema.summary.contains("5 rows x 2 columns"));
        assert!(schema.summary.contains("qty"));
        assert!(schema.summary.contains("20.0% null"));
    }

    #[test]
    fn timestamp_parsing_formats() {
        assert!(parse_timestamp("2024-01-05").is_some());
        assert!(parse_timestamp("2024-01-05 13:30:00").is_some());
        assert!(parse_timestamp("2024-01-05T13:30:00").is_some());
        assert!(parse_timestamp("01/05/2024").is_some());
        assert!(parse_timestamp("not a date").is_none());
    }
}
