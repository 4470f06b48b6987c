//! Free-form SQL escape hatch.

use flowlens_common::ToolError;
use flowlens_data::DatasetSource;
use serde_json::json;

use crate::args::ToolArgs;
use crate::registry::ToolResult;

const ROWS_SHOWN: usize = 20;

/// Run a guarded SELECT and render the result table. The backend enforces
/// the read-only guard, the row cap, and the timeout.
pub fn execute_query(source: &dyn DatasetSource, args: &ToolArgs) -> Result<ToolResult, ToolError> {
    let sql = args.str("sql")?;
    let result = source.query(sql)?;

    let mut lines = vec![format!(
        "Query returned {} row(s) in {:.3}s.",
        result.row_count,
        result.elapsed.as_secs_f64()
    )];
    if result.row_count > 0 {
        lines.push(result.columns.join(" | "));
        for row in result.rows.iter().take(ROWS_SHOWN) {
            lines.push(
                row.iter()
                    .map(|v| v.to_string())
                    .collect::<Vec<_>>()
                    .join(" | "),
            );
        }
        if result.row_count > ROWS_SHOWN {
            lines.push(format!("... {} more row(s)", result.row_count - ROWS_SHOWN));
        }
    }

    Ok(ToolResult {
        data: json!({
            "sql": sql,
            "columns": result.columns,
            "rows": result.rows
                .iter()
                .map(|row| row.iter().map(|v| v.to_json()).collect::<Vec<_>>())
                .collect::<Vec<_>>(),
            "row_count": result.row_count,
            "elapsed_seconds": result.elapsed.as_secs_f64(),
        }),
        narrative: lines.join("\n"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{args_for, sample_source};
    use flowlens_common::DataError;

    #[test]
    fn select_renders_a_table() {
        let source = sample_source();
        let args = args_for(
            "execute_query",
            serde_json::json!({
                "sql": "SELECT pipeline_name, SUM(qty) AS total FROM pipeline_data \
                        GROUP BY pipeline_name ORDER BY total DESC"
            }),
        );
        let result = execute_query(&source, &args).unwrap();
        assert_eq!(result.data["row_count"], 2);
        assert_eq!(result.data["rows"][0][0], "Pipeline B");
        assert!(result.narrative.contains("pipeline_name | total"));
    }

    #[test]
    fn writes_surface_as_tool_errors() {
        let source = sample_source();
        let args = args_for(
            "execute_query",
            serde_json::json!({"sql": "DROP TABLE pipeline_data"}),
        );
        let err = execute_query(&source, &args).unwrap_err();
        assert!(matches!(
            err,
            ToolError::Data(DataError::QueryRejected(_))
        ));
    }

    #[test]
    fn syntax_errors_surface_as_tool_errors() {
        let source = sample_source();
        let args = args_for(
            "execute_query",
            serde_json::json!({"sql": "SELECT nope FROM nowhere"}),
        );
        assert!(execute_query(&source, &args).is_err());
    }
}
