//! Column statistics and correlation tools.

use flowlens_common::ToolError;
use flowlens_data::{ColumnData, ColumnKind, DatasetSource};
use serde_json::json;

use crate::args::ToolArgs;
use crate::numeric;
use crate::registry::ToolResult;

/// Detailed statistics for one column.
pub fn column_stats(source: &dyn DatasetSource, args: &ToolArgs) -> Result<ToolResult, ToolError> {
    let name = args.str("column")?;
    let table = source.materialize(&[name])?;
    let column = table.column(name)?;

    let total = column.data.len();
    let nulls = column.data.null_count();
    let null_pct = if total > 0 {
        nulls as f64 / total as f64 * 100.0
    } else {
        0.0
    };

    let labels = column.data.as_labels();
    let distinct = labels
        .iter()
        .flatten()
        .collect::<std::collections::HashSet<_>>()
        .len();

    let mut data = json!({
        "column": name,
        "type": column.data.kind().as_str(),
        "count": total,
        "null_count": nulls,
        "null_pct": null_pct,
        "unique_values": distinct,
    });
    let mut lines = vec![
        format!("Statistics for '{name}' ({}):", column.data.kind().as_str()),
        format!("  rows: {total}, nulls: {nulls} ({null_pct:.1}%), unique: {distinct}"),
    ];

    match &column.data {
        ColumnData::Int(_) | ColumnData::Float(_) => {
            let values = numeric::present(&column.data.as_numeric().unwrap_or_default());
            if values.is_empty() {
                lines.push("  no non-null numeric values".to_string());
            } else {
                let mut sorted = values.clone();
                sorted.sort_by(|a, b| a.partial_cmp(b).unwrap());
                let stats = json!({
                    "min": sorted[0],
                    "max": sorted[sorted.len() - 1],
                    "mean": numeric::mean(&values),
                    "median": numeric::median(&sorted),
                    "std": numeric::std_dev(&values),
                    "q25": numeric::quantile(&sorted, 0.25),
                    "q75": numeric::quantile(&sorted, 0.75),
                });
                lines.push(format!(
                    "  min: {:.4}, max: {:.4}, mean: {:.4}, median: {:.4}, std: {:.4}",
                    sorted[0],
                    sorted[sorted.len() - 1],
                    numeric::mean(&values),
                    numeric::median(&sorted),
                    numeric::std_dev(&values),
                ));
                data["numeric"] = stats;
            }
        }
        ColumnData::Timestamp(v) => {
            let present: Vec<_> = v.iter().flatten().collect();
            if let (Some(min), Some(max)) = (present.iter().min(), present.iter().max()) {
                lines.push(format!("  spans {min} to {max}"));
                data["range"] = json!({ "min": min.to_string(), "max": max.to_string() });
            }
        }
        ColumnData::Text(_) => {
            let counts = value_counts(&labels, 10);
            if !counts.is_empty() {
                lines.push("  top values:".to_string());
                for (value, count) in &counts {
                    lines.push(format!("    {value}: {count}"));
                }
                data["top_values"] = json!(counts
                    .iter()
                    .map(|(v, c)| json!({ "value": v, "count": c }))
                    .collect::<Vec<_>>());
            }
        }
    }

    Ok(ToolResult {
        data,
        narrative: lines.join("\n"),
    })
}

fn value_counts(labels: &[Option<String>], top: usize) -> Vec<(String, usize)> {
    let mut counts: std::collections::HashMap<&str, usize> = std::collections::HashMap::new();
    for label in labels.iter().flatten() {
        *counts.entry(label.as_str()).or_default() += 1;
    }
    let mut sorted: Vec<(String, usize)> = counts
        .into_iter()
        .map(|(k, v)| (k.to_string(), v))
        .collect();
    sorted.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    sorted.truncate(top);
    sorted
}

/// Pairwise correlations over numeric columns, strongest first.
pub fn find_correlations(
    source: &dyn DatasetSource,
    args: &ToolArgs,
) -> Result<ToolResult, ToolError> {
    let method = args.str_or("method", "pearson");
    let threshold = args.f64_or("threshold", 0.7);

    let schema = source.schema().map_err(ToolError::from)?;
    let columns: Vec<String> = match args.opt_str_list("columns") {
        Some(list) if !list.is_empty() => list,
        _ => schema
            .columns
            .iter()
            .filter(|c| c.kind.is_numeric())
            .map(|c| c.name.clone())
            .collect(),
    };
    if columns.len() < 2 {
        return Err(ToolError::Execution(
            "need at least two numeric columns to correlate".to_string(),
        ));
    }
    for name in &columns {
        match schema.column(name) {
            Some(info) if info.kind.is_numeric() => {}
            Some(_) => {
                return Err(ToolError::Execution(format!(
                    "column '{name}' is not numeric"
                )))
            }
            None => {
                return Err(ToolError::Execution(format!("column '{name}' not found")))
            }
        }
    }

    let refs: Vec<&str> = columns.iter().map(String::as_str).collect();
    let table = source.materialize(&refs)?;
    let series: Vec<Vec<Option<f64>>> = columns
        .iter()
        .map(|name| table.numeric(name))
        .collect::<Result<_, _>>()?;

    let mut pairs: Vec<(String, String, f64)> = Vec::new();
    for i in 0..columns.len() {
        for j in (i + 1)..columns.len() {
            let (x, y) = paired(&series[i], &series[j]);
            let r = match method {
                "spearman" => numeric::spearman(&x, &y),
                _ => numeric::pearson(&x, &y),
            };
            if let Some(r) = r {
                pairs.push((columns[i].clone(), columns[j].clone(), r));
            }
        }
    }
    pairs.sort_by(|a, b| b.2.abs().partial_cmp(&a.2.abs()).unwrap());
    pairs.truncate(15);

    let strong: Vec<&(String, String, f64)> =
        pairs.iter().filter(|(_, _, r)| r.abs() >= threshold).collect();

    let mut lines = vec![format!(
        "Correlations ({method}) across {} columns, strongest first:",
        columns.len()
    )];
    for (a, b, r) in &pairs {
        let flag = if r.abs() >= threshold { "  [strong]" } else { "" };
        lines.push(format!("  {a} vs {b}: {r:.3}{flag}"));
    }
    if pairs.is_empty() {
        lines.push("  no defined correlations (constant or empty columns)".to_string());
    } else {
        lines.push(format!(
            "{} pair(s) at or above |r| = {threshold}",
            strong.len()
        ));
    }

    Ok(ToolResult {
        data: json!({
            "method": method,
            "threshold": threshold,
            "pairs": pairs
                .iter()
                .map(|(a, b, r)| json!({ "a": a, "b": b, "r": r }))
                .collect::<Vec<_>>(),
            "strong_count": strong.len(),
        }),
        narrative: lines.join("\n"),
    })
}

/// Rows where both sides are present and finite.
fn paired(a: &[Option<f64>], b: &[Option<f64>]) -> (Vec<f64>, Vec<f64>) {
    let mut x = Vec::new();
    let mut y = Vec::new();
    for (va, vb) in a.iter().zip(b) {
        if let (Some(va), Some(vb)) = (va, vb) {
            if va.is_finite() && vb.is_finite() {
                x.push(*va);
                y.push(*vb);
            }
        }
    }
    (x, y)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{args_for, sample_source, source_from};
    use flowlens_data::{Column, ColumnData};

    #[test]
    fn numeric_column_stats() {
        let source = sample_source();
        let args = args_for("column_stats", serde_json::json!({"column": "qty"}));
        let result = column_stats(&source, &args).unwrap();
        assert_eq!(result.data["count"], 8);
        assert_eq!(result.data["null_count"], 1);
        assert_eq!(result.data["numeric"]["min"], 10.0);
        assert_eq!(result.data["numeric"]["max"], 60.0);
        assert!(result.narrative.contains("qty"));
    }

    #[test]
    fn text_column_stats_include_top_values() {
        let source = sample_source();
        let args = args_for("column_stats", serde_json::json!({"column": "pipeline_name"}));
        let result = column_stats(&source, &args).unwrap();
        assert_eq!(result.data["unique_values"], 2);
        assert!(result.narrative.contains("Pipeline A"));
    }

    #[test]
    fn missing_column_is_an_error() {
        let source = sample_source();
        let args = args_for("column_stats", serde_json::json!({"column": "nope"}));
        assert!(column_stats(&source, &args).is_err());
    }

    #[test]
    fn identical_columns_correlate_perfectly() {
        let source = source_from(vec![
            Column {
                name: "a".into(),
                data: ColumnData::Float(vec![Some(1.0), Some(2.0), Some(3.0), Some(4.0)]),
            },
            Column {
                name: "b".into(),
                data: ColumnData::Float(vec![Some(1.0), Some(2.0), Some(3.0), Some(4.0)]),
            },
        ]);
        let args = args_for("find_correlations", serde_json::json!({}));
        let result = find_correlations(&source, &args).unwrap();
        let r = result.data["pairs"][0]["r"].as_f64().unwrap();
        assert!((r - 1.0).abs() < 1e-12);
        assert_eq!(result.data["strong_count"], 1);
    }

    #[test]
    fn single_numeric_column_cannot_correlate() {
        let source = source_from(vec![Column {
            name: "only".into(),
            data: ColumnData::Float(vec![Some(1.0), Some(2.0)]),
        }]);
        let args = args_for("find_correlations", serde_json::json!({}));
        assert!(find_correlations(&source, &args).is_err());
    }
}
