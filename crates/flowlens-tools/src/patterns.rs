//! Group-by pattern mining.

use flowlens_common::ToolError;
use flowlens_data::DatasetSource;
use serde_json::json;

use crate::args::ToolArgs;
use crate::numeric;
use crate::registry::ToolResult;

/// Aggregate a metric per group and return the top groups.
pub fn find_patterns(source: &dyn DatasetSource, args: &ToolArgs) -> Result<ToolResult, ToolError> {
    let group_by = args.str_list("group_by")?;
    if group_by.is_empty() {
        return Err(ToolError::InvalidCall(
            "group_by must name at least one column".to_string(),
        ));
    }
    let agg_column = args.str("agg_column")?;
    let agg_func = args.str_or("agg_func", "mean");
    let top_n = args.usize_or("top_n", 20);

    let mut wanted: Vec<&str> = group_by.iter().map(String::as_str).collect();
    wanted.push(agg_column);
    let table = source.materialize(&wanted)?;

    let key_columns: Vec<Vec<Option<String>>> = group_by
        .iter()
        .map(|name| table.labels(name))
        .collect::<Result<_, _>>()?;
    let metric = table.numeric(agg_column)?;

    let groups = group_values(&key_columns, &metric);
    if groups.is_empty() {
        return Err(ToolError::Execution(
            "no rows with complete group keys and metric values".to_string(),
        ));
    }

    let mut rows: Vec<(String, f64, usize)> = groups
        .into_iter()
        .map(|(key, values)| {
            let agg = aggregate(agg_func, &values);
            (key, agg, values.len())
        })
        .collect();
    rows.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
    let total_groups = rows.len();
    rows.truncate(top_n);

    let mut lines = vec![format!(
        "{agg_func}({agg_column}) by {} ({total_groups} group(s), top {}):",
        group_by.join(", "),
        rows.len()
    )];
    for (key, agg, count) in &rows {
        lines.push(format!("  {key}: {agg:.4} ({count} rows)"));
    }

    Ok(ToolResult {
        data: json!({
            "group_by": group_by,
            "agg_column": agg_column,
            "agg_func": agg_func,
            "total_groups": total_groups,
            "groups": rows
                .iter()
                .map(|(key, agg, count)| json!({
                    "group": key,
                    "value": agg,
                    "row_count": count,
                }))
                .collect::<Vec<_>>(),
        }),
        narrative: lines.join("\n"),
    })
}

/// Metric values per composite group key. Rows with a null key component
/// or a missing metric are skipped.
pub(crate) fn group_values(
    key_columns: &[Vec<Option<String>>],
    metric: &[Option<f64>],
) -> std::collections::BTreeMap<String, Vec<f64>> {
    let mut groups: std::collections::BTreeMap<String, Vec<f64>> =
        std::collections::BTreeMap::new();
    'rows: for (i, value) in metric.iter().enumerate() {
        let Some(value) = (*value).filter(|v| v.is_finite()) else {
            continue;
        };
        let mut parts = Vec::with_capacity(key_columns.len());
        for column in key_columns {
            match column.get(i).and_then(Clone::clone) {
                Some(part) => parts.push(part),
                None => continue 'rows,
            }
        }
        groups.entry(parts.join(" | ")).or_default().push(value);
    }
    groups
}

pub(crate) fn aggregate(func: &str, values: &[f64]) -> f64 {
    match func {
        "sum" => values.iter().sum(),
        "count" => values.len() as f64,
        "min" => values.iter().copied().fold(f64::INFINITY, f64::min),
        "max" => values.iter().copied().fold(f64::NEG_INFINITY, f64::max),
        "std" => numeric::std_dev(values),
        _ => numeric::mean(values),
    }
}
