//! Time-series aggregation and trend analysis.

use chrono::{Datelike, NaiveDateTime};
use flowlens_common::ToolError;
use flowlens_data::DatasetSource;
use serde_json::json;

use crate::args::ToolArgs;
use crate::numeric;
use crate::registry::ToolResult;

/// Sum a metric per time bucket and report the trend over the buckets.
pub fn analyze_time_series(
    source: &dyn DatasetSource,
    args: &ToolArgs,
) -> Result<ToolResult, ToolError> {
    let date_column = args.str("date_column")?;
    let value_column = args.str("value_column")?;
    let granularity = args.str_or("granularity", "month");

    let table = source.materialize(&[date_column, value_column])?;
    let dates = table.timestamps(date_column)?;
    let values = table.numeric(value_column)?;

    // Bucket rows where both the timestamp and the metric are present.
    let mut buckets: std::collections::BTreeMap<String, f64> = std::collections::BTreeMap::new();
    let mut used = 0usize;
    for (ts, value) in dates.iter().zip(&values) {
        if let (Some(ts), Some(value)) = (ts, value) {
            if value.is_finite() {
                *buckets.entry(bucket_key(ts, granularity)).or_default() += value;
                used += 1;
            }
        }
    }
    if buckets.len() < 2 {
        return Err(ToolError::Execution(format!(
            "need at least two {granularity} periods with data, found {}",
            buckets.len()
        )));
    }

    let periods: Vec<&String> = buckets.keys().collect();
    let totals: Vec<f64> = buckets.values().copied().collect();
    let slope = numeric::linear_slope(&totals);
    let first = totals[0];
    let last = totals[totals.len() - 1];
    let pct_change = if first != 0.0 {
        Some((last - first) / first.abs() * 100.0)
    } else {
        None
    };
    let direction = if slope > 0.0 {
        "increasing"
    } else if slope < 0.0 {
        "decreasing"
    } else {
        "flat"
    };

    let change_text = match pct_change {
        Some(pct) => format!("{pct:+.1}% from first to last period"),
        None => "change undefined (first period total is zero)".to_string(),
    };
    let narrative = format!(
        "'{value_column}' by {granularity} over {} periods ({} rows): trend is \
         {direction} (slope {slope:.4} per period), {change_text}. First period \
         {} = {first:.2}, last period {} = {last:.2}.",
        periods.len(),
        used,
        periods[0],
        periods[periods.len() - 1],
    );

    Ok(ToolResult {
        data: json!({
            "date_column": date_column,
            "value_column": value_column,
            "granularity": granularity,
            "periods": buckets
                .iter()
                .map(|(k, v)| json!({ "period": k, "total": v }))
                .collect::<Vec<_>>(),
            "slope": slope,
            "direction": direction,
            "pct_change": pct_change,
        }),
        narrative,
    })
}

fn bucket_key(ts: &NaiveDateTime, granularity: &str) -> String {
    let date = ts.date();
    match granularity {
        "day" => date.to_string(),
        "week" => {
            let week = date.iso_week();
            format!("{}-W{:02}", week.year(), week.week())
        }
        "quarter" => format!("{}-Q{}", date.year(), (date.month0() / 3) + 1),
        "year" => date.year().to_string(),
        _ => format!("{}-{:02}", date.year(), date.month()),
    }
}
