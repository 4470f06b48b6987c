//! Outlier detection over a single numeric column.

use flowlens_common::ToolError;
use flowlens_data::DatasetSource;
use serde_json::json;

use crate::args::ToolArgs;
use crate::numeric;
use crate::registry::ToolResult;

const SAMPLE_SHOWN: usize = 10;

/// Flag values outside IQR fences or beyond a z-score threshold.
pub fn detect_outliers(
    source: &dyn DatasetSource,
    args: &ToolArgs,
) -> Result<ToolResult, ToolError> {
    let column = args.str("column")?;
    let method = args.str_or("method", "iqr");

    let table = source.materialize(&[column])?;
    let series = table.numeric(column)?;

    // Keep original row indices so flagged rows can be located again.
    let present: Vec<(usize, f64)> = series
        .iter()
        .enumerate()
        .filter_map(|(i, v)| (*v).filter(|x| x.is_finite()).map(|x| (i, x)))
        .collect();
    if present.len() < 4 {
        return Err(ToolError::Execution(format!(
            "column '{column}' has too few values for outlier detection"
        )));
    }
    let values: Vec<f64> = present.iter().map(|(_, v)| *v).collect();

    let (lower, upper, factor) = match method {
        "zscore" => {
            let factor = args.f64_or("factor", 3.0);
            let m = numeric::mean(&values);
            let s = numeric::std_dev(&values);
            if !s.is_finite() || s == 0.0 {
                return Err(ToolError::Execution(format!(
                    "column '{column}' has zero variance"
                )));
            }
            (m - factor * s, m + factor * s, factor)
        }
        _ => {
            let factor = args.f64_or("factor", 1.5);
            let mut sorted = values.clone();
            sorted.sort_by(|a, b| a.partial_cmp(b).unwrap());
            let q1 = numeric::quantile(&sorted, 0.25);
            let q3 = numeric::quantile(&sorted, 0.75);
            let iqr = q3 - q1;
            (q1 - factor * iqr, q3 + factor * iqr, factor)
        }
    };

    let flagged: Vec<&(usize, f64)> = present
        .iter()
        .filter(|(_, v)| *v < lower || *v > upper)
        .collect();
    let pct = flagged.len() as f64 / present.len() as f64 * 100.0;

    let mut sample: Vec<f64> = flagged.iter().map(|(_, v)| *v).collect();
    sample.sort_by(|a, b| b.abs().partial_cmp(&a.abs()).unwrap());
    sample.truncate(SAMPLE_SHOWN);

    let narrative = format!(
        "Outliers in '{column}' ({method}, factor {factor}): {} of {} values \
         ({pct:.2}%) outside [{lower:.4}, {upper:.4}].{}",
        flagged.len(),
        present.len(),
        if sample.is_empty() {
            String::new()
        } else {
            format!(
                " Extreme values: {}",
                sample
                    .iter()
                    .map(|v| format!("{v:.4}"))
                    .collect::<Vec<_>>()
                    .join(", ")
            )
        }
    );

    Ok(ToolResult {
        data: json!({
            "column": column,
            "method": method,
            "factor": factor,
            "lower_bound": lower,
            "upper_bound": upper,
            "total_values": present.len(),
            "outlier_count": flagged.len(),
            "outlier_pct": pct,
            "row_indices": flagged.iter().map(|(i, _)| i).take(100).collect::<Vec<_>>(),
            "sample_values": sample,
        }),
        narrative,
    })
}
