//! Data quality auditing.
//!
//! `data_quality_report` scans the whole table for missing data, placeholder
//! values, logical inconsistencies, bad coordinates, and duplicates.
//! `compare_with_without_issues` quantifies how those problems move an
//! aggregate, overall and per group.

use flowlens_common::ToolError;
use flowlens_data::{ColumnData, DatasetSource, Table};
use serde_json::json;

use crate::args::ToolArgs;
use crate::patterns::{aggregate, group_values};
use crate::registry::ToolResult;

/// Placeholder values some upstream feeds use instead of null.
pub(crate) const SENTINELS: [f64; 3] = [999_999_999.0, 999_999.0, -999.0];

const NULL_PCT_THRESHOLD: f64 = 5.0;

struct Finding {
    severity: &'static str,
    category: &'static str,
    description: String,
}

/// Full-table quality scan.
pub fn data_quality_report(
    source: &dyn DatasetSource,
    _args: &ToolArgs,
) -> Result<ToolResult, ToolError> {
    let schema = source.schema().map_err(ToolError::from)?;
    let names: Vec<&str> = schema.columns.iter().map(|c| c.name.as_str()).collect();
    let table = source.materialize(&names)?;

    let mut findings: Vec<Finding> = Vec::new();

    // Missing data.
    for info in &schema.columns {
        if schema.row_count == 0 {
            break;
        }
        let pct = info.null_count as f64 / schema.row_count as f64 * 100.0;
        if pct > NULL_PCT_THRESHOLD {
            findings.push(Finding {
                severity: if pct > 25.0 { "issue" } else { "warning" },
                category: "missing_data",
                description: format!(
                    "'{}' is {pct:.1}% null ({} of {} rows)",
                    info.name, info.null_count, schema.row_count
                ),
            });
        }
    }

    // Sentinel placeholders in numeric columns.
    for name in &names {
        let Ok(series) = table.numeric(name) else {
            continue;
        };
        let mut hits = 0usize;
        for value in series.iter().flatten() {
            if SENTINELS.contains(value) {
                hits += 1;
            }
        }
        if hits > 0 {
            findings.push(Finding {
                severity: "issue",
                category: "sentinel_values",
                description: format!(
                    "'{name}' contains {hits} placeholder value(s) such as 999999999"
                ),
            });
        }
    }

    // Negative quantities.
    for name in &names {
        if !looks_like_quantity(name) {
            continue;
        }
        if let Ok(series) = table.numeric(name) {
            let negatives = series
                .iter()
                .flatten()
                .filter(|v| **v < 0.0 && !SENTINELS.contains(v))
                .count();
            if negatives > 0 {
                findings.push(Finding {
                    severity: "warning",
                    category: "logical_inconsistency",
                    description: format!("'{name}' has {negatives} negative value(s)"),
                });
            }
        }
    }

    // Flow above capacity.
    if let Some((qty_name, cap_name)) = capacity_pair(&names) {
        if let (Ok(qty), Ok(cap)) = (table.numeric(qty_name), table.numeric(cap_name)) {
            let over = qty
                .iter()
                .zip(&cap)
                .filter(|(q, c)| match (q, c) {
                    (Some(q), Some(c)) => q > c && !SENTINELS.contains(q),
                    _ => false,
                })
                .count();
            if over > 0 {
                findings.push(Finding {
                    severity: "issue",
                    category: "logical_inconsistency",
                    description: format!(
                        "{over} row(s) report '{qty_name}' above '{cap_name}'"
                    ),
                });
            }
        }
    }

    // Coordinate ranges.
    for (name, lo, hi) in coordinate_columns(&names) {
        if let Ok(series) = table.numeric(name) {
            let bad = series
                .iter()
                .flatten()
                .filter(|v| **v < lo || **v > hi)
                .count();
            if bad > 0 {
                findings.push(Finding {
                    severity: "issue",
                    category: "invalid_coordinates",
                    description: format!(
                        "'{name}' has {bad} value(s) outside [{lo}, {hi}]"
                    ),
                });
            }
        }
    }

    // Temporal coverage gaps.
    for name in &names {
        let Ok(stamps) = table.timestamps(name) else {
            continue;
        };
        let days: std::collections::BTreeSet<_> =
            stamps.iter().flatten().map(|ts| ts.date()).collect();
        if let (Some(first), Some(last)) = (days.iter().next(), days.iter().next_back()) {
            let span = (*last - *first).num_days() as usize + 1;
            if span > days.len() {
                findings.push(Finding {
                    severity: "warning",
                    category: "temporal_gaps",
                    description: format!(
                        "'{name}' covers {} of {span} day(s) between {first} and {last}",
                        days.len()
                    ),
                });
            }
        }
    }

    // Duplicates: exact full-row copies, and repeated non-numeric keys.
    let exact = duplicate_count(&table, &names);
    if exact > 0 {
        findings.push(Finding {
            severity: "warning",
            category: "duplicates",
            description: format!("{exact} exact duplicate row(s)"),
        });
    }
    let key_names: Vec<&str> = schema
        .columns
        .iter()
        .filter(|c| !c.kind.is_numeric())
        .map(|c| c.name.as_str())
        .collect();
    if !key_names.is_empty() && key_names.len() < names.len() {
        let key_dupes = duplicate_count(&table, &key_names);
        if key_dupes > exact {
            findings.push(Finding {
                severity: "warning",
                category: "duplicates",
                description: format!(
                    "{key_dupes} row(s) share a key ({}) with another row",
                    key_names.join(", ")
                ),
            });
        }
    }

    let issues = findings.iter().filter(|f| f.severity == "issue").count();
    let warnings = findings.len() - issues;
    let assessment = match (issues, warnings) {
        (0, 0) => "No quality problems detected; results can be used as-is.".to_string(),
        (0, _) => format!(
            "{warnings} warning(s); findings are usable but spot-check the flagged columns."
        ),
        _ => format!(
            "{issues} issue(s) and {warnings} warning(s); re-run key aggregates with \
             compare_with_without_issues before trusting conclusions."
        ),
    };

    let mut lines = vec![format!(
        "Data quality report for {} rows x {} columns:",
        schema.row_count, schema.column_count
    )];
    if findings.is_empty() {
        lines.push("  no problems found".to_string());
    }
    for finding in &findings {
        lines.push(format!(
            "  [{}] {}: {}",
            finding.severity, finding.category, finding.description
        ));
    }
    lines.push(assessment.clone());

    Ok(ToolResult {
        data: json!({
            "row_count": schema.row_count,
            "column_count": schema.column_count,
            "issue_count": issues,
            "warning_count": warnings,
            "findings": findings
                .iter()
                .map(|f| json!({
                    "severity": f.severity,
                    "category": f.category,
                    "description": f.description,
                }))
                .collect::<Vec<_>>(),
            "assessment": assessment,
        }),
        narrative: lines.join("\n"),
    })
}

fn looks_like_quantity(name: &str) -> bool {
    let lower = name.to_ascii_lowercase();
    lower.contains("quantity") || lower.contains("qty") || lower.contains("volume")
}

fn capacity_pair<'a>(names: &[&'a str]) -> Option<(&'a str, &'a str)> {
    let qty = names.iter().copied().find(|n| looks_like_quantity(n))?;
    let cap = names
        .iter()
        .copied()
        .find(|n| n.to_ascii_lowercase().contains("capacity"))?;
    Some((qty, cap))
}

fn coordinate_columns<'a>(names: &[&'a str]) -> Vec<(&'a str, f64, f64)> {
    let mut out = Vec::new();
    for name in names {
        let lower = name.to_ascii_lowercase();
        if lower.contains("latitude") || lower == "lat" {
            out.push((*name, -90.0, 90.0));
        } else if lower.contains("longitude") || lower == "lon" || lower == "lng" {
            out.push((*name, -180.0, 180.0));
        }
    }
    out
}

/// Rows whose rendering across `key_names` matches an earlier row.
fn duplicate_count(table: &Table, key_names: &[&str]) -> usize {
    let columns: Vec<Vec<Option<String>>> = key_names
        .iter()
        .filter_map(|name| table.labels(name).ok())
        .collect();
    if columns.is_empty() {
        return 0;
    }
    let mut seen = std::collections::HashSet::new();
    let mut dupes = 0usize;
    for i in 0..table.row_count {
        let key: Vec<Option<&String>> = columns.iter().map(|c| c[i].as_ref()).collect();
        let rendered = format!("{key:?}");
        if !seen.insert(rendered) {
            dupes += 1;
        }
    }
    dupes
}

/// Recompute an aggregate with and without quality-affected rows.
pub fn compare_with_without_issues(
    source: &dyn DatasetSource,
    args: &ToolArgs,
) -> Result<ToolResult, ToolError> {
    let metric_column = args.str("metric_column")?;
    let agg_func = args.str_or("agg_func", "sum");
    let group_column = args.opt_str("group_column");

    let mut wanted = vec![metric_column];
    if let Some(group) = group_column {
        wanted.push(group);
    }
    let table = source.materialize(&wanted)?;
    let metric = table.numeric(metric_column)?;

    let raw: Vec<f64> = metric
        .iter()
        .flatten()
        .copied()
        .filter(|v| v.is_finite())
        .collect();
    let clean: Vec<f64> = raw.iter().copied().filter(|v| is_clean(*v)).collect();
    if raw.is_empty() {
        return Err(ToolError::Execution(format!(
            "'{metric_column}' has no numeric values"
        )));
    }

    let with_issues = aggregate(agg_func, &raw);
    let without_issues = aggregate(agg_func, &clean);
    let delta_pct = if with_issues != 0.0 {
        (without_issues - with_issues) / with_issues.abs() * 100.0
    } else {
        0.0
    };
    let excluded = raw.len() - clean.len();

    let mut lines = vec![format!(
        "{agg_func}({metric_column}) with all rows: {with_issues:.2}; excluding \
         {excluded} affected row(s): {without_issues:.2} ({delta_pct:+.1}% change)."
    )];
    let mut data = json!({
        "metric_column": metric_column,
        "agg_func": agg_func,
        "with_issues": with_issues,
        "without_issues": without_issues,
        "delta_pct": delta_pct,
        "rows_excluded": excluded,
    });

    if let Some(group) = group_column {
        let labels = table.labels(group)?;
        let all_groups = group_values(&[labels.clone()], &metric);
        let clean_metric: Vec<Option<f64>> = metric
            .iter()
            .map(|v| (*v).filter(|x| is_clean(*x)))
            .collect();
        let clean_groups = group_values(&[labels], &clean_metric);

        let rank_with = ranking(&all_groups, agg_func);
        let rank_without = ranking(&clean_groups, agg_func);
        let moved: Vec<String> = rank_with
            .iter()
            .take(5)
            .enumerate()
            .filter_map(|(pos, name)| {
                let new_pos = rank_without.iter().position(|n| n == name);
                match new_pos {
                    Some(p) if p != pos => {
                        Some(format!("{name}: #{} -> #{}", pos + 1, p + 1))
                    }
                    None => Some(format!("{name}: #{} -> out of ranking", pos + 1)),
                    _ => None,
                }
            })
            .collect();

        if moved.is_empty() {
            lines.push(format!("Top-5 '{group}' ranking is unchanged."));
        } else {
            lines.push(format!(
                "Top-5 '{group}' ranking changes after cleaning: {}",
                moved.join("; ")
            ));
        }
        data["top5_with"] = json!(rank_with.iter().take(5).collect::<Vec<_>>());
        data["top5_without"] = json!(rank_without.iter().take(5).collect::<Vec<_>>());
        data["ranking_changes"] = json!(moved);
    }

    Ok(ToolResult {
        data,
        narrative: lines.join("\n"),
    })
}

/// A metric value unaffected by known quality problems.
fn is_clean(v: f64) -> bool {
    v.is_finite() && v >= 0.0 && !SENTINELS.contains(&v)
}

/// Group names ordered by descending aggregate.
fn ranking(
    groups: &std::collections::BTreeMap<String, Vec<f64>>,
    agg_func: &str,
) -> Vec<String> {
    let mut rows: Vec<(String, f64)> = groups
        .iter()
        .filter(|(_, values)| !values.is_empty())
        .map(|(name, values)| (name.clone(), aggregate(agg_func, values)))
        .collect();
    rows.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
    rows.into_iter().map(|(name, _)| name).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{args_for, issues_source, sample_source};

    #[test]
    fn report_flags_seeded_problems() {
        let source = issues_source();
        let args = args_for("data_quality_report", serde_json::json!({}));
        let result = data_quality_report(&source, &args).unwrap();

        let categories: Vec<&str> = result.data["findings"]
            .as_array()
            .unwrap()
            .iter()
            .map(|f| f["category"].as_str().unwrap())
            .collect();
        assert!(categories.contains(&"missing_data"));
        assert!(categories.contains(&"sentinel_values"));
        assert!(categories.contains(&"logical_inconsistency"));
        assert!(categories.contains(&"invalid_coordinates"));
        assert!(categories.contains(&"duplicates"));
        assert!(result.data["issue_count"].as_u64().unwrap() > 0);
        assert!(result.narrative.contains("compare_with_without_issues"));
    }

    #[test]
    fn clean_table_reports_no_issues() {
        let source = sample_source();
        let args = args_for("data_quality_report", serde_json::json!({}));
        let result = data_quality_report(&source, &args).unwrap();
        assert_eq!(result.data["issue_count"], 0);
    }

    #[test]
    fn sentinels_shift_the_sum() {
        let source = issues_source();
        let args = args_for(
            "compare_with_without_issues",
            serde_json::json!({"metric_column": "scheduled_quantity"}),
        );
        let result = compare_with_without_issues(&source, &args).unwrap();

        let with = result.data["with_issues"].as_f64().unwrap();
        let without = result.data["without_issues"].as_f64().unwrap();
        assert!(with > without);
        assert!(result.data["rows_excluded"].as_u64().unwrap() >= 5);
    }

    #[test]
    fn grouped_comparison_reports_ranking() {
        let source = issues_source();
        let args = args_for(
            "compare_with_without_issues",
            serde_json::json!({
                "metric_column": "scheduled_quantity",
                "group_column": "pipeline_name"
            }),
        );
        let result = compare_with_without_issues(&source, &args).unwrap();
        assert!(result.data["top5_with"].is_array());
        assert!(result.data["top5_without"].is_array());
    }

    #[test]
    fn clean_value_predicate() {
        assert!(is_clean(42.0));
        assert!(is_clean(0.0));
        assert!(!is_clean(-1.0));
        assert!(!is_clean(999_999_999.0));
        assert!(!is_clean(f64::NAN));
    }
}
