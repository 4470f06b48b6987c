//! Finding validation: confounder stratification and robustness checks.

use flowlens_common::ToolError;
use flowlens_data::DatasetSource;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde_json::json;

use crate::args::ToolArgs;
use crate::numeric;
use crate::registry::ToolResult;

/// Strata below this size are skipped as statistically meaningless.
const MIN_STRATUM: usize = 30;

/// Stratum-correlation spread above this marks the relationship unstable.
const STABILITY_RANGE: f64 = 0.2;

/// Test whether a claimed relationship survives stratification by each
/// candidate confounder.
pub fn check_confounders(
    source: &dyn DatasetSource,
    args: &ToolArgs,
) -> Result<ToolResult, ToolError> {
    let target = args.str("target_column")?;
    let feature = args.str("feature_column")?;
    let confounders = args.str_list("confounders")?;
    if confounders.is_empty() {
        return Err(ToolError::InvalidCall(
            "confounders must name at least one column".to_string(),
        ));
    }

    let mut wanted = vec![target, feature];
    wanted.extend(confounders.iter().map(String::as_str));
    let table = source.materialize(&wanted)?;
    let target_values = table.numeric(target)?;
    let feature_values = table.numeric(feature)?;

    let (tx, ty) = paired(&feature_values, &target_values);
    let overall = numeric::pearson(&tx, &ty).ok_or_else(|| {
        ToolError::Execution(format!(
            "correlation between '{feature}' and '{target}' is undefined"
        ))
    })?;

    let mut lines = vec![format!(
        "Overall correlation {feature} vs {target}: {overall:.3}. Stratified checks:"
    )];
    let mut reports = Vec::new();
    let mut any_unstable = false;

    for confounder in &confounders {
        let strata = stratify(&table, confounder)?;
        let mut stratum_rows = Vec::new();
        let mut corrs = Vec::new();

        for (label, indices) in &strata {
            if indices.len() <= MIN_STRATUM {
                continue;
            }
            let fx: Vec<Option<f64>> = indices.iter().map(|&i| feature_values[i]).collect();
            let fy: Vec<Option<f64>> = indices.iter().map(|&i| target_values[i]).collect();
            let (sx, sy) = paired(&fx, &fy);
            if let Some(r) = numeric::pearson(&sx, &sy) {
                corrs.push(r);
                stratum_rows.push(json!({
                    "stratum": label,
                    "n": indices.len(),
                    "r": r,
                }));
                lines.push(format!(
                    "  {confounder} = {label}: r = {r:.3} (n = {})",
                    indices.len()
                ));
            }
        }

        let verdict = if corrs.is_empty() {
            "inconclusive"
        } else {
            let min = corrs.iter().cloned().fold(f64::INFINITY, f64::min);
            let max = corrs.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
            let sign_flips = corrs.iter().any(|r| r.signum() != overall.signum());
            if max - min > STABILITY_RANGE || sign_flips {
                "unstable"
            } else {
                "stable"
            }
        };
        if verdict == "unstable" {
            any_unstable = true;
        }
        lines.push(format!("  -> {confounder}: {verdict}"));
        reports.push(json!({
            "confounder": confounder,
            "strata": stratum_rows,
            "verdict": verdict,
        }));
    }

    let summary = if any_unstable {
        "The relationship does not hold uniformly across strata; at least one \
         candidate is a likely confounder."
    } else {
        "The relationship is consistent across all examined strata."
    };
    lines.push(summary.to_string());

    Ok(ToolResult {
        data: json!({
            "target_column": target,
            "feature_column": feature,
            "overall_r": overall,
            "confounders": reports,
            "any_unstable": any_unstable,
        }),
        narrative: lines.join("\n"),
    })
}

/// Row indices per stratum. Numeric confounders are quartile-binned;
/// everything else stratifies by its rendered value.
fn stratify(
    table: &flowlens_data::Table,
    confounder: &str,
) -> Result<Vec<(String, Vec<usize>)>, ToolError> {
    if let Ok(values) = table.numeric(confounder) {
        let present: Vec<f64> = values
            .iter()
            .flatten()
            .copied()
            .filter(|v| v.is_finite())
            .collect();
        if present.is_empty() {
            return Err(ToolError::Execution(format!(
                "confounder '{confounder}' has no values"
            )));
        }
        let mut sorted = present;
        sorted.sort_by(|a, b| a.partial_cmp(b).unwrap());
        let cuts = [
            numeric::quantile(&sorted, 0.25),
            numeric::quantile(&sorted, 0.5),
            numeric::quantile(&sorted, 0.75),
        ];

        let mut bins: Vec<(String, Vec<usize>)> = (1..=4)
            .map(|q| (format!("Q{q}"), Vec::new()))
            .collect();
        for (i, value) in values.iter().enumerate() {
            if let Some(v) = (*value).filter(|v| v.is_finite()) {
                let bin = cuts.iter().filter(|c| v > **c).count();
                bins[bin].1.push(i);
            }
        }
        Ok(bins)
    } else {
        let labels = table.labels(confounder)?;
        let mut strata: std::collections::BTreeMap<String, Vec<usize>> =
            std::collections::BTreeMap::new();
        for (i, label) in labels.iter().enumerate() {
            if let Some(label) = label {
                strata.entry(label.clone()).or_default().push(i);
            }
        }
        Ok(strata.into_iter().collect())
    }
}

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

const BOOTSTRAP_ROUNDS: usize = 5;

/// Re-test a top-group finding under perturbations.
pub fn robustness_check(
    source: &dyn DatasetSource,
    args: &ToolArgs,
) -> Result<ToolResult, ToolError> {
    let metric_column = args.str("metric_column")?;
    let group_column = args.str("group_column")?;
    let time_column = args.opt_str("time_column");
    let seed = args.u64_or("seed", numeric::DEFAULT_SEED);

    let mut wanted = vec![group_column, metric_column];
    if let Some(time) = time_column {
        wanted.push(time);
    }
    let table = source.materialize(&wanted)?;
    let labels = table.labels(group_column)?;
    let metric = table.numeric(metric_column)?;

    // (group, value) pairs with both sides present.
    let rows: Vec<(usize, &str, f64)> = labels
        .iter()
        .zip(&metric)
        .enumerate()
        .filter_map(|(i, (label, value))| {
            match (label, value) {
                (Some(label), Some(value)) if value.is_finite() => {
                    Some((i, label.as_str(), *value))
                }
                _ => None,
            }
        })
        .collect();
    if rows.len() < 4 {
        return Err(ToolError::Execution(
            "too few rows for a robustness check".to_string(),
        ));
    }

    let baseline = top_group(rows.iter().map(|(_, g, v)| (*g, *v))).ok_or_else(|| {
        ToolError::Execution("no groups to rank".to_string())
    })?;

    let mut checks: Vec<(String, bool, String)> = Vec::new();

    // Temporal split at the median timestamp.
    if let Some(time) = time_column {
        let stamps = table.timestamps(time)?;
        let mut timed: Vec<&(usize, &str, f64)> = rows
            .iter()
            .filter(|(i, _, _)| stamps[*i].is_some())
            .collect();
        if timed.len() >= 4 {
            timed.sort_by_key(|(i, _, _)| stamps[*i]);
            let mid = timed.len() / 2;
            let early = top_group(timed[..mid].iter().map(|(_, g, v)| (*g, *v)));
            let late = top_group(timed[mid..].iter().map(|(_, g, v)| (*g, *v)));
            let passed = early.as_deref() == Some(baseline.as_str())
                && late.as_deref() == Some(baseline.as_str());
            checks.push((
                "temporal_split".to_string(),
                passed,
                format!(
                    "early half top: {}, late half top: {}",
                    early.as_deref().unwrap_or("n/a"),
                    late.as_deref().unwrap_or("n/a")
                ),
            ));
        }
    }

    // Seeded half-sample bootstrap.
    let mut retained = 0usize;
    for round in 0..BOOTSTRAP_ROUNDS {
        let mut rng = StdRng::seed_from_u64(seed.wrapping_add(round as u64));
        let mut indices: Vec<usize> = (0..rows.len()).collect();
        indices.shuffle(&mut rng);
        indices.truncate(rows.len() / 2);
        let top = top_group(indices.iter().map(|&i| (rows[i].1, rows[i].2)));
        if top.as_deref() == Some(baseline.as_str()) {
            retained += 1;
        }
    }
    checks.push((
        "bootstrap".to_string(),
        retained * 5 >= BOOTSTRAP_ROUNDS * 4,
        format!("top group retained in {retained}/{BOOTSTRAP_ROUNDS} half-samples"),
    ));

    // 5-95% trim.
    let mut sorted: Vec<f64> = rows.iter().map(|(_, _, v)| *v).collect();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap());
    let lo = numeric::quantile(&sorted, 0.05);
    let hi = numeric::quantile(&sorted, 0.95);
    let trimmed_top = top_group(
        rows.iter()
            .filter(|(_, _, v)| *v >= lo && *v <= hi)
            .map(|(_, g, v)| (*g, *v)),
    );
    checks.push((
        "outlier_trim".to_string(),
        trimmed_top.as_deref() == Some(baseline.as_str()),
        format!(
            "top group after 5-95% trim: {}",
            trimmed_top.as_deref().unwrap_or("n/a")
        ),
    ));

    let passed = checks.iter().filter(|(_, ok, _)| *ok).count();
    let verdict = if passed == checks.len() {
        "robust"
    } else if passed * 2 >= checks.len() {
        "moderate"
    } else {
        "fragile"
    };

    let mut lines = vec![format!(
        "Robustness of top '{group_column}' by {metric_column} (baseline: {baseline}):"
    )];
    for (name, ok, detail) in &checks {
        lines.push(format!(
            "  {name}: {} ({detail})",
            if *ok { "passed" } else { "failed" }
        ));
    }
    lines.push(format!(
        "{passed}/{} checks passed; the finding is {verdict}.",
        checks.len()
    ));

    Ok(ToolResult {
        data: json!({
            "metric_column": metric_column,
            "group_column": group_column,
            "baseline_top": baseline,
            "seed": seed,
            "checks": checks
                .iter()
                .map(|(name, ok, detail)| json!({
                    "check": name,
                    "passed": ok,
                    "detail": detail,
                }))
                .collect::<Vec<_>>(),
            "checks_passed": passed,
            "checks_total": checks.len(),
            "verdict": verdict,
        }),
        narrative: lines.join("\n"),
    })
}

/// Group with the largest summed metric.
fn top_group<'a>(pairs: impl Iterator<Item = (&'a str, f64)>) -> Option<String> {
    let mut totals: std::collections::BTreeMap<&str, f64> = std::collections::BTreeMap::new();
    for (group, value) in pairs {
        *totals.entry(group).or_default() += value;
    }
    totals
        .into_iter()
        .max_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal))
        .map(|(group, _)| group.to_string())
}
