//! Segment discovery: k-means clustering and quantile segmentation.

use flowlens_common::ToolError;
use flowlens_data::DatasetSource;
use serde_json::json;

use crate::args::ToolArgs;
use crate::numeric;
use crate::patterns::group_values;
use crate::registry::ToolResult;

const DEFAULT_SAMPLE_SIZE: usize = 50_000;

/// Standardize numeric features and cluster rows with seeded k-means.
pub fn cluster_analysis(
    source: &dyn DatasetSource,
    args: &ToolArgs,
) -> Result<ToolResult, ToolError> {
    let columns = args.str_list("columns")?;
    if columns.len() < 2 {
        return Err(ToolError::InvalidCall(
            "clustering needs at least two feature columns".to_string(),
        ));
    }
    let sample_size = args.usize_or("sample_size", DEFAULT_SAMPLE_SIZE);
    let seed = args.u64_or("seed", numeric::DEFAULT_SEED);

    let refs: Vec<&str> = columns.iter().map(String::as_str).collect();
    let table = source.materialize(&refs)?;
    let series: Vec<Vec<Option<f64>>> = columns
        .iter()
        .map(|name| table.numeric(name))
        .collect::<Result<_, _>>()?;

    // Complete cases only.
    let mut rows: Vec<Vec<f64>> = Vec::new();
    'rows: for i in 0..table.row_count {
        let mut row = Vec::with_capacity(series.len());
        for column in &series {
            match column[i] {
                Some(v) if v.is_finite() => row.push(v),
                _ => continue 'rows,
            }
        }
        rows.push(row);
    }
    if rows.len() < 10 {
        return Err(ToolError::Execution(format!(
            "only {} complete rows across the requested features",
            rows.len()
        )));
    }

    let sampled = if rows.len() > sample_size {
        numeric::sample_indices(rows.len(), sample_size, seed)
            .into_iter()
            .map(|i| rows[i].clone())
            .collect()
    } else {
        rows
    };

    let scaled = numeric::standardize(&sampled);
    let k = match args.opt_usize("n_clusters") {
        Some(k) if k >= 2 => k,
        Some(_) => {
            return Err(ToolError::InvalidCall(
                "n_clusters must be at least 2".to_string(),
            ))
        }
        None => numeric::elbow_k(&scaled, seed),
    };
    let fit = numeric::kmeans(&scaled, k, seed);

    // Cluster profiles in original units.
    let overall: Vec<f64> = (0..columns.len())
        .map(|d| numeric::mean(&sampled.iter().map(|r| r[d]).collect::<Vec<_>>()))
        .collect();
    let mut profiles = Vec::with_capacity(k);
    let mut lines = vec![format!(
        "K-means over {} rows x {} features, k = {k} (seed {seed}):",
        sampled.len(),
        columns.len()
    )];
    for c in 0..k {
        let members: Vec<&Vec<f64>> = sampled
            .iter()
            .zip(&fit.assignments)
            .filter(|(_, &a)| a == c)
            .map(|(r, _)| r)
            .collect();
        let pct = members.len() as f64 / sampled.len() as f64 * 100.0;
        let centroid: Vec<f64> = (0..columns.len())
            .map(|d| numeric::mean(&members.iter().map(|r| r[d]).collect::<Vec<_>>()))
            .collect();

        let mut traits = Vec::new();
        for (d, name) in columns.iter().enumerate() {
            if overall[d] != 0.0 {
                let ratio = centroid[d] / overall[d];
                if ratio > 1.5 {
                    traits.push(format!("high {name}"));
                } else if ratio < 0.5 {
                    traits.push(format!("low {name}"));
                }
            }
        }
        lines.push(format!(
            "  cluster {c}: {} rows ({pct:.1}%){}",
            members.len(),
            if traits.is_empty() {
                String::new()
            } else {
                format!(", {}", traits.join(", "))
            }
        ));
        profiles.push(json!({
            "cluster": c,
            "size": members.len(),
            "pct": pct,
            "centroid": columns
                .iter()
                .zip(&centroid)
                .map(|(name, v)| json!({ "column": name, "mean": v }))
                .collect::<Vec<_>>(),
        }));
    }
    lines.push(format!("  inertia: {:.4}", fit.inertia));

    Ok(ToolResult {
        data: json!({
            "columns": columns,
            "k": k,
            "seed": seed,
            "rows_used": sampled.len(),
            "inertia": fit.inertia,
            "clusters": profiles,
            "overall_means": overall,
        }),
        narrative: lines.join("\n"),
    })
}

/// Bucket entities into quantile bands by an aggregated metric.
pub fn find_segments(source: &dyn DatasetSource, args: &ToolArgs) -> Result<ToolResult, ToolError> {
    let group_column = args.str("group_column")?;
    let metric_column = args.str("metric_column")?;
    let n_segments = args.usize_or("n_segments", 4).max(2);

    let table = source.materialize(&[group_column, metric_column])?;
    let labels = table.labels(group_column)?;
    let metric = table.numeric(metric_column)?;

    let groups = group_values(&[labels], &metric);
    if groups.len() < n_segments {
        return Err(ToolError::Execution(format!(
            "only {} entities, cannot form {n_segments} segments",
            groups.len()
        )));
    }

    // Entities ranked ascending by total so buckets are equal-count bands.
    let mut entities: Vec<(String, f64)> = groups
        .into_iter()
        .map(|(name, values)| (name, values.iter().sum()))
        .collect();
    entities.sort_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal));
    let grand_total: f64 = entities.iter().map(|(_, t)| t).sum();

    let mut segments: Vec<(String, Vec<&(String, f64)>)> = (0..n_segments)
        .map(|s| (segment_label(s, n_segments), Vec::new()))
        .collect();
    for (i, entity) in entities.iter().enumerate() {
        let s = (i * n_segments / entities.len()).min(n_segments - 1);
        segments[s].1.push(entity);
    }

    let mut lines = vec![format!(
        "{} entities from '{group_column}' segmented by total {metric_column}:",
        entities.len()
    )];
    let mut out = Vec::with_capacity(n_segments);
    let mut top_share = 0.0;
    for (rank, (label, members)) in segments.iter().rev().enumerate() {
        let total: f64 = members.iter().map(|(_, t)| t).sum();
        let share = if grand_total != 0.0 {
            total / grand_total * 100.0
        } else {
            0.0
        };
        if rank == 0 {
            top_share = share;
        }
        let leaders: Vec<&str> = members
            .iter()
            .rev()
            .take(3)
            .map(|(name, _)| name.as_str())
            .collect();
        lines.push(format!(
            "  {label}: {} entities, total {total:.2} ({share:.1}% of all), \
             e.g. {}",
            members.len(),
            leaders.join(", ")
        ));
        out.push(json!({
            "label": label,
            "entity_count": members.len(),
            "total": total,
            "share_pct": share,
            "entities": members
                .iter()
                .rev()
                .map(|(name, total)| json!({ "entity": name, "total": total }))
                .collect::<Vec<_>>(),
        }));
    }
    let insight = format!(
        "The top segment holds {top_share:.1}% of all {metric_column}."
    );
    lines.push(insight.clone());

    Ok(ToolResult {
        data: json!({
            "group_column": group_column,
            "metric_column": metric_column,
            "n_segments": n_segments,
            "entity_count": entities.len(),
            "segments": out,
            "concentration": insight,
        }),
        narrative: lines.join("\n"),
    })
}

fn segment_label(segment: usize, n: usize) -> String {
    let lo = segment * 100 / n;
    let hi = (segment + 1) * 100 / n;
    if segment == 0 {
        format!("Bottom {hi}%")
    } else if segment == n - 1 {
        format!("Top {}%", 100 - lo)
    } else {
        format!("{lo}-{hi}%")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{args_for, source_from};
    use flowlens_data::{Column, ColumnData};

    fn two_blob_source() -> flowlens_data::MemorySource {
        let mut x = Vec::new();
        let mut y = Vec::new();
        for i in 0..20 {
            let (cx, cy) = if i % 2 == 0 { (0.0, 0.0) } else { (100.0, 50.0) };
            x.push(Some(cx + (i as f64) * 0.01));
            y.push(Some(cy + (i as f64) * 0.02));
        }
        source_from(vec![
            Column {
                name: "x".into(),
                data: ColumnData::Float(x),
            },
            Column {
                name: "y".into(),
                data: ColumnData::Float(y),
            },
        ])
    }

    #[test]
    fn clustering_is_deterministic_for_a_seed() {
        let source = two_blob_source();
        let args = args_for(
            "cluster_analysis",
            serde_json::json!({"columns": ["x", "y"], "n_clusters": 2}),
        );
        let a = cluster_analysis(&source, &args).unwrap();
        let b = cluster_analysis(&source, &args).unwrap();
        assert_eq!(a.data, b.data);
        assert_eq!(a.data["k"], 2);
        assert_eq!(a.data["seed"], numeric::DEFAULT_SEED);
    }

    #[test]
    fn clusters_split_the_blobs_evenly() {
        let source = two_blob_source();
        let args = args_for(
            "cluster_analysis",
            serde_json::json!({"columns": ["x", "y"], "n_clusters": 2}),
        );
        let result = cluster_analysis(&source, &args).unwrap();
        assert_eq!(result.data["clusters"][0]["size"], 10);
        assert_eq!(result.data["clusters"][1]["size"], 10);
    }

    #[test]
    fn one_feature_column_is_invalid() {
        let source = two_blob_source();
        let args = args_for("cluster_analysis", serde_json::json!({"columns": ["x"]}));
        assert!(matches!(
            cluster_analysis(&source, &args),
            Err(ToolError::InvalidCall(_))
        ));
    }

    fn entity_source() -> flowlens_data::MemorySource {
        // Eight entities with totals 1..=8, plus a dominant ninth.
        let mut names = Vec::new();
        let mut totals = Vec::new();
        for i in 1..=8 {
            names.push(Some(format!("P{i}")));
            totals.push(Some(i as f64));
        }
        names.push(Some("Goliath".to_string()));
        totals.push(Some(1000.0));
        source_from(vec![
            Column {
                name: "pipeline_name".into(),
                data: ColumnData::Text(names),
            },
            Column {
                name: "qty".into(),
                data: ColumnData::Float(totals),
            },
        ])
    }

    #[test]
    fn segments_are_labeled_quantile_bands() {
        let source = entity_source();
        let args = args_for(
            "find_segments",
            serde_json::json!({"group_column": "pipeline_name", "metric_column": "qty"}),
        );
        let result = find_segments(&source, &args).unwrap();

        let labels: Vec<&str> = result.data["segments"]
            .as_array()
            .unwrap()
            .iter()
            .map(|s| s["label"].as_str().unwrap())
            .collect();
        assert_eq!(labels, vec!["Top 25%", "50-75%", "25-50%", "Bottom 25%"]);

        // Goliath dominates, so the top band concentrates the metric.
        let top_share = result.data["segments"][0]["share_pct"].as_f64().unwrap();
        assert!(top_share > 90.0);
        assert_eq!(
            result.data["segments"][0]["entities"][0]["entity"],
            "Goliath"
        );
    }

    #[test]
    fn too_few_entities_is_an_error() {
        let source = source_from(vec![
            Column {
                name: "pipeline_name".into(),
                data: ColumnData::Text(vec![Some("A".into()), Some("B".into())]),
            },
            Column {
                name: "qty".into(),
                data: ColumnData::Float(vec![Some(1.0), Some(2.0)]),
            },
        ]);
        let args = args_for(
            "find_segments",
            serde_json::json!({"group_column": "pipeline_name", "metric_column": "qty"}),
        );
        assert!(find_segments(&source, &args).is_err());
    }
}
