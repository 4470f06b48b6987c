//! Tool specifications consumed by the reasoning oracle.
//!
//! Each spec carries the JSON parameter schema the orchestrator validates
//! arguments against, plus the description the oracle uses to decide
//! applicability. The catalog is registered once at startup and is
//! read-only thereafter.

use serde::{Deserialize, Serialize};

use crate::registry::{ToolKind, ToolRegistry};

/// A named, schema-described analytical operation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolSpec {
    pub name: String,
    pub description: String,
    pub parameters: serde_json::Value,
}

/// Build the full built-in tool catalog.
pub fn builtin_registry() -> ToolRegistry {
    let mut registry = ToolRegistry::new();

    registry.register(
        ToolSpec {
            name: "column_stats".to_string(),
            description: "Get detailed statistics for a specific column: nulls, unique \
                          values, and distribution."
                .to_string(),
            parameters: serde_json::json!({
                "type": "object",
                "properties": {
                    "column": {
                        "type": "string",
                        "description": "Name of the column to analyze"
                    }
                },
                "required": ["column"]
            }),
        },
        ToolKind::ColumnStats,
    );

    registry.register(
        ToolSpec {
            name: "find_correlations".to_string(),
            description: "Find correlations between numeric columns, sorted by absolute \
                          value. Flags strongly correlated pairs."
                .to_string(),
            parameters: serde_json::json!({
                "type": "object",
                "properties": {
                    "columns": {
                        "type": "array",
                        "items": { "type": "string" },
                        "description": "Columns to correlate; all numeric columns when omitted"
                    },
                    "method": {
                        "type": "string",
                        "enum": ["pearson", "spearman"],
                        "description": "Correlation method (default pearson)"
                    },
                    "threshold": {
                        "type": "number",
                        "description": "Magnitude above which a pair is flagged as strong (default 0.7)"
                    }
                },
                "required": []
            }),
        },
        ToolKind::FindCorrelations,
    );

    registry.register(
        ToolSpec {
            name: "detect_outliers".to_string(),
            description: "Detect outliers in a numeric column using the IQR rule or \
                          z-scores. Reports flagged rows, bounds, and counts."
                .to_string(),
            parameters: serde_json::json!({
                "type": "object",
                "properties": {
                    "column": {
                        "type": "string",
                        "description": "Numeric column to analyze"
                    },
                    "method": {
                        "type": "string",
                        "enum": ["iqr", "zscore"],
                        "description": "Detection method (default iqr)"
                    },
                    "factor": {
                        "type": "number",
                        "description": "IQR multiplier (default 1.5) or z-score threshold (default 3)"
                    }
                },
                "required": ["column"]
            }),
        },
        ToolKind::DetectOutliers,
    );

    registry.register(
        ToolSpec {
            name: "analyze_time_series".to_string(),
            description: "Aggregate a metric over a time column at a chosen granularity \
                          and report the trend direction and overall change."
                .to_string(),
            parameters: serde_json::json!({
                "type": "object",
                "properties": {
                    "date_column": {
                        "type": "string",
                        "description": "Date/timestamp column"
                    },
                    "value_column": {
                        "type": "string",
                        "description": "Numeric column to analyze"
                    },
                    "granularity": {
                        "type": "string",
                        "enum": ["day", "week", "month", "quarter", "year"],
                        "description": "Resampling granularity (default month)"
                    }
                },
                "required": ["date_column", "value_column"]
            }),
        },
        ToolKind::AnalyzeTimeSeries,
    );

    registry.register(
        ToolSpec {
            name: "find_patterns".to_string(),
            description: "Group and aggregate data to surface patterns; returns the top \
                          groups by the aggregated value."
                .to_string(),
            parameters: serde_json::json!({
                "type": "object",
                "properties": {
                    "group_by": {
                        "type": "array",
                        "items": { "type": "string" },
                        "description": "Columns to group by"
                    },
                    "agg_column": {
                        "type": "string",
                        "description": "Column to aggregate"
                    },
                    "agg_func": {
                        "type": "string",
                        "enum": ["mean", "sum", "count", "min", "max", "std"],
                        "description": "Aggregation function (default mean)"
                    },
                    "top_n": {
                        "type": "integer",
                        "description": "Number of top groups to return (default 20)"
                    }
                },
                "required": ["group_by", "agg_column"]
            }),
        },
        ToolKind::FindPatterns,
    );

    registry.register(
        ToolSpec {
            name: "cluster_analysis".to_string(),
            description: "Find non-obvious segments with k-means over standardized \
                          numeric features. Fixed seed for reproducibility; k chosen by \
                          an inertia elbow when not supplied."
                .to_string(),
            parameters: serde_json::json!({
                "type": "object",
                "properties": {
                    "columns": {
                        "type": "array",
                        "items": { "type": "string" },
                        "description": "Numeric feature columns"
                    },
                    "n_clusters": {
                        "type": "integer",
                        "description": "Number of clusters; chosen automatically when omitted"
                    },
                    "sample_size": {
                        "type": "integer",
                        "description": "Row sample cap for performance (default 50000)"
                    },
                    "seed": {
                        "type": "integer",
                        "description": "Random seed (default 42)"
                    }
                },
                "required": ["columns"]
            }),
        },
        ToolKind::ClusterAnalysis,
    );

    registry.register(
        ToolSpec {
            name: "find_segments".to_string(),
            description: "Rank entities by a metric and bucket them into labeled \
                          quantile segments with a concentration summary."
                .to_string(),
            parameters: serde_json::json!({
                "type": "object",
                "properties": {
                    "group_column": {
                        "type": "string",
                        "description": "Entity column to segment (e.g. pipeline_name)"
                    },
                    "metric_column": {
                        "type": "string",
                        "description": "Numeric column to segment on"
                    },
                    "n_segments": {
                        "type": "integer",
                        "description": "Number of segments (default 4)"
                    }
                },
                "required": ["group_column", "metric_column"]
            }),
        },
        ToolKind::FindSegments,
    );

    registry.register(
        ToolSpec {
            name: "data_quality_report".to_string(),
            description: "Comprehensive data quality report: missing data, placeholder \
                          values, logical inconsistencies, duplicates, and an overall \
                          impact assessment."
                .to_string(),
            parameters: serde_json::json!({
                "type": "object",
                "properties": {},
                "required": []
            }),
        },
        ToolKind::DataQualityReport,
    );

    registry.register(
        ToolSpec {
            name: "compare_with_without_issues".to_string(),
            description: "Recompute a statistic with and without rows affected by data \
                          quality issues to show their impact on conclusions."
                .to_string(),
            parameters: serde_json::json!({
                "type": "object",
                "properties": {
                    "metric_column": {
                        "type": "string",
                        "description": "Column to analyze"
                    },
                    "group_column": {
                        "type": "string",
                        "description": "Optional column to group by"
                    },
                    "agg_func": {
                        "type": "string",
                        "enum": ["sum", "mean", "count"],
                        "description": "Aggregation function (default sum)"
                    }
                },
                "required": ["metric_column"]
            }),
        },
        ToolKind::CompareWithWithoutIssues,
    );

    registry.register(
        ToolSpec {
            name: "check_confounders".to_string(),
            description: "Check whether a relationship between two numeric columns holds \
                          within each stratum of candidate confounder columns."
                .to_string(),
            parameters: serde_json::json!({
                "type": "object",
                "properties": {
                    "target_column": {
                        "type": "string",
                        "description": "Outcome/dependent variable"
                    },
                    "feature_column": {
                        "type": "string",
                        "description": "Predictor/independent variable"
                    },
                    "confounders": {
                        "type": "array",
                        "items": { "type": "string" },
                        "description": "Candidate confounder columns"
                    }
                },
                "required": ["target_column", "feature_column", "confounders"]
            }),
        },
        ToolKind::CheckConfounders,
    );

    registry.register(
        ToolSpec {
            name: "robustness_check".to_string(),
            description: "Re-evaluate a top-groups finding under perturbations \
                          (temporal split, half-sample bootstrap, outlier trim) and \
                          report how many checks it survives."
                .to_string(),
            parameters: serde_json::json!({
                "type": "object",
                "properties": {
                    "metric_column": {
                        "type": "string",
                        "description": "Metric being analyzed"
                    },
                    "group_column": {
                        "type": "string",
                        "description": "Grouping variable"
                    },
                    "time_column": {
                        "type": "string",
                        "description": "Timestamp column for the temporal split (optional)"
                    },
                    "seed": {
                        "type": "integer",
                        "description": "Random seed for the bootstrap (default 42)"
                    }
                },
                "required": ["metric_column", "group_column"]
            }),
        },
        ToolKind::RobustnessCheck,
    );

    registry.register(
        ToolSpec {
            name: "execute_query".to_string(),
            description: "Execute a SQL SELECT against the dataset and return a bounded \
                          result table. Only reads are allowed."
                .to_string(),
            parameters: serde_json::json!({
                "type": "object",
                "properties": {
                    "sql": {
                        "type": "string",
                        "description": "SQL SELECT query; the dataset table name is given in the schema summary"
                    }
                },
                "required": ["sql"]
            }),
        },
        ToolKind::ExecuteQuery,
    );

    registry
}
