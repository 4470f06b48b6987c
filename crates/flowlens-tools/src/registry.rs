//! Tool registry and dispatch.
//!
//! Tools form a closed set of tagged variants dispatched by name through a
//! static registration table; there is no runtime reflection. `invoke`
//! validates arguments first, then runs the tool against the dataset
//! source, timing the call and capturing success or failure.

use std::time::{Duration, Instant};

use flowlens_common::ToolError;
use flowlens_data::DatasetSource;
use tracing::debug;

use crate::args::ToolArgs;
use crate::catalog::ToolSpec;

/// The closed set of analysis tools.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToolKind {
    ColumnStats,
    FindCorrelations,
    DetectOutliers,
    AnalyzeTimeSeries,
    FindPatterns,
    ClusterAnalysis,
    FindSegments,
    DataQualityReport,
    CompareWithWithoutIssues,
    CheckConfounders,
    RobustnessCheck,
    ExecuteQuery,
}

/// Successful tool output: a machine-usable payload plus the narrative the
/// orchestrator can use directly as a reply.
#[derive(Debug, Clone)]
pub struct ToolResult {
    pub data: serde_json::Value,
    pub narrative: String,
}

/// One completed tool dispatch, success or failure, with its duration.
#[derive(Debug)]
pub struct ToolInvocation {
    pub name: String,
    pub elapsed: Duration,
    pub result: Result<ToolResult, ToolError>,
}

impl ToolInvocation {
    pub fn succeeded(&self) -> bool {
        self.result.is_ok()
    }

    /// The text fed back to the oracle as an observation.
    pub fn observation(&self) -> String {
        match &self.result {
            Ok(result) => result.narrative.clone(),
            Err(err) => format!("Error: {err}"),
        }
    }
}

/// Catalog of registered tools. Built once at startup, read-only after.
#[derive(Default)]
pub struct ToolRegistry {
    entries: Vec<(ToolSpec, ToolKind)>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, spec: ToolSpec, kind: ToolKind) {
        self.entries.push((spec, kind));
    }

    pub fn specs(&self) -> Vec<&ToolSpec> {
        self.entries.iter().map(|(spec, _)| spec).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Dispatch a tool by name. Unknown names and invalid arguments come
    /// back as failed invocations, never as panics or turn aborts.
    pub fn invoke(
        &self,
        name: &str,
        raw_args: &serde_json::Value,
        source: &dyn DatasetSource,
    ) -> ToolInvocation {
        let start = Instant::now();
        let result = self.dispatch(name, raw_args, source);
        let elapsed = start.elapsed();

        debug!(
            tool = name,
            ok = result.is_ok(),
            elapsed_ms = elapsed.as_millis() as u64,
            "tool invocation"
        );

        ToolInvocation {
            name: name.to_string(),
            elapsed,
            result,
        }
    }

    fn dispatch(
        &self,
        name: &str,
        raw_args: &serde_json::Value,
        source: &dyn DatasetSource,
    ) -> Result<ToolResult, ToolError> {
        let (spec, kind) = self
            .entries
            .iter()
            .find(|(spec, _)| spec.name == name)
            .ok_or_else(|| ToolError::InvalidCall(format!("unknown tool '{name}'")))?;

        let args = ToolArgs::validate(spec, raw_args)?;

        match kind {
            ToolKind::ColumnStats => crate::stats::column_stats(source, &args),
            ToolKind::FindCorrelations => crate::stats::find_correlations(source, &args),
            ToolKind::DetectOutliers => crate::outliers::detect_outliers(source, &args),
            ToolKind::AnalyzeTimeSeries => crate::timeseries::analyze_time_series(source, &args),
            ToolKind::FindPatterns => crate::patterns::find_patterns(source, &args),
            ToolKind::ClusterAnalysis => crate::clustering::cluster_analysis(source, &args),
            ToolKind::FindSegments => crate::clustering::find_segments(source, &args),
            ToolKind::DataQualityReport => crate::quality::data_quality_report(source, &args),
            ToolKind::CompareWithWithoutIssues => {
                crate::quality::compare_with_without_issues(source, &args)
            }
            ToolKind::CheckConfounders => crate::validation::check_confounders(source, &args),
            ToolKind::RobustnessCheck => crate::validation::robustness_check(source, &args),
            ToolKind::ExecuteQuery => crate::query_tool::execute_query(source, &args),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::builtin_registry;
    use crate::testutil::sample_source;

    #[test]
    fn unknown_tool_is_invalid_call() {
        let registry = builtin_registry();
        let source = sample_source();
        let invocation = registry.invoke("launch_rocket", &serde_json::json!({}), &source);
        assert!(!invocation.succeeded());
        assert!(invocation.observation().contains("unknown tool"));
    }

    #[test]
    fn invalid_arguments_do_not_panic() {
        let registry = builtin_registry();
        let source = sample_source();
        let invocation = registry.invoke("detect_outliers", &serde_json::json!({}), &source);
        assert!(!invocation.succeeded());
        assert!(invocation.observation().contains("column"));
    }

    #[test]
    fn successful_invocation_reports_duration_and_narrative() {
        let registry = builtin_registry();
        let source = sample_source();
        let invocation = registry.invoke(
            "column_stats",
            &serde_json::json!({"column": "qty"}),
            &source,
        );
        assert!(invocation.succeeded());
        assert!(invocation.observation().contains("qty"));
    }
}
