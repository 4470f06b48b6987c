//! Analysis tool library and registry for Flowlens.
//!
//! Tools are the fixed catalog of analytical operations the reasoning
//! oracle can dispatch: statistics, correlation, outlier/segment/cluster
//! detection, data-quality and robustness checks, and bounded query
//! execution. Every tool is read-only with respect to the dataset and
//! deterministic given its declared inputs; stochastic tools take a seed
//! that defaults to a fixed value.

pub mod args;
pub mod catalog;
pub mod clustering;
pub mod numeric;
pub mod outliers;
pub mod patterns;
pub mod quality;
pub mod query_tool;
pub mod registry;
pub mod stats;
pub mod timeseries;
pub mod validation;

#[cfg(test)]
pub(crate) mod testutil;

pub use args::ToolArgs;
pub use catalog::{builtin_registry, ToolSpec};
pub use registry::{ToolInvocation, ToolKind, ToolRegistry, ToolResult};
