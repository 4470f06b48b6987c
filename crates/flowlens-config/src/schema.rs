//! Configuration schema types.

use serde::{Deserialize, Serialize};

/// Which storage backend serves the dataset.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
#[derive(Default)]
pub enum DataBackend {
    /// Full table loaded from CSV into an in-memory columnar snapshot.
    #[default]
    Memory,
    /// SQLite database file; every read is translated to SQL.
    Sqlite,
}

/// Dataset access configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DataConfig {
    pub backend: DataBackend,
    /// CSV file (memory backend) or SQLite file (sqlite backend).
    pub path: String,
    /// Table name for SQL queries.
    pub table: String,
    /// Hard cap on rows any single query may return.
    pub row_cap: usize,
    /// Per-query execution timeout in milliseconds.
    pub query_timeout_ms: u64,
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            backend: DataBackend::Memory,
            path: "data/pipeline_dataset.csv".to_string(),
            table: "pipeline_data".to_string(),
            row_cap: 10_000,
            query_timeout_ms: 10_000,
        }
    }
}

/// Which reasoning oracle provider to use.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
#[derive(Default)]
pub enum Provider {
    #[default]
    Anthropic,
    Openai,
}

/// Reasoning oracle configuration. The API key itself comes from
/// `ANTHROPIC_API_KEY` / `OPENAI_API_KEY`, never from the file.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OracleConfig {
    pub provider: Provider,
    pub model: String,
    pub max_tokens: u32,
    /// Per-request timeout in seconds.
    pub request_timeout_secs: u64,
}

impl Default for OracleConfig {
    fn default() -> Self {
        Self {
            provider: Provider::Anthropic,
            model: "claude-sonnet-4-20250514".to_string(),
            max_tokens: 4096,
            request_timeout_secs: 120,
        }
    }
}

/// Orchestrator behavior.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    /// Maximum tool invocations per turn before forced finalization.
    pub max_tool_steps: u32,
    /// Idle threads older than this are eligible for expiry. 0 keeps
    /// threads for the process lifetime.
    pub thread_ttl_secs: u64,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            max_tool_steps: 10,
            thread_ttl_secs: 0,
        }
    }
}

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct FlowlensConfig {
    pub data: DataConfig,
    pub oracle: OracleConfig,
    pub agent: AgentConfig,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_backend_is_memory() {
        assert_eq!(DataConfig::default().backend, DataBackend::Memory);
    }

    #[test]
    fn backend_parses_lowercase() {
        let config: DataConfig = toml::from_str("backend = \"sqlite\"").unwrap();
        assert_eq!(config.backend, DataBackend::Sqlite);
    }

    #[test]
    fn config_round_trips_through_toml() {
        let config = FlowlensConfig::default();
        let text = toml::to_string(&config).unwrap();
        let back: FlowlensConfig = toml::from_str(&text).unwrap();
        assert_eq!(back.data.row_cap, config.data.row_cap);
        assert_eq!(back.oracle.model, config.oracle.model);
    }
}
