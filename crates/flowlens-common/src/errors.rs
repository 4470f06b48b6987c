use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("config file not found: {0}")]
    FileNotFound(PathBuf),

    #[error("config parse error: {0}")]
    ParseError(String),

    #[error("config validation error: {0}")]
    ValidationError(String),
}

/// Errors from the dataset access layer.
///
/// `ResourceExceeded` and `SchemaMismatch` are recoverable at the tool
/// level: the orchestrator feeds them back to the oracle as observations.
#[derive(Debug, thiserror::Error)]
pub enum DataError {
    #[error("resource exceeded: {0}")]
    ResourceExceeded(String),

    #[error("schema mismatch: {0}")]
    SchemaMismatch(String),

    #[error("query rejected: {0}")]
    QueryRejected(String),

    #[error("sql error: {0}")]
    Sql(String),

    #[error("dataset load error: {0}")]
    Load(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Errors from tool dispatch and execution.
#[derive(Debug, thiserror::Error)]
pub enum ToolError {
    #[error("invalid tool call: {0}")]
    InvalidCall(String),

    #[error("tool execution failed: {0}")]
    Execution(String),

    #[error(transparent)]
    Data(#[from] DataError),
}

/// Errors from the reasoning oracle transport.
#[derive(Debug, thiserror::Error)]
pub enum OracleError {
    #[error("api error: {0}")]
    Api(String),

    #[error("rate limited")]
    RateLimited,

    #[error("network error: {0}")]
    Network(String),

    #[error("parse error: {0}")]
    Parse(String),

    #[error("oracle not configured: {0}")]
    NotConfigured(String),

    #[error("timeout")]
    Timeout,
}

#[derive(Debug, thiserror::Error)]
pub enum AgentError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Data(#[from] DataError),

    #[error("oracle unavailable: {0}")]
    OracleUnavailable(#[from] OracleError),

    #[error(transparent)]
    Tool(#[from] ToolError),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Other(String),
}
