//! Shared types for Flowlens.
//!
//! Error taxonomy, thread identifiers, and the crate-wide `Result` alias.

pub mod errors;
pub mod id;

pub use errors::{AgentError, ConfigError, DataError, OracleError, ToolError};
pub use id::{new_id, ThreadId};

pub type Result<T> = std::result::Result<T, AgentError>;
