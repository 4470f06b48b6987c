//! Flowlens configuration system.
//!
//! TOML-based configuration with serde defaults so a partial (or absent)
//! config file still produces a runnable setup. Secrets are never part of
//! the file: API keys are read from the environment by the oracle clients.

pub mod schema;
pub mod toml_loader;
pub mod validation;

pub use schema::{AgentConfig, DataBackend, DataConfig, FlowlensConfig, OracleConfig, Provider};

use flowlens_common::ConfigError;
use std::path::Path;

/// Load config from an optional path.
///
/// With no path, defaults are returned. With a path, the file is parsed
/// and validated; validation failures are hard errors since an explicit
/// config is an explicit intent.
pub fn load_config(path: Option<&Path>) -> Result<FlowlensConfig, ConfigError> {
    let config = match path {
        Some(p) => toml_loader::load_from_path(p)?,
        None => FlowlensConfig::default(),
    };
    validation::validate(&config)?;
    Ok(config)
}
