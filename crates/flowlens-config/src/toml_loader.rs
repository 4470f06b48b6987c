//! TOML config file loading.

use crate::schema::FlowlensConfig;
use flowlens_common::ConfigError;
use std::path::Path;
use tracing::info;

/// Load config from a specific TOML file path.
///
/// Deserializes using serde defaults for any missing fields.
pub fn load_from_path(path: &Path) -> Result<FlowlensConfig, ConfigError> {
    if !path.exists() {
        return Err(ConfigError::FileNotFound(path.to_path_buf()));
    }

    let content = std::fs::read_to_string(path)
        .map_err(|e| ConfigError::ParseError(format!("failed to read {}: {e}", path.display())))?;

    let config: FlowlensConfig = toml::from_str(&content)
        .map_err(|e| ConfigError::ParseError(format!("failed to parse TOML: {e}")))?;

    info!("loaded config from {}", path.display());
    Ok(config)
}
