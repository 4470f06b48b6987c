//! Configuration validation.

use crate::schema::FlowlensConfig;
use flowlens_common::ConfigError;

/// Run all validations on a config, collecting all errors.
pub fn validate(config: &FlowlensConfig) -> Result<(), ConfigError> {
    let mut errors: Vec<String> = Vec::new();

    if config.data.row_cap == 0 {
        errors.push("data.row_cap must be at least 1".to_string());
    }
    if config.data.query_timeout_ms == 0 {
        errors.push("data.query_timeout_ms must be at least 1".to_string());
    }
    if config.data.table.is_empty() {
        errors.push("data.table must not be empty".to_string());
    }
    if config.oracle.model.is_empty() {
        errors.push("oracle.model must not be empty".to_string());
    }
    if config.oracle.max_tokens == 0 {
        errors.push("oracle.max_tokens must be at least 1".to_string());
    }
    if config.agent.max_tool_steps == 0 {
        errors.push("agent.max_tool_steps must be at least 1".to_string());
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(ConfigError::ValidationError(errors.join("; ")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::FlowlensConfig;

    #[test]
    fn default_config_validates() {
        assert!(validate(&FlowlensConfig::default()).is_ok());
    }

    #[test]
    fn zero_step_budget_rejected() {
        let mut config = FlowlensConfig::default();
        config.agent.max_tool_steps = 0;
        let err = validate(&config).unwrap_err();
        assert!(err.to_string().contains("max_tool_steps"));
    }

    #[test]
    fn all_errors_collected() {
        let mut config = FlowlensConfig::default();
        config.data.row_cap = 0;
        config.oracle.model = String::new();
        let err = validate(&config).unwrap_err();
        let text = err.to_string();
        assert!(text.contains("row_cap"));
        assert!(text.contains("oracle.model"));
    }
}
