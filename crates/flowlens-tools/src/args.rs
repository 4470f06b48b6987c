//! Tool argument validation against the declared parameter schema.
//!
//! Validation happens before any tool code runs: unknown keys, missing
//! required arguments, and type mismatches all fail with
//! `ToolError::InvalidCall`, which the orchestrator feeds back to the
//! oracle as an observation rather than aborting the turn.

use flowlens_common::ToolError;
use serde_json::{Map, Value};

use crate::catalog::ToolSpec;

/// Arguments that passed schema validation.
#[derive(Debug, Clone, Default)]
pub struct ToolArgs(Map<String, Value>);

impl ToolArgs {
    /// Validate raw oracle-supplied arguments against a tool spec.
    pub fn validate(spec: &ToolSpec, raw: &Value) -> Result<Self, ToolError> {
        let object = match raw {
            Value::Object(map) => map.clone(),
            Value::Null => Map::new(),
            _ => {
                return Err(ToolError::InvalidCall(
                    "arguments must be a JSON object".to_string(),
                ))
            }
        };

        let properties = spec.parameters["properties"]
            .as_object()
            .cloned()
            .unwrap_or_default();

        for key in object.keys() {
            if !properties.contains_key(key) {
                return Err(ToolError::InvalidCall(format!(
                    "unknown argument '{key}' for tool '{}'",
                    spec.name
                )));
            }
        }

        if let Some(required) = spec.parameters["required"].as_array() {
            for key in required.iter().filter_map(|v| v.as_str()) {
                if !object.contains_key(key) || object[key].is_null() {
                    return Err(ToolError::InvalidCall(format!(
                        "missing required argument '{key}' for tool '{}'",
                        spec.name
                    )));
                }
            }
        }

        for (key, value) in &object {
            if value.is_null() {
                continue;
            }
            if let Some(declared) = properties.get(key).and_then(|p| p["type"].as_str()) {
                if !type_matches(declared, value) {
                    return Err(ToolError::InvalidCall(format!(
                        "argument '{key}' must be of type {declared}"
                    )));
                }
            }
            if let Some(allowed) = properties.get(key).and_then(|p| p["enum"].as_array()) {
                if !allowed.contains(value) {
                    return Err(ToolError::InvalidCall(format!(
                        "argument '{key}' must be one of {allowed:?}"
                    )));
                }
            }
        }

        Ok(Self(object))
    }

    pub fn str(&self, key: &str) -> Result<&str, ToolError> {
        self.0
            .get(key)
            .and_then(Value::as_str)
            .ok_or_else(|| ToolError::InvalidCall(format!("missing argument '{key}'")))
    }

    pub fn str_or<'a>(&'a self, key: &str, default: &'a str) -> &'a str {
        self.0.get(key).and_then(Value::as_str).unwrap_or(default)
    }

    pub fn opt_str(&self, key: &str) -> Option<&str> {
        self.0.get(key).and_then(Value::as_str)
    }

    pub fn f64_or(&self, key: &str, default: f64) -> f64 {
        self.0.get(key).and_then(Value::as_f64).unwrap_or(default)
    }

    pub fn usize_or(&self, key: &str, default: usize) -> usize {
        self.0
            .get(key)
            .and_then(Value::as_u64)
            .map(|v| v as usize)
            .unwrap_or(default)
    }

    pub fn opt_usize(&self, key: &str) -> Option<usize> {
        self.0.get(key).and_then(Value::as_u64).map(|v| v as usize)
    }

    pub fn u64_or(&self, key: &str, default: u64) -> u64 {
        self.0.get(key).and_then(Value::as_u64).unwrap_or(default)
    }

    pub fn str_list(&self, key: &str) -> Result<Vec<String>, ToolError> {
        self.opt_str_list(key)
            .ok_or_else(|| ToolError::InvalidCall(format!("missing argument '{key}'")))
    }

    pub fn opt_str_list(&self, key: &str) -> Option<Vec<String>> {
        let array = self.0.get(key)?.as_array()?;
        Some(
            array
                .iter()
                .filter_map(|v| v.as_str().map(String::from))
                .collect(),
        )
    }
}

fn type_matches(declared: &str, value: &Value) -> bool {
    match declared {
        "string" => value.is_string(),
        "number" => value.is_number(),
        "integer" => value.is_i64() || value.is_u64(),
        "boolean" => value.is_boolean(),
        "array" => value.is_array(),
        "object" => value.is_object(),
        _ => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spec() -> ToolSpec {
        ToolSpec {
            name: "detect_outliers".to_string(),
            description: String::new(),
            parameters: serde_json::json!({
                "type": "object",
                "properties": {
                    "column": { "type": "string" },
                    "method": { "type": "string", "enum": ["iqr", "zscore"] },
                    "factor": { "type": "number" }
                },
                "required": ["column"]
            }),
        }
    }

    #[test]
    fn valid_arguments_pass() {
        let args = ToolArgs::validate(
            &spec(),
            &serde_json::json!({"column": "qty", "method": "iqr", "factor": 2.0}),
        )
        .unwrap();
        assert_eq!(args.str("column").unwrap(), "qty");
        assert_eq!(args.f64_or("factor", 1.5), 2.0);
        assert_eq!(args.str_or("method", "iqr"), "iqr");
    }

    #[test]
    fn missing_required_rejected() {
        let err = ToolArgs::validate(&spec(), &serde_json::json!({"method": "iqr"})).unwrap_err();
        assert!(matches!(err, ToolError::InvalidCall(_)));
        assert!(err.to_string().contains("column"));
    }

    #[test]
    fn unknown_key_rejected() {
        let err =
            ToolArgs::validate(&spec(), &serde_json::json!({"column": "qty", "bogus": 1}))
                .unwrap_err();
        assert!(err.to_string().contains("bogus"));
    }

    #[test]
    fn wrong_type_rejected() {
        let err = ToolArgs::validate(&spec(), &serde_json::json!({"column": 42})).unwrap_err();
        assert!(err.to_string().contains("string"));
    }

    #[test]
    fn enum_violation_rejected() {
        let err = ToolArgs::validate(
            &spec(),
            &serde_json::json!({"column": "qty", "method": "mad"}),
        )
        .unwrap_err();
        assert!(matches!(err, ToolError::InvalidCall(_)));
    }

    #[test]
    fn null_arguments_treated_as_empty() {
        let err = ToolArgs::validate(&spec(), &Value::Null).unwrap_err();
        // Still fails because `column` is required, but not because of shape.
        assert!(err.to_string().contains("column"));
    }
}
