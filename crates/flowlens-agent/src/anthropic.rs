//! Anthropic Messages API oracle client.

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use flowlens_common::OracleError;
use flowlens_config::OracleConfig;
use flowlens_tools::ToolSpec;
use tracing::debug;

use crate::sse::each_data_payload;
use crate::{ChunkSink, Message, OracleClient, OracleReply, OracleToolCall, Role};

const API_URL: &str = "https://api.anthropic.com/v1/messages";
const API_VERSION: &str = "2023-06-01";

#[derive(Clone)]
pub struct AnthropicConfig {
    pub api_key: String,
    pub model: String,
    pub max_tokens: u32,
    pub request_timeout: Duration,
}

impl fmt::Debug for AnthropicConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AnthropicConfig")
            .field("api_key", &"[REDACTED]")
            .field("model", &self.model)
            .field("max_tokens", &self.max_tokens)
            .field("request_timeout", &self.request_timeout)
            .finish()
    }
}

impl AnthropicConfig {
    pub fn new(api_key: impl Into<String>, config: &OracleConfig) -> Self {
        Self {
            api_key: api_key.into(),
            model: config.model.clone(),
            max_tokens: config.max_tokens,
            request_timeout: Duration::from_secs(config.request_timeout_secs),
        }
    }

    /// Read the API key from `ANTHROPIC_API_KEY`.
    pub fn from_env(config: &OracleConfig) -> Result<Self, OracleError> {
        match std::env::var("ANTHROPIC_API_KEY") {
            Ok(key) if !key.trim().is_empty() => Ok(Self::new(key, config)),
            _ => Err(OracleError::NotConfigured(
                "set ANTHROPIC_API_KEY to use the anthropic provider".to_string(),
            )),
        }
    }
}

pub struct AnthropicClient {
    config: AnthropicConfig,
    http: reqwest::Client,
}

impl AnthropicClient {
    pub fn new(config: AnthropicConfig) -> Self {
        let http = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .timeout(config.request_timeout)
            .build()
            .unwrap_or_default();
        Self { config, http }
    }

    fn build_request_body(
        &self,
        messages: &[Message],
        tools: &[ToolSpec],
        stream: bool,
    ) -> serde_json::Value {
        let mut msgs = Vec::new();
        for msg in messages {
            let role = match msg.role {
                Role::User | Role::Tool => "user",
                Role::Assistant => "assistant",
                // System content travels in the top-level field.
                Role::System => continue,
            };
            msgs.push(serde_json::json!({
                "role": role,
                "content": msg.content,
            }));
        }

        let mut body = serde_json::json!({
            "model": self.config.model,
            "max_tokens": self.config.max_tokens,
            "messages": msgs,
        });

        if let Some(system) = messages.iter().find(|m| m.role == Role::System) {
            body["system"] = serde_json::json!(system.content);
        }

        if !tools.is_empty() {
            let tool_defs: Vec<serde_json::Value> = tools
                .iter()
                .map(|t| {
                    serde_json::json!({
                        "name": t.name,
                        "description": t.description,
                        "input_schema": t.parameters,
                    })
                })
                .collect();
            body["tools"] = serde_json::json!(tool_defs);
        }

        if stream {
            body["stream"] = serde_json::json!(true);
        }

        body
    }

    fn parse_response(&self, json: serde_json::Value) -> Result<OracleReply, OracleError> {
        let content = json["content"]
            .as_array()
            .and_then(|blocks| {
                blocks.iter().find_map(|b| {
                    if b["type"] == "text" {
                        b["text"].as_str().map(String::from)
                    } else {
                        None
                    }
                })
            })
            .unwrap_or_default();

        let tool_calls = json["content"]
            .as_array()
            .map(|blocks| {
                blocks
                    .iter()
                    .filter(|b| b["type"] == "tool_use")
                    .map(|b| OracleToolCall {
                        id: b["id"].as_str().unwrap_or("").to_string(),
                        name: b["name"].as_str().unwrap_or("").to_string(),
                        arguments: b["input"].clone(),
                    })
                    .collect()
            })
            .unwrap_or_default();

        Ok(OracleReply {
            content,
            tool_calls,
        })
    }

    async fn post(
        &self,
        body: &serde_json::Value,
    ) -> Result<reqwest::Response, OracleError> {
        let response = self
            .http
            .post(API_URL)
            .header("x-api-key", &self.config.api_key)
            .header("anthropic-version", API_VERSION)
            .header("content-type", "application/json")
            .json(body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    OracleError::Timeout
                } else {
                    OracleError::Network(e.to_string())
                }
            })?;

        let status = response.status();
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(OracleError::RateLimited);
        }
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            let text = text.chars().take(200).collect::<String>();
            return Err(OracleError::Api(format!("HTTP {status}: {text}")));
        }
        Ok(response)
    }
}

#[async_trait]
impl OracleClient for AnthropicClient {
    async fn send(
        &self,
        messages: &[Message],
        tools: &[ToolSpec],
    ) -> Result<OracleReply, OracleError> {
        let body = self.build_request_body(messages, tools, false);
        debug!(model = %self.config.model, "anthropic request");

        let response = self.post(&body).await?;
        let json: serde_json::Value = response
            .json()
            .await
            .map_err(|e| OracleError::Parse(e.to_string()))?;

        self.parse_response(json)
    }

    async fn send_streaming(
        &self,
        messages: &[Message],
        tools: &[ToolSpec],
        on_chunk: ChunkSink,
    ) -> Result<OracleReply, OracleError> {
        let body = self.build_request_body(messages, tools, true);
        debug!(model = %self.config.model, "anthropic streaming request");

        let response = self.post(&body).await?;

        let mut full_content = String::new();
        let mut tool_calls: Vec<OracleToolCall> = Vec::new();

        // tool_use block currently being assembled across deltas
        let mut current_tool_id = String::new();
        let mut current_tool_name = String::new();
        let mut current_tool_json = String::new();

        // Each payload names itself in a "type" field, so the event line is
        // not needed.
        each_data_payload(response, |payload| {
            let Ok(data) = serde_json::from_str::<serde_json::Value>(payload) else {
                return;
            };
            match data["type"].as_str().unwrap_or("") {
                "content_block_delta" => match data["delta"]["type"].as_str().unwrap_or("") {
                    "text_delta" => {
                        if let Some(text) = data["delta"]["text"].as_str() {
                            full_content.push_str(text);
                            on_chunk(text.to_string());
                        }
                    }
                    "input_json_delta" => {
                        if let Some(part) = data["delta"]["partial_json"].as_str() {
                            current_tool_json.push_str(part);
                        }
                    }
                    _ => {}
                },
                "content_block_start" => {
                    if data["content_block"]["type"] == "tool_use" {
                        current_tool_id = data["content_block"]["id"]
                            .as_str()
                            .unwrap_or("")
                            .to_string();
                        current_tool_name = data["content_block"]["name"]
                            .as_str()
                            .unwrap_or("")
                            .to_string();
                        current_tool_json.clear();
                    }
                }
                "content_block_stop" => {
                    if !current_tool_name.is_empty() {
                        let arguments = serde_json::from_str(&current_tool_json)
                            .unwrap_or(serde_json::Value::Null);
                        tool_calls.push(OracleToolCall {
                            id: std::mem::take(&mut current_tool_id),
                            name: std::mem::take(&mut current_tool_name),
                            arguments,
                        });
                        current_tool_json.clear();
                    }
                }
                _ => {}
            }
        })
        .await?;

        Ok(OracleReply {
            content: full_content,
            tool_calls,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client() -> AnthropicClient {
        AnthropicClient::new(AnthropicConfig::new("sk-test", &OracleConfig::default()))
    }

    #[test]
    fn debug_redacts_the_key() {
        let config = AnthropicConfig::new("sk-secret", &OracleConfig::default());
        let rendered = format!("{config:?}");
        assert!(rendered.contains("[REDACTED]"));
        assert!(!rendered.contains("sk-secret"));
    }

    #[test]
    fn request_body_separates_system_and_maps_roles() {
        let client = client();
        let messages = vec![
            Message::new(Role::System, "you are an analyst"),
            Message::new(Role::User, "hello"),
            Message::new(Role::Assistant, "hi"),
            Message::new(Role::Tool, "Error: unknown tool"),
        ];
        let body = client.build_request_body(&messages, &[], false);

        assert_eq!(body["system"], "you are an analyst");
        let msgs = body["messages"].as_array().unwrap();
        assert_eq!(msgs.len(), 3);
        assert_eq!(msgs[0]["role"], "user");
        assert_eq!(msgs[1]["role"], "assistant");
        assert_eq!(msgs[2]["role"], "user");
        assert!(body.get("stream").is_none());
    }

    #[test]
    fn request_body_declares_tools_with_input_schema() {
        let client = client();
        let tools = vec![ToolSpec {
            name: "column_stats".to_string(),
            description: "stats".to_string(),
            parameters: serde_json::json!({"type": "object", "properties": {}}),
        }];
        let body = client.build_request_body(&[], &tools, true);

        assert_eq!(body["tools"][0]["name"], "column_stats");
        assert!(body["tools"][0]["input_schema"].is_object());
        assert_eq!(body["stream"], true);
    }

    #[test]
    fn response_parses_text_and_tool_use_blocks() {
        let client = client();
        let json = serde_json::json!({
            "content": [
                { "type": "text", "text": "let me check the outliers" },
                {
                    "type": "tool_use",
                    "id": "toolu_01",
                    "name": "detect_outliers",
                    "input": { "column": "qty" }
                }
            ]
        });
        let reply = client.parse_response(json).unwrap();
        assert_eq!(reply.content, "let me check the outliers");
        assert_eq!(reply.tool_calls.len(), 1);
        assert_eq!(reply.tool_calls[0].name, "detect_outliers");
        assert_eq!(reply.tool_calls[0].arguments["column"], "qty");
    }
}
