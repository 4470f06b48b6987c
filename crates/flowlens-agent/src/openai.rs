//! OpenAI-compatible Chat Completions oracle client.
//!
//! Works against api.openai.com and any server that speaks the same
//! protocol; the base URL is overridable through `OPENAI_BASE_URL`.

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use flowlens_common::OracleError;
use flowlens_config::OracleConfig;
use flowlens_tools::ToolSpec;
use tracing::debug;

use crate::sse::each_data_payload;
use crate::{ChunkSink, Message, OracleClient, OracleReply, OracleToolCall, Role};

const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

#[derive(Clone)]
pub struct OpenAiConfig {
    pub api_key: String,
    pub base_url: String,
    pub model: String,
    pub max_tokens: u32,
    pub request_timeout: Duration,
}

impl fmt::Debug for OpenAiConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OpenAiConfig")
            .field("api_key", &"[REDACTED]")
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .field("max_tokens", &self.max_tokens)
            .field("request_timeout", &self.request_timeout)
            .finish()
    }
}

impl OpenAiConfig {
    pub fn new(api_key: impl Into<String>, config: &OracleConfig) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
            model: config.model.clone(),
            max_tokens: config.max_tokens,
            request_timeout: Duration::from_secs(config.request_timeout_secs),
        }
    }

    /// Read `OPENAI_API_KEY`, and optionally `OPENAI_BASE_URL` for
    /// compatible servers.
    pub fn from_env(config: &OracleConfig) -> Result<Self, OracleError> {
        let key = match std::env::var("OPENAI_API_KEY") {
            Ok(key) if !key.trim().is_empty() => key,
            _ => {
                return Err(OracleError::NotConfigured(
                    "set OPENAI_API_KEY to use the openai provider".to_string(),
                ))
            }
        };
        let mut cfg = Self::new(key, config);
        if let Ok(base) = std::env::var("OPENAI_BASE_URL") {
            if !base.trim().is_empty() {
                cfg.base_url = base.trim_end_matches('/').to_string();
            }
        }
        Ok(cfg)
    }
}

pub struct OpenAiClient {
    config: OpenAiConfig,
    http: reqwest::Client,
}

impl OpenAiClient {
    pub fn new(config: OpenAiConfig) -> Self {
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
        let msgs: Vec<serde_json::Value> = messages
            .iter()
            .map(|msg| {
                let role = match msg.role {
                    Role::System => "system",
                    Role::Assistant => "assistant",
                    // Observations go back as user turns; the protocol's
                    // native tool role requires call-id threading we do not
                    // depend on.
                    Role::User | Role::Tool => "user",
                };
                serde_json::json!({ "role": role, "content": msg.content })
            })
            .collect();

        let mut body = serde_json::json!({
            "model": self.config.model,
            "max_tokens": self.config.max_tokens,
            "messages": msgs,
        });

        if !tools.is_empty() {
            let tool_defs: Vec<serde_json::Value> = tools
                .iter()
                .map(|t| {
                    serde_json::json!({
                        "type": "function",
                        "function": {
                            "name": t.name,
                            "description": t.description,
                            "parameters": t.parameters,
                        }
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
        let message = &json["choices"][0]["message"];
        let content = message["content"].as_str().unwrap_or_default().to_string();

        let tool_calls = message["tool_calls"]
            .as_array()
            .map(|calls| {
                calls
                    .iter()
                    .map(|call| OracleToolCall {
                        id: call["id"].as_str().unwrap_or("").to_string(),
                        name: call["function"]["name"].as_str().unwrap_or("").to_string(),
                        // Arguments arrive as a JSON-encoded string.
                        arguments: call["function"]["arguments"]
                            .as_str()
                            .and_then(|s| serde_json::from_str(s).ok())
                            .unwrap_or(serde_json::Value::Null),
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
        let url = format!("{}/chat/completions", self.config.base_url);
        let response = self
            .http
            .post(&url)
            .header(
                "Authorization",
                format!("Bearer {}", self.config.api_key),
            )
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

/// Tool call fragments accumulated across streaming deltas, keyed by index.
#[derive(Default)]
struct PartialToolCalls {
    calls: Vec<(String, String, String)>,
}

impl PartialToolCalls {
    fn absorb(&mut self, deltas: &serde_json::Value) {
        let Some(deltas) = deltas.as_array() else {
            return;
        };
        for delta in deltas {
            let index = delta["index"].as_u64().unwrap_or(0) as usize;
            while self.calls.len() <= index {
                self.calls.push(Default::default());
            }
            let slot = &mut self.calls[index];
            if let Some(id) = delta["id"].as_str() {
                slot.0.push_str(id);
            }
            if let Some(name) = delta["function"]["name"].as_str() {
                slot.1.push_str(name);
            }
            if let Some(args) = delta["function"]["arguments"].as_str() {
                slot.2.push_str(args);
            }
        }
    }

    fn finish(self) -> Vec<OracleToolCall> {
        self.calls
            .into_iter()
            .filter(|(_, name, _)| !name.is_empty())
            .map(|(id, name, args)| OracleToolCall {
                id,
                name,
                arguments: serde_json::from_str(&args).unwrap_or(serde_json::Value::Null),
            })
            .collect()
    }
}

#[async_trait]
impl OracleClient for OpenAiClient {
    async fn send(
        &self,
        messages: &[Message],
        tools: &[ToolSpec],
    ) -> Result<OracleReply, OracleError> {
        let body = self.build_request_body(messages, tools, false);
        debug!(model = %self.config.model, "openai request");

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
        debug!(model = %self.config.model, "openai streaming request");

        let response = self.post(&body).await?;

        let mut full_content = String::new();
        let mut partial = PartialToolCalls::default();

        each_data_payload(response, |payload| {
            if payload.trim() == "[DONE]" {
                return;
            }
            let Ok(data) = serde_json::from_str::<serde_json::Value>(payload) else {
                return;
            };
            let delta = &data["choices"][0]["delta"];
            if let Some(text) = delta["content"].as_str() {
                if !text.is_empty() {
                    full_content.push_str(text);
                    on_chunk(text.to_string());
                }
            }
            if !delta["tool_calls"].is_null() {
                partial.absorb(&delta["tool_calls"]);
            }
        })
        .await?;

        Ok(OracleReply {
            content: full_content,
            tool_calls: partial.finish(),
        })
    }
}
