//! Conversational analysis agent for Flowlens.
//!
//! The agent wires a reasoning oracle (an LLM behind the [`OracleClient`]
//! trait) to the analysis tool registry: each user turn runs a bounded
//! observe-act loop in which the oracle may call tools against the dataset,
//! sees their observations, and eventually produces a final answer.
//! Conversations are held in a [`ThreadStore`] keyed by thread id; turn
//! progress can be streamed through a [`StreamingEmitter`].

pub mod anthropic;
pub mod engine;
pub mod openai;
pub mod orchestrator;
pub mod prompt;
pub mod sse;
pub mod streaming;
pub mod threads;

use async_trait::async_trait;
use flowlens_common::OracleError;
use flowlens_config::{OracleConfig, Provider};
use flowlens_tools::ToolSpec;

pub use anthropic::{AnthropicClient, AnthropicConfig};
pub use engine::{AnalysisEngine, ChatOutcome};
pub use openai::{OpenAiClient, OpenAiConfig};
pub use orchestrator::AgentOrchestrator;
pub use streaming::{StreamingEmitter, TurnEvent};
pub use threads::{Thread, ThreadStore};

/// Callback receiving incremental answer text.
pub type ChunkSink = Box<dyn Fn(String) + Send + Sync>;

/// Transport-agnostic reasoning oracle.
#[async_trait]
pub trait OracleClient: Send + Sync {
    async fn send(
        &self,
        messages: &[Message],
        tools: &[ToolSpec],
    ) -> Result<OracleReply, OracleError>;

    async fn send_streaming(
        &self,
        messages: &[Message],
        tools: &[ToolSpec],
        on_chunk: ChunkSink,
    ) -> Result<OracleReply, OracleError>;
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
    /// Seconds the turn took, recorded on the final assistant message.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub elapsed_seconds: Option<f64>,
}

impl Message {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            elapsed_seconds: None,
        }
    }

    pub fn with_elapsed(mut self, seconds: f64) -> Self {
        self.elapsed_seconds = Some(seconds);
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
    System,
    Tool,
}

/// One oracle response: final or partial text plus any requested tool calls.
#[derive(Debug, Clone, Default)]
pub struct OracleReply {
    pub content: String,
    pub tool_calls: Vec<OracleToolCall>,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct OracleToolCall {
    pub id: String,
    pub name: String,
    pub arguments: serde_json::Value,
}

/// Build the configured oracle client, reading credentials from the
/// environment.
pub fn build_oracle(config: &OracleConfig) -> Result<Box<dyn OracleClient>, OracleError> {
    match config.provider {
        Provider::Anthropic => Ok(Box::new(AnthropicClient::new(AnthropicConfig::from_env(
            config,
        )?))),
        Provider::Openai => Ok(Box::new(OpenAiClient::new(OpenAiConfig::from_env(config)?))),
    }
}
