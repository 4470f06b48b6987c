//! Public facade over the orchestrator.

use std::sync::Arc;
use std::time::{Duration, Instant};

use flowlens_common::{AgentError, ThreadId};
use flowlens_config::AgentConfig;
use flowlens_data::{DatasetSource, SchemaInfo};
use flowlens_tools::ToolRegistry;

use crate::orchestrator::AgentOrchestrator;
use crate::streaming::StreamingEmitter;
use crate::OracleClient;

/// Result of one chat turn.
#[derive(Debug, Clone, serde::Serialize)]
pub struct ChatOutcome {
    pub thread_id: ThreadId,
    pub response: String,
    pub time_seconds: f64,
}

/// The conversational analysis engine: dataset, tools, oracle, threads.
pub struct AnalysisEngine {
    orchestrator: AgentOrchestrator,
    source: Arc<dyn DatasetSource>,
    thread_ttl: Duration,
}

impl AnalysisEngine {
    pub fn new(
        oracle: Box<dyn OracleClient>,
        source: Arc<dyn DatasetSource>,
        registry: ToolRegistry,
        config: &AgentConfig,
    ) -> Result<Self, AgentError> {
        let orchestrator = AgentOrchestrator::new(
            oracle,
            Arc::clone(&source),
            registry,
            config.max_tool_steps,
        )?;
        Ok(Self {
            orchestrator,
            source,
            thread_ttl: Duration::from_secs(config.thread_ttl_secs),
        })
    }

    /// Dataset schema introspection.
    pub fn schema(&self) -> Result<SchemaInfo, AgentError> {
        self.source.schema().map_err(AgentError::from)
    }

    /// Run one turn without streaming.
    pub async fn chat(
        &self,
        thread_id: Option<ThreadId>,
        text: &str,
    ) -> Result<ChatOutcome, AgentError> {
        self.chat_with(thread_id, text, &StreamingEmitter::sink())
            .await
    }

    /// Run one turn, reporting progress through `emitter`.
    pub async fn chat_streaming(
        &self,
        thread_id: Option<ThreadId>,
        text: &str,
        emitter: &StreamingEmitter,
    ) -> Result<ChatOutcome, AgentError> {
        self.chat_with(thread_id, text, emitter).await
    }

    async fn chat_with(
        &self,
        thread_id: Option<ThreadId>,
        text: &str,
        emitter: &StreamingEmitter,
    ) -> Result<ChatOutcome, AgentError> {
        self.expire_idle();
        let start = Instant::now();
        let (thread_id, response) = self.orchestrator.run_turn(thread_id, text, emitter).await?;
        Ok(ChatOutcome {
            thread_id,
            response,
            time_seconds: start.elapsed().as_secs_f64(),
        })
    }

    /// Drop a conversation and return the replacement thread id.
    pub fn clear(&self, thread_id: &ThreadId) -> ThreadId {
        self.orchestrator.threads().clear(thread_id)
    }

    fn expire_idle(&self) {
        self.orchestrator.threads().expire(self.thread_ttl);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::orchestrator::tests::{final_reply, fixture_source, tool_reply, MockOracle};
    use flowlens_tools::builtin_registry;

    fn engine(replies: Vec<crate::OracleReply>) -> AnalysisEngine {
        AnalysisEngine::new(
            Box::new(MockOracle::new(replies)),
            fixture_source(),
            builtin_registry(),
            &flowlens_config::AgentConfig::default(),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn chat_reports_thread_and_timing() {
        let engine = engine(vec![final_reply("hello")]);
        let outcome = engine.chat(None, "hi").await.unwrap();

        assert_eq!(outcome.response, "hello");
        assert!(outcome.time_seconds >= 0.0);
    }

    #[tokio::test]
    async fn follow_up_turns_share_the_thread() {
        let engine = engine(vec![
            tool_reply("column_stats", serde_json::json!({"column": "qty"})),
            final_reply("qty looks skewed"),
            final_reply("as I said, skewed"),
        ]);

        let first = engine.chat(None, "describe qty").await.unwrap();
        let second = engine
            .chat(Some(first.thread_id.clone()), "say that again")
            .await
            .unwrap();
        assert_eq!(second.thread_id, first.thread_id);
    }

    #[tokio::test]
    async fn clear_starts_over() {
        let engine = engine(vec![final_reply("hello")]);
        let outcome = engine.chat(None, "hi").await.unwrap();

        let fresh = engine.clear(&outcome.thread_id);
        assert_ne!(fresh, outcome.thread_id);
    }

    #[tokio::test]
    async fn schema_is_exposed() {
        let engine = engine(Vec::new());
        let schema = engine.schema().unwrap();
        assert_eq!(schema.row_count, 5);
        assert!(schema.summary.contains("qty"));
    }
}
