//! Turn orchestration: the observe-act loop between oracle and tools.

use std::sync::Arc;
use std::time::Instant;

use flowlens_common::{AgentError, ThreadId};
use flowlens_data::DatasetSource;
use flowlens_tools::{ToolRegistry, ToolSpec};
use tracing::{debug, warn};

use crate::streaming::{StreamingEmitter, TurnEvent};
use crate::threads::ThreadStore;
use crate::{Message, OracleClient, OracleReply, Role};

/// Drives one conversation turn: the oracle decides, tools observe, and
/// the loop repeats until a final answer or the step budget runs out.
pub struct AgentOrchestrator {
    oracle: Box<dyn OracleClient>,
    registry: Arc<ToolRegistry>,
    source: Arc<dyn DatasetSource>,
    threads: ThreadStore,
    specs: Vec<ToolSpec>,
    system_prompt: String,
    max_tool_steps: u32,
}

impl AgentOrchestrator {
    pub fn new(
        oracle: Box<dyn OracleClient>,
        source: Arc<dyn DatasetSource>,
        registry: ToolRegistry,
        max_tool_steps: u32,
    ) -> Result<Self, AgentError> {
        let schema = source.schema().map_err(AgentError::from)?;
        let system_prompt = crate::prompt::system_prompt(&schema.summary);
        let specs = registry.specs().into_iter().cloned().collect();
        Ok(Self {
            oracle,
            registry: Arc::new(registry),
            source,
            threads: ThreadStore::new(),
            specs,
            system_prompt,
            max_tool_steps,
        })
    }

    pub fn threads(&self) -> &ThreadStore {
        &self.threads
    }

    /// Run one turn. Holding the thread's own lock for the duration
    /// serializes turns on the same thread while leaving other threads
    /// free.
    pub async fn run_turn(
        &self,
        thread_id: Option<ThreadId>,
        user_text: &str,
        emitter: &StreamingEmitter,
    ) -> Result<(ThreadId, String), AgentError> {
        let started = Instant::now();
        let (id, thread) = self.threads.get_or_create(thread_id);
        let mut thread = thread.lock().await;

        thread.push(Message::new(Role::User, user_text));

        let mut messages = Vec::with_capacity(thread.message_count() + 1);
        messages.push(Message::new(Role::System, self.system_prompt.clone()));
        messages.extend(thread.messages().iter().cloned());

        let mut last_content = String::new();
        let mut observations: Vec<String> = Vec::new();

        for step in 0..self.max_tool_steps {
            let reply = self.ask_oracle(&messages, emitter).await?;

            if reply.tool_calls.is_empty() {
                thread.push(
                    Message::new(Role::Assistant, reply.content.clone())
                        .with_elapsed(started.elapsed().as_secs_f64()),
                );
                emitter.emit(TurnEvent::FinalAnswer {
                    text: reply.content.clone(),
                });
                emitter.emit(TurnEvent::Done);
                return Ok((id, reply.content));
            }

            debug!(step, calls = reply.tool_calls.len(), "tool round");
            if !reply.content.is_empty() {
                last_content = reply.content.clone();
            }

            let call_names: Vec<&str> =
                reply.tool_calls.iter().map(|c| c.name.as_str()).collect();
            let assistant = Message::new(
                Role::Assistant,
                format!("{}\n[calling: {}]", reply.content, call_names.join(", ")),
            );
            messages.push(assistant.clone());
            thread.push(assistant);

            for call in &reply.tool_calls {
                emitter.emit(TurnEvent::ToolStart {
                    name: call.name.clone(),
                });
                // rusqlite and the numeric kernels block, so execution moves
                // off the async workers.
                let registry = Arc::clone(&self.registry);
                let source = Arc::clone(&self.source);
                let name = call.name.clone();
                let arguments = call.arguments.clone();
                let invocation = tokio::task::spawn_blocking(move || {
                    registry.invoke(&name, &arguments, source.as_ref())
                })
                .await
                .map_err(|e| AgentError::Other(format!("tool task failed: {e}")))?;
                let observation = invocation.observation();
                emitter.emit(TurnEvent::ToolResult {
                    name: call.name.clone(),
                    ok: invocation.succeeded(),
                    elapsed_ms: invocation.elapsed.as_millis() as u64,
                    summary: first_line(&observation),
                });

                let tool_msg = Message::new(
                    Role::Tool,
                    format!("[tool result: {}]\n{observation}", call.name),
                );
                messages.push(tool_msg.clone());
                thread.push(tool_msg);
                observations.push(observation);
            }
        }

        // Step budget exhausted; answer with what the turn has produced.
        warn!(max_tool_steps = self.max_tool_steps, "tool step budget exhausted");
        let content = if !last_content.is_empty() {
            last_content
        } else {
            observations.join("\n\n")
        };
        thread.push(
            Message::new(Role::Assistant, content.clone())
                .with_elapsed(started.elapsed().as_secs_f64()),
        );
        emitter.emit(TurnEvent::FinalAnswer {
            text: content.clone(),
        });
        emitter.emit(TurnEvent::Done);
        Ok((id, content))
    }

    async fn ask_oracle(
        &self,
        messages: &[Message],
        emitter: &StreamingEmitter,
    ) -> Result<OracleReply, AgentError> {
        let reply = if emitter.is_live() {
            let chunk_emitter = emitter.clone();
            self.oracle
                .send_streaming(
                    messages,
                    &self.specs,
                    Box::new(move |text| {
                        chunk_emitter.emit(TurnEvent::AnswerChunk { text });
                    }),
                )
                .await?
        } else {
            self.oracle.send(messages, &self.specs).await?
        };
        Ok(reply)
    }
}

fn first_line(text: &str) -> String {
    text.lines().next().unwrap_or_default().to_string()
}
