//! Turn progress streaming.
//!
//! The orchestrator reports progress through a [`StreamingEmitter`]; the
//! consumer drains a channel of [`TurnEvent`]s. A dropped or absent
//! consumer never affects the turn: sends are fire-and-forget.

use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};

/// Ordered events emitted while a turn executes.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TurnEvent {
    /// A tool is about to run.
    ToolStart { name: String },
    /// A tool finished; `ok` is false when it returned an error
    /// observation.
    ToolResult {
        name: String,
        ok: bool,
        elapsed_ms: u64,
        summary: String,
    },
    /// Incremental final-answer text.
    AnswerChunk { text: String },
    /// The complete final answer.
    FinalAnswer { text: String },
    /// The turn is over; no further events follow.
    Done,
}

/// Fire-and-forget event sink.
#[derive(Clone, Default)]
pub struct StreamingEmitter {
    tx: Option<UnboundedSender<TurnEvent>>,
}

impl StreamingEmitter {
    /// An emitter wired to a channel, plus the receiving end.
    pub fn channel() -> (Self, UnboundedReceiver<TurnEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx: Some(tx) }, rx)
    }

    /// An emitter that drops everything; used for non-streaming turns.
    pub fn sink() -> Self {
        Self::default()
    }

    pub fn is_live(&self) -> bool {
        self.tx.is_some()
    }

    /// Send an event. Errors from a departed consumer are ignored; the
    /// turn always runs to completion.
    pub fn emit(&self, event: TurnEvent) {
        if let Some(tx) = &self.tx {
            let _ = tx.send(event);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn events_arrive_in_emission_order() {
        let (emitter, mut rx) = StreamingEmitter::channel();
        emitter.emit(TurnEvent::ToolStart {
            name: "column_stats".to_string(),
        });
        emitter.emit(TurnEvent::AnswerChunk {
            text: "partial".to_string(),
        });
        emitter.emit(TurnEvent::Done);

        assert!(matches!(rx.recv().await.unwrap(), TurnEvent::ToolStart { .. }));
        assert!(matches!(rx.recv().await.unwrap(), TurnEvent::AnswerChunk { .. }));
        assert_eq!(rx.recv().await.unwrap(), TurnEvent::Done);
    }

    #[test]
    fn dropped_receiver_does_not_panic() {
        let (emitter, rx) = StreamingEmitter::channel();
        drop(rx);
        emitter.emit(TurnEvent::Done);
    }

    #[test]
    fn sink_swallows_everything() {
        let emitter = StreamingEmitter::sink();
        assert!(!emitter.is_live());
        emitter.emit(TurnEvent::Done);
    }

    #[test]
    fn events_serialize_with_a_type_tag() {
        let event = TurnEvent::ToolResult {
            name: "detect_outliers".to_string(),
            ok: true,
            elapsed_ms: 12,
            summary: "1 outlier".to_string(),
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "tool_result");
        assert_eq!(json["ok"], true);
    }
}
