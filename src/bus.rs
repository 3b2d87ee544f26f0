use serde::Serialize;
use tokio::sync::broadcast;

use crate::chat::ChatMessage;
use crate::scoring::sentiment::SentimentLabel;

/// Push events fanned out to connected chat clients. Delivery is
/// unordered and best-effort: clients treat the stream as an append-only
/// log and a reconnect starts from an empty transcript.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    /// A new chat message was recorded
    Message { message: ChatMessage },

    /// A detractor / high-risk condition was detected
    Alert { risk: f64, sentiment: SentimentLabel },

    /// Suggested agent response for the AI popup
    #[serde(rename_all = "camelCase")]
    AiRecommendation {
        suggested_response: String,
        risk: f64,
        sentiment: SentimentLabel,
        reasoning: String,
    },
}

pub struct EventBus {
    tx: broadcast::Sender<(String, Event)>,
}

impl EventBus {
    pub fn new() -> Self {
        let (tx, _rx) = broadcast::channel(100);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<(String, Event)> {
        self.tx.subscribe()
    }

    /// Publish an event for one chat session. Errors from having no
    /// receivers are ignored.
    pub fn publish(&self, session_id: &str, event: Event) {
        let _ = self.tx.send((session_id.to_string(), event));
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}
