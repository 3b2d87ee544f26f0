use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::scoring::nps::NpsPrediction;
use crate::scoring::sentiment::SentimentResult;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sender {
    Agent,
    Customer,
    System,
}

impl fmt::Display for Sender {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Sender::Agent => write!(f, "agent"),
            Sender::Customer => write!(f, "customer"),
            Sender::System => write!(f, "system"),
        }
    }
}

/// A single message inside a live chat session. Immutable once recorded;
/// the optional scores are filled in by the scoring pipeline before the
/// message is pushed out, never mutated afterwards.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
    pub id: String,
    pub session_id: String,
    pub sender: Sender,
    pub content: String,
    pub timestamp: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sentiment: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub risk: Option<f64>,
}

impl ChatMessage {
    pub fn new(session_id: impl Into<String>, sender: Sender, content: impl Into<String>) -> Self {
        Self {
            id: format!("msg-{}", Uuid::new_v4()),
            session_id: session_id.into(),
            sender,
            content: content.into(),
            timestamp: Utc::now(),
            sentiment: None,
            risk: None,
        }
    }
}

/// Persisted record of one customer/agent exchange together with the
/// sentiment and NPS annotations produced for it. The core only builds
/// these; the store owns them afterwards.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatLogRecord {
    pub id: String,
    pub customer: String,
    pub agent: String,
    pub user_message: String,
    pub agent_response: String,
    pub sentiment: SentimentResult,
    pub nps: NpsPrediction,
    pub timestamp: DateTime<Utc>,
}

impl ChatLogRecord {
    pub fn new(
        customer: impl Into<String>,
        agent: impl Into<String>,
        user_message: impl Into<String>,
        agent_response: impl Into<String>,
        sentiment: SentimentResult,
        nps: NpsPrediction,
    ) -> Self {
        Self {
            id: format!("chat-{}", Uuid::new_v4()),
            customer: customer.into(),
            agent: agent.into(),
            user_message: user_message.into(),
            agent_response: agent_response.into(),
            sentiment,
            nps,
            timestamp: Utc::now(),
        }
    }
}
