use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::scoring::keywords;
use crate::scoring::sentiment::{SentimentLabel, SentimentResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CustomerType {
    Detractor,
    Neutral,
    Promoter,
}

/// Classification cutoffs on the 0-10 scale, plus the risk level at which
/// the chat channel raises an alert.
#[derive(Debug, Clone, Copy)]
pub struct Thresholds {
    pub detractor: u8,
    pub promoter: u8,
    pub risk_alert: f64,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            detractor: 6,
            promoter: 9,
            risk_alert: 0.6,
        }
    }
}

impl Thresholds {
    /// Clamp both cutoffs into [0, 10] and restore `promoter > detractor`
    /// by bumping the promoter cutoff up when the ordering is violated.
    pub fn validated(self) -> Self {
        let detractor = self.detractor.min(9);
        let promoter = if self.promoter > detractor {
            self.promoter.min(10)
        } else {
            detractor + 1
        };
        Self {
            detractor,
            promoter,
            risk_alert: self.risk_alert.clamp(0.0, 1.0),
        }
    }

    pub fn classify(&self, score: u8) -> CustomerType {
        if score <= self.detractor {
            CustomerType::Detractor
        } else if score >= self.promoter {
            CustomerType::Promoter
        } else {
            CustomerType::Neutral
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NpsPrediction {
    pub nps_score: u8,
    pub customer_type: CustomerType,
    pub accuracy: f64,
    pub confidence: f64,
    pub sentiment: SentimentLabel,
    pub timestamp: DateTime<Utc>,
    /// Excerpt of the scored message, capped at 100 characters.
    pub message: String,
}

/// Derive an NPS prediction from message text and a sentiment result.
///
/// Base score by label (positive 8, neutral 5, negative 2), shifted by a
/// confidence adjustment of `(confidence - 0.5) * 2` and by the keyword
/// scorer's content adjustment, then clamped to [0, 10] and rounded.
pub fn predict(message: &str, sentiment: &SentimentResult, thresholds: &Thresholds) -> NpsPrediction {
    let base: f64 = match sentiment.sentiment {
        SentimentLabel::Positive => 8.0,
        SentimentLabel::Neutral => 5.0,
        SentimentLabel::Negative => 2.0,
    };

    let confidence = sentiment.confidence_scores.get(sentiment.sentiment);
    let confidence_adjustment = (confidence - 0.5) * 2.0;
    let content_adjustment = keywords::content_adjustment(message);

    let score = (base + confidence_adjustment + content_adjustment)
        .clamp(0.0, 10.0)
        .round() as u8;

    let customer_type = thresholds.classify(score);

    // Alignment indicator: full marks when the score lands in the band the
    // sentiment label implies, half otherwise.
    let alignment = match sentiment.sentiment {
        SentimentLabel::Positive if score >= 7 => 1.0,
        SentimentLabel::Negative if score <= 3 => 1.0,
        SentimentLabel::Neutral if (4..=6).contains(&score) => 1.0,
        _ => 0.5,
    };
    let accuracy = (confidence + alignment) / 2.0;

    NpsPrediction {
        nps_score: score,
        customer_type,
        accuracy,
        confidence,
        sentiment: sentiment.sentiment,
        timestamp: Utc::now(),
        message: excerpt(message),
    }
}

/// Share of the scale below the score, used as a detractor-risk signal for
/// real-time alerting.
pub fn detractor_risk(score: u8) -> f64 {
    f64::from(10 - score.min(10)) / 10.0
}

fn excerpt(message: &str) -> String {
    const MAX: usize = 100;
    if message.chars().count() > MAX {
        let head: String = message.chars().take(MAX).collect();
        format!("{head}...")
    } else {
        message.to_string()
    }
}
