use serde::{Deserialize, Serialize};
use std::fmt;

use crate::provider::{ClassifyError, RemoteProvider};
use crate::scoring::keywords;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SentimentLabel {
    Positive,
    Neutral,
    Negative,
}

impl SentimentLabel {
    pub fn as_str(&self) -> &'static str {
        match self {
            SentimentLabel::Positive => "positive",
            SentimentLabel::Neutral => "neutral",
            SentimentLabel::Negative => "negative",
        }
    }
}

impl fmt::Display for SentimentLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Probability assigned to each label. Values are each in [0, 1] and sum
/// to ~1 when built through [`ConfidenceScores::for_label`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ConfidenceScores {
    pub positive: f64,
    pub neutral: f64,
    pub negative: f64,
}

impl ConfidenceScores {
    /// The chosen label carries the raw confidence; the other two labels
    /// split the remainder evenly.
    pub fn for_label(label: SentimentLabel, confidence: f64) -> Self {
        let other = (1.0 - confidence) / 2.0;
        match label {
            SentimentLabel::Positive => Self {
                positive: confidence,
                neutral: other,
                negative: other,
            },
            SentimentLabel::Neutral => Self {
                positive: other,
                neutral: confidence,
                negative: other,
            },
            SentimentLabel::Negative => Self {
                positive: other,
                neutral: other,
                negative: confidence,
            },
        }
    }

    pub fn get(&self, label: SentimentLabel) -> f64 {
        match label {
            SentimentLabel::Positive => self.positive,
            SentimentLabel::Neutral => self.neutral,
            SentimentLabel::Negative => self.negative,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", from = "RawSentiment")]
pub struct SentimentResult {
    pub sentiment: SentimentLabel,
    pub confidence_scores: ConfidenceScores,
    pub confidence: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reasoning: Option<String>,
}

impl SentimentResult {
    pub fn new(label: SentimentLabel, confidence: f64, reasoning: Option<String>) -> Self {
        let confidence = confidence.clamp(0.0, 1.0);
        Self {
            sentiment: label,
            confidence_scores: ConfidenceScores::for_label(label, confidence),
            confidence,
            reasoning,
        }
    }
}

/// Lenient wire form: callers may send just a label, or a label plus either
/// the distribution or a scalar confidence. Anything missing is rebuilt so
/// the rest of the pipeline always sees a full distribution.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawSentiment {
    sentiment: SentimentLabel,
    confidence_scores: Option<ConfidenceScores>,
    confidence: Option<f64>,
    reasoning: Option<String>,
}

impl From<RawSentiment> for SentimentResult {
    fn from(raw: RawSentiment) -> Self {
        let confidence = raw
            .confidence_scores
            .map(|scores| scores.get(raw.sentiment))
            .or(raw.confidence)
            .unwrap_or(0.5)
            .clamp(0.0, 1.0);

        match raw.confidence_scores {
            Some(scores) => Self {
                sentiment: raw.sentiment,
                confidence_scores: scores,
                confidence,
                reasoning: raw.reasoning,
            },
            None => Self::new(raw.sentiment, confidence, raw.reasoning),
        }
    }
}

/// Offline heuristic: label from the keyword scorer's sign, confidence
/// synthesized from the adjustment magnitude (0.5 at zero up to 1.0 at the
/// clamp boundary).
pub fn classify_local(text: &str) -> SentimentResult {
    let adjustment = keywords::content_adjustment(text);

    let label = if adjustment > 0.0 {
        SentimentLabel::Positive
    } else if adjustment < 0.0 {
        SentimentLabel::Negative
    } else {
        SentimentLabel::Neutral
    };

    let confidence = 0.5 + adjustment.abs().min(2.0) / 4.0;
    SentimentResult::new(label, confidence, Some("local keyword heuristic".to_string()))
}

/// The two interchangeable classification strategies. Remote delegates to
/// an external completion service and propagates its failures; Local never
/// fails.
pub enum SentimentClassifier {
    Remote(RemoteProvider),
    Local,
}

impl SentimentClassifier {
    pub async fn classify(&self, text: &str) -> Result<SentimentResult, ClassifyError> {
        match self {
            SentimentClassifier::Remote(provider) => provider.classify(text).await,
            SentimentClassifier::Local => Ok(classify_local(text)),
        }
    }

    pub fn is_remote(&self) -> bool {
        matches!(self, SentimentClassifier::Remote(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_distribution_valid(scores: &ConfidenceScores) {
        let sum = scores.positive + scores.neutral + scores.negative;
        assert!((sum - 1.0).abs() < 1e-9, "scores sum to {sum}");
        for value in [scores.positive, scores.neutral, scores.negative] {
            assert!((0.0..=1.0).contains(&value));
        }
    }

    #[test]
    fn chosen_label_carries_raw_confidence() {
        let scores = ConfidenceScores::for_label(SentimentLabel::Positive, 0.9);
        assert_eq!(scores.positive, 0.9);
        assert!((scores.neutral - 0.05).abs() < 1e-9);
        assert!((scores.negative - 0.05).abs() < 1e-9);
        assert_distribution_valid(&scores);
    }

    #[test]
    fn distribution_valid_across_labels_and_confidences() {
        for label in [
            SentimentLabel::Positive,
            SentimentLabel::Neutral,
            SentimentLabel::Negative,
        ] {
            for i in 0..=10 {
                let scores = ConfidenceScores::for_label(label, i as f64 / 10.0);
                assert_distribution_valid(&scores);
            }
        }
    }

    #[test]
    fn local_heuristic_follows_keyword_sign() {
        let positive = classify_local("This is amazing, I love it!");
        assert_eq!(positive.sentiment, SentimentLabel::Positive);
        assert_eq!(positive.confidence, 0.75);

        let negative = classify_local("Worst service ever, totally broken");
        assert_eq!(negative.sentiment, SentimentLabel::Negative);
        assert_eq!(negative.confidence, 0.75);

        let neutral = classify_local("the order arrived on tuesday");
        assert_eq!(neutral.sentiment, SentimentLabel::Neutral);
        assert_eq!(neutral.confidence, 0.5);
    }

    #[test]
    fn deserializes_without_distribution() {
        let result: SentimentResult =
            serde_json::from_str(r#"{"sentiment": "negative", "confidence": 0.8}"#).unwrap();
        assert_eq!(result.sentiment, SentimentLabel::Negative);
        assert_eq!(result.confidence, 0.8);
        assert_eq!(result.confidence_scores.negative, 0.8);
        assert_distribution_valid(&result.confidence_scores);
    }

    #[test]
    fn deserializes_with_distribution_preferring_label_score() {
        let json = r#"{
            "sentiment": "positive",
            "confidenceScores": {"positive": 0.7, "neutral": 0.2, "negative": 0.1},
            "confidence": 0.99
        }"#;
        let result: SentimentResult = serde_json::from_str(json).unwrap();
        // The label's entry in the distribution wins over the scalar field.
        assert_eq!(result.confidence, 0.7);
    }

    #[test]
    fn bare_label_defaults_to_half_confidence() {
        let result: SentimentResult = serde_json::from_str(r#"{"sentiment": "neutral"}"#).unwrap();
        assert_eq!(result.confidence, 0.5);
        assert_distribution_valid(&result.confidence_scores);
    }
}
