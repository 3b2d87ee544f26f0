//! Remote sentiment strategy: delegates classification to an
//! OpenAI-compatible chat-completions endpoint and parses the structured
//! reply, falling back to regex extraction when the model returns
//! something that is not quite JSON.

use regex::Regex;
use serde::Deserialize;
use std::sync::OnceLock;
use thiserror::Error;
use tracing::{debug, warn};

use crate::scoring::nps::CustomerType;
use crate::scoring::sentiment::{SentimentLabel, SentimentResult};

#[derive(Debug, Error)]
pub enum ClassifyError {
    #[error("sentiment provider request failed: {0}")]
    Upstream(#[from] reqwest::Error),
    #[error("sentiment provider returned status {0}")]
    Status(reqwest::StatusCode),
    #[error("sentiment provider returned no choices")]
    EmptyReply,
}

const SYSTEM_PROMPT: &str = r#"You are an expert sentiment analysis AI. Analyze the sentiment of customer messages and classify them as:
- "positive": Happy, satisfied, pleased, excited, grateful
- "negative": Angry, frustrated, disappointed, upset, annoyed
- "neutral": Neither positive nor negative, factual, indifferent

Respond with a JSON object containing:
{
  "sentiment": "positive|negative|neutral",
  "confidence": 0.0-1.0,
  "reasoning": "brief explanation"
}"#;

const NPS_SYSTEM_PROMPT: &str = r#"You are an expert NPS (Net Promoter Score) classifier trained on customer service interactions.

Based on customer messages and their sentiment, classify customers into three categories:

DETRACTOR (0-6): Customers who are unhappy, frustrated, or likely to spread negative word-of-mouth
- Indicators: Complaints, anger, frustration, disappointment, threats to leave, negative language
- Examples: "This is terrible", "I'm never using this again", "Worst service ever", "I want a refund"

PROMOTER (9-10): Customers who are highly satisfied and likely to recommend your service
- Indicators: Praise, satisfaction, recommendations, positive language, loyalty
- Examples: "Amazing service", "I'll definitely recommend this", "Love it", "Perfect solution"

NEUTRAL (7-8): Customers who are satisfied but not enthusiastic, neither detractors nor promoters
- Indicators: Neutral language, basic satisfaction, no strong emotions either way
- Examples: "It's okay", "Works fine", "No complaints", "Average service"

Respond with a JSON object:
{
  "customerType": "DETRACTOR|PROMOTER|NEUTRAL",
  "npsScore": 0-10,
  "confidence": 0.0-1.0,
  "reasoning": "explanation of classification",
  "keywords": ["key", "words", "that", "influenced", "decision"]
}"#;

pub struct RemoteProvider {
    client: reqwest::Client,
    endpoint: String,
    api_key: String,
    model: String,
}

impl RemoteProvider {
    pub fn new(endpoint: impl Into<String>, api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint: endpoint.into(),
            api_key: api_key.into(),
            model: model.into(),
        }
    }

    /// Ask the completion service to classify `text`. Transport failures
    /// and empty replies are propagated; malformed reply content is not,
    /// since [`parse_reply`] always produces a usable result.
    pub async fn classify(&self, text: &str) -> Result<SentimentResult, ClassifyError> {
        let user = format!("Analyze the sentiment of this customer message: \"{text}\"");
        let content = self.complete(SYSTEM_PROMPT, &user, 200).await?;
        Ok(parse_reply(&content))
    }

    /// Ask the completion service for a direct NPS classification of a
    /// message given its sentiment. Same failure contract as
    /// [`RemoteProvider::classify`].
    pub async fn classify_nps(
        &self,
        message: &str,
        sentiment: &SentimentResult,
    ) -> Result<NpsReply, ClassifyError> {
        let user = format!(
            "Classify this customer message:\nMessage: \"{message}\"\nSentiment: {} (confidence: {})\n\nWhat is the NPS classification?",
            sentiment.sentiment, sentiment.confidence
        );
        let content = self.complete(NPS_SYSTEM_PROMPT, &user, 300).await?;
        Ok(parse_nps_reply(&content))
    }

    async fn complete(
        &self,
        system: &str,
        user: &str,
        max_tokens: u32,
    ) -> Result<String, ClassifyError> {
        let body = serde_json::json!({
            "model": self.model,
            "temperature": 0.1,
            "max_tokens": max_tokens,
            "messages": [
                { "role": "system", "content": system },
                { "role": "user", "content": user },
            ],
        });

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(ClassifyError::Status(status));
        }

        let completion: ChatCompletion = response.json().await?;
        let content = completion
            .choices
            .into_iter()
            .next()
            .map(|choice| choice.message.content)
            .ok_or(ClassifyError::EmptyReply)?;

        debug!("provider reply: {content}");
        Ok(content)
    }
}

#[derive(Deserialize)]
struct ChatCompletion {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    content: String,
}

#[derive(Deserialize)]
struct RawAnalysis {
    sentiment: String,
    confidence: Option<f64>,
    reasoning: Option<String>,
}

/// Turn the model's reply content into a [`SentimentResult`]. Proper JSON
/// is preferred; otherwise the `sentiment` and `confidence` fields are
/// regex-extracted, defaulting to neutral at 0.5 if absent.
fn parse_reply(content: &str) -> SentimentResult {
    let raw = serde_json::from_str::<RawAnalysis>(content).unwrap_or_else(|err| {
        warn!("malformed sentiment reply, falling back to regex extraction: {err}");
        fallback_extract(content)
    });

    let label = match raw.sentiment.to_lowercase().as_str() {
        "positive" => SentimentLabel::Positive,
        "negative" => SentimentLabel::Negative,
        _ => SentimentLabel::Neutral,
    };
    let confidence = raw.confidence.unwrap_or(0.5).clamp(0.0, 1.0);

    SentimentResult::new(label, confidence, raw.reasoning)
}

/// Validated NPS classification from the completion service.
#[derive(Debug, Clone, PartialEq)]
pub struct NpsReply {
    pub customer_type: CustomerType,
    pub nps_score: u8,
    pub confidence: f64,
    pub reasoning: String,
    pub keywords: Vec<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawNpsAnalysis {
    customer_type: Option<String>,
    nps_score: Option<f64>,
    confidence: Option<f64>,
    reasoning: Option<String>,
    keywords: Option<Vec<String>>,
}

/// Normalize the model's NPS reply: JSON when possible, regex extraction
/// otherwise, with everything clamped and defaulted (NEUTRAL, 5, 0.5).
fn parse_nps_reply(content: &str) -> NpsReply {
    let raw = serde_json::from_str::<RawNpsAnalysis>(content).unwrap_or_else(|err| {
        warn!("malformed NPS reply, falling back to regex extraction: {err}");
        fallback_extract_nps(content)
    });

    let customer_type = match raw.customer_type.as_deref() {
        Some("DETRACTOR") => CustomerType::Detractor,
        Some("PROMOTER") => CustomerType::Promoter,
        _ => CustomerType::Neutral,
    };

    NpsReply {
        customer_type,
        nps_score: raw.nps_score.unwrap_or(5.0).clamp(0.0, 10.0).round() as u8,
        confidence: raw.confidence.unwrap_or(0.5).clamp(0.0, 1.0),
        reasoning: raw
            .reasoning
            .unwrap_or_else(|| "AI classification".to_string()),
        keywords: raw.keywords.unwrap_or_default(),
    }
}

fn fallback_extract_nps(content: &str) -> RawNpsAnalysis {
    static TYPE_RE: OnceLock<Regex> = OnceLock::new();
    static SCORE_RE: OnceLock<Regex> = OnceLock::new();
    static CONFIDENCE_RE: OnceLock<Regex> = OnceLock::new();

    let type_re = TYPE_RE.get_or_init(|| {
        Regex::new(r#""customerType":\s*"(DETRACTOR|PROMOTER|NEUTRAL)""#).unwrap()
    });
    let score_re = SCORE_RE.get_or_init(|| Regex::new(r#""npsScore":\s*([0-9]+)"#).unwrap());
    let confidence_re =
        CONFIDENCE_RE.get_or_init(|| Regex::new(r#""confidence":\s*([0-9.]+)"#).unwrap());

    RawNpsAnalysis {
        customer_type: type_re.captures(content).map(|caps| caps[1].to_string()),
        nps_score: score_re
            .captures(content)
            .and_then(|caps| caps[1].parse::<f64>().ok()),
        confidence: confidence_re
            .captures(content)
            .and_then(|caps| caps[1].parse::<f64>().ok()),
        reasoning: Some("Fallback parsing used".to_string()),
        keywords: None,
    }
}

fn fallback_extract(content: &str) -> RawAnalysis {
    static SENTIMENT_RE: OnceLock<Regex> = OnceLock::new();
    static CONFIDENCE_RE: OnceLock<Regex> = OnceLock::new();

    let sentiment_re = SENTIMENT_RE
        .get_or_init(|| Regex::new(r#""sentiment":\s*"(positive|negative|neutral)""#).unwrap());
    let confidence_re =
        CONFIDENCE_RE.get_or_init(|| Regex::new(r#""confidence":\s*([0-9.]+)"#).unwrap());

    let sentiment = sentiment_re
        .captures(content)
        .map(|caps| caps[1].to_string())
        .unwrap_or_else(|| "neutral".to_string());
    let confidence = confidence_re
        .captures(content)
        .and_then(|caps| caps[1].parse::<f64>().ok());

    RawAnalysis {
        sentiment,
        confidence,
        reasoning: Some("Fallback parsing used".to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_well_formed_reply() {
        let reply = r#"{"sentiment": "positive", "confidence": 0.92, "reasoning": "praise"}"#;
        let result = parse_reply(reply);
        assert_eq!(result.sentiment, SentimentLabel::Positive);
        assert_eq!(result.confidence, 0.92);
        assert_eq!(result.reasoning.as_deref(), Some("praise"));
    }

    #[test]
    fn extracts_fields_from_malformed_reply() {
        let reply = r#"Here is my analysis: "sentiment": "negative", "confidence": 0.8 -- done"#;
        let result = parse_reply(reply);
        assert_eq!(result.sentiment, SentimentLabel::Negative);
        assert_eq!(result.confidence, 0.8);
        assert_eq!(result.reasoning.as_deref(), Some("Fallback parsing used"));
    }

    #[test]
    fn unusable_reply_defaults_to_neutral() {
        let result = parse_reply("I cannot help with that.");
        assert_eq!(result.sentiment, SentimentLabel::Neutral);
        assert_eq!(result.confidence, 0.5);
    }

    #[test]
    fn out_of_range_confidence_is_clamped() {
        let reply = r#"{"sentiment": "positive", "confidence": 7.5}"#;
        let result = parse_reply(reply);
        assert_eq!(result.confidence, 1.0);
    }

    #[test]
    fn parses_well_formed_nps_reply() {
        let reply = r#"{
            "customerType": "PROMOTER",
            "npsScore": 9,
            "confidence": 0.88,
            "reasoning": "strong praise",
            "keywords": ["amazing", "recommend"]
        }"#;
        let result = parse_nps_reply(reply);
        assert_eq!(result.customer_type, CustomerType::Promoter);
        assert_eq!(result.nps_score, 9);
        assert_eq!(result.confidence, 0.88);
        assert_eq!(result.keywords, vec!["amazing", "recommend"]);
    }

    #[test]
    fn extracts_nps_fields_from_malformed_reply() {
        let reply =
            r#"Classification: "customerType": "DETRACTOR", "npsScore": 2, "confidence": 0.9 -- done"#;
        let result = parse_nps_reply(reply);
        assert_eq!(result.customer_type, CustomerType::Detractor);
        assert_eq!(result.nps_score, 2);
        assert_eq!(result.confidence, 0.9);
        assert_eq!(result.reasoning, "Fallback parsing used");
        assert!(result.keywords.is_empty());
    }

    #[test]
    fn unusable_nps_reply_defaults_to_neutral_midpoint() {
        let result = parse_nps_reply("I cannot classify that.");
        assert_eq!(result.customer_type, CustomerType::Neutral);
        assert_eq!(result.nps_score, 5);
        assert_eq!(result.confidence, 0.5);
    }

    #[test]
    fn out_of_range_nps_score_is_clamped() {
        let reply = r#"{"customerType": "PROMOTER", "npsScore": 42, "confidence": 0.9}"#;
        let result = parse_nps_reply(reply);
        assert_eq!(result.nps_score, 10);
    }
}
