//! Aggregation reporters: pure, stateless transforms over a collection of
//! chat log records and an explicit `now`. Nothing here touches the store
//! or holds state between calls.

use chrono::{DateTime, Datelike, Days, Duration, Utc};
use serde::Serialize;
use std::collections::BTreeMap;

use crate::chat::ChatLogRecord;
use crate::scoring::nps::CustomerType;
use crate::scoring::sentiment::SentimentLabel;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeRange {
    Day,
    Week,
    Month,
    Quarter,
}

impl TimeRange {
    /// Parse the query-string form; anything unrecognized falls back to 7d.
    pub fn parse(raw: &str) -> Self {
        match raw {
            "24h" => TimeRange::Day,
            "7d" => TimeRange::Week,
            "30d" => TimeRange::Month,
            "90d" => TimeRange::Quarter,
            _ => TimeRange::Week,
        }
    }

    pub fn start(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        match self {
            TimeRange::Day => now - Duration::hours(24),
            TimeRange::Week => now - Duration::days(7),
            TimeRange::Month => now - Duration::days(30),
            TimeRange::Quarter => now - Duration::days(90),
        }
    }
}

/// Rounded percentage of `part` in `total`; zero when the collection is
/// empty so dashboards render zeroed metrics instead of failing.
fn percent(part: usize, total: usize) -> i64 {
    if total == 0 {
        0
    } else {
        (part as f64 / total as f64 * 100.0).round() as i64
    }
}

fn count_type(records: &[ChatLogRecord], customer_type: CustomerType) -> usize {
    records
        .iter()
        .filter(|r| r.nps.customer_type == customer_type)
        .count()
}

fn count_sentiment(records: &[ChatLogRecord], label: SentimentLabel) -> usize {
    records.iter().filter(|r| r.sentiment.sentiment == label).count()
}

/// Records counting as "satisfied": positive sentiment or a Promoter
/// classification.
fn satisfied(records: &[ChatLogRecord]) -> usize {
    records
        .iter()
        .filter(|r| {
            r.sentiment.sentiment == SentimentLabel::Positive
                || r.nps.customer_type == CustomerType::Promoter
        })
        .count()
}

// ---------------------------------------------------------------------------
// Dashboard summary
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SentimentBreakdown {
    pub positive: usize,
    pub neutral: usize,
    pub negative: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardSummary {
    pub total_chats: usize,
    pub total_chats_today: usize,
    pub average_nps: i64,
    pub positive_sentiment: i64,
    pub detractors: usize,
    pub promoters: usize,
    pub customer_satisfaction: i64,
    pub sentiment_breakdown: SentimentBreakdown,
}

pub fn dashboard_summary(today: &[ChatLogRecord], total_chats: usize) -> DashboardSummary {
    let average_nps = if today.is_empty() {
        0
    } else {
        let sum: u64 = today.iter().map(|r| u64::from(r.nps.nps_score)).sum();
        (sum as f64 / today.len() as f64).round() as i64
    };

    DashboardSummary {
        total_chats,
        total_chats_today: today.len(),
        average_nps,
        positive_sentiment: percent(count_sentiment(today, SentimentLabel::Positive), today.len()),
        detractors: count_type(today, CustomerType::Detractor),
        promoters: count_type(today, CustomerType::Promoter),
        customer_satisfaction: percent(satisfied(today), today.len()),
        sentiment_breakdown: SentimentBreakdown {
            positive: count_sentiment(today, SentimentLabel::Positive),
            neutral: count_sentiment(today, SentimentLabel::Neutral),
            negative: count_sentiment(today, SentimentLabel::Negative),
        },
    }
}

// ---------------------------------------------------------------------------
// Manager dashboard
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ManagerMetrics {
    pub total_chats: usize,
    /// promoterRate% - detractorRate%. Not the canonical -100..100 NPS
    /// formula (neutrals stay in the denominator); trend consumers assume
    /// this exact definition.
    pub average_nps: i64,
    pub detractors: usize,
    pub promoters: usize,
    pub detractor_rate: i64,
    pub promoter_rate: i64,
    pub positive_sentiment: i64,
    pub neutral_sentiment: i64,
    pub negative_sentiment: i64,
    pub customer_satisfaction: i64,
}

pub fn manager_metrics(records: &[ChatLogRecord]) -> ManagerMetrics {
    let total = records.len();
    let detractors = count_type(records, CustomerType::Detractor);
    let promoters = count_type(records, CustomerType::Promoter);
    let detractor_rate = percent(detractors, total);
    let promoter_rate = percent(promoters, total);
    let positive_sentiment = percent(count_sentiment(records, SentimentLabel::Positive), total);

    ManagerMetrics {
        total_chats: total,
        average_nps: promoter_rate - detractor_rate,
        detractors,
        promoters,
        detractor_rate,
        promoter_rate,
        positive_sentiment,
        neutral_sentiment: percent(count_sentiment(records, SentimentLabel::Neutral), total),
        negative_sentiment: percent(count_sentiment(records, SentimentLabel::Negative), total),
        customer_satisfaction: ((positive_sentiment + promoter_rate) as f64 / 2.0).round() as i64,
    }
}

// ---------------------------------------------------------------------------
// Trend series
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TrendPoint {
    pub date: String,
    pub nps: i64,
    pub detractors: usize,
    pub promoters: usize,
    pub total_chats: usize,
}

/// Bucket records by hour (24h), day (7d/30d) or week starting Sunday
/// (90d) and compute a per-bucket nps of promoter count minus detractor
/// count, sorted ascending by bucket key.
pub fn nps_trends(records: &[ChatLogRecord], range: TimeRange) -> Vec<TrendPoint> {
    let mut buckets: BTreeMap<String, Vec<&ChatLogRecord>> = BTreeMap::new();
    for record in records {
        buckets
            .entry(bucket_key(record.timestamp, range))
            .or_default()
            .push(record);
    }

    buckets
        .into_iter()
        .map(|(date, chats)| {
            let detractors = chats
                .iter()
                .filter(|r| r.nps.customer_type == CustomerType::Detractor)
                .count();
            let promoters = chats
                .iter()
                .filter(|r| r.nps.customer_type == CustomerType::Promoter)
                .count();
            TrendPoint {
                date,
                nps: promoters as i64 - detractors as i64,
                detractors,
                promoters,
                total_chats: chats.len(),
            }
        })
        .collect()
}

fn bucket_key(timestamp: DateTime<Utc>, range: TimeRange) -> String {
    match range {
        TimeRange::Day => timestamp.format("%Y-%m-%dT%H:00:00").to_string(),
        TimeRange::Week | TimeRange::Month => timestamp.format("%Y-%m-%d").to_string(),
        TimeRange::Quarter => {
            let days_into_week = timestamp.weekday().num_days_from_sunday();
            let week_start = timestamp.date_naive() - Days::new(u64::from(days_into_week));
            week_start.format("%Y-%m-%d").to_string()
        }
    }
}

// ---------------------------------------------------------------------------
// Team performance
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentPerformance {
    pub id: String,
    pub name: String,
    pub role: &'static str,
    pub total_chats: usize,
    pub average_nps: i64,
    pub satisfaction: i64,
    pub detractors: usize,
    pub promoters: usize,
    pub last_active: DateTime<Utc>,
}

/// Per-agent breakdown, sorted descending by satisfaction + nps. Agents
/// are grouped by name; records without an agent land under
/// "Unknown Agent".
pub fn team_performance(records: &[ChatLogRecord]) -> Vec<AgentPerformance> {
    let mut by_agent: BTreeMap<&str, Vec<&ChatLogRecord>> = BTreeMap::new();
    for record in records {
        let agent = if record.agent.is_empty() {
            "Unknown Agent"
        } else {
            record.agent.as_str()
        };
        by_agent.entry(agent).or_default().push(record);
    }

    let mut team: Vec<AgentPerformance> = by_agent
        .into_iter()
        .enumerate()
        .map(|(index, (name, chats))| {
            let detractors = chats
                .iter()
                .filter(|r| r.nps.customer_type == CustomerType::Detractor)
                .count();
            let promoters = chats
                .iter()
                .filter(|r| r.nps.customer_type == CustomerType::Promoter)
                .count();
            let satisfied = chats
                .iter()
                .filter(|r| {
                    r.sentiment.sentiment == SentimentLabel::Positive
                        || r.nps.customer_type == CustomerType::Promoter
                })
                .count();
            let satisfaction = percent(satisfied, chats.len());
            let last_active = chats
                .iter()
                .map(|r| r.timestamp)
                .max()
                .unwrap_or_else(Utc::now);

            AgentPerformance {
                id: format!("agent-{}", index + 1),
                name: name.to_string(),
                role: tier(satisfaction, chats.len()),
                total_chats: chats.len(),
                average_nps: promoters as i64 - detractors as i64,
                satisfaction,
                detractors,
                promoters,
                last_active,
            }
        })
        .collect();

    team.sort_by_key(|agent| std::cmp::Reverse(agent.satisfaction + agent.average_nps));
    team
}

fn tier(satisfaction: i64, chats: usize) -> &'static str {
    if satisfaction >= 90 && chats >= 20 {
        "Senior Agent"
    } else if chats < 5 {
        "Trainee"
    } else {
        "Agent"
    }
}

// ---------------------------------------------------------------------------
// Recommendations
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Recommendation {
    pub id: String,
    pub title: &'static str,
    pub description: String,
    pub sentiment: SentimentLabel,
    pub nps_type: CustomerType,
    pub confidence: f64,
    pub impact: &'static str,
    pub actions: &'static [&'static str],
    pub chat_id: String,
    pub timestamp: DateTime<Utc>,
}

/// Rule-based advisory generator over the record collection (expected
/// newest-first), capped at 10 entries. Purely a rule lookup; there is no
/// learning here.
pub fn recommendations(records: &[ChatLogRecord], now: DateTime<Utc>) -> Vec<Recommendation> {
    let mut out = Vec::new();

    let detractors: Vec<&ChatLogRecord> = records
        .iter()
        .filter(|r| r.nps.customer_type == CustomerType::Detractor)
        .collect();
    let negative = count_sentiment(records, SentimentLabel::Negative);
    let has_promoters = records
        .iter()
        .any(|r| r.nps.customer_type == CustomerType::Promoter);

    for (index, chat) in detractors.iter().take(3).enumerate() {
        out.push(Recommendation {
            id: format!("detractor-{}", index + 1),
            title: "Immediate Detractor Follow-up Required",
            description: format!(
                "Customer \"{}\" expressed dissatisfaction. Immediate intervention needed to prevent churn.",
                chat.customer
            ),
            sentiment: SentimentLabel::Negative,
            nps_type: CustomerType::Detractor,
            confidence: 0.95,
            impact: "High",
            actions: &[
                "Schedule immediate follow-up call",
                "Offer personalized solution or compensation",
                "Escalate to senior management if needed",
                "Document resolution steps for future reference",
            ],
            chat_id: chat.id.clone(),
            timestamp: chat.timestamp,
        });
    }

    if negative > 2 {
        out.push(Recommendation {
            id: "negative-pattern".to_string(),
            title: "Negative Sentiment Trend Detected",
            description: "Multiple customers showing negative sentiment. Review common issues and improve processes.".to_string(),
            sentiment: SentimentLabel::Negative,
            nps_type: CustomerType::Detractor,
            confidence: 0.85,
            impact: "Medium",
            actions: &[
                "Analyze common complaint themes",
                "Review agent training materials",
                "Implement proactive customer outreach",
                "Update FAQ and knowledge base",
            ],
            chat_id: "pattern-analysis".to_string(),
            timestamp: now,
        });
    }

    if has_promoters {
        out.push(Recommendation {
            id: "promoter-opportunity".to_string(),
            title: "Promoter Engagement Opportunity",
            description: "Several satisfied customers identified. Perfect time to request testimonials and referrals.".to_string(),
            sentiment: SentimentLabel::Positive,
            nps_type: CustomerType::Promoter,
            confidence: 0.90,
            impact: "Medium",
            actions: &[
                "Request customer testimonials",
                "Ask for referrals to similar businesses",
                "Invite to case study participation",
                "Offer early access to new features",
            ],
            chat_id: "promoter-outreach".to_string(),
            timestamp: now,
        });
    }

    out.push(Recommendation {
        id: "response-time".to_string(),
        title: "Response Time Optimization",
        description: "Average response times could be improved. Consider implementing automated responses for common queries.".to_string(),
        sentiment: SentimentLabel::Neutral,
        nps_type: CustomerType::Neutral,
        confidence: 0.75,
        impact: "Medium",
        actions: &[
            "Implement chatbot for common questions",
            "Create response templates",
            "Set up automated acknowledgments",
            "Train agents on quick resolution techniques",
        ],
        chat_id: "response-optimization".to_string(),
        timestamp: now,
    });

    out.push(Recommendation {
        id: "proactive-support".to_string(),
        title: "Proactive Customer Support",
        description: "Implement proactive outreach to customers who haven't contacted support recently.".to_string(),
        sentiment: SentimentLabel::Neutral,
        nps_type: CustomerType::Neutral,
        confidence: 0.70,
        impact: "Low",
        actions: &[
            "Create customer health scoring system",
            "Schedule regular check-in calls",
            "Send satisfaction surveys",
            "Monitor usage patterns for early warning signs",
        ],
        chat_id: "proactive-outreach".to_string(),
        timestamp: now,
    });

    out.truncate(10);
    out
}

/// Canned agent guidance for the real-time AI popup, keyed off the
/// sentiment label.
pub fn suggested_response(label: SentimentLabel) -> (&'static str, &'static str) {
    match label {
        SentimentLabel::Negative => (
            "I'm really sorry about this experience. Let me take ownership of the issue and walk you through exactly how we'll fix it.",
            "Conversation trending negative. Lead with empathy and clarify concrete resolution steps.",
        ),
        SentimentLabel::Neutral => (
            "Thanks for reaching out. Could you share a bit more detail so I can resolve this for you in one go?",
            "Customer is neutral. Probe for the underlying need before it turns into frustration.",
        ),
        SentimentLabel::Positive => (
            "That's great to hear! Is there anything else I can help you with today?",
            "Customer is satisfied. Close the loop and consider inviting feedback or a referral.",
        ),
    }
}
