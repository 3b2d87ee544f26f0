use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use sqlx::{sqlite::SqliteConnectOptions, ConnectOptions, Row, SqlitePool};
use std::{path::Path, str::FromStr};
use tracing::error;

use crate::chat::ChatLogRecord;
use crate::scoring::nps::NpsPrediction;
use uuid::Uuid;

#[derive(Debug, Default, Clone)]
pub struct HistoryFilter {
    pub limit: i64,
    pub offset: i64,
    pub customer: Option<String>,
    pub agent: Option<String>,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
}

#[derive(Clone, Debug)]
pub struct Store {
    pool: SqlitePool,
}

impl Store {
    /// Create a new Store instance.
    /// This will automatically create the database file if it doesn't exist.
    pub async fn new(db_path: impl AsRef<Path>) -> Result<Self> {
        let db_path = db_path.as_ref();

        // Ensure the parent directory exists
        if let Some(parent) = db_path.parent() {
            if !parent.exists() {
                std::fs::create_dir_all(parent).context("Failed to create database directory")?;
            }
        }

        let db_url = format!("sqlite://{}", db_path.to_string_lossy());

        let options = SqliteConnectOptions::from_str(&db_url)?
            .create_if_missing(true)
            .log_statements(tracing::log::LevelFilter::Trace);

        let pool = SqlitePool::connect_with(options)
            .await
            .context("Failed to connect to SQLite database")?;

        Ok(Self { pool })
    }

    /// In-memory store for tests. A single connection is required: every
    /// new `:memory:` connection would otherwise get its own empty database.
    #[cfg(test)]
    pub async fn in_memory() -> Result<Self> {
        let pool = sqlx::sqlite::SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .context("Failed to open in-memory database")?;
        let store = Self { pool };
        store.init().await?;
        Ok(store)
    }

    /// Initialize the database schema.
    pub async fn init(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS chat_logs (
                id TEXT PRIMARY KEY,
                customer TEXT NOT NULL,
                agent TEXT NOT NULL,
                user_message TEXT NOT NULL,
                agent_response TEXT NOT NULL,
                sentiment TEXT NOT NULL,
                nps TEXT NOT NULL,
                timestamp DATETIME NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_chat_logs_timestamp ON chat_logs(timestamp DESC);
            CREATE INDEX IF NOT EXISTS idx_chat_logs_agent ON chat_logs(agent);

            CREATE TABLE IF NOT EXISTS nps_predictions (
                id TEXT PRIMARY KEY,
                nps_score INTEGER NOT NULL,
                customer_type TEXT NOT NULL,
                accuracy REAL NOT NULL,
                confidence REAL NOT NULL,
                sentiment TEXT NOT NULL,
                message TEXT NOT NULL,
                timestamp DATETIME NOT NULL
            );
            "#,
        )
        .execute(&self.pool)
        .await
        .context("Failed to initialize database schema")?;

        Ok(())
    }

    pub async fn ping(&self) -> Result<()> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .context("Database ping failed")?;
        Ok(())
    }

    /// Save a chat log record.
    pub async fn save_log(&self, record: &ChatLogRecord) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO chat_logs (id, customer, agent, user_message, agent_response, sentiment, nps, timestamp)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&record.id)
        .bind(&record.customer)
        .bind(&record.agent)
        .bind(&record.user_message)
        .bind(&record.agent_response)
        .bind(serde_json::to_string(&record.sentiment)?)
        .bind(serde_json::to_string(&record.nps)?)
        .bind(record.timestamp)
        .execute(&self.pool)
        .await
        .context("Failed to save chat log")?;

        Ok(())
    }

    /// Save a standalone prediction document.
    pub async fn save_prediction(&self, prediction: &NpsPrediction) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO nps_predictions (id, nps_score, customer_type, accuracy, confidence, sentiment, message, timestamp)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(format!("nps-{}", Uuid::new_v4()))
        .bind(i64::from(prediction.nps_score))
        .bind(format!("{:?}", prediction.customer_type))
        .bind(prediction.accuracy)
        .bind(prediction.confidence)
        .bind(prediction.sentiment.as_str())
        .bind(&prediction.message)
        .bind(prediction.timestamp)
        .execute(&self.pool)
        .await
        .context("Failed to save prediction")?;

        Ok(())
    }

    /// Best-effort write: storage failures are logged and swallowed so
    /// they never alter the outcome of the prediction call that produced
    /// the document.
    pub async fn save_prediction_best_effort(&self, prediction: &NpsPrediction) {
        if let Err(e) = self.save_prediction(prediction).await {
            error!("Failed to store prediction: {e:#}");
        }
    }

    /// Retrieve chat logs, newest first, with optional filters.
    pub async fn history(&self, filter: &HistoryFilter) -> Result<Vec<ChatLogRecord>> {
        let mut sql = String::from(
            "SELECT id, customer, agent, user_message, agent_response, sentiment, nps, timestamp \
             FROM chat_logs WHERE 1=1",
        );
        if filter.customer.is_some() {
            sql.push_str(" AND customer = ?");
        }
        if filter.agent.is_some() {
            sql.push_str(" AND agent = ?");
        }
        if filter.start_date.is_some() {
            sql.push_str(" AND timestamp >= ?");
        }
        if filter.end_date.is_some() {
            sql.push_str(" AND timestamp <= ?");
        }
        sql.push_str(" ORDER BY timestamp DESC LIMIT ? OFFSET ?");

        let mut query = sqlx::query(&sql);
        if let Some(customer) = &filter.customer {
            query = query.bind(customer);
        }
        if let Some(agent) = &filter.agent {
            query = query.bind(agent);
        }
        if let Some(start) = filter.start_date {
            query = query.bind(start);
        }
        if let Some(end) = filter.end_date {
            query = query.bind(end);
        }
        query = query.bind(filter.limit).bind(filter.offset);

        let rows = query
            .fetch_all(&self.pool)
            .await
            .context("Failed to fetch chat history")?;

        rows.into_iter().map(row_to_record).collect()
    }

    /// All records with timestamp in [start, end], oldest first.
    pub async fn in_window(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<ChatLogRecord>> {
        let rows = sqlx::query(
            r#"
            SELECT id, customer, agent, user_message, agent_response, sentiment, nps, timestamp
            FROM chat_logs
            WHERE timestamp >= ? AND timestamp <= ?
            ORDER BY timestamp ASC
            "#,
        )
        .bind(start)
        .bind(end)
        .fetch_all(&self.pool)
        .await
        .context("Failed to fetch chat logs for window")?;

        rows.into_iter().map(row_to_record).collect()
    }

    /// All records, newest first (used by the recommendation generator).
    pub async fn all_desc(&self) -> Result<Vec<ChatLogRecord>> {
        let rows = sqlx::query(
            r#"
            SELECT id, customer, agent, user_message, agent_response, sentiment, nps, timestamp
            FROM chat_logs
            ORDER BY timestamp DESC
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .context("Failed to fetch chat logs")?;

        rows.into_iter().map(row_to_record).collect()
    }

    pub async fn count(&self) -> Result<usize> {
        let row = sqlx::query("SELECT COUNT(*) AS n FROM chat_logs")
            .fetch_one(&self.pool)
            .await
            .context("Failed to count chat logs")?;
        let n: i64 = row.try_get("n")?;
        Ok(n as usize)
    }
}

fn row_to_record(row: sqlx::sqlite::SqliteRow) -> Result<ChatLogRecord> {
    let sentiment_json: String = row.try_get("sentiment")?;
    let nps_json: String = row.try_get("nps")?;

    Ok(ChatLogRecord {
        id: row.try_get("id")?,
        customer: row.try_get("customer")?,
        agent: row.try_get("agent")?,
        user_message: row.try_get("user_message")?,
        agent_response: row.try_get("agent_response")?,
        sentiment: serde_json::from_str(&sentiment_json)
            .context("Malformed sentiment column")?,
        nps: serde_json::from_str(&nps_json).context("Malformed nps column")?,
        timestamp: row.try_get("timestamp")?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scoring::nps::{predict, Thresholds};
    use crate::scoring::sentiment::{SentimentLabel, SentimentResult};

    fn sample_record(customer: &str, agent: &str, text: &str) -> ChatLogRecord {
        let sentiment = SentimentResult::new(SentimentLabel::Positive, 0.9, None);
        let nps = predict(text, &sentiment, &Thresholds::default());
        ChatLogRecord::new(customer, agent, text, "glad to help", sentiment, nps)
    }

    #[tokio::test]
    async fn save_and_fetch_roundtrip() {
        let store = Store::in_memory().await.unwrap();
        let record = sample_record("dana", "alice", "amazing support");
        store.save_log(&record).await.unwrap();

        let fetched = store
            .history(&HistoryFilter {
                limit: 10,
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(fetched.len(), 1);
        assert_eq!(fetched[0].id, record.id);
        assert_eq!(fetched[0].sentiment, record.sentiment);
        assert_eq!(fetched[0].nps, record.nps);
    }

    #[tokio::test]
    async fn history_filters_by_agent() {
        let store = Store::in_memory().await.unwrap();
        store
            .save_log(&sample_record("dana", "alice", "great"))
            .await
            .unwrap();
        store
            .save_log(&sample_record("erik", "bob", "great"))
            .await
            .unwrap();

        let filter = HistoryFilter {
            limit: 10,
            agent: Some("bob".to_string()),
            ..Default::default()
        };
        let fetched = store.history(&filter).await.unwrap();
        assert_eq!(fetched.len(), 1);
        assert_eq!(fetched[0].agent, "bob");
    }

    #[tokio::test]
    async fn predictions_do_not_land_in_chat_logs() {
        let store = Store::in_memory().await.unwrap();
        let sentiment = SentimentResult::new(SentimentLabel::Negative, 0.8, None);
        let prediction = predict("broken again", &sentiment, &Thresholds::default());

        store.save_prediction(&prediction).await.unwrap();
        store.save_prediction_best_effort(&prediction).await;

        assert_eq!(store.count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn prediction_write_failure_is_swallowed() {
        let store = Store::in_memory().await.unwrap();
        let sentiment = SentimentResult::new(SentimentLabel::Negative, 0.8, None);
        let prediction = predict("broken again", &sentiment, &Thresholds::default());

        sqlx::query("DROP TABLE nps_predictions")
            .execute(&store.pool)
            .await
            .unwrap();

        assert!(store.save_prediction(&prediction).await.is_err());
        // Returns normally despite the missing table.
        store.save_prediction_best_effort(&prediction).await;
    }

    #[tokio::test]
    async fn count_tracks_saved_logs() {
        let store = Store::in_memory().await.unwrap();
        assert_eq!(store.count().await.unwrap(), 0);
        store
            .save_log(&sample_record("dana", "alice", "great"))
            .await
            .unwrap();
        assert_eq!(store.count().await.unwrap(), 1);
    }
}
