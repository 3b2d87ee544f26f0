use std::sync::Arc;

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{
        sse::{Event as SseEvent, KeepAlive, Sse},
        IntoResponse, Response,
    },
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, NaiveTime, Utc};
use futures::stream::Stream;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use thiserror::Error;
use tokio::sync::broadcast;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{error, info, warn};

use crate::bus::{Event, EventBus};
use crate::chat::{ChatLogRecord, ChatMessage, Sender};
use crate::config::Settings;
use crate::provider::{ClassifyError, NpsReply};
use crate::report::{self, TimeRange};
use crate::scoring::nps::{self, CustomerType, NpsPrediction, Thresholds};
use crate::scoring::sentiment::{SentimentClassifier, SentimentLabel, SentimentResult};
use crate::store::{HistoryFilter, Store};

// -----------------------------------------------------------------------------
// Error taxonomy
// -----------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum AppError {
    /// Missing or malformed request fields, surfaced precisely as 400.
    #[error("{0}")]
    Validation(String),

    /// The remote classification call failed or returned nothing usable.
    #[error("Failed to analyze sentiment")]
    Upstream(#[from] ClassifyError),

    /// Anything else, including store reads behind aggregation endpoints.
    #[error("Internal server error")]
    Internal(#[from] anyhow::Error),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, body) = match &self {
            AppError::Validation(message) => {
                (StatusCode::BAD_REQUEST, json!({ "error": message }))
            }
            AppError::Upstream(err) => {
                error!("Upstream classification failed: {err}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    json!({ "error": self.to_string(), "details": err.to_string() }),
                )
            }
            AppError::Internal(err) => {
                error!("Request failed: {err:#}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    json!({ "error": self.to_string(), "details": err.to_string() }),
                )
            }
        };
        (status, Json(body)).into_response()
    }
}

// -----------------------------------------------------------------------------
// State and router
// -----------------------------------------------------------------------------

pub struct AppState {
    pub store: Store,
    pub bus: Arc<EventBus>,
    pub classifier: SentimentClassifier,
    pub thresholds: Thresholds,
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/analyze-sentiment", post(analyze_sentiment))
        .route("/predict-nps", post(predict_nps))
        .route("/classify-nps", post(classify_nps))
        .route("/chat/message", post(chat_message))
        .route("/save-chat", post(save_chat))
        .route("/chat-history", get(chat_history))
        .route("/dashboard-data", get(dashboard_data))
        .route("/manager-dashboard", get(manager_dashboard))
        .route("/team-performance", get(team_performance))
        .route("/nps-trends", get(nps_trends))
        .route("/recommendations", get(recommendations))
        .route("/events", get(events))
        .route("/health", get(health))
        .with_state(state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

// -----------------------------------------------------------------------------
// Scoring endpoints
// -----------------------------------------------------------------------------

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct AnalyzeResponse {
    #[serde(flatten)]
    result: SentimentResult,
    text: String,
    timestamp: DateTime<Utc>,
}

async fn analyze_sentiment(
    State(state): State<Arc<AppState>>,
    Json(body): Json<Value>,
) -> Result<Json<AnalyzeResponse>, AppError> {
    let text = body
        .get("text")
        .and_then(Value::as_str)
        .ok_or_else(|| AppError::Validation("Text is required and must be a string".to_string()))?;

    let result = state.classifier.classify(text).await?;

    Ok(Json(AnalyzeResponse {
        result,
        text: truncate(text, 100),
        timestamp: Utc::now(),
    }))
}

async fn predict_nps(
    State(state): State<Arc<AppState>>,
    Json(body): Json<Value>,
) -> Result<Json<NpsPrediction>, AppError> {
    let message = body.get("message").and_then(Value::as_str);
    let sentiment = body
        .get("sentiment")
        .cloned()
        .and_then(|value| serde_json::from_value::<SentimentResult>(value).ok());

    let (message, sentiment) = match (message, sentiment) {
        (Some(message), Some(sentiment)) => (message, sentiment),
        _ => {
            return Err(AppError::Validation(
                "Message and sentiment data are required".to_string(),
            ))
        }
    };

    let prediction = nps::predict(message, &sentiment, &state.thresholds);

    // Fire-and-forget persistence: a storage failure never alters the
    // outcome of this call.
    let store = state.store.clone();
    let stored = prediction.clone();
    tokio::spawn(async move {
        store.save_prediction_best_effort(&stored).await;
    });

    info!(
        score = prediction.nps_score,
        customer_type = ?prediction.customer_type,
        "NPS prediction completed"
    );

    Ok(Json(prediction))
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ClassifyNpsResponse {
    customer_type: CustomerType,
    nps_score: u8,
    confidence: f64,
    accuracy: f64,
    reasoning: String,
    keywords: Vec<String>,
    sentiment: SentimentLabel,
    timestamp: DateTime<Utc>,
    message: String,
}

/// Model-driven NPS classification. With a remote provider this defers the
/// verdict to the model with its own prompt; without one it falls back to
/// the scoring heuristic so the endpoint stays available offline.
async fn classify_nps(
    State(state): State<Arc<AppState>>,
    Json(body): Json<Value>,
) -> Result<Json<ClassifyNpsResponse>, AppError> {
    let message = body.get("message").and_then(Value::as_str);
    let sentiment = body
        .get("sentiment")
        .cloned()
        .and_then(|value| serde_json::from_value::<SentimentResult>(value).ok());

    let (message, sentiment) = match (message, sentiment) {
        (Some(message), Some(sentiment)) => (message, sentiment),
        _ => {
            return Err(AppError::Validation(
                "Message and sentiment data are required".to_string(),
            ))
        }
    };

    let reply = match &state.classifier {
        SentimentClassifier::Remote(provider) => provider.classify_nps(message, &sentiment).await?,
        SentimentClassifier::Local => {
            let prediction = nps::predict(message, &sentiment, &state.thresholds);
            NpsReply {
                customer_type: prediction.customer_type,
                nps_score: prediction.nps_score,
                confidence: prediction.confidence,
                reasoning: "Local heuristic classification".to_string(),
                keywords: Vec::new(),
            }
        }
    };

    info!(
        score = reply.nps_score,
        customer_type = ?reply.customer_type,
        "NPS classification completed"
    );

    Ok(Json(ClassifyNpsResponse {
        customer_type: reply.customer_type,
        nps_score: reply.nps_score,
        accuracy: reply.confidence,
        confidence: reply.confidence,
        reasoning: reply.reasoning,
        keywords: reply.keywords,
        sentiment: sentiment.sentiment,
        timestamp: Utc::now(),
        message: truncate(message, 100),
    }))
}

// -----------------------------------------------------------------------------
// Chat pipeline
// -----------------------------------------------------------------------------

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ChatMessageRequest {
    session_id: Option<String>,
    message: Option<String>,
}

/// Run one customer message through the full pipeline: classify, predict,
/// persist best-effort, fan out push events, and return the annotated
/// message with its prediction.
async fn chat_message(
    State(state): State<Arc<AppState>>,
    Json(request): Json<ChatMessageRequest>,
) -> Result<Json<Value>, AppError> {
    let text = request
        .message
        .filter(|m| !m.trim().is_empty())
        .ok_or_else(|| AppError::Validation("Message is required".to_string()))?;
    let session_id = request.session_id.unwrap_or_else(|| "default".to_string());

    // The live channel stays usable offline: remote failures downgrade to
    // the keyword heuristic instead of failing the message.
    let sentiment = match state.classifier.classify(&text).await {
        Ok(result) => result,
        Err(err) => {
            warn!("Remote sentiment failed, using local heuristic: {err}");
            crate::scoring::sentiment::classify_local(&text)
        }
    };

    let prediction = nps::predict(&text, &sentiment, &state.thresholds);
    let risk = nps::detractor_risk(prediction.nps_score);

    let mut message = ChatMessage::new(&session_id, Sender::Customer, &text);
    message.sentiment = Some(signed_sentiment(&sentiment));
    message.risk = Some(risk);

    let store = state.store.clone();
    let stored = prediction.clone();
    tokio::spawn(async move {
        store.save_prediction_best_effort(&stored).await;
    });

    state.bus.publish(
        &session_id,
        Event::Message {
            message: message.clone(),
        },
    );

    if prediction.customer_type == CustomerType::Detractor || risk >= state.thresholds.risk_alert {
        state.bus.publish(
            &session_id,
            Event::Alert {
                risk,
                sentiment: sentiment.sentiment,
            },
        );

        let (suggested, reasoning) = report::suggested_response(sentiment.sentiment);
        state.bus.publish(
            &session_id,
            Event::AiRecommendation {
                suggested_response: suggested.to_string(),
                risk,
                sentiment: sentiment.sentiment,
                reasoning: reasoning.to_string(),
            },
        );
    }

    Ok(Json(json!({
        "message": message,
        "sentiment": sentiment,
        "nps": prediction,
    })))
}

/// Collapse the distribution into one signed score for the transcript view.
fn signed_sentiment(sentiment: &SentimentResult) -> f64 {
    match sentiment.sentiment {
        SentimentLabel::Positive => sentiment.confidence,
        SentimentLabel::Negative => -sentiment.confidence,
        SentimentLabel::Neutral => 0.0,
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SaveChatRequest {
    user_message: Option<Value>,
    agent_response: Option<Value>,
    sentiment: Option<SentimentResult>,
    nps_data: Option<NpsPrediction>,
}

async fn save_chat(
    State(state): State<Arc<AppState>>,
    Json(request): Json<SaveChatRequest>,
) -> Result<Json<Value>, AppError> {
    let (user_message, agent_response) = match (&request.user_message, &request.agent_response) {
        (Some(user), Some(agent)) => (user, agent),
        _ => {
            return Err(AppError::Validation(
                "Chat data with userMessage and agentResponse is required".to_string(),
            ))
        }
    };

    let user_text = field_str(user_message, "text");
    let agent_text = field_str(agent_response, "text");
    let customer = field_str_or(user_message, "user", "Unknown");
    let agent = field_str_or(agent_response, "sender", "Agent");

    let sentiment = request
        .sentiment
        .unwrap_or_else(|| crate::scoring::sentiment::classify_local(&user_text));
    let prediction = request
        .nps_data
        .unwrap_or_else(|| nps::predict(&user_text, &sentiment, &state.thresholds));

    let record = ChatLogRecord::new(customer, agent, user_text, agent_text, sentiment, prediction);
    state.store.save_log(&record).await?;

    info!("Chat saved: {}", record.id);

    Ok(Json(json!({
        "success": true,
        "chatId": record.id,
        "timestamp": record.timestamp,
    })))
}

fn field_str(value: &Value, key: &str) -> String {
    value
        .get(key)
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string()
}

fn field_str_or(value: &Value, key: &str, default: &str) -> String {
    value
        .get(key)
        .and_then(Value::as_str)
        .unwrap_or(default)
        .to_string()
}

// -----------------------------------------------------------------------------
// History and aggregation endpoints
// -----------------------------------------------------------------------------

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct HistoryParams {
    limit: Option<i64>,
    offset: Option<i64>,
    customer: Option<String>,
    agent: Option<String>,
    start_date: Option<String>,
    end_date: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct HistoryRow {
    id: String,
    customer: String,
    agent: String,
    timestamp: DateTime<Utc>,
    sentiment: SentimentLabel,
    nps_type: CustomerType,
    nps_score: u8,
    user_message: String,
    agent_response: String,
}

impl From<ChatLogRecord> for HistoryRow {
    fn from(record: ChatLogRecord) -> Self {
        Self {
            id: record.id,
            customer: record.customer,
            agent: record.agent,
            timestamp: record.timestamp,
            sentiment: record.sentiment.sentiment,
            nps_type: record.nps.customer_type,
            nps_score: record.nps.nps_score,
            user_message: record.user_message,
            agent_response: record.agent_response,
        }
    }
}

async fn chat_history(
    State(state): State<Arc<AppState>>,
    Query(params): Query<HistoryParams>,
) -> Result<Json<Vec<HistoryRow>>, AppError> {
    let filter = HistoryFilter {
        limit: params.limit.unwrap_or(50).max(0),
        offset: params.offset.unwrap_or(0).max(0),
        customer: params.customer,
        agent: params.agent,
        start_date: parse_date(params.start_date.as_deref(), "startDate")?,
        end_date: parse_date(params.end_date.as_deref(), "endDate")?,
    };

    let records = state.store.history(&filter).await?;
    Ok(Json(records.into_iter().map(HistoryRow::from).collect()))
}

fn parse_date(raw: Option<&str>, field: &str) -> Result<Option<DateTime<Utc>>, AppError> {
    raw.map(|value| {
        DateTime::parse_from_rfc3339(value)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(|_| AppError::Validation(format!("{field} must be an RFC 3339 timestamp")))
    })
    .transpose()
}

async fn dashboard_data(
    State(state): State<Arc<AppState>>,
) -> Result<Json<report::DashboardSummary>, AppError> {
    let now = Utc::now();
    let start_of_day = now.date_naive().and_time(NaiveTime::MIN).and_utc();

    let today = state.store.in_window(start_of_day, now).await?;
    let total = state.store.count().await?;

    Ok(Json(report::dashboard_summary(&today, total)))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RangeParams {
    time_range: Option<String>,
}

impl RangeParams {
    fn range(&self) -> TimeRange {
        TimeRange::parse(self.time_range.as_deref().unwrap_or("7d"))
    }
}

async fn manager_dashboard(
    State(state): State<Arc<AppState>>,
    Query(params): Query<RangeParams>,
) -> Result<Json<report::ManagerMetrics>, AppError> {
    let now = Utc::now();
    let records = state.store.in_window(params.range().start(now), now).await?;
    Ok(Json(report::manager_metrics(&records)))
}

async fn team_performance(
    State(state): State<Arc<AppState>>,
    Query(params): Query<RangeParams>,
) -> Result<Json<Vec<report::AgentPerformance>>, AppError> {
    let now = Utc::now();
    let records = state.store.in_window(params.range().start(now), now).await?;
    Ok(Json(report::team_performance(&records)))
}

async fn nps_trends(
    State(state): State<Arc<AppState>>,
    Query(params): Query<RangeParams>,
) -> Result<Json<Vec<report::TrendPoint>>, AppError> {
    let now = Utc::now();
    let range = params.range();
    let records = state.store.in_window(range.start(now), now).await?;
    Ok(Json(report::nps_trends(&records, range)))
}

async fn recommendations(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<report::Recommendation>>, AppError> {
    let records = state.store.all_desc().await?;
    Ok(Json(report::recommendations(&records, Utc::now())))
}

// -----------------------------------------------------------------------------
// Real-time channel
// -----------------------------------------------------------------------------

#[derive(Deserialize)]
struct EventParams {
    session: String,
}

/// SSE stream of push events for one session. The stream is append-only
/// with no replay: a reconnecting client starts from an empty transcript.
async fn events(
    State(state): State<Arc<AppState>>,
    Query(params): Query<EventParams>,
) -> Sse<impl Stream<Item = Result<SseEvent, axum::BoxError>>> {
    info!("New SSE connection for session {}", params.session);

    let mut rx = state.bus.subscribe();
    let session = params.session;

    let stream = async_stream::stream! {
        loop {
            match rx.recv().await {
                Ok((session_id, event)) if session_id == session => {
                    match serde_json::to_string(&event) {
                        Ok(json) => yield Ok(SseEvent::default().data(json)),
                        Err(e) => error!("Failed to serialize push event: {e}"),
                    }
                }
                Ok(_) => {
                    // Event for another session
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!("SSE receiver lagged, skipped {skipped} events");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    };

    Sse::new(stream).keep_alive(KeepAlive::default())
}

// -----------------------------------------------------------------------------
// Health
// -----------------------------------------------------------------------------

async fn health(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let database_ok = state.store.ping().await.is_ok();
    let status = if database_ok {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    let body = json!({
        "status": if database_ok { "healthy" } else { "unhealthy" },
        "timestamp": Utc::now(),
        "version": env!("CARGO_PKG_VERSION"),
        "checks": {
            "database": if database_ok { "healthy" } else { "unhealthy" },
            "sentimentProvider": if state.classifier.is_remote() {
                "configured"
            } else {
                "local-fallback"
            },
        },
    });

    (status, Json(body))
}

fn truncate(text: &str, max: usize) -> String {
    if text.chars().count() > max {
        let head: String = text.chars().take(max).collect();
        format!("{head}...")
    } else {
        text.to_string()
    }
}

/// Build the application state from loaded settings and an initialized
/// store.
pub fn build_state(settings: &Settings, store: Store, bus: Arc<EventBus>) -> AppState {
    let classifier = match &settings.provider {
        Some(provider) => SentimentClassifier::Remote(crate::provider::RemoteProvider::new(
            &provider.endpoint,
            &provider.api_key,
            &provider.model,
        )),
        None => SentimentClassifier::Local,
    };

    AppState {
        store,
        bus,
        classifier,
        thresholds: settings.thresholds,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use tower::ServiceExt;

    async fn test_router() -> Router {
        let store = Store::in_memory().await.unwrap();
        let state = Arc::new(AppState {
            store,
            bus: Arc::new(EventBus::new()),
            classifier: SentimentClassifier::Local,
            thresholds: Thresholds::default(),
        });
        router(state)
    }

    fn post_json(uri: &str, body: &str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn body_json(response: Response) -> Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn analyze_sentiment_requires_text() {
        let router = test_router().await;
        let response = router
            .oneshot(post_json("/analyze-sentiment", r#"{"wrong": 1}"#))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = body_json(response).await;
        assert_eq!(body["error"], "Text is required and must be a string");
    }

    #[tokio::test]
    async fn analyze_sentiment_classifies_locally() {
        let router = test_router().await;
        let response = router
            .oneshot(post_json(
                "/analyze-sentiment",
                r#"{"text": "This is amazing, I love it!"}"#,
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["sentiment"], "positive");
        assert_eq!(body["confidence"], 0.75);
        assert!(body["confidenceScores"]["positive"].is_number());
    }

    #[tokio::test]
    async fn predict_nps_requires_both_fields() {
        let router = test_router().await;
        let response = router
            .oneshot(post_json("/predict-nps", r#"{"message": "hello"}"#))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = body_json(response).await;
        assert_eq!(body["error"], "Message and sentiment data are required");
    }

    #[tokio::test]
    async fn predict_nps_returns_prediction() {
        let router = test_router().await;
        let body = r#"{
            "message": "This is amazing, I love it!",
            "sentiment": {"sentiment": "positive", "confidence": 0.75}
        }"#;
        let response = router.oneshot(post_json("/predict-nps", body)).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["npsScore"], 10);
        assert_eq!(body["customerType"], "Promoter");
    }

    #[tokio::test]
    async fn classify_nps_requires_both_fields() {
        let router = test_router().await;
        let response = router
            .oneshot(post_json("/classify-nps", r#"{"message": "hello"}"#))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = body_json(response).await;
        assert_eq!(body["error"], "Message and sentiment data are required");
    }

    #[tokio::test]
    async fn classify_nps_falls_back_to_heuristic_without_provider() {
        let router = test_router().await;
        let body = r#"{
            "message": "Worst service ever, totally broken",
            "sentiment": {"sentiment": "negative", "confidence": 0.5}
        }"#;
        let response = router
            .oneshot(post_json("/classify-nps", body))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["customerType"], "Detractor");
        assert_eq!(body["npsScore"], 1);
        assert_eq!(body["sentiment"], "negative");
        assert_eq!(body["reasoning"], "Local heuristic classification");
        assert_eq!(body["keywords"], json!([]));
    }

    #[tokio::test]
    async fn wrong_method_is_rejected() {
        let router = test_router().await;
        let response = router
            .oneshot(
                Request::builder()
                    .method("GET")
                    .uri("/analyze-sentiment")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
    }

    #[tokio::test]
    async fn chat_history_starts_empty() {
        let router = test_router().await;
        let response = router
            .oneshot(
                Request::builder()
                    .uri("/chat-history?limit=5")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body, json!([]));
    }

    #[tokio::test]
    async fn chat_history_rejects_bad_dates() {
        let router = test_router().await;
        let response = router
            .oneshot(
                Request::builder()
                    .uri("/chat-history?startDate=yesterday")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn save_chat_roundtrips_through_history() {
        let router = test_router().await;
        let save_body = r#"{
            "userMessage": {"text": "Worst service ever, totally broken", "user": "dana"},
            "agentResponse": {"text": "So sorry, let me fix this", "sender": "alice"}
        }"#;
        let response = router
            .clone()
            .oneshot(post_json("/save-chat", save_body))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["success"], true);

        let response = router
            .oneshot(
                Request::builder()
                    .uri("/chat-history")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        let body = body_json(response).await;
        assert_eq!(body[0]["customer"], "dana");
        assert_eq!(body[0]["agent"], "alice");
        assert_eq!(body[0]["sentiment"], "negative");
        assert_eq!(body[0]["npsType"], "Detractor");
    }

    #[tokio::test]
    async fn save_chat_requires_both_messages() {
        let router = test_router().await;
        let response = router
            .oneshot(post_json(
                "/save-chat",
                r#"{"userMessage": {"text": "hi"}}"#,
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn chat_message_publishes_alert_for_detractors() {
        let store = Store::in_memory().await.unwrap();
        let bus = Arc::new(EventBus::new());
        let state = Arc::new(AppState {
            store,
            bus: bus.clone(),
            classifier: SentimentClassifier::Local,
            thresholds: Thresholds::default(),
        });
        let router = router(state);

        let mut rx = bus.subscribe();

        let body = r#"{"sessionId": "s1", "message": "Worst service ever, totally broken"}"#;
        let response = router.oneshot(post_json("/chat/message", body)).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["nps"]["customerType"], "Detractor");
        assert_eq!(body["message"]["sender"], "customer");

        let (session, first) = rx.recv().await.unwrap();
        assert_eq!(session, "s1");
        assert!(matches!(first, Event::Message { .. }));
        let (_, second) = rx.recv().await.unwrap();
        assert!(matches!(second, Event::Alert { .. }));
        let (_, third) = rx.recv().await.unwrap();
        assert!(matches!(third, Event::AiRecommendation { .. }));
    }

    #[tokio::test]
    async fn chat_message_requires_content() {
        let router = test_router().await;
        let response = router
            .oneshot(post_json("/chat/message", r#"{"sessionId": "s1"}"#))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn health_reports_local_fallback() {
        let router = test_router().await;
        let response = router
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["status"], "healthy");
        assert_eq!(body["checks"]["sentimentProvider"], "local-fallback");
    }
}
