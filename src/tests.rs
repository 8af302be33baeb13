use super::*;
use axum::body::Body;
use axum::http::Request;
use async_trait::async_trait;
use serde_json::{json, Value};
use std::time::Duration;
use tower::ServiceExt;

use crate::animation::{ENTER_MS, EXIT_MS};
use crate::model_client::ModelError;
use crate::normalize::fallback_record;

/// Model stub returning a fixed reply and remembering what it was sent
struct ScriptedModel {
    reply: Option<String>,
    seen_chars: Mutex<Vec<usize>>,
}

impl ScriptedModel {
    fn replying(text: &str) -> Arc<Self> {
        Arc::new(Self {
            reply: Some(text.to_string()),
            seen_chars: Mutex::new(Vec::new()),
        })
    }

    fn failing() -> Arc<Self> {
        Arc::new(Self {
            reply: None,
            seen_chars: Mutex::new(Vec::new()),
        })
    }
}

#[async_trait]
impl ModelClient for ScriptedModel {
    async fn generate(&self, prompt: &str, transcript: &str) -> Result<String, ModelError> {
        assert_eq!(prompt, ANALYSIS_PROMPT);
        self.seen_chars
            .lock()
            .unwrap()
            .push(transcript.chars().count());
        self.reply.clone().ok_or(ModelError::Empty)
    }
}

async fn send(state: &AppState, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let body = match body {
        Some(body) => Body::from(body.to_string()),
        None => Body::empty(),
    };
    send_raw(state, method, uri, body).await
}

async fn send_raw(state: &AppState, method: &str, uri: &str, body: Body) -> (StatusCode, Value) {
    let request = Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json")
        .body(body)
        .unwrap();

    let response = app(state.clone()).oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or_else(|_| {
            Value::String(String::from_utf8_lossy(&bytes).into_owned())
        })
    };
    (status, value)
}

#[tokio::test]
async fn test_health_check() {
    let state = AppState::new(ScriptedModel::failing());
    let (status, body) = send(&state, "GET", "/health", None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["decks"], 0);
}

#[tokio::test]
async fn test_analyze_missing_content() {
    let model = ScriptedModel::replying("{}");
    let state = AppState::new(model.clone());

    let (status, body) = send(&state, "POST", "/api/analyze", Some(json!({}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "No chat content provided");

    let (status, _) = send(&state, "POST", "/api/analyze", Some(json!({"chatContent": ""}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    assert!(model.seen_chars.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_analyze_returns_normalized_record() {
    let state = AppState::new(ScriptedModel::replying(
        "```json\n{\"totalMessages\": 10, \"fraseFinal\": \"chao\"}\n```",
    ));

    let (status, body) = send(
        &state,
        "POST",
        "/api/analyze",
        Some(json!({"chatContent": "[1/1/24] Ana: hola"})),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["totalMessages"], 10);
    assert_eq!(body["participants"], json!([]));
    assert_eq!(body["fraseFinal"], "chao");
    assert_eq!(body["lateNightChatter"], json!({"name": "N/A", "count": 0}));
}

#[tokio::test]
async fn test_analyze_unparseable_reply_serves_fallback() {
    let state = AppState::new(ScriptedModel::replying("not json at all"));

    let (status, body) = send(
        &state,
        "POST",
        "/api/analyze",
        Some(json!({"chatContent": "hola"})),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    let record: StatisticsRecord = serde_json::from_value(body).unwrap();
    assert_eq!(record, fallback_record());
}

#[tokio::test]
async fn test_analyze_recovers_wrong_shaped_fields() {
    let reply = json!({
        "totalMessages": 1250.0,
        "totalWords": "muchas",
        "participants": [
            {"name": "Ana", "messageCount": 700, "wordCount": 9000, "percentage": 56},
            {"name": "Luis", "messageCount": 550.0, "wordCount": 8000, "percentage": 44},
            42
        ],
        "mostActiveHour": {"hour": 20, "count": 180.0},
        "lateNightChatter": "Ana",
        "chatAura": {"name": "Caótico", "description": "puro meme"},
    });
    let state = AppState::new(ScriptedModel::replying(&reply.to_string()));

    let (status, body) = send(
        &state,
        "POST",
        "/api/analyze",
        Some(json!({"chatContent": "hola"})),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["totalMessages"], 1250);
    assert_eq!(body["totalWords"], 0);
    assert_eq!(body["participants"].as_array().unwrap().len(), 2);
    assert_eq!(body["participants"][1]["messageCount"], 550);
    assert_eq!(body["mostActiveHour"], json!({"hour": 20, "count": 180}));
    assert_eq!(body["lateNightChatter"], json!({"name": "N/A", "count": 0}));
    assert_eq!(body["chatAura"]["name"], "Caótico");
    assert_eq!(body["fraseFinal"], "N/A");
}

#[tokio::test]
async fn test_analyze_unreadable_body() {
    let model = ScriptedModel::replying("{}");
    let state = AppState::new(model.clone());

    let (status, body) = send_raw(&state, "POST", "/api/analyze", Body::from("chat: hola")).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(body["error"].as_str().unwrap().starts_with("Error analyzing chat"));

    let (status, body) = send(&state, "POST", "/api/analyze", Some(json!({"chatContent": 5}))).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(body["error"].is_string());

    assert!(model.seen_chars.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_analyze_upstream_failure() {
    let state = AppState::new(ScriptedModel::failing());

    let (status, body) = send(
        &state,
        "POST",
        "/api/analyze",
        Some(json!({"chatContent": "hola"})),
    )
    .await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(body["error"].as_str().unwrap().starts_with("Error analyzing chat"));
}

#[tokio::test]
async fn test_analyze_truncates_transcript() {
    let model = ScriptedModel::replying("{}");
    let state = AppState::new(model.clone());
    let transcript = "ñ".repeat(MAX_TRANSCRIPT_CHARS + 25);

    let (status, _) = send(
        &state,
        "POST",
        "/api/analyze",
        Some(json!({"chatContent": transcript})),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(*model.seen_chars.lock().unwrap(), vec![MAX_TRANSCRIPT_CHARS]);
}

async fn open_deck(state: &AppState, record: Value) -> String {
    let (status, body) = send(state, "POST", "/api/decks", Some(record)).await;
    assert_eq!(status, StatusCode::CREATED);
    body["deckId"].as_str().unwrap().to_string()
}

#[tokio::test(start_paused = true)]
async fn test_deck_navigation_over_http() {
    let state = AppState::new(ScriptedModel::failing());
    let record = serde_json::to_value(fallback_record()).unwrap();
    let id = open_deck(&state, record).await;

    let (status, view) = send(&state, "GET", &format!("/api/decks/{id}"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(view["index"], 0);
    assert_eq!(view["count"], 13);
    assert_eq!(view["phase"]["state"], "idle");
    assert_eq!(view["slide"]["id"], "intro");
    assert_eq!(view["activeSlide"], 0);
    assert!(view["loopingAnimations"].as_u64().unwrap() > 0);

    let next = format!("/api/decks/{id}/next");
    let (_, first) = send(&state, "POST", &next, None).await;
    assert_eq!(first["outcome"]["outcome"], "started");
    assert_eq!(first["view"]["phase"]["state"], "transitioning");

    let (_, second) = send(&state, "POST", &next, None).await;
    assert_eq!(second["outcome"]["outcome"], "rejected");
    assert_eq!(second["outcome"]["reason"], "inTransition");

    tokio::time::advance(Duration::from_millis(EXIT_MS + ENTER_MS)).await;

    let (_, view) = send(&state, "GET", &format!("/api/decks/{id}"), None).await;
    assert_eq!(view["index"], 1);
    assert_eq!(view["slide"]["id"], "total-messages");
    assert_eq!(view["slide"]["active"], true);
}

#[tokio::test(start_paused = true)]
async fn test_deck_jump_and_input() {
    let state = AppState::new(ScriptedModel::failing());
    let id = open_deck(&state, json!({"totalMessages": 3})).await;

    let jump = format!("/api/decks/{id}/jump");
    let (status, body) = send(&state, "POST", &jump, Some(json!({"index": 40}))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["outcome"]["reason"], "outOfRange");
    assert_eq!(body["view"]["index"], 0);

    let (_, body) = send(&state, "POST", &jump, Some(json!({"index": 12}))).await;
    assert_eq!(body["outcome"]["to"], 12);
    assert_eq!(body["outcome"]["direction"], "forward");

    tokio::time::advance(Duration::from_millis(EXIT_MS + ENTER_MS)).await;

    let input = format!("/api/decks/{id}/input");
    let (_, body) = send(
        &state,
        "POST",
        &input,
        Some(json!({"type": "pointer", "x": 10.0, "width": 400.0})),
    )
    .await;
    assert_eq!(body["outcome"]["from"], 12);
    assert_eq!(body["outcome"]["to"], 11);
    assert_eq!(body["outcome"]["direction"], "backward");
}

#[tokio::test]
async fn test_deck_bad_body_is_json_error() {
    let state = AppState::new(ScriptedModel::failing());
    let id = open_deck(&state, json!({})).await;

    let (status, body) = send(
        &state,
        "POST",
        &format!("/api/decks/{id}/jump"),
        Some(json!({"index": "last"})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().starts_with("Invalid request body"));

    let (status, body) = send_raw(&state, "POST", "/api/decks", Body::from("{")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].is_string());
}

#[tokio::test(start_paused = true)]
async fn test_idle_deck_expires() {
    let limits = DeckLimits {
        idle: Duration::from_secs(60),
        max_decks: 10,
    };
    let state = AppState::new(ScriptedModel::failing()).with_deck_limits(limits);
    let kept = open_deck(&state, json!({})).await;
    let idle = open_deck(&state, json!({})).await;

    tokio::time::advance(Duration::from_secs(40)).await;
    let (status, _) = send(&state, "POST", &format!("/api/decks/{kept}/next"), None).await;
    assert_eq!(status, StatusCode::OK);

    tokio::time::advance(Duration::from_secs(30)).await;
    let (status, _) = send(&state, "GET", &format!("/api/decks/{idle}"), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, view) = send(&state, "GET", &format!("/api/decks/{kept}"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(view["index"], 1);

    let (_, health) = send(&state, "GET", "/health", None).await;
    assert_eq!(health["decks"], 1);
}

#[tokio::test(start_paused = true)]
async fn test_deck_limit_drops_least_recently_used() {
    let limits = DeckLimits {
        idle: Duration::from_secs(3600),
        max_decks: 2,
    };
    let state = AppState::new(ScriptedModel::failing()).with_deck_limits(limits);

    let first = open_deck(&state, json!({})).await;
    tokio::time::advance(Duration::from_millis(10)).await;
    let second = open_deck(&state, json!({})).await;
    tokio::time::advance(Duration::from_millis(10)).await;
    let (status, _) = send(&state, "GET", &format!("/api/decks/{first}"), None).await;
    assert_eq!(status, StatusCode::OK);
    tokio::time::advance(Duration::from_millis(10)).await;
    let third = open_deck(&state, json!({})).await;

    let (status, _) = send(&state, "GET", &format!("/api/decks/{second}"), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    for id in [first, third] {
        let (status, _) = send(&state, "GET", &format!("/api/decks/{id}"), None).await;
        assert_eq!(status, StatusCode::OK);
    }
}

#[tokio::test]
async fn test_deck_restart_and_unknown() {
    let state = AppState::new(ScriptedModel::failing());
    let id = open_deck(&state, json!({})).await;
    let uri = format!("/api/decks/{id}");

    let (status, _) = send(&state, "DELETE", &uri, None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, body) = send(&state, "GET", &uri, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(body["error"].as_str().unwrap().starts_with("Deck not found"));

    let (status, _) = send(&state, "POST", &format!("{uri}/next"), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
