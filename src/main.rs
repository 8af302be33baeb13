use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use anyhow::Context;
use chrono::{DateTime, Utc};
use clap::Parser;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::time::Instant;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{debug, error, info};
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

mod animation;
mod config;
mod deck;
mod error;
mod model_client;
mod models;
mod normalize;
mod slides;

#[cfg(test)]
mod tests;

use animation::Millis;
use config::{Config, DeckLimits, DEFAULT_LOG_FILTER};
use deck::{DeckController, DeckView, InputEvent, NavOutcome};
use error::ApiError;
use model_client::{truncate_chars, GeminiClient, ModelClient, ANALYSIS_PROMPT, MAX_TRANSCRIPT_CHARS};
use models::{AnalyzeInput, StatisticsRecord};

/// Analysis + slide deck HTTP API
/// The model client is built once at startup and shared by all requests
/// Decks live in memory until the viewer restarts or they go idle
#[derive(Clone)]
struct AppState {
    model: Arc<dyn ModelClient>,
    decks: Arc<Mutex<HashMap<Uuid, DeckSession>>>,
    limits: DeckLimits,
}

impl AppState {
    fn new(model: Arc<dyn ModelClient>) -> Self {
        Self {
            model,
            decks: Arc::new(Mutex::new(HashMap::new())),
            limits: DeckLimits::default(),
        }
    }

    fn with_deck_limits(mut self, limits: DeckLimits) -> Self {
        self.limits = limits;
        self
    }

    /// Lock the deck table, dropping sessions idle past the limit
    fn decks(&self) -> MutexGuard<'_, HashMap<Uuid, DeckSession>> {
        let mut decks = self.decks.lock().unwrap_or_else(PoisonError::into_inner);
        let before = decks.len();
        decks.retain(|_, session| session.last_seen.elapsed() < self.limits.idle);
        let expired = before - decks.len();
        if expired > 0 {
            info!(expired, remaining = decks.len(), "idle decks dropped");
        }
        decks
    }
}

/// One viewer's deck plus the origin of its clock
struct DeckSession {
    controller: DeckController,
    opened: Instant,
    last_seen: Instant,
    created_at: DateTime<Utc>,
}

impl DeckSession {
    /// Mark the deck as used and read its clock
    fn touch(&mut self) -> Millis {
        self.last_seen = Instant::now();
        self.opened.elapsed().as_millis() as Millis
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct DeckCreated {
    deck_id: Uuid,
    created_at: DateTime<Utc>,
    view: DeckView,
}

#[derive(Debug, Serialize)]
struct NavResponse {
    outcome: NavOutcome,
    view: DeckView,
}

#[derive(Debug, Deserialize)]
struct JumpInput {
    index: usize,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER)),
        )
        .init();

    let client = GeminiClient::new(&config.api_key, &config.model, config.timeout())
        .context("failed to build model client")?
        .with_base_url(&config.api_base);
    info!(model = client.model(), timeout_secs = config.timeout_secs, "model client ready");
    let state = AppState::new(Arc::new(client)).with_deck_limits(config.deck_limits());

    let listener = tokio::net::TcpListener::bind(config.addr)
        .await
        .with_context(|| format!("failed to bind {}", config.addr))?;
    info!(addr = %config.addr, "server running");

    axum::serve(listener, app(state)).await.context("server error")?;
    Ok(())
}

fn app(state: AppState) -> Router {
    Router::new()
        .route("/", get(root))
        .route("/health", get(health_check))
        .route("/api/analyze", post(analyze))
        .route("/api/decks", post(create_deck))
        .route("/api/decks/:id", get(get_deck).delete(delete_deck))
        .route("/api/decks/:id/next", post(deck_next))
        .route("/api/decks/:id/prev", post(deck_prev))
        .route("/api/decks/:id/jump", post(deck_jump))
        .route("/api/decks/:id/input", post(deck_input))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn root() -> &'static str {
    "Chat Wrapped API v0.1.0"
}

async fn health_check(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "healthy",
        "timestamp": Utc::now().to_rfc3339(),
        "decks": state.decks().len(),
    }))
}

/// Analyze an uploaded transcript
/// Only a missing transcript or a failed model call is an error;
/// unparseable model output degrades to the fallback record
async fn analyze(
    State(state): State<AppState>,
    payload: Result<Json<AnalyzeInput>, JsonRejection>,
) -> Result<Json<StatisticsRecord>, ApiError> {
    let Json(input) = payload.map_err(|rejection| {
        error!(%rejection, "unreadable analyze request");
        ApiError::UnreadableAnalysis(rejection)
    })?;
    let content = input
        .chat_content
        .filter(|content| !content.is_empty())
        .ok_or(ApiError::MissingChatContent)?;

    let record = analyze_transcript(state.model.as_ref(), &content).await?;
    Ok(Json(record))
}

async fn analyze_transcript(
    model: &dyn ModelClient,
    content: &str,
) -> Result<StatisticsRecord, ApiError> {
    let transcript = truncate_chars(content, MAX_TRANSCRIPT_CHARS);
    info!(bytes = content.len(), "received chat content");
    if transcript.len() < content.len() {
        info!(
            kept_bytes = transcript.len(),
            max_chars = MAX_TRANSCRIPT_CHARS,
            "chat content truncated"
        );
    }

    let text = model
        .generate(ANALYSIS_PROMPT, transcript)
        .await
        .map_err(|err| {
            error!(%err, "model call failed");
            ApiError::Upstream(err)
        })?;

    Ok(normalize::normalize(&text))
}

/// Open a deck over a record
/// Partial records are completed with the same defaults as model output
async fn create_deck(
    State(state): State<AppState>,
    payload: Result<Json<serde_json::Value>, JsonRejection>,
) -> Result<(StatusCode, Json<DeckCreated>), ApiError> {
    let Json(record) = payload?;
    let record = normalize::record_from_value(&record);
    let opened = Instant::now();
    let session = DeckSession {
        controller: DeckController::new(record, 0),
        opened,
        last_seen: opened,
        created_at: Utc::now(),
    };
    let deck_id = Uuid::new_v4();
    let created = DeckCreated {
        deck_id,
        created_at: session.created_at,
        view: session.controller.view(0),
    };

    let mut decks = state.decks();
    while decks.len() >= state.limits.max_decks {
        let Some(oldest) = decks
            .iter()
            .min_by_key(|(_, session)| session.last_seen)
            .map(|(id, _)| *id)
        else {
            break;
        };
        decks.remove(&oldest);
        info!(
            deck_id = %oldest,
            max_decks = state.limits.max_decks,
            "deck limit reached, dropped least recently used"
        );
    }
    decks.insert(deck_id, session);
    info!(%deck_id, "deck opened");
    Ok((StatusCode::CREATED, Json(created)))
}

async fn get_deck(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<DeckView>, ApiError> {
    let mut decks = state.decks();
    let session = decks.get_mut(&id).ok_or(ApiError::DeckNotFound(id))?;
    let now = session.touch();
    session.controller.tick(now);
    Ok(Json(session.controller.view(now)))
}

/// Restart: the deck and its state are dropped
async fn delete_deck(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    state
        .decks()
        .remove(&id)
        .ok_or(ApiError::DeckNotFound(id))?;
    info!(deck_id = %id, "deck closed");
    Ok(StatusCode::NO_CONTENT)
}

async fn deck_next(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<NavResponse>, ApiError> {
    navigate(&state, id, |deck, now| deck.go_next(now))
}

async fn deck_prev(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<NavResponse>, ApiError> {
    navigate(&state, id, |deck, now| deck.go_prev(now))
}

async fn deck_jump(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    payload: Result<Json<JumpInput>, JsonRejection>,
) -> Result<Json<NavResponse>, ApiError> {
    let Json(input) = payload?;
    navigate(&state, id, |deck, now| deck.jump_to(input.index, now))
}

async fn deck_input(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    payload: Result<Json<InputEvent>, JsonRejection>,
) -> Result<Json<NavResponse>, ApiError> {
    let Json(event) = payload?;
    navigate(&state, id, |deck, now| deck.handle_input(&event, now))
}

// Helper functions

fn navigate<F>(state: &AppState, id: Uuid, op: F) -> Result<Json<NavResponse>, ApiError>
where
    F: FnOnce(&mut DeckController, Millis) -> NavOutcome,
{
    let mut decks = state.decks();
    let session = decks.get_mut(&id).ok_or(ApiError::DeckNotFound(id))?;
    let now = session.touch();
    let outcome = op(&mut session.controller, now);

    let deck = session.controller.state();
    debug!(
        deck_id = %id,
        started = outcome.is_started(),
        index = deck.current_index,
        transitioning = deck.transition_in_progress,
        ?outcome,
        "navigation"
    );
    Ok(Json(NavResponse {
        outcome,
        view: session.controller.view(now),
    }))
}
