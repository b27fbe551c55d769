//! HTTP API server for the quiz front end.
//!
//! Provides REST endpoints for quiz generation and weakness memory.

use crate::approval::StaticApproval;
use crate::cli::preflight::{self, Operation};
use crate::cli::Output;
use crate::config::Settings;
use crate::error::QuizError;
use crate::events::{ProgressEvent, ProgressSink};
use crate::memory::{JsonWeaknessStore, QuizResult};
use crate::model::OpenAIProvider;
use crate::orchestrator::{DocumentInput, Pipeline, QuizRequest};
use crate::quiz::{FactSet, Quiz};
use axum::{
    extract::{DefaultBodyLimit, Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tracing::{error, info};

/// Largest request body accepted, enough for inline images.
const MAX_BODY_BYTES: usize = 10 * 1024 * 1024;

/// Shared application state.
struct AppState {
    pipeline: Pipeline,
}

/// Run the HTTP API server.
pub async fn run_serve(host: Option<String>, port: Option<u16>, settings: Settings) -> anyhow::Result<()> {
    if let Err(e) = preflight::check(Operation::Serve, &settings, None) {
        Output::error(&format!("{}", e));
        return Err(e.into());
    }

    let provider = Arc::new(OpenAIProvider::new(settings.model.clone()));
    let store = Arc::new(JsonWeaknessStore::new(settings.memory_dir()));
    let pipeline = Pipeline::new(&settings, provider, store)?;
    let state = Arc::new(AppState { pipeline });

    let app = router(state);

    let host = host.unwrap_or_else(|| settings.server.host.clone());
    let port = port.unwrap_or(settings.server.port);
    let addr = format!("{}:{}", host, port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    Output::header("Quizwright API Server");
    println!();
    Output::success(&format!("Listening on http://{}", addr));
    println!();
    println!("Endpoints:");
    Output::kv("Health", "GET  /health");
    Output::kv("Generate quiz", "POST /api/quiz");
    Output::kv("Profile", "GET  /api/memory/{user}");
    Output::kv("Record result", "POST /api/memory/{user}/results");
    Output::kv("Add weaknesses", "POST /api/memory/{user}/weaknesses");
    println!();
    Output::info("Press Ctrl+C to stop the server.");

    axum::serve(listener, app).await?;

    Ok(())
}

fn router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health))
        .route("/api/quiz", post(create_quiz))
        .route("/api/memory/{user}", get(get_profile))
        .route("/api/memory/{user}/results", post(record_result))
        .route("/api/memory/{user}/weaknesses", post(add_weaknesses))
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .layer(cors)
        .with_state(state)
}

// === Request/Response Types ===

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct QuizApiRequest {
    /// Bearer credential passed through to the model backend.
    #[serde(default)]
    token: Option<String>,
    #[serde(default)]
    model_id: String,
    /// Plain text document.
    #[serde(default)]
    document_text: Option<String>,
    /// Text or inline document, used when `documentText` is absent.
    #[serde(default)]
    content: Option<DocumentInput>,
    #[serde(default)]
    weaknesses: Vec<String>,
    #[serde(default = "default_user")]
    user_id: String,
}

fn default_user() -> String {
    "default".to_string()
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct QuizApiResponse {
    quiz: Quiz,
    facts: Option<FactSet>,
    session_id: String,
    degraded: bool,
    log: Vec<ProgressEvent>,
}

#[derive(Deserialize)]
struct ResultRequest {
    score: u32,
    total: u32,
    topic: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct HistoryResponse {
    quiz_history: Vec<QuizResult>,
}

#[derive(Deserialize)]
struct WeaknessRequest {
    weaknesses: Vec<String>,
}

#[derive(Serialize)]
struct WeaknessResponse {
    weaknesses: BTreeSet<String>,
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

fn error_response(status: StatusCode, message: impl Into<String>) -> Response {
    (status, Json(ErrorResponse { error: message.into() })).into_response()
}

/// Map a pipeline or store error onto a status code, keeping its message.
fn failure(err: QuizError) -> Response {
    let status = match err {
        QuizError::InvalidInput(_) | QuizError::UnsupportedQuestion(_) => StatusCode::BAD_REQUEST,
        QuizError::Credential => StatusCode::UNAUTHORIZED,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    error_response(status, err.to_string())
}

// === Handlers ===

async fn health() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "ok" }))
}

async fn create_quiz(State(state): State<Arc<AppState>>, Json(req): Json<QuizApiRequest>) -> Response {
    let token = match req.token {
        Some(token) if !token.trim().is_empty() => token,
        _ => return error_response(StatusCode::UNAUTHORIZED, "Missing model access token"),
    };

    let document = match (req.document_text, req.content) {
        (Some(text), _) => DocumentInput::Text { text },
        (None, Some(content)) => content,
        (None, None) => {
            return error_response(StatusCode::BAD_REQUEST, "Provide documentText or content")
        }
    };

    info!("Received quiz request for {}", req.user_id);

    let request = QuizRequest {
        credential: Some(token),
        model_id: req.model_id,
        document,
        weaknesses: req.weaknesses,
        user_id: req.user_id,
    };

    let (events, mut rx) = ProgressSink::channel();
    let result = state
        .pipeline
        .run(request, &StaticApproval::approve(), &events)
        .await;
    drop(events);

    let mut log = Vec::new();
    while let Ok(event) = rx.try_recv() {
        log.push(event);
    }

    match result {
        Ok(outcome) => Json(QuizApiResponse {
            quiz: outcome.quiz().cloned().unwrap_or_else(Quiz::fallback),
            facts: outcome.session.facts().cloned(),
            session_id: outcome.session.id.to_string(),
            degraded: outcome.degraded,
            log,
        })
        .into_response(),
        Err(e) => {
            error!("Quiz request failed: {}", e);
            failure(e)
        }
    }
}

async fn get_profile(State(state): State<Arc<AppState>>, Path(user): Path<String>) -> Response {
    Json(state.pipeline.store().get_profile(&user).await).into_response()
}

async fn record_result(
    State(state): State<Arc<AppState>>,
    Path(user): Path<String>,
    Json(req): Json<ResultRequest>,
) -> Response {
    let result = QuizResult::new(req.score, req.total, req.topic);
    match state.pipeline.store().record_quiz_result(&user, result).await {
        Ok(quiz_history) => Json(HistoryResponse { quiz_history }).into_response(),
        Err(e) => failure(e),
    }
}

async fn add_weaknesses(
    State(state): State<Arc<AppState>>,
    Path(user): Path<String>,
    Json(req): Json<WeaknessRequest>,
) -> Response {
    match state.pipeline.store().update_weaknesses(&user, &req.weaknesses).await {
        Ok(weaknesses) => Json(WeaknessResponse { weaknesses }).into_response(),
        Err(e) => failure(e),
    }
}
