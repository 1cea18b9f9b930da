//! HTTP interface of the QA service.
//!
//! ```text
//! GET /                          service index
//! GET /qa/check?line_id=&line_type=
//! GET /check-line/{line_id}      official line shortcut
//! GET /municat                   municipal extract packages
//! GET /docs, /docs/qa_line, /docs/doc_generator
//! ```
//!
//! Runs touch the working store and the line folders, so they execute one at
//! a time on the blocking pool.

use crate::adapters::{ShapefileSource, SqliteStore};
use crate::config::QaConfig;
use crate::core::{MunicatGenerator, QaEngine};
use crate::domain::model::{LineType, QaResponse};
use crate::utils::error::{QaError, Result};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
    routing::get,
    Json, Router,
};
use serde::Deserialize;
use serde_json::json;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::Mutex;
use tokio::task::JoinError;

pub const NO_LINE_ID: &str = "No line ID was provided";
pub const INVALID_LINE_ID: &str = "The line ID is not valid";

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<QaConfig>,
    run_lock: Arc<Mutex<()>>,
}

impl AppState {
    pub fn new(config: QaConfig) -> Self {
        Self {
            config: Arc::new(config),
            run_lock: Arc::new(Mutex::new(())),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct CheckParams {
    pub line_id: Option<String>,
    pub line_type: Option<String>,
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/qa/check", get(qa_check))
        .route("/check-line/{line_id}", get(check_line))
        .route("/municat", get(municat))
        .route("/docs", get(docs_home))
        .route("/docs/qa_line", get(docs_qa_line))
        .route("/docs/doc_generator", get(docs_doc_generator))
        .with_state(state)
}

pub async fn serve(config: QaConfig) -> Result<()> {
    let bind_addr = config.server.bind_addr.clone();
    let listener = TcpListener::bind(&bind_addr).await?;
    tracing::info!(%bind_addr, "QA service listening");

    axum::serve(listener, build_router(AppState::new(config))).await?;
    Ok(())
}

/// Line ids arrive as text; anything but a non-negative integer is rejected.
pub fn parse_line_id(raw: Option<&str>) -> std::result::Result<u32, &'static str> {
    let raw = raw.map(str::trim).filter(|s| !s.is_empty()).ok_or(NO_LINE_ID)?;
    raw.parse::<i64>()
        .ok()
        .and_then(|id| u32::try_from(id).ok())
        .ok_or(INVALID_LINE_ID)
}

fn bad_request(message: impl Into<String>) -> Response {
    (
        StatusCode::BAD_REQUEST,
        Json(QaResponse::error(message, Vec::new())),
    )
        .into_response()
}

async fn index() -> Json<serde_json::Value> {
    Json(json!({
        "service": "delimit-qa",
        "version": env!("CARGO_PKG_VERSION"),
        "routes": [
            "/qa/check?line_id=<id>&line_type=<mtt|rep>",
            "/check-line/<id>",
            "/municat",
            "/docs",
        ],
    }))
}

async fn qa_check(State(state): State<AppState>, Query(params): Query<CheckParams>) -> Response {
    let line_id = match parse_line_id(params.line_id.as_deref()) {
        Ok(id) => id,
        Err(message) => return bad_request(message),
    };
    let line_type = match params.line_type.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        None => LineType::Mtt,
        Some(raw) => match raw.parse::<LineType>() {
            Ok(line_type) => line_type,
            Err(e) => return bad_request(e.to_string()),
        },
    };

    Json(run_qa(&state, line_id, line_type).await).into_response()
}

async fn check_line(State(state): State<AppState>, Path(raw_id): Path<String>) -> Response {
    match parse_line_id(Some(&raw_id)) {
        Ok(line_id) => Json(run_qa(&state, line_id, LineType::Mtt).await).into_response(),
        Err(message) => bad_request(message),
    }
}

/// Run blocking work on the shared store while holding the run lock.
///
/// The guard travels with the task, so a dropped request does not release
/// the lock before the work ends.
async fn run_exclusive<T, F>(state: &AppState, work: F) -> std::result::Result<T, JoinError>
where
    T: Send + 'static,
    F: FnOnce(&QaConfig) -> T + Send + 'static,
{
    let guard = Arc::clone(&state.run_lock).lock_owned().await;
    let config = Arc::clone(&state.config);

    tokio::task::spawn_blocking(move || {
        let _guard = guard;
        work(&config)
    })
    .await
}

pub async fn run_qa(state: &AppState, line_id: u32, line_type: LineType) -> QaResponse {
    let outcome = run_exclusive(state, move |config| -> Result<QaResponse> {
        let _span = tracing::info_span!("qa_run", line_id, line_type = %line_type).entered();
        let store = SqliteStore::open(&config.paths.work_store)?;
        let engine = QaEngine::new(config, ShapefileSource::new(), store);
        Ok(engine.run(line_id, line_type))
    })
    .await;

    match outcome {
        Ok(Ok(response)) => response,
        Ok(Err(e)) => {
            tracing::error!("Quality check of line {} could not start: {}", line_id, e);
            QaResponse::error(e.user_friendly_message(), Vec::new())
        }
        Err(e) => {
            tracing::error!("Quality check task of line {} failed: {}", line_id, e);
            QaResponse::error(format!("The quality check of line {} failed", line_id), Vec::new())
        }
    }
}

async fn municat(State(state): State<AppState>) -> Response {
    let outcome = run_exclusive(&state, |config| -> Result<Vec<PathBuf>> {
        let _span = tracing::info_span!("municat").entered();
        let store = SqliteStore::open(&config.paths.work_store)?;
        MunicatGenerator::new(config, store).run()
    })
    .await
    .unwrap_or_else(|e| Err(QaError::processing(format!("Municipal extract task failed: {}", e))));

    match outcome {
        Ok(packages) => {
            tracing::info!("Municipal extract wrote {} packages", packages.len());
            Json(json!({ "message": "done", "packages": packages })).into_response()
        }
        Err(e) => {
            tracing::error!("Municipal extract failed: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "result": "error", "message": e.to_string() })),
            )
                .into_response()
        }
    }
}

async fn docs_home(State(state): State<AppState>) -> Redirect {
    Redirect::to(&state.config.server.docs_url)
}

async fn docs_qa_line(State(state): State<AppState>) -> Redirect {
    Redirect::to(&format!("{}qa_line/", state.config.server.docs_url))
}

async fn docs_doc_generator(State(state): State<AppState>) -> Redirect {
    Redirect::to(&format!("{}doc_generator/", state.config.server.docs_url))
}
