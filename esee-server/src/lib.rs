//! HTTP surface for the E-SEE bridge
//!
//! | Method | Path                          | Body            | Response          |
//! |--------|-------------------------------|-----------------|-------------------|
//! | GET    | `/api/e-see/info`             |                 | `BridgeInfo`      |
//! | POST   | `/api/e-see/send-receive`     | `PatientRequest`| `PatientResult`   |
//! | POST   | `/api/e-see/send-receive/{id}`|                 | `PatientResult`   |
//! | GET    | `/health`                     |                 | status + listening|

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::json;
use tower_http::trace::TraceLayer;
use tracing::{error, warn};

use esee::{Bridge, BridgeInfo, CancellationToken, PatientRequest, PatientResult};

/// Body returned when the device produced no report
pub const NO_RESPONSE: &str = "No response received from E-SEE device.";

/// Shared state passed to handlers
#[derive(Clone)]
pub struct AppState {
    pub bridge: Arc<Bridge>,
}

impl AppState {
    pub fn new(bridge: Arc<Bridge>) -> Self {
        Self { bridge }
    }
}

/// Build the router with all routes
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/api/e-see/info", get(info_handler))
        .route("/api/e-see/send-receive", post(send_receive_handler))
        .route("/api/e-see/send-receive/{id}", post(send_receive_by_id_handler))
        .route("/health", get(health_handler))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}

/// Handler failure mapped onto an HTTP status
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error(transparent)]
    Bridge(#[from] esee::Error),

    #[error("Exchange task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, body) = match &self {
            ApiError::Bridge(e) if e.is_startup_failure() => {
                (StatusCode::SERVICE_UNAVAILABLE, e.to_string())
            }
            ApiError::Bridge(e) if e.is_unavailable() => {
                (StatusCode::GATEWAY_TIMEOUT, NO_RESPONSE.to_string())
            }
            ApiError::Bridge(esee::Error::Types(e)) => (StatusCode::BAD_REQUEST, e.to_string()),
            ApiError::Bridge(e) => (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
            ApiError::Task(e) => (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
        };

        if status.is_server_error() && status != StatusCode::GATEWAY_TIMEOUT {
            error!("{}", self);
        }

        (status, body).into_response()
    }
}

async fn info_handler(State(state): State<AppState>) -> Result<Json<BridgeInfo>, ApiError> {
    Ok(Json(state.bridge.info().await?))
}

async fn send_receive_handler(
    State(state): State<AppState>,
    Json(request): Json<PatientRequest>,
) -> Result<Json<PatientResult>, ApiError> {
    exchange(state.bridge, request).await.map(Json)
}

async fn send_receive_by_id_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<PatientResult>, ApiError> {
    exchange(state.bridge, PatientRequest::new(id)).await.map(Json)
}

async fn health_handler(State(state): State<AppState>) -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "listening": state.bridge.is_listening(),
    }))
}

/// Run one exchange on its own task
///
/// The token is cancelled if this future is dropped, which happens when the
/// client goes away before the device answers.
async fn exchange(bridge: Arc<Bridge>, request: PatientRequest) -> Result<PatientResult, ApiError> {
    let cancel = CancellationToken::new();
    let _guard = cancel.clone().drop_guard();

    let task = tokio::spawn(async move { bridge.send_and_receive(&request, &cancel).await });

    match task.await? {
        Ok(result) => Ok(result),
        Err(e) => {
            if e.is_unavailable() {
                warn!("{}", e);
            }
            Err(e.into())
        }
    }
}
