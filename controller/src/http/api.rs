use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use brokerctl_common::ServiceAction;
use serde::Serialize;
use tracing::{error, info};

use crate::{
    app::AppState,
    display::{ConnectionIndicator, DisplayState},
    error::Fault,
    sync::Checkpoint,
};

pub(crate) fn routes() -> Router<AppState> {
    Router::new()
        .route("/status", get(get_status))
        .route("/broker/start", post(handle_start))
        .route("/broker/stop", post(handle_stop))
        .route("/broker/probe", post(handle_probe))
        .route("/checkpoint/{checkpoint}", post(handle_checkpoint))
}

#[derive(Debug, Serialize)]
pub(crate) struct StatusResponse {
    #[serde(flatten)]
    pub display: DisplayState,
    pub connection_string: String,
    /// Believed, not confirmed. See `/broker/probe`.
    pub action: ServiceAction,
}

#[derive(Debug, Serialize)]
pub(crate) struct CommandResponse {
    pub action: ServiceAction,
    pub connection: ConnectionIndicator,
}

#[derive(Debug, Serialize)]
pub(crate) struct ProbeResponse {
    pub alive: bool,
    pub action: ServiceAction,
}

/// A fault rendered as `{"error": "..."}`.
pub(crate) struct ApiError(Fault);

impl From<Fault> for ApiError {
    fn from(fault: Fault) -> Self {
        Self(fault)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match self.0 {
            ref fault if fault.is_credential_fault() => StatusCode::CONFLICT,
            Fault::DispatchFailed(_) | Fault::ProbeFailed => StatusCode::SERVICE_UNAVAILABLE,
            Fault::CredentialUnavailable
            | Fault::InvalidUsername(_)
            | Fault::CredentialWriteFailed { .. }
            | Fault::Settings(_)
            | Fault::Serialize(_)
            | Fault::TaskAborted(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        error!(error = %self.0, %status, "Broker command failed");
        let body = serde_json::json!({ "error": self.0.to_string() });
        (status, Json(body)).into_response()
    }
}

async fn get_status(State(state): State<AppState>) -> Json<StatusResponse> {
    let display = state.display().as_ref().clone();
    let action = state.action().await;
    Json(StatusResponse {
        connection_string: display.connection_string(),
        display,
        action,
    })
}

/// Builds a fresh configuration from the current settings and dispatches START.
///
/// 202 means dispatched, not running. A start sequence aborted for lack of credentials is a 409.
#[axum::debug_handler]
async fn handle_start(
    State(state): State<AppState>,
) -> Result<(StatusCode, Json<CommandResponse>), ApiError> {
    let connection = state.start_broker().await?;
    Ok((
        StatusCode::ACCEPTED,
        Json(CommandResponse {
            action: state.action().await,
            connection,
        }),
    ))
}

#[axum::debug_handler]
async fn handle_stop(
    State(state): State<AppState>,
) -> Result<(StatusCode, Json<CommandResponse>), ApiError> {
    let connection = state.stop_broker().await?;
    Ok((
        StatusCode::ACCEPTED,
        Json(CommandResponse {
            action: state.action().await,
            connection,
        }),
    ))
}

#[axum::debug_handler]
async fn handle_probe(State(state): State<AppState>) -> Result<Json<ProbeResponse>, ApiError> {
    let alive = state.probe_broker().await?;
    Ok(Json(ProbeResponse {
        alive,
        action: state.action().await,
    }))
}

#[axum::debug_handler]
async fn handle_checkpoint(
    Path(checkpoint): Path<Checkpoint>,
    State(state): State<AppState>,
) -> impl IntoResponse {
    if state.enqueue(checkpoint) {
        info!(%checkpoint, "Checkpoint queued via API");
        (StatusCode::ACCEPTED, "Checkpoint queued").into_response()
    } else {
        StatusCode::SERVICE_UNAVAILABLE.into_response()
    }
}
