//! Device handlers: telemetry view and command forwarding.

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};

use crate::api::dto::{DeviceCommandRequest, TelemetryResponse};
use crate::app_state::AppState;
use crate::error::{CompanionError, ErrorResponse};

/// `GET /telemetry`: Merged telemetry and connection state.
#[utoipa::path(
    get,
    path = "/api/v1/telemetry",
    tag = "Device",
    summary = "Current telemetry",
    description = "Returns the merged telemetry snapshot, its revision and the device connection state.",
    responses(
        (status = 200, description = "Telemetry view", body = TelemetryResponse),
    )
)]
pub async fn get_telemetry(State(state): State<AppState>) -> impl IntoResponse {
    Json(TelemetryResponse::from(&state.telemetry))
}

/// `POST /device/commands`: Queue a command for the live link.
///
/// # Errors
///
/// Returns [`CompanionError::InvalidRequest`] for an empty command and
/// [`CompanionError::Connection`] when the device is not connected.
#[utoipa::path(
    post,
    path = "/api/v1/device/commands",
    tag = "Device",
    summary = "Send a device command",
    description = "Queues a raw command on the live device link. Commands are never buffered across reconnects.",
    request_body = DeviceCommandRequest,
    responses(
        (status = 202, description = "Command queued"),
        (status = 400, description = "Empty command", body = ErrorResponse),
        (status = 503, description = "Device not connected", body = ErrorResponse),
    )
)]
pub async fn send_command(
    State(state): State<AppState>,
    Json(req): Json<DeviceCommandRequest>,
) -> Result<impl IntoResponse, CompanionError> {
    if req.command.trim().is_empty() {
        return Err(CompanionError::InvalidRequest(
            "command must not be empty".to_string(),
        ));
    }
    state.commands.send(req.command)?;
    Ok(StatusCode::ACCEPTED)
}

/// Device routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/telemetry", get(get_telemetry))
        .route("/device/commands", post(send_command))
}
