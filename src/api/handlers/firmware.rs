//! Firmware install selection.

use axum::extract::State;
use axum::response::IntoResponse;
use axum::routing::post;
use axum::{Json, Router};

use crate::api::dto::FirmwareSelectionRequest;
use crate::app_state::AppState;
use crate::error::{CompanionError, ErrorResponse};
use crate::service::FirmwareSelection;

/// `POST /firmware/selection`: Select a firmware release to install.
///
/// # Errors
///
/// Returns [`CompanionError::ReleaseNotFound`] if the tag is not cached and
/// [`CompanionError::InstallNotAllowed`] if device credentials are missing
/// or the release is already installed.
#[utoipa::path(
    post,
    path = "/api/v1/firmware/selection",
    tag = "Firmware",
    summary = "Select firmware to install",
    description = "Validates the selection against the cached firmware releases and emits a `firmware_selected` event. The transfer to the device is handled elsewhere.",
    request_body = FirmwareSelectionRequest,
    responses(
        (status = 200, description = "Selection accepted", body = FirmwareSelection),
        (status = 404, description = "Release not cached", body = ErrorResponse),
        (status = 409, description = "Install not allowed", body = ErrorResponse),
    )
)]
pub async fn select_firmware(
    State(state): State<AppState>,
    Json(req): Json<FirmwareSelectionRequest>,
) -> Result<impl IntoResponse, CompanionError> {
    let selection = state.updates.select_firmware(req.tag.trim()).await?;
    Ok(Json(selection))
}

/// Firmware routes.
pub fn routes() -> Router<AppState> {
    Router::new().route("/firmware/selection", post(select_firmware))
}
