//! Settings handlers.

use axum::extract::State;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};

use crate::app_state::AppState;
use crate::domain::{Settings, SettingsUpdate};
use crate::error::{CompanionError, ErrorResponse};

/// `GET /settings`: Current settings.
#[utoipa::path(
    get,
    path = "/api/v1/settings",
    tag = "Settings",
    summary = "Current settings",
    responses(
        (status = 200, description = "Settings", body = Settings),
    )
)]
pub async fn get_settings(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.settings.get())
}

/// `PUT /settings`: Partial settings update.
///
/// # Errors
///
/// Returns [`CompanionError::Persistence`] if the settings file cannot be
/// written.
#[utoipa::path(
    put,
    path = "/api/v1/settings",
    tag = "Settings",
    summary = "Update settings",
    description = "Applies the given fields and persists the result. Omitted fields keep their value.",
    request_body = SettingsUpdate,
    responses(
        (status = 200, description = "Updated settings", body = Settings),
        (status = 500, description = "Settings could not be saved", body = ErrorResponse),
    )
)]
pub async fn put_settings(
    State(state): State<AppState>,
    Json(update): Json<SettingsUpdate>,
) -> Result<impl IntoResponse, CompanionError> {
    let settings = state.settings.update(&update).await?;
    Ok(Json(settings))
}

/// Settings routes.
pub fn routes() -> Router<AppState> {
    Router::new().route("/settings", get(get_settings).put(put_settings))
}
