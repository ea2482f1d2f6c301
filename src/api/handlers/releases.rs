//! Release handlers: cached lists, manual refresh and update advice.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};

use crate::api::dto::RefreshResponse;
use crate::app_state::AppState;
use crate::domain::{ResourceKey, UpdateAdvice};
use crate::error::{CompanionError, ErrorResponse};
use crate::service::{FetchOutcome, ReleaseListing};

/// `GET /releases/{resource}`: Cached releases with badges.
///
/// # Errors
///
/// Returns [`CompanionError::UnknownResource`] for keys other than
/// `firmware` and `app`.
#[utoipa::path(
    get,
    path = "/api/v1/releases/{resource}",
    tag = "Releases",
    summary = "Cached releases",
    description = "Returns the cache entry of a resource with derived per-release badges. Never triggers a fetch.",
    params(("resource" = ResourceKey, Path, description = "`firmware` or `app`")),
    responses(
        (status = 200, description = "Cache entry", body = ReleaseListing),
        (status = 400, description = "Unknown resource", body = ErrorResponse),
    )
)]
pub async fn get_releases(
    State(state): State<AppState>,
    Path(resource): Path<String>,
) -> Result<impl IntoResponse, CompanionError> {
    let key: ResourceKey = resource.parse()?;
    Ok(Json(state.updates.listing(key).await))
}

/// `POST /releases/{resource}/refresh`: Forced fetch.
///
/// # Errors
///
/// Returns [`CompanionError::UnknownResource`] for an unknown key and
/// [`CompanionError::Fetch`] when the fetch fails. The previous list stays
/// cached in that case.
#[utoipa::path(
    post,
    path = "/api/v1/releases/{resource}/refresh",
    tag = "Releases",
    summary = "Refresh releases",
    description = "Fetches the release list regardless of its age. Skipped only when a fetch for the resource is already in flight.",
    params(("resource" = ResourceKey, Path, description = "`firmware` or `app`")),
    responses(
        (status = 200, description = "Fetched or skipped", body = RefreshResponse),
        (status = 400, description = "Unknown resource", body = ErrorResponse),
        (status = 429, description = "Rate limited by the release API", body = ErrorResponse),
        (status = 502, description = "Release API failure", body = ErrorResponse),
        (status = 504, description = "Release API timeout", body = ErrorResponse),
    )
)]
pub async fn refresh_releases(
    State(state): State<AppState>,
    Path(resource): Path<String>,
) -> Result<impl IntoResponse, CompanionError> {
    let key: ResourceKey = resource.parse()?;

    // Detached so a dropped request cannot leave the entry marked in flight.
    let releases = Arc::clone(&state.releases);
    let outcome = tokio::spawn(async move { releases.refresh(key).await })
        .await
        .map_err(|e| CompanionError::Internal(format!("refresh task failed: {e}")))?;

    match outcome {
        FetchOutcome::Failed { error } => Err(error.into()),
        outcome => Ok(Json(RefreshResponse {
            resource: key,
            outcome,
        })),
    }
}

/// `GET /updates/{resource}`: Update advice.
///
/// # Errors
///
/// Returns [`CompanionError::UnknownResource`] for an unknown key.
#[utoipa::path(
    get,
    path = "/api/v1/updates/{resource}",
    tag = "Releases",
    summary = "Update advice",
    description = "Compares the installed version with the cached releases.",
    params(("resource" = ResourceKey, Path, description = "`firmware` or `app`")),
    responses(
        (status = 200, description = "Advice", body = UpdateAdvice),
        (status = 400, description = "Unknown resource", body = ErrorResponse),
    )
)]
pub async fn get_updates(
    State(state): State<AppState>,
    Path(resource): Path<String>,
) -> Result<impl IntoResponse, CompanionError> {
    let key: ResourceKey = resource.parse()?;
    Ok(Json(state.updates.advice(key).await))
}

/// Release routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/releases/{resource}", get(get_releases))
        .route("/releases/{resource}/refresh", post(refresh_releases))
        .route("/updates/{resource}", get(get_updates))
}
