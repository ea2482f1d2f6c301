//! REST API layer: route handlers, DTOs, and router composition.
//!
//! All endpoints except `/health` are mounted under `/api/v1`. With the
//! `swagger-ui` feature the OpenAPI document is served at
//! `/api-docs/openapi.json` and browsable at `/swagger-ui`.

pub mod dto;
pub mod handlers;

use axum::Router;
use utoipa::OpenApi;

use crate::app_state::AppState;

/// OpenAPI description of the REST API.
#[derive(Debug, OpenApi)]
#[openapi(
    info(
        title = "dtu-companion",
        description = "Telemetry, release freshness and update advice for one OpenDTU."
    ),
    paths(
        handlers::system::health_handler,
        handlers::device::get_telemetry,
        handlers::device::send_command,
        handlers::releases::get_releases,
        handlers::releases::refresh_releases,
        handlers::releases::get_updates,
        handlers::settings::get_settings,
        handlers::settings::put_settings,
        handlers::firmware::select_firmware,
    ),
    tags(
        (name = "System", description = "Service health"),
        (name = "Device", description = "Live DTU state"),
        (name = "Releases", description = "Firmware and app releases"),
        (name = "Settings", description = "User settings"),
        (name = "Firmware", description = "Firmware install selection"),
    )
)]
pub struct ApiDoc;

/// Builds the complete API router with all REST endpoints.
pub fn build_router() -> Router<AppState> {
    let router = Router::new()
        .nest("/api/v1", handlers::routes())
        .merge(handlers::system::routes());

    #[cfg(feature = "swagger-ui")]
    let router = router.merge(
        utoipa_swagger_ui::SwaggerUi::new("/swagger-ui")
            .url("/api-docs/openapi.json", ApiDoc::openapi()),
    );

    router
}
