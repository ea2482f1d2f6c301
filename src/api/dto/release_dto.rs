//! Release DTOs for refresh and firmware selection.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::domain::ResourceKey;
use crate::service::FetchOutcome;

/// Response body for `POST /releases/{resource}/refresh`.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct RefreshResponse {
    /// Refreshed resource.
    pub resource: ResourceKey,
    /// What the refresh did.
    pub outcome: FetchOutcome,
}

/// Request body for `POST /firmware/selection`.
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct FirmwareSelectionRequest {
    /// Tag of the release to install. A leading `v` is optional.
    pub tag: String,
}
