//! Device DTOs: telemetry view and outbound commands.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::domain::{ConnectionState, TelemetrySnapshot, TelemetryStore};

/// Response body for `GET /telemetry`.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct TelemetryResponse {
    /// Number of updates applied so far.
    pub revision: u64,
    /// Current device connection state.
    pub connection: ConnectionState,
    /// Time of the last applied update.
    pub updated_at: Option<DateTime<Utc>>,
    /// Merged telemetry, `null` until the first message.
    pub snapshot: Option<TelemetrySnapshot>,
}

impl From<&TelemetryStore> for TelemetryResponse {
    fn from(store: &TelemetryStore) -> Self {
        Self {
            revision: store.revision(),
            connection: store.connection_state(),
            updated_at: store.updated_at(),
            snapshot: store.snapshot(),
        }
    }
}

/// Request body for `POST /device/commands`.
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct DeviceCommandRequest {
    /// Raw command text sent on the live link.
    pub command: String,
}
