//! Shared application state injected into all Axum handlers.

use std::sync::Arc;

use crate::device::DeviceCommands;
use crate::domain::{EventBus, SettingsStore, TelemetryStore};
use crate::service::{ReleaseFetchController, UpdateService};

/// Shared application state available to all handlers via Axum's
/// `State` extractor.
#[derive(Debug, Clone)]
pub struct AppState {
    /// Latest device telemetry and connection state.
    pub telemetry: TelemetryStore,
    /// Outbound device commands.
    pub commands: DeviceCommands,
    /// Release cache owner.
    pub releases: Arc<ReleaseFetchController>,
    /// Update advice and firmware selection.
    pub updates: Arc<UpdateService>,
    /// User settings.
    pub settings: SettingsStore,
    /// Event bus for WebSocket subscriptions.
    pub event_bus: EventBus,
}
