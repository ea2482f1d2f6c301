//! Domain layer: telemetry, releases, version logic and events.
//!
//! Everything here is transport-agnostic. The device link lives in
//! [`crate::device`], network fetches in [`crate::service`].

pub mod connection_state;
pub mod event;
pub mod event_bus;
pub mod release;
pub mod release_cache;
pub mod settings;
pub mod telemetry;
pub mod telemetry_store;
pub mod update_advisor;
pub mod version;

pub use connection_state::ConnectionState;
pub use event::{CompanionEvent, Topic};
pub use event_bus::EventBus;
pub use release::{Release, ReleaseResource, ResourceKey};
pub use release_cache::ReleaseCache;
pub use settings::{Language, Settings, SettingsStore, SettingsUpdate, Theme};
pub use telemetry::{TelemetryFields, TelemetrySnapshot};
pub use telemetry_store::{Selection, TelemetryStore};
pub use update_advisor::{ReleaseBadges, UpdateAdvice, UpdateAdvisor};
