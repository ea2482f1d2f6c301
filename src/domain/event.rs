//! Domain events reflecting state changes in the core.
//!
//! Every state change emits a [`CompanionEvent`] through the
//! [`super::EventBus`]. WebSocket clients receive the events whose
//! [`Topic`] they subscribed to.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::connection_state::ConnectionState;
use super::release::ResourceKey;
use super::telemetry::TelemetrySnapshot;
use crate::error::FetchError;

/// Subscription topic of an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Topic {
    /// Telemetry snapshot updates.
    Telemetry,
    /// Device connection state transitions.
    Connection,
    /// Release cache activity for one resource.
    Releases(ResourceKey),
}

impl Topic {
    /// Every topic, used to expand the `*` wildcard.
    pub const ALL: [Self; 4] = [
        Self::Telemetry,
        Self::Connection,
        Self::Releases(ResourceKey::Firmware),
        Self::Releases(ResourceKey::App),
    ];

    /// Wire name of the topic.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Telemetry => "telemetry",
            Self::Connection => "connection",
            Self::Releases(ResourceKey::Firmware) => "releases:firmware",
            Self::Releases(ResourceKey::App) => "releases:app",
        }
    }
}

impl fmt::Display for Topic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Topic {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|topic| topic.as_str() == s)
            .ok_or_else(|| format!("unknown topic: {s}"))
    }
}

/// Domain event emitted after every state change.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event_type", rename_all = "snake_case")]
pub enum CompanionEvent {
    /// A device message was merged into the snapshot.
    TelemetryUpdated {
        /// Store revision after the merge.
        revision: u64,
        /// Snapshot after the merge.
        snapshot: Box<TelemetrySnapshot>,
        /// Merge timestamp.
        timestamp: DateTime<Utc>,
    },

    /// The device link changed state.
    ConnectionChanged {
        /// New state.
        state: ConnectionState,
        /// Transition timestamp.
        timestamp: DateTime<Utc>,
    },

    /// A release fetch started.
    ReleaseFetchStarted {
        /// Resource being fetched.
        resource: ResourceKey,
        /// Whether the fetch was user-forced.
        forced: bool,
        /// Start timestamp.
        timestamp: DateTime<Utc>,
    },

    /// A release fetch succeeded and the cache entry was replaced.
    ReleasesUpdated {
        /// Resource that was refreshed.
        resource: ResourceKey,
        /// Number of releases now cached.
        count: usize,
        /// Tag of the newest release, if any.
        latest_tag: Option<String>,
        /// Commit timestamp.
        timestamp: DateTime<Utc>,
    },

    /// A release fetch failed; the previous list is still cached.
    ReleaseFetchFailed {
        /// Resource whose fetch failed.
        resource: ResourceKey,
        /// The failure.
        error: FetchError,
        /// Failure timestamp.
        timestamp: DateTime<Utc>,
    },

    /// The user selected a firmware release for installation.
    FirmwareSelected {
        /// Selected release tag.
        tag: String,
        /// Version installed at selection time, when known.
        installed: Option<String>,
        /// Selection timestamp.
        timestamp: DateTime<Utc>,
    },
}

impl CompanionEvent {
    /// Returns the topic this event is delivered on.
    #[must_use]
    pub const fn topic(&self) -> Topic {
        match self {
            Self::TelemetryUpdated { .. } => Topic::Telemetry,
            Self::ConnectionChanged { .. } => Topic::Connection,
            Self::ReleaseFetchStarted { resource, .. }
            | Self::ReleasesUpdated { resource, .. }
            | Self::ReleaseFetchFailed { resource, .. } => Topic::Releases(*resource),
            Self::FirmwareSelected { .. } => Topic::Releases(ResourceKey::Firmware),
        }
    }

    /// Returns the event type as a static string slice.
    #[must_use]
    pub const fn event_type_str(&self) -> &'static str {
        match self {
            Self::TelemetryUpdated { .. } => "telemetry_updated",
            Self::ConnectionChanged { .. } => "connection_changed",
            Self::ReleaseFetchStarted { .. } => "release_fetch_started",
            Self::ReleasesUpdated { .. } => "releases_updated",
            Self::ReleaseFetchFailed { .. } => "release_fetch_failed",
            Self::FirmwareSelected { .. } => "firmware_selected",
        }
    }
}
