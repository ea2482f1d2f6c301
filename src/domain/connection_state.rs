//! Device link state.

use std::fmt;

use serde::Serialize;
use utoipa::ToSchema;

/// State of the link to the DTU.
///
/// Written only by the device connection manager; everything else holds a
/// `watch::Receiver` and reads it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionState {
    /// First handshake in progress.
    #[default]
    Connecting,
    /// Link established and receiving data.
    Connected,
    /// Link lost (error, remote close or missed liveness).
    Disconnected,
    /// Waiting out a backoff delay before the next attempt.
    Reconnecting,
}

impl ConnectionState {
    /// Returns `true` only for [`ConnectionState::Connected`].
    #[must_use]
    pub const fn is_connected(self) -> bool {
        matches!(self, Self::Connected)
    }

    /// Lowercase name used in logs and API payloads.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Connecting => "connecting",
            Self::Connected => "connected",
            Self::Disconnected => "disconnected",
            Self::Reconnecting => "reconnecting",
        }
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_connected_is_connected() {
        assert!(ConnectionState::Connected.is_connected());
        assert!(!ConnectionState::Connecting.is_connected());
        assert!(!ConnectionState::Disconnected.is_connected());
        assert!(!ConnectionState::Reconnecting.is_connected());
    }

    #[test]
    fn serializes_snake_case() {
        let json = serde_json::to_string(&ConnectionState::Reconnecting).unwrap_or_default();
        assert_eq!(json, "\"reconnecting\"");
        assert_eq!(ConnectionState::Disconnected.to_string(), "disconnected");
    }
}
