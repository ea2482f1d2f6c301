//! WebSocket message types: envelope, commands, and events.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::{CompanionEvent, Topic};

/// Top-level WebSocket message envelope.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WsMessage {
    /// Client-provided ID for requests; server-generated for events.
    #[serde(default)]
    pub id: String,
    /// Message type discriminator.
    #[serde(rename = "type")]
    pub msg_type: WsMessageType,
    /// ISO-8601 timestamp.
    #[serde(default = "Utc::now")]
    pub timestamp: DateTime<Utc>,
    /// Variant-specific payload.
    #[serde(default)]
    pub payload: serde_json::Value,
}

impl WsMessage {
    /// Response to the command with `id`.
    #[must_use]
    pub fn response(id: String, payload: serde_json::Value) -> Self {
        Self {
            id,
            msg_type: WsMessageType::Response,
            timestamp: Utc::now(),
            payload,
        }
    }

    /// Error reply to the message with `id`.
    #[must_use]
    pub fn error(id: String, code: u16, message: impl Into<String>) -> Self {
        Self {
            id,
            msg_type: WsMessageType::Error,
            timestamp: Utc::now(),
            payload: serde_json::json!({
                "code": code,
                "message": message.into(),
            }),
        }
    }

    /// Broadcast of a domain event.
    #[must_use]
    pub fn event(event: &CompanionEvent) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            msg_type: WsMessageType::Event,
            timestamp: Utc::now(),
            payload: serde_json::json!({
                "topic": event.topic().as_str(),
                "event": event,
            }),
        }
    }
}

/// Discriminator for WebSocket message types.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum WsMessageType {
    /// Client → Server command.
    Command,
    /// Server → Client response to a command.
    Response,
    /// Server → Client broadcast event.
    Event,
    /// Server → Client error.
    Error,
}

/// Commands that a client can send over WebSocket.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "command", rename_all = "snake_case")]
pub enum WsCommand {
    /// Subscribe to event topics.
    Subscribe {
        /// Topic names. Use `["*"]` for every topic.
        topics: Vec<String>,
    },
    /// Unsubscribe from event topics.
    Unsubscribe {
        /// Topic names. `"*"` drops every subscription.
        topics: Vec<String>,
    },
    /// Force a release fetch. The result arrives as a release event.
    Refresh {
        /// `firmware` or `app`.
        resource: String,
    },
    /// Current telemetry view.
    GetTelemetry,
}

/// Topic names parsed from a command.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct TopicSelection {
    /// Known topics.
    pub topics: Vec<Topic>,
    /// `"*"` was present.
    pub wildcard: bool,
    /// Names that are not topics.
    pub rejected: Vec<String>,
}

impl TopicSelection {
    /// Sorts `names` into topics, the wildcard and rejects.
    #[must_use]
    pub fn parse(names: &[String]) -> Self {
        let mut selection = Self::default();
        for name in names {
            if name == "*" {
                selection.wildcard = true;
            } else if let Ok(topic) = name.parse::<Topic>() {
                selection.topics.push(topic);
            } else {
                selection.rejected.push(name.clone());
            }
        }
        selection
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use crate::domain::{ConnectionState, ResourceKey};

    #[test]
    fn command_envelope_without_timestamp_parses() {
        let raw = r#"{"id":"7","type":"command","payload":{"command":"subscribe","topics":["telemetry","*"]}}"#;
        let Ok(msg) = serde_json::from_str::<WsMessage>(raw) else {
            panic!("envelope should parse");
        };
        assert_eq!(msg.msg_type, WsMessageType::Command);
        let Ok(command) = serde_json::from_value::<WsCommand>(msg.payload) else {
            panic!("command should parse");
        };
        assert_eq!(
            command,
            WsCommand::Subscribe {
                topics: vec!["telemetry".to_string(), "*".to_string()]
            }
        );
    }

    #[test]
    fn unit_command_parses() {
        let parsed = serde_json::from_str::<WsCommand>(r#"{"command":"get_telemetry"}"#);
        assert!(matches!(parsed, Ok(WsCommand::GetTelemetry)));
    }

    #[test]
    fn topic_selection_sorts_names() {
        let names = ["releases:app", "*", "inverters"].map(String::from);
        let selection = TopicSelection::parse(&names);
        assert_eq!(selection.topics, vec![Topic::Releases(ResourceKey::App)]);
        assert!(selection.wildcard);
        assert_eq!(selection.rejected, vec!["inverters".to_string()]);
    }

    #[test]
    fn event_message_carries_topic() {
        let event = CompanionEvent::ConnectionChanged {
            state: ConnectionState::Connected,
            timestamp: Utc::now(),
        };
        let msg = WsMessage::event(&event);
        assert_eq!(msg.msg_type, WsMessageType::Event);
        assert_eq!(msg.payload["topic"], "connection");
        assert_eq!(msg.payload["event"]["event_type"], "connection_changed");
    }
}
