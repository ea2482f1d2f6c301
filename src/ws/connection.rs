//! WebSocket connection state machine.
//!
//! Handles the read/write loop for a single WebSocket connection,
//! dispatching incoming commands and forwarding filtered events.

use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket};
use futures_util::{SinkExt, StreamExt};
use tokio::sync::broadcast;

use super::messages::{TopicSelection, WsCommand, WsMessage, WsMessageType};
use super::subscription::SubscriptionManager;
use crate::api::dto::TelemetryResponse;
use crate::app_state::AppState;
use crate::domain::{CompanionEvent, ResourceKey};

/// Runs the read/write loop for a single WebSocket connection.
///
/// - Reads commands from the client and dispatches them.
/// - Forwards matching events from the [`broadcast::Receiver`] to the client.
pub async fn run_connection(
    socket: WebSocket,
    mut event_rx: broadcast::Receiver<CompanionEvent>,
    state: AppState,
) {
    let (mut ws_tx, mut ws_rx) = socket.split();
    let mut subs = SubscriptionManager::new();

    loop {
        tokio::select! {
            // Incoming message from client
            msg = ws_rx.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        let response = handle_text_message(&text, &mut subs, &state);
                        if let Some(resp_json) = response
                            && ws_tx.send(Message::text(resp_json)).await.is_err() {
                                break;
                            }
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    _ => {}
                }
            }
            // Event from EventBus
            event = event_rx.recv() => {
                match event {
                    Ok(event) => {
                        if subs.matches(event.topic()) {
                            let json = serde_json::to_string(&WsMessage::event(&event))
                                .unwrap_or_default();
                            if ws_tx.send(Message::text(json)).await.is_err() {
                                break;
                            }
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        tracing::warn!(lagged = n, "ws client lagged behind event bus");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        }
    }

    tracing::debug!("ws connection closed");
}

/// Handles a text message from the client, returning an optional JSON response.
fn handle_text_message(
    text: &str,
    subs: &mut SubscriptionManager,
    state: &AppState,
) -> Option<String> {
    let reply = match serde_json::from_str::<WsMessage>(text) {
        Err(_) => WsMessage::error(String::new(), 400, "malformed JSON"),
        Ok(msg) if msg.msg_type != WsMessageType::Command => {
            WsMessage::error(msg.id, 400, "expected a command")
        }
        Ok(msg) => match serde_json::from_value::<WsCommand>(msg.payload) {
            Ok(command) => dispatch(msg.id, command, subs, state),
            Err(_) => WsMessage::error(msg.id, 404, "unknown command"),
        },
    };
    serde_json::to_string(&reply).ok()
}

fn dispatch(
    id: String,
    command: WsCommand,
    subs: &mut SubscriptionManager,
    state: &AppState,
) -> WsMessage {
    match command {
        WsCommand::Subscribe { topics } => {
            let selection = TopicSelection::parse(&topics);
            subs.subscribe(&selection.topics, selection.wildcard);
            WsMessage::response(
                id,
                serde_json::json!({
                    "subscribed": subs.active(),
                    "rejected": selection.rejected,
                    "wildcard": subs.is_subscribed_all(),
                }),
            )
        }
        WsCommand::Unsubscribe { topics } => {
            let selection = TopicSelection::parse(&topics);
            subs.unsubscribe(&selection.topics, selection.wildcard);
            WsMessage::response(
                id,
                serde_json::json!({
                    "subscribed": subs.active(),
                    "rejected": selection.rejected,
                    "remaining_count": subs.count(),
                }),
            )
        }
        WsCommand::Refresh { resource } => {
            let Ok(key) = resource.parse::<ResourceKey>() else {
                return WsMessage::error(id, 400, format!("unknown resource: {resource}"));
            };
            let releases = Arc::clone(&state.releases);
            tokio::spawn(async move {
                let outcome = releases.refresh(key).await;
                tracing::debug!(resource = %key, ?outcome, "ws refresh finished");
            });
            WsMessage::response(id, serde_json::json!({ "refresh": key, "accepted": true }))
        }
        WsCommand::GetTelemetry => WsMessage::response(
            id,
            serde_json::to_value(TelemetryResponse::from(&state.telemetry)).unwrap_or_default(),
        ),
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use async_trait::async_trait;

    use super::*;
    use crate::config::CompanionConfig;
    use crate::device::{DeviceConnector, DeviceLink};
    use crate::domain::{Release, Topic};
    use crate::error::{ConnectionError, FetchError};
    use crate::session::CompanionSession;
    use crate::service::ReleaseApi;

    #[derive(Debug)]
    struct Offline;

    #[async_trait]
    impl DeviceConnector for Offline {
        async fn connect(&self) -> Result<Box<dyn DeviceLink>, ConnectionError> {
            Err(ConnectionError::Handshake("offline".to_string()))
        }

        fn endpoint(&self) -> &str {
            "ws://offline/livedata"
        }
    }

    #[derive(Debug)]
    struct Empty;

    #[async_trait]
    impl ReleaseApi for Empty {
        async fn list_releases(&self, _key: ResourceKey) -> Result<Vec<Release>, FetchError> {
            Ok(Vec::new())
        }
    }

    async fn session() -> CompanionSession {
        let Ok(config) = CompanionConfig::from_lookup(|_| None) else {
            panic!("default config should load");
        };
        CompanionSession::start_with(&config, Arc::new(Offline), Arc::new(Empty)).await
    }

    fn reply(text: &str, subs: &mut SubscriptionManager, state: &AppState) -> WsMessage {
        let Some(json) = handle_text_message(text, subs, state) else {
            panic!("expected a reply");
        };
        let Ok(msg) = serde_json::from_str::<WsMessage>(&json) else {
            panic!("reply should be an envelope");
        };
        msg
    }

    #[tokio::test]
    async fn subscribe_reports_active_topics() {
        let session = session().await;
        let state = session.state();
        let mut subs = SubscriptionManager::new();

        let msg = reply(
            r#"{"id":"1","type":"command","payload":{"command":"subscribe","topics":["connection","bogus"]}}"#,
            &mut subs,
            &state,
        );
        assert_eq!(msg.id, "1");
        assert_eq!(msg.msg_type, WsMessageType::Response);
        assert_eq!(msg.payload["subscribed"], serde_json::json!(["connection"]));
        assert_eq!(msg.payload["rejected"], serde_json::json!(["bogus"]));
        assert!(subs.matches(Topic::Connection));

        session.shutdown().await;
    }

    #[tokio::test]
    async fn malformed_and_unknown_commands_are_errors() {
        let session = session().await;
        let state = session.state();
        let mut subs = SubscriptionManager::new();

        let msg = reply("not json", &mut subs, &state);
        assert_eq!(msg.msg_type, WsMessageType::Error);
        assert_eq!(msg.payload["code"], 400);

        let msg = reply(
            r#"{"id":"2","type":"command","payload":{"command":"reboot"}}"#,
            &mut subs,
            &state,
        );
        assert_eq!(msg.payload["code"], 404);

        let msg = reply(
            r#"{"id":"3","type":"command","payload":{"command":"refresh","resource":"docs"}}"#,
            &mut subs,
            &state,
        );
        assert_eq!(msg.msg_type, WsMessageType::Error);

        session.shutdown().await;
    }

    #[tokio::test]
    async fn get_telemetry_returns_view() {
        let session = session().await;
        let state = session.state();
        let mut subs = SubscriptionManager::new();

        let msg = reply(
            r#"{"id":"4","type":"command","payload":{"command":"get_telemetry"}}"#,
            &mut subs,
            &state,
        );
        assert_eq!(msg.payload["revision"], 0);
        assert!(msg.payload["snapshot"].is_null());

        session.shutdown().await;
    }
}
