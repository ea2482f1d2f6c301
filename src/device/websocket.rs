//! WebSocket device transport (`/livedata`).

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::tungstenite::http::header::AUTHORIZATION;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};

use super::transport::{DeviceConnector, DeviceLink};
use crate::error::ConnectionError;

/// Connects to the DTU live data WebSocket.
#[derive(Debug, Clone)]
pub struct WsConnector {
    url: String,
    auth: Option<String>,
}

impl WsConnector {
    /// Creates a connector for `url`. `auth` is the base64 `user:password`
    /// sent as HTTP Basic credentials.
    #[must_use]
    pub fn new(url: impl Into<String>, auth: Option<String>) -> Self {
        Self {
            url: url.into(),
            auth,
        }
    }
}

#[async_trait]
impl DeviceConnector for WsConnector {
    async fn connect(&self) -> Result<Box<dyn DeviceLink>, ConnectionError> {
        let mut request = self
            .url
            .as_str()
            .into_client_request()
            .map_err(|e| ConnectionError::Handshake(e.to_string()))?;

        if let Some(auth) = &self.auth {
            let value = HeaderValue::from_str(&format!("Basic {auth}"))
                .map_err(|e| ConnectionError::Handshake(e.to_string()))?;
            request.headers_mut().insert(AUTHORIZATION, value);
        }

        let (stream, response) = connect_async(request)
            .await
            .map_err(|e| ConnectionError::Handshake(e.to_string()))?;
        tracing::debug!(url = %self.url, status = %response.status(), "websocket handshake done");

        Ok(Box::new(WsLink { stream }))
    }

    fn endpoint(&self) -> &str {
        &self.url
    }
}

struct WsLink {
    stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
}

#[async_trait]
impl DeviceLink for WsLink {
    async fn next_message(&mut self) -> Option<Result<String, ConnectionError>> {
        loop {
            match self.stream.next().await? {
                Ok(Message::Text(text)) => return Some(Ok(text.as_str().to_string())),
                Ok(Message::Binary(bytes)) => match std::str::from_utf8(&bytes) {
                    Ok(text) => return Some(Ok(text.to_string())),
                    Err(_) => tracing::debug!(len = bytes.len(), "ignoring non-utf8 frame"),
                },
                Ok(Message::Close(_)) => return None,
                Ok(Message::Ping(_) | Message::Pong(_) | Message::Frame(_)) => {}
                Err(e) => return Some(Err(ConnectionError::Transport(e.to_string()))),
            }
        }
    }

    async fn send(&mut self, command: String) -> Result<(), ConnectionError> {
        self.stream
            .send(Message::text(command))
            .await
            .map_err(|e| ConnectionError::Transport(e.to_string()))
    }

    async fn close(&mut self) {
        let _ = self.stream.close(None).await;
    }
}
