//! Device transport seam.
//!
//! The manager only needs "open a link", "next inbound message", "send a
//! command". Keeping that behind traits lets tests script the device.

use async_trait::async_trait;

use crate::error::ConnectionError;

/// Opens links to the device.
#[async_trait]
pub trait DeviceConnector: Send + Sync + std::fmt::Debug {
    /// Performs the handshake and returns a live link.
    async fn connect(&self) -> Result<Box<dyn DeviceLink>, ConnectionError>;

    /// Human-readable endpoint for logging.
    fn endpoint(&self) -> &str;
}

/// One established link to the device.
#[async_trait]
pub trait DeviceLink: Send {
    /// Waits for the next inbound text message.
    ///
    /// `None` means the device closed the link. Must be cancel-safe: the
    /// manager races it against timers and commands.
    async fn next_message(&mut self) -> Option<Result<String, ConnectionError>>;

    /// Sends a command to the device.
    async fn send(&mut self, command: String) -> Result<(), ConnectionError>;

    /// Closes the link. Errors are ignored.
    async fn close(&mut self) {}
}
