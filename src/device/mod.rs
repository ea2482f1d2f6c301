//! Device layer: the live link to the DTU.
//!
//! [`DeviceConnectionManager`] owns the connection state machine. It talks
//! to the device through the [`DeviceConnector`] / [`DeviceLink`] traits;
//! [`WsConnector`] is the WebSocket implementation used in production.

pub mod backoff;
pub mod manager;
pub mod transport;
pub mod websocket;

pub use backoff::{Backoff, BackoffConfig};
pub use manager::{DeviceCommands, DeviceConnectionManager, ManagerConfig};
pub use transport::{DeviceConnector, DeviceLink};
pub use websocket::WsConnector;
