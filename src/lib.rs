//! # dtu-companion
//!
//! State synchronization and release-freshness core for an OpenDTU
//! companion client.
//!
//! The crate keeps a live view of one DTU (merged telemetry plus the
//! connection state), keeps the firmware and app release lists fresh
//! without hammering the GitHub API, and derives update advice from both.
//! A local HTTP and WebSocket API exposes the state to UI consumers.
//!
//! ## Architecture
//!
//! ```text
//! UI consumers (HTTP, WebSocket)
//!     │
//!     ├── REST Handlers (api/)
//!     ├── WS Handler (ws/)
//!     │
//!     ├── UpdateService, ReleaseFetchController (service/)
//!     ├── EventBus, TelemetryStore, ReleaseCache (domain/)
//!     │
//!     ├── DeviceConnectionManager (device/) ── DTU /livedata WebSocket
//!     ├── GithubReleaseApi (service/) ──────── GitHub REST
//!     │
//!     └── JSON file persistence (persistence/)
//! ```

pub mod api;
pub mod app_state;
pub mod config;
pub mod device;
pub mod domain;
pub mod error;
pub mod persistence;
pub mod service;
pub mod session;
pub mod ws;
