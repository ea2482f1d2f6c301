//! WebSocket layer: connection handling, message routing, subscriptions.
//!
//! The WebSocket endpoint at `/ws` streams [`CompanionEvent`]s to UI
//! consumers. Clients pick topics with `subscribe`/`unsubscribe` and may
//! trigger a release `refresh`.
//!
//! [`CompanionEvent`]: crate::domain::CompanionEvent

pub mod connection;
pub mod handler;
pub mod messages;
pub mod subscription;
