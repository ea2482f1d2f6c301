//! Device connection state machine.
//!
//! ```text
//! Connecting ──ok──▶ Connected ──error / close / liveness──▶ Disconnected
//!     │                  ▲                                      │
//!     │ fail / timeout   │ backoff, attempt ok                  │
//!     ▼                  │                                      │
//! Reconnecting ──────────┘                                      │
//!   ▲ ▲  │ backoff, attempt fails / times out                   │
//!   │ └──┘                                                      │
//!   └───────────────────────────────────────────────────────────┘
//! ```
//!
//! Each handshake is bounded by [`ManagerConfig::connect_timeout`]. Every
//! reconnect attempt, including the first one after a lost link, waits the
//! next backoff delay.
//!
//! [`DeviceConnectionManager`] is the only writer of [`ConnectionState`].
//! Every transition goes to the `watch` channel read by the
//! [`TelemetryStore`] and to the [`EventBus`]. Inbound messages are merged
//! into the store; malformed ones are logged and dropped without touching
//! the link.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::{mpsc, watch};
use tokio::time::Instant;

use super::backoff::{Backoff, BackoffConfig};
use super::transport::{DeviceConnector, DeviceLink};
use crate::domain::{CompanionEvent, ConnectionState, EventBus, TelemetryFields, TelemetryStore};
use crate::error::ConnectionError;

/// Manager timing parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct ManagerConfig {
    /// Maximum silence on a live link before it is considered lost.
    pub liveness_timeout: Duration,
    /// Upper bound for one handshake. An attempt that takes longer counts
    /// as failed.
    pub connect_timeout: Duration,
    /// Reconnect delays.
    pub backoff: BackoffConfig,
    /// Capacity of the outbound command queue.
    pub command_buffer: usize,
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            liveness_timeout: Duration::from_secs(30),
            connect_timeout: Duration::from_secs(10),
            backoff: BackoffConfig::default(),
            command_buffer: 16,
        }
    }
}

/// Sender half for commands to the device.
#[derive(Debug, Clone)]
pub struct DeviceCommands {
    tx: mpsc::Sender<String>,
    state: watch::Receiver<ConnectionState>,
}

impl DeviceCommands {
    /// Queues `command` for the live link.
    ///
    /// # Errors
    ///
    /// Returns [`ConnectionError::NotConnected`] if no link is up or the
    /// queue is full.
    pub fn send(&self, command: impl Into<String>) -> Result<(), ConnectionError> {
        if !self.state.borrow().is_connected() {
            return Err(ConnectionError::NotConnected);
        }
        self.tx
            .try_send(command.into())
            .map_err(|_| ConnectionError::NotConnected)
    }
}

enum LinkEnd {
    Lost(ConnectionError),
    Shutdown,
}

/// Keeps the device link alive and feeds the telemetry store.
#[derive(Debug)]
pub struct DeviceConnectionManager {
    connector: Arc<dyn DeviceConnector>,
    config: ManagerConfig,
    state_tx: watch::Sender<ConnectionState>,
    store: TelemetryStore,
    event_bus: EventBus,
    commands_rx: mpsc::Receiver<String>,
    commands: DeviceCommands,
}

impl DeviceConnectionManager {
    /// Creates a manager together with the store it feeds. Nothing
    /// connects until [`DeviceConnectionManager::run`].
    #[must_use]
    pub fn new(
        connector: Arc<dyn DeviceConnector>,
        config: ManagerConfig,
        event_bus: EventBus,
    ) -> Self {
        let (state_tx, state_rx) = watch::channel(ConnectionState::Connecting);
        let (commands_tx, commands_rx) = mpsc::channel(config.command_buffer.max(1));
        let store = TelemetryStore::new(state_rx.clone());
        Self {
            connector,
            config,
            state_tx,
            store,
            event_bus,
            commands_rx,
            commands: DeviceCommands {
                tx: commands_tx,
                state: state_rx,
            },
        }
    }

    /// The store this manager writes to.
    #[must_use]
    pub fn store(&self) -> TelemetryStore {
        self.store.clone()
    }

    /// Handle for sending commands to the device.
    #[must_use]
    pub fn commands(&self) -> DeviceCommands {
        self.commands.clone()
    }

    /// Runs the state machine until `shutdown` flips to `true` or its
    /// sender is dropped.
    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) {
        let mut backoff = Backoff::new(self.config.backoff.clone());
        self.set_state(ConnectionState::Connecting);
        tracing::info!(endpoint = self.connector.endpoint(), "connecting to device");

        loop {
            if *shutdown.borrow() {
                break;
            }

            let handshake =
                tokio::time::timeout(self.config.connect_timeout, self.connector.connect());
            let attempt = tokio::select! {
                result = handshake => result.unwrap_or_else(|_| {
                    Err(ConnectionError::HandshakeTimeout {
                        timeout_ms: millis(self.config.connect_timeout),
                    })
                }),
                _ = shutdown.changed() => break,
            };

            match attempt {
                Ok(link) => {
                    backoff.reset();
                    self.discard_pending_commands();
                    self.set_state(ConnectionState::Connected);
                    tracing::info!(endpoint = self.connector.endpoint(), "device connected");

                    match self.pump(link, &mut shutdown).await {
                        LinkEnd::Shutdown => break,
                        LinkEnd::Lost(err) => {
                            tracing::warn!(error = %err, "device link lost");
                            self.set_state(ConnectionState::Disconnected);
                            if !self.back_off(&mut backoff, &mut shutdown).await {
                                break;
                            }
                        }
                    }
                }
                Err(err) => {
                    tracing::warn!(error = %err, "device connect failed");
                    if !self.back_off(&mut backoff, &mut shutdown).await {
                        break;
                    }
                }
            }
        }

        self.set_state(ConnectionState::Disconnected);
        tracing::info!("device connection manager stopped");
    }

    /// Forwards messages and commands until the link ends.
    async fn pump(
        &mut self,
        mut link: Box<dyn DeviceLink>,
        shutdown: &mut watch::Receiver<bool>,
    ) -> LinkEnd {
        let mut deadline = Instant::now() + self.config.liveness_timeout;
        loop {
            tokio::select! {
                _ = shutdown.changed() => {
                    link.close().await;
                    return LinkEnd::Shutdown;
                }
                Some(command) = self.commands_rx.recv() => {
                    if let Err(err) = link.send(command).await {
                        return LinkEnd::Lost(err);
                    }
                }
                message = tokio::time::timeout_at(deadline, link.next_message()) => {
                    match message {
                        Err(_) => {
                            let timeout_ms = millis(self.config.liveness_timeout);
                            return LinkEnd::Lost(ConnectionError::LivenessTimeout { timeout_ms });
                        }
                        Ok(None) => return LinkEnd::Lost(ConnectionError::Closed),
                        Ok(Some(Err(err))) => return LinkEnd::Lost(err),
                        Ok(Some(Ok(raw))) => {
                            deadline = Instant::now() + self.config.liveness_timeout;
                            self.handle_message(&raw);
                        }
                    }
                }
            }
        }
    }

    /// Enters `Reconnecting` and waits the next backoff delay. Returns
    /// `false` on shutdown.
    async fn back_off(
        &mut self,
        backoff: &mut Backoff,
        shutdown: &mut watch::Receiver<bool>,
    ) -> bool {
        let delay = backoff.next_delay();
        tracing::info!(
            attempt = backoff.attempt(),
            delay_ms = millis(delay),
            "reconnecting to device after backoff"
        );
        self.set_state(ConnectionState::Reconnecting);
        self.wait_backoff(delay, shutdown).await
    }

    /// Sleeps `delay`, dropping commands that arrive meanwhile. Returns
    /// `false` on shutdown.
    async fn wait_backoff(&mut self, delay: Duration, shutdown: &mut watch::Receiver<bool>) -> bool {
        let sleep = tokio::time::sleep(delay);
        tokio::pin!(sleep);
        loop {
            tokio::select! {
                () = &mut sleep => return true,
                _ = shutdown.changed() => return false,
                Some(_) = self.commands_rx.recv() => {
                    tracing::warn!("device not connected, dropping command");
                }
            }
        }
    }

    fn discard_pending_commands(&mut self) {
        while self.commands_rx.try_recv().is_ok() {
            tracing::warn!("device was not connected, dropping stale command");
        }
    }

    fn handle_message(&self, raw: &str) {
        let fields = match TelemetryFields::parse(raw) {
            Ok(fields) => fields,
            Err(err) => {
                tracing::warn!(error = %err, len = raw.len(), "dropping malformed device message");
                return;
            }
        };
        if fields.is_empty() {
            tracing::trace!("device message without telemetry fields");
            return;
        }

        let revision = self.store.apply_update(fields);
        if let Some(snapshot) = self.store.snapshot() {
            let _ = self.event_bus.publish(CompanionEvent::TelemetryUpdated {
                revision,
                snapshot: Box::new(snapshot),
                timestamp: Utc::now(),
            });
        }
        tracing::trace!(revision, "telemetry updated");
    }

    fn set_state(&self, state: ConnectionState) {
        self.state_tx.send_replace(state);
        let _ = self.event_bus.publish(CompanionEvent::ConnectionChanged {
            state,
            timestamp: Utc::now(),
        });
        tracing::debug!(%state, "connection state changed");
    }
}

fn millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}
