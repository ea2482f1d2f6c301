//! Session lifecycle.
//!
//! [`CompanionSession::start`] creates every store, wires the collaborators
//! together and spawns the background tasks. [`CompanionSession::shutdown`]
//! stops them and waits until they finished.

use std::sync::Arc;

use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::app_state::AppState;
use crate::config::CompanionConfig;
use crate::device::{DeviceConnectionManager, DeviceConnector, WsConnector};
use crate::domain::{EventBus, ReleaseCache, Settings, SettingsStore};
use crate::error::CompanionError;
use crate::persistence::JsonFile;
use crate::service::{GithubReleaseApi, ReleaseApi, ReleaseFetchController, UpdateService};

/// A running companion core.
#[derive(Debug)]
pub struct CompanionSession {
    state: AppState,
    shutdown_tx: watch::Sender<bool>,
    tasks: Vec<JoinHandle<()>>,
}

impl CompanionSession {
    /// Starts a session against the configured DTU and GitHub.
    ///
    /// # Errors
    ///
    /// Returns [`CompanionError::Internal`] if the HTTP client cannot be
    /// built.
    pub async fn start(config: &CompanionConfig) -> Result<Self, CompanionError> {
        let connector: Arc<dyn DeviceConnector> = Arc::new(WsConnector::new(
            config.dtu_url.clone(),
            config.dtu_auth.clone(),
        ));
        let api: Arc<dyn ReleaseApi> = Arc::new(GithubReleaseApi::new(
            config.github_api_url.clone(),
            config.firmware_repo.clone(),
            config.app_repo.clone(),
            config.fetch_controller_config().fetch_timeout,
        )?);
        Ok(Self::start_with(config, connector, api).await)
    }

    /// Starts a session with the given collaborators.
    pub async fn start_with(
        config: &CompanionConfig,
        connector: Arc<dyn DeviceConnector>,
        api: Arc<dyn ReleaseApi>,
    ) -> Self {
        let event_bus = EventBus::new(config.event_bus_capacity);

        let settings = match &config.settings_path {
            Some(path) => SettingsStore::load(JsonFile::new(path.clone())).await,
            None => SettingsStore::in_memory(Settings::default()),
        };

        let cache = Arc::new(ReleaseCache::new());
        let mut controller = ReleaseFetchController::new(
            api,
            Arc::clone(&cache),
            settings.clone(),
            event_bus.clone(),
            config.fetch_controller_config(),
        );
        if let Some(path) = &config.release_cache_path {
            controller = controller.with_cache_file(JsonFile::new(path.clone()));
        }
        controller.restore_persisted().await;
        let releases = Arc::new(controller);

        let manager =
            DeviceConnectionManager::new(connector, config.manager_config(), event_bus.clone());
        let telemetry = manager.store();
        let commands = manager.commands();

        let updates = Arc::new(UpdateService::new(
            cache,
            telemetry.clone(),
            event_bus.clone(),
            config.update_service_config(),
        ));

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let device_task = tokio::spawn(manager.run(shutdown_rx.clone()));
        let scheduler = Arc::clone(&releases);
        let scheduler_task = tokio::spawn(async move {
            scheduler.run_scheduler(shutdown_rx).await;
        });

        tracing::info!(dtu = %config.dtu_url, "companion session started");

        Self {
            state: AppState {
                telemetry,
                commands,
                releases,
                updates,
                settings,
                event_bus,
            },
            shutdown_tx,
            tasks: vec![device_task, scheduler_task],
        }
    }

    /// Handles shared with API consumers.
    #[must_use]
    pub fn state(&self) -> AppState {
        self.state.clone()
    }

    /// Stops the background tasks and waits for them.
    pub async fn shutdown(self) {
        let _ = self.shutdown_tx.send(true);
        for task in self.tasks {
            if let Err(err) = task.await {
                tracing::error!(error = %err, "session task failed");
            }
        }
        tracing::info!("companion session stopped");
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use std::time::Duration;

    use async_trait::async_trait;

    use super::*;
    use crate::device::DeviceLink;
    use crate::domain::{ConnectionState, Release, ResourceKey};
    use crate::error::{ConnectionError, FetchError};

    #[derive(Debug)]
    struct Unreachable;

    #[async_trait]
    impl DeviceConnector for Unreachable {
        async fn connect(&self) -> Result<Box<dyn DeviceLink>, ConnectionError> {
            Err(ConnectionError::Handshake("connection refused".to_string()))
        }

        fn endpoint(&self) -> &str {
            "ws://dtu.invalid/livedata"
        }
    }

    #[derive(Debug)]
    struct NoReleases;

    #[async_trait]
    impl ReleaseApi for NoReleases {
        async fn list_releases(&self, _key: ResourceKey) -> Result<Vec<Release>, FetchError> {
            Ok(Vec::new())
        }
    }

    fn config() -> CompanionConfig {
        let Ok(config) = CompanionConfig::from_lookup(|_| None) else {
            panic!("default config should load");
        };
        config
    }

    #[tokio::test(start_paused = true)]
    async fn start_and_shutdown() {
        let session =
            CompanionSession::start_with(&config(), Arc::new(Unreachable), Arc::new(NoReleases))
                .await;
        let state = session.state();

        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(
            state.telemetry.connection_state(),
            ConnectionState::Reconnecting
        );
        assert!(
            state
                .releases
                .cache()
                .get(ResourceKey::Firmware)
                .await
                .last_fetched_at
                .is_some()
        );

        session.shutdown().await;
        assert_eq!(
            state.telemetry.connection_state(),
            ConnectionState::Disconnected
        );
    }
}
