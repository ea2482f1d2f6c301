//! Update orchestration for API consumers.
//!
//! [`UpdateService`] reads the release cache and the telemetry store,
//! derives update facts through [`UpdateAdvisor`] and handles firmware
//! install selection.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use utoipa::ToSchema;

use crate::domain::{
    CompanionEvent, EventBus, Release, ReleaseBadges, ReleaseCache, ResourceKey, TelemetryStore,
    UpdateAdvice, UpdateAdvisor,
};
use crate::error::{CompanionError, FetchError};

/// Static inputs of the advisor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdateServiceConfig {
    /// Minimum recommended firmware version.
    pub minimum_firmware_version: String,
    /// Version of this application.
    pub app_version: String,
    /// Device credentials are configured, so install actions are allowed.
    pub device_auth_configured: bool,
}

/// A cached release with its badges.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct ListedRelease {
    /// The release.
    pub release: Release,
    /// Derived flags.
    pub badges: ReleaseBadges,
}

/// A cache entry prepared for display.
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct ReleaseListing {
    /// Resource key.
    pub resource: ResourceKey,
    /// Time of the last successful fetch.
    pub last_fetched_at: Option<DateTime<Utc>>,
    /// A fetch is in flight.
    pub is_fetching: bool,
    /// Error of the last failed fetch.
    pub last_error: Option<FetchError>,
    /// Installed version, when known.
    pub installed_version: Option<String>,
    /// Releases in API order.
    pub releases: Vec<ListedRelease>,
}

/// Accepted firmware install selection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct FirmwareSelection {
    /// Selected tag.
    pub tag: String,
    /// Web page of the selected release.
    pub html_url: String,
    /// Firmware installed at selection time, when known.
    pub installed_version: Option<String>,
    /// Selected release is at or above the minimum recommended version.
    pub meets_minimum: bool,
    /// Selected release is the minimum recommended version.
    pub is_recommended_minimum: bool,
}

/// Derives update facts from the current state.
#[derive(Debug, Clone)]
pub struct UpdateService {
    cache: Arc<ReleaseCache>,
    store: TelemetryStore,
    event_bus: EventBus,
    config: UpdateServiceConfig,
}

impl UpdateService {
    /// Creates a new `UpdateService`.
    #[must_use]
    pub fn new(
        cache: Arc<ReleaseCache>,
        store: TelemetryStore,
        event_bus: EventBus,
        config: UpdateServiceConfig,
    ) -> Self {
        Self {
            cache,
            store,
            event_bus,
            config,
        }
    }

    /// Installed version for `key`: the DTU-reported firmware or this
    /// application's version.
    #[must_use]
    pub fn installed_version(&self, key: ResourceKey) -> Option<String> {
        match key {
            ResourceKey::Firmware => self
                .store
                .snapshot()
                .and_then(|snapshot| snapshot.installed_firmware().map(str::to_string)),
            ResourceKey::App => Some(self.config.app_version.clone()),
        }
    }

    /// Update summary for `key`.
    pub async fn advice(&self, key: ResourceKey) -> UpdateAdvice {
        let entry = self.cache.get(key).await;
        let installed = self.installed_version(key);
        self.advisor(key, &entry.releases, installed.as_deref())
            .advice()
    }

    /// Cache entry for `key` with per-release badges.
    pub async fn listing(&self, key: ResourceKey) -> ReleaseListing {
        let entry = self.cache.get(key).await;
        let installed = self.installed_version(key);
        let advisor = self.advisor(key, &entry.releases, installed.as_deref());
        let releases = entry
            .releases
            .iter()
            .map(|release| ListedRelease {
                release: release.clone(),
                badges: advisor.badges(release),
            })
            .collect();
        ReleaseListing {
            resource: key,
            last_fetched_at: entry.last_fetched_at,
            is_fetching: entry.is_fetching,
            last_error: entry.last_error.clone(),
            installed_version: installed,
            releases,
        }
    }

    /// Accepts `tag` as the firmware to install.
    ///
    /// # Errors
    ///
    /// - [`CompanionError::ReleaseNotFound`] if `tag` is not cached.
    /// - [`CompanionError::InstallNotAllowed`] if device credentials are
    ///   missing or `tag` is already installed.
    pub async fn select_firmware(&self, tag: &str) -> Result<FirmwareSelection, CompanionError> {
        let key = ResourceKey::Firmware;
        let entry = self.cache.get(key).await;
        let release = entry
            .find(tag)
            .ok_or_else(|| CompanionError::ReleaseNotFound {
                resource: key.to_string(),
                tag: tag.to_string(),
            })?;

        let installed = self.installed_version(key);
        let advisor = self.advisor(key, &entry.releases, installed.as_deref());

        if !self.config.device_auth_configured {
            return Err(CompanionError::InstallNotAllowed(
                "device credentials are not configured".to_string(),
            ));
        }
        if advisor.is_installed_release(release) {
            return Err(CompanionError::InstallNotAllowed(format!(
                "{} is already installed",
                release.tag_name
            )));
        }

        let selection = FirmwareSelection {
            tag: release.tag_name.clone(),
            html_url: release.html_url.clone(),
            installed_version: installed.clone(),
            meets_minimum: advisor.meets_minimum(&release.tag_name),
            is_recommended_minimum: advisor.is_recommended_minimum(release),
        };

        let _ = self.event_bus.publish(CompanionEvent::FirmwareSelected {
            tag: selection.tag.clone(),
            installed,
            timestamp: Utc::now(),
        });
        tracing::info!(tag = %selection.tag, "firmware selected for install");
        Ok(selection)
    }

    fn advisor<'a>(
        &'a self,
        key: ResourceKey,
        releases: &'a [Release],
        installed: Option<&'a str>,
    ) -> UpdateAdvisor<'a> {
        let advisor = UpdateAdvisor::new(releases, installed);
        match key {
            ResourceKey::Firmware => advisor
                .with_minimum(&self.config.minimum_firmware_version)
                .with_install_authorized(self.config.device_auth_configured),
            ResourceKey::App => advisor,
        }
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use tokio::sync::watch;

    use super::*;
    use crate::domain::telemetry::SystemStatus;
    use crate::domain::{ConnectionState, TelemetryFields};

    fn release(id: u64, tag: &str, published: &str) -> Release {
        Release {
            id,
            tag_name: tag.to_string(),
            name: None,
            published_at: published.parse().ok(),
            body: None,
            html_url: format!("https://github.com/tbnobody/OpenDTU/releases/tag/{tag}"),
            prerelease: false,
        }
    }

    async fn service(auth: bool, installed: Option<&str>) -> (UpdateService, EventBus) {
        let (_tx, rx) = watch::channel(ConnectionState::Connected);
        let store = TelemetryStore::new(rx);
        if let Some(installed) = installed {
            store.apply_update(TelemetryFields {
                system_status: Some(SystemStatus {
                    git_hash: Some(installed.to_string()),
                    ..SystemStatus::default()
                }),
                ..TelemetryFields::default()
            });
        }
        let cache = Arc::new(ReleaseCache::new());
        cache
            .commit_success(
                ResourceKey::Firmware,
                vec![
                    release(3, "v24.3.15", "2024-03-15T00:00:00Z"),
                    release(2, "v24.2.12", "2024-02-12T00:00:00Z"),
                    release(1, "v24.1.26", "2024-01-26T00:00:00Z"),
                ],
            )
            .await;
        let bus = EventBus::new(16);
        let config = UpdateServiceConfig {
            minimum_firmware_version: "v24.2.12".to_string(),
            app_version: "0.1.0".to_string(),
            device_auth_configured: auth,
        };
        (UpdateService::new(cache, store, bus.clone(), config), bus)
    }

    #[tokio::test]
    async fn firmware_advice_uses_reported_version() {
        let (svc, _bus) = service(true, Some("v24.2.12")).await;
        let advice = svc.advice(ResourceKey::Firmware).await;
        assert_eq!(advice.installed_version.as_deref(), Some("v24.2.12"));
        assert_eq!(advice.latest_tag.as_deref(), Some("v24.3.15"));
        assert!(advice.has_new_version);
        assert_eq!(advice.installed_meets_minimum, Some(true));
    }

    #[tokio::test]
    async fn unknown_firmware_has_no_new_version() {
        let (svc, _bus) = service(true, None).await;
        assert!(!svc.advice(ResourceKey::Firmware).await.has_new_version);
    }

    #[tokio::test]
    async fn app_advice_on_empty_cache() {
        let (svc, _bus) = service(true, None).await;
        let advice = svc.advice(ResourceKey::App).await;
        assert_eq!(advice.installed_version.as_deref(), Some("0.1.0"));
        assert!(!advice.has_new_version);
        assert_eq!(advice.release_count, 0);
    }

    #[tokio::test]
    async fn listing_carries_badges() {
        let (svc, _bus) = service(true, Some("v24.1.26")).await;
        let listing = svc.listing(ResourceKey::Firmware).await;
        let badges: Vec<ReleaseBadges> = listing.releases.iter().map(|r| r.badges).collect();
        assert_eq!(
            badges,
            vec![
                ReleaseBadges {
                    is_latest: true,
                    is_installed: false,
                    is_recommended_minimum: false,
                    can_install: true,
                },
                ReleaseBadges {
                    is_latest: false,
                    is_installed: false,
                    is_recommended_minimum: true,
                    can_install: true,
                },
                ReleaseBadges {
                    is_latest: false,
                    is_installed: true,
                    is_recommended_minimum: false,
                    can_install: false,
                },
            ]
        );
    }

    #[tokio::test]
    async fn selection_emits_event() {
        let (svc, bus) = service(true, Some("v24.1.26")).await;
        let mut rx = bus.subscribe();

        let Ok(selection) = svc.select_firmware("24.3.15").await else {
            panic!("selection should be accepted");
        };
        assert_eq!(selection.tag, "v24.3.15");
        assert!(selection.meets_minimum);

        let Ok(CompanionEvent::FirmwareSelected { tag, .. }) = rx.recv().await else {
            panic!("expected FirmwareSelected");
        };
        assert_eq!(tag, "v24.3.15");
    }

    #[tokio::test]
    async fn selection_rejections() {
        let (svc, _bus) = service(true, Some("v24.2.12")).await;
        assert!(matches!(
            svc.select_firmware("v24.2.12").await,
            Err(CompanionError::InstallNotAllowed(_))
        ));
        assert!(matches!(
            svc.select_firmware("v99.0.0").await,
            Err(CompanionError::ReleaseNotFound { .. })
        ));

        let (no_auth, _bus) = service(false, Some("v24.2.12")).await;
        assert!(matches!(
            no_auth.select_firmware("v24.3.15").await,
            Err(CompanionError::InstallNotAllowed(_))
        ));
    }
}
