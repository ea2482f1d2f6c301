//! Release fetch controller.
//!
//! [`ReleaseFetchController::ensure_fresh`] decides whether a cache entry
//! needs refreshing, claims the entry with
//! [`ReleaseCache::begin_fetch`], calls the [`ReleaseApi`] under a timeout
//! and commits the result. Automatic checks are further limited by the
//! app-update setting, a minimum interval between app checks and a
//! cool-down after the API rate-limits us. A forced refresh skips those
//! limits but never runs concurrently with another fetch of the same key.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::Utc;
use serde::Serialize;
use tokio::sync::watch;
use tokio::time::{Instant, MissedTickBehavior};
use utoipa::ToSchema;

use super::release_api::ReleaseApi;
use crate::domain::{
    CompanionEvent, EventBus, ReleaseCache, ResourceKey, SettingsStore, UpdateAdvisor,
};
use crate::error::FetchError;
use crate::persistence::{JsonFile, PersistedReleaseCache};

/// How eager a freshness check is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RefreshPolicy {
    /// Entries older than this are refetched.
    pub max_age: Duration,
    /// Fetch regardless of age and automatic-check limits.
    pub force: bool,
}

impl RefreshPolicy {
    /// Automatic check with the given staleness threshold.
    #[must_use]
    pub const fn automatic(max_age: Duration) -> Self {
        Self {
            max_age,
            force: false,
        }
    }

    /// User-initiated refresh.
    #[must_use]
    pub const fn forced() -> Self {
        Self {
            max_age: Duration::ZERO,
            force: true,
        }
    }
}

/// Why a check did not fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    /// The cached list is young enough.
    Fresh,
    /// Another fetch for the key is in flight.
    InFlight,
    /// Automatic app checks are disabled in the settings.
    Disabled,
    /// The minimum interval between automatic app checks has not passed.
    Throttled,
    /// The release API rate-limited us recently.
    RateLimited,
}

/// Result of [`ReleaseFetchController::ensure_fresh`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum FetchOutcome {
    /// No request was made.
    Skipped {
        /// Why.
        reason: SkipReason,
    },
    /// The list was fetched and committed.
    Fetched {
        /// Number of releases now cached.
        count: usize,
    },
    /// The request failed; the previous list is still cached.
    Failed {
        /// The failure.
        error: FetchError,
    },
}

/// Controller timing parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchControllerConfig {
    /// Staleness threshold for automatic firmware checks.
    pub firmware_max_age: Duration,
    /// Staleness threshold for automatic app checks.
    pub app_max_age: Duration,
    /// Minimum time between two automatic app checks.
    pub app_min_check_interval: Duration,
    /// Upper bound for one API call.
    pub fetch_timeout: Duration,
    /// Pause for automatic checks after a rate-limit response.
    pub rate_limit_cooldown: Duration,
    /// Scheduler period.
    pub refresh_tick: Duration,
}

impl Default for FetchControllerConfig {
    fn default() -> Self {
        Self {
            firmware_max_age: Duration::from_secs(3600),
            app_max_age: Duration::from_secs(3600),
            app_min_check_interval: Duration::from_secs(6 * 3600),
            fetch_timeout: Duration::from_secs(15),
            rate_limit_cooldown: Duration::from_secs(900),
            refresh_tick: Duration::from_secs(60),
        }
    }
}

#[derive(Debug, Default)]
struct Throttle {
    last_automatic_app_check: Option<Instant>,
    rate_limited_until: Option<Instant>,
}

/// Keeps the release cache fresh.
#[derive(Debug)]
pub struct ReleaseFetchController {
    api: Arc<dyn ReleaseApi>,
    cache: Arc<ReleaseCache>,
    settings: SettingsStore,
    event_bus: EventBus,
    config: FetchControllerConfig,
    cache_file: Option<JsonFile>,
    /// Held from snapshot to rename so a later snapshot is never overwritten
    /// by an earlier one.
    persist_lock: tokio::sync::Mutex<()>,
    throttle: Mutex<Throttle>,
}

impl ReleaseFetchController {
    /// Creates a controller over `cache`.
    #[must_use]
    pub fn new(
        api: Arc<dyn ReleaseApi>,
        cache: Arc<ReleaseCache>,
        settings: SettingsStore,
        event_bus: EventBus,
        config: FetchControllerConfig,
    ) -> Self {
        Self {
            api,
            cache,
            settings,
            event_bus,
            config,
            cache_file: None,
            persist_lock: tokio::sync::Mutex::new(()),
            throttle: Mutex::new(Throttle::default()),
        }
    }

    /// Persists the cache to `file` after every successful fetch.
    #[must_use]
    pub fn with_cache_file(mut self, file: JsonFile) -> Self {
        self.cache_file = Some(file);
        self
    }

    /// The cache this controller writes to.
    #[must_use]
    pub fn cache(&self) -> &Arc<ReleaseCache> {
        &self.cache
    }

    /// Automatic policy for `key`.
    #[must_use]
    pub const fn automatic_policy(&self, key: ResourceKey) -> RefreshPolicy {
        match key {
            ResourceKey::Firmware => RefreshPolicy::automatic(self.config.firmware_max_age),
            ResourceKey::App => RefreshPolicy::automatic(self.config.app_max_age),
        }
    }

    /// Fetches `key` if `policy` says the cached list needs refreshing.
    ///
    /// Never fails: errors end up in the returned outcome and on the cache
    /// entry.
    pub async fn ensure_fresh(&self, key: ResourceKey, policy: RefreshPolicy) -> FetchOutcome {
        if !policy.force {
            if key == ResourceKey::App && !self.settings.enable_app_updates() {
                return FetchOutcome::Skipped {
                    reason: SkipReason::Disabled,
                };
            }
            let entry = self.cache.get(key).await;
            if !entry.is_stale(Utc::now(), policy.max_age) {
                return FetchOutcome::Skipped {
                    reason: SkipReason::Fresh,
                };
            }
            if let Some(reason) = self.automatic_block(key) {
                return FetchOutcome::Skipped { reason };
            }
        }

        if !self.cache.begin_fetch(key).await {
            tracing::debug!(resource = %key, "fetch already in flight");
            return FetchOutcome::Skipped {
                reason: SkipReason::InFlight,
            };
        }
        if !policy.force && key == ResourceKey::App {
            self.record_automatic_app_check();
        }

        let _ = self.event_bus.publish(CompanionEvent::ReleaseFetchStarted {
            resource: key,
            forced: policy.force,
            timestamp: Utc::now(),
        });
        tracing::debug!(resource = %key, forced = policy.force, "fetching releases");

        let fetch = self.api.list_releases(key);
        let result = match tokio::time::timeout(self.config.fetch_timeout, fetch).await {
            Ok(result) => result,
            Err(_) => Err(FetchError::Timeout {
                timeout_ms: u64::try_from(self.config.fetch_timeout.as_millis())
                    .unwrap_or(u64::MAX),
            }),
        };

        match result {
            Ok(releases) => {
                let count = releases.len();
                let latest_tag = UpdateAdvisor::new(&releases, None)
                    .latest_release()
                    .map(|release| release.tag_name.clone());
                self.cache.commit_success(key, releases).await;

                let _ = self.event_bus.publish(CompanionEvent::ReleasesUpdated {
                    resource: key,
                    count,
                    latest_tag: latest_tag.clone(),
                    timestamp: Utc::now(),
                });
                tracing::info!(resource = %key, count, latest = ?latest_tag, "releases refreshed");

                self.persist().await;
                FetchOutcome::Fetched { count }
            }
            Err(error) => {
                if let FetchError::RateLimited { retry_after_secs } = &error {
                    self.enter_cooldown(*retry_after_secs);
                }
                self.cache.commit_failure(key, error.clone()).await;

                let _ = self.event_bus.publish(CompanionEvent::ReleaseFetchFailed {
                    resource: key,
                    error: error.clone(),
                    timestamp: Utc::now(),
                });
                tracing::warn!(resource = %key, error = %error, "release fetch failed");
                FetchOutcome::Failed { error }
            }
        }
    }

    /// User-initiated refresh of `key`.
    pub async fn refresh(&self, key: ResourceKey) -> FetchOutcome {
        self.ensure_fresh(key, RefreshPolicy::forced()).await
    }

    /// Seeds the cache from the cache file. Returns the number of entries
    /// restored.
    pub async fn restore_persisted(&self) -> usize {
        let Some(file) = &self.cache_file else {
            return 0;
        };
        match file.load::<PersistedReleaseCache>().await {
            Ok(Some(doc)) => {
                let restored = doc.restore_into(&self.cache).await;
                tracing::info!(path = %file.path().display(), restored, "release cache restored");
                restored
            }
            Ok(None) => 0,
            Err(err) => {
                tracing::warn!(error = %err, "failed to restore release cache");
                0
            }
        }
    }

    /// Runs automatic checks for every key once per tick until `shutdown`
    /// flips to `true` or its sender is dropped.
    pub async fn run_scheduler(&self, mut shutdown: watch::Receiver<bool>) {
        let mut ticker = tokio::time::interval(self.config.refresh_tick);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    for key in ResourceKey::ALL {
                        let outcome = self.ensure_fresh(key, self.automatic_policy(key)).await;
                        tracing::trace!(resource = %key, ?outcome, "scheduled release check");
                    }
                }
                _ = shutdown.changed() => break,
            }
        }
        tracing::info!("release scheduler stopped");
    }

    fn automatic_block(&self, key: ResourceKey) -> Option<SkipReason> {
        let throttle = self.throttle.lock().ok()?;
        let now = Instant::now();
        if throttle.rate_limited_until.is_some_and(|until| now < until) {
            return Some(SkipReason::RateLimited);
        }
        if key == ResourceKey::App
            && throttle
                .last_automatic_app_check
                .is_some_and(|last| now.duration_since(last) < self.config.app_min_check_interval)
        {
            return Some(SkipReason::Throttled);
        }
        None
    }

    fn record_automatic_app_check(&self) {
        if let Ok(mut throttle) = self.throttle.lock() {
            throttle.last_automatic_app_check = Some(Instant::now());
        }
    }

    fn enter_cooldown(&self, retry_after_secs: Option<u64>) {
        let cooldown = retry_after_secs
            .map(Duration::from_secs)
            .map_or(self.config.rate_limit_cooldown, |retry| {
                retry.max(self.config.rate_limit_cooldown)
            });
        if let Ok(mut throttle) = self.throttle.lock() {
            throttle.rate_limited_until = Some(Instant::now() + cooldown);
        }
        tracing::warn!(
            cooldown_secs = cooldown.as_secs(),
            "release API rate limited, pausing automatic checks"
        );
    }

    async fn persist(&self) {
        let Some(file) = &self.cache_file else {
            return;
        };
        let _guard = self.persist_lock.lock().await;
        let doc = PersistedReleaseCache::capture(&self.cache).await;
        if let Err(err) = file.save(&doc).await {
            tracing::warn!(error = %err, "failed to persist release cache");
        }
    }
}
