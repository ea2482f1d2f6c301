//! Companion configuration loaded from environment variables.
//!
//! Follows 12-factor style: all settings come from environment variables
//! (or a `.env` file via `dotenvy`). Missing or unparsable values fall back
//! to defaults; only `LISTEN_ADDR` is validated.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use crate::device::{BackoffConfig, ManagerConfig};
use crate::error::CompanionError;
use crate::service::{FetchControllerConfig, UpdateServiceConfig};

/// Top-level companion configuration.
///
/// Loaded once at startup via [`CompanionConfig::from_env`].
#[derive(Debug, Clone, PartialEq)]
pub struct CompanionConfig {
    /// Socket address to bind the HTTP server to.
    pub listen_addr: SocketAddr,

    /// Live data WebSocket URL of the DTU.
    pub dtu_url: String,

    /// Base64 `user:password` for the DTU, if protected.
    pub dtu_auth: Option<String>,

    /// Seconds without a device message before the link is dropped.
    pub liveness_timeout_secs: u64,

    /// Seconds allowed for one device handshake.
    pub connect_timeout_secs: u64,

    /// First reconnect delay in milliseconds.
    pub reconnect_min_ms: u64,

    /// Reconnect delay cap in milliseconds.
    pub reconnect_max_ms: u64,

    /// Random fraction shaved off each reconnect delay.
    pub reconnect_jitter: f64,

    /// Base URL of the GitHub REST API.
    pub github_api_url: String,

    /// `owner/name` of the firmware repository.
    pub firmware_repo: String,

    /// `owner/name` of the app repository.
    pub app_repo: String,

    /// Age after which the firmware list is refetched automatically.
    pub firmware_max_age_secs: u64,

    /// Age after which the app list is refetched automatically.
    pub app_max_age_secs: u64,

    /// Minimum seconds between automatic app checks.
    pub app_min_check_interval_secs: u64,

    /// Upper bound for one release API call.
    pub fetch_timeout_secs: u64,

    /// Pause for automatic checks after a rate-limit response.
    pub rate_limit_cooldown_secs: u64,

    /// Seconds between scheduler ticks.
    pub refresh_tick_secs: u64,

    /// Minimum recommended firmware version.
    pub minimum_firmware_version: String,

    /// Version reported for this application.
    pub app_version: String,

    /// Release cache file. `None` disables persistence.
    pub release_cache_path: Option<PathBuf>,

    /// Settings file. `None` keeps settings in memory.
    pub settings_path: Option<PathBuf>,

    /// Capacity of the EventBus broadcast channel.
    pub event_bus_capacity: usize,
}

impl CompanionConfig {
    /// Loads configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv().ok()` to optionally load a `.env` file.
    ///
    /// # Errors
    ///
    /// Returns [`CompanionError::Config`] if `LISTEN_ADDR` is set but cannot
    /// be parsed as a [`SocketAddr`].
    pub fn from_env() -> Result<Self, CompanionError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the configuration from an arbitrary key lookup.
    ///
    /// # Errors
    ///
    /// Returns [`CompanionError::Config`] if `LISTEN_ADDR` is present but
    /// invalid.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, CompanionError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let listen_addr: SocketAddr = lookup("LISTEN_ADDR")
            .unwrap_or_else(|| "127.0.0.1:3030".to_string())
            .parse()
            .map_err(|e| CompanionError::Config(format!("LISTEN_ADDR: {e}")))?;

        let text = |key: &str, default: &str| lookup(key).unwrap_or_else(|| default.to_string());
        let path = |key: &str| lookup(key).filter(|v| !v.is_empty()).map(PathBuf::from);

        Ok(Self {
            listen_addr,
            dtu_url: text("DTU_URL", "ws://192.168.4.1/livedata"),
            dtu_auth: lookup("DTU_AUTH").filter(|v| !v.is_empty()),
            liveness_timeout_secs: parse_env(&lookup, "LIVENESS_TIMEOUT_SECS", 30),
            connect_timeout_secs: parse_env(&lookup, "CONNECT_TIMEOUT_SECS", 10),
            reconnect_min_ms: parse_env(&lookup, "RECONNECT_MIN_MS", 1_000),
            reconnect_max_ms: parse_env(&lookup, "RECONNECT_MAX_MS", 60_000),
            reconnect_jitter: parse_env(&lookup, "RECONNECT_JITTER", 0.2),
            github_api_url: text("GITHUB_API_URL", "https://api.github.com"),
            firmware_repo: text("FIRMWARE_REPO", "tbnobody/OpenDTU"),
            app_repo: text("APP_REPO", "OpenDTU-App/opendtu-react-native"),
            firmware_max_age_secs: parse_env(&lookup, "FIRMWARE_MAX_AGE_SECS", 3_600),
            app_max_age_secs: parse_env(&lookup, "APP_MAX_AGE_SECS", 3_600),
            app_min_check_interval_secs: parse_env(&lookup, "APP_MIN_CHECK_INTERVAL_SECS", 21_600),
            fetch_timeout_secs: parse_env(&lookup, "FETCH_TIMEOUT_SECS", 15),
            rate_limit_cooldown_secs: parse_env(&lookup, "RATE_LIMIT_COOLDOWN_SECS", 900),
            refresh_tick_secs: parse_env(&lookup, "REFRESH_TICK_SECS", 60),
            minimum_firmware_version: text("MINIMUM_FIRMWARE_VERSION", "v24.2.12"),
            app_version: text("APP_VERSION", env!("CARGO_PKG_VERSION")),
            release_cache_path: path("RELEASE_CACHE_PATH"),
            settings_path: path("SETTINGS_PATH"),
            event_bus_capacity: parse_env(&lookup, "EVENT_BUS_CAPACITY", 1_024),
        })
    }

    /// Device connection manager parameters.
    #[must_use]
    pub fn manager_config(&self) -> ManagerConfig {
        let initial_delay = Duration::from_millis(self.reconnect_min_ms.max(1));
        ManagerConfig {
            liveness_timeout: Duration::from_secs(self.liveness_timeout_secs.max(1)),
            connect_timeout: Duration::from_secs(self.connect_timeout_secs.max(1)),
            backoff: BackoffConfig {
                initial_delay,
                max_delay: Duration::from_millis(self.reconnect_max_ms).max(initial_delay),
                jitter: self.reconnect_jitter,
                ..BackoffConfig::default()
            },
            ..ManagerConfig::default()
        }
    }

    /// Release fetch controller parameters.
    #[must_use]
    pub fn fetch_controller_config(&self) -> FetchControllerConfig {
        FetchControllerConfig {
            firmware_max_age: Duration::from_secs(self.firmware_max_age_secs),
            app_max_age: Duration::from_secs(self.app_max_age_secs),
            app_min_check_interval: Duration::from_secs(self.app_min_check_interval_secs),
            fetch_timeout: Duration::from_secs(self.fetch_timeout_secs.max(1)),
            rate_limit_cooldown: Duration::from_secs(self.rate_limit_cooldown_secs),
            refresh_tick: Duration::from_secs(self.refresh_tick_secs.max(1)),
        }
    }

    /// Update advisor inputs.
    #[must_use]
    pub fn update_service_config(&self) -> UpdateServiceConfig {
        UpdateServiceConfig {
            minimum_firmware_version: self.minimum_firmware_version.clone(),
            app_version: self.app_version.clone(),
            device_auth_configured: self.dtu_auth.is_some(),
        }
    }
}

/// Parses a variable as `T`, returning `default` on missing or invalid
/// values.
fn parse_env<T, F>(lookup: &F, key: &str, default: T) -> T
where
    T: std::str::FromStr,
    F: Fn(&str) -> Option<String>,
{
    lookup(key)
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn load(pairs: &[(&str, &str)]) -> Result<CompanionConfig, CompanionError> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        CompanionConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn defaults_apply_without_variables() {
        let Ok(config) = load(&[]) else {
            panic!("defaults should load");
        };
        assert_eq!(config.listen_addr.to_string(), "127.0.0.1:3030");
        assert_eq!(config.dtu_url, "ws://192.168.4.1/livedata");
        assert_eq!(config.dtu_auth, None);
        assert_eq!(config.liveness_timeout_secs, 30);
        assert_eq!(config.connect_timeout_secs, 10);
        assert_eq!(config.firmware_repo, "tbnobody/OpenDTU");
        assert_eq!(config.minimum_firmware_version, "v24.2.12");
        assert_eq!(config.app_version, env!("CARGO_PKG_VERSION"));
        assert_eq!(config.release_cache_path, None);
        assert_eq!(config.event_bus_capacity, 1_024);
    }

    #[test]
    fn invalid_numbers_fall_back() {
        let Ok(config) = load(&[("FETCH_TIMEOUT_SECS", "soon"), ("REFRESH_TICK_SECS", " 5 ")])
        else {
            panic!("config should load");
        };
        assert_eq!(config.fetch_timeout_secs, 15);
        assert_eq!(config.refresh_tick_secs, 5);
    }

    #[test]
    fn invalid_listen_addr_is_rejected() {
        assert!(matches!(
            load(&[("LISTEN_ADDR", "not-an-address")]),
            Err(CompanionError::Config(_))
        ));
    }

    #[test]
    fn derived_configs_carry_values() {
        let Ok(config) = load(&[
            ("RECONNECT_MIN_MS", "500"),
            ("RECONNECT_MAX_MS", "100"),
            ("DTU_AUTH", "YWRtaW46b3BlbmR0dQ=="),
            ("APP_MIN_CHECK_INTERVAL_SECS", "60"),
            ("CONNECT_TIMEOUT_SECS", "0"),
        ]) else {
            panic!("config should load");
        };

        let manager = config.manager_config();
        assert_eq!(manager.backoff.initial_delay, Duration::from_millis(500));
        assert_eq!(manager.backoff.max_delay, Duration::from_millis(500));
        assert_eq!(manager.liveness_timeout, Duration::from_secs(30));
        assert_eq!(manager.connect_timeout, Duration::from_secs(1));

        let fetch = config.fetch_controller_config();
        assert_eq!(fetch.app_min_check_interval, Duration::from_secs(60));

        assert!(config.update_service_config().device_auth_configured);
    }

    #[test]
    fn empty_paths_disable_persistence() {
        let Ok(config) = load(&[("RELEASE_CACHE_PATH", ""), ("SETTINGS_PATH", "/tmp/s.json")])
        else {
            panic!("config should load");
        };
        assert_eq!(config.release_cache_path, None);
        assert_eq!(config.settings_path, Some(PathBuf::from("/tmp/s.json")));
    }
}
