//! Persisted user settings.
//!
//! [`SettingsStore`] holds the current [`Settings`] in a `watch` channel
//! and writes every change through to an optional JSON file. The fetch
//! controller reads `enable_app_updates` from here before each automatic
//! app check.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use utoipa::ToSchema;

use crate::error::CompanionError;
use crate::persistence::JsonFile;

/// UI language.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    /// English.
    #[default]
    En,
    /// German.
    De,
}

/// UI colour scheme.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    /// Light scheme.
    Light,
    /// Dark scheme.
    Dark,
    /// Follow the operating system.
    #[default]
    System,
}

/// User settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(default)]
pub struct Settings {
    /// Check for application updates automatically.
    pub enable_app_updates: bool,
    /// UI language.
    pub language: Language,
    /// UI colour scheme.
    pub theme: Theme,
    /// Verbose diagnostics in the UI.
    pub debug_enabled: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            enable_app_updates: true,
            language: Language::default(),
            theme: Theme::default(),
            debug_enabled: false,
        }
    }
}

/// Partial settings change. Absent fields are left as they are.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, ToSchema)]
pub struct SettingsUpdate {
    /// New value for `enable_app_updates`.
    #[serde(default)]
    pub enable_app_updates: Option<bool>,
    /// New language.
    #[serde(default)]
    pub language: Option<Language>,
    /// New theme.
    #[serde(default)]
    pub theme: Option<Theme>,
    /// New value for `debug_enabled`.
    #[serde(default)]
    pub debug_enabled: Option<bool>,
}

impl Settings {
    /// Applies `update`, returning `true` if anything changed.
    pub fn apply(&mut self, update: &SettingsUpdate) -> bool {
        let before = self.clone();
        if let Some(value) = update.enable_app_updates {
            self.enable_app_updates = value;
        }
        if let Some(value) = update.language {
            self.language = value;
        }
        if let Some(value) = update.theme {
            self.theme = value;
        }
        if let Some(value) = update.debug_enabled {
            self.debug_enabled = value;
        }
        *self != before
    }
}

/// Shared, optionally persisted settings.
#[derive(Debug, Clone)]
pub struct SettingsStore {
    state: Arc<watch::Sender<Settings>>,
    file: Option<JsonFile>,
}

impl SettingsStore {
    /// Creates an in-memory store.
    #[must_use]
    pub fn in_memory(initial: Settings) -> Self {
        let (state, _) = watch::channel(initial);
        Self {
            state: Arc::new(state),
            file: None,
        }
    }

    /// Loads settings from `file`, falling back to defaults if the file is
    /// missing or unreadable.
    pub async fn load(file: JsonFile) -> Self {
        let initial = match file.load::<Settings>().await {
            Ok(Some(settings)) => {
                tracing::info!(path = %file.path().display(), "settings loaded");
                settings
            }
            Ok(None) => Settings::default(),
            Err(err) => {
                tracing::warn!(error = %err, "failed to load settings, using defaults");
                Settings::default()
            }
        };
        let (state, _) = watch::channel(initial);
        Self {
            state: Arc::new(state),
            file: Some(file),
        }
    }

    /// Current settings.
    #[must_use]
    pub fn get(&self) -> Settings {
        self.state.borrow().clone()
    }

    /// Whether automatic app update checks are enabled.
    #[must_use]
    pub fn enable_app_updates(&self) -> bool {
        self.state.borrow().enable_app_updates
    }

    /// Returns a receiver that observes every settings change.
    #[must_use]
    pub fn watch(&self) -> watch::Receiver<Settings> {
        self.state.subscribe()
    }

    /// Applies `update` and persists the result when a file is configured.
    ///
    /// # Errors
    ///
    /// Returns [`CompanionError::Persistence`] if writing the file fails.
    /// The in-memory settings are updated regardless.
    pub async fn update(&self, update: &SettingsUpdate) -> Result<Settings, CompanionError> {
        let mut changed = false;
        self.state.send_if_modified(|settings| {
            changed = settings.apply(update);
            changed
        });
        let settings = self.get();
        if changed {
            tracing::info!(
                enable_app_updates = settings.enable_app_updates,
                debug_enabled = settings.debug_enabled,
                "settings updated"
            );
            if let Some(file) = &self.file {
                file.save(&settings).await?;
            }
        }
        Ok(settings)
    }
}
