//! Release metadata and per-resource cache entries.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::version;
use crate::error::{CompanionError, FetchError};

/// Which release list a cache entry holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum ResourceKey {
    /// DTU firmware releases.
    Firmware,
    /// Companion application releases.
    App,
}

impl ResourceKey {
    /// Every key, in scheduling order.
    pub const ALL: [Self; 2] = [Self::Firmware, Self::App];

    /// Lowercase name used in URLs, topics and logs.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Firmware => "firmware",
            Self::App => "app",
        }
    }
}

impl fmt::Display for ResourceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ResourceKey {
    type Err = CompanionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "firmware" => Ok(Self::Firmware),
            "app" => Ok(Self::App),
            other => Err(CompanionError::UnknownResource(other.to_string())),
        }
    }
}

/// One published release. Field names follow the GitHub releases API.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct Release {
    /// Release identifier.
    pub id: u64,
    /// Git tag, e.g. `"v24.2.12"`.
    pub tag_name: String,
    /// Display name.
    #[serde(default)]
    pub name: Option<String>,
    /// Publication time. `None` for drafts.
    #[serde(default)]
    pub published_at: Option<DateTime<Utc>>,
    /// Release notes (Markdown).
    #[serde(default)]
    pub body: Option<String>,
    /// Web page of the release.
    pub html_url: String,
    /// Marked as a pre-release upstream.
    #[serde(default)]
    pub prerelease: bool,
}

/// Cache entry for one [`ResourceKey`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, ToSchema)]
pub struct ReleaseResource {
    /// Releases from the last successful fetch, in API order.
    pub releases: Vec<Release>,
    /// Time of the last successful fetch.
    pub last_fetched_at: Option<DateTime<Utc>>,
    /// A fetch for this key is in flight.
    pub is_fetching: bool,
    /// Error of the last failed fetch, cleared on success.
    pub last_error: Option<FetchError>,
}

impl ReleaseResource {
    /// Returns `true` if the entry was never fetched or is older than
    /// `max_age` at `now`.
    #[must_use]
    pub fn is_stale(&self, now: DateTime<Utc>, max_age: Duration) -> bool {
        let Some(fetched_at) = self.last_fetched_at else {
            return true;
        };
        let Ok(max_age) = chrono::Duration::from_std(max_age) else {
            return false;
        };
        now.signed_duration_since(fetched_at) > max_age
    }

    /// Looks up a release by tag (exact version match).
    #[must_use]
    pub fn find(&self, tag: &str) -> Option<&Release> {
        self.releases
            .iter()
            .find(|release| release.tag_name == tag || version::compare_exact(&release.tag_name, tag))
    }
}
