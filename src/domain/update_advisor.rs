//! Derived update facts.
//!
//! [`UpdateAdvisor`] borrows a release list and the installed version and
//! answers "what is the latest release", "is there something new", "is this
//! the installed one". Nothing is cached; build a fresh advisor from the
//! current cache entry whenever a consumer asks.

use serde::Serialize;
use utoipa::ToSchema;

use super::release::Release;
use super::version;

/// Pure view over a release list and the installed version.
#[derive(Debug, Clone, Copy)]
pub struct UpdateAdvisor<'a> {
    releases: &'a [Release],
    installed: Option<&'a str>,
    minimum: Option<&'a str>,
    install_authorized: bool,
}

impl<'a> UpdateAdvisor<'a> {
    /// Creates an advisor for `releases` with the given installed version.
    #[must_use]
    pub const fn new(releases: &'a [Release], installed: Option<&'a str>) -> Self {
        Self {
            releases,
            installed,
            minimum: None,
            install_authorized: false,
        }
    }

    /// Sets the minimum recommended version.
    #[must_use]
    pub const fn with_minimum(mut self, minimum: &'a str) -> Self {
        self.minimum = Some(minimum);
        self
    }

    /// Sets whether the device accepts install actions (credentials
    /// configured).
    #[must_use]
    pub const fn with_install_authorized(mut self, authorized: bool) -> Self {
        self.install_authorized = authorized;
        self
    }

    /// Newest release by publication time. Unpublished entries sort last;
    /// on ties the first in list order wins.
    #[must_use]
    pub fn latest_release(&self) -> Option<&'a Release> {
        self.releases
            .iter()
            .min_by(|a, b| b.published_at.cmp(&a.published_at))
    }

    /// `true` if a release is cached, the installed version is known and
    /// the latest tag does not denote the installed version.
    #[must_use]
    pub fn has_new_version(&self) -> bool {
        match (self.latest_release(), self.installed) {
            (Some(latest), Some(installed)) => !version::compare_exact(&latest.tag_name, installed),
            _ => false,
        }
    }

    /// `true` if `release` is the installed version.
    #[must_use]
    pub fn is_installed_release(&self, release: &Release) -> bool {
        self.installed
            .is_some_and(|installed| version::compare_exact(&release.tag_name, installed))
    }

    /// `true` if `release` is exactly the minimum recommended version.
    #[must_use]
    pub fn is_recommended_minimum(&self, release: &Release) -> bool {
        self.minimum
            .is_some_and(|minimum| version::compare_exact(&release.tag_name, minimum))
    }

    /// `true` if `candidate` is at or above the minimum recommended
    /// version. Always `true` when no minimum is set.
    #[must_use]
    pub fn meets_minimum(&self, candidate: &str) -> bool {
        self.minimum
            .is_none_or(|minimum| version::is_at_least(candidate, minimum))
    }

    /// `true` if the device accepts installs and `release` is not the
    /// installed version.
    #[must_use]
    pub fn can_install(&self, release: &Release) -> bool {
        self.install_authorized && !self.is_installed_release(release)
    }

    /// Per-release flags for list rendering.
    #[must_use]
    pub fn badges(&self, release: &Release) -> ReleaseBadges {
        ReleaseBadges {
            is_latest: self
                .latest_release()
                .is_some_and(|latest| latest.id == release.id && latest.tag_name == release.tag_name),
            is_installed: self.is_installed_release(release),
            is_recommended_minimum: self.is_recommended_minimum(release),
            can_install: self.can_install(release),
        }
    }

    /// Summary of the update situation.
    #[must_use]
    pub fn advice(&self) -> UpdateAdvice {
        let latest = self.latest_release();
        UpdateAdvice {
            installed_version: self.installed.map(str::to_string),
            latest_tag: latest.map(|release| release.tag_name.clone()),
            latest_url: latest.map(|release| release.html_url.clone()),
            has_new_version: self.has_new_version(),
            minimum_version: self.minimum.map(str::to_string),
            installed_meets_minimum: self
                .installed
                .map(|installed| self.meets_minimum(installed)),
            release_count: self.releases.len(),
        }
    }
}

/// Flags attached to one release in a list.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, ToSchema)]
pub struct ReleaseBadges {
    /// Newest release in the list.
    pub is_latest: bool,
    /// Currently installed.
    pub is_installed: bool,
    /// The minimum recommended release.
    pub is_recommended_minimum: bool,
    /// Install action available.
    pub can_install: bool,
}

/// Update summary for one resource.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct UpdateAdvice {
    /// Installed version, when known.
    pub installed_version: Option<String>,
    /// Tag of the newest release.
    pub latest_tag: Option<String>,
    /// Web page of the newest release.
    pub latest_url: Option<String>,
    /// A different release than the installed one is available.
    pub has_new_version: bool,
    /// Minimum recommended version, if any.
    pub minimum_version: Option<String>,
    /// Installed version is at or above the minimum; `None` if unknown.
    pub installed_meets_minimum: Option<bool>,
    /// Number of cached releases.
    pub release_count: usize,
}
