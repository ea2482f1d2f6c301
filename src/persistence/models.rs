//! On-disk shape of the release cache.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::{Release, ReleaseCache, ResourceKey};

/// Current document format.
pub const CACHE_FORMAT_VERSION: u32 = 1;

/// The persisted release cache document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersistedReleaseCache {
    /// Document format version.
    pub version: u32,
    /// One record per fetched resource.
    pub resources: Vec<PersistedResource>,
}

/// One persisted cache entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersistedResource {
    /// Resource key.
    pub key: ResourceKey,
    /// Releases at the time of the last successful fetch.
    pub releases: Vec<Release>,
    /// When those releases were fetched.
    pub fetched_at: Option<DateTime<Utc>>,
}

impl PersistedReleaseCache {
    /// Captures every entry that was fetched at least once.
    pub async fn capture(cache: &ReleaseCache) -> Self {
        let resources = cache
            .entries()
            .await
            .into_iter()
            .filter(|(_, entry)| entry.last_fetched_at.is_some())
            .map(|(key, entry)| PersistedResource {
                key,
                releases: entry.releases,
                fetched_at: entry.last_fetched_at,
            })
            .collect();
        Self {
            version: CACHE_FORMAT_VERSION,
            resources,
        }
    }

    /// Seeds `cache` with the persisted entries. Returns how many entries
    /// were offered. Documents of another format version are ignored.
    pub async fn restore_into(self, cache: &ReleaseCache) -> usize {
        if self.version != CACHE_FORMAT_VERSION {
            tracing::warn!(
                version = self.version,
                expected = CACHE_FORMAT_VERSION,
                "ignoring release cache of unknown format"
            );
            return 0;
        }
        let count = self.resources.len();
        for resource in self.resources {
            cache
                .restore(resource.key, resource.releases, resource.fetched_at)
                .await;
        }
        count
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;

    fn release(tag: &str) -> Release {
        Release {
            id: 1,
            tag_name: tag.to_string(),
            name: None,
            published_at: None,
            body: None,
            html_url: String::new(),
            prerelease: false,
        }
    }

    #[tokio::test]
    async fn capture_skips_never_fetched_entries() {
        let cache = ReleaseCache::new();
        let _ = cache.get(ResourceKey::App).await;
        cache
            .commit_success(ResourceKey::Firmware, vec![release("v24.2.12")])
            .await;

        let doc = PersistedReleaseCache::capture(&cache).await;
        assert_eq!(doc.resources.len(), 1);
        assert!(doc.resources.iter().all(|r| r.key == ResourceKey::Firmware));
    }

    #[tokio::test]
    async fn restore_keeps_fetch_stamp() {
        let source = ReleaseCache::new();
        let stamp = source
            .commit_success(ResourceKey::Firmware, vec![release("v24.2.12")])
            .await;
        let doc = PersistedReleaseCache::capture(&source).await;

        let target = ReleaseCache::new();
        assert_eq!(doc.restore_into(&target).await, 1);
        let entry = target.get(ResourceKey::Firmware).await;
        assert_eq!(entry.last_fetched_at, Some(stamp));
        assert_eq!(entry.releases.len(), 1);
    }

    #[tokio::test]
    async fn unknown_version_is_ignored() {
        let doc = PersistedReleaseCache {
            version: 99,
            resources: vec![PersistedResource {
                key: ResourceKey::App,
                releases: vec![release("1.0.0")],
                fetched_at: Some(Utc::now()),
            }],
        };
        let cache = ReleaseCache::new();
        assert_eq!(doc.restore_into(&cache).await, 0);
        assert!(cache.entries().await.is_empty());
    }
}
