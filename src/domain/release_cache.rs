//! In-memory release cache keyed by [`ResourceKey`].
//!
//! [`ReleaseCache`] stores one [`ReleaseResource`] per key behind a
//! [`tokio::sync::RwLock`]. Every method takes the lock for a short,
//! synchronous critical section; network work happens outside the cache.
//! [`ReleaseCache::begin_fetch`] is the exclusion primitive that keeps at
//! most one fetch in flight per key.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use super::release::{Release, ReleaseResource, ResourceKey};
use crate::error::FetchError;

/// Central store for cached release lists.
///
/// # Concurrency
///
/// - Reads of any key are concurrent.
/// - For one key, commits are serialized by the `is_fetching` flag.
/// - Keys are independent of each other.
#[derive(Debug, Default)]
pub struct ReleaseCache {
    entries: RwLock<HashMap<ResourceKey, ReleaseResource>>,
}

impl ReleaseCache {
    /// Creates an empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a copy of the entry for `key`, creating it if needed.
    pub async fn get(&self, key: ResourceKey) -> ReleaseResource {
        if let Some(entry) = self.entries.read().await.get(&key) {
            return entry.clone();
        }
        self.entries.write().await.entry(key).or_default().clone()
    }

    /// Marks a fetch for `key` as in flight.
    ///
    /// Returns `false` if one is already in flight; the caller must then
    /// not fetch.
    pub async fn begin_fetch(&self, key: ResourceKey) -> bool {
        let mut entries = self.entries.write().await;
        let entry = entries.entry(key).or_default();
        if entry.is_fetching {
            return false;
        }
        entry.is_fetching = true;
        true
    }

    /// Replaces the release list for `key` and stamps the fetch time.
    ///
    /// Clears `is_fetching` and `last_error`. Returns the stamp.
    pub async fn commit_success(&self, key: ResourceKey, releases: Vec<Release>) -> DateTime<Utc> {
        let now = Utc::now();
        let mut entries = self.entries.write().await;
        let entry = entries.entry(key).or_default();
        entry.releases = releases;
        entry.last_fetched_at = Some(now);
        entry.is_fetching = false;
        entry.last_error = None;
        now
    }

    /// Records a failed fetch. The cached releases and fetch stamp are kept.
    pub async fn commit_failure(&self, key: ResourceKey, error: FetchError) {
        let mut entries = self.entries.write().await;
        let entry = entries.entry(key).or_default();
        entry.is_fetching = false;
        entry.last_error = Some(error);
    }

    /// Seeds `key` from persisted data.
    ///
    /// Ignored if the entry already holds data at least as recent, or a
    /// fetch is in flight.
    pub async fn restore(
        &self,
        key: ResourceKey,
        releases: Vec<Release>,
        fetched_at: Option<DateTime<Utc>>,
    ) {
        let mut entries = self.entries.write().await;
        let entry = entries.entry(key).or_default();
        let has_newer = entry
            .last_fetched_at
            .is_some_and(|current| fetched_at.is_none_or(|incoming| current >= incoming));
        if entry.is_fetching || has_newer {
            return;
        }
        entry.releases = releases;
        entry.last_fetched_at = fetched_at;
    }

    /// Returns a copy of every entry, in [`ResourceKey::ALL`] order.
    pub async fn entries(&self) -> Vec<(ResourceKey, ReleaseResource)> {
        let entries = self.entries.read().await;
        ResourceKey::ALL
            .iter()
            .filter_map(|key| entries.get(key).map(|entry| (*key, entry.clone())))
            .collect()
    }
}
