//! Per-connection subscription manager.
//!
//! Tracks which topics a WebSocket client is subscribed to and provides
//! server-side event filtering.

use std::collections::HashSet;

use crate::domain::Topic;

/// Manages the set of topic subscriptions for a single WebSocket connection.
#[derive(Debug, Default)]
pub struct SubscriptionManager {
    /// Subscribed topics. If `subscribe_all` is true, this set is ignored.
    topics: HashSet<Topic>,
    /// Whether the client subscribes to every topic (wildcard `"*"`).
    subscribe_all: bool,
}

impl SubscriptionManager {
    /// Creates a new empty subscription manager.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds topics to the subscription set.
    pub fn subscribe(&mut self, topics: &[Topic], wildcard: bool) {
        if wildcard {
            self.subscribe_all = true;
        }
        self.topics.extend(topics.iter().copied());
    }

    /// Removes topics from the subscription set. The wildcard drops every
    /// subscription.
    pub fn unsubscribe(&mut self, topics: &[Topic], wildcard: bool) {
        if wildcard {
            self.subscribe_all = false;
            self.topics.clear();
        }
        for topic in topics {
            self.topics.remove(topic);
        }
    }

    /// Returns `true` if events of `topic` pass the filter.
    #[must_use]
    pub fn matches(&self, topic: Topic) -> bool {
        self.subscribe_all || self.topics.contains(&topic)
    }

    /// Returns the number of explicitly subscribed topics.
    #[must_use]
    pub fn count(&self) -> usize {
        self.topics.len()
    }

    /// Returns `true` if the wildcard subscription is active.
    #[must_use]
    pub fn is_subscribed_all(&self) -> bool {
        self.subscribe_all
    }

    /// Names of the topics that currently pass the filter, in stable order.
    #[must_use]
    pub fn active(&self) -> Vec<&'static str> {
        Topic::ALL
            .into_iter()
            .filter(|topic| self.matches(*topic))
            .map(Topic::as_str)
            .collect()
    }
}
