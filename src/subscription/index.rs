//! Subscription index
//!
//! Two independent indices, by topic and by instance id, each mapping a key
//! to the set of subscribed connections. A reverse membership map makes
//! disconnect eviction proportional to the number of sets a subscriber
//! joined rather than to the total key space.
//!
//! Sets are created lazily on first subscribe and are not pruned when they
//! become empty.

use std::collections::{HashMap, HashSet};
use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Identity of a connected subscriber, issued at connect time
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SubscriberId(Uuid);

impl SubscriberId {
    /// Issue a fresh subscriber id
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SubscriberId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SubscriberId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// A subscription key: a topic (schema id) or an instance id
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum SubscriptionKey {
    /// Schema-granularity topic
    Topic(String),
    /// Single instance
    Instance(String),
}

impl SubscriptionKey {
    /// Build a key from the wire's `(Id, IsTopic)` pair
    pub fn from_wire(id: impl Into<String>, is_topic: bool) -> Self {
        if is_topic {
            SubscriptionKey::Topic(id.into())
        } else {
            SubscriptionKey::Instance(id.into())
        }
    }

    /// The raw key string
    pub fn id(&self) -> &str {
        match self {
            SubscriptionKey::Topic(id) | SubscriptionKey::Instance(id) => id,
        }
    }

    /// Returns true for topic keys
    pub fn is_topic(&self) -> bool {
        matches!(self, SubscriptionKey::Topic(_))
    }
}

impl fmt::Display for SubscriptionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SubscriptionKey::Topic(id) => write!(f, "topic:{}", id),
            SubscriptionKey::Instance(id) => write!(f, "instance:{}", id),
        }
    }
}

/// Topic and instance subscription sets
#[derive(Debug, Default)]
pub struct SubscriptionIndex {
    /// Subscribers by topic
    by_topic: HashMap<String, HashSet<SubscriberId>>,

    /// Subscribers by instance id
    by_instance: HashMap<String, HashSet<SubscriberId>>,

    /// Keys each subscriber currently belongs to
    by_subscriber: HashMap<SubscriberId, HashSet<SubscriptionKey>>,
}

impl SubscriptionIndex {
    /// Create an empty index
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a subscriber to a key's set. Idempotent.
    ///
    /// Returns true if the subscriber was not already a member.
    pub fn subscribe(&mut self, key: &SubscriptionKey, subscriber: SubscriberId) -> bool {
        let added = self
            .sets_mut(key)
            .entry(key.id().to_string())
            .or_default()
            .insert(subscriber);

        if added {
            self.by_subscriber
                .entry(subscriber)
                .or_default()
                .insert(key.clone());
        }

        added
    }

    /// Remove a subscriber from a key's set; absent members are ignored
    ///
    /// Returns true if the subscriber was a member.
    pub fn unsubscribe(&mut self, key: &SubscriptionKey, subscriber: SubscriberId) -> bool {
        let removed = self
            .sets_mut(key)
            .get_mut(key.id())
            .map(|set| set.remove(&subscriber))
            .unwrap_or(false);

        if removed {
            if let Some(keys) = self.by_subscriber.get_mut(&subscriber) {
                keys.remove(key);
                if keys.is_empty() {
                    self.by_subscriber.remove(&subscriber);
                }
            }
        }

        removed
    }

    /// Current members of a key's set (possibly empty)
    ///
    /// Never creates a set for the key.
    pub fn subscribers_for(&self, key: &SubscriptionKey) -> Vec<SubscriberId> {
        self.sets(key)
            .get(key.id())
            .map(|set| set.iter().copied().collect())
            .unwrap_or_default()
    }

    /// Remove a subscriber from every topic and instance set
    ///
    /// Returns the number of memberships removed.
    pub fn remove_subscriber_everywhere(&mut self, subscriber: SubscriberId) -> usize {
        let Some(keys) = self.by_subscriber.remove(&subscriber) else {
            return 0;
        };

        let mut removed = 0;
        for key in &keys {
            if let Some(set) = self.sets_mut(key).get_mut(key.id()) {
                if set.remove(&subscriber) {
                    removed += 1;
                }
            }
        }
        removed
    }

    /// Keys a subscriber currently belongs to
    pub fn memberships(&self, subscriber: SubscriberId) -> Vec<SubscriptionKey> {
        self.by_subscriber
            .get(&subscriber)
            .map(|keys| keys.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Total memberships across both indices
    pub fn subscription_count(&self) -> usize {
        self.by_subscriber.values().map(HashSet::len).sum()
    }

    fn sets(&self, key: &SubscriptionKey) -> &HashMap<String, HashSet<SubscriberId>> {
        if key.is_topic() {
            &self.by_topic
        } else {
            &self.by_instance
        }
    }

    fn sets_mut(&mut self, key: &SubscriptionKey) -> &mut HashMap<String, HashSet<SubscriberId>> {
        if key.is_topic() {
            &mut self.by_topic
        } else {
            &mut self.by_instance
        }
    }
}
