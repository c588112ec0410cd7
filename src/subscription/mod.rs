//! Subscription management
//!
//! Tracks which connections are interested in which topics and instances.

mod index;

pub use index::{SubscriberId, SubscriptionIndex, SubscriptionKey};
