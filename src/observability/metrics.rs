//! Metrics registry for pubmarine
//!
//! - Counters only
//! - Monotonic increase
//! - Reset only on process start

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

/// Operational counters shared by every connection task
///
/// All counters use Relaxed atomics; readers only need eventually
/// consistent values.
#[derive(Debug, Default)]
pub struct MetricsRegistry {
    connections_opened: AtomicU64,
    connections_closed: AtomicU64,
    messages_received: AtomicU64,
    messages_dropped: AtomicU64,
    schemas_set: AtomicU64,
    instances_created: AtomicU64,
    mutations_applied: AtomicU64,
    fields_rejected: AtomicU64,
    broadcasts_delivered: AtomicU64,
    broadcasts_failed: AtomicU64,
}

impl MetricsRegistry {
    /// Create a registry with all counters at zero
    pub fn new() -> Self {
        Self::default()
    }

    // Connections

    pub fn increment_connections_opened(&self) {
        self.connections_opened.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_connections_closed(&self) {
        self.connections_closed.fetch_add(1, Ordering::Relaxed);
    }

    // Messages

    pub fn increment_messages_received(&self) {
        self.messages_received.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_messages_dropped(&self) {
        self.messages_dropped.fetch_add(1, Ordering::Relaxed);
    }

    // Domain

    pub fn increment_schemas_set(&self) {
        self.schemas_set.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_instances_created(&self) {
        self.instances_created.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_mutations_applied(&self) {
        self.mutations_applied.fetch_add(1, Ordering::Relaxed);
    }

    pub fn add_fields_rejected(&self, count: u64) {
        self.fields_rejected.fetch_add(count, Ordering::Relaxed);
    }

    // Fan-out

    pub fn add_broadcasts_delivered(&self, count: u64) {
        self.broadcasts_delivered.fetch_add(count, Ordering::Relaxed);
    }

    pub fn add_broadcasts_failed(&self, count: u64) {
        self.broadcasts_failed.fetch_add(count, Ordering::Relaxed);
    }

    /// Point-in-time copy of every counter
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            connections_opened: self.connections_opened.load(Ordering::Relaxed),
            connections_closed: self.connections_closed.load(Ordering::Relaxed),
            messages_received: self.messages_received.load(Ordering::Relaxed),
            messages_dropped: self.messages_dropped.load(Ordering::Relaxed),
            schemas_set: self.schemas_set.load(Ordering::Relaxed),
            instances_created: self.instances_created.load(Ordering::Relaxed),
            mutations_applied: self.mutations_applied.load(Ordering::Relaxed),
            fields_rejected: self.fields_rejected.load(Ordering::Relaxed),
            broadcasts_delivered: self.broadcasts_delivered.load(Ordering::Relaxed),
            broadcasts_failed: self.broadcasts_failed.load(Ordering::Relaxed),
        }
    }
}

/// Snapshot of all metrics at a point in time
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MetricsSnapshot {
    pub connections_opened: u64,
    pub connections_closed: u64,
    pub messages_received: u64,
    pub messages_dropped: u64,
    pub schemas_set: u64,
    pub instances_created: u64,
    pub mutations_applied: u64,
    pub fields_rejected: u64,
    pub broadcasts_delivered: u64,
    pub broadcasts_failed: u64,
}

impl MetricsSnapshot {
    /// Connections currently open
    pub fn active_connections(&self) -> u64 {
        self.connections_opened.saturating_sub(self.connections_closed)
    }
}
