//! # Dispatcher
//!
//! Owns the shared broker state and turns inbound envelopes into state
//! changes, direct replies and subscriber fan-out.
//!
//! ## Locking
//!
//! Each shared structure sits behind its own `RwLock`. Locks are always
//! acquired in this order and never the other way round:
//!
//! `schemas → instances → subscriptions → connections`
//!
//! A mutation keeps the instance store locked while it fans out, so
//! broadcasts for one instance leave in the order the mutations applied.
//!
//! ## Delivery
//!
//! Best-effort. Each connection has a bounded outbound channel. A frame that
//! finds the channel full or closed counts as a failed delivery and is
//! otherwise dropped; a subscriber that stops reading never holds more than
//! the channel capacity in memory.

use std::collections::HashMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Value};
use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::{debug, error, info, warn};

use super::errors::{RealtimeError, RealtimeResult};
use crate::instance::{Instance, InstanceError, InstanceStore, MutationOutcome, RejectReason};
use crate::observability::{Event, MetricsRegistry, MetricsSnapshot};
use crate::protocol::{
    AuthRequest, Envelope, InstRequest, InstResponse, ListResponse, MessageType, MutRequest,
    MutationBroadcast, SchemaGetRequest, SchemaGetResponse, SchemaSetRequest, SubRequest,
};
use crate::schema::{json_type_name, Schema, SchemaRegistry};
use crate::subscription::{SubscriberId, SubscriptionIndex, SubscriptionKey};

/// Error text returned when `inst` names an unregistered schema
pub const UNKNOWN_SCHEMA_MESSAGE: &str = "unknown schema, cannot instance";

/// Encoded frame queued for a connection
pub type Outbound = Arc<str>;

/// Outbound sender for a connection
pub type OutboundSender = mpsc::Sender<Outbound>;

/// Outbound receiver for a connection
pub type OutboundReceiver = mpsc::Receiver<Outbound>;

/// Frames a connection may have queued before further frames are dropped
pub const DEFAULT_OUTBOUND_CAPACITY: usize = 256;

/// Result of fanning a message out to a key's subscribers
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchResult {
    /// Subscribers in the set
    pub matched: usize,
    /// Messages queued
    pub delivered: usize,
    /// Subscribers whose connection was gone
    pub failed: usize,
}

/// What handling one inbound message did
#[derive(Debug, Clone, PartialEq)]
pub enum HandleOutcome {
    /// A response was sent to the requester
    Replied,
    /// A mutation was applied and fanned out
    Broadcast(DispatchResult),
    /// Handled; nothing is sent back
    NoReply,
    /// Logged and dropped
    Dropped(RealtimeError),
}

/// Shared broker state plus message routing
#[derive(Debug)]
pub struct Dispatcher {
    schemas: RwLock<SchemaRegistry>,
    instances: RwLock<InstanceStore>,
    subscriptions: RwLock<SubscriptionIndex>,
    connections: RwLock<HashMap<SubscriberId, OutboundSender>>,
    outbound_capacity: usize,
    metrics: MetricsRegistry,
}

impl Default for Dispatcher {
    fn default() -> Self {
        Self::with_outbound_capacity(DEFAULT_OUTBOUND_CAPACITY)
    }
}

impl Dispatcher {
    /// Create a dispatcher with empty state
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a dispatcher whose connections queue at most `capacity` frames
    ///
    /// A capacity of zero is raised to one.
    pub fn with_outbound_capacity(capacity: usize) -> Self {
        Self {
            schemas: RwLock::default(),
            instances: RwLock::default(),
            subscriptions: RwLock::default(),
            connections: RwLock::default(),
            outbound_capacity: capacity.max(1),
            metrics: MetricsRegistry::default(),
        }
    }

    /// Per-connection outbound queue capacity
    pub fn outbound_capacity(&self) -> usize {
        self.outbound_capacity
    }

    // ==================
    // Connections
    // ==================

    /// Register a new connection and return its identity and outbound queue
    pub fn connect(&self) -> RealtimeResult<(SubscriberId, OutboundReceiver)> {
        let subscriber = SubscriberId::new();
        let (tx, rx) = mpsc::channel(self.outbound_capacity);

        write(&self.connections, "connections")?.insert(subscriber, tx);
        self.metrics.increment_connections_opened();

        Ok((subscriber, rx))
    }

    /// Tear down a connection: drop its queue and evict every subscription
    ///
    /// Returns the number of subscriptions removed.
    pub fn disconnect(&self, subscriber: SubscriberId) -> RealtimeResult<usize> {
        let mut subscriptions = write(&self.subscriptions, "subscriptions")?;
        let evicted = subscriptions.remove_subscriber_everywhere(subscriber);
        let remaining = subscriptions.subscription_count();
        drop(subscriptions);
        debug!(
            subscriber = %subscriber,
            evicted,
            remaining,
            "subscriptions evicted"
        );

        if write(&self.connections, "connections")?
            .remove(&subscriber)
            .is_some()
        {
            self.metrics.increment_connections_closed();
        }

        Ok(evicted)
    }

    /// Number of registered connections
    pub fn connection_count(&self) -> usize {
        self.connections.read().map(|c| c.len()).unwrap_or(0)
    }

    /// Counter snapshot
    pub fn metrics(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }

    // ==================
    // Message handling
    // ==================

    /// Handle one raw text frame from `subscriber`
    ///
    /// Never fails: decode errors and unknown types are logged and reported
    /// as [`HandleOutcome::Dropped`], leaving the connection usable.
    pub fn handle_text(&self, subscriber: SubscriberId, text: &str) -> HandleOutcome {
        self.metrics.increment_messages_received();

        match self.process(subscriber, text) {
            Ok(outcome) => outcome,
            Err(err) => {
                self.record_drop(subscriber, &err);
                HandleOutcome::Dropped(err)
            }
        }
    }

    /// Record a message the transport could not hand to `handle_text`
    pub fn record_drop(&self, subscriber: SubscriberId, err: &RealtimeError) {
        self.metrics.increment_messages_dropped();
        if err.is_decode_error() {
            warn!(
                event = %Event::MessageDropped,
                subscriber = %subscriber,
                error = %err,
                "dropping message"
            );
        } else {
            error!(
                event = %Event::MessageDropped,
                subscriber = %subscriber,
                error = %err,
                "dropping message after internal failure"
            );
        }
    }

    fn process(&self, subscriber: SubscriberId, text: &str) -> RealtimeResult<HandleOutcome> {
        let envelope =
            Envelope::decode(text).map_err(|e| RealtimeError::InvalidMessage(e.to_string()))?;

        let kind = envelope
            .message_type()
            .ok_or_else(|| RealtimeError::UnknownMessageType(envelope.kind.clone()))?;

        match kind {
            MessageType::Auth => {
                let msg: AuthRequest = payload(&envelope, kind)?;
                info!(
                    event = %Event::AuthReceived,
                    subscriber = %subscriber,
                    id = %msg.id,
                    "auth accepted without verification"
                );
                Ok(HandleOutcome::NoReply)
            }

            MessageType::Sub => {
                let msg: SubRequest = payload(&envelope, kind)?;
                let key = SubscriptionKey::from_wire(msg.id.as_str(), msg.is_topic());
                self.subscribe(subscriber, &key)?;
                Ok(HandleOutcome::NoReply)
            }

            MessageType::Unsub => {
                let msg: SubRequest = payload(&envelope, kind)?;
                let key = SubscriptionKey::from_wire(msg.id.as_str(), msg.is_topic());
                self.unsubscribe(subscriber, &key)?;
                Ok(HandleOutcome::NoReply)
            }

            MessageType::List => {
                let topics = self.schema_ids()?;
                self.reply(subscriber, &envelope, &ListResponse { topics })
            }

            MessageType::SchemaSet => {
                let msg: SchemaSetRequest = payload(&envelope, kind)?;
                self.set_schema(&msg.schema_id, msg.schema)?;
                Ok(HandleOutcome::NoReply)
            }

            MessageType::SchemaGet => {
                let msg: SchemaGetRequest = payload(&envelope, kind)?;
                let schema = self.schema(&msg.id)?.unwrap_or_default();
                self.reply(
                    subscriber,
                    &envelope,
                    &SchemaGetResponse {
                        id: msg.id,
                        schema,
                    },
                )
            }

            MessageType::Inst => {
                let msg: InstRequest = payload(&envelope, kind)?;
                match self.instantiate(&msg.schema_id) {
                    Ok((instance_id, instance)) => self.reply(
                        subscriber,
                        &envelope,
                        &InstResponse {
                            instance_id,
                            instance,
                        },
                    ),
                    Err(RealtimeError::Instance(InstanceError::UnknownSchema(schema_id))) => {
                        info!(
                            event = %Event::InstanceRejected,
                            subscriber = %subscriber,
                            schema_id = %schema_id,
                            "instantiate of unknown schema"
                        );
                        self.send_to(subscriber, &envelope.reply_error(UNKNOWN_SCHEMA_MESSAGE))?;
                        Ok(HandleOutcome::Replied)
                    }
                    Err(err) => Err(err),
                }
            }

            MessageType::Mut => {
                let msg: MutRequest = payload(&envelope, kind)?;
                self.mutate_and_broadcast(&envelope, &msg)
            }
        }
    }

    // ==================
    // State operations
    // ==================

    /// Register or overwrite a schema
    pub fn set_schema(&self, schema_id: &str, schema: Schema) -> RealtimeResult<()> {
        let fields = schema.fields.len();
        let replaced = write(&self.schemas, "schemas")?.set_schema(schema_id, schema);
        self.metrics.increment_schemas_set();

        info!(
            event = %Event::SchemaSet,
            schema_id = %schema_id,
            fields,
            replaced,
            "schema registered"
        );
        Ok(())
    }

    /// Fetch a schema; `None` if never registered
    pub fn schema(&self, schema_id: &str) -> RealtimeResult<Option<Schema>> {
        Ok(read(&self.schemas, "schemas")?.get_schema(schema_id).cloned())
    }

    /// All registered schema ids
    pub fn schema_ids(&self) -> RealtimeResult<Vec<String>> {
        Ok(read(&self.schemas, "schemas")?.schema_ids())
    }

    /// Create an instance of a registered schema
    pub fn instantiate(&self, schema_id: &str) -> RealtimeResult<(String, Instance)> {
        let schemas = read(&self.schemas, "schemas")?;
        let mut instances = write(&self.instances, "instances")?;

        let (instance_id, instance) = instances.instantiate(&schemas, schema_id)?;
        self.metrics.increment_instances_created();

        info!(
            event = %Event::InstanceCreated,
            schema_id = %schema_id,
            instance_id = %instance_id,
            "instance created"
        );
        Ok((instance_id, instance))
    }

    /// Snapshot of an instance
    pub fn instance(&self, instance_id: &str) -> RealtimeResult<Option<Instance>> {
        Ok(read(&self.instances, "instances")?.get(instance_id).cloned())
    }

    /// Apply a mutation without fanning it out
    ///
    /// Returns `None` if the instance does not exist.
    pub fn mutate(
        &self,
        instance_id: &str,
        change: &Map<String, Value>,
    ) -> RealtimeResult<Option<MutationOutcome>> {
        let schemas = read(&self.schemas, "schemas")?;
        let mut instances = write(&self.instances, "instances")?;
        self.apply(&schemas, &mut instances, instance_id, change)
    }

    /// Subscribe a connection to a topic or instance key
    pub fn subscribe(&self, subscriber: SubscriberId, key: &SubscriptionKey) -> RealtimeResult<()> {
        let added = write(&self.subscriptions, "subscriptions")?.subscribe(key, subscriber);
        debug!(
            event = %Event::Subscribed,
            subscriber = %subscriber,
            key = %key,
            added,
            "subscribe"
        );
        Ok(())
    }

    /// Remove a connection's subscription to a key
    pub fn unsubscribe(
        &self,
        subscriber: SubscriberId,
        key: &SubscriptionKey,
    ) -> RealtimeResult<()> {
        let removed = write(&self.subscriptions, "subscriptions")?.unsubscribe(key, subscriber);
        debug!(
            event = %Event::Unsubscribed,
            subscriber = %subscriber,
            key = %key,
            removed,
            "unsubscribe"
        );
        Ok(())
    }

    /// Current subscribers of a key
    pub fn subscribers_for(&self, key: &SubscriptionKey) -> RealtimeResult<Vec<SubscriberId>> {
        Ok(read(&self.subscriptions, "subscriptions")?.subscribers_for(key))
    }

    /// Keys a connection is subscribed to
    pub fn memberships(&self, subscriber: SubscriberId) -> RealtimeResult<Vec<SubscriptionKey>> {
        Ok(read(&self.subscriptions, "subscriptions")?.memberships(subscriber))
    }

    // ==================
    // Delivery
    // ==================

    /// Queue an envelope for one connection
    ///
    /// Returns false if the connection is gone or its queue is full.
    pub fn send_to(&self, subscriber: SubscriberId, envelope: &Envelope) -> RealtimeResult<bool> {
        let frame = encode(envelope)?;
        let connections = read(&self.connections, "connections")?;
        Ok(connections
            .get(&subscriber)
            .map(|tx| enqueue(tx, subscriber, frame))
            .unwrap_or(false))
    }

    /// Fan an envelope out to every subscriber of a key
    pub fn broadcast(
        &self,
        key: &SubscriptionKey,
        envelope: &Envelope,
    ) -> RealtimeResult<DispatchResult> {
        let frame = encode(envelope)?;
        let subscribers = read(&self.subscriptions, "subscriptions")?.subscribers_for(key);

        let mut result = DispatchResult {
            matched: subscribers.len(),
            ..DispatchResult::default()
        };

        let connections = read(&self.connections, "connections")?;
        for subscriber in subscribers {
            match connections.get(&subscriber) {
                Some(tx) if enqueue(tx, subscriber, Arc::clone(&frame)) => result.delivered += 1,
                _ => result.failed += 1,
            }
        }

        self.metrics.add_broadcasts_delivered(result.delivered as u64);
        self.metrics.add_broadcasts_failed(result.failed as u64);
        Ok(result)
    }

    // ==================
    // Internals
    // ==================

    fn reply<T: Serialize>(
        &self,
        subscriber: SubscriberId,
        request: &Envelope,
        msg: &T,
    ) -> RealtimeResult<HandleOutcome> {
        let msg = serde_json::to_value(msg).map_err(|e| RealtimeError::Encode(e.to_string()))?;
        if !self.send_to(subscriber, &request.reply(msg))? {
            debug!(subscriber = %subscriber, "requester gone before reply");
        }
        Ok(HandleOutcome::Replied)
    }

    fn mutate_and_broadcast(
        &self,
        request: &Envelope,
        msg: &MutRequest,
    ) -> RealtimeResult<HandleOutcome> {
        let schemas = read(&self.schemas, "schemas")?;
        let mut instances = write(&self.instances, "instances")?;

        let Some(outcome) = self.apply(&schemas, &mut instances, &msg.id, &msg.change)? else {
            return Ok(HandleOutcome::NoReply);
        };
        drop(schemas);

        let broadcast = MutationBroadcast {
            id: msg.id.clone(),
            change: outcome.applied,
        };
        let body =
            serde_json::to_value(&broadcast).map_err(|e| RealtimeError::Encode(e.to_string()))?;

        // instances stays locked so per-instance fan-out order matches apply order
        let result = self.broadcast(&SubscriptionKey::Instance(msg.id.clone()), &request.reply(body))?;
        drop(instances);

        info!(
            event = %Event::MutationApplied,
            instance_id = %msg.id,
            applied = broadcast.change.len(),
            rejected = outcome.rejected.len(),
            delivered = result.delivered,
            failed = result.failed,
            "mutation applied"
        );
        Ok(HandleOutcome::Broadcast(result))
    }

    fn apply(
        &self,
        schemas: &SchemaRegistry,
        instances: &mut InstanceStore,
        instance_id: &str,
        change: &Map<String, Value>,
    ) -> RealtimeResult<Option<MutationOutcome>> {
        let outcome = match instances.apply_mutation(schemas, instance_id, change) {
            Ok(outcome) => outcome,
            Err(InstanceError::UnknownInstance(_)) => {
                debug!(
                    event = %Event::MutationIgnored,
                    instance_id = %instance_id,
                    "mutation of unknown instance"
                );
                return Ok(None);
            }
            Err(err) => return Err(err.into()),
        };

        for rejected in &outcome.rejected {
            let reason = match rejected.reason {
                RejectReason::Undeclared => "undeclared field",
                RejectReason::TypeMismatch => "value does not conform to field type",
            };
            let sent = change.get(&rejected.field).map(json_type_name).unwrap_or("missing");
            debug!(
                event = %Event::FieldRejected,
                instance_id = %instance_id,
                field = %rejected.field,
                sent,
                reason,
                "field dropped from mutation"
            );
        }

        self.metrics.increment_mutations_applied();
        self.metrics.add_fields_rejected(outcome.rejected.len() as u64);
        Ok(Some(outcome))
    }
}

fn enqueue(tx: &OutboundSender, subscriber: SubscriberId, frame: Outbound) -> bool {
    match tx.try_send(frame) {
        Ok(()) => true,
        Err(TrySendError::Full(_)) => {
            debug!(
                event = %Event::MessageDropped,
                subscriber = %subscriber,
                "outbound queue full"
            );
            false
        }
        Err(TrySendError::Closed(_)) => false,
    }
}

fn payload<T: DeserializeOwned>(envelope: &Envelope, kind: MessageType) -> RealtimeResult<T> {
    envelope
        .payload()
        .map_err(|e| RealtimeError::InvalidMessage(format!("{} payload: {}", kind, e)))
}

fn encode(envelope: &Envelope) -> RealtimeResult<Outbound> {
    envelope
        .encode()
        .map(Outbound::from)
        .map_err(|e| RealtimeError::Encode(e.to_string()))
}

fn read<'a, T>(lock: &'a RwLock<T>, name: &'static str) -> RealtimeResult<RwLockReadGuard<'a, T>> {
    lock.read().map_err(|_| RealtimeError::LockPoisoned(name))
}

fn write<'a, T>(
    lock: &'a RwLock<T>,
    name: &'static str,
) -> RealtimeResult<RwLockWriteGuard<'a, T>> {
    lock.write().map_err(|_| RealtimeError::LockPoisoned(name))
}
