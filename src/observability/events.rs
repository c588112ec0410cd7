//! Observable broker events
//!
//! Every lifecycle log line carries one of these names in its `event` field so
//! log consumers can match on a stable identifier instead of message text.

use std::fmt;

/// Observable events in pubmarine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    // Lifecycle
    /// Broker startup begins
    BrokerStart,
    /// Listener bound, ready to accept connections
    BrokerListening,
    /// Shutdown initiated
    ShutdownStart,
    /// Shutdown complete
    ShutdownComplete,
    /// Configuration loaded
    ConfigLoaded,

    // Connections
    /// WebSocket connection accepted
    ConnectionOpen,
    /// WebSocket connection closed and evicted
    ConnectionClose,
    /// Transport read or write failed
    TransportError,

    // Messages
    /// Inbound message could not be handled and was dropped
    MessageDropped,
    /// Auth message received (not enforced)
    AuthReceived,
    /// Schema registered or overwritten
    SchemaSet,
    /// Instance created
    InstanceCreated,
    /// Instantiation of an unknown schema rejected
    InstanceRejected,
    /// Mutation applied and fanned out
    MutationApplied,
    /// Field dropped from a mutation
    FieldRejected,
    /// Mutation targeted an unknown instance
    MutationIgnored,
    /// Subscription added
    Subscribed,
    /// Subscription removed
    Unsubscribed,
}

impl Event {
    /// Returns the event name string
    pub fn as_str(&self) -> &'static str {
        match self {
            Event::BrokerStart => "BROKER_START",
            Event::BrokerListening => "BROKER_LISTENING",
            Event::ShutdownStart => "SHUTDOWN_START",
            Event::ShutdownComplete => "SHUTDOWN_COMPLETE",
            Event::ConfigLoaded => "CONFIG_LOADED",
            Event::ConnectionOpen => "CONNECTION_OPEN",
            Event::ConnectionClose => "CONNECTION_CLOSE",
            Event::TransportError => "TRANSPORT_ERROR",
            Event::MessageDropped => "MESSAGE_DROPPED",
            Event::AuthReceived => "AUTH_RECEIVED",
            Event::SchemaSet => "SCHEMA_SET",
            Event::InstanceCreated => "INSTANCE_CREATED",
            Event::InstanceRejected => "INSTANCE_REJECTED",
            Event::MutationApplied => "MUTATION_APPLIED",
            Event::FieldRejected => "FIELD_REJECTED",
            Event::MutationIgnored => "MUTATION_IGNORED",
            Event::Subscribed => "SUBSCRIBED",
            Event::Unsubscribed => "UNSUBSCRIBED",
        }
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
