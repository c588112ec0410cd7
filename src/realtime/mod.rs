//! # pubmarine Real-Time Module
//!
//! Routes client envelopes to the schema registry, instance store and
//! subscription index, and fans mutation results out to subscribers.
//!
//! ## Architecture
//!
//! - **Dispatcher**: shared state, routing and best-effort fan-out
//! - **Errors**: decode, domain and connection failures

pub mod dispatcher;
pub mod errors;

pub use dispatcher::{
    DispatchResult, Dispatcher, HandleOutcome, Outbound, OutboundReceiver, OutboundSender,
    DEFAULT_OUTBOUND_CAPACITY, UNKNOWN_SCHEMA_MESSAGE,
};
pub use errors::{RealtimeError, RealtimeResult};
