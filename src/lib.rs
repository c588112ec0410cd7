//! pubmarine - a real-time object sync broker
//!
//! Clients register schemas, create instances of them, subscribe to
//! instances and mutate their fields over WebSocket. Accepted field changes
//! are broadcast to every subscriber of the instance.

pub mod cli;
pub mod client;
pub mod http_server;
pub mod instance;
pub mod observability;
pub mod protocol;
pub mod realtime;
pub mod schema;
pub mod subscription;
