//! Wire protocol
//!
//! JSON envelopes exchanged over the transport, and the typed payloads of
//! each message type.

mod envelope;
mod messages;

pub use envelope::{Envelope, MessageType};
pub use messages::{
    AuthRequest, InstRequest, InstResponse, ListResponse, MutRequest, MutationBroadcast,
    SchemaGetRequest, SchemaGetResponse, SchemaSetRequest, SubRequest,
};
