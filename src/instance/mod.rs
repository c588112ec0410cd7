//! Instance subsystem for pubmarine
//!
//! Instances are live records conforming to one schema. They are created only
//! through instantiation and changed only through field-level mutations.

mod errors;
mod id;
mod store;

pub use errors::{InstanceError, InstanceResult};
pub use id::{candidate_id, fnv1a_32};
pub use store::{
    AppliedChanges, Instance, InstanceData, InstanceStore, MutationOutcome, RejectReason,
    RejectedField,
};
