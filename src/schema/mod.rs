//! Schema subsystem for pubmarine
//!
//! Schemas are named sets of typed field declarations. A schema's field set
//! is the sole authority for what an instance of it may store.
//!
//! # Components
//!
//! - `types`: field types and the schema shape
//! - `value`: typed field values and coercion from JSON
//! - `validator`: conformance checks and JSON type names for diagnostics
//! - `registry`: id → schema mapping

mod registry;
mod types;
mod validator;
mod value;

pub use registry::SchemaRegistry;
pub use types::{FieldType, Schema};
pub use validator::{json_type_name, value_conforms};
pub use value::FieldValue;
