//! Schema registry
//!
//! Maps schema identifiers to field declarations. Registering an existing
//! identifier replaces the schema in place; there is no delete.

use std::collections::BTreeMap;

use super::types::Schema;

/// In-memory schema registry
#[derive(Debug, Default)]
pub struct SchemaRegistry {
    schemas: BTreeMap<String, Schema>,
}

impl SchemaRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Store or overwrite a schema. Field definitions are not validated.
    ///
    /// Returns true if an existing schema was replaced.
    pub fn set_schema(&mut self, id: impl Into<String>, schema: Schema) -> bool {
        self.schemas.insert(id.into(), schema).is_some()
    }

    /// Look up a schema; `None` if the id was never registered
    pub fn get_schema(&self, id: &str) -> Option<&Schema> {
        self.schemas.get(id)
    }

    /// Returns true if the id is registered
    pub fn contains(&self, id: &str) -> bool {
        self.schemas.contains_key(id)
    }

    /// All registered schema identifiers, sorted
    pub fn schema_ids(&self) -> Vec<String> {
        self.schemas.keys().cloned().collect()
    }

    /// Number of registered schemas
    pub fn len(&self) -> usize {
        self.schemas.len()
    }

    /// Returns true if no schema is registered
    pub fn is_empty(&self) -> bool {
        self.schemas.is_empty()
    }
}
