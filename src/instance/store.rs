//! Instance store
//!
//! Holds every live instance keyed by its server-issued identifier. An
//! instance's data map only ever contains fields its schema declared when the
//! instance was created; mutations can overwrite those fields but never add
//! new ones.

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::errors::{InstanceError, InstanceResult};
use super::id::candidate_id;
use crate::schema::{FieldValue, SchemaRegistry};

/// Field values keyed by field identifier
pub type InstanceData = BTreeMap<String, FieldValue>;

/// Fields a mutation actually applied, keyed by field identifier
pub type AppliedChanges = BTreeMap<String, FieldValue>;

/// A live, mutable record bound to one schema
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Instance {
    /// Owning schema identifier
    #[serde(rename = "SchemaId", alias = "schemaId")]
    pub schema_id: String,

    /// Current field values
    #[serde(rename = "Data", alias = "data", default)]
    pub data: InstanceData,
}

/// Why a field in a mutation was not applied
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectReason {
    /// The schema does not declare the field
    Undeclared,
    /// The value does not conform to the declared type
    TypeMismatch,
}

/// A field dropped from a mutation
#[derive(Debug, Clone, PartialEq)]
pub struct RejectedField {
    /// Field identifier as sent
    pub field: String,
    /// Reason it was dropped
    pub reason: RejectReason,
}

/// Result of applying a mutation to an instance
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MutationOutcome {
    /// Fields that were written
    pub applied: AppliedChanges,
    /// Fields that were silently dropped
    pub rejected: Vec<RejectedField>,
}

/// In-memory instance store
#[derive(Debug, Default)]
pub struct InstanceStore {
    instances: HashMap<String, Instance>,
    /// Next sequence number fed to the id hash; never reused
    next_sequence: u64,
}

impl InstanceStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an instance of `schema_id` seeded with per-type defaults
    ///
    /// # Errors
    ///
    /// Returns `UnknownSchema` if the schema is not registered.
    pub fn instantiate(
        &mut self,
        registry: &SchemaRegistry,
        schema_id: &str,
    ) -> InstanceResult<(String, Instance)> {
        let schema = registry
            .get_schema(schema_id)
            .ok_or_else(|| InstanceError::UnknownSchema(schema_id.to_string()))?;

        let data = schema
            .fields
            .iter()
            .map(|(field, field_type)| (field.clone(), FieldValue::default_for(*field_type)))
            .collect();

        let instance = Instance {
            schema_id: schema_id.to_string(),
            data,
        };

        let id = self.mint_id(schema_id);
        self.instances.insert(id.clone(), instance.clone());

        Ok((id, instance))
    }

    /// Look up an instance
    pub fn get(&self, id: &str) -> Option<&Instance> {
        self.instances.get(id)
    }

    /// Apply a field-level mutation
    ///
    /// Each field must be declared by the instance's schema and its value
    /// must conform to the declared type; anything else is dropped and
    /// reported in [`MutationOutcome::rejected`].
    ///
    /// # Errors
    ///
    /// Returns `UnknownInstance` if no instance has this id. Nothing else
    /// fails the mutation as a whole.
    pub fn apply_mutation(
        &mut self,
        registry: &SchemaRegistry,
        id: &str,
        change: &Map<String, Value>,
    ) -> InstanceResult<MutationOutcome> {
        let instance = self
            .instances
            .get_mut(id)
            .ok_or_else(|| InstanceError::UnknownInstance(id.to_string()))?;

        let schema = registry.get_schema(&instance.schema_id);
        let mut outcome = MutationOutcome::default();

        for (field, value) in change {
            let declared = schema
                .and_then(|s| s.field_type(field))
                .filter(|_| instance.data.contains_key(field));

            let Some(field_type) = declared else {
                outcome.rejected.push(RejectedField {
                    field: field.clone(),
                    reason: RejectReason::Undeclared,
                });
                continue;
            };

            match FieldValue::coerce(value, field_type) {
                Some(typed) => {
                    instance.data.insert(field.clone(), typed.clone());
                    outcome.applied.insert(field.clone(), typed);
                }
                None => outcome.rejected.push(RejectedField {
                    field: field.clone(),
                    reason: RejectReason::TypeMismatch,
                }),
            }
        }

        Ok(outcome)
    }

    /// Number of stored instances
    pub fn len(&self) -> usize {
        self.instances.len()
    }

    /// Returns true if no instance exists
    pub fn is_empty(&self) -> bool {
        self.instances.is_empty()
    }

    fn mint_id(&mut self, schema_id: &str) -> String {
        loop {
            let id = candidate_id(schema_id, self.next_sequence);
            self.next_sequence += 1;
            if !self.instances.contains_key(&id) {
                return id;
            }
        }
    }
}
