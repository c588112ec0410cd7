//! Instance store errors

use thiserror::Error;

/// Result type for instance store operations
pub type InstanceResult<T> = Result<T, InstanceError>;

/// Instance store errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InstanceError {
    /// Instantiation referenced a schema that is not registered
    #[error("unknown schema, cannot instance: {0}")]
    UnknownSchema(String),

    /// Mutation referenced an instance that does not exist
    #[error("unknown instance: {0}")]
    UnknownInstance(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = InstanceError::UnknownSchema("users".into());
        assert_eq!(err.to_string(), "unknown schema, cannot instance: users");

        let err = InstanceError::UnknownInstance("123".into());
        assert!(err.to_string().contains("123"));
    }
}
