//! # Real-Time Errors
//!
//! Error types for message handling and the connection loop. None of these
//! are fatal to the process; at worst they end a single connection.

use thiserror::Error;

use crate::instance::InstanceError;

/// Result type for real-time operations
pub type RealtimeResult<T> = Result<T, RealtimeError>;

/// Real-time errors
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RealtimeError {
    // ==================
    // Decode Errors
    // ==================
    /// Envelope or payload could not be decoded
    #[error("Invalid message format: {0}")]
    InvalidMessage(String),

    /// Envelope type is not one the broker handles
    #[error("Unknown message type: {0:?}")]
    UnknownMessageType(String),

    /// Frame type other than text
    #[error("Unsupported frame: {0}")]
    UnsupportedFrame(&'static str),

    // ==================
    // Domain Errors
    // ==================
    /// Instance store rejected the operation
    #[error(transparent)]
    Instance(#[from] InstanceError),

    // ==================
    // Connection Errors
    // ==================
    /// Transport failure
    #[error("Connection error: {0}")]
    ConnectionError(String),

    // ==================
    // Internal Errors
    // ==================
    /// A shared structure's lock was poisoned by a panicking task
    #[error("Lock poisoned: {0}")]
    LockPoisoned(&'static str),

    /// Outbound message could not be encoded
    #[error("Encoding failed: {0}")]
    Encode(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    ConfigError(String),
}

impl RealtimeError {
    /// Returns true for errors caused by the client's input
    pub fn is_decode_error(&self) -> bool {
        matches!(
            self,
            RealtimeError::InvalidMessage(_)
                | RealtimeError::UnknownMessageType(_)
                | RealtimeError::UnsupportedFrame(_)
        )
    }
}
