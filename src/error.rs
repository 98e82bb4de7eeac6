//! Error types for the tracking engine.

use thiserror::Error;

/// Failure reading, writing or converting a single tracked property.
///
/// These never escape an apply/persist cycle; they are reported and the
/// cycle moves on to the next property.
#[derive(Debug, Error)]
pub enum PropertyError {
    #[error("{0}")]
    Access(String),

    #[error("Value conversion failed: {0}")]
    Conversion(String),

    #[error("Target type mismatch: expected {expected}, got {got}")]
    TargetType { expected: &'static str, got: &'static str },
}

impl PropertyError {
    /// Build an access error from anything printable.
    pub fn access(message: impl Into<String>) -> Self {
        PropertyError::Access(message.into())
    }
}

impl From<serde_json::Error> for PropertyError {
    fn from(e: serde_json::Error) -> Self {
        PropertyError::Conversion(e.to_string())
    }
}

/// Main error type for tracking and store operations.
#[derive(Debug, Error)]
pub enum TrackingError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Invalid operation: {0}")]
    InvalidOperation(String),

    #[error("Key not found in store: {0}")]
    KeyNotFound(String),

    #[error("Naming scheme KeyOnly requires a key (target type {0})")]
    MissingKey(String),

    #[error("Property '{property}' was built for {expected}, target is {got}")]
    TypeMismatch {
        property: String,
        expected: &'static str,
        got: &'static str,
    },

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Deserialization error: {0}")]
    Deserialization(String),

    #[error("Corruption detected: {0}")]
    Corruption(String),

    #[error("Checksum mismatch: expected {expected}, got {got}")]
    ChecksumMismatch { expected: u32, got: u32 },
}

impl From<serde_json::Error> for TrackingError {
    fn from(e: serde_json::Error) -> Self {
        TrackingError::Serialization(e.to_string())
    }
}

impl From<rmp_serde::encode::Error> for TrackingError {
    fn from(e: rmp_serde::encode::Error) -> Self {
        TrackingError::Serialization(e.to_string())
    }
}

impl From<rmp_serde::decode::Error> for TrackingError {
    fn from(e: rmp_serde::decode::Error) -> Self {
        TrackingError::Deserialization(e.to_string())
    }
}

/// Result type for tracking operations.
pub type Result<T> = std::result::Result<T, TrackingError>;
