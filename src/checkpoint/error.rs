//! Checkpoint error types.

use crate::builder::DefinitionError;
use crate::core::ValueError;
use thiserror::Error;

/// Errors that can occur during checkpoint operations
#[derive(Debug, Error)]
pub enum CheckpointError {
    /// Serialization to JSON failed
    #[error("Serialization failed: {0}")]
    SerializationFailed(String),

    /// Deserialization from JSON failed
    #[error("Deserialization failed: {0}")]
    DeserializationFailed(String),

    /// Checkpoint version is not supported by this version
    #[error("Unsupported checkpoint version {found}, supported: {supported}")]
    UnsupportedVersion { found: u32, supported: u32 },

    /// Checkpoint was taken from a different machine
    #[error("Checkpoint belongs to machine '{found}', expected '{expected}'")]
    MachineMismatch { expected: String, found: String },

    /// Stored value does not describe a legal configuration
    #[error("Checkpoint validation failed: {0}")]
    ValidationFailed(#[from] ValueError),

    /// Registry does not fit the definition being restored
    #[error(transparent)]
    Definition(#[from] DefinitionError),
}
