//! Error types for the library registry core

use thiserror::Error;

/// Result type alias for core registry operations
pub type Result<T> = std::result::Result<T, RegistryError>;

/// Main error type for core registry operations
#[derive(Error, Debug)]
pub enum RegistryError {
    /// A machine name or directory name does not match the allowed pattern
    #[error("Invalid library name: {0}")]
    InvalidLibraryName(String),

    /// A version string could not be parsed into its numeric components
    #[error("Invalid version: {0}")]
    InvalidVersion(String),

    /// A `library.json` or `h5p.json` descriptor could not be parsed
    #[error("Malformed descriptor {path}: {message}")]
    MalformedDescriptor { path: String, message: String },

    /// Validation error
    #[error("Validation error: {0}")]
    ValidationError(String),

    /// Serialization/Deserialization error
    #[error("Serialization error: {0}")]
    SerializationError(String),
}

impl From<serde_json::Error> for RegistryError {
    fn from(err: serde_json::Error) -> Self {
        RegistryError::SerializationError(err.to_string())
    }
}
