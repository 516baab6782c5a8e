//! Storage-layer error types

use h5p_registry_core::RegistryError;
use thiserror::Error;

use crate::cache::CacheError;

/// Result type alias for storage operations
pub type StorageResult<T> = std::result::Result<T, StorageError>;

/// Storage-layer error types
///
/// Concrete backends map their internal failures onto these variants;
/// everything above the storage layer treats them as opaque.
#[derive(Error, Debug)]
pub enum StorageError {
    /// The requested library is not installed
    #[error("Library not installed: {0}")]
    LibraryNotFound(String),

    /// The library is installed but the requested file is not
    #[error("File not found: {library}/{file}")]
    FileNotFound { library: String, file: String },

    /// Install was attempted for an identity that already exists
    #[error("Library already installed: {0}")]
    AlreadyInstalled(String),

    /// A file path contains disallowed components
    #[error("Invalid file path: {0}")]
    InvalidPath(String),

    /// The backend does not implement an optional capability
    #[error("Operation not supported by this backend: {0}")]
    Unsupported(&'static str),

    /// Cache layer failure
    #[error("Cache error: {0}")]
    Cache(#[from] CacheError),

    /// Stored data could not be (de)serialized
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// I/O failure inside the backend
    #[error("I/O error: {0}")]
    Io(String),

    /// Domain-level error surfaced by stored data
    #[error(transparent)]
    Domain(#[from] RegistryError),

    /// Opaque backend failure
    #[error("Backend error: {0}")]
    Backend(String),
}

impl From<serde_json::Error> for StorageError {
    fn from(err: serde_json::Error) -> Self {
        StorageError::Serialization(err.to_string())
    }
}

impl From<std::io::Error> for StorageError {
    fn from(err: std::io::Error) -> Self {
        StorageError::Io(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_display() {
        let err = StorageError::LibraryNotFound("H5P.Test-1.0".to_string());
        assert_eq!(err.to_string(), "Library not installed: H5P.Test-1.0");
    }

    #[test]
    fn test_cache_error_conversion() {
        let err: StorageError = CacheError::Backend("connection reset".to_string()).into();
        assert!(matches!(err, StorageError::Cache(_)));
    }
}
