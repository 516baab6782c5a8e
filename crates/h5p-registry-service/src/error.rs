//! Service-layer error types
//!
//! The failure taxonomy of the registry core. Structural archive problems
//! are fatal and never aggregated; all other archive problems accumulate
//! into a single [`Validation`](ServiceError::Validation) rejection. Storage
//! errors pass through opaquely, after any rollback the operation owed.

use h5p_registry_core::{RegistryError, ValidationIssue};
use h5p_registry_storage::StorageError;
use thiserror::Error;

/// Result type alias for service operations
pub type ServiceResult<T> = std::result::Result<T, ServiceError>;

/// Service-layer error types
#[derive(Error, Debug)]
pub enum ServiceError {
    /// An archive entry endangers the filesystem itself (path escape,
    /// size ceiling); validation aborts before any parse or write
    #[error("Structural archive error at {path}: {message}")]
    Structural { path: String, message: String },

    /// The package failed validation; the whole archive is rejected
    #[error("Package validation failed with {} issue(s)", .issues.len())]
    Validation { issues: Vec<ValidationIssue> },

    /// A declared dependency cannot be resolved in-package or in storage
    #[error("Missing dependency: {}", format_missing(.dependency, .required_by.as_deref()))]
    MissingDependency {
        dependency: String,
        required_by: Option<String>,
    },

    /// The dependency graph contains a cycle
    #[error("Cyclic dependency detected: {0}")]
    CyclicDependency(String),

    /// Post-copy verification found referenced files absent from storage
    #[error("Consistency check failed for {library}: missing {}", .missing.join(", "))]
    Consistency {
        library: String,
        missing: Vec<String>,
    },

    /// Removal refused because other installed libraries depend on this one
    #[error("Library {library} is required by {count} installed libraries")]
    HasDependents { library: String, count: usize },

    /// A descriptor file is unreadable or unparseable
    #[error("Invalid descriptor {path}: {message}")]
    InvalidDescriptor { path: String, message: String },

    /// The archive container itself could not be read
    #[error("Archive error: {0}")]
    Archive(String),

    /// Filesystem failure while reading a source directory
    #[error("I/O error: {0}")]
    Io(String),

    /// Opaque storage-layer failure
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
}

fn format_missing(dependency: &str, required_by: Option<&str>) -> String {
    match required_by {
        Some(parent) => format!("{} (required by {})", dependency, parent),
        None => dependency.to_string(),
    }
}

impl ServiceError {
    /// The accumulated issues of a validation rejection, if this is one
    pub fn issues(&self) -> Option<&[ValidationIssue]> {
        match self {
            ServiceError::Validation { issues } => Some(issues),
            _ => None,
        }
    }
}

impl From<RegistryError> for ServiceError {
    fn from(err: RegistryError) -> Self {
        match err {
            RegistryError::MalformedDescriptor { path, message } => {
                ServiceError::InvalidDescriptor { path, message }
            }
            other => ServiceError::InvalidDescriptor {
                path: String::new(),
                message: other.to_string(),
            },
        }
    }
}

impl From<std::io::Error> for ServiceError {
    fn from(err: std::io::Error) -> Self {
        ServiceError::Io(err.to_string())
    }
}

impl From<zip::result::ZipError> for ServiceError {
    fn from(err: zip::result::ZipError) -> Self {
        ServiceError::Archive(err.to_string())
    }
}
