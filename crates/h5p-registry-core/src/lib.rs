//! Core domain models and types for the H5P library registry
//!
//! This crate contains the data structures, version rules, and descriptor
//! parsing that represent content-type libraries, their dependencies, and
//! package manifests. It has no I/O of its own; the storage and service
//! crates build on these types.

pub mod error;
pub mod library;
pub mod manifest;
pub mod types;
pub mod validation;

// Re-exports for convenience
pub use error::{RegistryError, Result};
pub use library::{
    AdditionalMetadata, CoreApiVersion, FileReference, InstalledLibrary, LibraryMetadata,
    LibraryName, LIBRARY_DESCRIPTOR_FILE,
};
pub use manifest::{PackageManifest, PACKAGE_MANIFEST_FILE};
pub use types::{DependencyRelation, InstallationId, RelationSet};
pub use validation::{IssueKind, ValidationIssue};
