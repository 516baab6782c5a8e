//! Service layer for the H5P library registry
//!
//! This crate implements the registry's orchestration logic on top of the
//! storage contracts:
//!
//! - **PackageValidator**: validates untrusted package archives before
//!   anything reaches storage
//! - **DependencyResolver**: computes deterministic, dependency-first
//!   closures over installed libraries
//! - **LibraryManager**: installs, updates, and removes libraries with
//!   consistency checking and rollback
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use h5p_registry_service::{
//!     DependencyResolver, LibraryManager, PackageValidator, ValidationOptions,
//! };
//! use h5p_registry_storage::InMemoryLibraryStorage;
//!
//! # async fn example() -> h5p_registry_service::ServiceResult<()> {
//! let storage = Arc::new(InMemoryLibraryStorage::new());
//! let manager = Arc::new(LibraryManager::new(storage));
//!
//! // the manager doubles as the installed-library index for validation and
//! // as the metadata source for resolution
//! let validator = PackageValidator::with_defaults(manager.clone());
//! let resolver = DependencyResolver::new(manager.clone());
//!
//! validator
//!     .validate("upload.h5p".as_ref(), ValidationOptions::default())
//!     .await?;
//! manager
//!     .install_from_directory("unpacked/H5P.GreetingCard-1.0".as_ref(), false)
//!     .await?;
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod manager;
pub mod resolver;
pub mod validator;

// Re-export main types for convenience
pub use error::{ServiceError, ServiceResult};
pub use manager::{InstallOutcome, LibraryManager};
pub use resolver::{DependencyResolver, MapMetadataSource, MetadataSource};
pub use validator::{
    InstalledLibraryIndex, NoInstalledLibraries, PackageValidator, ValidationOptions,
    ValidatorConfig,
};
