//! Storage layer for the H5P library registry
//!
//! This crate defines the storage and cache contracts the registry core is
//! written against, plus the pieces every deployment shares:
//!
//! - **LibraryStorage**: the async contract for library persistence,
//!   implemented by concrete backends elsewhere
//! - **InMemoryLibraryStorage**: a complete reference backend used by tests
//!   and lightweight embedders
//! - **KeyValueCache** / **MokaCache**: the cache primitive contract and its
//!   default in-process implementation
//! - **CachedLibraryStorage**: a decorator adding a read-through,
//!   write-invalidating cache in front of any `LibraryStorage`
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use h5p_registry_storage::{CachedLibraryStorage, InMemoryLibraryStorage, MokaCache};
//!
//! let backing = Arc::new(InMemoryLibraryStorage::new());
//! let cache = Arc::new(MokaCache::with_capacity(10_000));
//! let storage = CachedLibraryStorage::new(backing, cache);
//! # let _ = storage;
//! ```

pub mod cache;
pub mod cached;
pub mod error;
pub mod library_storage;
pub mod memory;

// Re-exports for convenience
pub use cache::{CacheError, CacheResult, CacheStats, KeyValueCache, MokaCache};
pub use cached::CachedLibraryStorage;
pub use error::{StorageError, StorageResult};
pub use library_storage::{FileStream, LibraryStorage};
pub use memory::InMemoryLibraryStorage;
