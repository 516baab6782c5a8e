//! The library storage contract
//!
//! This trait abstracts library persistence so different backends
//! (filesystem, object storage, document database, in-memory) can be used
//! interchangeably, and so the caching decorator can wrap any of them by
//! composition.

use async_trait::async_trait;
use h5p_registry_core::{
    AdditionalMetadata, InstallationId, InstalledLibrary, LibraryMetadata, LibraryName,
};
use std::collections::HashMap;
use tokio::io::AsyncRead;

use crate::error::{StorageError, StorageResult};

/// Boxed async reader over a stored file's contents
pub type FileStream = Box<dyn AsyncRead + Send + Unpin>;

/// Persistence contract for installed libraries and their files
///
/// All methods are fallible; backend failures propagate as [`StorageError`]
/// and are not interpreted by callers.
///
/// # Concurrency
///
/// Implementations must tolerate concurrent calls for *different* library
/// identities. Calls targeting the *same* identity during install or update
/// must be serialized by the caller; the contract makes no atomicity
/// guarantee across the reserve/copy/verify sequence.
#[async_trait]
pub trait LibraryStorage: Send + Sync {
    /// Look up the storage-assigned id for a library, if installed
    async fn get_id(&self, library: &LibraryName) -> StorageResult<Option<InstallationId>>;

    /// Check whether a library is installed
    async fn is_installed(&self, library: &LibraryName) -> StorageResult<bool>;

    /// Fetch the full installed-library record
    ///
    /// Returns [`StorageError::LibraryNotFound`] if the identity is absent.
    async fn get_library(&self, library: &LibraryName) -> StorageResult<InstalledLibrary>;

    /// Reserve a new library identity with its metadata
    ///
    /// Returns [`StorageError::AlreadyInstalled`] if the identity exists.
    async fn install_library(
        &self,
        metadata: LibraryMetadata,
        restricted: bool,
    ) -> StorageResult<InstalledLibrary>;

    /// Replace the metadata of an installed library in place
    ///
    /// The id, restricted flag, and install timestamp are preserved.
    async fn update_library(&self, metadata: LibraryMetadata) -> StorageResult<InstalledLibrary>;

    /// Update the install-time metadata of an installed library
    async fn update_additional_metadata(
        &self,
        library: &LibraryName,
        additional: AdditionalMetadata,
    ) -> StorageResult<InstalledLibrary>;

    /// Remove a library and all of its files
    async fn remove_library(&self, library: &LibraryName) -> StorageResult<()>;

    /// Store one file under a library
    async fn add_file(
        &self,
        library: &LibraryName,
        filename: &str,
        contents: Vec<u8>,
    ) -> StorageResult<()>;

    /// Remove every stored file of a library, keeping the library itself
    async fn clear_files(&self, library: &LibraryName) -> StorageResult<()>;

    /// List the stored files of a library, in stable order
    async fn list_files(&self, library: &LibraryName) -> StorageResult<Vec<String>>;

    /// Check whether a specific file of a library exists
    async fn file_exists(&self, library: &LibraryName, filename: &str) -> StorageResult<bool>;

    /// Open a stored file for streaming reads
    async fn get_file_stream(
        &self,
        library: &LibraryName,
        filename: &str,
    ) -> StorageResult<FileStream>;

    /// Read a stored file and parse it as JSON
    async fn get_file_as_json(
        &self,
        library: &LibraryName,
        filename: &str,
    ) -> StorageResult<serde_json::Value>;

    /// Read a stored file as a UTF-8 string
    async fn get_file_as_string(
        &self,
        library: &LibraryName,
        filename: &str,
    ) -> StorageResult<String>;

    /// List the translation files stored under `language/`
    async fn get_language_files(&self, library: &LibraryName) -> StorageResult<Vec<String>>;

    /// List installed library identities, optionally restricted to one
    /// machine name
    async fn get_installed_library_names(
        &self,
        machine_name: Option<&str>,
    ) -> StorageResult<Vec<LibraryName>>;

    /// Count the installed libraries that declare a dependency on `library`
    async fn get_dependents_count(&self, library: &LibraryName) -> StorageResult<usize>;

    /// Dependent counts for every installed library, keyed by directory name
    async fn get_all_dependents_count(&self) -> StorageResult<HashMap<String, usize>>;

    /// Whether this backend supports addon listing
    ///
    /// Callers check this once instead of probing [`list_addons`]
    /// per call.
    ///
    /// [`list_addons`]: Self::list_addons
    fn has_addon_support(&self) -> bool {
        false
    }

    /// List installed addon libraries
    ///
    /// Only meaningful when [`has_addon_support`](Self::has_addon_support)
    /// returns `true`.
    async fn list_addons(&self) -> StorageResult<Vec<InstalledLibrary>> {
        Err(StorageError::Unsupported("list_addons"))
    }
}
