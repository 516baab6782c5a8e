//! Library lifecycle orchestration
//!
//! Installs, updates, and removes libraries against the storage contract,
//! with a consistency check after every copy and rollback to a clean state
//! on any failure. Per identity the states are: not installed → installing →
//! installed, and installed → updating → installed; a failure inside
//! installing/updating rolls the identity back to not installed. Readers
//! never observe a partially installed library.
//!
//! # Concurrency
//!
//! Operations on different identities may run concurrently without
//! coordination. Concurrent installs or updates of the *same* identity can
//! interleave the reserve/copy/verify steps and corrupt storage; callers
//! must serialize them (e.g. with a mutex keyed by the identity's canonical
//! string).

use async_trait::async_trait;
use h5p_registry_core::{
    AdditionalMetadata, InstalledLibrary, LibraryMetadata, LibraryName, LIBRARY_DESCRIPTOR_FILE,
};
use h5p_registry_storage::{LibraryStorage, StorageError};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

use crate::error::{ServiceError, ServiceResult};
use crate::resolver::MetadataSource;
use crate::validator::InstalledLibraryIndex;

/// What an install call actually did
#[derive(Debug, Clone)]
pub enum InstallOutcome {
    /// A new identity was installed
    Installed(InstalledLibrary),
    /// An existing identity was patched in place
    Updated(InstalledLibrary),
    /// The installed version is already current or newer; storage untouched
    NoOp,
}

impl InstallOutcome {
    /// Whether storage was modified
    pub fn changed(&self) -> bool {
        !matches!(self, InstallOutcome::NoOp)
    }
}

/// Orchestrates library installs, updates, and removals
pub struct LibraryManager {
    storage: Arc<dyn LibraryStorage>,
}

impl LibraryManager {
    /// Create a manager over a storage implementation
    pub fn new(storage: Arc<dyn LibraryStorage>) -> Self {
        Self { storage }
    }

    /// The underlying storage
    pub fn storage(&self) -> &Arc<dyn LibraryStorage> {
        &self.storage
    }

    /// Install or update a library from an unpacked directory
    ///
    /// The directory must contain a `library.json` descriptor next to the
    /// asset files it references. If the identity is already installed, a
    /// strictly greater patch version (at equal major/minor) takes the
    /// update path and anything else is a no-op; a different major/minor is
    /// simply a different identity and installs alongside.
    #[instrument(skip(self), fields(directory = %directory.display()))]
    pub async fn install_from_directory(
        &self,
        directory: &Path,
        restricted: bool,
    ) -> ServiceResult<InstallOutcome> {
        let metadata = read_descriptor(directory).await?;
        metadata.validate().map_err(ServiceError::from)?;
        let name = metadata.name();

        match self.installed_library(&name).await? {
            None => {
                let installed = self.fresh_install(&name, directory, metadata, restricted).await?;
                Ok(InstallOutcome::Installed(installed))
            }
            Some(existing) => {
                if metadata.is_patch_upgrade_of(&existing.metadata) {
                    let updated = self.patch_update(&name, directory, metadata).await?;
                    Ok(InstallOutcome::Updated(updated))
                } else {
                    debug!(
                        library = %name,
                        installed_patch = existing.metadata.patch_version,
                        candidate_patch = metadata.patch_version,
                        "already current or newer; nothing to do"
                    );
                    Ok(InstallOutcome::NoOp)
                }
            }
        }
    }

    /// Remove an installed library
    ///
    /// Refuses when other installed libraries still depend on it.
    #[instrument(skip(self), fields(library = %library))]
    pub async fn remove_library(&self, library: &LibraryName) -> ServiceResult<()> {
        let dependents = self.storage.get_dependents_count(library).await?;
        if dependents > 0 {
            return Err(ServiceError::HasDependents {
                library: library.to_string(),
                count: dependents,
            });
        }
        self.storage.remove_library(library).await?;
        info!(library = %library, "library removed");
        Ok(())
    }

    /// Flip the install-time permission gate of a library
    pub async fn set_restricted(
        &self,
        library: &LibraryName,
        restricted: bool,
    ) -> ServiceResult<InstalledLibrary> {
        Ok(self
            .storage
            .update_additional_metadata(library, AdditionalMetadata { restricted })
            .await?)
    }

    /// Fetch an installed library
    pub async fn get_library(&self, library: &LibraryName) -> ServiceResult<InstalledLibrary> {
        Ok(self.storage.get_library(library).await?)
    }

    /// Check whether a library is installed
    pub async fn is_installed(&self, library: &LibraryName) -> ServiceResult<bool> {
        Ok(self.storage.is_installed(library).await?)
    }

    /// List installed identities, optionally for one machine name
    pub async fn list_installed(
        &self,
        machine_name: Option<&str>,
    ) -> ServiceResult<Vec<LibraryName>> {
        Ok(self
            .storage
            .get_installed_library_names(machine_name)
            .await?)
    }

    /// Verify that every file the library's metadata references exists in
    /// storage, reporting every missing file
    pub async fn check_consistency(
        &self,
        library: &LibraryName,
        metadata: &LibraryMetadata,
    ) -> ServiceResult<()> {
        let mut missing = Vec::new();
        for reference in metadata.required_files() {
            if !self.storage.file_exists(library, &reference.path).await? {
                missing.push(reference.path.clone());
            }
        }
        if missing.is_empty() {
            Ok(())
        } else {
            Err(ServiceError::Consistency {
                library: library.to_string(),
                missing,
            })
        }
    }

    async fn installed_library(
        &self,
        library: &LibraryName,
    ) -> ServiceResult<Option<InstalledLibrary>> {
        match self.storage.get_library(library).await {
            Ok(installed) => Ok(Some(installed)),
            Err(StorageError::LibraryNotFound(_)) => Ok(None),
            Err(error) => Err(error.into()),
        }
    }

    /// Reserve → populate → verify; on any failure remove the identity
    /// entirely so storage never exposes a half-installed library
    async fn fresh_install(
        &self,
        name: &LibraryName,
        directory: &Path,
        metadata: LibraryMetadata,
        restricted: bool,
    ) -> ServiceResult<InstalledLibrary> {
        let installed = self
            .storage
            .install_library(metadata.clone(), restricted)
            .await?;

        if let Err(error) = self.populate(name, directory, &metadata).await {
            self.rollback(name).await;
            return Err(error);
        }

        info!(library = %name, patch = metadata.patch_version, "library installed");
        Ok(installed)
    }

    /// Persist the new metadata, replace the files, verify; on any failure
    /// remove the identity entirely (including the previously working
    /// version) and propagate
    async fn patch_update(
        &self,
        name: &LibraryName,
        directory: &Path,
        metadata: LibraryMetadata,
    ) -> ServiceResult<InstalledLibrary> {
        let updated = match self.storage.update_library(metadata.clone()).await {
            Ok(updated) => updated,
            Err(error) => {
                self.rollback(name).await;
                return Err(error.into());
            }
        };

        let replace = async {
            self.storage.clear_files(name).await?;
            self.populate(name, directory, &metadata).await
        };
        if let Err(error) = replace.await {
            self.rollback(name).await;
            return Err(error);
        }

        info!(library = %name, patch = metadata.patch_version, "library updated");
        Ok(updated)
    }

    /// Copy every file except the descriptor, then run the consistency check
    async fn populate(
        &self,
        name: &LibraryName,
        directory: &Path,
        metadata: &LibraryMetadata,
    ) -> ServiceResult<()> {
        self.copy_directory(name, directory).await?;
        self.check_consistency(name, metadata).await
    }

    async fn copy_directory(&self, name: &LibraryName, directory: &Path) -> ServiceResult<()> {
        let mut pending: Vec<(PathBuf, String)> = vec![(directory.to_path_buf(), String::new())];
        while let Some((current, prefix)) = pending.pop() {
            let mut entries = tokio::fs::read_dir(&current).await?;
            while let Some(entry) = entries.next_entry().await? {
                let file_name = entry.file_name().to_string_lossy().into_owned();
                let relative = if prefix.is_empty() {
                    file_name
                } else {
                    format!("{}/{}", prefix, file_name)
                };
                if entry.file_type().await?.is_dir() {
                    pending.push((entry.path(), relative));
                } else {
                    if relative == LIBRARY_DESCRIPTOR_FILE {
                        // the descriptor lives in the metadata record, not
                        // in the file store
                        continue;
                    }
                    let contents = tokio::fs::read(entry.path()).await?;
                    self.storage.add_file(name, &relative, contents).await?;
                }
            }
        }
        Ok(())
    }

    /// Idempotent undo: removing an identity that is already gone is fine
    async fn rollback(&self, name: &LibraryName) {
        match self.storage.remove_library(name).await {
            Ok(()) => warn!(library = %name, "rolled back to not-installed"),
            Err(StorageError::LibraryNotFound(_)) => {}
            Err(error) => {
                warn!(library = %name, %error, "rollback failed; storage may need repair")
            }
        }
    }
}

#[async_trait]
impl MetadataSource for LibraryManager {
    async fn library_metadata(
        &self,
        library: &LibraryName,
    ) -> ServiceResult<Option<LibraryMetadata>> {
        Ok(self
            .installed_library(library)
            .await?
            .map(|installed| installed.metadata))
    }
}

#[async_trait]
impl InstalledLibraryIndex for LibraryManager {
    async fn is_installed(&self, library: &LibraryName) -> ServiceResult<bool> {
        Ok(self.storage.is_installed(library).await?)
    }
}

async fn read_descriptor(directory: &Path) -> ServiceResult<LibraryMetadata> {
    let path = directory.join(LIBRARY_DESCRIPTOR_FILE);
    let bytes = tokio::fs::read(&path)
        .await
        .map_err(|error| ServiceError::InvalidDescriptor {
            path: path.display().to_string(),
            message: error.to_string(),
        })?;
    Ok(LibraryMetadata::from_json(&bytes)?)
}
