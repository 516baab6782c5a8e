//! In-memory reference implementation of the storage contract
//!
//! Backed by tokio `RwLock`ed maps. Used throughout the test suites and
//! suitable for embedders that do not need persistence.

use async_trait::async_trait;
use h5p_registry_core::{
    AdditionalMetadata, InstallationId, InstalledLibrary, LibraryMetadata, LibraryName,
};
use std::collections::{BTreeMap, HashMap};
use std::io::Cursor;
use tokio::sync::RwLock;

use crate::error::{StorageError, StorageResult};
use crate::library_storage::{FileStream, LibraryStorage};

/// Prefix under which translation files are stored
const LANGUAGE_DIR: &str = "language/";

struct StoredLibrary {
    installed: InstalledLibrary,
    files: BTreeMap<String, Vec<u8>>,
}

/// Map-backed [`LibraryStorage`] implementation
#[derive(Default)]
pub struct InMemoryLibraryStorage {
    libraries: RwLock<HashMap<LibraryName, StoredLibrary>>,
}

impl InMemoryLibraryStorage {
    /// Create an empty storage
    pub fn new() -> Self {
        Self::default()
    }

    fn check_filename(filename: &str) -> StorageResult<()> {
        if filename.is_empty()
            || filename.starts_with('/')
            || filename.split('/').any(|part| part == "..")
        {
            return Err(StorageError::InvalidPath(filename.to_string()));
        }
        Ok(())
    }

    async fn read_file(&self, library: &LibraryName, filename: &str) -> StorageResult<Vec<u8>> {
        let libraries = self.libraries.read().await;
        let stored = libraries
            .get(library)
            .ok_or_else(|| StorageError::LibraryNotFound(library.to_string()))?;
        stored
            .files
            .get(filename)
            .cloned()
            .ok_or_else(|| StorageError::FileNotFound {
                library: library.to_string(),
                file: filename.to_string(),
            })
    }

    fn count_dependents(
        libraries: &HashMap<LibraryName, StoredLibrary>,
        target: &LibraryName,
    ) -> usize {
        libraries
            .values()
            .filter(|stored| {
                let meta = &stored.installed.metadata;
                meta.preloaded_dependencies.contains(target)
                    || meta.dynamic_dependencies.contains(target)
                    || meta.editor_dependencies.contains(target)
            })
            .count()
    }
}

#[async_trait]
impl LibraryStorage for InMemoryLibraryStorage {
    async fn get_id(&self, library: &LibraryName) -> StorageResult<Option<InstallationId>> {
        let libraries = self.libraries.read().await;
        Ok(libraries.get(library).map(|stored| stored.installed.id))
    }

    async fn is_installed(&self, library: &LibraryName) -> StorageResult<bool> {
        let libraries = self.libraries.read().await;
        Ok(libraries.contains_key(library))
    }

    async fn get_library(&self, library: &LibraryName) -> StorageResult<InstalledLibrary> {
        let libraries = self.libraries.read().await;
        libraries
            .get(library)
            .map(|stored| stored.installed.clone())
            .ok_or_else(|| StorageError::LibraryNotFound(library.to_string()))
    }

    async fn install_library(
        &self,
        metadata: LibraryMetadata,
        restricted: bool,
    ) -> StorageResult<InstalledLibrary> {
        let name = metadata.name();
        let mut libraries = self.libraries.write().await;
        if libraries.contains_key(&name) {
            return Err(StorageError::AlreadyInstalled(name.to_string()));
        }
        let installed = InstalledLibrary::new(InstallationId::new(), metadata, restricted);
        libraries.insert(
            name,
            StoredLibrary {
                installed: installed.clone(),
                files: BTreeMap::new(),
            },
        );
        Ok(installed)
    }

    async fn update_library(&self, metadata: LibraryMetadata) -> StorageResult<InstalledLibrary> {
        let name = metadata.name();
        let mut libraries = self.libraries.write().await;
        let stored = libraries
            .get_mut(&name)
            .ok_or_else(|| StorageError::LibraryNotFound(name.to_string()))?;
        stored.installed.metadata = metadata;
        stored.installed.updated_at = chrono::Utc::now();
        Ok(stored.installed.clone())
    }

    async fn update_additional_metadata(
        &self,
        library: &LibraryName,
        additional: AdditionalMetadata,
    ) -> StorageResult<InstalledLibrary> {
        let mut libraries = self.libraries.write().await;
        let stored = libraries
            .get_mut(library)
            .ok_or_else(|| StorageError::LibraryNotFound(library.to_string()))?;
        stored.installed.restricted = additional.restricted;
        stored.installed.updated_at = chrono::Utc::now();
        Ok(stored.installed.clone())
    }

    async fn remove_library(&self, library: &LibraryName) -> StorageResult<()> {
        let mut libraries = self.libraries.write().await;
        libraries
            .remove(library)
            .map(|_| ())
            .ok_or_else(|| StorageError::LibraryNotFound(library.to_string()))
    }

    async fn add_file(
        &self,
        library: &LibraryName,
        filename: &str,
        contents: Vec<u8>,
    ) -> StorageResult<()> {
        Self::check_filename(filename)?;
        let mut libraries = self.libraries.write().await;
        let stored = libraries
            .get_mut(library)
            .ok_or_else(|| StorageError::LibraryNotFound(library.to_string()))?;
        stored.files.insert(filename.to_string(), contents);
        Ok(())
    }

    async fn clear_files(&self, library: &LibraryName) -> StorageResult<()> {
        let mut libraries = self.libraries.write().await;
        let stored = libraries
            .get_mut(library)
            .ok_or_else(|| StorageError::LibraryNotFound(library.to_string()))?;
        stored.files.clear();
        Ok(())
    }

    async fn list_files(&self, library: &LibraryName) -> StorageResult<Vec<String>> {
        let libraries = self.libraries.read().await;
        let stored = libraries
            .get(library)
            .ok_or_else(|| StorageError::LibraryNotFound(library.to_string()))?;
        Ok(stored.files.keys().cloned().collect())
    }

    async fn file_exists(&self, library: &LibraryName, filename: &str) -> StorageResult<bool> {
        let libraries = self.libraries.read().await;
        let stored = libraries
            .get(library)
            .ok_or_else(|| StorageError::LibraryNotFound(library.to_string()))?;
        Ok(stored.files.contains_key(filename))
    }

    async fn get_file_stream(
        &self,
        library: &LibraryName,
        filename: &str,
    ) -> StorageResult<FileStream> {
        let contents = self.read_file(library, filename).await?;
        Ok(Box::new(Cursor::new(contents)))
    }

    async fn get_file_as_json(
        &self,
        library: &LibraryName,
        filename: &str,
    ) -> StorageResult<serde_json::Value> {
        let contents = self.read_file(library, filename).await?;
        Ok(serde_json::from_slice(&contents)?)
    }

    async fn get_file_as_string(
        &self,
        library: &LibraryName,
        filename: &str,
    ) -> StorageResult<String> {
        let contents = self.read_file(library, filename).await?;
        String::from_utf8(contents)
            .map_err(|e| StorageError::Serialization(format!("not valid UTF-8: {}", e)))
    }

    async fn get_language_files(&self, library: &LibraryName) -> StorageResult<Vec<String>> {
        let libraries = self.libraries.read().await;
        let stored = libraries
            .get(library)
            .ok_or_else(|| StorageError::LibraryNotFound(library.to_string()))?;
        Ok(stored
            .files
            .keys()
            .filter(|name| name.starts_with(LANGUAGE_DIR))
            .cloned()
            .collect())
    }

    async fn get_installed_library_names(
        &self,
        machine_name: Option<&str>,
    ) -> StorageResult<Vec<LibraryName>> {
        let libraries = self.libraries.read().await;
        let mut names: Vec<LibraryName> = libraries
            .keys()
            .filter(|name| machine_name.map_or(true, |m| name.machine_name == m))
            .cloned()
            .collect();
        names.sort_by(|a, b| a.to_string().cmp(&b.to_string()));
        Ok(names)
    }

    async fn get_dependents_count(&self, library: &LibraryName) -> StorageResult<usize> {
        let libraries = self.libraries.read().await;
        Ok(Self::count_dependents(&libraries, library))
    }

    async fn get_all_dependents_count(&self) -> StorageResult<HashMap<String, usize>> {
        let libraries = self.libraries.read().await;
        Ok(libraries
            .keys()
            .map(|name| {
                (
                    name.directory_name(),
                    Self::count_dependents(&libraries, name),
                )
            })
            .collect())
    }

    fn has_addon_support(&self) -> bool {
        true
    }

    async fn list_addons(&self) -> StorageResult<Vec<InstalledLibrary>> {
        let libraries = self.libraries.read().await;
        let mut addons: Vec<InstalledLibrary> = libraries
            .values()
            .filter(|stored| stored.installed.is_addon())
            .map(|stored| stored.installed.clone())
            .collect();
        addons.sort_by_key(|addon| addon.name().to_string());
        Ok(addons)
    }
}
