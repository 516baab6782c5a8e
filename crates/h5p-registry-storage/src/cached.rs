//! Read-through, write-invalidating cache decorator over library storage
//!
//! `CachedLibraryStorage` implements the same [`LibraryStorage`] contract as
//! the backing storage it wraps, so any backend can be decorated uniformly.
//! Reads are served from the cache where possible; every write goes to the
//! backing storage first and then invalidates exactly the keys that write
//! could have made stale.
//!
//! Failure policy: a failing cache read or store degrades to the backing
//! storage (logged, never served wrong), while a failing invalidation is
//! propagated, since swallowing it could let a later read return pre-write
//! data.
//! `clear_cache` remains available as a full-flush escape hatch.

use async_trait::async_trait;
use h5p_registry_core::{
    AdditionalMetadata, InstallationId, InstalledLibrary, LibraryMetadata, LibraryName,
};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;

use crate::cache::{key, KeyValueCache};
use crate::error::{StorageError, StorageResult};
use crate::library_storage::{FileStream, LibraryStorage};

/// Prefix under which translation files are stored
const LANGUAGE_DIR: &str = "language/";

/// Caching decorator around any [`LibraryStorage`] implementation
pub struct CachedLibraryStorage {
    storage: Arc<dyn LibraryStorage>,
    cache: Arc<dyn KeyValueCache>,
    ttl: Option<Duration>,
}

impl CachedLibraryStorage {
    /// Wrap a backing storage with a cache, without entry expiry hints
    pub fn new(storage: Arc<dyn LibraryStorage>, cache: Arc<dyn KeyValueCache>) -> Self {
        Self {
            storage,
            cache,
            ttl: None,
        }
    }

    /// Wrap a backing storage, passing a time-to-live hint on every store
    pub fn with_ttl(
        storage: Arc<dyn LibraryStorage>,
        cache: Arc<dyn KeyValueCache>,
        ttl: Duration,
    ) -> Self {
        Self {
            storage,
            cache,
            ttl: Some(ttl),
        }
    }

    /// The wrapped backing storage
    pub fn backing(&self) -> &Arc<dyn LibraryStorage> {
        &self.storage
    }

    /// Flush the entire cache
    ///
    /// The correctness escape hatch: after a crash between a backing write
    /// and its invalidation, this restores the read-after-write guarantee.
    pub async fn clear_cache(&self) -> StorageResult<()> {
        Ok(self.cache.reset().await?)
    }

    /// Serve a read through the cache, falling back to the backing storage
    /// on miss or cache failure
    async fn cached_read<T, F>(&self, cache_key: String, load: F) -> StorageResult<T>
    where
        T: Serialize + DeserializeOwned,
        F: Future<Output = StorageResult<T>>,
    {
        match self.cache.get(&cache_key).await {
            Ok(Some(value)) => match serde_json::from_value(value) {
                Ok(decoded) => return Ok(decoded),
                Err(error) => {
                    // a poisoned entry never decodes, so it can never be
                    // served; dropping it is best-effort
                    warn!(key = %cache_key, %error, "discarding undecodable cache entry");
                    if let Err(error) = self.cache.delete(&cache_key).await {
                        warn!(key = %cache_key, %error, "failed to drop cache entry");
                    }
                }
            },
            Ok(None) => {}
            Err(error) => {
                warn!(key = %cache_key, %error, "cache read failed, falling back to storage");
            }
        }

        let fresh = load.await?;

        match serde_json::to_value(&fresh) {
            Ok(value) => {
                if let Err(error) = self.cache.set(&cache_key, value, self.ttl).await {
                    warn!(key = %cache_key, %error, "failed to populate cache");
                }
            }
            Err(error) => {
                warn!(key = %cache_key, %error, "value not cacheable");
            }
        }
        Ok(fresh)
    }

    /// Delete a set of keys, propagating the first failure
    async fn invalidate<I>(&self, keys: I) -> StorageResult<()>
    where
        I: IntoIterator<Item = String>,
    {
        for cache_key in keys {
            self.cache.delete(&cache_key).await?;
        }
        Ok(())
    }

    /// Keys covering one library's cached records and listings
    fn library_keys(library: &LibraryName) -> Vec<String> {
        vec![
            key::library(library, key::ops::METADATA),
            key::library(library, key::ops::INSTALLED),
            key::library(library, key::ops::FILE_LIST),
            key::library(library, key::ops::LANGUAGES),
        ]
    }

    /// Keys covering one cached file of a library
    fn file_keys(library: &LibraryName, filename: &str) -> Vec<String> {
        vec![
            key::file(library, key::ops::FILE_EXISTS, filename),
            key::file(library, key::ops::FILE_JSON, filename),
            key::file(library, key::ops::FILE_STRING, filename),
        ]
    }

    /// Keys whose membership can change when `machine_name` libraries are
    /// installed, updated, or removed
    fn aggregate_keys(machine_name: &str) -> Vec<String> {
        vec![
            key::aggregate(key::ops::NAMES, None),
            key::aggregate(key::ops::NAMES, Some(machine_name)),
            key::aggregate(key::ops::ADDONS, None),
        ]
    }

    /// Invalidate everything cached about the files of a library
    ///
    /// `filenames` must be enumerated from the backing storage *before* the
    /// write that destroys them, or per-file keys would be unreachable.
    async fn invalidate_files(
        &self,
        library: &LibraryName,
        filenames: &[String],
    ) -> StorageResult<()> {
        for filename in filenames {
            self.invalidate(Self::file_keys(library, filename)).await?;
        }
        self.invalidate([
            key::library(library, key::ops::FILE_LIST),
            key::library(library, key::ops::LANGUAGES),
        ])
        .await
    }
}

#[async_trait]
impl LibraryStorage for CachedLibraryStorage {
    async fn get_id(&self, library: &LibraryName) -> StorageResult<Option<InstallationId>> {
        // ids are immutable once assigned but cheap to look up; not cached
        self.storage.get_id(library).await
    }

    async fn is_installed(&self, library: &LibraryName) -> StorageResult<bool> {
        self.cached_read(
            key::library(library, key::ops::INSTALLED),
            self.storage.is_installed(library),
        )
        .await
    }

    async fn get_library(&self, library: &LibraryName) -> StorageResult<InstalledLibrary> {
        self.cached_read(
            key::library(library, key::ops::METADATA),
            self.storage.get_library(library),
        )
        .await
    }

    async fn install_library(
        &self,
        metadata: LibraryMetadata,
        restricted: bool,
    ) -> StorageResult<InstalledLibrary> {
        let name = metadata.name();
        let installed = self.storage.install_library(metadata, restricted).await?;
        self.invalidate(Self::library_keys(&name)).await?;
        self.invalidate(Self::aggregate_keys(&name.machine_name))
            .await?;
        Ok(installed)
    }

    async fn update_library(&self, metadata: LibraryMetadata) -> StorageResult<InstalledLibrary> {
        let name = metadata.name();
        let updated = self.storage.update_library(metadata).await?;
        self.invalidate(Self::library_keys(&name)).await?;
        self.invalidate(Self::aggregate_keys(&name.machine_name))
            .await?;
        Ok(updated)
    }

    async fn update_additional_metadata(
        &self,
        library: &LibraryName,
        additional: AdditionalMetadata,
    ) -> StorageResult<InstalledLibrary> {
        let updated = self
            .storage
            .update_additional_metadata(library, additional)
            .await?;
        self.invalidate([key::library(library, key::ops::METADATA)])
            .await?;
        Ok(updated)
    }

    async fn remove_library(&self, library: &LibraryName) -> StorageResult<()> {
        let filenames = self.storage.list_files(library).await?;
        self.storage.remove_library(library).await?;
        self.invalidate_files(library, &filenames).await?;
        self.invalidate(Self::library_keys(library)).await?;
        self.invalidate(Self::aggregate_keys(&library.machine_name))
            .await
    }

    async fn add_file(
        &self,
        library: &LibraryName,
        filename: &str,
        contents: Vec<u8>,
    ) -> StorageResult<()> {
        self.storage.add_file(library, filename, contents).await?;
        self.invalidate(Self::file_keys(library, filename)).await?;
        let mut listing_keys = vec![key::library(library, key::ops::FILE_LIST)];
        if filename.starts_with(LANGUAGE_DIR) {
            listing_keys.push(key::library(library, key::ops::LANGUAGES));
        }
        self.invalidate(listing_keys).await
    }

    async fn clear_files(&self, library: &LibraryName) -> StorageResult<()> {
        let filenames = self.storage.list_files(library).await?;
        self.storage.clear_files(library).await?;
        self.invalidate_files(library, &filenames).await
    }

    async fn list_files(&self, library: &LibraryName) -> StorageResult<Vec<String>> {
        self.cached_read(
            key::library(library, key::ops::FILE_LIST),
            self.storage.list_files(library),
        )
        .await
    }

    async fn file_exists(&self, library: &LibraryName, filename: &str) -> StorageResult<bool> {
        self.cached_read(
            key::file(library, key::ops::FILE_EXISTS, filename),
            self.storage.file_exists(library, filename),
        )
        .await
    }

    async fn get_file_stream(
        &self,
        library: &LibraryName,
        filename: &str,
    ) -> StorageResult<FileStream> {
        // streams cannot be cached as values; always hit the backing storage
        self.storage.get_file_stream(library, filename).await
    }

    async fn get_file_as_json(
        &self,
        library: &LibraryName,
        filename: &str,
    ) -> StorageResult<serde_json::Value> {
        self.cached_read(
            key::file(library, key::ops::FILE_JSON, filename),
            self.storage.get_file_as_json(library, filename),
        )
        .await
    }

    async fn get_file_as_string(
        &self,
        library: &LibraryName,
        filename: &str,
    ) -> StorageResult<String> {
        self.cached_read(
            key::file(library, key::ops::FILE_STRING, filename),
            self.storage.get_file_as_string(library, filename),
        )
        .await
    }

    async fn get_language_files(&self, library: &LibraryName) -> StorageResult<Vec<String>> {
        self.cached_read(
            key::library(library, key::ops::LANGUAGES),
            self.storage.get_language_files(library),
        )
        .await
    }

    async fn get_installed_library_names(
        &self,
        machine_name: Option<&str>,
    ) -> StorageResult<Vec<LibraryName>> {
        self.cached_read(
            key::aggregate(key::ops::NAMES, machine_name),
            self.storage.get_installed_library_names(machine_name),
        )
        .await
    }

    async fn get_dependents_count(&self, library: &LibraryName) -> StorageResult<usize> {
        self.storage.get_dependents_count(library).await
    }

    async fn get_all_dependents_count(&self) -> StorageResult<HashMap<String, usize>> {
        self.storage.get_all_dependents_count().await
    }

    fn has_addon_support(&self) -> bool {
        self.storage.has_addon_support()
    }

    async fn list_addons(&self) -> StorageResult<Vec<InstalledLibrary>> {
        self.cached_read(
            key::aggregate(key::ops::ADDONS, None),
            self.storage.list_addons(),
        )
        .await
    }
}
