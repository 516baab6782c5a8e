//! Common test utilities and helpers
//!
//! Shared setup for the integration suites: in-memory and cached storage
//! stacks, on-disk library directories, and real zip archives.

#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::Arc;

use h5p_registry_service::LibraryManager;
use h5p_registry_storage::{CachedLibraryStorage, InMemoryLibraryStorage, MokaCache};

pub mod fixtures;

/// A plain in-memory storage
pub fn memory_storage() -> Arc<InMemoryLibraryStorage> {
    Arc::new(InMemoryLibraryStorage::new())
}

/// An in-memory storage wrapped by the caching decorator, with the cache
/// handle exposed for assertions
pub fn cached_storage() -> (Arc<CachedLibraryStorage>, Arc<MokaCache>) {
    let cache = Arc::new(MokaCache::with_capacity(16_384));
    let storage = Arc::new(CachedLibraryStorage::new(memory_storage(), cache.clone()));
    (storage, cache)
}

/// A library manager over a fresh in-memory storage
pub fn manager() -> (Arc<LibraryManager>, Arc<InMemoryLibraryStorage>) {
    let storage = memory_storage();
    (Arc::new(LibraryManager::new(storage.clone())), storage)
}

/// Write an unpacked library directory: a descriptor plus asset files
pub async fn write_library_dir(
    root: &Path,
    dir_name: &str,
    descriptor: &serde_json::Value,
    files: &[(&str, &[u8])],
) -> PathBuf {
    let dir = root.join(dir_name);
    tokio::fs::create_dir_all(&dir).await.unwrap();
    tokio::fs::write(
        dir.join("library.json"),
        serde_json::to_vec_pretty(descriptor).unwrap(),
    )
    .await
    .unwrap();
    for (name, contents) in files {
        let path = dir.join(name);
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await.unwrap();
        }
        tokio::fs::write(path, contents).await.unwrap();
    }
    dir
}

/// Build a zip archive at `root/name` from (entry path, contents) pairs
pub fn build_archive(root: &Path, name: &str, entries: &[(&str, &[u8])]) -> PathBuf {
    use std::io::Write;

    let path = root.join(name);
    let file = std::fs::File::create(&path).unwrap();
    let mut writer = zip::ZipWriter::new(file);
    for (entry_name, contents) in entries {
        writer
            .start_file(
                entry_name.to_string(),
                zip::write::SimpleFileOptions::default(),
            )
            .unwrap();
        writer.write_all(contents).unwrap();
    }
    writer.finish().unwrap();
    path
}
