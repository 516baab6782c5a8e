//! Cached storage integration tests
//!
//! The decorator's core guarantee: a read whose key is in the invalidation
//! set of an earlier write never returns the pre-write value.

mod common;

use common::cached_storage;
use h5p_registry_core::{LibraryMetadata, LibraryName};
use h5p_registry_storage::{
    CachedLibraryStorage, InMemoryLibraryStorage, LibraryStorage, MokaCache,
};
use std::sync::Arc;

fn metadata(machine_name: &str, patch: u32) -> LibraryMetadata {
    serde_json::from_value(serde_json::json!({
        "title": machine_name,
        "machineName": machine_name,
        "majorVersion": 1,
        "minorVersion": 0,
        "patchVersion": patch,
        "runnable": 1
    }))
    .unwrap()
}

fn name(machine_name: &str) -> LibraryName {
    LibraryName::new(machine_name, 1, 0).unwrap()
}

#[tokio::test]
async fn read_after_metadata_write_sees_new_data() {
    let (storage, _) = cached_storage();
    storage.install_library(metadata("H5P.Test", 1), false).await.unwrap();

    // prime every per-library cache entry
    assert!(storage.is_installed(&name("H5P.Test")).await.unwrap());
    assert_eq!(
        storage.get_library(&name("H5P.Test")).await.unwrap().metadata.patch_version,
        1
    );

    storage.update_library(metadata("H5P.Test", 2)).await.unwrap();
    assert_eq!(
        storage.get_library(&name("H5P.Test")).await.unwrap().metadata.patch_version,
        2
    );

    storage.remove_library(&name("H5P.Test")).await.unwrap();
    assert!(!storage.is_installed(&name("H5P.Test")).await.unwrap());
}

#[tokio::test]
async fn read_after_file_write_sees_new_data() {
    let (storage, _) = cached_storage();
    let library = name("H5P.Test");
    storage.install_library(metadata("H5P.Test", 1), false).await.unwrap();

    storage
        .add_file(&library, "semantics.json", br#"{"v": 1}"#.to_vec())
        .await
        .unwrap();

    // prime the file caches
    assert!(storage.file_exists(&library, "semantics.json").await.unwrap());
    assert_eq!(
        storage.get_file_as_json(&library, "semantics.json").await.unwrap()["v"],
        1
    );
    assert_eq!(
        storage.get_file_as_string(&library, "semantics.json").await.unwrap(),
        r#"{"v": 1}"#
    );

    storage
        .add_file(&library, "semantics.json", br#"{"v": 2}"#.to_vec())
        .await
        .unwrap();

    assert_eq!(
        storage.get_file_as_json(&library, "semantics.json").await.unwrap()["v"],
        2
    );
    assert_eq!(
        storage.get_file_as_string(&library, "semantics.json").await.unwrap(),
        r#"{"v": 2}"#
    );

    storage.clear_files(&library).await.unwrap();
    assert!(!storage.file_exists(&library, "semantics.json").await.unwrap());
}

#[tokio::test]
async fn language_listing_tracks_added_translations() {
    let (storage, _) = cached_storage();
    let library = name("H5P.Test");
    storage.install_library(metadata("H5P.Test", 1), false).await.unwrap();

    assert!(storage.get_language_files(&library).await.unwrap().is_empty());

    storage
        .add_file(&library, "language/nb.json", b"{}".to_vec())
        .await
        .unwrap();
    assert_eq!(
        storage.get_language_files(&library).await.unwrap(),
        vec!["language/nb.json".to_string()]
    );
}

#[tokio::test]
async fn aggregate_listings_track_membership_changes() {
    let (storage, _) = cached_storage();

    assert!(storage.get_installed_library_names(None).await.unwrap().is_empty());
    assert!(storage
        .get_installed_library_names(Some("H5P.Test"))
        .await
        .unwrap()
        .is_empty());

    storage.install_library(metadata("H5P.Test", 1), false).await.unwrap();
    storage.install_library(metadata("H5P.Other", 1), false).await.unwrap();

    assert_eq!(storage.get_installed_library_names(None).await.unwrap().len(), 2);
    assert_eq!(
        storage
            .get_installed_library_names(Some("H5P.Test"))
            .await
            .unwrap(),
        vec![name("H5P.Test")]
    );

    storage.remove_library(&name("H5P.Test")).await.unwrap();
    assert_eq!(storage.get_installed_library_names(None).await.unwrap().len(), 1);
    assert!(storage
        .get_installed_library_names(Some("H5P.Test"))
        .await
        .unwrap()
        .is_empty());
}

#[tokio::test]
async fn addon_listing_invalidated_by_installs() {
    let (storage, _) = cached_storage();
    assert!(storage.has_addon_support());
    assert!(storage.list_addons().await.unwrap().is_empty());

    let mut addon = metadata("H5P.MathDisplay", 1);
    addon.add_to = Some(serde_json::json!({"content": {"types": []}}));
    storage.install_library(addon, false).await.unwrap();

    let addons = storage.list_addons().await.unwrap();
    assert_eq!(addons.len(), 1);
    assert_eq!(addons[0].metadata.machine_name, "H5P.MathDisplay");
}

#[tokio::test]
async fn repeated_reads_hit_the_cache_not_the_backing_store() {
    let (storage, cache) = cached_storage();
    storage.install_library(metadata("H5P.Test", 1), false).await.unwrap();

    storage.get_library(&name("H5P.Test")).await.unwrap();
    let baseline = cache.stats();
    for _ in 0..10 {
        storage.get_library(&name("H5P.Test")).await.unwrap();
    }
    let after = cache.stats();
    assert_eq!(after.misses, baseline.misses);
    assert!(after.hits >= baseline.hits + 10);
}

#[tokio::test]
async fn clear_cache_is_a_full_flush() {
    let backing = Arc::new(InMemoryLibraryStorage::new());
    let cache = Arc::new(MokaCache::with_capacity(1024));
    let storage = CachedLibraryStorage::new(backing.clone(), cache);

    storage.install_library(metadata("H5P.Test", 1), false).await.unwrap();
    storage.get_library(&name("H5P.Test")).await.unwrap();

    // mutate the backing store directly, leaving the cache stale
    backing.update_library(metadata("H5P.Test", 7)).await.unwrap();

    storage.clear_cache().await.unwrap();
    assert_eq!(
        storage.get_library(&name("H5P.Test")).await.unwrap().metadata.patch_version,
        7
    );
}

#[tokio::test]
async fn restricted_flag_change_is_visible_immediately() {
    let (storage, _) = cached_storage();
    storage.install_library(metadata("H5P.Test", 1), false).await.unwrap();
    assert!(!storage.get_library(&name("H5P.Test")).await.unwrap().restricted);

    storage
        .update_additional_metadata(
            &name("H5P.Test"),
            h5p_registry_core::AdditionalMetadata { restricted: true },
        )
        .await
        .unwrap();
    assert!(storage.get_library(&name("H5P.Test")).await.unwrap().restricted);
}
