//! Package validation integration tests
//!
//! Validates real zip archives end to end, including the interaction with
//! already-installed libraries through the manager.

mod common;

use common::fixtures::{library_descriptor, package_manifest, to_bytes};
use common::{build_archive, manager, write_library_dir};
use h5p_registry_core::IssueKind;
use h5p_registry_service::{
    NoInstalledLibraries, PackageValidator, ServiceError, ValidationOptions,
};
use std::sync::Arc;
use tempfile::TempDir;

#[tokio::test]
async fn complete_package_is_accepted() {
    let tmp = TempDir::new().unwrap();
    let manifest = package_manifest("H5P.GreetingCard", &[("H5P.GreetingCard", 1, 0)]);
    let library = library_descriptor("H5P.GreetingCard", (1, 0, 6), &["greetingcard.js"], &[]);
    let archive = build_archive(
        tmp.path(),
        "greeting-card.h5p",
        &[
            ("h5p.json", &to_bytes(&manifest)),
            ("content/content.json", br#"{"greeting": "Hello world"}"#),
            ("content/images/earth.png", b"\x89PNG"),
            ("H5P.GreetingCard-1.0/library.json", &to_bytes(&library)),
            ("H5P.GreetingCard-1.0/greetingcard.js", b"var H5P = H5P || {};"),
            ("H5P.GreetingCard-1.0/semantics.json", b"[]"),
            ("H5P.GreetingCard-1.0/language/en.json", b"{}"),
        ],
    );

    let validator = PackageValidator::with_defaults(Arc::new(NoInstalledLibraries));
    validator
        .validate(&archive, ValidationOptions::default())
        .await
        .unwrap();
}

#[tokio::test]
async fn zip_slip_entry_is_rejected_structurally() {
    let tmp = TempDir::new().unwrap();
    let manifest = package_manifest("H5P.GreetingCard", &[("H5P.GreetingCard", 1, 0)]);
    let archive = build_archive(
        tmp.path(),
        "evil.h5p",
        &[
            ("h5p.json", &to_bytes(&manifest)),
            ("../../evil.sh", b"#!/bin/sh\nrm -rf /\n"),
        ],
    );

    let validator = PackageValidator::with_defaults(Arc::new(NoInstalledLibraries));
    let err = validator
        .validate(&archive, ValidationOptions::default())
        .await
        .unwrap_err();

    // structural, and never aggregated into an issue list
    match err {
        ServiceError::Structural { path, .. } => assert!(path.contains("evil.sh")),
        other => panic!("expected structural error, got {other}"),
    }
}

#[tokio::test]
async fn all_problems_are_reported_together() {
    let tmp = TempDir::new().unwrap();
    // bad license, a disallowed content file, a library missing its
    // descriptor, and another library missing a referenced asset
    let mut manifest = package_manifest("H5P.Broken", &[("H5P.Broken", 1, 0)]);
    manifest["license"] = serde_json::json!("Proprietary");
    let broken = library_descriptor("H5P.Broken", (1, 0, 0), &["js/app.js"], &[]);

    let archive = build_archive(
        tmp.path(),
        "broken.h5p",
        &[
            ("h5p.json", &to_bytes(&manifest)),
            ("content/malware.exe", b"MZ"),
            ("H5P.Broken-1.0/library.json", &to_bytes(&broken)),
            ("H5P.NoDescriptor-1.0/js/code.js", b""),
        ],
    );

    let validator = PackageValidator::with_defaults(Arc::new(NoInstalledLibraries));
    let err = validator
        .validate(&archive, ValidationOptions::default())
        .await
        .unwrap_err();
    let issues = err.issues().expect("expected an aggregated rejection");

    let kinds: Vec<IssueKind> = issues.iter().map(|issue| issue.kind).collect();
    assert!(kinds.contains(&IssueKind::DisallowedLicense));
    assert!(kinds.contains(&IssueKind::DisallowedExtension));
    assert!(kinds.contains(&IssueKind::MissingDescriptor));
    assert!(kinds.contains(&IssueKind::MissingAssetFile));
    assert!(issues.len() >= 4);
}

#[tokio::test]
async fn dependencies_resolve_against_installed_libraries() {
    let tmp = TempDir::new().unwrap();
    let (manager, _storage) = manager();

    // H5P.Base-1.2 is already installed
    let base_dir = write_library_dir(
        tmp.path(),
        "base",
        &library_descriptor("H5P.Base", (1, 2, 0), &[], &[]),
        &[],
    )
    .await;
    manager.install_from_directory(&base_dir, false).await.unwrap();

    // the uploaded package only carries the card, which depends on the base
    let manifest = package_manifest("H5P.Card", &[("H5P.Card", 1, 0)]);
    let card = library_descriptor("H5P.Card", (1, 0, 0), &[], &[("H5P.Base", 1, 2)]);
    let archive = build_archive(
        tmp.path(),
        "card.h5p",
        &[
            ("h5p.json", &to_bytes(&manifest)),
            ("H5P.Card-1.0/library.json", &to_bytes(&card)),
        ],
    );

    let validator = PackageValidator::with_defaults(manager.clone());
    validator
        .validate(&archive, ValidationOptions::default())
        .await
        .unwrap();

    // the same archive fails against an empty installation
    let empty = PackageValidator::with_defaults(Arc::new(NoInstalledLibraries));
    let err = empty
        .validate(&archive, ValidationOptions::default())
        .await
        .unwrap_err();
    assert!(err
        .issues()
        .unwrap()
        .iter()
        .any(|issue| issue.kind == IssueKind::MissingDependency));
}

#[tokio::test]
async fn validation_is_read_only() {
    let tmp = TempDir::new().unwrap();
    let (manager, storage) = manager();

    let manifest = package_manifest("H5P.Card", &[("H5P.Card", 1, 0)]);
    let card = library_descriptor("H5P.Card", (1, 0, 0), &[], &[]);
    let archive = build_archive(
        tmp.path(),
        "card.h5p",
        &[
            ("h5p.json", &to_bytes(&manifest)),
            ("H5P.Card-1.0/library.json", &to_bytes(&card)),
        ],
    );

    let validator = PackageValidator::with_defaults(manager.clone());
    validator
        .validate(&archive, ValidationOptions::default())
        .await
        .unwrap();

    // a valid package reaches storage only through the manager, never
    // through validation
    use h5p_registry_storage::LibraryStorage;
    assert!(storage
        .get_installed_library_names(None)
        .await
        .unwrap()
        .is_empty());
}
