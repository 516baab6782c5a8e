//! Descriptor fixtures shared across the integration suites

#![allow(dead_code)]

use serde_json::{json, Value};

/// A `library.json` descriptor
pub fn library_descriptor(
    machine_name: &str,
    version: (u32, u32, u32),
    js: &[&str],
    preloaded: &[(&str, u32, u32)],
) -> Value {
    json!({
        "title": machine_name,
        "machineName": machine_name,
        "majorVersion": version.0,
        "minorVersion": version.1,
        "patchVersion": version.2,
        "runnable": 1,
        "preloadedJs": js.iter().map(|path| json!({"path": path})).collect::<Vec<_>>(),
        "preloadedDependencies": preloaded
            .iter()
            .map(|(name, major, minor)| json!({
                "machineName": name,
                "majorVersion": major,
                "minorVersion": minor
            }))
            .collect::<Vec<_>>()
    })
}

/// An `h5p.json` package manifest
pub fn package_manifest(main_library: &str, preloaded: &[(&str, u32, u32)]) -> Value {
    json!({
        "title": "Integration fixture",
        "mainLibrary": main_library,
        "language": "en",
        "license": "U",
        "embedTypes": ["div"],
        "preloadedDependencies": preloaded
            .iter()
            .map(|(name, major, minor)| json!({
                "machineName": name,
                "majorVersion": major,
                "minorVersion": minor
            }))
            .collect::<Vec<_>>()
    })
}

/// Serialize a descriptor for embedding in an archive
pub fn to_bytes(value: &Value) -> Vec<u8> {
    serde_json::to_vec(value).unwrap()
}
