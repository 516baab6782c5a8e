//! Package manifest (`h5p.json`) parsing and field rules

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;

use crate::error::{RegistryError, Result};
use crate::library::LibraryName;

/// Name of the package manifest at the archive root
pub const PACKAGE_MANIFEST_FILE: &str = "h5p.json";

/// License values a package manifest may declare
pub const ALLOWED_LICENSES: &[&str] = &[
    "CC BY",
    "CC BY-SA",
    "CC BY-ND",
    "CC BY-NC",
    "CC BY-NC-SA",
    "CC BY-NC-ND",
    "CC0 1.0",
    "GNU GPL",
    "PD",
    "ODC PDDL",
    "CC PDM",
    "U",
    "C",
];

fn language_code_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^[a-zA-Z]{2,3}(-[a-zA-Z]{2,4})?$").expect("valid language pattern")
    })
}

/// Check a license value against the allowed list
pub fn is_allowed_license(license: &str) -> bool {
    ALLOWED_LICENSES.contains(&license)
}

/// Check a language code for the shape the package format allows
///
/// `und` is the format's explicit "undetermined" marker.
pub fn is_valid_language_code(code: &str) -> bool {
    code == "und" || language_code_pattern().is_match(code)
}

/// The root `h5p.json` manifest of a package archive
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PackageManifest {
    /// Content title
    pub title: String,

    /// Machine name of the library that renders this content
    pub main_library: String,

    /// Content language code
    pub language: String,

    /// Declared license
    #[serde(skip_serializing_if = "Option::is_none")]
    pub license: Option<String>,

    /// Supported embed types
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub embed_types: Vec<String>,

    /// Libraries this content needs preloaded, including the main library
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub preloaded_dependencies: Vec<LibraryName>,

    /// Fallback language for translations
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_language: Option<String>,
}

impl PackageManifest {
    /// Parse an `h5p.json` manifest
    pub fn from_json(bytes: &[u8]) -> Result<Self> {
        serde_json::from_slice(bytes).map_err(|e| RegistryError::MalformedDescriptor {
            path: PACKAGE_MANIFEST_FILE.to_string(),
            message: e.to_string(),
        })
    }

    /// The preloaded dependency entry naming the main library, if declared
    pub fn main_library_dependency(&self) -> Option<&LibraryName> {
        self.preloaded_dependencies
            .iter()
            .find(|dep| dep.machine_name == self.main_library)
    }
}
