//! Library identity, metadata, and installed-library records
//!
//! A library is uniquely named by `(machine_name, major_version,
//! minor_version)`; the patch version is deliberately excluded from identity
//! so that a higher patch replaces the installed content in place instead of
//! installing alongside it.

use chrono::{DateTime, Utc};
use regex::{Regex, RegexBuilder};
use serde::de::{self, Deserializer, Unexpected};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;

use crate::error::{RegistryError, Result};
use crate::types::{DependencyRelation, InstallationId, RelationSet};

/// Name of the per-library descriptor file inside a library directory
pub const LIBRARY_DESCRIPTOR_FILE: &str = "library.json";

/// Allowed pattern for machine names and library directory names
fn name_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        RegexBuilder::new(r"^[\w.\-]{1,255}$")
            .size_limit(32 * 1024 * 1024)
            .build()
            .expect("valid name pattern")
    })
}

/// The identity of a library: machine name plus major and minor version
///
/// Equality and hashing cover exactly these three fields. The patch version
/// lives on [`LibraryMetadata`] and never participates in identity.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LibraryName {
    /// Machine-readable name, e.g. `H5P.MultiChoice`
    pub machine_name: String,
    /// Major version component
    pub major_version: u32,
    /// Minor version component
    pub minor_version: u32,
}

impl LibraryName {
    /// Create a new library name, validating the machine name
    pub fn new(machine_name: impl Into<String>, major_version: u32, minor_version: u32) -> Result<Self> {
        let machine_name = machine_name.into();
        if !name_pattern().is_match(&machine_name) {
            return Err(RegistryError::InvalidLibraryName(machine_name));
        }
        Ok(Self {
            machine_name,
            major_version,
            minor_version,
        })
    }

    /// The directory form of this name, e.g. `H5P.MultiChoice-1.16`
    ///
    /// This is also the exact directory name the package format requires.
    pub fn directory_name(&self) -> String {
        format!(
            "{}-{}.{}",
            self.machine_name, self.major_version, self.minor_version
        )
    }

    /// Check whether a directory name is well-formed at all
    pub fn is_valid_directory_name(candidate: &str) -> bool {
        name_pattern().is_match(candidate)
    }
}

impl fmt::Display for LibraryName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}-{}.{}",
            self.machine_name, self.major_version, self.minor_version
        )
    }
}

impl FromStr for LibraryName {
    type Err = RegistryError;

    /// Parse the directory form `MachineName-Major.Minor`
    fn from_str(s: &str) -> Result<Self> {
        let (machine_name, version) = s
            .rsplit_once('-')
            .ok_or_else(|| RegistryError::InvalidLibraryName(s.to_string()))?;
        let (major, minor) = version
            .split_once('.')
            .ok_or_else(|| RegistryError::InvalidVersion(version.to_string()))?;
        let major_version: u32 = major
            .parse()
            .map_err(|_| RegistryError::InvalidVersion(version.to_string()))?;
        let minor_version: u32 = minor
            .parse()
            .map_err(|_| RegistryError::InvalidVersion(version.to_string()))?;
        LibraryName::new(machine_name, major_version, minor_version)
    }
}

/// A file referenced from library metadata, matching the `{"path": "..."}`
/// shape used by `preloadedJs`/`preloadedCss`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileReference {
    /// Path relative to the library directory, e.g. `js/dialog.js`
    pub path: String,
}

impl FileReference {
    /// Create a new file reference
    pub fn new(path: impl Into<String>) -> Self {
        Self { path: path.into() }
    }
}

/// Core API version requirement declared by a library
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CoreApiVersion {
    /// Required core major version
    pub major_version: u32,
    /// Required core minor version
    pub minor_version: u32,
}

/// Everything a `library.json` descriptor declares about one library version
///
/// Parsed once per library version and immutable afterwards. Field names
/// serialize in camelCase so descriptors round-trip byte-compatible with the
/// package format.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LibraryMetadata {
    /// Human-readable title
    pub title: String,

    /// Machine-readable name, e.g. `H5P.MultiChoice`
    pub machine_name: String,

    /// Major version component
    pub major_version: u32,

    /// Minor version component
    pub minor_version: u32,

    /// Patch version component (excluded from identity)
    pub patch_version: u32,

    /// Whether this library can be the main library of a content item
    ///
    /// Published descriptors encode this as `0`/`1` as often as `true`/`false`;
    /// both are accepted.
    #[serde(default, deserialize_with = "bool_or_int")]
    pub runnable: bool,

    /// Author name
    #[serde(skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,

    /// License identifier
    #[serde(skip_serializing_if = "Option::is_none")]
    pub license: Option<String>,

    /// Optional description
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Supported embed types (`div`, `iframe`)
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub embed_types: Vec<String>,

    /// Core API requirement
    #[serde(skip_serializing_if = "Option::is_none")]
    pub core_api: Option<CoreApiVersion>,

    /// Addon registration block; present only on addon libraries
    #[serde(skip_serializing_if = "Option::is_none")]
    pub add_to: Option<serde_json::Value>,

    /// Libraries loaded together with this one, in declared order
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub preloaded_dependencies: Vec<LibraryName>,

    /// Libraries loaded on demand, in declared order
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub dynamic_dependencies: Vec<LibraryName>,

    /// Libraries only needed while editing, in declared order
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub editor_dependencies: Vec<LibraryName>,

    /// JavaScript assets, in load order
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub preloaded_js: Vec<FileReference>,

    /// Stylesheet assets, in load order
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub preloaded_css: Vec<FileReference>,
}

impl LibraryMetadata {
    /// Parse a `library.json` descriptor
    pub fn from_json(bytes: &[u8]) -> Result<Self> {
        serde_json::from_slice(bytes).map_err(|e| RegistryError::MalformedDescriptor {
            path: LIBRARY_DESCRIPTOR_FILE.to_string(),
            message: e.to_string(),
        })
    }

    /// The identity of this library version
    pub fn name(&self) -> LibraryName {
        LibraryName {
            machine_name: self.machine_name.clone(),
            major_version: self.major_version,
            minor_version: self.minor_version,
        }
    }

    /// The directory name this library must live under
    pub fn directory_name(&self) -> String {
        self.name().directory_name()
    }

    /// The full version as a lexicographically comparable tuple
    pub fn version(&self) -> (u32, u32, u32) {
        (self.major_version, self.minor_version, self.patch_version)
    }

    /// Validate invariants not expressible through parsing alone
    pub fn validate(&self) -> Result<()> {
        if !name_pattern().is_match(&self.machine_name) {
            return Err(RegistryError::InvalidLibraryName(self.machine_name.clone()));
        }
        if self.title.is_empty() {
            return Err(RegistryError::ValidationError(
                "Library title cannot be empty".to_string(),
            ));
        }
        Ok(())
    }

    /// The declared dependencies for one relation, in declared order
    pub fn dependencies(&self, relation: DependencyRelation) -> &[LibraryName] {
        match relation {
            DependencyRelation::Preloaded => &self.preloaded_dependencies,
            DependencyRelation::Dynamic => &self.dynamic_dependencies,
            DependencyRelation::Editor => &self.editor_dependencies,
        }
    }

    /// All dependencies across the selected relations, preserving the
    /// declared order within each relation
    pub fn dependencies_in(&self, relations: RelationSet) -> Vec<&LibraryName> {
        relations
            .iter()
            .flat_map(|relation| self.dependencies(relation).iter())
            .collect()
    }

    /// The asset files this library requires to be present in storage
    pub fn required_files(&self) -> impl Iterator<Item = &FileReference> {
        self.preloaded_js.iter().chain(self.preloaded_css.iter())
    }

    /// Whether this descriptor is a patch-only upgrade of `installed`:
    /// same major and minor version, strictly greater patch
    pub fn is_patch_upgrade_of(&self, installed: &LibraryMetadata) -> bool {
        self.major_version == installed.major_version
            && self.minor_version == installed.minor_version
            && self.patch_version > installed.patch_version
    }

    /// Whether this descriptor is any kind of upgrade of `installed`,
    /// comparing `(major, minor, patch)` lexicographically
    pub fn is_upgrade_of(&self, installed: &LibraryMetadata) -> bool {
        self.version() > installed.version()
    }
}

/// Accept a boolean encoded as either a JSON bool or a 0/1 integer
fn bool_or_int<'de, D>(deserializer: D) -> std::result::Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    struct BoolOrInt;

    impl de::Visitor<'_> for BoolOrInt {
        type Value = bool;

        fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
            formatter.write_str("a boolean or 0/1")
        }

        fn visit_bool<E: de::Error>(self, value: bool) -> std::result::Result<bool, E> {
            Ok(value)
        }

        fn visit_u64<E: de::Error>(self, value: u64) -> std::result::Result<bool, E> {
            match value {
                0 => Ok(false),
                1 => Ok(true),
                other => Err(E::invalid_value(
                    Unexpected::Unsigned(other),
                    &"0 or 1",
                )),
            }
        }

        fn visit_i64<E: de::Error>(self, value: i64) -> std::result::Result<bool, E> {
            match value {
                0 => Ok(false),
                1 => Ok(true),
                other => Err(E::invalid_value(Unexpected::Signed(other), &"0 or 1")),
            }
        }
    }

    deserializer.deserialize_any(BoolOrInt)
}

/// Metadata recorded at install time on top of the descriptor
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdditionalMetadata {
    /// Whether installing content using this library requires extra permission
    pub restricted: bool,
}

/// A library as it exists in storage
///
/// Created on install, replaced in place by the update path, destroyed on
/// removal or rollback. Readers never observe an intermediate state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstalledLibrary {
    /// Storage-assigned opaque identifier
    pub id: InstallationId,

    /// Install-time permission gate
    pub restricted: bool,

    /// The descriptor this library was installed from
    pub metadata: LibraryMetadata,

    /// When the library was first installed
    pub installed_at: DateTime<Utc>,

    /// When the library was last installed or updated
    pub updated_at: DateTime<Utc>,
}

impl InstalledLibrary {
    /// Create an installed-library record with fresh timestamps
    pub fn new(id: InstallationId, metadata: LibraryMetadata, restricted: bool) -> Self {
        let now = Utc::now();
        Self {
            id,
            restricted,
            metadata,
            installed_at: now,
            updated_at: now,
        }
    }

    /// The identity of this library
    pub fn name(&self) -> LibraryName {
        self.metadata.name()
    }

    /// Whether this library registers itself as an addon
    pub fn is_addon(&self) -> bool {
        self.metadata.add_to.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn metadata(major: u32, minor: u32, patch: u32) -> LibraryMetadata {
        LibraryMetadata {
            title: "Test".to_string(),
            machine_name: "H5P.Test".to_string(),
            major_version: major,
            minor_version: minor,
            patch_version: patch,
            runnable: true,
            author: None,
            license: None,
            description: None,
            embed_types: vec![],
            core_api: None,
            add_to: None,
            preloaded_dependencies: vec![],
            dynamic_dependencies: vec![],
            editor_dependencies: vec![],
            preloaded_js: vec![],
            preloaded_css: vec![],
        }
    }

    #[test]
    fn test_name_display_and_parse() {
        let name = LibraryName::new("H5P.MultiChoice", 1, 16).unwrap();
        assert_eq!(name.to_string(), "H5P.MultiChoice-1.16");

        let parsed: LibraryName = "H5P.MultiChoice-1.16".parse().unwrap();
        assert_eq!(parsed, name);
    }

    #[test]
    fn test_name_identity_excludes_patch() {
        let a = metadata(1, 2, 3);
        let b = metadata(1, 2, 9);
        assert_eq!(a.name(), b.name());
    }

    #[test]
    fn test_name_rejects_invalid_characters() {
        assert!(LibraryName::new("../escape", 1, 0).is_err());
        assert!(LibraryName::new("H5P.Test", 1, 0).is_ok());
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!("no-version-here".parse::<LibraryName>().is_err());
        assert!("H5P.Test-1".parse::<LibraryName>().is_err());
        assert!("H5P.Test-a.b".parse::<LibraryName>().is_err());
    }

    #[test]
    fn test_descriptor_parsing_with_integer_runnable() {
        let json = br#"{
            "title": "Dialog Cards",
            "machineName": "H5P.Dialogcards",
            "majorVersion": 1,
            "minorVersion": 8,
            "patchVersion": 3,
            "runnable": 1,
            "preloadedJs": [{"path": "js/dialogcards.js"}],
            "preloadedCss": [{"path": "css/dialogcards.css"}],
            "preloadedDependencies": [
                {"machineName": "H5P.JoubelUI", "majorVersion": 1, "minorVersion": 3}
            ]
        }"#;
        let parsed = LibraryMetadata::from_json(json).unwrap();
        assert!(parsed.runnable);
        assert_eq!(parsed.name().to_string(), "H5P.Dialogcards-1.8");
        assert_eq!(parsed.preloaded_js[0].path, "js/dialogcards.js");
        assert_eq!(
            parsed.preloaded_dependencies[0],
            LibraryName::new("H5P.JoubelUI", 1, 3).unwrap()
        );
    }

    #[test]
    fn test_descriptor_parsing_boolean_runnable() {
        let json = br#"{
            "title": "Frame",
            "machineName": "H5P.Frame",
            "majorVersion": 1,
            "minorVersion": 0,
            "patchVersion": 0,
            "runnable": false
        }"#;
        let parsed = LibraryMetadata::from_json(json).unwrap();
        assert!(!parsed.runnable);
    }

    #[test]
    fn test_patch_upgrade_comparison() {
        let installed = metadata(1, 2, 3);

        assert!(metadata(1, 2, 4).is_patch_upgrade_of(&installed));
        assert!(!metadata(1, 2, 3).is_patch_upgrade_of(&installed));
        assert!(!metadata(1, 2, 2).is_patch_upgrade_of(&installed));
        // different minor is a different identity, never a patch upgrade
        assert!(!metadata(1, 3, 9).is_patch_upgrade_of(&installed));
    }

    #[test]
    fn test_upgrade_comparison_is_lexicographic() {
        let installed = metadata(1, 2, 3);

        assert!(metadata(2, 0, 0).is_upgrade_of(&installed));
        assert!(metadata(1, 3, 0).is_upgrade_of(&installed));
        assert!(metadata(1, 2, 4).is_upgrade_of(&installed));
        assert!(!metadata(1, 2, 3).is_upgrade_of(&installed));
        assert!(!metadata(0, 9, 9).is_upgrade_of(&installed));
    }

    #[test]
    fn test_dependencies_in_relation_order() {
        let mut meta = metadata(1, 0, 0);
        meta.preloaded_dependencies = vec![LibraryName::new("A", 1, 0).unwrap()];
        meta.dynamic_dependencies = vec![LibraryName::new("B", 1, 0).unwrap()];
        meta.editor_dependencies = vec![LibraryName::new("C", 1, 0).unwrap()];

        let all: Vec<String> = meta
            .dependencies_in(RelationSet::all())
            .into_iter()
            .map(|n| n.machine_name.clone())
            .collect();
        assert_eq!(all, vec!["A", "B", "C"]);

        let runtime: Vec<String> = meta
            .dependencies_in(RelationSet::runtime())
            .into_iter()
            .map(|n| n.machine_name.clone())
            .collect();
        assert_eq!(runtime, vec!["A", "B"]);
    }

    #[test]
    fn test_descriptor_serialization_is_camel_case() {
        let meta = metadata(1, 0, 7);
        let value = serde_json::to_value(&meta).unwrap();
        assert_eq!(value["machineName"], "H5P.Test");
        assert_eq!(value["patchVersion"], 7);
        // empty lists are omitted entirely
        assert!(value.get("preloadedDependencies").is_none());
    }
}
