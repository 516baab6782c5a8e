//! Deterministic cache key construction
//!
//! Keys are plain strings assembled from a fixed prefix, a scope (one
//! library or an aggregate), an operation tag, and an optional filename.
//! Identical inputs always produce identical keys, and the operation tags
//! are distinct fixed tokens, so two different operations can never collide.

use h5p_registry_core::LibraryName;

/// Namespace prefix for every registry cache key
pub const KEY_PREFIX: &str = "h5p-registry";

/// Operation tags used in cache keys
pub mod ops {
    /// Installed-library record for one identity
    pub const METADATA: &str = "metadata";
    /// Installed flag for one identity
    pub const INSTALLED: &str = "installed";
    /// File listing for one identity
    pub const FILE_LIST: &str = "files";
    /// Translation file listing for one identity
    pub const LANGUAGES: &str = "languages";
    /// Existence of one file
    pub const FILE_EXISTS: &str = "file-exists";
    /// JSON-parsed contents of one file
    pub const FILE_JSON: &str = "json";
    /// String contents of one file
    pub const FILE_STRING: &str = "string";
    /// Installed-name listing (global or per machine name)
    pub const NAMES: &str = "names";
    /// Addon listing
    pub const ADDONS: &str = "addons";
}

/// Key for a per-library operation
pub fn library(library: &LibraryName, op: &str) -> String {
    format!("{}:lib:{}:{}", KEY_PREFIX, library, op)
}

/// Key for an operation on one file of a library
pub fn file(library: &LibraryName, op: &str, filename: &str) -> String {
    format!("{}:lib:{}:{}:{}", KEY_PREFIX, library, op, filename)
}

/// Key for an aggregate operation, optionally qualified (e.g. by machine
/// name)
pub fn aggregate(op: &str, qualifier: Option<&str>) -> String {
    match qualifier {
        Some(qualifier) => format!("{}:agg:{}:{}", KEY_PREFIX, op, qualifier),
        None => format!("{}:agg:{}:*", KEY_PREFIX, op),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn name() -> LibraryName {
        LibraryName::new("H5P.Test", 1, 2).unwrap()
    }

    #[test]
    fn test_keys_are_deterministic() {
        assert_eq!(library(&name(), ops::METADATA), library(&name(), ops::METADATA));
        assert_eq!(
            file(&name(), ops::FILE_JSON, "semantics.json"),
            file(&name(), ops::FILE_JSON, "semantics.json")
        );
    }

    #[test]
    fn test_distinct_operations_get_distinct_keys() {
        let keys = [
            library(&name(), ops::METADATA),
            library(&name(), ops::INSTALLED),
            library(&name(), ops::FILE_LIST),
            file(&name(), ops::FILE_EXISTS, "js/test.js"),
            file(&name(), ops::FILE_JSON, "js/test.js"),
            file(&name(), ops::FILE_STRING, "js/test.js"),
            aggregate(ops::NAMES, None),
            aggregate(ops::NAMES, Some("H5P.Test")),
            aggregate(ops::ADDONS, None),
        ];
        for (i, a) in keys.iter().enumerate() {
            for b in keys.iter().skip(i + 1) {
                assert_ne!(a, b);
            }
        }
    }

    #[test]
    fn test_identity_scopes_keys() {
        let other = LibraryName::new("H5P.Test", 1, 3).unwrap();
        assert_ne!(
            library(&name(), ops::METADATA),
            library(&other, ops::METADATA)
        );
    }
}
