//! Validation issue model
//!
//! Package validation reports the complete set of problems found in an
//! archive rather than stopping at the first one, so callers can show
//! uploaders everything that needs fixing in a single round trip.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The category of a validation problem
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueKind {
    /// A required descriptor file (`library.json`, `h5p.json`) is absent
    MissingDescriptor,
    /// A descriptor file exists but cannot be parsed
    MalformedDescriptor,
    /// A library directory's name does not match its declared identity
    IdentityMismatch,
    /// A library directory name contains disallowed characters
    InvalidDirectoryName,
    /// A file referenced by library metadata is absent from the archive
    MissingAssetFile,
    /// A declared dependency resolves neither in-archive nor in storage
    MissingDependency,
    /// A file's extension is not on the applicable whitelist
    DisallowedExtension,
    /// A manifest field is absent or has a disallowed value
    ManifestField,
    /// The declared license is not an allowed value
    DisallowedLicense,
    /// A root-level entry that is neither the manifest, content, nor a library
    UnexpectedEntry,
}

impl IssueKind {
    /// Get the string representation of the issue kind
    pub fn as_str(&self) -> &'static str {
        match self {
            IssueKind::MissingDescriptor => "missing_descriptor",
            IssueKind::MalformedDescriptor => "malformed_descriptor",
            IssueKind::IdentityMismatch => "identity_mismatch",
            IssueKind::InvalidDirectoryName => "invalid_directory_name",
            IssueKind::MissingAssetFile => "missing_asset_file",
            IssueKind::MissingDependency => "missing_dependency",
            IssueKind::DisallowedExtension => "disallowed_extension",
            IssueKind::ManifestField => "manifest_field",
            IssueKind::DisallowedLicense => "disallowed_license",
            IssueKind::UnexpectedEntry => "unexpected_entry",
        }
    }
}

impl fmt::Display for IssueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One problem found while validating a package archive
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationIssue {
    /// What went wrong
    pub kind: IssueKind,
    /// The archive path the problem was found at
    pub path: String,
    /// Human-readable detail
    pub message: String,
}

impl ValidationIssue {
    /// Create a new validation issue
    pub fn new(kind: IssueKind, path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind,
            path: path.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} [{}]: {}", self.path, self.kind, self.message)
    }
}
