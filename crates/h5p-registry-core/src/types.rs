//! Core type definitions

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use ulid::Ulid;

/// Storage-assigned identifier for an installed library, using ULID
/// (Universally Unique Lexicographically Sortable Identifier)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct InstallationId(Ulid);

impl InstallationId {
    /// Generate a new InstallationId
    pub fn new() -> Self {
        Self(Ulid::new())
    }

    /// Create an InstallationId from a ULID
    pub fn from_ulid(ulid: Ulid) -> Self {
        Self(ulid)
    }

    /// Get the underlying ULID
    pub fn as_ulid(&self) -> &Ulid {
        &self.0
    }
}

impl Default for InstallationId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for InstallationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for InstallationId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ulid::from_string(s)
            .map(Self)
            .map_err(|e| format!("Invalid installation id: {}", e))
    }
}

/// The three ways one library can depend on another
///
/// Preloaded dependencies are always loaded with the library, dynamic
/// dependencies are loaded on demand, and editor dependencies are only
/// needed in authoring mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DependencyRelation {
    /// Always loaded together with the depending library
    Preloaded,
    /// Loaded on demand at runtime
    Dynamic,
    /// Only needed when the content is being edited
    Editor,
}

impl DependencyRelation {
    /// All relations, in traversal order
    pub const ALL: [DependencyRelation; 3] = [
        DependencyRelation::Preloaded,
        DependencyRelation::Dynamic,
        DependencyRelation::Editor,
    ];

    /// Get the string representation of the relation
    pub fn as_str(&self) -> &'static str {
        match self {
            DependencyRelation::Preloaded => "preloaded",
            DependencyRelation::Dynamic => "dynamic",
            DependencyRelation::Editor => "editor",
        }
    }
}

impl fmt::Display for DependencyRelation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A set of dependency relations to follow during graph traversal
///
/// Iteration order is fixed (preloaded, dynamic, editor) so that resolution
/// output is deterministic for fixed input metadata.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RelationSet {
    preloaded: bool,
    dynamic: bool,
    editor: bool,
}

impl RelationSet {
    /// The empty set
    pub fn none() -> Self {
        Self {
            preloaded: false,
            dynamic: false,
            editor: false,
        }
    }

    /// Only preloaded dependencies
    pub fn preloaded_only() -> Self {
        Self::none().with(DependencyRelation::Preloaded)
    }

    /// Preloaded and dynamic dependencies (everything the player needs)
    pub fn runtime() -> Self {
        Self::none()
            .with(DependencyRelation::Preloaded)
            .with(DependencyRelation::Dynamic)
    }

    /// All three relations (everything the editor needs)
    pub fn all() -> Self {
        Self {
            preloaded: true,
            dynamic: true,
            editor: true,
        }
    }

    /// Add a relation to the set
    pub fn with(mut self, relation: DependencyRelation) -> Self {
        match relation {
            DependencyRelation::Preloaded => self.preloaded = true,
            DependencyRelation::Dynamic => self.dynamic = true,
            DependencyRelation::Editor => self.editor = true,
        }
        self
    }

    /// Check whether the set contains a relation
    pub fn contains(&self, relation: DependencyRelation) -> bool {
        match relation {
            DependencyRelation::Preloaded => self.preloaded,
            DependencyRelation::Dynamic => self.dynamic,
            DependencyRelation::Editor => self.editor,
        }
    }

    /// Iterate the contained relations in traversal order
    pub fn iter(&self) -> impl Iterator<Item = DependencyRelation> + '_ {
        DependencyRelation::ALL
            .into_iter()
            .filter(|relation| self.contains(*relation))
    }
}

impl Default for RelationSet {
    fn default() -> Self {
        Self::all()
    }
}
