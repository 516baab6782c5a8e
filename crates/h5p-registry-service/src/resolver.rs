//! Transitive dependency resolution
//!
//! Computes dependency-first orderings over the live library metadata in
//! storage. Traversal uses an explicit stack with grey/black marking, so a
//! malformed dependency cycle is reported as an error instead of overflowing
//! the call stack, and sibling order follows each library's declared
//! dependency lists so output is deterministic for fixed metadata.

use async_trait::async_trait;
use h5p_registry_core::{LibraryMetadata, LibraryName, RelationSet};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, instrument};

use crate::error::{ServiceError, ServiceResult};

/// Live lookup of library metadata during traversal
///
/// Implemented by [`LibraryManager`](crate::manager::LibraryManager) over
/// storage, and by [`MapMetadataSource`] for fixed metadata sets (tests,
/// in-archive resolution).
#[async_trait]
pub trait MetadataSource: Send + Sync {
    /// Fetch the metadata of one library, or `None` when it is unknown
    async fn library_metadata(
        &self,
        library: &LibraryName,
    ) -> ServiceResult<Option<LibraryMetadata>>;
}

/// Metadata source backed by a fixed map
#[derive(Default)]
pub struct MapMetadataSource {
    libraries: HashMap<LibraryName, LibraryMetadata>,
}

impl MapMetadataSource {
    /// Create a source over the given metadata set
    pub fn new(libraries: impl IntoIterator<Item = LibraryMetadata>) -> Self {
        Self {
            libraries: libraries
                .into_iter()
                .map(|metadata| (metadata.name(), metadata))
                .collect(),
        }
    }
}

#[async_trait]
impl MetadataSource for MapMetadataSource {
    async fn library_metadata(
        &self,
        library: &LibraryName,
    ) -> ServiceResult<Option<LibraryMetadata>> {
        Ok(self.libraries.get(library).cloned())
    }
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Mark {
    /// On the traversal stack
    InProgress,
    /// Fully resolved and emitted
    Done,
}

struct Frame {
    library: LibraryName,
    children: Vec<LibraryName>,
    next: usize,
}

/// Resolves transitive dependency closures
pub struct DependencyResolver {
    source: Arc<dyn MetadataSource>,
}

impl DependencyResolver {
    /// Create a resolver over a metadata source
    pub fn new(source: Arc<dyn MetadataSource>) -> Self {
        Self { source }
    }

    /// Resolve the closure of a single library
    ///
    /// Returns a dependency-first ordering: every library appears after all
    /// libraries it depends on (considering only the selected relations),
    /// and each identity appears exactly once.
    #[instrument(skip(self, relations), fields(root = %root))]
    pub async fn resolve(
        &self,
        root: &LibraryName,
        relations: RelationSet,
    ) -> ServiceResult<Vec<LibraryName>> {
        self.resolve_all(std::slice::from_ref(root), relations).await
    }

    /// Resolve the combined closure of several roots
    ///
    /// Shared dependencies appear exactly once, before everything that
    /// depends on them; roots contribute in the order given.
    pub async fn resolve_all(
        &self,
        roots: &[LibraryName],
        relations: RelationSet,
    ) -> ServiceResult<Vec<LibraryName>> {
        let mut marks: HashMap<LibraryName, Mark> = HashMap::new();
        let mut order: Vec<LibraryName> = Vec::new();

        for root in roots {
            if marks.get(root) == Some(&Mark::Done) {
                continue;
            }
            let mut stack = vec![self.open_frame(root.clone(), None, relations).await?];
            marks.insert(root.clone(), Mark::InProgress);

            loop {
                let Some(top) = stack.last_mut() else {
                    break;
                };

                if top.next < top.children.len() {
                    let child = top.children[top.next].clone();
                    top.next += 1;
                    match marks.get(&child) {
                        Some(Mark::Done) => {}
                        Some(Mark::InProgress) => {
                            return Err(cycle_error(&stack, &child));
                        }
                        None => {
                            let parent = top.library.clone();
                            let frame =
                                self.open_frame(child.clone(), Some(&parent), relations).await?;
                            marks.insert(child, Mark::InProgress);
                            stack.push(frame);
                        }
                    }
                } else if let Some(finished) = stack.pop() {
                    marks.insert(finished.library.clone(), Mark::Done);
                    order.push(finished.library);
                }
            }
        }

        debug!(count = order.len(), "dependency closure resolved");
        Ok(order)
    }

    async fn open_frame(
        &self,
        library: LibraryName,
        required_by: Option<&LibraryName>,
        relations: RelationSet,
    ) -> ServiceResult<Frame> {
        let metadata = self
            .source
            .library_metadata(&library)
            .await?
            .ok_or_else(|| ServiceError::MissingDependency {
                dependency: library.to_string(),
                required_by: required_by.map(|name| name.to_string()),
            })?;
        let children = metadata
            .dependencies_in(relations)
            .into_iter()
            .cloned()
            .collect();
        Ok(Frame {
            library,
            children,
            next: 0,
        })
    }
}

fn cycle_error(stack: &[Frame], repeated: &LibraryName) -> ServiceError {
    let start = stack
        .iter()
        .position(|frame| &frame.library == repeated)
        .unwrap_or(0);
    let mut path: Vec<String> = stack[start..]
        .iter()
        .map(|frame| frame.library.to_string())
        .collect();
    path.push(repeated.to_string());
    ServiceError::CyclicDependency(path.join(" -> "))
}
