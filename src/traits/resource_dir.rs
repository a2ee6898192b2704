//! Hierarchy operations.

use crate::{MufsError, ResourceFilter, ResourceHandle, ResourceRead};

/// Child listing and parent lookup.
///
/// Children and parents are resolved through the factory that produced
/// the handle, so they share its cache.
pub trait ResourceDir: ResourceRead {
    /// Directory children, naturally sorted.
    ///
    /// Non-directories and virtual files return an empty list.
    fn list_directories(
        &self,
        filter: Option<&ResourceFilter>,
    ) -> Result<Vec<ResourceHandle>, MufsError>;

    /// File children, naturally sorted.
    fn list_files(&self, filter: Option<&ResourceFilter>) -> Result<Vec<ResourceHandle>, MufsError>;

    /// All children: directories first, then files, each naturally sorted.
    fn list_children(
        &self,
        filter: Option<&ResourceFilter>,
    ) -> Result<Vec<ResourceHandle>, MufsError> {
        crate::ops::default_list_children(self, filter)
    }

    /// The parent handle, or `None` at a root or for backends without
    /// a hierarchy.
    fn parent(&self) -> Option<ResourceHandle>;
}
