//! Synthetic read-only handles.
//!
//! A virtual directory presents a fixed list of caller-supplied children;
//! a virtual file produces its bytes from a caller-supplied loader. Both
//! always exist, and every mutating operation fails with
//! [`MufsError::NotSupported`].

use std::io::{Cursor, Read, Write};
use std::time::SystemTime;

use crate::ops::filter_and_sort;
use crate::{
    BackendKind, CachedAttributes, MufsError, Resource, ResourceDir, ResourceFilter,
    ResourceHandle, ResourceRead, ResourceTransfer, ResourceWrite,
};

/// Produces the content of a virtual file.
pub type DataLoader = dyn Fn() -> Result<Vec<u8>, MufsError> + Send + Sync;

enum Content {
    Directory(Vec<ResourceHandle>),
    File(Box<DataLoader>),
}

/// A virtual directory or file.
pub struct VirtualResource {
    name: String,
    resource: String,
    content: Content,
    created: SystemTime,
    attrs: CachedAttributes,
}

impl VirtualResource {
    /// A directory listing exactly `children`.
    pub fn directory(name: impl Into<String>, children: Vec<ResourceHandle>) -> Self {
        let name = name.into();
        let resource = format!("{name}/");
        Self::build(name, resource, Content::Directory(children))
    }

    /// A file whose content comes from `loader` on every read.
    pub fn file(
        name: impl Into<String>,
        loader: impl Fn() -> Result<Vec<u8>, MufsError> + Send + Sync + 'static,
    ) -> Self {
        let name = name.into();
        let resource = name.clone();
        Self::build(name, resource, Content::File(Box::new(loader)))
    }

    fn build(name: String, resource: String, content: Content) -> Self {
        let attrs = CachedAttributes::new();
        attrs.set_directory(matches!(content, Content::Directory(_)));
        Self {
            name,
            resource,
            content,
            created: SystemTime::now(),
            attrs,
        }
    }

    fn children(&self, directories: bool, filter: Option<&ResourceFilter>) -> Vec<ResourceHandle> {
        let Content::Directory(children) = &self.content else {
            return Vec::new();
        };
        let matching = children
            .iter()
            .filter(|child| child.is_directory() == directories)
            .cloned()
            .collect();
        filter_and_sort(matching, filter)
    }
}

impl ResourceRead for VirtualResource {
    fn resource_string(&self) -> &str {
        &self.resource
    }

    fn backend(&self) -> BackendKind {
        BackendKind::Static
    }

    fn name(&self) -> String {
        self.name.clone()
    }

    fn attributes(&self) -> &CachedAttributes {
        &self.attrs
    }

    fn exists(&self) -> bool {
        true
    }

    fn is_directory(&self) -> bool {
        matches!(self.content, Content::Directory(_))
    }

    fn size(&self) -> Result<Option<u64>, MufsError> {
        Ok(None)
    }

    fn modified(&self) -> Result<SystemTime, MufsError> {
        Ok(self.created)
    }

    fn open_read(&self) -> Result<Box<dyn Read + Send>, MufsError> {
        match &self.content {
            Content::File(loader) => Ok(Box::new(Cursor::new(loader()?))),
            Content::Directory(_) => Err(MufsError::not_supported("open_read", BackendKind::Static)),
        }
    }
}

impl ResourceWrite for VirtualResource {
    fn open_write(&self, _append: bool) -> Result<Box<dyn Write + Send>, MufsError> {
        Err(MufsError::not_supported("open_write", BackendKind::Static))
    }

    fn delete(&self) -> Result<(), MufsError> {
        Err(MufsError::not_supported("delete", BackendKind::Static))
    }

    fn mkdirs(&self) -> Result<(), MufsError> {
        Err(MufsError::not_supported("mkdirs", BackendKind::Static))
    }

    // Mime and directory state never change.
    fn refresh(&self) {}
}

impl ResourceDir for VirtualResource {
    fn list_directories(
        &self,
        filter: Option<&ResourceFilter>,
    ) -> Result<Vec<ResourceHandle>, MufsError> {
        Ok(self.children(true, filter))
    }

    fn list_files(&self, filter: Option<&ResourceFilter>) -> Result<Vec<ResourceHandle>, MufsError> {
        Ok(self.children(false, filter))
    }

    fn parent(&self) -> Option<ResourceHandle> {
        None
    }
}

impl ResourceTransfer for VirtualResource {
    /// Fails before copying anything, since the source cannot be deleted.
    fn move_to(&self, _target: &dyn Resource, _overwrite: bool) -> Result<(), MufsError> {
        Err(MufsError::not_supported("move_to", BackendKind::Static))
    }
}
