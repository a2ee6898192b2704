//! Local filesystem handles.
//!
//! # Accepted strings
//!
//! | Form | Example |
//! |------|---------|
//! | `file:` URI, percent-decoded | `file:///home/me/My%20Book.epub` |
//! | Absolute unix path without doubled separators | `/home/me/book.epub` |
//! | Absolute drive path | `C:\Books\book.epub` |
//! | Any path that exists locally | `books/book.epub` |
//!
//! Directories carry a trailing separator in their canonical string.
//!
//! # Fast paths
//!
//! When the target of a copy or move is also local, the handle works on
//! paths directly: `std::fs::copy` for files (falling back to a buffered
//! stream copy), a `walkdir` tree copy for directories, and `rename` for
//! moves (falling back to copy then delete across filesystems).

use std::fs;
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::{MAIN_SEPARATOR, Path, PathBuf};
use std::sync::{Arc, OnceLock};
use std::time::SystemTime;

use tracing::debug;
use url::Url;
use walkdir::WalkDir;

use super::trash;
use crate::factory::FactoryLink;
use crate::ops::{self, filter_and_sort};
use crate::{
    BackendKind, BackendProvider, CachedAttributes, Location, MufsError, Resource, ResourceDir,
    ResourceFactory, ResourceFilter, ResourceHandle, ResourceRead, ResourceTransfer,
    ResourceWrite,
};

/// Accepts local paths and `file:` URIs.
#[derive(Debug, Default)]
pub struct FileProvider;

impl BackendProvider for FileProvider {
    fn name(&self) -> &'static str {
        "file"
    }

    fn accepts(&self, resource: &str) -> bool {
        local_path(resource).is_some()
    }

    fn create(&self, resource: &str, factory: &ResourceFactory) -> Result<ResourceHandle, MufsError> {
        let path = local_path(resource).ok_or_else(|| MufsError::InvalidResource {
            resource: resource.to_string(),
            reason: "not a local path".to_string(),
        })?;
        Ok(Arc::new(FileResource::new(path, factory.link())))
    }
}

fn is_separator(c: char) -> bool {
    c == '/' || c == MAIN_SEPARATOR
}

fn is_drive_path(resource: &str) -> bool {
    let bytes = resource.as_bytes();
    bytes.len() >= 3
        && bytes[0].is_ascii_alphabetic()
        && bytes[1] == b':'
        && (bytes[2] == b'\\' || bytes[2] == b'/')
}

/// `X:` followed by nothing but separators.
fn is_drive_root(resource: &str) -> bool {
    is_drive_path(resource) && resource[2..].chars().all(|c| c == '\\' || c == '/')
}

/// The local path a resource string denotes, if it denotes one.
pub(crate) fn local_path(resource: &str) -> Option<PathBuf> {
    if resource
        .get(..5)
        .is_some_and(|scheme| scheme.eq_ignore_ascii_case("file:"))
    {
        return Url::parse(resource).ok()?.to_file_path().ok();
    }
    if resource.starts_with('/') && !resource.contains("//") {
        return Some(PathBuf::from(resource));
    }
    if is_drive_path(resource) {
        return Some(PathBuf::from(resource));
    }
    let path = Path::new(resource);
    if !resource.is_empty() && !resource.contains("://") && path.exists() {
        return std::path::absolute(path).ok();
    }
    None
}

/// `path` as a directory string, ending with exactly one separator.
fn directory_string(path: &Path) -> String {
    let mut s = path.to_string_lossy().into_owned();
    if !s.ends_with(is_separator) {
        s.push(MAIN_SEPARATOR);
    }
    s
}

/// Whether two paths name the same entry, following links when both exist.
fn same_path(a: &Path, b: &Path) -> bool {
    a == b || matches!((fs::canonicalize(a), fs::canonicalize(b)), (Ok(x), Ok(y)) if x == y)
}

/// A file or directory on local disk.
///
/// The canonical string follows the directory flag, so a handle resolved
/// before its directory existed gains the trailing separator once
/// [`mkdirs`](ResourceWrite::mkdirs) or a tree copy creates it.
pub struct FileResource {
    path: PathBuf,
    file_form: String,
    directory_form: String,
    /// Resolved from a string ending in a separator.
    wants_directory: bool,
    attrs: CachedAttributes,
    root: OnceLock<bool>,
    drive: OnceLock<bool>,
    floppy: OnceLock<bool>,
    factory: FactoryLink,
}

impl FileResource {
    pub(crate) fn new(path: PathBuf, factory: FactoryLink) -> Self {
        let raw = path.to_string_lossy().into_owned();
        let trimmed = raw.trim_end_matches(is_separator);
        let wants_directory = trimmed.len() != raw.len();

        // Keep one separator on roots such as `/` and `C:\`.
        let path = if trimmed.is_empty() || trimmed.ends_with(':') {
            PathBuf::from(&raw[..(trimmed.len() + 1).min(raw.len())])
        } else {
            PathBuf::from(trimmed)
        };

        let attrs = CachedAttributes::new();
        attrs.set_directory(path.is_dir() || (wants_directory && !path.exists()));

        Self {
            file_form: path.to_string_lossy().into_owned(),
            directory_form: directory_string(&path),
            wants_directory,
            path,
            attrs,
            root: OnceLock::new(),
            drive: OnceLock::new(),
            floppy: OnceLock::new(),
            factory,
        }
    }

    /// The local path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn io_error(&self, operation: &'static str) -> impl FnOnce(io::Error) -> MufsError + '_ {
        move |e| MufsError::io(operation, self.resource_string(), e)
    }

    fn metadata(&self) -> Result<fs::Metadata, MufsError> {
        fs::metadata(&self.path).map_err(self.io_error("metadata"))
    }

    fn forget_temporary(&self, resource: &str) {
        if let Some(factory) = self.factory.get() {
            factory.forget_temporary(resource);
        }
    }

    /// Refuse to copy or move a directory into its own subtree.
    fn check_not_nested(&self, destination: &Path, target: &dyn Resource) -> Result<(), MufsError> {
        if self.is_directory() && destination.starts_with(&self.path) {
            return Err(MufsError::InvalidResource {
                resource: target.resource_string().to_string(),
                reason: format!("inside the source directory {}", self.resource_string()),
            });
        }
        Ok(())
    }

    fn list(
        &self,
        directories: bool,
        filter: Option<&ResourceFilter>,
    ) -> Result<Vec<ResourceHandle>, MufsError> {
        if !self.is_directory() {
            return Ok(Vec::new());
        }
        let factory = self.factory.upgrade()?;
        let mut handles = Vec::new();
        for entry in fs::read_dir(&self.path).map_err(self.io_error("list"))? {
            let path = entry.map_err(self.io_error("list"))?.path();
            let is_dir = path.is_dir();
            if is_dir != directories {
                continue;
            }
            match factory.resolve_path(&path) {
                Ok(child) => {
                    child.attributes().set_directory(is_dir);
                    handles.push(child);
                }
                Err(e) => debug!(path = %path.display(), error = %e, "skipping unresolvable entry"),
            }
        }
        Ok(filter_and_sort(handles, filter))
    }
}

/// Recursively copy the directory `from` onto `to`.
fn copy_tree(from: &Path, to: &Path) -> Result<(), MufsError> {
    let resource = from.display().to_string();
    for entry in WalkDir::new(from) {
        let entry = entry.map_err(|e| MufsError::io("copy_to", resource.as_str(), e.into()))?;
        let relative = entry
            .path()
            .strip_prefix(from)
            .map_err(|e| MufsError::Backend(e.to_string()))?;
        let destination = to.join(relative);
        let result = if entry.file_type().is_dir() {
            fs::create_dir_all(&destination)
        } else {
            fs::copy(entry.path(), &destination).map(|_| ())
        };
        result.map_err(|e| MufsError::io("copy_to", destination.display().to_string(), e))?;
    }
    Ok(())
}

fn ensure_parent(path: &Path) -> Result<(), MufsError> {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => fs::create_dir_all(parent)
            .map_err(|e| MufsError::io("create parent", parent.display().to_string(), e)),
        _ => Ok(()),
    }
}

impl ResourceRead for FileResource {
    fn resource_string(&self) -> &str {
        if self.is_directory() {
            &self.directory_form
        } else {
            &self.file_form
        }
    }

    fn backend(&self) -> BackendKind {
        BackendKind::Filesystem
    }

    fn name(&self) -> String {
        match self.path.file_name() {
            Some(name) => name.to_string_lossy().into_owned(),
            None => self.resource_string().to_string(),
        }
    }

    fn attributes(&self) -> &CachedAttributes {
        &self.attrs
    }

    fn location(&self) -> Location<'_> {
        Location::Local(&self.path)
    }

    fn exists(&self) -> bool {
        self.path.try_exists().unwrap_or(false)
    }

    fn is_directory(&self) -> bool {
        self.attrs
            .directory_or(|| self.path.is_dir() || (self.wants_directory && !self.path.exists()))
    }

    fn is_root(&self) -> bool {
        *self.root.get_or_init(|| {
            if is_drive_path(&self.file_form) {
                return is_drive_root(&self.file_form);
            }
            self.path
                .parent()
                .is_none_or(|parent| parent.as_os_str().is_empty())
        })
    }

    fn is_drive(&self) -> bool {
        *self.drive.get_or_init(|| is_drive_root(&self.file_form))
    }

    fn is_floppy_drive(&self) -> bool {
        *self.floppy.get_or_init(|| {
            let lower = self.file_form.to_ascii_lowercase();
            self.is_drive() && (lower.starts_with("a:") || lower.starts_with("b:"))
        })
    }

    fn size(&self) -> Result<Option<u64>, MufsError> {
        let metadata = self.metadata()?;
        Ok((!metadata.is_dir()).then(|| metadata.len()))
    }

    fn modified(&self) -> Result<SystemTime, MufsError> {
        self.metadata()?.modified().map_err(self.io_error("modified"))
    }

    fn open_read(&self) -> Result<Box<dyn Read + Send>, MufsError> {
        if self.path.is_dir() {
            return Err(MufsError::io(
                "open_read",
                self.resource_string(),
                io::Error::from(io::ErrorKind::IsADirectory),
            ));
        }
        let file = fs::File::open(&self.path).map_err(self.io_error("open_read"))?;
        Ok(Box::new(BufReader::new(file)))
    }
}

impl ResourceWrite for FileResource {
    fn open_write(&self, append: bool) -> Result<Box<dyn Write + Send>, MufsError> {
        ensure_parent(&self.path)?;
        let file = fs::OpenOptions::new()
            .create(true)
            .write(true)
            .append(append)
            .truncate(!append)
            .open(&self.path)
            .map_err(self.io_error("open_write"))?;
        Ok(Box::new(BufWriter::new(file)))
    }

    fn delete(&self) -> Result<(), MufsError> {
        let resource = self.resource_string().to_string();
        let result = if self.path.is_dir() {
            fs::remove_dir_all(&self.path)
        } else {
            fs::remove_file(&self.path)
        };
        self.refresh();
        result.map_err(self.io_error("delete"))?;
        if self.exists() {
            return Err(MufsError::DeleteFailed { resource });
        }
        self.forget_temporary(&resource);
        Ok(())
    }

    fn mkdirs(&self) -> Result<(), MufsError> {
        fs::create_dir_all(&self.path).map_err(self.io_error("mkdirs"))?;
        self.refresh();
        Ok(())
    }

    fn move_to_trash(&self) -> Result<(), MufsError> {
        let trash = trash::trash_dir()
            .ok_or_else(|| MufsError::not_supported("move_to_trash", BackendKind::Filesystem))?;
        let resource = self.resource_string().to_string();
        trash::move_to_trash(&self.path, &trash)?;
        self.refresh();
        self.forget_temporary(&resource);
        Ok(())
    }

    /// Drops cached state and, when the directory flag flipped, caches the
    /// new canonical spelling next to the old one.
    fn refresh(&self) {
        let previous = self.resource_string().to_string();
        self.attrs.invalidate();
        if self.resource_string() != previous {
            if let Some(factory) = self.factory.get() {
                factory.alias(&previous, self.resource_string(), self);
            }
        }
    }
}

impl ResourceDir for FileResource {
    fn list_directories(
        &self,
        filter: Option<&ResourceFilter>,
    ) -> Result<Vec<ResourceHandle>, MufsError> {
        self.list(true, filter)
    }

    fn list_files(&self, filter: Option<&ResourceFilter>) -> Result<Vec<ResourceHandle>, MufsError> {
        self.list(false, filter)
    }

    fn parent(&self) -> Option<ResourceHandle> {
        let parent = self.attrs.parent_or(|| {
            self.path
                .parent()
                .filter(|p| !p.as_os_str().is_empty())
                .map(directory_string)
        })?;
        self.factory.get()?.resolve(parent)
    }
}

impl ResourceTransfer for FileResource {
    fn copy_to(&self, target: &dyn Resource, overwrite: bool) -> Result<(), MufsError> {
        let Location::Local(destination) = target.location() else {
            return ops::default_copy_to(self, target, overwrite);
        };
        if target.exists() && !overwrite {
            return Err(MufsError::AlreadyExists {
                resource: target.resource_string().to_string(),
                operation: "copy_to",
            });
        }
        if same_path(&self.path, destination) {
            debug!(resource = self.resource_string(), "copy onto itself skipped");
            return Ok(());
        }
        self.check_not_nested(destination, target)?;

        if self.is_directory() {
            copy_tree(&self.path, destination)?;
        } else {
            ensure_parent(destination)?;
            if let Err(e) = fs::copy(&self.path, destination) {
                debug!(from = self.resource_string(), error = %e, "fs::copy failed, streaming instead");
                ops::default_copy_to(self, target, true)?;
            }
        }
        target.refresh();
        Ok(())
    }

    fn move_to(&self, target: &dyn Resource, overwrite: bool) -> Result<(), MufsError> {
        let Location::Local(destination) = target.location() else {
            return ops::default_move_to(self, target, overwrite);
        };
        let occupied = target.exists();
        if occupied && !overwrite {
            return Err(MufsError::AlreadyExists {
                resource: target.resource_string().to_string(),
                operation: "move_to",
            });
        }
        if occupied && same_path(&self.path, destination) {
            debug!(resource = self.resource_string(), "move onto itself skipped");
            return Ok(());
        }
        self.check_not_nested(destination, target)?;
        if occupied {
            target.delete()?;
        }

        let resource = self.resource_string().to_string();
        ensure_parent(destination)?;
        if let Err(e) = fs::rename(&self.path, destination) {
            debug!(from = %resource, error = %e, "rename failed, copying instead");
            self.copy_to(target, true)?;
            self.delete()?;
        }
        self.refresh();
        self.forget_temporary(&resource);
        target.refresh();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn setup() -> (tempfile::TempDir, ResourceFactory) {
        (tempfile::tempdir().unwrap(), ResourceFactory::default())
    }

    #[test]
    fn accepted_forms() {
        assert_eq!(local_path("/a/b"), Some(PathBuf::from("/a/b")));
        assert_eq!(local_path("file:///a/My%20Book.epub"), Some(PathBuf::from("/a/My Book.epub")));
        assert!(local_path("C:\\Books\\x.pdf").is_some());
        assert!(local_path("/a//b").is_none());
        assert!(local_path("ftp://host/a").is_none());
        assert!(local_path("relative/that/does/not/exist").is_none());
        assert!(local_path("").is_none());
    }

    #[test]
    fn directories_get_trailing_separator() {
        let (dir, factory) = setup();
        let handle = factory.resolve_path(dir.path()).unwrap();
        assert!(handle.resource_string().ends_with(MAIN_SEPARATOR));
        assert!(handle.is_directory());

        let again = factory.resolve(handle.resource_string()).unwrap();
        assert!(Arc::ptr_eq(&handle, &again));
    }

    #[test]
    fn write_then_read() {
        let (dir, factory) = setup();
        let handle = factory.resolve_path(&dir.path().join("nested/out.bin")).unwrap();
        handle.write_bytes(&[1, 2, 3, 4]).unwrap();
        assert_eq!(handle.read_bytes().unwrap(), [1, 2, 3, 4]);
        assert_eq!(handle.size().unwrap(), Some(4));
        assert_eq!(handle.read_bytes_limited(2).unwrap(), [1, 2]);
    }

    #[test]
    fn append_channel() {
        let (dir, factory) = setup();
        let handle = factory.resolve_path(&dir.path().join("log.txt")).unwrap();
        handle.write_string("a").unwrap();
        let mut writer = handle.open_write(true).unwrap();
        writer.write_all(b"b").unwrap();
        writer.flush().unwrap();
        drop(writer);
        assert_eq!(handle.read_string().unwrap(), "ab");
    }

    #[test]
    fn delete_verifies_absence() {
        let (dir, factory) = setup();
        let handle = factory.resolve_path(&dir.path().join("gone.txt")).unwrap();
        handle.write_string("x").unwrap();
        handle.delete().unwrap();
        assert!(!handle.exists());
        assert!(matches!(handle.delete(), Err(MufsError::NotFound { .. })));
    }

    #[test]
    fn listing_is_split_and_sorted() {
        let (dir, factory) = setup();
        for name in ["file10.txt", "file2.txt"] {
            fs::write(dir.path().join(name), b"").unwrap();
        }
        for name in ["b", "a"] {
            fs::create_dir(dir.path().join(name)).unwrap();
        }
        let root = factory.resolve_path(dir.path()).unwrap();
        let names: Vec<_> = root.list_children(None).unwrap().iter().map(|h| h.name()).collect();
        assert_eq!(names, ["a", "b", "file2.txt", "file10.txt"]);

        let only_txt: &ResourceFilter = &|h: &ResourceHandle| h.name().ends_with(".txt");
        assert_eq!(root.list_directories(Some(only_txt)).unwrap().len(), 0);
        assert_eq!(root.list_files(Some(only_txt)).unwrap().len(), 2);
    }

    #[test]
    fn parent_is_resolved_through_cache() {
        let (dir, factory) = setup();
        let file = factory.resolve_path(&dir.path().join("child.txt")).unwrap();
        let parent = file.parent().unwrap();
        let direct = factory.resolve_path(dir.path()).unwrap();
        assert!(Arc::ptr_eq(&parent, &direct));
    }

    #[test]
    fn copy_directory_tree() {
        let (dir, factory) = setup();
        let source = dir.path().join("src");
        fs::create_dir_all(source.join("inner")).unwrap();
        fs::write(source.join("inner/a.txt"), b"a").unwrap();

        let from = factory.resolve_path(&source).unwrap();
        let to = factory.resolve_path(&dir.path().join("dst")).unwrap();
        from.copy_to(&*to, false).unwrap();
        assert_eq!(fs::read(dir.path().join("dst/inner/a.txt")).unwrap(), b"a");
        assert!(to.is_directory());
        assert!(to.resource_string().ends_with(MAIN_SEPARATOR));
    }

    #[test]
    fn mkdirs_adds_the_separator_and_an_alias() {
        let (dir, factory) = setup();
        let handle = factory.resolve_path(&dir.path().join("newdir")).unwrap();
        let before = handle.resource_string().to_string();
        assert!(!before.ends_with(MAIN_SEPARATOR));

        handle.mkdirs().unwrap();
        assert!(handle.is_directory());
        assert!(handle.resource_string().ends_with(MAIN_SEPARATOR));

        let by_new = factory.resolve(handle.resource_string()).unwrap();
        let by_old = factory.resolve(&before).unwrap();
        assert!(Arc::ptr_eq(&handle, &by_new));
        assert!(Arc::ptr_eq(&handle, &by_old));
    }

    #[test]
    fn trailing_separator_survives_refresh_before_creation() {
        let (dir, factory) = setup();
        let spelled = directory_string(&dir.path().join("later"));
        let handle = factory.resolve(&spelled).unwrap();
        handle.refresh();
        assert_eq!(handle.resource_string(), spelled);
        assert!(handle.is_directory());
    }

    #[test]
    fn transfer_onto_itself_keeps_content() {
        let (dir, factory) = setup();
        let handle = factory.resolve_path(&dir.path().join("precious.txt")).unwrap();
        handle.write_string("precious").unwrap();

        handle.copy_to(&*handle, true).unwrap();
        assert_eq!(handle.read_string().unwrap(), "precious");
        assert!(matches!(handle.copy_to(&*handle, false), Err(MufsError::AlreadyExists { .. })));

        handle.move_to(&*handle, true).unwrap();
        assert_eq!(handle.read_string().unwrap(), "precious");
    }

    #[test]
    fn directory_into_its_own_subtree_is_refused() {
        let (dir, factory) = setup();
        let source = factory.resolve_path(&dir.path().join("tree")).unwrap();
        source.mkdirs().unwrap();
        let inside = factory.resolve_path(&dir.path().join("tree/copy")).unwrap();

        let err = source.copy_to(&*inside, false).unwrap_err();
        assert!(matches!(err, MufsError::InvalidResource { .. }));
        let err = source.move_to(&*inside, false).unwrap_err();
        assert!(matches!(err, MufsError::InvalidResource { .. }));
        assert!(source.exists());
    }

    #[test]
    fn move_renames() {
        let (dir, factory) = setup();
        let from = factory.resolve_path(&dir.path().join("a.txt")).unwrap();
        from.write_string("payload").unwrap();
        let to = factory.resolve_path(&dir.path().join("sub/b.txt")).unwrap();

        from.move_to(&*to, false).unwrap();
        assert!(!from.exists());
        assert_eq!(to.read_string().unwrap(), "payload");
    }

    #[test]
    fn move_refuses_to_overwrite() {
        let (dir, factory) = setup();
        let from = factory.resolve_path(&dir.path().join("a.txt")).unwrap();
        let to = factory.resolve_path(&dir.path().join("b.txt")).unwrap();
        from.write_string("new").unwrap();
        to.write_string("old").unwrap();

        assert!(matches!(from.move_to(&*to, false), Err(MufsError::AlreadyExists { .. })));
        assert_eq!(to.read_string().unwrap(), "old");
        from.move_to(&*to, true).unwrap();
        assert_eq!(to.read_string().unwrap(), "new");
    }

    #[test]
    fn root_checks() {
        let factory = ResourceFactory::default();
        let root = factory.resolve("/").unwrap();
        assert!(root.is_root());
        assert!(!root.is_drive());
        assert!(!root.is_floppy_drive());
        assert!(root.parent().is_none());
        assert_eq!(root.resource_string(), "/");
    }

    #[test]
    fn drive_letters() {
        let factory = ResourceFactory::default();
        let system = factory.resolve("C:\\").unwrap();
        assert!(system.is_root());
        assert!(system.is_drive());
        assert!(!system.is_floppy_drive());

        let floppy = factory.resolve("a:\\").unwrap();
        assert!(floppy.is_drive());
        assert!(floppy.is_floppy_drive());

        let nested = factory.resolve("C:\\Books\\x.pdf").unwrap();
        assert!(!nested.is_root());
        assert!(!nested.is_drive());
    }
}
