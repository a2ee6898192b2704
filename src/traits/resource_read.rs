//! Read-side operations shared by every backend.

use std::io::Read;
use std::time::SystemTime;

use crate::{BackendKind, CachedAttributes, Location, MimeType, MufsError};

/// Identity, existence and content access for a resource.
///
/// # Thread Safety
///
/// Implementations must be `Send + Sync`. Methods use `&self`; anything
/// cached goes through [`attributes`](Self::attributes).
///
/// # Object Safety
///
/// This trait is object-safe and can be used as `dyn ResourceRead`.
pub trait ResourceRead: Send + Sync {
    /// The canonical resource string. This is the identity key in the
    /// factory cache. Directories end with the platform separator.
    fn resource_string(&self) -> &str;

    /// The backend that owns this handle.
    fn backend(&self) -> BackendKind;

    /// Display name (last path segment).
    fn name(&self) -> String;

    /// Per-handle cached state.
    fn attributes(&self) -> &CachedAttributes;

    /// Native location, used by fast-path copy and move.
    fn location(&self) -> Location<'_> {
        Location::Opaque
    }

    /// Whether the resource currently exists.
    fn exists(&self) -> bool;

    /// Whether the resource is a directory (cached per handle).
    fn is_directory(&self) -> bool;

    /// Whether this is a filesystem root.
    fn is_root(&self) -> bool {
        false
    }

    /// Whether this is the root of a lettered drive such as `C:\`.
    fn is_drive(&self) -> bool {
        false
    }

    /// Whether this is a removable floppy drive root.
    fn is_floppy_drive(&self) -> bool {
        false
    }

    /// Size in bytes, or `Ok(None)` when the backend cannot know it.
    ///
    /// # Errors
    ///
    /// - [`MufsError::NotFound`] if the resource does not exist
    fn size(&self) -> Result<Option<u64>, MufsError>;

    /// Last modification time.
    ///
    /// # Errors
    ///
    /// - [`MufsError::NotFound`] if the resource does not exist
    fn modified(&self) -> Result<SystemTime, MufsError>;

    /// Open a buffered read channel.
    ///
    /// # Errors
    ///
    /// - [`MufsError::NotFound`] if the resource does not exist
    /// - [`MufsError::StreamConsumed`] on a second pass over a stream handle
    fn open_read(&self) -> Result<Box<dyn Read + Send>, MufsError>;

    /// Read the whole content.
    fn read_bytes(&self) -> Result<Vec<u8>, MufsError> {
        let mut reader = self.open_read()?;
        let mut data = Vec::new();
        reader
            .read_to_end(&mut data)
            .map_err(|e| MufsError::io("read", self.resource_string(), e))?;
        Ok(data)
    }

    /// Read at most `limit` leading bytes.
    fn read_bytes_limited(&self, limit: usize) -> Result<Vec<u8>, MufsError> {
        let reader = self.open_read()?;
        let mut data = Vec::with_capacity(limit.min(64 * 1024));
        reader
            .take(limit as u64)
            .read_to_end(&mut data)
            .map_err(|e| MufsError::io("read", self.resource_string(), e))?;
        Ok(data)
    }

    /// Read the whole content as UTF-8.
    ///
    /// # Errors
    ///
    /// - [`MufsError::Io`] with `InvalidData` if the content is not UTF-8
    fn read_string(&self) -> Result<String, MufsError> {
        let bytes = self.read_bytes()?;
        String::from_utf8(bytes).map_err(|e| {
            MufsError::io(
                "read_string",
                self.resource_string(),
                std::io::Error::new(std::io::ErrorKind::InvalidData, e),
            )
        })
    }

    /// MIME classification, cached on the handle.
    ///
    /// The extension table is always consulted. With `force`, a magic-byte
    /// probe of the content runs when the name is inconclusive.
    fn mime_type(&self, force: bool) -> Option<MimeType> {
        crate::mime::cached_mime_type(self, force)
    }
}
