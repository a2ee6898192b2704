//! Core types shared by every resource backend.

use std::fmt;
use std::path::Path;
use std::sync::OnceLock;

use parking_lot::Mutex;

use crate::backends::ftp::FtpEndpoint;
use crate::ResourceHandle;

/// Which storage substrate a handle lives on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum BackendKind {
    /// Local disk.
    Filesystem,
    /// FTP server.
    Ftp,
    /// HTTP(S) URL.
    Url,
    /// A single caller-supplied input stream or byte buffer.
    Stream,
    /// Synthetic, read-only composite.
    Static,
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tag = match self {
            BackendKind::Filesystem => "FILESYSTEM",
            BackendKind::Ftp => "FTP",
            BackendKind::Url => "URL",
            BackendKind::Stream => "STREAM",
            BackendKind::Static => "STATIC",
        };
        f.write_str(tag)
    }
}

/// A `type/subtype` MIME token such as `image/jpeg`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct MimeType(String);

impl MimeType {
    /// Create from a MIME string. The value is lower-cased.
    pub fn new(mime: impl AsRef<str>) -> Self {
        Self(mime.as_ref().to_ascii_lowercase())
    }

    /// The MIME string.
    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The part before the slash (`image` for `image/png`).
    pub fn top_level(&self) -> &str {
        self.0.split('/').next().unwrap_or_default()
    }
}

impl fmt::Display for MimeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for MimeType {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

/// Attribute a handle list can be ordered by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum SortKey {
    /// Display name.
    #[default]
    Name,
    /// Size in bytes.
    Size,
    /// Last modification time.
    Modified,
    /// Detected MIME type.
    Mime,
}

/// Where a handle's bytes natively live.
///
/// Backends inspect the *target's* location to decide whether a fast
/// same-substrate copy or move applies, without downcasting.
#[derive(Debug, Clone, Copy)]
pub enum Location<'a> {
    /// A path on the local filesystem.
    Local(&'a Path),
    /// A path on an FTP server.
    Ftp {
        /// Server and credentials.
        endpoint: &'a FtpEndpoint,
        /// Absolute remote path.
        path: &'a str,
    },
    /// No native location (URL, stream, virtual).
    Opaque,
}

/// Predicate used to filter child listings.
pub type ResourceFilter = dyn Fn(&ResourceHandle) -> bool + Send + Sync;

/// Cached MIME classification.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) enum MimeState {
    /// Classification was never attempted.
    #[default]
    NotTried,
    /// Classification ran. `forced` records whether content sniffing was allowed.
    Known {
        mime: Option<MimeType>,
        forced: bool,
    },
}

/// Lazily computed per-handle state.
///
/// Mime and directory flags are reset by [`refresh`](crate::ResourceWrite::refresh);
/// the parent string never changes for a given resource string.
#[derive(Debug, Default)]
pub struct CachedAttributes {
    mime: Mutex<MimeState>,
    directory: Mutex<Option<bool>>,
    parent: OnceLock<Option<String>>,
}

impl CachedAttributes {
    /// Empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Cached directory flag, computing it with `probe` on first use.
    pub fn directory_or(&self, probe: impl FnOnce() -> bool) -> bool {
        let mut slot = self.directory.lock();
        *slot.get_or_insert_with(probe)
    }

    /// Overwrite the directory flag (used when a listing already told us).
    pub fn set_directory(&self, is_dir: bool) {
        *self.directory.lock() = Some(is_dir);
    }

    /// Cached parent resource string, computing it once.
    pub fn parent_or(&self, compute: impl FnOnce() -> Option<String>) -> Option<&str> {
        self.parent.get_or_init(compute).as_deref()
    }

    pub(crate) fn mime_state(&self) -> MimeState {
        self.mime.lock().clone()
    }

    pub(crate) fn set_mime_state(&self, state: MimeState) {
        *self.mime.lock() = state;
    }

    /// Drop cached mime and directory state.
    pub fn invalidate(&self) {
        *self.mime.lock() = MimeState::NotTried;
        *self.directory.lock() = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backend_kind_display_uses_tags() {
        assert_eq!(BackendKind::Filesystem.to_string(), "FILESYSTEM");
        assert_eq!(BackendKind::Static.to_string(), "STATIC");
    }

    #[test]
    fn mime_type_lowercases() {
        let mime = MimeType::new("Image/PNG");
        assert_eq!(mime.as_str(), "image/png");
        assert_eq!(mime.top_level(), "image");
    }

    #[test]
    fn directory_flag_is_cached_until_invalidated() {
        let attrs = CachedAttributes::new();
        assert!(attrs.directory_or(|| true));
        assert!(attrs.directory_or(|| false));
        attrs.invalidate();
        assert!(!attrs.directory_or(|| false));
    }

    #[test]
    fn parent_is_computed_once() {
        let attrs = CachedAttributes::new();
        assert_eq!(attrs.parent_or(|| Some("/a/".into())), Some("/a/"));
        assert_eq!(attrs.parent_or(|| Some("/b/".into())), Some("/a/"));
    }

    #[test]
    fn invalidate_resets_mime() {
        let attrs = CachedAttributes::new();
        attrs.set_mime_state(MimeState::Known {
            mime: None,
            forced: true,
        });
        attrs.invalidate();
        assert_eq!(attrs.mime_state(), MimeState::NotTried);
    }

    #[test]
    fn types_are_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<BackendKind>();
        assert_send_sync::<MimeType>();
        assert_send_sync::<CachedAttributes>();
        assert_send_sync::<SortKey>();
    }
}
