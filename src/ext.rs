//! # Extension Traits
//!
//! Convenience methods for resource handles.
//!
//! ## Overview
//!
//! [`ResourceExt`] provides commonly-needed utility methods that aren't part
//! of the core trait hierarchy. They are default methods with a blanket
//! implementation, so every handle gets them for free.
//!
//! ## Available Methods
//!
//! | Method | Description |
//! |--------|-------------|
//! | [`is_file`](ResourceExt::is_file) | Exists and is not a directory |
//! | [`file_extension`](ResourceExt::file_extension) | Extension, cross-checked against content |
//! | [`base_name`](ResourceExt::base_name) | Name without its extension |
//! | [`compare_by`](ResourceExt::compare_by) | Natural ordering by a [`SortKey`] |
//!
//! ## JSON Support (Feature-Gated)
//!
//! With the `serde` feature enabled, additional methods are available:
//!
//! | Method | Description |
//! |--------|-------------|
//! | `read_json` | Read and deserialize JSON content |
//! | `write_json` | Serialize and write JSON content |
//!
//! Enable with:
//! ```toml
//! [dependencies]
//! mufs = { version = "0.1", features = ["serde"] }
//! ```

use std::cmp::Ordering;

use crate::{Resource, ResourceRead, SortKey};

/// Extension methods for every [`Resource`].
pub trait ResourceExt: Resource {
    /// Whether the resource exists and is not a directory.
    fn is_file(&self) -> bool {
        self.exists() && !self.is_directory()
    }

    /// The lower-cased file extension, without the dot.
    ///
    /// An extension the MIME table does not know is not trusted: the content
    /// is sniffed and, if it identifies a known format, that format's
    /// canonical extension is returned instead. `report.v2` holding HTML
    /// yields `html`.
    ///
    /// Directories have no extension.
    fn file_extension(&self) -> Option<String> {
        if self.is_directory() {
            return None;
        }
        let apparent = split_extension(&self.name()).map(|(_, ext)| ext.to_lowercase());
        if crate::mime::from_name(self.resource_string()).is_some() {
            return apparent;
        }
        self.mime_type(true)
            .and_then(|mime| crate::mime::extension_for(&mime))
            .map(str::to_string)
            .or(apparent)
    }

    /// The name without its extension.
    ///
    /// Only strips a suffix that [`file_extension`](Self::file_extension)
    /// agrees with.
    fn base_name(&self) -> String {
        let name = self.name();
        let Some((stem, ext)) = split_extension(&name) else {
            return name;
        };
        match self.file_extension() {
            Some(trusted) if trusted == ext.to_lowercase() => stem.to_string(),
            _ => name,
        }
    }

    /// Natural-order comparison with `other` by `key`.
    fn compare_by<R: ResourceRead + ?Sized>(&self, other: &R, key: SortKey) -> Ordering {
        crate::natural::compare_by_key(self, other, key)
    }
}

// Blanket implementation - every handle gets ResourceExt for free
impl<R: Resource + ?Sized> ResourceExt for R {}

/// Stem and suffix around the last dot, unless the dot starts the name.
fn split_extension(name: &str) -> Option<(&str, &str)> {
    name.rsplit_once('.')
        .filter(|(stem, ext)| !stem.is_empty() && !ext.is_empty())
}

// =============================================================================
// JSON Support (Feature-Gated)
// =============================================================================

#[cfg(feature = "serde")]
mod json {
    use super::*;
    use crate::{MufsError, ResourceWrite};
    use serde::{Serialize, de::DeserializeOwned};

    /// JSON helpers over the read and write channels.
    pub trait ResourceExtJson: Resource {
        /// Read and deserialize the content.
        fn read_json<T: DeserializeOwned>(&self) -> Result<T, MufsError> {
            let data = self.read_string()?;
            serde_json::from_str(&data).map_err(|e| MufsError::Deserialization(e.to_string()))
        }

        /// Serialize `value` and replace the content with it.
        fn write_json<T: Serialize>(&self, value: &T) -> Result<(), MufsError> {
            let json = serde_json::to_string_pretty(value)
                .map_err(|e| MufsError::Serialization(e.to_string()))?;
            self.write_bytes(json.as_bytes())
        }
    }

    // Blanket implementation
    impl<R: Resource + ?Sized> ResourceExtJson for R {}
}

#[cfg(feature = "serde")]
pub use json::ResourceExtJson;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ResourceFactory;

    #[test]
    fn known_extension_is_trusted() {
        let factory = ResourceFactory::default();
        let handle = factory.from_bytes("Cover.JPG", b"<html></html>".to_vec());
        assert_eq!(handle.file_extension().as_deref(), Some("jpg"));
        assert_eq!(handle.base_name(), "Cover");
    }

    #[test]
    fn unknown_extension_is_cross_checked() {
        let factory = ResourceFactory::default();
        let handle = factory.from_bytes("report.v2", b"<!DOCTYPE html><html></html>".to_vec());
        assert_eq!(handle.file_extension().as_deref(), Some("html"));
        assert_eq!(handle.base_name(), "report.v2");
    }

    #[test]
    fn unknown_extension_and_content() {
        let factory = ResourceFactory::default();
        let handle = factory.from_bytes("data.v2", vec![0, 1, 2, 3]);
        assert_eq!(handle.file_extension().as_deref(), Some("v2"));
        assert_eq!(handle.base_name(), "data");
    }

    #[test]
    fn cross_check_is_stable_across_calls() {
        let factory = ResourceFactory::default();
        let handle = factory.from_bytes("report.v2", b"<!DOCTYPE html><html></html>".to_vec());
        for _ in 0..3 {
            assert_eq!(handle.file_extension().as_deref(), Some("html"));
        }
        assert_eq!(handle.mime_type(false).unwrap().as_str(), "text/html");
        assert_eq!(handle.file_extension().as_deref(), Some("html"));
    }

    #[test]
    fn case_folding_that_changes_length_keeps_the_stem() {
        let factory = ResourceFactory::default();
        // KELVIN SIGN lower-cases to a one-byte 'k'.
        let handle = factory.from_bytes("ab.\u{212A}", vec![0, 1, 2, 3]);
        assert_eq!(handle.file_extension().as_deref(), Some("k"));
        assert_eq!(handle.base_name(), "ab");
    }

    #[test]
    fn dotfiles_have_no_extension() {
        assert_eq!(split_extension(".profile"), None);
        assert_eq!(split_extension("archive.tar.gz"), Some(("archive.tar", "gz")));
        assert_eq!(split_extension("README"), None);
        assert_eq!(split_extension("trailing."), None);
    }

    #[test]
    fn compare_by_name() {
        let factory = ResourceFactory::default();
        let a = factory.from_bytes("page2", Vec::new());
        let b = factory.from_bytes("page10", Vec::new());
        assert_eq!(a.compare_by(&*b, SortKey::Name), Ordering::Less);
    }

    #[test]
    fn is_file_for_virtual_directory() {
        let factory = ResourceFactory::default();
        let dir = factory.virtual_directory("shelf", Vec::new());
        assert!(!dir.is_file());
        assert_eq!(dir.file_extension(), None);
    }

    #[cfg(feature = "serde")]
    #[test]
    fn json_round_trip_on_disk() {
        let dir = tempfile::tempdir().unwrap();
        let factory = ResourceFactory::default();
        let handle = factory.resolve_path(&dir.path().join("settings.json")).unwrap();
        handle.write_json(&vec![1, 2, 3]).unwrap();
        let back: Vec<u32> = handle.read_json().unwrap();
        assert_eq!(back, [1, 2, 3]);
    }
}
