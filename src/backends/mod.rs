//! Built-in backends.
//!
//! | Module | Backend | Resolved from |
//! |--------|---------|---------------|
//! | [`file`] | [`BackendKind::Filesystem`](crate::BackendKind::Filesystem) | absolute paths, `file:` URIs |
//! | [`ftp`] | [`BackendKind::Ftp`](crate::BackendKind::Ftp) | `ftp://` URLs |
//! | [`url`] | [`BackendKind::Url`](crate::BackendKind::Url) | `http://` and `https://` URLs |
//! | [`stream`] | [`BackendKind::Stream`](crate::BackendKind::Stream) | [`ResourceFactory::from_bytes`](crate::ResourceFactory::from_bytes) |
//! | [`virtual_fs`] | [`BackendKind::Static`](crate::BackendKind::Static) | [`ResourceFactory::virtual_directory`](crate::ResourceFactory::virtual_directory) |

pub mod file;
pub mod ftp;
pub mod stream;
pub mod url;
pub mod virtual_fs;

mod trash;
