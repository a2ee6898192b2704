//! # Resource Traits
//!
//! The capability interface every backend implements.
//!
//! ## Trait Layers
//!
//! The handle contract is split into four component traits. A type that
//! implements all four gets the composite [`Resource`] trait for free:
//!
//! ```text
//! ResourceRead + ResourceWrite + ResourceDir + ResourceTransfer = Resource
//! ```
//!
//! | Trait | Covers |
//! |-------|--------|
//! | [`ResourceRead`] | identity, existence, size, read channel, MIME |
//! | [`ResourceWrite`] | write channel, delete, mkdirs, trash, refresh |
//! | [`ResourceDir`] | child listing and parent lookup |
//! | [`ResourceTransfer`] | copy and move between handles |
//!
//! Default behaviour (streaming copy, copy-then-delete move, merged
//! listing) lives in free functions in [`ops`](crate::ops) so backends
//! can call them explicitly from their own overrides.
//!
//! ## Thread Safety
//!
//! All traits require `Send + Sync` and take `&self`. Cached per-handle
//! state lives behind interior mutability in
//! [`CachedAttributes`](crate::CachedAttributes).
//!
//! ## Object Safety
//!
//! All traits are object safe. Handles are passed around as
//! [`ResourceHandle`](crate::ResourceHandle) (`Arc<dyn Resource>`):
//!
//! ```rust
//! use mufs::{Resource, ResourceRead};
//!
//! fn describe(resource: &dyn Resource) -> String {
//!     format!("{} ({})", resource.name(), resource.backend())
//! }
//! ```

mod resource_dir;
mod resource_read;
mod resource_transfer;
mod resource_write;

pub use resource_dir::ResourceDir;
pub use resource_read::ResourceRead;
pub use resource_transfer::ResourceTransfer;
pub use resource_write::ResourceWrite;

/// A complete resource handle.
///
/// Automatically implemented for any type implementing all four component
/// traits. You never implement `Resource` directly.
///
/// # Example
///
/// ```rust,no_run
/// use mufs::{ResourceFactory, ResourceRead, ResourceTransfer};
///
/// let factory = ResourceFactory::default();
/// let source = factory.resolve("/tmp/report.pdf").unwrap();
/// let target = factory.resolve("/tmp/backup/report.pdf").unwrap();
/// source.copy_to(&*target, false)?;
/// assert_eq!(target.mime_type(false).unwrap().as_str(), "application/pdf");
/// # Ok::<(), mufs::MufsError>(())
/// ```
pub trait Resource: ResourceRead + ResourceWrite + ResourceDir + ResourceTransfer {}

// Blanket implementation - any type implementing the four components gets Resource
impl<T: ResourceRead + ResourceWrite + ResourceDir + ResourceTransfer> Resource for T {}
