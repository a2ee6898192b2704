//! # BackendProvider Trait
//!
//! Strategy entries of the factory's resolution chain.
//!
//! ## Responsibility
//! - Decide whether a backend owns a resource string (`accepts`)
//! - Build the handle for an accepted string (`create`)
//!
//! The factory asks each provider in order and builds the handle with the
//! first one that accepts. Built-in order is file, FTP, URL; custom
//! providers registered with
//! [`ResourceFactory::register_provider`](crate::ResourceFactory::register_provider)
//! are consulted after them.
//!
//! ## Usage
//!
//! ```rust
//! use std::sync::Arc;
//! use mufs::{BackendProvider, MufsError, ResourceFactory, ResourceHandle};
//!
//! struct Library;
//!
//! impl BackendProvider for Library {
//!     fn name(&self) -> &'static str {
//!         "library"
//!     }
//!
//!     fn accepts(&self, resource: &str) -> bool {
//!         resource.starts_with("library:")
//!     }
//!
//!     fn create(&self, resource: &str, factory: &ResourceFactory) -> Result<ResourceHandle, MufsError> {
//!         Ok(factory.from_bytes(resource, Vec::new()))
//!     }
//! }
//!
//! let factory = ResourceFactory::default();
//! factory.register_provider(Arc::new(Library));
//! assert!(factory.resolve("library:shelf-1").is_some());
//! ```

use crate::{MufsError, ResourceFactory, ResourceHandle};

/// One entry of the resolution chain.
///
/// # Thread Safety
///
/// Providers are shared by every thread that resolves through the factory
/// and must be `Send + Sync`.
///
/// # Object Safety
///
/// Stored as `Arc<dyn BackendProvider>`.
pub trait BackendProvider: Send + Sync {
    /// Short name used in log output.
    fn name(&self) -> &'static str;

    /// Whether this backend owns `resource`. Must be cheap and must not
    /// fail; a `true` here still allows [`create`](Self::create) to reject
    /// the string.
    fn accepts(&self, resource: &str) -> bool;

    /// Build the handle for an accepted string.
    ///
    /// # Errors
    ///
    /// - [`MufsError::InvalidResource`] if the string cannot be parsed
    fn create(&self, resource: &str, factory: &ResourceFactory) -> Result<ResourceHandle, MufsError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backend_provider_is_object_safe() {
        fn _check(_: &dyn BackendProvider) {}
    }
}
