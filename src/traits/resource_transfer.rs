//! Copy and move between handles.

use crate::{MufsError, Resource, ResourceDir, ResourceWrite};

/// Copy and move.
///
/// The defaults stream bytes through a read and a write channel, which
/// works across any pair of backends. Backends with a native fast path
/// override these and inspect `target.location()` to decide whether it
/// applies.
pub trait ResourceTransfer: ResourceWrite + ResourceDir {
    /// Copy this resource onto `target`.
    ///
    /// # Errors
    ///
    /// - [`MufsError::AlreadyExists`] if `target` exists and `overwrite` is false;
    ///   the target is left untouched
    fn copy_to(&self, target: &dyn Resource, overwrite: bool) -> Result<(), MufsError> {
        crate::ops::default_copy_to(self, target, overwrite)
    }

    /// Move this resource onto `target`.
    ///
    /// The default copies and then deletes the source.
    fn move_to(&self, target: &dyn Resource, overwrite: bool) -> Result<(), MufsError> {
        crate::ops::default_move_to(self, target, overwrite)
    }
}
