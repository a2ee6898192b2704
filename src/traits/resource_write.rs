//! Write-side operations.

use std::io::Write;

use crate::{MufsError, ResourceRead};

/// Mutating operations on a resource.
///
/// Read-only backends (URL, stream, virtual) return
/// [`MufsError::NotSupported`] rather than silently doing nothing.
pub trait ResourceWrite: ResourceRead {
    /// Open a write channel. With `append`, writes go to the end of the
    /// existing content; otherwise the content is replaced.
    ///
    /// Callers must `flush` the channel to observe upload errors on
    /// backends that buffer.
    ///
    /// # Errors
    ///
    /// - [`MufsError::NotSupported`] for read-only backends
    fn open_write(&self, append: bool) -> Result<Box<dyn Write + Send>, MufsError>;

    /// Replace the content with `data`.
    fn write_bytes(&self, data: &[u8]) -> Result<(), MufsError> {
        let mut writer = self.open_write(false)?;
        writer
            .write_all(data)
            .and_then(|_| writer.flush())
            .map_err(|e| MufsError::io("write", self.resource_string(), e))?;
        drop(writer);
        self.refresh();
        Ok(())
    }

    /// Replace the content with a UTF-8 string.
    fn write_string(&self, text: &str) -> Result<(), MufsError> {
        self.write_bytes(text.as_bytes())
    }

    /// Delete the resource. Directories are removed with their content.
    ///
    /// # Errors
    ///
    /// - [`MufsError::DeleteFailed`] if the resource is still present afterwards
    /// - [`MufsError::NotSupported`] for read-only backends
    fn delete(&self) -> Result<(), MufsError>;

    /// Create this resource as a directory, including missing parents.
    fn mkdirs(&self) -> Result<(), MufsError>;

    /// Move the resource to the platform trash.
    ///
    /// # Errors
    ///
    /// - [`MufsError::NotSupported`] where no trash facility exists
    fn move_to_trash(&self) -> Result<(), MufsError> {
        Err(MufsError::not_supported("move_to_trash", self.backend()))
    }

    /// Drop cached mime and directory state.
    fn refresh(&self) {
        self.attributes().invalidate();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resource_write_is_object_safe() {
        fn _check(_: &dyn ResourceWrite) {}
    }
}
