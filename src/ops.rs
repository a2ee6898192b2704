//! # Default Operations
//!
//! Backend-agnostic implementations of copy, move and child listing.
//!
//! The component traits call these from their default methods, and
//! backends with native fast paths call them as the fallback from their
//! own overrides.

use std::io::{self, Write};

use tracing::debug;

use crate::{
    MufsError, Resource, ResourceDir, ResourceFilter, ResourceHandle, ResourceRead, ResourceTransfer,
};

/// Size of the buffer used when streaming between channels.
pub(crate) const COPY_BUFFER_SIZE: usize = 64 * 1024;

/// Stream `source` into `target` through their read and write channels.
///
/// Fails with [`MufsError::AlreadyExists`] before touching the target if
/// it exists and `overwrite` is false. Copying a resource onto itself is a
/// no-op. Both channels are released on every path, including errors.
pub fn default_copy_to<S>(source: &S, target: &dyn Resource, overwrite: bool) -> Result<(), MufsError>
where
    S: ResourceTransfer + ?Sized,
{
    if target.exists() && !overwrite {
        return Err(MufsError::AlreadyExists {
            resource: target.resource_string().to_string(),
            operation: "copy_to",
        });
    }
    if is_same_resource(source, target) {
        return Ok(());
    }

    debug!(
        from = source.resource_string(),
        to = target.resource_string(),
        "streaming copy"
    );

    let result = {
        let mut reader = io::BufReader::with_capacity(COPY_BUFFER_SIZE, source.open_read()?);
        let mut writer = target.open_write(false)?;
        io::copy(&mut reader, &mut writer).and_then(|_| writer.flush())
    };
    target.refresh();
    result.map_err(|e| MufsError::io("copy_to", target.resource_string(), e))
}

/// Copy `source` onto `target`, then delete `source`.
pub fn default_move_to<S>(source: &S, target: &dyn Resource, overwrite: bool) -> Result<(), MufsError>
where
    S: ResourceTransfer + ?Sized,
{
    if overwrite && is_same_resource(source, target) {
        return Ok(());
    }
    source.copy_to(target, overwrite)?;
    source.delete()
}

/// Whether `target` is the resource `source` names.
pub(crate) fn is_same_resource<S>(source: &S, target: &dyn Resource) -> bool
where
    S: ResourceRead + ?Sized,
{
    source.backend() == target.backend() && source.resource_string() == target.resource_string()
}

/// Directories first, then files, each pass naturally sorted by its backend.
pub fn default_list_children<D>(
    dir: &D,
    filter: Option<&ResourceFilter>,
) -> Result<Vec<ResourceHandle>, MufsError>
where
    D: ResourceDir + ?Sized,
{
    let mut children = dir.list_directories(filter)?;
    children.extend(dir.list_files(filter)?);
    Ok(children)
}

/// Apply an optional filter and natural name ordering to one listing pass.
pub(crate) fn filter_and_sort(
    mut handles: Vec<ResourceHandle>,
    filter: Option<&ResourceFilter>,
) -> Vec<ResourceHandle> {
    if let Some(filter) = filter {
        handles.retain(|h| filter(h));
    }
    handles.sort_by(|a, b| crate::natural_cmp(&a.name(), &b.name()));
    handles
}
