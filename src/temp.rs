//! Temporary resources deleted when the factory shuts down.

use parking_lot::Mutex;
use tracing::{debug, warn};

use crate::ResourceHandle;

/// Handles to delete at shutdown.
///
/// Deletion failures are kept and retried on the next [`cleanup`](Self::cleanup).
#[derive(Default)]
pub struct TemporaryResourceRegistry {
    entries: Mutex<Vec<ResourceHandle>>,
}

impl TemporaryResourceRegistry {
    /// Empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Track `handle` for deletion.
    pub fn register(&self, handle: ResourceHandle) {
        debug!(resource = handle.resource_string(), "registered temporary resource");
        self.entries.lock().push(handle);
    }

    /// Stop tracking the resource with this string, typically because its
    /// owner deleted it.
    pub fn forget(&self, resource: &str) -> bool {
        let mut entries = self.entries.lock();
        let before = entries.len();
        entries.retain(|h| h.resource_string() != resource);
        entries.len() != before
    }

    /// Number of tracked resources.
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    /// Whether nothing is tracked.
    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    /// Delete every tracked resource.
    ///
    /// Runs a second pass over the failures of the first. Whatever still
    /// fails stays registered and is logged; the number of survivors is
    /// returned.
    pub fn cleanup(&self) -> usize {
        let pending = std::mem::take(&mut *self.entries.lock());
        if pending.is_empty() {
            return 0;
        }

        let survivors = delete_all(pending);
        let survivors = if survivors.is_empty() {
            survivors
        } else {
            delete_all(survivors)
        };

        for handle in &survivors {
            warn!(
                resource = handle.resource_string(),
                "temporary resource could not be deleted, left on disk"
            );
        }
        let count = survivors.len();
        self.entries.lock().extend(survivors);
        count
    }
}

fn delete_all(handles: Vec<ResourceHandle>) -> Vec<ResourceHandle> {
    handles
        .into_iter()
        .filter(|handle| {
            if !handle.exists() {
                return false;
            }
            match handle.delete() {
                Ok(()) => false,
                Err(e) => {
                    debug!(resource = handle.resource_string(), error = %e, "temporary delete failed");
                    true
                }
            }
        })
        .collect()
}

impl std::fmt::Debug for TemporaryResourceRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TemporaryResourceRegistry")
            .field("len", &self.len())
            .finish()
    }
}
