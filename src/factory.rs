//! # Resource Factory
//!
//! The composition root. A [`ResourceFactory`] owns the handle cache, the
//! backend provider chain, the temporary-resource registry, the FTP pool
//! registry and the HTTP client. Handles keep only a weak link back to it.
//!
//! ## Resolution
//!
//! 1. Look the exact string up in the cache.
//! 2. Ask each provider in order (file, FTP, URL, then custom ones)
//!    whether it accepts the string; the first one that does builds the
//!    handle.
//! 3. Cache the handle under the requested string and its canonical
//!    string, and return it.
//!
//! [`resolve`](ResourceFactory::resolve) swallows failures into `None`
//! because asking several backends "is this yours?" is speculative by
//! nature; [`try_resolve`](ResourceFactory::try_resolve) returns the cause.
//!
//! ## Lifecycle
//!
//! [`shutdown`](ResourceFactory::shutdown) deletes registered temporary
//! resources, closes every FTP pool and empties the cache. Dropping the
//! last clone of a factory runs it too.
//!
//! ```rust
//! use mufs::{ResourceFactory, ResourceRead, ResourceWrite};
//!
//! let factory = ResourceFactory::default();
//! let scratch = factory.temporary_file(".txt")?;
//! scratch.write_string("draft")?;
//! assert_eq!(scratch.read_string()?, "draft");
//!
//! let path = scratch.resource_string().to_string();
//! factory.shutdown();
//! assert!(!std::path::Path::new(&path).exists());
//! # Ok::<(), mufs::MufsError>(())
//! ```

use std::collections::HashMap;
use std::fs;
use std::io::Read;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::{Mutex, RwLock};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::backends::file::FileProvider;
use crate::backends::ftp::{ConnectionPool, FtpConnector, FtpEndpoint, FtpProvider, SuppaFtpConnector};
use crate::backends::stream::StreamResource;
use crate::backends::url::UrlProvider;
use crate::backends::virtual_fs::VirtualResource;
use crate::cache::HandleCache;
use crate::temp::TemporaryResourceRegistry;
use crate::{BackendProvider, MufsConfig, MufsError, Resource, ResourceHandle};

/// Extension used for temporary resources when the caller gives none.
pub const DEFAULT_TEMP_EXTENSION: &str = ".tmp";

struct FactoryInner {
    config: MufsConfig,
    cache: HandleCache,
    providers: RwLock<Vec<Arc<dyn BackendProvider>>>,
    temporary: TemporaryResourceRegistry,
    connector: Arc<dyn FtpConnector>,
    pools: Mutex<HashMap<FtpEndpoint, Arc<ConnectionPool>>>,
    http: Mutex<Option<reqwest::blocking::Client>>,
    closed: AtomicBool,
}

impl FactoryInner {
    fn shutdown(&self) {
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        let left = self.temporary.cleanup();
        let pools: Vec<_> = self.pools.lock().drain().map(|(_, pool)| pool).collect();
        for pool in &pools {
            pool.close();
        }
        self.cache.clear();
        info!(
            temporary_left = left,
            pools_closed = pools.len(),
            "resource factory shut down"
        );
    }
}

impl Drop for FactoryInner {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Weak back-reference from a handle to the factory that made it.
#[derive(Clone)]
pub(crate) struct FactoryLink(Weak<FactoryInner>);

impl FactoryLink {
    /// The factory, if it is still alive.
    pub(crate) fn get(&self) -> Option<ResourceFactory> {
        self.0.upgrade().map(|inner| ResourceFactory { inner })
    }

    /// The factory, or [`MufsError::FactoryClosed`].
    pub(crate) fn upgrade(&self) -> Result<ResourceFactory, MufsError> {
        self.get().ok_or(MufsError::FactoryClosed)
    }
}

/// Resolves resource strings to handles. Cheap to clone; clones share
/// every cache and pool.
#[derive(Clone)]
pub struct ResourceFactory {
    inner: Arc<FactoryInner>,
}

impl Default for ResourceFactory {
    fn default() -> Self {
        Self::new(MufsConfig::default())
    }
}

impl ResourceFactory {
    /// Factory with the built-in providers and the `suppaftp` connector.
    pub fn new(config: MufsConfig) -> Self {
        Self::with_ftp_connector(config, Arc::new(SuppaFtpConnector))
    }

    /// Factory whose FTP pools open sessions through `connector`.
    pub fn with_ftp_connector(config: MufsConfig, connector: Arc<dyn FtpConnector>) -> Self {
        let providers: Vec<Arc<dyn BackendProvider>> = vec![
            Arc::new(FileProvider),
            Arc::new(FtpProvider),
            Arc::new(UrlProvider),
        ];
        Self {
            inner: Arc::new(FactoryInner {
                cache: HandleCache::new(&config.cache),
                config,
                providers: RwLock::new(providers),
                temporary: TemporaryResourceRegistry::new(),
                connector,
                pools: Mutex::new(HashMap::new()),
                http: Mutex::new(None),
                closed: AtomicBool::new(false),
            }),
        }
    }

    /// The configuration this factory was built with.
    pub fn config(&self) -> &MufsConfig {
        &self.inner.config
    }

    /// The resolved-handle cache.
    pub fn cache(&self) -> &HandleCache {
        &self.inner.cache
    }

    /// The temporary-resource registry.
    pub fn temporary(&self) -> &TemporaryResourceRegistry {
        &self.inner.temporary
    }

    /// Whether [`shutdown`](Self::shutdown) has run.
    pub fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::Acquire)
    }

    /// Append a provider after the built-in ones.
    pub fn register_provider(&self, provider: Arc<dyn BackendProvider>) {
        debug!(provider = provider.name(), "registered backend provider");
        self.inner.providers.write().push(provider);
    }

    /// Resolve a resource string, or `None` if no backend can own it.
    ///
    /// Failures are logged, not returned. Use
    /// [`try_resolve`](Self::try_resolve) for the cause.
    pub fn resolve(&self, resource: &str) -> Option<ResourceHandle> {
        match self.try_resolve(resource) {
            Ok(handle) => Some(handle),
            Err(e @ MufsError::Unresolvable { .. }) => {
                debug!(resource, error = %e, "no backend accepts resource");
                None
            }
            Err(e) => {
                warn!(resource, error = %e, "resource could not be resolved");
                None
            }
        }
    }

    /// Resolve a resource string.
    ///
    /// Two resolutions of the same string return the same instance while
    /// the handle stays cached.
    ///
    /// # Errors
    ///
    /// - [`MufsError::Unresolvable`] if no provider accepts the string
    /// - [`MufsError::InvalidResource`] if the accepting provider cannot parse it
    /// - [`MufsError::FactoryClosed`] after [`shutdown`](Self::shutdown)
    pub fn try_resolve(&self, resource: &str) -> Result<ResourceHandle, MufsError> {
        if self.is_closed() {
            return Err(MufsError::FactoryClosed);
        }
        if let Some(handle) = self.inner.cache.get(resource) {
            return Ok(handle);
        }

        let providers = self.inner.providers.read().clone();
        let provider = providers
            .iter()
            .find(|p| !resource.is_empty() && p.accepts(resource))
            .ok_or_else(|| MufsError::Unresolvable {
                resource: resource.to_string(),
            })?;

        let handle = provider.create(resource, self)?;
        debug!(
            resource,
            provider = provider.name(),
            canonical = handle.resource_string(),
            "resolved"
        );
        let canonical = handle.resource_string().to_string();
        Ok(self.inner.cache.insert_or_get(&[resource, &canonical], handle))
    }

    /// Resolve a local path.
    ///
    /// # Errors
    ///
    /// - [`MufsError::InvalidResource`] if the path is not valid UTF-8
    pub fn resolve_path(&self, path: &Path) -> Result<ResourceHandle, MufsError> {
        let absolute = std::path::absolute(path)
            .map_err(|e| MufsError::io("resolve_path", path.display().to_string(), e))?;
        let resource = absolute.to_str().ok_or_else(|| MufsError::InvalidResource {
            resource: absolute.display().to_string(),
            reason: "path is not valid UTF-8".to_string(),
        })?;
        self.try_resolve(resource)
    }

    /// A fresh, uncached stream handle over `bytes`.
    pub fn from_bytes(&self, name: impl Into<String>, bytes: impl Into<Vec<u8>>) -> ResourceHandle {
        Arc::new(StreamResource::from_bytes(name, bytes))
    }

    /// A fresh, uncached stream handle over `reader`. It can be read once.
    pub fn from_stream(
        &self,
        name: impl Into<String>,
        reader: impl Read + Send + 'static,
    ) -> ResourceHandle {
        Arc::new(StreamResource::from_reader(name, reader))
    }

    /// A read-only directory listing exactly `children`.
    pub fn virtual_directory(
        &self,
        name: impl Into<String>,
        children: Vec<ResourceHandle>,
    ) -> ResourceHandle {
        Arc::new(VirtualResource::directory(name, children))
    }

    /// A read-only file whose content comes from `loader`.
    pub fn virtual_file(
        &self,
        name: impl Into<String>,
        loader: impl Fn() -> Result<Vec<u8>, MufsError> + Send + Sync + 'static,
    ) -> ResourceHandle {
        Arc::new(VirtualResource::file(name, loader))
    }

    /// Create an empty temporary file, deleted at shutdown.
    ///
    /// The name is a random token plus `extension` (`.tmp` when empty).
    pub fn temporary_file(&self, extension: &str) -> Result<ResourceHandle, MufsError> {
        let path = self.temporary_path(extension)?;
        fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .map_err(|e| MufsError::io("temporary_file", path.display().to_string(), e))?;
        self.register_temporary(&path)
    }

    /// Create an empty temporary directory, deleted with its content at shutdown.
    pub fn temporary_folder(&self, extension: &str) -> Result<ResourceHandle, MufsError> {
        let path = self.temporary_path(extension)?;
        fs::create_dir(&path)
            .map_err(|e| MufsError::io("temporary_folder", path.display().to_string(), e))?;
        self.register_temporary(&path)
    }

    fn temporary_path(&self, extension: &str) -> Result<std::path::PathBuf, MufsError> {
        let dir = self.inner.config.temp_dir();
        fs::create_dir_all(&dir)
            .map_err(|e| MufsError::io("create temp dir", dir.display().to_string(), e))?;
        let extension = match extension {
            "" => DEFAULT_TEMP_EXTENSION.to_string(),
            ext if ext.starts_with('.') => ext.to_string(),
            ext => format!(".{ext}"),
        };
        Ok(dir.join(format!("{}{extension}", Uuid::new_v4().simple())))
    }

    fn register_temporary(&self, path: &Path) -> Result<ResourceHandle, MufsError> {
        let handle = self.resolve_path(path)?;
        handle.refresh();
        self.inner.temporary.register(Arc::clone(&handle));
        Ok(handle)
    }

    /// A handle next to `handle` whose name is not taken yet.
    ///
    /// Candidates are `base[_addition].ext`, then `base[_addition]_1.ext`,
    /// `_2`, ... where `base` is the name without extension and without
    /// any trailing `_N` counter. `extension` replaces the original one.
    ///
    /// # Errors
    ///
    /// - [`MufsError::NotSupported`] if the handle has no parent
    pub fn unique_sibling(
        &self,
        handle: &ResourceHandle,
        addition: Option<&str>,
        extension: Option<&str>,
    ) -> Result<ResourceHandle, MufsError> {
        let parent = handle
            .parent()
            .ok_or_else(|| MufsError::not_supported("unique_sibling", handle.backend()))?;

        let name = handle.name();
        let (stem, original_ext) = match name.rsplit_once('.') {
            Some((stem, ext)) if !stem.is_empty() => (stem, Some(ext)),
            _ => (name.as_str(), None),
        };
        let extension = extension
            .map(|e| e.trim_start_matches('.'))
            .or(original_ext)
            .filter(|e| !e.is_empty())
            .map(|e| format!(".{e}"))
            .unwrap_or_default();

        let mut base = strip_counter(stem).to_string();
        if let Some(addition) = addition.filter(|a| !a.is_empty()) {
            base = format!("{base}_{addition}");
        }

        for counter in 0u32.. {
            let candidate = match counter {
                0 => format!("{base}{extension}"),
                n => format!("{base}_{n}{extension}"),
            };
            let sibling = self.try_resolve(&format!("{}{candidate}", parent.resource_string()))?;
            if !sibling.exists() {
                return Ok(sibling);
            }
        }
        Err(MufsError::AlreadyExists {
            resource: handle.resource_string().to_string(),
            operation: "unique_sibling",
        })
    }

    /// Retry deleting temporary resources whose earlier deletion failed.
    /// Returns how many are still left.
    pub fn flush_temporary(&self) -> usize {
        self.inner.temporary.cleanup()
    }

    /// Delete temporary resources, close FTP pools and empty the cache.
    ///
    /// Resolution fails with [`MufsError::FactoryClosed`] afterwards.
    /// Calling it again does nothing.
    pub fn shutdown(&self) {
        self.inner.shutdown();
    }

    pub(crate) fn link(&self) -> FactoryLink {
        FactoryLink(Arc::downgrade(&self.inner))
    }

    pub(crate) fn forget_temporary(&self, resource: &str) {
        if self.inner.temporary.forget(resource) {
            debug!(resource, "temporary resource deleted by its owner");
        }
    }

    /// Cache `spelling` as a second key for `instance`, which is cached
    /// under `known`. Does nothing if `known` maps to another handle.
    pub(crate) fn alias(&self, known: &str, spelling: &str, instance: &dyn Resource) {
        let Some(handle) = self.inner.cache.get(known) else {
            return;
        };
        if std::ptr::addr_eq(Arc::as_ptr(&handle), std::ptr::from_ref(instance)) {
            debug!(known, spelling, "canonical spelling changed");
            self.inner.cache.insert_or_get(&[known, spelling], handle);
        }
    }

    /// The shared pool for `endpoint`, created on first use.
    pub(crate) fn ftp_pool(&self, endpoint: &FtpEndpoint) -> Arc<ConnectionPool> {
        let mut pools = self.inner.pools.lock();
        let pool = pools.entry(endpoint.clone()).or_insert_with(|| {
            debug!(endpoint = %endpoint, "creating ftp connection pool");
            Arc::new(ConnectionPool::new(
                endpoint.clone(),
                Arc::clone(&self.inner.connector),
                self.inner.config.pool.clone(),
            ))
        });
        Arc::clone(pool)
    }

    /// The HTTP client, built on first use.
    pub(crate) fn http_client(&self) -> Result<reqwest::blocking::Client, MufsError> {
        let mut slot = self.inner.http.lock();
        if let Some(client) = slot.as_ref() {
            return Ok(client.clone());
        }
        let http = &self.inner.config.http;
        let client = reqwest::blocking::Client::builder()
            .connect_timeout(http.connect_timeout)
            .user_agent(http.user_agent.as_str())
            .build()
            .map_err(|e| MufsError::Backend(format!("failed to build http client: {e}")))?;
        *slot = Some(client.clone());
        Ok(client)
    }
}

impl std::fmt::Debug for ResourceFactory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResourceFactory")
            .field("cache", &self.inner.cache)
            .field("temporary", &self.inner.temporary)
            .field("closed", &self.is_closed())
            .finish_non_exhaustive()
    }
}

/// `name_12` -> `name`; anything else unchanged.
fn strip_counter(stem: &str) -> &str {
    match stem.rsplit_once('_') {
        Some((base, counter))
            if !base.is_empty()
                && !counter.is_empty()
                && counter.bytes().all(|b| b.is_ascii_digit()) =>
        {
            base
        }
        _ => stem,
    }
}
