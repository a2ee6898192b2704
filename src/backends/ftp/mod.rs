//! # FTP Backend
//!
//! Handles for `ftp://[user[:pass]@]host[:port]/path` strings. The port
//! defaults to 21 and the credentials to `anonymous`/`anonymous`.
//!
//! Every operation borrows a session from the endpoint's
//! [`ConnectionPool`]. Sessions that fail with a connection error are
//! disposed rather than returned to the pool.
//!
//! Writes are buffered in memory and uploaded on `flush`; dropping an
//! unflushed writer uploads as a best effort and logs failures.

mod pool;
mod session;

pub use pool::{ConnectError, ConnectionPool, FtpConnector, FtpSession, PooledConnection, RemoteEntry};
pub use session::SuppaFtpConnector;

use std::fmt;
use std::io::{self, Cursor, Read, Write};
use std::sync::Arc;
use std::time::SystemTime;

use tracing::{debug, warn};
use url::Url;

use crate::factory::FactoryLink;
use crate::ops::{self, filter_and_sort};
use crate::{
    BackendKind, BackendProvider, CachedAttributes, Location, MufsError, Resource, ResourceDir,
    ResourceFactory, ResourceFilter, ResourceHandle, ResourceRead, ResourceTransfer,
    ResourceWrite,
};

const DEFAULT_PORT: u16 = 21;
const ANONYMOUS: &str = "anonymous";

/// Server address and credentials. Pools are keyed by endpoint.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct FtpEndpoint {
    host: String,
    port: u16,
    user: String,
    password: String,
}

impl FtpEndpoint {
    /// Endpoint with explicit credentials.
    pub fn new(
        host: impl Into<String>,
        port: u16,
        user: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            host: host.into(),
            port,
            user: user.into(),
            password: password.into(),
        }
    }

    /// Endpoint with anonymous login.
    pub fn anonymous(host: impl Into<String>, port: u16) -> Self {
        Self::new(host, port, ANONYMOUS, ANONYMOUS)
    }

    /// Host name.
    pub fn host(&self) -> &str {
        &self.host
    }

    /// TCP port.
    pub fn port(&self) -> u16 {
        self.port
    }

    /// Login name.
    pub fn user(&self) -> &str {
        &self.user
    }

    /// Login password.
    pub fn password(&self) -> &str {
        &self.password
    }

    fn from_url(url: &Url) -> Option<Self> {
        let host = url.host_str()?.to_string();
        let port = url.port().unwrap_or(DEFAULT_PORT);
        let decode = |s: &str| urlencoding::decode(s).map(|d| d.into_owned()).unwrap_or_else(|_| s.to_string());
        let user = match url.username() {
            "" => ANONYMOUS.to_string(),
            user => decode(user),
        };
        let password = url.password().map(decode).unwrap_or_else(|| ANONYMOUS.to_string());
        Some(Self::new(host, port, user, password))
    }
}

impl fmt::Display for FtpEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}:{}", self.user, self.host, self.port)
    }
}

// Keeps the password out of logs.
impl fmt::Debug for FtpEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FtpEndpoint")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("user", &self.user)
            .finish_non_exhaustive()
    }
}

/// Accepts `ftp://` strings.
#[derive(Debug, Default)]
pub struct FtpProvider;

impl BackendProvider for FtpProvider {
    fn name(&self) -> &'static str {
        "ftp"
    }

    fn accepts(&self, resource: &str) -> bool {
        resource
            .get(..6)
            .is_some_and(|scheme| scheme.eq_ignore_ascii_case("ftp://"))
    }

    fn create(&self, resource: &str, factory: &ResourceFactory) -> Result<ResourceHandle, MufsError> {
        Ok(Arc::new(FtpResource::parse(resource, factory)?))
    }
}

/// A file or directory on an FTP server.
pub struct FtpResource {
    endpoint: FtpEndpoint,
    /// Decoded absolute remote path, no trailing slash except for `/`.
    path: String,
    resource: String,
    base: String,
    attrs: CachedAttributes,
    pool: Arc<ConnectionPool>,
    factory: FactoryLink,
}

impl FtpResource {
    fn parse(resource: &str, factory: &ResourceFactory) -> Result<Self, MufsError> {
        let invalid = |reason: &str| MufsError::InvalidResource {
            resource: resource.to_string(),
            reason: reason.to_string(),
        };
        let url = Url::parse(resource).map_err(|e| invalid(&e.to_string()))?;
        let endpoint = FtpEndpoint::from_url(&url).ok_or_else(|| invalid("missing host"))?;

        let raw_path = url.path();
        let decoded = urlencoding::decode(raw_path)
            .map_err(|e| invalid(&e.to_string()))?
            .into_owned();
        let trailing = raw_path.ends_with('/');
        let path = match decoded.trim_end_matches('/') {
            "" => "/".to_string(),
            trimmed => trimmed.to_string(),
        };

        let base = resource_base(&url);
        let attrs = CachedAttributes::new();
        let is_dir = trailing || path == "/";
        if is_dir {
            attrs.set_directory(true);
        }
        let resource = remote_string(&base, &path, is_dir);

        Ok(Self {
            pool: factory.ftp_pool(&endpoint),
            endpoint,
            path,
            resource,
            base,
            attrs,
            factory: factory.link(),
        })
    }

    /// The server this handle lives on.
    pub fn endpoint(&self) -> &FtpEndpoint {
        &self.endpoint
    }

    /// The decoded remote path.
    pub fn remote_path(&self) -> &str {
        &self.path
    }

    fn with_session<T>(
        &self,
        op: impl FnOnce(&mut dyn FtpSession) -> Result<T, MufsError>,
    ) -> Result<T, MufsError> {
        with_pooled(&self.pool, op)
    }

    fn child_string(&self, name: &str, is_dir: bool) -> String {
        let path = if self.path == "/" {
            format!("/{name}")
        } else {
            format!("{}/{name}", self.path)
        };
        remote_string(&self.base, &path, is_dir)
    }

    fn list(
        &self,
        directories: bool,
        filter: Option<&ResourceFilter>,
    ) -> Result<Vec<ResourceHandle>, MufsError> {
        if !self.is_directory() {
            return Ok(Vec::new());
        }
        let factory = self.factory.upgrade()?;
        let entries = self.with_session(|s| s.list(&self.path))?;
        let mut handles = Vec::new();
        for entry in entries.into_iter().filter(|e| e.is_directory == directories) {
            let child = factory.try_resolve(&self.child_string(&entry.name, entry.is_directory))?;
            child.attributes().set_directory(entry.is_directory);
            handles.push(child);
        }
        Ok(filter_and_sort(handles, filter))
    }

    fn delete_tree(session: &mut dyn FtpSession, path: &str) -> Result<(), MufsError> {
        for entry in session.list(path)? {
            let child = format!("{}/{}", path.trim_end_matches('/'), entry.name);
            if entry.is_directory {
                Self::delete_tree(session, &child)?;
            } else {
                session.remove(&child, false)?;
            }
        }
        session.remove(path, true)
    }
}

/// Run `op` on a pooled session, disposing the session on connection errors.
fn with_pooled<T>(
    pool: &Arc<ConnectionPool>,
    op: impl FnOnce(&mut dyn FtpSession) -> Result<T, MufsError>,
) -> Result<T, MufsError> {
    let mut connection = pool.get()?;
    match op(&mut *connection) {
        Err(e @ MufsError::ConnectionFailed { .. }) => {
            connection.dispose();
            Err(e)
        }
        other => other,
    }
}

/// `ftp://authority` of a parsed URL.
fn resource_base(url: &Url) -> String {
    format!("{}://{}", url.scheme(), url.authority())
}

fn remote_string(base: &str, path: &str, is_dir: bool) -> String {
    let encoded: Vec<_> = path
        .split('/')
        .map(|segment| urlencoding::encode(segment).into_owned())
        .collect();
    let mut s = format!("{base}{}", encoded.join("/"));
    if is_dir && !s.ends_with('/') {
        s.push('/');
    }
    s
}

impl ResourceRead for FtpResource {
    fn resource_string(&self) -> &str {
        &self.resource
    }

    fn backend(&self) -> BackendKind {
        BackendKind::Ftp
    }

    fn name(&self) -> String {
        match self.path.rsplit('/').next() {
            Some(name) if !name.is_empty() => name.to_string(),
            _ => self.endpoint.host.clone(),
        }
    }

    fn attributes(&self) -> &CachedAttributes {
        &self.attrs
    }

    fn location(&self) -> Location<'_> {
        Location::Ftp {
            endpoint: &self.endpoint,
            path: &self.path,
        }
    }

    fn exists(&self) -> bool {
        if self.path == "/" {
            return true;
        }
        self.with_session(|s| Ok(s.is_directory(&self.path)? || s.size(&self.path).is_ok()))
            .unwrap_or(false)
    }

    fn is_directory(&self) -> bool {
        self.attrs.directory_or(|| {
            self.with_session(|s| s.is_directory(&self.path))
                .unwrap_or(false)
        })
    }

    fn size(&self) -> Result<Option<u64>, MufsError> {
        if self.is_directory() {
            return Ok(None);
        }
        self.with_session(|s| s.size(&self.path))
    }

    fn modified(&self) -> Result<SystemTime, MufsError> {
        self.with_session(|s| s.modified(&self.path))
    }

    fn open_read(&self) -> Result<Box<dyn Read + Send>, MufsError> {
        let data = self.with_session(|s| s.retrieve(&self.path))?;
        Ok(Box::new(Cursor::new(data)))
    }

    fn read_bytes_limited(&self, limit: usize) -> Result<Vec<u8>, MufsError> {
        self.with_session(|s| s.retrieve_head(&self.path, limit))
    }
}

impl ResourceWrite for FtpResource {
    fn open_write(&self, append: bool) -> Result<Box<dyn Write + Send>, MufsError> {
        Ok(Box::new(FtpWriter {
            pool: Arc::clone(&self.pool),
            path: self.path.clone(),
            buffer: Vec::new(),
            append,
            pending: !append,
        }))
    }

    fn delete(&self) -> Result<(), MufsError> {
        let is_dir = self.is_directory();
        self.with_session(|s| {
            if is_dir {
                Self::delete_tree(s, &self.path)
            } else {
                s.remove(&self.path, false)
            }
        })?;
        self.refresh();
        if self.exists() {
            return Err(MufsError::DeleteFailed {
                resource: self.resource.clone(),
            });
        }
        Ok(())
    }

    fn mkdirs(&self) -> Result<(), MufsError> {
        self.with_session(|s| {
            let mut current = String::new();
            for segment in self.path.split('/').filter(|seg| !seg.is_empty()) {
                current.push('/');
                current.push_str(segment);
                if !s.is_directory(&current)? {
                    s.mkdir(&current)?;
                }
            }
            Ok(())
        })?;
        self.refresh();
        Ok(())
    }
}

impl ResourceDir for FtpResource {
    fn list_directories(
        &self,
        filter: Option<&ResourceFilter>,
    ) -> Result<Vec<ResourceHandle>, MufsError> {
        self.list(true, filter)
    }

    fn list_files(&self, filter: Option<&ResourceFilter>) -> Result<Vec<ResourceHandle>, MufsError> {
        self.list(false, filter)
    }

    fn parent(&self) -> Option<ResourceHandle> {
        let parent = self.attrs.parent_or(|| {
            if self.path == "/" {
                return None;
            }
            let parent = match self.path.rsplit_once('/') {
                Some(("", _)) | None => "/",
                Some((parent, _)) => parent,
            };
            Some(remote_string(&self.base, parent, true))
        })?;
        self.factory.get()?.resolve(parent)
    }
}

impl ResourceTransfer for FtpResource {
    /// Same-endpoint moves are a server-side rename.
    fn move_to(&self, target: &dyn Resource, overwrite: bool) -> Result<(), MufsError> {
        let Location::Ftp { endpoint, path } = target.location() else {
            return ops::default_move_to(self, target, overwrite);
        };
        if *endpoint != self.endpoint {
            return ops::default_move_to(self, target, overwrite);
        }
        if overwrite && path == self.path.as_str() {
            return Ok(());
        }
        if target.exists() {
            if !overwrite {
                return Err(MufsError::AlreadyExists {
                    resource: target.resource_string().to_string(),
                    operation: "move_to",
                });
            }
            target.delete()?;
        }
        debug!(from = %self.path, to = %path, "server-side rename");
        self.with_session(|s| s.rename(&self.path, path))?;
        self.refresh();
        target.refresh();
        Ok(())
    }
}

/// Buffers writes and uploads them on flush.
struct FtpWriter {
    pool: Arc<ConnectionPool>,
    path: String,
    buffer: Vec<u8>,
    append: bool,
    /// Whether an upload is owed even with an empty buffer (truncation).
    pending: bool,
}

impl FtpWriter {
    fn upload(&mut self) -> Result<(), MufsError> {
        if self.buffer.is_empty() && !self.pending {
            return Ok(());
        }
        with_pooled(&self.pool, |s| s.store(&self.path, &self.buffer, self.append))?;
        // Later flushes extend what was just written.
        self.buffer.clear();
        self.append = true;
        self.pending = false;
        Ok(())
    }
}

impl Write for FtpWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.buffer.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.upload().map_err(io::Error::from)
    }
}

impl Drop for FtpWriter {
    fn drop(&mut self) {
        if let Err(e) = self.upload() {
            warn!(path = %self.path, error = %e, "unflushed ftp upload failed");
        }
    }
}
