//! # FTP Connection Pool
//!
//! One pool per endpoint. Connections are either idle (parked in the pool)
//! or in use (lent out through a [`PooledConnection`] guard).
//!
//! ## Protocol
//!
//! [`ConnectionPool::get`] loops until it can hand out a session:
//!
//! 1. Reuse an idle session, reconnecting it if it went stale.
//! 2. Otherwise open a new one while `in_use < high_water_mark`.
//! 3. Otherwise sleep and retry, up to `max_attempts` times.
//!
//! ## Failure classes
//!
//! | [`ConnectError`] | Effect |
//! |------------------|--------|
//! | `Authentication` | Fails immediately, never retried |
//! | `Refused` | Lowers the high-water mark to the current in-use count (at least 1), then retries |
//! | `Transient` | Retried without touching the mark |
//!
//! The mark starts at [`PoolConfig::max_connections`] and only ever goes
//! down, so the pool settles on the server's real connection limit.

use std::ops::{Deref, DerefMut};
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use parking_lot::Mutex;
use tracing::{debug, info, warn};

use super::FtpEndpoint;
use crate::{MufsError, PoolConfig};

/// Why a connect attempt failed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConnectError {
    /// The server rejected the credentials.
    #[error("authentication rejected: {0}")]
    Authentication(String),
    /// The server refused another connection (capacity reached).
    #[error("connection refused: {0}")]
    Refused(String),
    /// Anything else: DNS, timeouts, resets.
    #[error("transient failure: {0}")]
    Transient(String),
}

/// One entry of a remote directory listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteEntry {
    /// Entry name without any path.
    pub name: String,
    /// Whether the entry is a directory.
    pub is_directory: bool,
    /// Size in bytes, when the listing reports it.
    pub size: Option<u64>,
    /// Modification time, when the listing reports it.
    pub modified: Option<SystemTime>,
}

/// An authenticated FTP control connection.
///
/// Paths are absolute remote paths. Errors that mean the connection itself
/// is broken should be reported as [`MufsError::ConnectionFailed`] so the
/// pool discards the session instead of reusing it.
pub trait FtpSession: Send {
    /// List the entries of a directory.
    fn list(&mut self, path: &str) -> Result<Vec<RemoteEntry>, MufsError>;
    /// Whether `path` is an existing directory.
    fn is_directory(&mut self, path: &str) -> Result<bool, MufsError>;
    /// Size of a file.
    fn size(&mut self, path: &str) -> Result<Option<u64>, MufsError>;
    /// Modification time of a file.
    fn modified(&mut self, path: &str) -> Result<SystemTime, MufsError>;
    /// Download a whole file.
    fn retrieve(&mut self, path: &str) -> Result<Vec<u8>, MufsError>;
    /// Download at most `limit` leading bytes of a file.
    ///
    /// The default downloads everything and truncates. Sessions that can
    /// stop a transfer early should override it.
    fn retrieve_head(&mut self, path: &str, limit: usize) -> Result<Vec<u8>, MufsError> {
        let mut data = self.retrieve(path)?;
        data.truncate(limit);
        Ok(data)
    }
    /// Upload `data`, replacing or appending to the remote file.
    fn store(&mut self, path: &str, data: &[u8], append: bool) -> Result<(), MufsError>;
    /// Remove a file, or an empty directory.
    fn remove(&mut self, path: &str, is_directory: bool) -> Result<(), MufsError>;
    /// Create one directory.
    fn mkdir(&mut self, path: &str) -> Result<(), MufsError>;
    /// Server-side rename.
    fn rename(&mut self, from: &str, to: &str) -> Result<(), MufsError>;
    /// Cheap liveness check (`NOOP`).
    fn is_alive(&mut self) -> bool;
    /// Log out and close.
    fn logout(&mut self);
}

/// Opens sessions. The production connector uses `suppaftp`; tests script
/// their own.
pub trait FtpConnector: Send + Sync {
    /// Connect and log in.
    fn connect(
        &self,
        endpoint: &FtpEndpoint,
        timeout: Duration,
    ) -> Result<Box<dyn FtpSession>, ConnectError>;
}

struct PoolState {
    idle: Vec<Box<dyn FtpSession>>,
    in_use: usize,
    high_water_mark: usize,
    closed: bool,
}

enum Slot {
    Idle(Box<dyn FtpSession>),
    New,
    Wait,
}

/// Bounded, self-tuning pool of sessions to one endpoint.
pub struct ConnectionPool {
    endpoint: FtpEndpoint,
    connector: Arc<dyn FtpConnector>,
    config: PoolConfig,
    state: Mutex<PoolState>,
}

impl ConnectionPool {
    /// Create an empty pool.
    pub fn new(endpoint: FtpEndpoint, connector: Arc<dyn FtpConnector>, config: PoolConfig) -> Self {
        let high_water_mark = config.max_connections.max(1);
        Self {
            endpoint,
            connector,
            config,
            state: Mutex::new(PoolState {
                idle: Vec::new(),
                in_use: 0,
                high_water_mark,
                closed: false,
            }),
        }
    }

    /// The endpoint this pool connects to.
    pub fn endpoint(&self) -> &FtpEndpoint {
        &self.endpoint
    }

    /// Current ceiling on concurrently lent sessions.
    pub fn high_water_mark(&self) -> usize {
        self.state.lock().high_water_mark
    }

    /// Sessions currently lent out.
    pub fn in_use(&self) -> usize {
        self.state.lock().in_use
    }

    /// Sessions parked in the pool.
    pub fn idle(&self) -> usize {
        self.state.lock().idle.len()
    }

    /// Borrow a session.
    ///
    /// Blocks in a sleep/retry loop while the pool is at its ceiling.
    ///
    /// # Errors
    ///
    /// - [`MufsError::Authentication`] at once when the login is rejected
    /// - [`MufsError::PoolExhausted`] after `max_attempts` with the last cause
    /// - [`MufsError::ConnectionFailed`] if the pool was closed
    pub fn get(self: &Arc<Self>) -> Result<PooledConnection, MufsError> {
        let host = self.endpoint.to_string();
        let mut last_error = String::from("pool at capacity");

        for attempt in 1..=self.config.max_attempts {
            let slot = {
                let mut state = self.state.lock();
                if state.closed {
                    return Err(MufsError::ConnectionFailed {
                        host,
                        reason: "pool closed".to_string(),
                    });
                }
                if let Some(session) = state.idle.pop() {
                    state.in_use += 1;
                    Slot::Idle(session)
                } else if state.in_use < state.high_water_mark {
                    state.in_use += 1;
                    Slot::New
                } else {
                    Slot::Wait
                }
            };

            match slot {
                Slot::Idle(mut session) => {
                    if session.is_alive() {
                        return Ok(self.lend(session));
                    }
                    debug!(host = %host, "idle session went stale, reconnecting");
                    logout_in_background(session);
                }
                Slot::New => {}
                Slot::Wait => {
                    std::thread::sleep(self.config.retry_delay);
                    continue;
                }
            }

            // A slot is reserved in `in_use` from here on.
            match self.connector.connect(&self.endpoint, self.config.connect_timeout) {
                Ok(session) => {
                    debug!(host = %host, attempt, "opened ftp session");
                    return Ok(self.lend(session));
                }
                Err(ConnectError::Authentication(reason)) => {
                    self.state.lock().in_use -= 1;
                    return Err(MufsError::Authentication { host, reason });
                }
                Err(ConnectError::Refused(reason)) => {
                    let mut state = self.state.lock();
                    state.in_use -= 1;
                    let lowered = state.in_use.max(1);
                    if lowered < state.high_water_mark {
                        info!(
                            host = %host,
                            from = state.high_water_mark,
                            to = lowered,
                            "server refused a connection, lowering pool ceiling"
                        );
                        state.high_water_mark = lowered;
                    }
                    last_error = reason;
                }
                Err(ConnectError::Transient(reason)) => {
                    self.state.lock().in_use -= 1;
                    debug!(host = %host, attempt, reason = %reason, "transient connect failure");
                    last_error = reason;
                }
            }
            std::thread::sleep(self.config.retry_delay);
        }

        warn!(host = %host, attempts = self.config.max_attempts, "giving up on ftp connection");
        Err(MufsError::PoolExhausted {
            host,
            attempts: self.config.max_attempts,
            last_error,
        })
    }

    fn lend(self: &Arc<Self>, session: Box<dyn FtpSession>) -> PooledConnection {
        PooledConnection {
            pool: Arc::clone(self),
            session,
            disposed: false,
        }
    }

    fn release(&self, session: Box<dyn FtpSession>) {
        let mut state = self.state.lock();
        state.in_use -= 1;
        if state.closed {
            drop(state);
            logout_in_background(session);
        } else {
            state.idle.push(session);
        }
    }

    fn dispose(&self, session: Box<dyn FtpSession>) {
        self.state.lock().in_use -= 1;
        logout_in_background(session);
    }

    /// Log out every idle session and refuse further borrowing. Sessions
    /// still lent out are logged out when they come back.
    pub fn close(&self) {
        let idle = {
            let mut state = self.state.lock();
            state.closed = true;
            std::mem::take(&mut state.idle)
        };
        for session in idle {
            logout_in_background(session);
        }
    }
}

impl std::fmt::Debug for ConnectionPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.lock();
        f.debug_struct("ConnectionPool")
            .field("endpoint", &self.endpoint)
            .field("in_use", &state.in_use)
            .field("idle", &state.idle.len())
            .field("high_water_mark", &state.high_water_mark)
            .finish()
    }
}

fn logout_in_background(mut session: Box<dyn FtpSession>) {
    std::thread::spawn(move || session.logout());
}

/// A session borrowed from a [`ConnectionPool`].
///
/// Dropping the guard returns the session to the idle pool.
/// [`dispose`](Self::dispose) discards it instead.
pub struct PooledConnection {
    pool: Arc<ConnectionPool>,
    session: Box<dyn FtpSession>,
    disposed: bool,
}

impl PooledConnection {
    /// Remove the session from the pool and log out on a background thread.
    pub fn dispose(mut self) {
        self.disposed = true;
        let session = std::mem::replace(&mut self.session, Box::new(Detached));
        self.pool.dispose(session);
    }
}

impl std::fmt::Debug for PooledConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PooledConnection")
            .field("endpoint", &self.pool.endpoint)
            .field("disposed", &self.disposed)
            .finish_non_exhaustive()
    }
}

impl Deref for PooledConnection {
    type Target = dyn FtpSession;

    fn deref(&self) -> &Self::Target {
        self.session.as_ref()
    }
}

impl DerefMut for PooledConnection {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.session.as_mut()
    }
}

impl Drop for PooledConnection {
    fn drop(&mut self) {
        if !self.disposed {
            let session = std::mem::replace(&mut self.session, Box::new(Detached));
            self.pool.release(session);
        }
    }
}

/// Placeholder left in a guard whose session was handed back.
struct Detached;

impl Detached {
    fn gone() -> MufsError {
        MufsError::Backend("ftp session already released".to_string())
    }
}

impl FtpSession for Detached {
    fn list(&mut self, _path: &str) -> Result<Vec<RemoteEntry>, MufsError> {
        Err(Self::gone())
    }
    fn is_directory(&mut self, _path: &str) -> Result<bool, MufsError> {
        Err(Self::gone())
    }
    fn size(&mut self, _path: &str) -> Result<Option<u64>, MufsError> {
        Err(Self::gone())
    }
    fn modified(&mut self, _path: &str) -> Result<SystemTime, MufsError> {
        Err(Self::gone())
    }
    fn retrieve(&mut self, _path: &str) -> Result<Vec<u8>, MufsError> {
        Err(Self::gone())
    }
    fn store(&mut self, _path: &str, _data: &[u8], _append: bool) -> Result<(), MufsError> {
        Err(Self::gone())
    }
    fn remove(&mut self, _path: &str, _is_directory: bool) -> Result<(), MufsError> {
        Err(Self::gone())
    }
    fn mkdir(&mut self, _path: &str) -> Result<(), MufsError> {
        Err(Self::gone())
    }
    fn rename(&mut self, _from: &str, _to: &str) -> Result<(), MufsError> {
        Err(Self::gone())
    }
    fn is_alive(&mut self) -> bool {
        false
    }
    fn logout(&mut self) {}
}
