//! Error types for the mufs resource handle layer.

use crate::BackendKind;

/// Resource handle error type with contextual variants.
///
/// Every variant carries the resource string, host or operation that
/// failed. Uses `#[non_exhaustive]` for forward compatibility.
///
/// # Examples
///
/// ```rust
/// use mufs::MufsError;
///
/// let err = MufsError::NotFound { resource: "/missing.txt".into() };
/// assert_eq!(err.to_string(), "not found: /missing.txt");
/// ```
#[non_exhaustive]
#[derive(Debug, thiserror::Error)]
pub enum MufsError {
    // Resolution Errors
    /// No registered backend accepts the resource string.
    #[error("no backend accepts resource: {resource}")]
    Unresolvable {
        /// The rejected resource string.
        resource: String,
    },

    /// A backend accepted the string but could not parse it.
    #[error("invalid resource {resource}: {reason}")]
    InvalidResource {
        /// The resource string.
        resource: String,
        /// Why the backend rejected it.
        reason: String,
    },

    /// The factory that produced a handle has been dropped.
    #[error("resource factory is closed")]
    FactoryClosed,

    // Resource Errors
    /// Resource does not exist.
    #[error("not found: {resource}")]
    NotFound {
        /// The resource that was not found.
        resource: String,
    },

    /// Resource already exists and overwriting was not requested.
    #[error("{operation}: already exists: {resource}")]
    AlreadyExists {
        /// The resource that already exists.
        resource: String,
        /// The operation that failed.
        operation: &'static str,
    },

    /// Expected a directory but found something else.
    #[error("not a directory: {resource}")]
    NotADirectory {
        /// The resource that is not a directory.
        resource: String,
    },

    /// The backend reported a successful delete but the resource is still there.
    #[error("delete failed, resource still present: {resource}")]
    DeleteFailed {
        /// The resource that survived deletion.
        resource: String,
    },

    /// A stream handle was asked for a second read pass.
    #[error("stream already consumed: {resource}")]
    StreamConsumed {
        /// The stream handle's name.
        resource: String,
    },

    /// Operation is not supported by this backend.
    #[error("{operation}: not supported by {backend} backend")]
    NotSupported {
        /// The unsupported operation.
        operation: &'static str,
        /// The backend that rejected it.
        backend: BackendKind,
    },

    // Network Errors
    /// The remote host rejected the credentials.
    #[error("authentication failed for {host}: {reason}")]
    Authentication {
        /// The remote endpoint.
        host: String,
        /// Server response.
        reason: String,
    },

    /// A connection to the remote host could not be established or was lost.
    #[error("connection to {host} failed: {reason}")]
    ConnectionFailed {
        /// The remote endpoint.
        host: String,
        /// Underlying cause.
        reason: String,
    },

    /// The connection pool gave up after repeated failures.
    #[error("no connection to {host} after {attempts} attempts (last error: {last_error})")]
    PoolExhausted {
        /// The remote endpoint.
        host: String,
        /// Number of attempts made.
        attempts: u32,
        /// The last underlying cause.
        last_error: String,
    },

    /// HTTP request failed.
    #[error("http request to {url} failed: {source}")]
    Http {
        /// The requested URL.
        url: String,
        /// The underlying client error.
        #[source]
        source: reqwest::Error,
    },

    /// Generic backend error.
    #[error("backend error: {0}")]
    Backend(String),

    // Data Errors
    /// Serialization error.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Deserialization error.
    #[error("deserialization error: {0}")]
    Deserialization(String),

    /// I/O error with context.
    #[error("{operation} failed for {resource}: {source}")]
    Io {
        /// The operation that failed.
        operation: &'static str,
        /// The resource involved in the operation.
        resource: String,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },
}

impl MufsError {
    /// Wrap an I/O error with the operation and resource it happened on.
    pub fn io(operation: &'static str, resource: impl Into<String>, source: std::io::Error) -> Self {
        let resource = resource.into();
        match source.kind() {
            std::io::ErrorKind::NotFound => MufsError::NotFound { resource },
            std::io::ErrorKind::AlreadyExists => MufsError::AlreadyExists {
                resource,
                operation,
            },
            _ => MufsError::Io {
                operation,
                resource,
                source,
            },
        }
    }

    /// Shorthand for [`MufsError::NotSupported`].
    pub fn not_supported(operation: &'static str, backend: BackendKind) -> Self {
        MufsError::NotSupported { operation, backend }
    }
}

impl From<std::io::Error> for MufsError {
    fn from(error: std::io::Error) -> Self {
        MufsError::io("io", String::new(), error)
    }
}

/// Convert back to `std::io::Error` so handle errors can flow through
/// `Read`/`Write` adapters.
impl From<MufsError> for std::io::Error {
    fn from(error: MufsError) -> Self {
        match error {
            MufsError::Io { source, .. } => source,
            MufsError::NotFound { resource } => {
                std::io::Error::new(std::io::ErrorKind::NotFound, resource)
            }
            MufsError::AlreadyExists { resource, .. } => {
                std::io::Error::new(std::io::ErrorKind::AlreadyExists, resource)
            }
            MufsError::NotSupported { .. } => {
                std::io::Error::new(std::io::ErrorKind::Unsupported, error.to_string())
            }
            other => std::io::Error::other(other.to_string()),
        }
    }
}

/// Result alias used throughout the crate.
pub type Result<T, E = MufsError> = std::result::Result<T, E>;
