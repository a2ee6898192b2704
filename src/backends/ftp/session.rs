//! `suppaftp`-backed sessions.

use std::io::{Cursor, Read};
use std::net::ToSocketAddrs;
use std::time::{Duration, SystemTime};

use suppaftp::list::File;
use suppaftp::types::FileType;
use suppaftp::{FtpError, FtpStream, Status};
use tracing::trace;

use super::FtpEndpoint;
use super::pool::{ConnectError, FtpConnector, FtpSession, RemoteEntry};
use crate::MufsError;

/// Connects with a plain (non-TLS) `suppaftp` stream in binary mode.
#[derive(Debug, Default, Clone, Copy)]
pub struct SuppaFtpConnector;

impl FtpConnector for SuppaFtpConnector {
    fn connect(
        &self,
        endpoint: &FtpEndpoint,
        timeout: Duration,
    ) -> Result<Box<dyn FtpSession>, ConnectError> {
        let addr = (endpoint.host(), endpoint.port())
            .to_socket_addrs()
            .map_err(|e| ConnectError::Transient(e.to_string()))?
            .next()
            .ok_or_else(|| ConnectError::Transient(format!("no address for {}", endpoint.host())))?;

        let mut stream = FtpStream::connect_timeout(addr, timeout).map_err(classify)?;
        if let Err(e) = stream.login(endpoint.user(), endpoint.password()) {
            let _ = stream.quit();
            return Err(classify(e));
        }
        stream.transfer_type(FileType::Binary).map_err(classify)?;
        Ok(Box::new(SuppaFtpSession {
            stream,
            host: endpoint.to_string(),
        }))
    }
}

fn classify(error: FtpError) -> ConnectError {
    match &error {
        FtpError::UnexpectedResponse(response) if matches!(response.status, Status::NotLoggedIn) => {
            ConnectError::Authentication(error.to_string())
        }
        FtpError::UnexpectedResponse(response) if matches!(response.status, Status::NotAvailable) => {
            ConnectError::Refused(error.to_string())
        }
        FtpError::ConnectionError(io)
            if matches!(
                io.kind(),
                std::io::ErrorKind::ConnectionRefused | std::io::ErrorKind::ConnectionReset
            ) =>
        {
            ConnectError::Refused(error.to_string())
        }
        _ => ConnectError::Transient(error.to_string()),
    }
}

struct SuppaFtpSession {
    stream: FtpStream,
    host: String,
}

impl SuppaFtpSession {
    fn error(&self, path: &str, error: FtpError) -> MufsError {
        match &error {
            FtpError::ConnectionError(_) => MufsError::ConnectionFailed {
                host: self.host.clone(),
                reason: error.to_string(),
            },
            FtpError::UnexpectedResponse(response)
                if matches!(response.status, Status::FileUnavailable) =>
            {
                MufsError::NotFound {
                    resource: path.to_string(),
                }
            }
            _ => MufsError::Backend(format!("{}{path}: {error}", self.host)),
        }
    }
}

impl FtpSession for SuppaFtpSession {
    fn list(&mut self, path: &str) -> Result<Vec<RemoteEntry>, MufsError> {
        let lines = self
            .stream
            .list(Some(path))
            .map_err(|e| self.error(path, e))?;
        Ok(lines
            .iter()
            .filter_map(|line| match File::try_from(line.as_str()) {
                Ok(file) => Some(file),
                Err(e) => {
                    trace!(line = %line, error = %e, "unparsed listing line");
                    None
                }
            })
            .filter(|file| file.name() != "." && file.name() != "..")
            .map(|file| RemoteEntry {
                name: file.name().to_string(),
                is_directory: file.is_directory(),
                size: Some(file.size() as u64),
                modified: Some(file.modified()),
            })
            .collect())
    }

    fn is_directory(&mut self, path: &str) -> Result<bool, MufsError> {
        match self.stream.cwd(path) {
            Ok(()) => Ok(true),
            Err(FtpError::UnexpectedResponse(_)) => Ok(false),
            Err(e) => Err(self.error(path, e)),
        }
    }

    fn size(&mut self, path: &str) -> Result<Option<u64>, MufsError> {
        self.stream
            .size(path)
            .map(|size| Some(size as u64))
            .map_err(|e| self.error(path, e))
    }

    fn modified(&mut self, path: &str) -> Result<SystemTime, MufsError> {
        self.stream
            .mdtm(path)
            .map(|time| SystemTime::from(time.and_utc()))
            .map_err(|e| self.error(path, e))
    }

    fn retrieve(&mut self, path: &str) -> Result<Vec<u8>, MufsError> {
        self.stream
            .retr_as_buffer(path)
            .map(Cursor::into_inner)
            .map_err(|e| self.error(path, e))
    }

    /// Reads the head from the data stream, then aborts the rest of the
    /// transfer. A file shorter than `limit` finishes normally.
    fn retrieve_head(&mut self, path: &str, limit: usize) -> Result<Vec<u8>, MufsError> {
        let mut stream = self
            .stream
            .retr_as_stream(path)
            .map_err(|e| self.error(path, e))?;
        let mut head = Vec::with_capacity(limit.min(64 * 1024));
        let read = (&mut stream).take(limit as u64).read_to_end(&mut head);
        let closed = if head.len() < limit {
            self.stream.finalize_retr_stream(stream)
        } else {
            self.stream.abort(stream)
        };
        read.map_err(|e| MufsError::ConnectionFailed {
            host: self.host.clone(),
            reason: e.to_string(),
        })?;
        closed.map_err(|e| self.error(path, e))?;
        Ok(head)
    }

    fn store(&mut self, path: &str, data: &[u8], append: bool) -> Result<(), MufsError> {
        let mut reader = Cursor::new(data);
        let result = if append {
            self.stream.append_file(path, &mut reader)
        } else {
            self.stream.put_file(path, &mut reader)
        };
        result.map(|_| ()).map_err(|e| self.error(path, e))
    }

    fn remove(&mut self, path: &str, is_directory: bool) -> Result<(), MufsError> {
        let result = if is_directory {
            self.stream.rmdir(path)
        } else {
            self.stream.rm(path)
        };
        result.map_err(|e| self.error(path, e))
    }

    fn mkdir(&mut self, path: &str) -> Result<(), MufsError> {
        self.stream.mkdir(path).map_err(|e| self.error(path, e))
    }

    fn rename(&mut self, from: &str, to: &str) -> Result<(), MufsError> {
        self.stream.rename(from, to).map_err(|e| self.error(from, e))
    }

    fn is_alive(&mut self) -> bool {
        self.stream.noop().is_ok()
    }

    fn logout(&mut self) {
        if let Err(e) = self.stream.quit() {
            trace!(host = %self.host, error = %e, "ftp logout failed");
        }
    }
}
