//! In-memory buffers and one-shot input streams.
//!
//! Stream handles have no hierarchy and are never cached by the factory.
//! A buffer can be read any number of times; a reader supports a single
//! pass. Bytes peeked for MIME detection are kept and replayed in front
//! of that pass.

use std::io::{Cursor, Read, Write};
use std::sync::Arc;
use std::time::SystemTime;

use parking_lot::Mutex;

use crate::{
    BackendKind, CachedAttributes, MufsError, ResourceDir, ResourceFilter, ResourceHandle,
    ResourceRead, ResourceTransfer, ResourceWrite,
};

enum Source {
    Buffer(Arc<[u8]>),
    Reader {
        peeked: Vec<u8>,
        reader: Option<Box<dyn Read + Send>>,
    },
}

/// A handle over a byte buffer or an input stream.
pub struct StreamResource {
    name: String,
    source: Mutex<Source>,
    created: SystemTime,
    attrs: CachedAttributes,
}

impl StreamResource {
    /// Wrap a byte buffer.
    pub fn from_bytes(name: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        let bytes: Vec<u8> = bytes.into();
        Self::with_source(name.into(), Source::Buffer(Arc::from(bytes)))
    }

    /// Wrap a reader. Only one full read pass is possible.
    pub fn from_reader(name: impl Into<String>, reader: impl Read + Send + 'static) -> Self {
        Self::with_source(
            name.into(),
            Source::Reader {
                peeked: Vec::new(),
                reader: Some(Box::new(reader)),
            },
        )
    }

    fn with_source(name: String, source: Source) -> Self {
        Self {
            name,
            source: Mutex::new(source),
            created: SystemTime::now(),
            attrs: CachedAttributes::new(),
        }
    }

    fn consumed(&self) -> MufsError {
        MufsError::StreamConsumed {
            resource: self.name.clone(),
        }
    }
}

impl ResourceRead for StreamResource {
    fn resource_string(&self) -> &str {
        &self.name
    }

    fn backend(&self) -> BackendKind {
        BackendKind::Stream
    }

    fn name(&self) -> String {
        self.name.clone()
    }

    fn attributes(&self) -> &CachedAttributes {
        &self.attrs
    }

    fn exists(&self) -> bool {
        true
    }

    fn is_directory(&self) -> bool {
        false
    }

    fn size(&self) -> Result<Option<u64>, MufsError> {
        match &*self.source.lock() {
            Source::Buffer(bytes) => Ok(Some(bytes.len() as u64)),
            Source::Reader { .. } => Ok(None),
        }
    }

    fn modified(&self) -> Result<SystemTime, MufsError> {
        Ok(self.created)
    }

    fn open_read(&self) -> Result<Box<dyn Read + Send>, MufsError> {
        match &mut *self.source.lock() {
            Source::Buffer(bytes) => Ok(Box::new(Cursor::new(Arc::clone(bytes)))),
            Source::Reader { peeked, reader } => {
                let reader = reader.take().ok_or_else(|| self.consumed())?;
                let head = Cursor::new(std::mem::take(peeked));
                Ok(Box::new(head.chain(reader)))
            }
        }
    }

    /// Peeks without consuming the stream; the bytes are replayed by the
    /// next [`open_read`](ResourceRead::open_read).
    fn read_bytes_limited(&self, limit: usize) -> Result<Vec<u8>, MufsError> {
        match &mut *self.source.lock() {
            Source::Buffer(bytes) => Ok(bytes[..bytes.len().min(limit)].to_vec()),
            Source::Reader { peeked, reader } => {
                let reader = reader.as_mut().ok_or_else(|| self.consumed())?;
                if peeked.len() < limit {
                    let missing = (limit - peeked.len()) as u64;
                    reader
                        .take(missing)
                        .read_to_end(peeked)
                        .map_err(|e| MufsError::io("read", self.name.as_str(), e))?;
                }
                Ok(peeked[..peeked.len().min(limit)].to_vec())
            }
        }
    }
}

impl ResourceWrite for StreamResource {
    fn open_write(&self, _append: bool) -> Result<Box<dyn Write + Send>, MufsError> {
        Err(MufsError::not_supported("open_write", BackendKind::Stream))
    }

    fn delete(&self) -> Result<(), MufsError> {
        Err(MufsError::not_supported("delete", BackendKind::Stream))
    }

    fn mkdirs(&self) -> Result<(), MufsError> {
        Err(MufsError::not_supported("mkdirs", BackendKind::Stream))
    }
}

impl ResourceDir for StreamResource {
    fn list_directories(
        &self,
        _filter: Option<&ResourceFilter>,
    ) -> Result<Vec<ResourceHandle>, MufsError> {
        Ok(Vec::new())
    }

    fn list_files(&self, _filter: Option<&ResourceFilter>) -> Result<Vec<ResourceHandle>, MufsError> {
        Ok(Vec::new())
    }

    fn parent(&self) -> Option<ResourceHandle> {
        None
    }
}

impl ResourceTransfer for StreamResource {}
