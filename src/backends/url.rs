//! HTTP(S) resources fetched with a blocking client.
//!
//! There is no cheap existence probe for a URL, so handles always report
//! that they exist. Size and modification time are not obtainable either
//! and degrade to `0` and "now".

use std::io::{Read, Write};
use std::time::SystemTime;

use tracing::debug;
use url::Url;

use crate::factory::FactoryLink;
use crate::{
    BackendKind, BackendProvider, CachedAttributes, MufsError, ResourceDir, ResourceFactory,
    ResourceFilter, ResourceHandle, ResourceRead, ResourceTransfer, ResourceWrite,
};

/// Accepts `http://` and `https://` strings.
#[derive(Debug, Default)]
pub struct UrlProvider;

impl BackendProvider for UrlProvider {
    fn name(&self) -> &'static str {
        "url"
    }

    fn accepts(&self, resource: &str) -> bool {
        let lower = resource.get(..8).unwrap_or(resource).to_ascii_lowercase();
        lower.starts_with("http://") || lower.starts_with("https://")
    }

    fn create(&self, resource: &str, factory: &ResourceFactory) -> Result<ResourceHandle, MufsError> {
        let url = Url::parse(resource).map_err(|e| MufsError::InvalidResource {
            resource: resource.to_string(),
            reason: e.to_string(),
        })?;
        Ok(std::sync::Arc::new(UrlResource::new(url, factory.link())))
    }
}

/// A remote HTTP(S) resource.
pub struct UrlResource {
    url: Url,
    attrs: CachedAttributes,
    factory: FactoryLink,
}

impl UrlResource {
    pub(crate) fn new(url: Url, factory: FactoryLink) -> Self {
        Self {
            url,
            attrs: CachedAttributes::new(),
            factory,
        }
    }

    /// The parsed URL.
    pub fn url(&self) -> &Url {
        &self.url
    }
}

impl ResourceRead for UrlResource {
    fn resource_string(&self) -> &str {
        self.url.as_str()
    }

    fn backend(&self) -> BackendKind {
        BackendKind::Url
    }

    fn name(&self) -> String {
        let segment = self
            .url
            .path_segments()
            .and_then(|mut segments| segments.next_back())
            .filter(|s| !s.is_empty());
        match segment {
            Some(s) => urlencoding::decode(s).map_or_else(|_| s.to_string(), |d| d.into_owned()),
            None => self.url.host_str().unwrap_or_default().to_string(),
        }
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
        Ok(Some(0))
    }

    fn modified(&self) -> Result<SystemTime, MufsError> {
        Ok(SystemTime::now())
    }

    fn open_read(&self) -> Result<Box<dyn Read + Send>, MufsError> {
        let client = self.factory.upgrade()?.http_client()?;
        debug!(url = %self.url, "GET");
        let http_error = |source: reqwest::Error| MufsError::Http {
            url: self.url.to_string(),
            source,
        };
        let response = client
            .get(self.url.clone())
            .send()
            .and_then(|r| r.error_for_status())
            .map_err(http_error)?;
        Ok(Box::new(response))
    }
}

impl ResourceWrite for UrlResource {
    fn open_write(&self, _append: bool) -> Result<Box<dyn Write + Send>, MufsError> {
        Err(MufsError::not_supported("open_write", BackendKind::Url))
    }

    fn delete(&self) -> Result<(), MufsError> {
        Err(MufsError::not_supported("delete", BackendKind::Url))
    }

    fn mkdirs(&self) -> Result<(), MufsError> {
        Err(MufsError::not_supported("mkdirs", BackendKind::Url))
    }
}

impl ResourceDir for UrlResource {
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

impl ResourceTransfer for UrlResource {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_http_and_https_only() {
        let provider = UrlProvider;
        assert!(provider.accepts("http://example.com/a.pdf"));
        assert!(provider.accepts("HTTPS://example.com"));
        assert!(!provider.accepts("ftp://example.com"));
        assert!(!provider.accepts("/http://"));
    }

    #[test]
    fn sentinels_instead_of_failures() {
        let factory = ResourceFactory::default();
        let handle = factory.resolve("https://example.com/books/My%20Book.epub").unwrap();
        assert_eq!(handle.backend(), BackendKind::Url);
        assert!(handle.exists());
        assert_eq!(handle.size().unwrap(), Some(0));
        assert!(handle.modified().is_ok());
        assert_eq!(handle.name(), "My Book.epub");
        assert_eq!(handle.mime_type(false).unwrap().as_str(), "application/epub+zip");
    }

    #[test]
    fn name_falls_back_to_host() {
        let factory = ResourceFactory::default();
        let handle = factory.resolve("https://example.com/").unwrap();
        assert_eq!(handle.name(), "example.com");
    }

    #[test]
    fn read_only() {
        let factory = ResourceFactory::default();
        let handle = factory.resolve("http://example.com/x").unwrap();
        assert!(matches!(handle.delete(), Err(MufsError::NotSupported { .. })));
    }
}
