//! Provides the [`Fetcher`] capability the readers use to load documents by URI.

use std::collections::HashMap;

use async_trait::async_trait;
use bytes::Bytes;
use log::debug;

use crate::error::GeoKitError;

mod native;

pub use native::{HttpFetcher, HttpFetcherConfig};

/// Service loading raw documents by their URI.
///
/// The readers only suspend on calls to this trait. Timeouts and cancellation are the responsibility of the
/// implementation (or of the caller dropping the future).
#[async_trait]
pub trait Fetcher: Send + Sync {
    /// Loads a byte array from the given URI.
    async fn fetch_bytes(&self, uri: &str) -> Result<Bytes, GeoKitError>;

    /// Loads a UTF-8 document from the given URI.
    async fn fetch_string(&self, uri: &str) -> Result<String, GeoKitError> {
        let bytes = self.fetch_bytes(uri).await?;
        Ok(String::from_utf8(bytes.to_vec())?)
    }

    /// Posts the body to the URI and returns the response content.
    async fn post_string(&self, uri: &str, body: &str) -> Result<Bytes, GeoKitError>;
}

/// Fetcher serving documents from memory. Useful for tests and for documents that are already loaded.
///
/// Unknown URIs are reported as network errors.
#[derive(Debug, Default, Clone)]
pub struct StaticFetcher {
    documents: HashMap<String, Bytes>,
}

impl StaticFetcher {
    /// Creates an empty fetcher.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a document.
    pub fn with(mut self, uri: impl Into<String>, content: impl Into<Bytes>) -> Self {
        self.insert(uri, content);
        self
    }

    /// Adds a document.
    pub fn insert(&mut self, uri: impl Into<String>, content: impl Into<Bytes>) {
        self.documents.insert(uri.into(), content.into());
    }
}

#[async_trait]
impl Fetcher for StaticFetcher {
    async fn fetch_bytes(&self, uri: &str) -> Result<Bytes, GeoKitError> {
        debug!("Serving {uri} from memory");
        self.documents
            .get(uri)
            .cloned()
            .ok_or_else(|| GeoKitError::Network(format!("{uri} is not available")))
    }

    async fn post_string(&self, uri: &str, _body: &str) -> Result<Bytes, GeoKitError> {
        self.fetch_bytes(uri).await
    }
}

/// Resolves a possibly relative reference against the URI of the document containing it.
pub fn resolve_uri(base: Option<&str>, reference: &str) -> String {
    let reference = reference.trim();
    let base = match base {
        Some(base) if !is_absolute(reference) => base,
        _ => return reference.to_string(),
    };

    match base.rfind('/') {
        Some(index) => format!("{}{reference}", &base[..=index]),
        None => reference.to_string(),
    }
}

fn is_absolute(reference: &str) -> bool {
    reference.contains("://") || reference.starts_with('/')
}
