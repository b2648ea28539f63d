use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use log::info;

use crate::error::GeoKitError;
use crate::fetch::Fetcher;

/// Settings of [`HttpFetcher`].
#[derive(Debug, Clone)]
pub struct HttpFetcherConfig {
    /// Value of the `User-Agent` header.
    pub user_agent: String,
    /// Timeout of a whole request.
    pub timeout: Option<Duration>,
}

impl Default for HttpFetcherConfig {
    fn default() -> Self {
        Self {
            user_agent: format!("geokit/{}", env!("CARGO_PKG_VERSION")),
            timeout: Some(Duration::from_secs(30)),
        }
    }
}

impl HttpFetcherConfig {
    /// Sets the user agent.
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    /// Sets the request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

/// Fetcher loading `http(s)` URIs with `reqwest` and `file` URIs or plain paths from the file system.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    http_client: reqwest::Client,
}

impl HttpFetcher {
    /// Creates a new fetcher.
    pub fn new(config: HttpFetcherConfig) -> Result<Self, GeoKitError> {
        let mut builder = reqwest::Client::builder().user_agent(config.user_agent);
        if let Some(timeout) = config.timeout {
            builder = builder.timeout(timeout);
        }

        Ok(Self {
            http_client: builder.build()?,
        })
    }

    async fn load_from_web(&self, request: reqwest::RequestBuilder, uri: &str) -> Result<Bytes, GeoKitError> {
        let response = request.send().await?;
        if !response.status().is_success() {
            info!("Failed to load {uri}: {}", response.status());
            return Err(GeoKitError::Network(format!(
                "{uri} responded with {}",
                response.status()
            )));
        }

        Ok(response.bytes().await?)
    }

    async fn load_from_file(&self, path: &str) -> Result<Bytes, GeoKitError> {
        let content = tokio::fs::read(path)
            .await
            .map_err(|err| GeoKitError::Network(format!("failed to read {path}: {err}")))?;
        Ok(Bytes::from(content))
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch_bytes(&self, uri: &str) -> Result<Bytes, GeoKitError> {
        info!("Loading {uri}");
        match file_path(uri) {
            Some(path) => self.load_from_file(path).await,
            None => self.load_from_web(self.http_client.get(uri), uri).await,
        }
    }

    async fn post_string(&self, uri: &str, body: &str) -> Result<Bytes, GeoKitError> {
        info!("Posting {} bytes to {uri}", body.len());
        self.load_from_web(self.http_client.post(uri).body(body.to_string()), uri)
            .await
    }
}

fn file_path(uri: &str) -> Option<&str> {
    if let Some(path) = uri.strip_prefix("file://") {
        return Some(path);
    }

    if uri.contains("://") {
        None
    } else {
        Some(uri)
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    #[test]
    fn file_paths() {
        assert_eq!(file_path("file:///tmp/a.kml"), Some("/tmp/a.kml"));
        assert_eq!(file_path("data/a.kml"), Some("data/a.kml"));
        assert_eq!(file_path("http://host/a.kml"), None);
    }

    #[tokio::test]
    async fn missing_file_is_network_error() {
        let fetcher = HttpFetcher::new(HttpFetcherConfig::default()).unwrap();
        assert_matches!(
            fetcher.fetch_bytes("/definitely/not/here.kml").await,
            Err(GeoKitError::Network(_))
        );
    }
}
