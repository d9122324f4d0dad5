//! Catalog sources
//!
//! A [`CatalogSource`] returns the whole catalog on every call. The HTTP
//! implementation fetches the JSON document published by the catalog server.

use crate::error::{Error, Result};
use crate::models::CatalogSnapshot;
use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;
use url::Url;

/// Default catalog document URL
pub const DEFAULT_CATALOG_URL: &str = "http://localhost:3000/data.json";

/// Default timeout for a catalog request
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 10;

/// Default User-Agent
pub const DEFAULT_USER_AGENT: &str = "pmodisplay/0.1.0";

/// Anything able to produce a full catalog snapshot
#[async_trait]
pub trait CatalogSource: Send + Sync {
    async fn fetch_snapshot(&self) -> Result<CatalogSnapshot>;
}

/// Catalog fetched over HTTP
///
/// # Example
///
/// ```no_run
/// use pmodisplay::{CatalogSource, HttpCatalogSource};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let source = HttpCatalogSource::builder()
///         .url("http://display.local:3000/data.json")
///         .build()?;
///     let snapshot = source.fetch_snapshot().await?;
///     println!("{} items", snapshot.len());
///     Ok(())
/// }
/// ```
#[derive(Debug, Clone)]
pub struct HttpCatalogSource {
    client: Client,
    url: Url,
    request_timeout: Duration,
}

impl HttpCatalogSource {
    /// Source on `url` with default settings
    pub fn new(url: &str) -> Result<Self> {
        Self::builder().url(url).build()
    }

    /// Create a builder for configuring the source
    pub fn builder() -> HttpCatalogSourceBuilder {
        HttpCatalogSourceBuilder::default()
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    /// Get the internal HTTP client
    pub fn http_client(&self) -> &Client {
        &self.client
    }
}

#[async_trait]
impl CatalogSource for HttpCatalogSource {
    async fn fetch_snapshot(&self) -> Result<CatalogSnapshot> {
        tracing::debug!(url = %self.url, "Fetching catalog");

        let response = self
            .client
            .get(self.url.clone())
            .header(reqwest::header::ACCEPT, "application/json")
            .timeout(self.request_timeout)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::Status(status.as_u16()));
        }

        let body = response.bytes().await?;
        let snapshot = CatalogSnapshot::from_json_slice(&body)?;

        tracing::debug!(items = snapshot.len(), "Catalog received");
        Ok(snapshot)
    }
}

/// Builder for configuring an [`HttpCatalogSource`]
#[derive(Debug)]
pub struct HttpCatalogSourceBuilder {
    client: Option<Client>,
    url: String,
    request_timeout: Duration,
    user_agent: String,
}

impl Default for HttpCatalogSourceBuilder {
    fn default() -> Self {
        Self {
            client: None,
            url: DEFAULT_CATALOG_URL.to_string(),
            request_timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
            user_agent: DEFAULT_USER_AGENT.to_string(),
        }
    }
}

impl HttpCatalogSourceBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a custom HTTP client
    pub fn client(mut self, client: Client) -> Self {
        self.client = Some(client);
        self
    }

    /// Set the catalog document URL
    pub fn url(mut self, url: impl Into<String>) -> Self {
        self.url = url.into();
        self
    }

    /// Set the request timeout
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Set a custom User-Agent header
    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    /// Build the source
    pub fn build(self) -> Result<HttpCatalogSource> {
        let url = Url::parse(&self.url)?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(Error::other(format!(
                "Unsupported catalog URL scheme: {}",
                url.scheme()
            )));
        }

        let client = match self.client {
            Some(client) => client,
            None => Client::builder()
                .user_agent(&self.user_agent)
                .timeout(self.request_timeout)
                .build()?,
        };

        Ok(HttpCatalogSource {
            client,
            url,
            request_timeout: self.request_timeout,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_defaults() {
        let builder = HttpCatalogSourceBuilder::default();
        assert_eq!(builder.url, DEFAULT_CATALOG_URL);
        assert_eq!(
            builder.request_timeout,
            Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS)
        );
    }

    #[test]
    fn test_build_rejects_invalid_urls() {
        assert!(matches!(
            HttpCatalogSource::new("not a url"),
            Err(Error::InvalidUrl(_))
        ));
        assert!(matches!(
            HttpCatalogSource::new("ftp://host/data.json"),
            Err(Error::Other(_))
        ));
        assert!(HttpCatalogSource::new("https://host/data.json").is_ok());
    }
}
