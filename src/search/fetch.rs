//! Page fetchers: how a results page is retrieved.

use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SearchError {
    #[error("failed to launch browser: {0}")]
    Launch(String),
    #[error("navigation to {url} failed: {details}")]
    Navigation { url: String, details: String },
    #[error("navigation to {url} timed out after {secs}s")]
    Timeout { url: String, secs: u64 },
    #[error("search engine returned HTTP {0}")]
    Status(u16),
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("invalid search URL: {0}")]
    Url(String),
    #[error("browser error: {0}")]
    Browser(String),
}

/// Retrieves the rendered HTML of a search results page.
#[async_trait]
pub trait PageFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<String, SearchError>;

    /// Releases any long-lived resources. Idempotent.
    async fn shutdown(&self) {}
}

/// Plain HTTP GET. No JavaScript, so engines that render results
/// client-side yield an empty page.
pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    pub fn new(user_agent: &str, timeout: Duration) -> Result<Self, SearchError> {
        let client = reqwest::Client::builder()
            .user_agent(user_agent)
            .timeout(timeout)
            .build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl PageFetcher for HttpFetcher {
    async fn fetch(&self, url: &str) -> Result<String, SearchError> {
        let resp = self.client.get(url).send().await?;
        let status = resp.status();
        if !status.is_success() {
            return Err(SearchError::Status(status.as_u16()));
        }
        Ok(resp.text().await?)
    }
}
