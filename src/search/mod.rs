//! External search validator.
//!
//! Builds a query from the idea, fetches a results page through a
//! [`PageFetcher`], parses it, and counts results that look like competing
//! products. Successful results are cached per idea for the configured TTL;
//! failures are returned as data (`error` set, zero counts) and are not
//! cached.
//!
//! | Driver | Fetcher |
//! |--------|---------|
//! | `browser` | [`BrowserSession`] (headless Chromium) |
//! | `http` | [`HttpFetcher`] (plain GET) |

pub mod browser;
pub mod fetch;
pub mod parse;

pub use browser::{BrowserOptions, BrowserSession};
pub use fetch::{HttpFetcher, PageFetcher, SearchError};

use async_trait::async_trait;
use chrono::Utc;
use ideavoid_core::cache::TtlCache;
use ideavoid_core::internal::MAX_REPORTED;
use ideavoid_core::models::{ExternalSource, Idea, SearchCompetitor};
use ideavoid_core::search::SearchValidator;
use sha2::{Digest, Sha256};
use std::sync::Arc;
use std::time::Duration;

use crate::config::SearchConfig;

/// Characters of the description appended to the quoted name.
const QUERY_DESCRIPTION_CHARS: usize = 50;

pub struct ExternalSearchValidator {
    enabled: bool,
    engine_url: String,
    max_results: usize,
    fetcher: Arc<dyn PageFetcher>,
    cache: TtlCache<ExternalSource>,
}

impl ExternalSearchValidator {
    pub fn new(
        enabled: bool,
        engine_url: impl Into<String>,
        max_results: usize,
        cache_ttl: Duration,
        fetcher: Arc<dyn PageFetcher>,
    ) -> Self {
        Self {
            enabled,
            engine_url: engine_url.into(),
            max_results,
            fetcher,
            cache: TtlCache::new(cache_ttl),
        }
    }

    /// Builds the validator and its driver from `[search]`.
    ///
    /// The browser is not launched until the first search.
    pub fn from_config(config: &SearchConfig) -> anyhow::Result<Self> {
        let fetcher: Arc<dyn PageFetcher> = match config.driver.as_str() {
            "http" => Arc::new(HttpFetcher::new(
                &config.user_agent,
                Duration::from_secs(config.navigation_timeout_secs),
            )?),
            _ => Arc::new(BrowserSession::new(BrowserOptions {
                chrome_path: config.chrome_path.clone(),
                user_agent: config.user_agent.clone(),
                navigation_timeout: Duration::from_secs(config.navigation_timeout_secs),
                result_wait_timeout: Duration::from_secs(config.result_wait_timeout_secs),
                result_selector: "div.g".to_string(),
            })),
        };
        Ok(Self::new(
            config.enabled,
            config.engine_url.clone(),
            config.max_results,
            Duration::from_secs(config.cache_ttl_secs),
            fetcher,
        ))
    }

    /// `"<name>" <first 50 chars of description>`
    pub fn build_query(idea: &Idea) -> String {
        let prefix: String = idea
            .description
            .chars()
            .take(QUERY_DESCRIPTION_CHARS)
            .collect();
        format!("\"{}\" {}", idea.name, prefix)
    }

    pub fn search_url(&self, query: &str) -> Result<String, SearchError> {
        let num = self.max_results.to_string();
        reqwest::Url::parse_with_params(&self.engine_url, &[("q", query), ("num", num.as_str())])
            .map(String::from)
            .map_err(|e| SearchError::Url(e.to_string()))
    }

    /// Cache key for an idea: SHA-256 of its lower-cased name, or of its
    /// description when unnamed.
    pub fn cache_key(idea: &Idea) -> String {
        let basis = if idea.name.trim().is_empty() {
            &idea.description
        } else {
            &idea.name
        };
        let digest = Sha256::digest(basis.trim().to_lowercase().as_bytes());
        format!("search_{}", hex::encode(digest))
    }

    async fn search(&self, idea: &Idea) -> Result<ExternalSource, SearchError> {
        let url = self.search_url(&Self::build_query(idea))?;
        tracing::debug!(%url, idea = %idea.name, "searching for competitors");

        let html = self.fetcher.fetch(&url).await?;
        let results = parse::parse_results(&html, self.max_results);
        let relevant = parse::filter_relevant(&results, &idea.name);

        Ok(ExternalSource {
            competitor_count: relevant.len(),
            total_results: results.len(),
            competitors: relevant
                .into_iter()
                .take(MAX_REPORTED)
                .map(|r| SearchCompetitor {
                    name: r.title,
                    url: r.url,
                    snippet: r.snippet,
                })
                .collect(),
            enabled: true,
            error: None,
            last_checked: Utc::now(),
        })
    }

    pub fn cache_stats(&self) -> ideavoid_core::cache::CacheStats {
        self.cache.stats()
    }
}

#[async_trait]
impl SearchValidator for ExternalSearchValidator {
    fn is_enabled(&self) -> bool {
        self.enabled
    }

    async fn validate_with_search(&self, idea: &Idea, bypass_cache: bool) -> ExternalSource {
        if !self.enabled {
            return ExternalSource::disabled(Utc::now());
        }

        let key = Self::cache_key(idea);
        if bypass_cache {
            self.cache.remove(&key);
        } else if let Some(hit) = self.cache.get(&key) {
            return hit;
        }

        match self.search(idea).await {
            Ok(result) => {
                self.cache.insert(key, result.clone());
                result
            }
            Err(e) => {
                tracing::warn!(idea = %idea.name, error = %e, "external search failed");
                ExternalSource::failed(e.to_string(), Utc::now())
            }
        }
    }

    fn clear_cache(&self, idea: &Idea) {
        self.cache.remove(&Self::cache_key(idea));
    }

    async fn shutdown(&self) {
        self.fetcher.shutdown().await;
    }
}
