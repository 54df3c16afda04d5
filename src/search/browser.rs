//! Headless Chromium driver.
//!
//! [`BrowserSession`] owns at most one browser process, launched on first
//! use and shared by all fetches. Each fetch leases its own page and closes
//! it before returning, whatever the outcome. [`BrowserSession::shutdown`]
//! closes the process; calling it again is a no-op, and fetches after
//! shutdown fail instead of relaunching.

use async_trait::async_trait;
use chromiumoxide::cdp::browser_protocol::network::SetUserAgentOverrideParams;
use chromiumoxide::{Browser, BrowserConfig, Page};
use futures::StreamExt;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;

use super::fetch::{PageFetcher, SearchError};

const LAUNCH_ARGS: &[&str] = &[
    "--no-sandbox",
    "--disable-setuid-sandbox",
    "--disable-dev-shm-usage",
    "--disable-accelerated-2d-canvas",
    "--disable-gpu",
];

const POLL_INTERVAL: Duration = Duration::from_millis(250);

#[derive(Debug, Clone)]
pub struct BrowserOptions {
    pub chrome_path: Option<PathBuf>,
    pub user_agent: String,
    pub navigation_timeout: Duration,
    pub result_wait_timeout: Duration,
    /// CSS selector whose presence means results have rendered.
    pub result_selector: String,
}

struct Running {
    browser: Browser,
    handler: JoinHandle<()>,
}

pub struct BrowserSession {
    options: BrowserOptions,
    running: Mutex<Option<Running>>,
    closed: AtomicBool,
}

impl BrowserSession {
    pub fn new(options: BrowserOptions) -> Self {
        Self {
            options,
            running: Mutex::new(None),
            closed: AtomicBool::new(false),
        }
    }

    async fn launch(&self) -> Result<Running, SearchError> {
        let mut builder = BrowserConfig::builder().args(LAUNCH_ARGS.iter().copied());
        if let Some(path) = &self.options.chrome_path {
            builder = builder.chrome_executable(path);
        }
        let config = builder.build().map_err(SearchError::Launch)?;

        let (browser, mut handler) = Browser::launch(config)
            .await
            .map_err(|e| SearchError::Launch(e.to_string()))?;

        let handler = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if event.is_err() {
                    break;
                }
            }
            tracing::debug!("browser event loop exited");
        });

        tracing::info!("launched headless browser");
        Ok(Running { browser, handler })
    }

    /// Opens a fresh page, launching the browser first if needed.
    async fn lease_page(&self) -> Result<Page, SearchError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(SearchError::Browser("browser session is shut down".into()));
        }
        let mut guard = self.running.lock().await;
        if guard.is_none() {
            *guard = Some(self.launch().await?);
        }
        let running = guard
            .as_ref()
            .ok_or_else(|| SearchError::Browser("browser not running".into()))?;

        match running.browser.new_page("about:blank").await {
            Ok(page) => Ok(page),
            Err(e) => {
                // A dead process is relaunched on the next lease.
                if let Some(dead) = guard.take() {
                    dead.handler.abort();
                }
                Err(SearchError::Browser(e.to_string()))
            }
        }
    }

    async fn render(&self, page: &Page, url: &str) -> Result<String, SearchError> {
        page.set_user_agent(SetUserAgentOverrideParams::new(
            self.options.user_agent.clone(),
        ))
        .await
        .map_err(|e| SearchError::Browser(e.to_string()))?;

        let nav = self.options.navigation_timeout;
        match tokio::time::timeout(nav, page.goto(url)).await {
            Ok(Ok(_)) => {}
            Ok(Err(e)) => {
                return Err(SearchError::Navigation {
                    url: url.to_string(),
                    details: e.to_string(),
                })
            }
            Err(_) => {
                return Err(SearchError::Timeout {
                    url: url.to_string(),
                    secs: nav.as_secs(),
                })
            }
        }

        if !self.wait_for_results(page).await {
            tracing::debug!(url, "no results rendered before the wait timeout");
        }

        page.content()
            .await
            .map_err(|e| SearchError::Browser(e.to_string()))
    }

    /// Polls for the result selector. A timeout is not an error.
    async fn wait_for_results(&self, page: &Page) -> bool {
        let deadline = tokio::time::Instant::now() + self.options.result_wait_timeout;
        loop {
            if page
                .find_element(self.options.result_selector.as_str())
                .await
                .is_ok()
            {
                return true;
            }
            if tokio::time::Instant::now() >= deadline {
                return false;
            }
            tokio::time::sleep(POLL_INTERVAL).await;
        }
    }

    pub async fn shutdown(&self) {
        self.closed.store(true, Ordering::SeqCst);
        let Some(mut running) = self.running.lock().await.take() else {
            return;
        };
        if let Err(e) = running.browser.close().await {
            tracing::warn!(error = %e, "failed to close browser");
        }
        if let Err(e) = running.browser.wait().await {
            tracing::warn!(error = %e, "failed to reap browser process");
        }
        running.handler.abort();
        tracing::info!("browser closed");
    }
}

#[async_trait]
impl PageFetcher for BrowserSession {
    async fn fetch(&self, url: &str) -> Result<String, SearchError> {
        let page = self.lease_page().await?;
        let result = self.render(&page, url).await;
        if let Err(e) = page.close().await {
            tracing::debug!(error = %e, "failed to close page");
        }
        result
    }

    async fn shutdown(&self) {
        BrowserSession::shutdown(self).await;
    }
}
