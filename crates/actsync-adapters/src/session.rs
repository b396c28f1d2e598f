//! Browsing session seam shared by the real browser, plain HTTP and fixtures.

use actsync_storage::{HttpClientConfig, HttpFetcher};
use async_trait::async_trait;
use scraper::Html;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{compile_selector, AdapterError};

/// What the listing page currently renders.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ScrollMetrics {
    pub item_count: usize,
    pub scroll_height: u64,
}

/// One page-at-a-time browsing session.
///
/// `close` is called exactly once by the run orchestrator; implementations may
/// treat later calls as no-ops.
#[async_trait]
pub trait BrowsingSession: Send {
    /// Navigate and wait for the page to settle.
    async fn goto(&mut self, url: &str) -> Result<(), AdapterError>;

    /// Markup as currently rendered.
    async fn content(&mut self) -> Result<String, AdapterError>;

    async fn scroll_by(&mut self, distance_px: u32) -> Result<(), AdapterError>;

    async fn measure(&mut self, item_selector: &str) -> Result<ScrollMetrics, AdapterError>;

    async fn close(&mut self) -> Result<(), AdapterError>;
}

#[async_trait]
pub trait SessionLauncher: Send + Sync {
    async fn launch(&self) -> Result<Box<dyn BrowsingSession>, AdapterError>;
}

/// Launches sessions that fetch server-rendered markup without a browser.
#[derive(Debug, Clone)]
pub struct HttpLauncher {
    config: HttpClientConfig,
}

impl HttpLauncher {
    pub fn new(config: HttpClientConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl SessionLauncher for HttpLauncher {
    async fn launch(&self) -> Result<Box<dyn BrowsingSession>, AdapterError> {
        let fetcher = HttpFetcher::new(self.config.clone())?;
        Ok(Box::new(HttpSession {
            fetcher,
            current: None,
        }))
    }
}

struct HttpSession {
    fetcher: HttpFetcher,
    current: Option<String>,
}

#[async_trait]
impl BrowsingSession for HttpSession {
    async fn goto(&mut self, url: &str) -> Result<(), AdapterError> {
        self.current = None;
        let resp = self
            .fetcher
            .fetch_text(url)
            .await
            .map_err(|err| AdapterError::Navigation {
                url: url.to_string(),
                reason: err.to_string(),
            })?;
        debug!(url, status = %resp.status, "fetched page");
        self.current = Some(resp.body);
        Ok(())
    }

    async fn content(&mut self) -> Result<String, AdapterError> {
        self.current
            .clone()
            .ok_or_else(|| AdapterError::Session("no page loaded".to_string()))
    }

    async fn scroll_by(&mut self, _distance_px: u32) -> Result<(), AdapterError> {
        Ok(())
    }

    // Static markup never grows, so height stays at zero and the scroll loop
    // stops after its first tick.
    async fn measure(&mut self, item_selector: &str) -> Result<ScrollMetrics, AdapterError> {
        let selector = compile_selector(item_selector)?;
        let item_count = match &self.current {
            Some(body) => Html::parse_document(body).select(&selector).count(),
            None => 0,
        };
        Ok(ScrollMetrics {
            item_count,
            scroll_height: 0,
        })
    }

    async fn close(&mut self) -> Result<(), AdapterError> {
        self.current = None;
        Ok(())
    }
}
