use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::cdp::js_protocol::runtime::EvaluateParams;
use chromiumoxide::Page;
use futures::StreamExt;
use serde::de::DeserializeOwned;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::session::{BrowsingSession, ScrollMetrics, SessionLauncher};
use crate::AdapterError;

#[derive(Debug, Clone)]
pub struct ChromiumConfig {
    pub executable: Option<PathBuf>,
    pub headless: bool,
    pub no_sandbox: bool,
    pub user_agent: Option<String>,
    pub navigation_timeout: Duration,
    /// Extra wait after navigation so late XHR-rendered content lands.
    pub settle: Duration,
}

impl Default for ChromiumConfig {
    fn default() -> Self {
        Self {
            executable: None,
            headless: true,
            no_sandbox: true,
            user_agent: None,
            navigation_timeout: Duration::from_secs(30),
            settle: Duration::from_millis(500),
        }
    }
}

/// Launches a headless Chromium per run.
#[derive(Debug, Clone, Default)]
pub struct ChromiumLauncher {
    config: ChromiumConfig,
}

impl ChromiumLauncher {
    pub fn new(config: ChromiumConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl SessionLauncher for ChromiumLauncher {
    async fn launch(&self) -> Result<Box<dyn BrowsingSession>, AdapterError> {
        let mut builder = BrowserConfig::builder().request_timeout(self.config.navigation_timeout);
        if !self.config.headless {
            builder = builder.with_head();
        }
        if self.config.no_sandbox {
            builder = builder.no_sandbox();
        }
        if let Some(executable) = &self.config.executable {
            builder = builder.chrome_executable(executable);
        }
        if let Some(user_agent) = &self.config.user_agent {
            builder = builder.arg(format!("--user-agent={user_agent}"));
        }
        let browser_config = builder.build().map_err(AdapterError::Session)?;

        let (mut browser, mut handler) = Browser::launch(browser_config)
            .await
            .map_err(|e| AdapterError::Session(format!("launching chromium: {e}")))?;
        let handler = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if event.is_err() {
                    break;
                }
            }
        });

        let page = match browser.new_page("about:blank").await {
            Ok(page) => page,
            Err(err) => {
                let _ = browser.close().await;
                handler.abort();
                return Err(AdapterError::Session(format!("opening page: {err}")));
            }
        };
        debug!("chromium session launched");

        Ok(Box::new(ChromiumSession {
            browser,
            page,
            handler: Some(handler),
            navigation_timeout: self.config.navigation_timeout,
            settle: self.config.settle,
        }))
    }
}

struct ChromiumSession {
    browser: Browser,
    page: Page,
    handler: Option<JoinHandle<()>>,
    navigation_timeout: Duration,
    settle: Duration,
}

impl ChromiumSession {
    async fn evaluate<T: DeserializeOwned>(&self, expression: String) -> Result<T, AdapterError> {
        let params = EvaluateParams::builder()
            .expression(expression)
            .return_by_value(true)
            .build()
            .map_err(AdapterError::Session)?;
        self.page
            .evaluate_expression(params)
            .await
            .map_err(|e| AdapterError::Session(format!("evaluating script: {e}")))?
            .into_value()
            .map_err(|e| AdapterError::Session(format!("decoding script result: {e}")))
    }
}

#[async_trait]
impl BrowsingSession for ChromiumSession {
    async fn goto(&mut self, url: &str) -> Result<(), AdapterError> {
        let navigation = async {
            self.page.goto(url).await?;
            self.page.wait_for_navigation().await?;
            Ok::<_, chromiumoxide::error::CdpError>(())
        };
        match tokio::time::timeout(self.navigation_timeout, navigation).await {
            Ok(Ok(())) => {}
            Ok(Err(err)) => {
                return Err(AdapterError::Navigation {
                    url: url.to_string(),
                    reason: err.to_string(),
                })
            }
            Err(_) => {
                return Err(AdapterError::Navigation {
                    url: url.to_string(),
                    reason: format!("timed out after {:?}", self.navigation_timeout),
                })
            }
        }
        tokio::time::sleep(self.settle).await;
        Ok(())
    }

    async fn content(&mut self) -> Result<String, AdapterError> {
        self.page
            .content()
            .await
            .map_err(|e| AdapterError::Session(format!("reading page content: {e}")))
    }

    async fn scroll_by(&mut self, distance_px: u32) -> Result<(), AdapterError> {
        let _: serde_json::Value = self
            .evaluate(format!("window.scrollBy(0, {distance_px}); null"))
            .await?;
        Ok(())
    }

    async fn measure(&mut self, item_selector: &str) -> Result<ScrollMetrics, AdapterError> {
        let selector = serde_json::to_string(item_selector)
            .map_err(|e| AdapterError::Message(format!("encoding selector: {e}")))?;
        self.evaluate(format!(
            "({{ item_count: document.querySelectorAll({selector}).length, scroll_height: document.body.scrollHeight }})"
        ))
        .await
    }

    async fn close(&mut self) -> Result<(), AdapterError> {
        let Some(handler) = self.handler.take() else {
            return Ok(());
        };
        let result = match self.browser.close().await {
            Ok(_) => {
                if let Err(err) = self.browser.wait().await {
                    warn!(error = %err, "waiting for chromium to exit");
                }
                Ok(())
            }
            Err(err) => Err(AdapterError::Session(format!("closing chromium: {err}"))),
        };
        handler.abort();
        debug!("chromium session closed");
        result
    }
}
