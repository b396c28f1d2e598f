//! Fixture-backed sessions: canned markup served per URL, with simulated lazy loading.
//!
//! Compiled for this crate's tests and behind the `fixtures` feature for dependent crates' tests.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use scraper::Html;

use crate::session::{BrowsingSession, ScrollMetrics, SessionLauncher};
use crate::{compile_selector, AdapterError};

const DEFAULT_ITEM_HEIGHT: u64 = 100;

/// Markup for one listing item in the campuspick shape.
pub fn listing_item(href: Option<&str>, status: &str) -> String {
    let link = match href {
        Some(href) => format!(r#"<a class="top" href="{href}">open</a>"#),
        None => r#"<a class="top">open</a>"#.to_string(),
    };
    format!(r#"<li class="item">{link}<span class="dday">{status}</span></li>"#)
}

#[derive(Debug, Clone)]
pub struct FixturePage {
    items: Vec<String>,
    initial: usize,
    per_scroll: usize,
    item_height: u64,
    static_html: Option<String>,
}

impl FixturePage {
    /// A page whose markup never changes.
    pub fn html(html: impl Into<String>) -> Self {
        Self {
            items: Vec::new(),
            initial: 0,
            per_scroll: 0,
            item_height: DEFAULT_ITEM_HEIGHT,
            static_html: Some(html.into()),
        }
    }

    /// A list that renders `initial` items and reveals `per_scroll` more on each scroll.
    pub fn progressive(items: Vec<String>, initial: usize, per_scroll: usize) -> Self {
        Self {
            items,
            initial,
            per_scroll,
            item_height: DEFAULT_ITEM_HEIGHT,
            static_html: None,
        }
    }

    pub fn with_item_height(mut self, item_height: u64) -> Self {
        self.item_height = item_height;
        self
    }

    fn revealed_after(&self, revealed: usize, scrolls: usize) -> usize {
        revealed
            .saturating_add(self.per_scroll.saturating_mul(scrolls))
            .min(self.items.len())
    }

    fn render(&self, revealed: usize) -> String {
        if let Some(html) = &self.static_html {
            return html.clone();
        }
        let shown = revealed.min(self.items.len());
        format!(
            "<html><body><ul class=\"list\">{}</ul></body></html>",
            self.items[..shown].concat()
        )
    }
}

/// A set of pages plus counters observed by tests.
#[derive(Debug, Clone, Default)]
pub struct FixtureSite {
    pages: HashMap<String, FixturePage>,
    panic_urls: HashSet<String>,
    fail_launch: bool,
    launches: Arc<AtomicUsize>,
    closes: Arc<AtomicUsize>,
    visits: Arc<Mutex<Vec<String>>>,
}

impl FixtureSite {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn page(mut self, url: &str, page: FixturePage) -> Self {
        self.pages.insert(url.to_string(), page);
        self
    }

    /// Navigating to `url` panics, standing in for a crashing component.
    pub fn panic_on(mut self, url: &str) -> Self {
        self.panic_urls.insert(url.to_string());
        self
    }

    pub fn failing_launch(mut self) -> Self {
        self.fail_launch = true;
        self
    }

    pub fn launches(&self) -> usize {
        self.launches.load(Ordering::SeqCst)
    }

    pub fn closes(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }

    pub fn visits(&self) -> Vec<String> {
        self.visits.lock().map(|v| v.clone()).unwrap_or_default()
    }

    pub fn session(&self) -> FixtureSession {
        FixtureSession {
            site: self.clone(),
            current: None,
        }
    }
}

#[async_trait]
impl SessionLauncher for FixtureSite {
    async fn launch(&self) -> Result<Box<dyn BrowsingSession>, AdapterError> {
        if self.fail_launch {
            return Err(AdapterError::Session("fixture launch refused".to_string()));
        }
        self.launches.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(self.session()))
    }
}

#[derive(Debug)]
pub struct FixtureSession {
    site: FixtureSite,
    current: Option<(String, usize)>,
}

impl FixtureSession {
    fn current_page(&self) -> Result<(&FixturePage, usize), AdapterError> {
        let (url, revealed) = self
            .current
            .as_ref()
            .ok_or_else(|| AdapterError::Session("no page loaded".to_string()))?;
        let page = self
            .site
            .pages
            .get(url)
            .ok_or_else(|| AdapterError::Session(format!("page {url} vanished")))?;
        Ok((page, *revealed))
    }
}

#[async_trait]
impl BrowsingSession for FixtureSession {
    async fn goto(&mut self, url: &str) -> Result<(), AdapterError> {
        if let Ok(mut visits) = self.site.visits.lock() {
            visits.push(url.to_string());
        }
        if self.site.panic_urls.contains(url) {
            panic!("fixture panic while loading {url}");
        }
        let page = self.site.pages.get(url).ok_or_else(|| AdapterError::Navigation {
            url: url.to_string(),
            reason: "404 Not Found".to_string(),
        })?;
        self.current = Some((url.to_string(), page.initial));
        Ok(())
    }

    async fn content(&mut self) -> Result<String, AdapterError> {
        let (page, revealed) = self.current_page()?;
        Ok(page.render(revealed))
    }

    async fn scroll_by(&mut self, _distance_px: u32) -> Result<(), AdapterError> {
        let (page, revealed) = self.current_page()?;
        let next = page.revealed_after(revealed, 1);
        if let Some((_, current)) = self.current.as_mut() {
            *current = next;
        }
        Ok(())
    }

    async fn measure(&mut self, item_selector: &str) -> Result<ScrollMetrics, AdapterError> {
        let selector = compile_selector(item_selector)?;
        let (page, revealed) = self.current_page()?;
        let item_count = Html::parse_document(&page.render(revealed)).select(&selector).count();
        let rendered = if page.static_html.is_some() {
            item_count
        } else {
            revealed.min(page.items.len())
        };
        Ok(ScrollMetrics {
            item_count,
            scroll_height: rendered as u64 * page.item_height,
        })
    }

    async fn close(&mut self) -> Result<(), AdapterError> {
        self.site.closes.fetch_add(1, Ordering::SeqCst);
        self.current = None;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn progressive_page_reveals_on_scroll() {
        let items = (0..5).map(|i| listing_item(Some(&format!("/a{i}")), "D-1")).collect();
        let site = FixtureSite::new().page("https://l", FixturePage::progressive(items, 2, 2));
        let mut session = site.session();
        session.goto("https://l").await.unwrap();

        assert_eq!(session.measure(".item").await.unwrap().item_count, 2);
        session.scroll_by(100).await.unwrap();
        session.scroll_by(100).await.unwrap();
        let metrics = session.measure(".item").await.unwrap();
        assert_eq!(metrics.item_count, 5);
        assert_eq!(metrics.scroll_height, 500);
        assert_eq!(site.visits(), vec!["https://l".to_string()]);
    }

    #[tokio::test]
    async fn launcher_counts_launches_and_closes() {
        let site = FixtureSite::new();
        let mut session = site.launch().await.unwrap();
        session.close().await.unwrap();
        assert_eq!(site.launches(), 1);
        assert_eq!(site.closes(), 1);
        assert!(site.clone().failing_launch().launch().await.is_err());
    }
}
