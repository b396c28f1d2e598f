//! Browsing sessions, listing collection and detail extraction for the activity source.

use actsync_storage::FetchError;
use scraper::{ElementRef, Selector};
use thiserror::Error;

mod chromium;
pub mod detail;
#[cfg(any(test, feature = "fixtures"))]
pub mod fixture;
pub mod listing;
pub mod profile;
pub mod session;

pub use chromium::{ChromiumConfig, ChromiumLauncher};
pub use detail::{DetailExtractor, FieldTable};
pub use listing::{collect_listing, parse_listing, scroll_until_stable, ListingHarvest, ListingParse, ScrollOutcome, StopReason};
pub use profile::{FieldRule, ListingSelectors, Locator, ScrollPolicy, SourceProfile};
pub use session::{BrowsingSession, HttpLauncher, ScrollMetrics, SessionLauncher};

pub const CRATE_NAME: &str = "actsync-adapters";

#[derive(Debug, Error)]
pub enum AdapterError {
    #[error("{0}")]
    Message(String),
    #[error("browser session error: {0}")]
    Session(String),
    #[error("navigation to {url} failed: {reason}")]
    Navigation { url: String, reason: String },
    #[error("invalid selector {selector:?}: {reason}")]
    Selector { selector: String, reason: String },
    #[error(transparent)]
    Fetch(#[from] FetchError),
    #[error(transparent)]
    Anyhow(#[from] anyhow::Error),
}

pub(crate) fn compile_selector(selector: &str) -> Result<Selector, AdapterError> {
    Selector::parse(selector).map_err(|e| AdapterError::Selector {
        selector: selector.to_string(),
        reason: e.to_string(),
    })
}

pub(crate) fn text_or_none(value: String) -> Option<String> {
    let trimmed = value.trim().to_string();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed)
    }
}

/// Concatenated text of every element, trimmed; `None` when blank.
pub(crate) fn joined_text<'a>(elements: impl Iterator<Item = ElementRef<'a>>) -> Option<String> {
    text_or_none(elements.flat_map(|e| e.text()).collect::<String>())
}
