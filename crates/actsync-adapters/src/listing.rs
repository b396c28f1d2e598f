//! Listing collection: scroll-until-stable, then one parse of the settled markup.

use scraper::Html;
use serde::Serialize;
use tracing::{debug, info};
use url::Url;

use crate::profile::{ListingSelectors, ScrollPolicy, SourceProfile};
use crate::session::{BrowsingSession, ScrollMetrics};
use crate::{compile_selector, joined_text, text_or_none, AdapterError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    /// Rendered item count reached the cap.
    ReachedCap,
    /// Scrolled past the scrollable height without it growing ahead.
    Exhausted,
    /// Hard iteration ceiling hit, e.g. a stalled render.
    TickCeiling,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ScrollOutcome {
    pub ticks: u32,
    pub stop: StopReason,
    pub metrics: ScrollMetrics,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct ListingParse {
    pub urls: Vec<String>,
    pub skipped_closed: usize,
    pub skipped_without_link: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ListingHarvest {
    pub scroll: ScrollOutcome,
    pub parse: ListingParse,
}

pub async fn scroll_until_stable(
    session: &mut dyn BrowsingSession,
    item_selector: &str,
    policy: ScrollPolicy,
    cap: usize,
) -> Result<ScrollOutcome, AdapterError> {
    let mut metrics = session.measure(item_selector).await?;
    if metrics.item_count >= cap {
        return Ok(ScrollOutcome {
            ticks: 0,
            stop: StopReason::ReachedCap,
            metrics,
        });
    }

    let mut scrolled: u64 = 0;
    for tick in 1..=policy.max_ticks {
        session.scroll_by(policy.step_px).await?;
        scrolled += u64::from(policy.step_px);
        tokio::time::sleep(policy.interval()).await;

        metrics = session.measure(item_selector).await?;
        if metrics.item_count >= cap {
            return Ok(ScrollOutcome {
                ticks: tick,
                stop: StopReason::ReachedCap,
                metrics,
            });
        }
        if scrolled >= metrics.scroll_height {
            return Ok(ScrollOutcome {
                ticks: tick,
                stop: StopReason::Exhausted,
                metrics,
            });
        }
    }

    Ok(ScrollOutcome {
        ticks: policy.max_ticks,
        stop: StopReason::TickCeiling,
        metrics,
    })
}

/// Extract up to `cap` absolute detail URLs, skipping closed or linkless items.
pub fn parse_listing(
    html: &str,
    selectors: &ListingSelectors,
    base_url: &str,
    cap: usize,
) -> Result<ListingParse, AdapterError> {
    let item_sel = compile_selector(&selectors.item_selector)?;
    let link_sel = compile_selector(&selectors.link_selector)?;
    let status_sel = compile_selector(&selectors.status_selector)?;
    let base = Url::parse(base_url).map_err(|e| AdapterError::Message(format!("invalid base url {base_url:?}: {e}")))?;

    let document = Html::parse_document(html);
    let mut out = ListingParse::default();

    for item in document.select(&item_sel) {
        if out.urls.len() >= cap {
            break;
        }

        let status = joined_text(item.select(&status_sel));
        if status.as_deref() == Some(selectors.closed_marker.as_str()) {
            out.skipped_closed += 1;
            continue;
        }

        let href = item
            .select(&link_sel)
            .next()
            .and_then(|a| a.value().attr(&selectors.link_attr))
            .and_then(|href| text_or_none(href.to_string()));
        let Some(href) = href else {
            out.skipped_without_link += 1;
            continue;
        };

        match base.join(&href) {
            Ok(url) => out.urls.push(url.to_string()),
            Err(err) => {
                debug!(href, error = %err, "skipping unresolvable listing link");
                out.skipped_without_link += 1;
            }
        }
    }

    Ok(out)
}

/// Navigate to the listing, reveal items and return the filtered detail URLs.
///
/// Any error here is fatal to the run: without a listing there is nothing to extract.
pub async fn collect_listing(
    session: &mut dyn BrowsingSession,
    profile: &SourceProfile,
) -> Result<ListingHarvest, AdapterError> {
    session.goto(&profile.listing_url).await?;

    let scroll = scroll_until_stable(
        session,
        &profile.listing.item_selector,
        profile.scroll,
        profile.max_items,
    )
    .await?;
    debug!(ticks = scroll.ticks, stop = ?scroll.stop, items = scroll.metrics.item_count, "listing settled");

    let html = session.content().await?;
    let parse = parse_listing(&html, &profile.listing, &profile.base_url, profile.max_items)?;
    info!(
        urls = parse.urls.len(),
        skipped_closed = parse.skipped_closed,
        skipped_without_link = parse.skipped_without_link,
        "collected listing"
    );

    Ok(ListingHarvest { scroll, parse })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixture::{listing_item, FixturePage, FixtureSite};

    const BASE: &str = "https://www.campuspick.com";

    fn fast_policy(max_ticks: u32) -> ScrollPolicy {
        ScrollPolicy {
            step_px: 100,
            interval_ms: 0,
            max_ticks,
        }
    }

    fn selectors() -> ListingSelectors {
        SourceProfile::campuspick().listing
    }

    #[test]
    fn closed_items_and_linkless_items_are_skipped() {
        let html = format!(
            "<ul>{}{}{}{}</ul>",
            listing_item(Some("/activity/view?id=1"), "D-3"),
            listing_item(Some("/activity/view?id=2"), "마감"),
            listing_item(None, "D-10"),
            listing_item(Some("/activity/view?id=4"), ""),
        );
        let parsed = parse_listing(&html, &selectors(), BASE, 100).unwrap();
        assert_eq!(
            parsed.urls,
            vec![
                "https://www.campuspick.com/activity/view?id=1".to_string(),
                "https://www.campuspick.com/activity/view?id=4".to_string(),
            ]
        );
        assert_eq!(parsed.skipped_closed, 1);
        assert_eq!(parsed.skipped_without_link, 1);
    }

    #[test]
    fn split_status_text_is_read_as_a_whole() {
        let html = r#"<li class="item"><a class="top" href="/activity/view?id=5">open</a><span class="dday">마</span><span class="dday">감</span></li>"#;
        let parsed = parse_listing(html, &selectors(), BASE, 100).unwrap();
        assert!(parsed.urls.is_empty());
        assert_eq!(parsed.skipped_closed, 1);
    }

    #[test]
    fn closed_marker_must_match_exactly() {
        let html = listing_item(Some("/activity/view?id=9"), "마감임박");
        let parsed = parse_listing(&html, &selectors(), BASE, 100).unwrap();
        assert_eq!(parsed.urls.len(), 1);
        assert_eq!(parsed.skipped_closed, 0);
    }

    #[test]
    fn listing_never_exceeds_cap() {
        let html = (0..250)
            .map(|i| listing_item(Some(&format!("/activity/view?id={i}")), "D-1"))
            .collect::<String>();
        let parsed = parse_listing(&html, &selectors(), BASE, 100).unwrap();
        assert_eq!(parsed.urls.len(), 100);
        assert_eq!(parsed.urls[99], "https://www.campuspick.com/activity/view?id=99");
    }

    #[test]
    fn absolute_links_are_kept() {
        let html = listing_item(Some("https://other.example/x"), "D-1");
        let parsed = parse_listing(&html, &selectors(), BASE, 100).unwrap();
        assert_eq!(parsed.urls, vec!["https://other.example/x".to_string()]);
    }

    #[test]
    fn invalid_selector_is_reported() {
        let mut bad = selectors();
        bad.item_selector = "::::".into();
        let err = parse_listing("<p></p>", &bad, BASE, 100).unwrap_err();
        assert!(matches!(err, AdapterError::Selector { .. }));
    }

    #[tokio::test]
    async fn scrolling_stops_at_cap() {
        let items = (0..300)
            .map(|i| listing_item(Some(&format!("/a?id={i}")), "D-1"))
            .collect::<Vec<_>>();
        let site = FixtureSite::new().page("https://l", FixturePage::progressive(items, 20, 10));
        let mut session = site.session();
        session.goto("https://l").await.unwrap();

        let outcome = scroll_until_stable(&mut session, ".item", fast_policy(600), 100)
            .await
            .unwrap();
        assert_eq!(outcome.stop, StopReason::ReachedCap);
        assert_eq!(outcome.metrics.item_count, 100);
        assert_eq!(outcome.ticks, 8);
    }

    #[tokio::test]
    async fn scrolling_stops_when_height_stops_growing() {
        let items = (0..3)
            .map(|i| listing_item(Some(&format!("/a?id={i}")), "D-1"))
            .collect::<Vec<_>>();
        let site = FixtureSite::new().page("https://l", FixturePage::progressive(items, 3, 0));
        let mut session = site.session();
        session.goto("https://l").await.unwrap();

        let outcome = scroll_until_stable(&mut session, ".item", fast_policy(600), 100)
            .await
            .unwrap();
        assert_eq!(outcome.stop, StopReason::Exhausted);
        assert_eq!(outcome.ticks, 3);
        assert_eq!(outcome.metrics.item_count, 3);
    }

    #[tokio::test]
    async fn stalled_render_hits_tick_ceiling() {
        let items = vec![listing_item(Some("/a?id=1"), "D-1")];
        let page = FixturePage::progressive(items, 1, 0).with_item_height(1_000_000);
        let site = FixtureSite::new().page("https://l", page);
        let mut session = site.session();
        session.goto("https://l").await.unwrap();

        let outcome = scroll_until_stable(&mut session, ".item", fast_policy(5), 100)
            .await
            .unwrap();
        assert_eq!(outcome.stop, StopReason::TickCeiling);
        assert_eq!(outcome.ticks, 5);
    }

    #[tokio::test]
    async fn collect_listing_reveals_then_filters() {
        let mut items = (0..150)
            .map(|i| listing_item(Some(&format!("/activity/view?id={i}")), "D-5"))
            .collect::<Vec<_>>();
        items[0] = listing_item(Some("/activity/view?id=closed"), "마감");
        let mut profile = SourceProfile::campuspick();
        profile.scroll = fast_policy(600);
        let site = FixtureSite::new().page(&profile.listing_url, FixturePage::progressive(items, 20, 10));
        let mut session = site.session();

        let harvest = collect_listing(&mut session, &profile).await.unwrap();
        assert_eq!(harvest.scroll.stop, StopReason::ReachedCap);
        assert_eq!(harvest.parse.urls.len(), 99);
        assert_eq!(harvest.parse.skipped_closed, 1);
        assert!(harvest.parse.urls.iter().all(|u| !u.ends_with("closed")));
    }

    #[tokio::test]
    async fn listing_navigation_failure_is_an_error() {
        let profile = SourceProfile::campuspick();
        let site = FixtureSite::new();
        let mut session = site.session();
        let err = collect_listing(&mut session, &profile).await.unwrap_err();
        assert!(matches!(err, AdapterError::Navigation { .. }));
    }
}
