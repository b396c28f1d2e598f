use std::sync::Arc;

use actsync_adapters::fixture::{listing_item, FixturePage, FixtureSite};
use actsync_adapters::{ScrollPolicy, SourceProfile};
use actsync_storage::{ActivityStore, MemoryActivityStore};
use actsync_sync::SyncPipeline;

const DETAIL_1: &str = r#"<html><body>
  <h1>청년 정책 아이디어 공모전</h1>
  <div class="content"><p class="company">청년재단</p></div>
  <span class="dday">D-9</span>
  <div class="info"><span class="viewcount">532</span></div>
  <div class="poster"><img src="https://cdn.campuspick.com/p/1.png"></div>
  <div class="description">청년 정책 아이디어를 기다립니다.</div>
  <div class="section"><h2>접수 기간</h2><p class="indent">2026.04.01 ~ 2026.04.20</p></div>
  <div class="section"><h2>시상</h2><p class="indent">대상 100만원</p></div>
</body></html>"#;

const DETAIL_2: &str = r#"<html><body>
  <h1>글로벌 서포터즈 5기</h1>
  <div class="content"><p class="company">한빛전자</p></div>
  <span class="dday">D-2</span>
</body></html>"#;

fn profile() -> SourceProfile {
    let mut profile = SourceProfile::campuspick();
    profile.scroll = ScrollPolicy {
        step_px: 100,
        interval_ms: 0,
        max_ticks: 50,
    };
    profile
}

fn campus_site(profile: &SourceProfile) -> FixtureSite {
    let items = vec![
        listing_item(Some("/activity/view?id=101"), "D-9"),
        listing_item(Some("/activity/view?id=102"), "마감"),
        listing_item(Some("/activity/view?id=103"), "D-2"),
    ];
    FixtureSite::new()
        .page(&profile.listing_url, FixturePage::progressive(items, 1, 1))
        .page(
            "https://www.campuspick.com/activity/view?id=101",
            FixturePage::html(DETAIL_1),
        )
        .page(
            "https://www.campuspick.com/activity/view?id=103",
            FixturePage::html(DETAIL_2),
        )
}

#[tokio::test]
async fn two_open_items_insert_then_update_on_rerun() {
    let profile = profile();
    let site = campus_site(&profile);
    let store = Arc::new(MemoryActivityStore::new());
    let pipeline = SyncPipeline::new(Arc::new(site.clone()), store.clone(), profile).expect("pipeline");

    let first = pipeline.run_once().await.expect("first run");
    assert_eq!(first.listing_urls, 2);
    assert_eq!(first.skipped_closed, 1);
    assert_eq!(first.extracted, 2);
    assert_eq!((first.inserted, first.updated), (2, 0));
    assert!(!site
        .visits()
        .iter()
        .any(|url| url.ends_with("id=102")));

    let second = pipeline.run_once().await.expect("second run");
    assert_eq!((second.inserted, second.updated), (0, 2));
    assert_eq!(store.len().await, 2);

    let policy = store.find_by_title("청년 정책 아이디어 공모전").await.expect("stored");
    assert_eq!(policy.fields.organization, "청년재단");
    assert_eq!(policy.fields.reward, "대상 100만원");

    let supporters = store.find_by_title("글로벌 서포터즈 5기").await.expect("stored");
    assert_eq!(supporters.fields.view_count, "조회수 없음");
    assert_eq!(supporters.fields.reward, "시상 없음");

    assert_eq!(site.launches(), 2);
    assert_eq!(site.closes(), 2);
}
