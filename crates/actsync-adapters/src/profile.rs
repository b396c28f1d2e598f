//! Source profile: where the listing lives and how its markup is read.

use std::path::Path;
use std::time::Duration;

use actsync_core::ActivityField;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

pub const CAMPUSPICK_LISTING_URL: &str = "https://www.campuspick.com/activity";
pub const CAMPUSPICK_BASE_URL: &str = "https://www.campuspick.com";
pub const DEFAULT_MAX_ITEMS: usize = 100;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceProfile {
    pub listing_url: String,
    pub base_url: String,
    #[serde(default = "default_max_items")]
    pub max_items: usize,
    pub listing: ListingSelectors,
    #[serde(default)]
    pub scroll: ScrollPolicy,
    pub fields: Vec<FieldRule>,
}

fn default_max_items() -> usize {
    DEFAULT_MAX_ITEMS
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListingSelectors {
    pub item_selector: String,
    pub link_selector: String,
    #[serde(default = "default_link_attr")]
    pub link_attr: String,
    pub status_selector: String,
    pub closed_marker: String,
}

fn default_link_attr() -> String {
    "href".to_string()
}

/// Bounds for the scroll-until-stable loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScrollPolicy {
    pub step_px: u32,
    pub interval_ms: u64,
    pub max_ticks: u32,
}

impl Default for ScrollPolicy {
    fn default() -> Self {
        Self {
            step_px: 100,
            interval_ms: 100,
            max_ticks: 600,
        }
    }
}

impl ScrollPolicy {
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Locator {
    /// Trimmed text of the first match.
    Text { selector: String },
    /// Trimmed attribute value of the first match.
    Attr { selector: String, attr: String },
    /// Body text of the first `section` whose `heading` text equals `label`.
    Section {
        section: String,
        heading: String,
        label: String,
        body: String,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldRule {
    pub field: ActivityField,
    pub locator: Locator,
    pub default: String,
}

impl FieldRule {
    fn text(field: ActivityField, selector: &str, default: &str) -> Self {
        Self {
            field,
            locator: Locator::Text {
                selector: selector.to_string(),
            },
            default: default.to_string(),
        }
    }

    fn section(field: ActivityField, label: &str, default: &str) -> Self {
        Self {
            field,
            locator: Locator::Section {
                section: ".section".to_string(),
                heading: "h2".to_string(),
                label: label.to_string(),
                body: "p.indent".to_string(),
            },
            default: default.to_string(),
        }
    }
}

impl SourceProfile {
    /// Built-in profile for the campuspick activity board.
    pub fn campuspick() -> Self {
        Self {
            listing_url: CAMPUSPICK_LISTING_URL.to_string(),
            base_url: CAMPUSPICK_BASE_URL.to_string(),
            max_items: DEFAULT_MAX_ITEMS,
            listing: ListingSelectors {
                item_selector: ".item".to_string(),
                link_selector: "a.top".to_string(),
                link_attr: default_link_attr(),
                status_selector: ".dday".to_string(),
                closed_marker: "마감".to_string(),
            },
            scroll: ScrollPolicy::default(),
            fields: vec![
                FieldRule::text(ActivityField::Title, "h1", "제목 없음"),
                FieldRule::text(ActivityField::Organization, ".content p.company", "기관 없음"),
                FieldRule::text(ActivityField::Deadline, ".dday", "마감일 없음"),
                FieldRule::text(ActivityField::ViewCount, ".info .viewcount", "조회수 없음"),
                FieldRule {
                    field: ActivityField::ImageUrl,
                    locator: Locator::Attr {
                        selector: ".poster img".to_string(),
                        attr: "src".to_string(),
                    },
                    default: "이미지 없음".to_string(),
                },
                FieldRule::text(ActivityField::Description, ".description", "설명 없음"),
                FieldRule::section(ActivityField::ReceptionPeriod, "접수 기간", "접수 기간 없음"),
                FieldRule::section(ActivityField::Reward, "시상", "시상 없음"),
            ],
        }
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
        serde_yaml::from_str(&text).with_context(|| format!("parsing {}", path.display()))
    }

    /// Loads `path` when given, otherwise the built-in campuspick profile.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::load(path),
            None => Ok(Self::campuspick()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn campuspick_profile_covers_every_field_once() {
        let profile = SourceProfile::campuspick();
        for field in ActivityField::ALL {
            assert_eq!(
                profile.fields.iter().filter(|r| r.field == field).count(),
                1,
                "{field} should have exactly one rule"
            );
        }
        assert!(profile.fields.iter().all(|r| !r.default.is_empty()));
        assert_eq!(profile.max_items, 100);
    }

    #[test]
    fn yaml_profile_round_trips_with_defaults() {
        let yaml = r#"
listing_url: https://example.test/list
base_url: https://example.test
listing:
  item_selector: li.card
  link_selector: a
  status_selector: .status
  closed_marker: closed
fields:
  - field: title
    locator: { kind: text, selector: h1 }
    default: untitled
  - field: reward
    locator: { kind: section, section: section, heading: h3, label: Prize, body: p }
    default: no prize
"#;
        let profile: SourceProfile = serde_yaml::from_str(yaml).expect("parse profile");
        assert_eq!(profile.max_items, DEFAULT_MAX_ITEMS);
        assert_eq!(profile.listing.link_attr, "href");
        assert_eq!(profile.scroll, ScrollPolicy::default());
        assert_eq!(
            profile.fields[1].locator,
            Locator::Section {
                section: "section".into(),
                heading: "h3".into(),
                label: "Prize".into(),
                body: "p".into(),
            }
        );
    }

    #[test]
    fn load_reads_profile_from_disk() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("profile.yaml");
        let yaml = serde_yaml::to_string(&SourceProfile::campuspick()).expect("serialize");
        std::fs::write(&path, yaml).expect("write");

        let loaded = SourceProfile::load_or_default(Some(&path)).expect("load");
        assert_eq!(loaded, SourceProfile::campuspick());
        assert!(SourceProfile::load(dir.path().join("missing.yaml")).is_err());
    }
}
