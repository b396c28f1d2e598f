//! Core domain model for actsync: candidate and stored activity records.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub const CRATE_NAME: &str = "actsync-core";

/// The eight scraped fields of an activity, in extraction order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivityField {
    Title,
    Organization,
    Deadline,
    ViewCount,
    ImageUrl,
    Description,
    ReceptionPeriod,
    Reward,
}

impl ActivityField {
    pub const ALL: [ActivityField; 8] = [
        ActivityField::Title,
        ActivityField::Organization,
        ActivityField::Deadline,
        ActivityField::ViewCount,
        ActivityField::ImageUrl,
        ActivityField::Description,
        ActivityField::ReceptionPeriod,
        ActivityField::Reward,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ActivityField::Title => "title",
            ActivityField::Organization => "organization",
            ActivityField::Deadline => "deadline",
            ActivityField::ViewCount => "view_count",
            ActivityField::ImageUrl => "image_url",
            ActivityField::Description => "description",
            ActivityField::ReceptionPeriod => "reception_period",
            ActivityField::Reward => "reward",
        }
    }
}

impl fmt::Display for ActivityField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Candidate record produced by detail extraction. `title` is the natural key.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ActivityDraft {
    pub title: String,
    pub organization: String,
    pub deadline: String,
    pub view_count: String,
    pub image_url: String,
    pub description: String,
    pub reception_period: String,
    pub reward: String,
}

impl ActivityDraft {
    pub fn get(&self, field: ActivityField) -> &str {
        match field {
            ActivityField::Title => &self.title,
            ActivityField::Organization => &self.organization,
            ActivityField::Deadline => &self.deadline,
            ActivityField::ViewCount => &self.view_count,
            ActivityField::ImageUrl => &self.image_url,
            ActivityField::Description => &self.description,
            ActivityField::ReceptionPeriod => &self.reception_period,
            ActivityField::Reward => &self.reward,
        }
    }

    pub fn set(&mut self, field: ActivityField, value: String) {
        let slot = match field {
            ActivityField::Title => &mut self.title,
            ActivityField::Organization => &mut self.organization,
            ActivityField::Deadline => &mut self.deadline,
            ActivityField::ViewCount => &mut self.view_count,
            ActivityField::ImageUrl => &mut self.image_url,
            ActivityField::Description => &mut self.description,
            ActivityField::ReceptionPeriod => &mut self.reception_period,
            ActivityField::Reward => &mut self.reward,
        };
        *slot = value;
    }
}

/// Persisted activity. At most one exists per distinct `title`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Activity {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(flatten)]
    pub fields: ActivityDraft,
}

impl Activity {
    pub fn title(&self) -> &str {
        &self.fields.title
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn get_and_set_cover_every_field() {
        let mut draft = ActivityDraft::default();
        for field in ActivityField::ALL {
            draft.set(field, format!("value-{field}"));
        }
        for field in ActivityField::ALL {
            assert_eq!(draft.get(field), format!("value-{}", field.as_str()));
        }
        assert_eq!(draft.view_count, "value-view_count");
    }

    #[test]
    fn stored_activity_serializes_flat() {
        let activity = Activity {
            id: Uuid::nil(),
            created_at: DateTime::parse_from_rfc3339("2026-02-24T12:00:00Z")
                .expect("ts")
                .with_timezone(&Utc),
            updated_at: DateTime::parse_from_rfc3339("2026-02-24T12:00:00Z")
                .expect("ts")
                .with_timezone(&Utc),
            fields: ActivityDraft {
                title: "공모전".into(),
                ..Default::default()
            },
        };
        let value = serde_json::to_value(&activity).expect("serialize");
        assert_eq!(value["title"], "공모전");
        assert!(value.get("fields").is_none());
        assert_eq!(activity.title(), "공모전");
    }
}
