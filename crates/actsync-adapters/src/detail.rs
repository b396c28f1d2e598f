//! Detail extraction driven by a declarative (field, locator, default) table.

use actsync_core::{ActivityDraft, ActivityField};
use scraper::{Html, Selector};
use tracing::{debug, warn};

use crate::profile::{FieldRule, Locator};
use crate::session::BrowsingSession;
use crate::{compile_selector, joined_text, text_or_none, AdapterError};

#[derive(Debug)]
enum CompiledLocator {
    Text(Selector),
    Attr(Selector, String),
    Section {
        section: Selector,
        heading: Selector,
        label: String,
        body: Selector,
    },
}

#[derive(Debug)]
struct CompiledRule {
    field: ActivityField,
    locator: CompiledLocator,
    default: String,
}

/// Field rules with selectors compiled once, validated to cover every field.
#[derive(Debug)]
pub struct FieldTable {
    rules: Vec<CompiledRule>,
}

impl FieldTable {
    pub fn compile(rules: &[FieldRule]) -> Result<Self, AdapterError> {
        for field in ActivityField::ALL {
            let count = rules.iter().filter(|r| r.field == field).count();
            if count != 1 {
                return Err(AdapterError::Message(format!(
                    "field table must define {field} exactly once, found {count}"
                )));
            }
        }

        let mut compiled = Vec::with_capacity(rules.len());
        for rule in rules {
            if rule.default.trim().is_empty() {
                return Err(AdapterError::Message(format!(
                    "field {} needs a non-empty default",
                    rule.field
                )));
            }
            let locator = match &rule.locator {
                Locator::Text { selector } => CompiledLocator::Text(compile_selector(selector)?),
                Locator::Attr { selector, attr } => {
                    CompiledLocator::Attr(compile_selector(selector)?, attr.clone())
                }
                Locator::Section {
                    section,
                    heading,
                    label,
                    body,
                } => CompiledLocator::Section {
                    section: compile_selector(section)?,
                    heading: compile_selector(heading)?,
                    label: label.trim().to_string(),
                    body: compile_selector(body)?,
                },
            };
            compiled.push(CompiledRule {
                field: rule.field,
                locator,
                default: rule.default.clone(),
            });
        }
        Ok(Self { rules: compiled })
    }

    /// Best-effort per field: anything not found takes that field's default.
    pub fn extract(&self, html: &str) -> ActivityDraft {
        let document = Html::parse_document(html);
        let mut draft = ActivityDraft::default();
        for rule in &self.rules {
            let value = locate(&document, &rule.locator);
            if value.is_none() {
                debug!(field = %rule.field, "field not found, using default");
            }
            draft.set(rule.field, value.unwrap_or_else(|| rule.default.clone()));
        }
        draft
    }
}

// Text reads join every match, sections included, the way a jQuery-style
// `.text()` does. Attribute reads take the first match.
fn locate(document: &Html, locator: &CompiledLocator) -> Option<String> {
    match locator {
        CompiledLocator::Text(selector) => joined_text(document.select(selector)),
        CompiledLocator::Attr(selector, attr) => document
            .select(selector)
            .next()
            .and_then(|n| n.value().attr(attr))
            .and_then(|v| text_or_none(v.to_string())),
        CompiledLocator::Section {
            section,
            heading,
            label,
            body,
        } => joined_text(
            document
                .select(section)
                .filter(|s| s.select(heading).flat_map(|h| h.text()).collect::<String>().trim() == label)
                .flat_map(|s| s.select(body)),
        ),
    }
}

pub struct DetailExtractor {
    table: FieldTable,
}

impl DetailExtractor {
    pub fn new(table: FieldTable) -> Self {
        Self { table }
    }

    /// Load one detail page into a draft, or `None` when the page cannot be read.
    pub async fn extract(&self, session: &mut dyn BrowsingSession, url: &str) -> Option<ActivityDraft> {
        match self.try_extract(session, url).await {
            Ok(draft) => Some(draft),
            Err(err) => {
                warn!(url, error = %err, "detail extraction failed, skipping item");
                None
            }
        }
    }

    async fn try_extract(&self, session: &mut dyn BrowsingSession, url: &str) -> Result<ActivityDraft, AdapterError> {
        session.goto(url).await?;
        let html = session.content().await?;
        Ok(self.table.extract(&html))
    }
}
