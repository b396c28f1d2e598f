use std::collections::BTreeMap;

use actsync_core::{Activity, ActivityDraft};
use anyhow::Context;
use async_trait::async_trait;
use chrono::Utc;
use sqlx::postgres::{PgPoolOptions, PgRow};
use sqlx::{PgPool, Row};
use thiserror::Error;
use tokio::sync::Mutex;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum StoreError {
    /// Expected miss signal for title lookups, distinct from real failures.
    #[error("no activity stored for title {0:?}")]
    NotFound(String),
    #[error("an activity titled {0:?} already exists")]
    Duplicate(String),
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Persistence seam for stored activities, keyed by title.
#[async_trait]
pub trait ActivityStore: Send + Sync {
    async fn find_by_title(&self, title: &str) -> Result<Activity, StoreError>;

    async fn update(&self, id: Uuid, draft: &ActivityDraft) -> Result<(), StoreError>;

    async fn insert(&self, draft: &ActivityDraft) -> Result<Uuid, StoreError>;

    async fn list(&self) -> Result<Vec<Activity>, StoreError>;
}

pub async fn migrate(pool: &PgPool) -> anyhow::Result<()> {
    sqlx::migrate!("../../migrations")
        .run(pool)
        .await
        .context("running activities migrations")
}

#[derive(Debug, Clone)]
pub struct PgActivityStore {
    pool: PgPool,
}

impl PgActivityStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn connect(database_url: &str) -> anyhow::Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(5)
            .connect(database_url)
            .await
            .context("connecting to activities database")?;
        Ok(Self::new(pool))
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

fn activity_from_row(row: &PgRow) -> Result<Activity, sqlx::Error> {
    Ok(Activity {
        id: row.try_get("id")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
        fields: ActivityDraft {
            title: row.try_get("title")?,
            organization: row.try_get("organization")?,
            deadline: row.try_get("deadline")?,
            view_count: row.try_get("view_count")?,
            image_url: row.try_get("image_url")?,
            description: row.try_get("description")?,
            reception_period: row.try_get("reception_period")?,
            reward: row.try_get("reward")?,
        },
    })
}

/// Writes that collide with the unique title index are reported as duplicates.
fn write_error(err: sqlx::Error, title: &str) -> StoreError {
    let unique = err
        .as_database_error()
        .map(|db| db.is_unique_violation())
        .unwrap_or(false);
    if unique {
        StoreError::Duplicate(title.to_string())
    } else {
        StoreError::Database(err)
    }
}

#[async_trait]
impl ActivityStore for PgActivityStore {
    async fn find_by_title(&self, title: &str) -> Result<Activity, StoreError> {
        let row = sqlx::query(
            r#"
            SELECT id, title, organization, deadline, view_count, image_url,
                   description, reception_period, reward, created_at, updated_at
              FROM activities
             WHERE title = $1
            "#,
        )
        .bind(title)
        .fetch_one(&self.pool)
        .await
        .map_err(|err| match err {
            sqlx::Error::RowNotFound => StoreError::NotFound(title.to_string()),
            other => StoreError::Database(other),
        })?;
        Ok(activity_from_row(&row)?)
    }

    async fn update(&self, id: Uuid, draft: &ActivityDraft) -> Result<(), StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE activities
               SET title = $2,
                   organization = $3,
                   deadline = $4,
                   view_count = $5,
                   image_url = $6,
                   description = $7,
                   reception_period = $8,
                   reward = $9,
                   updated_at = NOW()
             WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(&draft.title)
        .bind(&draft.organization)
        .bind(&draft.deadline)
        .bind(&draft.view_count)
        .bind(&draft.image_url)
        .bind(&draft.description)
        .bind(&draft.reception_period)
        .bind(&draft.reward)
        .execute(&self.pool)
        .await
        .map_err(|err| write_error(err, &draft.title))?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(draft.title.clone()));
        }
        Ok(())
    }

    async fn insert(&self, draft: &ActivityDraft) -> Result<Uuid, StoreError> {
        let id = Uuid::new_v4();
        sqlx::query(
            r#"
            INSERT INTO activities (
                id, title, organization, deadline, view_count, image_url,
                description, reception_period, reward
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(id)
        .bind(&draft.title)
        .bind(&draft.organization)
        .bind(&draft.deadline)
        .bind(&draft.view_count)
        .bind(&draft.image_url)
        .bind(&draft.description)
        .bind(&draft.reception_period)
        .bind(&draft.reward)
        .execute(&self.pool)
        .await
        .map_err(|err| write_error(err, &draft.title))?;
        Ok(id)
    }

    async fn list(&self) -> Result<Vec<Activity>, StoreError> {
        let rows = sqlx::query(
            r#"
            SELECT id, title, organization, deadline, view_count, image_url,
                   description, reception_period, reward, created_at, updated_at
              FROM activities
             ORDER BY updated_at DESC, created_at DESC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        let mut out = Vec::with_capacity(rows.len());
        for row in &rows {
            out.push(activity_from_row(row)?);
        }
        Ok(out)
    }
}

/// In-process store with the same title-uniqueness rule as the Postgres schema.
#[derive(Debug, Default)]
pub struct MemoryActivityStore {
    rows: Mutex<BTreeMap<Uuid, Activity>>,
}

impl MemoryActivityStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.rows.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.rows.lock().await.is_empty()
    }
}

#[async_trait]
impl ActivityStore for MemoryActivityStore {
    async fn find_by_title(&self, title: &str) -> Result<Activity, StoreError> {
        self.rows
            .lock()
            .await
            .values()
            .find(|a| a.fields.title == title)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(title.to_string()))
    }

    async fn update(&self, id: Uuid, draft: &ActivityDraft) -> Result<(), StoreError> {
        let mut rows = self.rows.lock().await;
        if rows
            .values()
            .any(|a| a.id != id && a.fields.title == draft.title)
        {
            return Err(StoreError::Duplicate(draft.title.clone()));
        }
        let activity = rows
            .get_mut(&id)
            .ok_or_else(|| StoreError::NotFound(draft.title.clone()))?;
        activity.fields = draft.clone();
        activity.updated_at = Utc::now();
        Ok(())
    }

    async fn insert(&self, draft: &ActivityDraft) -> Result<Uuid, StoreError> {
        let mut rows = self.rows.lock().await;
        if rows.values().any(|a| a.fields.title == draft.title) {
            return Err(StoreError::Duplicate(draft.title.clone()));
        }
        let now = Utc::now();
        let id = Uuid::new_v4();
        rows.insert(
            id,
            Activity {
                id,
                created_at: now,
                updated_at: now,
                fields: draft.clone(),
            },
        );
        Ok(id)
    }

    async fn list(&self) -> Result<Vec<Activity>, StoreError> {
        let mut out = self.rows.lock().await.values().cloned().collect::<Vec<_>>();
        out.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        Ok(out)
    }
}
