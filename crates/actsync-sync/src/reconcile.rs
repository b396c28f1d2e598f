//! Title-keyed upsert of candidate records into the activity store.

use std::collections::HashMap;
use std::sync::Arc;

use actsync_core::ActivityDraft;
use actsync_storage::{ActivityStore, StoreError};
use serde::Serialize;
use tokio::sync::Mutex;
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum UpsertOutcome {
    Inserted,
    Updated,
}

/// Check-then-write reconciliation. The sequence for one title runs under that
/// title's lock, so concurrent callers cannot both observe a miss and insert.
pub struct ReconciliationWriter {
    store: Arc<dyn ActivityStore>,
    per_title: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl ReconciliationWriter {
    pub fn new(store: Arc<dyn ActivityStore>) -> Self {
        Self {
            store,
            per_title: Mutex::new(HashMap::new()),
        }
    }

    pub fn store(&self) -> &Arc<dyn ActivityStore> {
        &self.store
    }

    async fn title_lock(&self, title: &str) -> Arc<Mutex<()>> {
        let mut map = self.per_title.lock().await;
        map.retain(|_, lock| Arc::strong_count(lock) > 1);
        map.entry(title.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    pub async fn reconcile(&self, draft: &ActivityDraft) -> Result<UpsertOutcome, StoreError> {
        let lock = self.title_lock(&draft.title).await;
        let _guard = lock.lock().await;

        match self.store.find_by_title(&draft.title).await {
            Ok(existing) => {
                self.store.update(existing.id, draft).await?;
                Ok(UpsertOutcome::Updated)
            }
            Err(StoreError::NotFound(_)) => {
                self.store.insert(draft).await?;
                Ok(UpsertOutcome::Inserted)
            }
            Err(err) => Err(err),
        }
    }

    /// Reconcile, absorbing store failures: the record is dropped for this run.
    pub async fn apply(&self, draft: &ActivityDraft) -> Option<UpsertOutcome> {
        match self.reconcile(draft).await {
            Ok(outcome) => {
                debug!(title = %draft.title, ?outcome, "reconciled activity");
                Some(outcome)
            }
            Err(err) => {
                warn!(title = %draft.title, error = %err, "persisting activity failed, dropping record");
                None
            }
        }
    }
}
