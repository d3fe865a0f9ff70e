//! Record store contract.
//!
//! Persistence is owned by the surrounding application; this core only needs
//! to read records, list them by status, and apply guarded field updates.
//! The `expected_notified` check in [`RecordStore::update_fields`] is the
//! optimistic read-check-write guard that keeps the at-most-once delivery
//! marker correct under concurrent bulk and single-record use.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use thiserror::Error;

use crate::domain::{Record, RecordId, RecordStatus};

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("record not found: {0}")]
    NotFound(RecordId),
    #[error("record {0} was updated concurrently (notified flag changed)")]
    Conflict(RecordId),
    #[error("store backend failure: {0}")]
    Backend(String),
}

/// Field updates the routing core is allowed to write.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RecordPatch {
    pub status: Option<RecordStatus>,
    pub notified: Option<bool>,
    pub resolved_fulfillment_branch: Option<String>,
}

#[async_trait::async_trait]
pub trait RecordStore: Send + Sync {
    async fn get_by_id(&self, id: &RecordId) -> Result<Record, StoreError>;

    async fn list_by_status(&self, status: RecordStatus) -> Result<Vec<Record>, StoreError>;

    /// Apply a patch if and only if the stored `notified` flag still equals
    /// `expected_notified`; otherwise return [`StoreError::Conflict`] without
    /// writing anything.
    async fn update_fields(
        &self,
        id: &RecordId,
        patch: RecordPatch,
        expected_notified: bool,
    ) -> Result<Record, StoreError>;
}

/// Mutex-over-map store used by tests and the operator CLI.
#[derive(Clone, Default)]
pub struct InMemoryRecordStore {
    records: Arc<Mutex<BTreeMap<RecordId, Record>>>,
}

impl InMemoryRecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn seeded(records: impl IntoIterator<Item = Record>) -> Self {
        let store = Self::new();
        {
            let mut map = store.lock();
            for record in records {
                map.insert(record.id.clone(), record);
            }
        }
        store
    }

    pub fn insert(&self, record: Record) {
        self.lock().insert(record.id.clone(), record);
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, BTreeMap<RecordId, Record>> {
        match self.records.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

#[async_trait::async_trait]
impl RecordStore for InMemoryRecordStore {
    async fn get_by_id(&self, id: &RecordId) -> Result<Record, StoreError> {
        self.lock().get(id).cloned().ok_or_else(|| StoreError::NotFound(id.clone()))
    }

    async fn list_by_status(&self, status: RecordStatus) -> Result<Vec<Record>, StoreError> {
        Ok(self.lock().values().filter(|record| record.status == status).cloned().collect())
    }

    async fn update_fields(
        &self,
        id: &RecordId,
        patch: RecordPatch,
        expected_notified: bool,
    ) -> Result<Record, StoreError> {
        let mut map = self.lock();
        let record = map.get_mut(id).ok_or_else(|| StoreError::NotFound(id.clone()))?;

        if record.notified != expected_notified {
            return Err(StoreError::Conflict(id.clone()));
        }

        if let Some(status) = patch.status {
            record.status = status;
        }
        if let Some(notified) = patch.notified {
            record.notified = notified;
        }
        if let Some(branch) = patch.resolved_fulfillment_branch {
            record.resolved_fulfillment_branch = Some(branch);
        }
        record.updated_at = chrono::Utc::now();

        Ok(record.clone())
    }
}
