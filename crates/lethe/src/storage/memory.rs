//! In-process lifecycle store
//!
//! Records live in a sharded concurrent map, so each record is updated under
//! its shard's write lock and concurrent access bumps are never lost. Useful
//! for tests and for embedding the engine without a data directory.

use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;

use crate::error::{LetheError, Result};
use crate::memory::types::{ForgettingStage, MemoryRecord, StageUpdate, TransitionLogEntry};
use crate::storage::{LifecycleStore, RecordFilter, sort_oldest_first};

#[derive(Debug, Default)]
pub struct InMemoryLifecycleStore {
    records: DashMap<String, MemoryRecord>,
    log: DashMap<String, Vec<TransitionLogEntry>>,
}

impl InMemoryLifecycleStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// All records matching `filter`, oldest first
    pub fn list(&self, filter: &RecordFilter) -> Vec<MemoryRecord> {
        let mut records: Vec<MemoryRecord> = self
            .records
            .iter()
            .filter(|entry| filter.matches(entry.value()))
            .map(|entry| entry.value().clone())
            .collect();
        sort_oldest_first(&mut records);
        records
    }

    /// Copy of every stored record, oldest first
    pub fn snapshot(&self) -> Vec<MemoryRecord> {
        self.list(&RecordFilter::new())
    }

    /// Total number of audit entries across all memories
    pub fn log_len(&self) -> usize {
        self.log.iter().map(|entry| entry.value().len()).sum()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[async_trait]
impl LifecycleStore for InMemoryLifecycleStore {
    async fn insert(&self, record: &MemoryRecord) -> Result<()> {
        match self.records.entry(record.memory_id.clone()) {
            Entry::Occupied(_) => Err(LetheError::Storage(format!(
                "Memory already exists: {}",
                record.memory_id
            ))),
            Entry::Vacant(slot) => {
                slot.insert(record.clone());
                Ok(())
            }
        }
    }

    async fn get(&self, memory_id: &str) -> Result<MemoryRecord> {
        self.records
            .get(memory_id)
            .map(|record| record.value().clone())
            .ok_or_else(|| LetheError::NotFound(memory_id.to_string()))
    }

    async fn upsert_stage(&self, memory_id: &str, update: &StageUpdate) -> Result<()> {
        let mut record = self
            .records
            .get_mut(memory_id)
            .ok_or_else(|| LetheError::NotFound(memory_id.to_string()))?;
        update.apply_to(record.value_mut());
        Ok(())
    }

    async fn append_log(
        &self,
        memory_id: &str,
        old_stage: ForgettingStage,
        new_stage: ForgettingStage,
        reason: &str,
    ) -> Result<()> {
        self.log
            .entry(memory_id.to_string())
            .or_default()
            .push(TransitionLogEntry::new(memory_id, old_stage, new_stage, reason));
        Ok(())
    }

    async fn list_active_memories(&self, user_id: &str) -> Result<Vec<String>> {
        Ok(self
            .list(&RecordFilter::active_for(user_id))
            .into_iter()
            .map(|record| record.memory_id)
            .collect())
    }

    async fn increment_access(&self, memory_id: &str) -> Result<()> {
        let mut record = self
            .records
            .get_mut(memory_id)
            .ok_or_else(|| LetheError::NotFound(memory_id.to_string()))?;
        record.value_mut().mark_accessed(Utc::now());
        Ok(())
    }

    async fn transition_log(&self, memory_id: &str) -> Result<Vec<TransitionLogEntry>> {
        Ok(self
            .log
            .get(memory_id)
            .map(|entries| entries.value().clone())
            .unwrap_or_default())
    }

    async fn list_user_memories(&self, user_id: &str) -> Result<Vec<MemoryRecord>> {
        Ok(self.list(&RecordFilter::new().with_user(user_id)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn record(id: &str, user: &str, age_days: i64) -> MemoryRecord {
        MemoryRecord::new(id, user, format!("content of {id}"))
            .with_created_at(Utc::now() - Duration::days(age_days))
    }

    #[tokio::test]
    async fn test_insert_and_get() {
        let store = InMemoryLifecycleStore::new();
        let memory = record("m1", "alice", 1);
        store.insert(&memory).await.unwrap();

        assert_eq!(store.get("m1").await.unwrap(), memory);
        assert!(store.get("missing").await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn test_duplicate_insert_rejected() {
        let store = InMemoryLifecycleStore::new();
        store.insert(&record("m1", "alice", 1)).await.unwrap();

        let err = store.insert(&record("m1", "alice", 2)).await.unwrap_err();
        assert!(matches!(err, LetheError::Storage(_)));
    }

    #[tokio::test]
    async fn test_list_active_orders_oldest_first_and_skips_forgotten() {
        let store = InMemoryLifecycleStore::new();
        store.insert(&record("young", "alice", 1)).await.unwrap();
        store.insert(&record("old", "alice", 10)).await.unwrap();
        store.insert(&record("bobs", "bob", 20)).await.unwrap();

        let mut gone = record("gone", "alice", 30);
        gone.forgetting_stage = ForgettingStage::Forgotten;
        store.insert(&gone).await.unwrap();

        let active = store.list_active_memories("alice").await.unwrap();
        assert_eq!(active, vec!["old".to_string(), "young".to_string()]);

        let all = store.list_user_memories("alice").await.unwrap();
        assert_eq!(all.len(), 3);
        assert_eq!(all[0].memory_id, "gone");
    }

    #[tokio::test]
    async fn test_upsert_stage_and_log() {
        let store = InMemoryLifecycleStore::new();
        store.insert(&record("m1", "alice", 1)).await.unwrap();

        let now = Utc::now();
        let update = StageUpdate {
            stage: ForgettingStage::Compressed,
            content: Some("[COMPRESSED] short".to_string()),
            compression_ratio: Some(0.3),
            last_accessed: now,
        };
        store.upsert_stage("m1", &update).await.unwrap();
        store
            .append_log(
                "m1",
                ForgettingStage::Intact,
                ForgettingStage::Compressed,
                "Ready for compression",
            )
            .await
            .unwrap();

        let stored = store.get("m1").await.unwrap();
        assert_eq!(stored.forgetting_stage, ForgettingStage::Compressed);
        assert_eq!(stored.content, "[COMPRESSED] short");
        assert_eq!(stored.compression_ratio, 0.3);
        assert_eq!(stored.last_accessed, now);

        let log = store.transition_log("m1").await.unwrap();
        assert_eq!(log.len(), 1);
        assert_eq!(log[0].reason, "Ready for compression");
        assert_eq!(store.log_len(), 1);
    }

    #[tokio::test]
    async fn test_upsert_unknown_is_not_found() {
        let store = InMemoryLifecycleStore::new();
        let err = store
            .upsert_stage(
                "nope",
                &StageUpdate::touch(ForgettingStage::Intact, Utc::now()),
            )
            .await
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_increment_access() {
        let store = InMemoryLifecycleStore::new();
        store.insert(&record("m1", "alice", 3)).await.unwrap();

        store.increment_access("m1").await.unwrap();
        store.increment_access("m1").await.unwrap();

        let stored = store.get("m1").await.unwrap();
        assert_eq!(stored.access_count, 2);
        assert!(stored.last_accessed > stored.created_at);
    }
}
