//! Test utilities for lethe - record fixtures and a fault-injecting store
//!
//! [`FlakyStore`] wraps any [`LifecycleStore`] and fails chosen operations so
//! tests can exercise the forgetting pass's per-memory error handling. It
//! also counts writes, which makes "a dry run writes nothing" checkable
//! against any backend.

use std::collections::HashSet;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use chrono::{Duration, Utc};

use crate::error::{LetheError, Result};
use crate::memory::types::{ForgettingStage, MemoryRecord, StageUpdate, TransitionLogEntry};
use crate::storage::LifecycleStore;

/// A record of `user_id` created `age_days` ago with the given scores
pub fn aged_record(
    memory_id: &str,
    user_id: &str,
    age_days: i64,
    importance: f32,
    emotional: f32,
) -> MemoryRecord {
    MemoryRecord::new(
        memory_id,
        user_id,
        format!("Memory {memory_id} was stored for the test suite"),
    )
    .with_importance(importance)
    .with_emotional_score(emotional)
    .with_created_at(Utc::now() - Duration::days(age_days))
}

/// Same as [`aged_record`] but already sitting at `stage`
pub fn staged_record(
    memory_id: &str,
    user_id: &str,
    stage: ForgettingStage,
    age_days: i64,
    importance: f32,
) -> MemoryRecord {
    let mut record = aged_record(memory_id, user_id, age_days, importance, 0.0);
    record.forgetting_stage = stage;
    if stage != ForgettingStage::Intact {
        record.compression_ratio = 0.5;
    }
    record
}

/// Store wrapper that injects failures for selected ids
pub struct FlakyStore<S> {
    inner: S,
    failing_reads: Mutex<HashSet<String>>,
    failing_writes: Mutex<HashSet<String>>,
    failing_logs: Mutex<HashSet<String>>,
    fail_listing: AtomicBool,
    writes: AtomicUsize,
}

impl<S: LifecycleStore> FlakyStore<S> {
    pub fn new(inner: S) -> Self {
        Self {
            inner,
            failing_reads: Mutex::new(HashSet::new()),
            failing_writes: Mutex::new(HashSet::new()),
            failing_logs: Mutex::new(HashSet::new()),
            fail_listing: AtomicBool::new(false),
            writes: AtomicUsize::new(0),
        }
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }

    /// Make `get` fail for `memory_id`
    pub fn fail_reads_of(&self, memory_id: &str) {
        lock(&self.failing_reads).insert(memory_id.to_string());
    }

    /// Make `upsert_stage` fail for `memory_id`
    pub fn fail_writes_of(&self, memory_id: &str) {
        lock(&self.failing_writes).insert(memory_id.to_string());
    }

    /// Make `append_log` fail for `memory_id` while stage writes still land
    pub fn fail_logs_of(&self, memory_id: &str) {
        lock(&self.failing_logs).insert(memory_id.to_string());
    }

    /// Make `list_active_memories` fail
    pub fn fail_listing(&self) {
        self.fail_listing.store(true, Ordering::SeqCst);
    }

    /// Number of successful lifecycle writes (stage updates and log entries)
    pub fn writes(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    fn read_fails(&self, memory_id: &str) -> bool {
        lock(&self.failing_reads).contains(memory_id)
    }

    fn write_fails(&self, memory_id: &str) -> bool {
        lock(&self.failing_writes).contains(memory_id)
    }

    fn log_fails(&self, memory_id: &str) -> bool {
        lock(&self.failing_logs).contains(memory_id)
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn injected(operation: &str, memory_id: &str) -> LetheError {
    LetheError::Storage(format!("injected {operation} failure for {memory_id}"))
}

#[async_trait]
impl<S: LifecycleStore> LifecycleStore for FlakyStore<S> {
    async fn insert(&self, record: &MemoryRecord) -> Result<()> {
        self.inner.insert(record).await
    }

    async fn get(&self, memory_id: &str) -> Result<MemoryRecord> {
        if self.read_fails(memory_id) {
            return Err(injected("read", memory_id));
        }
        self.inner.get(memory_id).await
    }

    async fn upsert_stage(&self, memory_id: &str, update: &StageUpdate) -> Result<()> {
        if self.write_fails(memory_id) {
            return Err(injected("write", memory_id));
        }
        self.inner.upsert_stage(memory_id, update).await?;
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn append_log(
        &self,
        memory_id: &str,
        old_stage: ForgettingStage,
        new_stage: ForgettingStage,
        reason: &str,
    ) -> Result<()> {
        if self.log_fails(memory_id) {
            return Err(injected("log", memory_id));
        }
        self.inner
            .append_log(memory_id, old_stage, new_stage, reason)
            .await?;
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn list_active_memories(&self, user_id: &str) -> Result<Vec<String>> {
        if self.fail_listing.load(Ordering::SeqCst) {
            return Err(LetheError::Storage(format!(
                "injected listing failure for {user_id}"
            )));
        }
        self.inner.list_active_memories(user_id).await
    }

    async fn increment_access(&self, memory_id: &str) -> Result<()> {
        self.inner.increment_access(memory_id).await
    }

    async fn transition_log(&self, memory_id: &str) -> Result<Vec<TransitionLogEntry>> {
        self.inner.transition_log(memory_id).await
    }

    async fn list_user_memories(&self, user_id: &str) -> Result<Vec<MemoryRecord>> {
        self.inner.list_user_memories(user_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::InMemoryLifecycleStore;

    #[test]
    fn aged_record_is_backdated() {
        let record = aged_record("m1", "alice", 10, 0.3, 0.4);
        assert_eq!((Utc::now() - record.created_at).num_days(), 10);
        assert_eq!(record.importance_score, 0.3);
        assert_eq!(record.emotional_score, 0.4);
    }

    #[tokio::test]
    async fn flaky_store_fails_selected_ids_only() {
        let store = FlakyStore::new(InMemoryLifecycleStore::new());
        store.insert(&aged_record("ok", "alice", 1, 0.5, 0.0)).await.unwrap();
        store.insert(&aged_record("bad", "alice", 1, 0.5, 0.0)).await.unwrap();
        store.fail_reads_of("bad");

        assert!(store.get("ok").await.is_ok());
        assert!(matches!(
            store.get("bad").await,
            Err(LetheError::Storage(_))
        ));
    }

    #[tokio::test]
    async fn flaky_store_counts_writes() {
        let store = FlakyStore::new(InMemoryLifecycleStore::new());
        store.insert(&aged_record("m1", "alice", 1, 0.5, 0.0)).await.unwrap();

        store
            .upsert_stage(
                "m1",
                &StageUpdate::touch(ForgettingStage::Intact, Utc::now()),
            )
            .await
            .unwrap();
        assert_eq!(store.writes(), 1);

        store.fail_writes_of("m1");
        assert!(
            store
                .upsert_stage(
                    "m1",
                    &StageUpdate::touch(ForgettingStage::Intact, Utc::now())
                )
                .await
                .is_err()
        );
        assert_eq!(store.writes(), 1);
    }

    #[tokio::test]
    async fn flaky_store_fails_logs_independently_of_writes() {
        let store = FlakyStore::new(InMemoryLifecycleStore::new());
        store.insert(&aged_record("m1", "alice", 1, 0.5, 0.0)).await.unwrap();
        store.fail_logs_of("m1");

        let update = StageUpdate::touch(ForgettingStage::Intact, Utc::now());
        assert!(store.upsert_stage("m1", &update).await.is_ok());
        assert!(
            store
                .append_log(
                    "m1",
                    ForgettingStage::Intact,
                    ForgettingStage::Compressed,
                    "Ready for compression"
                )
                .await
                .is_err()
        );
        assert_eq!(store.writes(), 1);
        assert!(store.transition_log("m1").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn flaky_store_fails_listing() {
        let store = FlakyStore::new(InMemoryLifecycleStore::new());
        store.fail_listing();
        assert!(store.list_active_memories("alice").await.is_err());
    }
}
