//! Lifecycle persistence
//!
//! [`LifecycleStore`] is the seam between the forgetting engine and durable
//! storage: one record per memory id plus an append-only transition log.
//! Implementations must make each record write atomic and serialize
//! concurrent writes to the same id.

pub mod filter;
pub mod lance;
pub mod memory;

use async_trait::async_trait;

use crate::error::Result;
use crate::memory::types::{ForgettingStage, MemoryRecord, StageUpdate, TransitionLogEntry};

pub use filter::RecordFilter;
pub use lance::LanceLifecycleStore;
pub use memory::InMemoryLifecycleStore;

/// Durable storage of lifecycle records and their transition log
#[async_trait]
pub trait LifecycleStore: Send + Sync {
    /// Register a new record; an existing id is a storage error
    async fn insert(&self, record: &MemoryRecord) -> Result<()>;

    /// Fetch one record, `NotFound` for unknown ids
    async fn get(&self, memory_id: &str) -> Result<MemoryRecord>;

    /// Write stage, content, ratio and `last_accessed` together or not at all
    async fn upsert_stage(&self, memory_id: &str, update: &StageUpdate) -> Result<()>;

    /// Append one audit entry
    async fn append_log(
        &self,
        memory_id: &str,
        old_stage: ForgettingStage,
        new_stage: ForgettingStage,
        reason: &str,
    ) -> Result<()>;

    /// Ids of the user's non-forgotten memories, oldest first
    async fn list_active_memories(&self, user_id: &str) -> Result<Vec<String>>;

    /// Bump `access_count` and stamp `last_accessed`
    async fn increment_access(&self, memory_id: &str) -> Result<()>;

    /// Audit entries for one memory, oldest first
    async fn transition_log(&self, memory_id: &str) -> Result<Vec<TransitionLogEntry>>;

    /// Every record of the user, forgotten ones included, oldest first
    async fn list_user_memories(&self, user_id: &str) -> Result<Vec<MemoryRecord>>;
}

/// Oldest-created first, ties broken by id so listings are stable
pub(crate) fn sort_oldest_first(records: &mut [MemoryRecord]) {
    records.sort_by(|a, b| {
        a.created_at
            .cmp(&b.created_at)
            .then_with(|| a.memory_id.cmp(&b.memory_id))
    });
}
