//! Integration tests for storage layer
//!
//! Tests the LanceLifecycleStore implementation with real database operations.

use chrono::Utc;
use lethe::forgetting::ForgettingEngine;
use lethe::memory::types::{ForgettingStage, MemoryRecord, StageUpdate};
use lethe::storage::{LanceLifecycleStore, LifecycleStore, RecordFilter};
use lethe::testing::{aged_record, staged_record};
use tempfile::tempdir;

/// Test fixture: Create a test store in a temporary directory
async fn create_test_store() -> (LanceLifecycleStore, tempfile::TempDir) {
    let dir = tempdir().unwrap();
    let store = LanceLifecycleStore::open_or_create(dir.path()).await.unwrap();
    (store, dir)
}

mod record_tests {
    use super::*;

    #[tokio::test]
    async fn test_insert_and_get_roundtrip() {
        let (store, _dir) = create_test_store().await;

        let record = aged_record("m1", "alice", 12, 0.6, 0.2);
        store.insert(&record).await.unwrap();

        let stored = store.get("m1").await.unwrap();
        assert_eq!(stored.memory_id, "m1");
        assert_eq!(stored.user_id, "alice");
        assert_eq!(stored.content, record.content);
        assert_eq!(stored.content_hash, record.content_hash);
        assert_eq!(stored.importance_score, 0.6);
        assert_eq!(stored.forgetting_stage, ForgettingStage::Intact);
        assert_eq!(
            stored.created_at.timestamp_micros(),
            record.created_at.timestamp_micros()
        );
    }

    #[tokio::test]
    async fn test_get_unknown_is_not_found() {
        let (store, _dir) = create_test_store().await;
        assert!(store.get("missing").await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn test_duplicate_insert_rejected() {
        let (store, _dir) = create_test_store().await;
        store.insert(&aged_record("m1", "alice", 1, 0.5, 0.0)).await.unwrap();
        assert!(
            store
                .insert(&aged_record("m1", "alice", 1, 0.5, 0.0))
                .await
                .is_err()
        );
    }

    #[tokio::test]
    async fn test_quotes_in_ids_and_content() {
        let (store, _dir) = create_test_store().await;
        let record = MemoryRecord::new("o'brien-1", "o'brien", "It's the user's favourite");
        store.insert(&record).await.unwrap();

        let update = StageUpdate {
            stage: ForgettingStage::Compressed,
            content: Some("[COMPRESSED] It's short".to_string()),
            compression_ratio: Some(0.4),
            last_accessed: Utc::now(),
        };
        store.upsert_stage("o'brien-1", &update).await.unwrap();

        let stored = store.get("o'brien-1").await.unwrap();
        assert_eq!(stored.content, "[COMPRESSED] It's short");
        assert_eq!(
            store.list_active_memories("o'brien").await.unwrap(),
            vec!["o'brien-1".to_string()]
        );
    }
}

mod update_tests {
    use super::*;

    #[tokio::test]
    async fn test_upsert_stage_writes_all_fields() {
        let (store, _dir) = create_test_store().await;
        store.insert(&aged_record("m1", "alice", 3, 0.5, 0.0)).await.unwrap();

        let now = Utc::now();
        let update = StageUpdate {
            stage: ForgettingStage::Compressed,
            content: Some("[COMPRESSED] kept".to_string()),
            compression_ratio: Some(0.25),
            last_accessed: now,
        };
        store.upsert_stage("m1", &update).await.unwrap();

        let stored = store.get("m1").await.unwrap();
        assert_eq!(stored.forgetting_stage, ForgettingStage::Compressed);
        assert_eq!(stored.content, "[COMPRESSED] kept");
        assert_eq!(stored.compression_ratio, 0.25);
        assert_eq!(
            stored.last_accessed.timestamp_micros(),
            now.timestamp_micros()
        );
    }

    #[tokio::test]
    async fn test_touch_keeps_content() {
        let (store, _dir) = create_test_store().await;
        let record = aged_record("m1", "alice", 3, 0.5, 0.0);
        store.insert(&record).await.unwrap();

        store
            .upsert_stage("m1", &StageUpdate::touch(ForgettingStage::Intact, Utc::now()))
            .await
            .unwrap();

        let stored = store.get("m1").await.unwrap();
        assert_eq!(stored.content, record.content);
        assert_eq!(stored.compression_ratio, 1.0);
        assert!(stored.last_accessed > record.last_accessed);
    }

    #[tokio::test]
    async fn test_upsert_unknown_is_not_found() {
        let (store, _dir) = create_test_store().await;
        let err = store
            .upsert_stage("nope", &StageUpdate::touch(ForgettingStage::Intact, Utc::now()))
            .await
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_increment_access() {
        let (store, _dir) = create_test_store().await;
        store.insert(&aged_record("m1", "alice", 3, 0.5, 0.0)).await.unwrap();

        for _ in 0..3 {
            store.increment_access("m1").await.unwrap();
        }

        assert_eq!(store.get("m1").await.unwrap().access_count, 3);
        assert!(store.increment_access("nope").await.unwrap_err().is_not_found());
    }
}

mod listing_tests {
    use super::*;

    #[tokio::test]
    async fn test_active_listing_is_oldest_first_without_forgotten() {
        let (store, _dir) = create_test_store().await;
        store.insert(&aged_record("new", "alice", 1, 0.5, 0.0)).await.unwrap();
        store.insert(&aged_record("old", "alice", 30, 0.5, 0.0)).await.unwrap();
        store
            .insert(&staged_record("gone", "alice", ForgettingStage::Forgotten, 90, 0.1))
            .await
            .unwrap();
        store.insert(&aged_record("other", "bob", 5, 0.5, 0.0)).await.unwrap();

        let active = store.list_active_memories("alice").await.unwrap();
        assert_eq!(active, vec!["old".to_string(), "new".to_string()]);

        let everything = store.list_user_memories("alice").await.unwrap();
        assert_eq!(everything.len(), 3);
        assert_eq!(everything[0].memory_id, "gone");

        let forgotten = RecordFilter::new()
            .with_user("alice")
            .with_stages(vec![ForgettingStage::Forgotten]);
        let gone = store.list(&forgotten).await.unwrap();
        assert_eq!(gone.len(), 1);
        assert_eq!(gone[0].memory_id, "gone");
    }
}

mod log_tests {
    use super::*;

    #[tokio::test]
    async fn test_transition_log_in_order() {
        let (store, _dir) = create_test_store().await;
        store.insert(&aged_record("m1", "alice", 3, 0.5, 0.0)).await.unwrap();

        store
            .append_log(
                "m1",
                ForgettingStage::Intact,
                ForgettingStage::Compressed,
                "Ready for compression",
            )
            .await
            .unwrap();
        store
            .append_log(
                "m1",
                ForgettingStage::Compressed,
                ForgettingStage::Archived,
                "Ready for archival",
            )
            .await
            .unwrap();

        let log = store.transition_log("m1").await.unwrap();
        assert_eq!(log.len(), 2);
        assert_eq!(log[0].new_stage, ForgettingStage::Compressed);
        assert_eq!(log[1].new_stage, ForgettingStage::Archived);
        assert!(store.transition_log("m2").await.unwrap().is_empty());
    }
}

mod engine_tests {
    use super::*;

    #[tokio::test]
    async fn test_full_pass_persists_across_reopen() {
        let dir = tempdir().unwrap();

        {
            let store = LanceLifecycleStore::open_or_create(dir.path()).await.unwrap();
            store
                .insert(&staged_record("a", "alice", ForgettingStage::Archived, 400, 0.0))
                .await
                .unwrap();
            store
                .insert(&aged_record("b", "alice", 1, 0.9, 0.5))
                .await
                .unwrap();

            let engine = ForgettingEngine::new(&store);
            let summary = engine.run_forgetting_pass("alice", false).await.unwrap();
            assert_eq!(summary.forgotten, vec!["a".to_string()]);
            assert_eq!(summary.compressed, vec!["b".to_string()]);
            assert!(summary.is_clean());
        }

        let store = LanceLifecycleStore::open_or_create(dir.path()).await.unwrap();
        assert_eq!(
            store.get("a").await.unwrap().forgetting_stage,
            ForgettingStage::Forgotten
        );
        assert_eq!(store.transition_log("a").await.unwrap().len(), 1);
        assert_eq!(
            store.list_active_memories("alice").await.unwrap(),
            vec!["b".to_string()]
        );
    }
}
