//! Forgetting pass orchestration
//!
//! Walks a user's active memories oldest first, scores each one and moves it
//! at most one step along its lifecycle. Memories are processed sequentially;
//! a failure on one memory is recorded in the summary and the pass moves on.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::config::{Config, ForgettingConfig, ScoringConfig};
use crate::error::{LetheError, Result};
use crate::memory::compress::{compress, next_compression_ratio};
use crate::memory::score::calculate_score;
use crate::memory::stage::{Decision, Outcome, evaluate};
use crate::memory::types::{MemoryRecord, StageUpdate};
use crate::storage::LifecycleStore;

/// A memory the pass could not process
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PassError {
    pub memory_id: String,
    pub message: String,
}

/// Memory ids of one forgetting pass, bucketed by outcome in processing order
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ActionSummary {
    pub compressed: Vec<String>,
    pub archived: Vec<String>,
    pub forgotten: Vec<String>,
    pub retained: Vec<String>,
    pub errors: Vec<PassError>,
    pub dry_run: bool,
}

impl ActionSummary {
    fn new(dry_run: bool) -> Self {
        Self {
            dry_run,
            ..Self::default()
        }
    }

    fn record(&mut self, outcome: Outcome, memory_id: &str) {
        let bucket = match outcome {
            Outcome::Compressed => &mut self.compressed,
            Outcome::Archived => &mut self.archived,
            Outcome::Forgotten => &mut self.forgotten,
            Outcome::Retained => &mut self.retained,
        };
        bucket.push(memory_id.to_string());
    }

    fn record_error(&mut self, memory_id: &str, error: &LetheError) {
        self.errors.push(PassError {
            memory_id: memory_id.to_string(),
            message: error.to_string(),
        });
    }

    /// Number of memories the pass looked at
    pub fn total(&self) -> usize {
        self.compressed.len() + self.archived.len() + self.forgotten.len() + self.retained.len()
    }

    /// True when no memory failed
    pub fn is_clean(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Applies the lifecycle policy to a store
pub struct ForgettingEngine<'a> {
    store: &'a dyn LifecycleStore,
    config: ForgettingConfig,
    weights: ScoringConfig,
}

impl<'a> ForgettingEngine<'a> {
    pub fn new(store: &'a dyn LifecycleStore) -> Self {
        Self {
            store,
            config: ForgettingConfig::default(),
            weights: ScoringConfig::default(),
        }
    }

    pub fn with_config(store: &'a dyn LifecycleStore, config: ForgettingConfig) -> Result<Self> {
        Self::with_configs(store, config, ScoringConfig::default())
    }

    pub fn with_configs(
        store: &'a dyn LifecycleStore,
        config: ForgettingConfig,
        weights: ScoringConfig,
    ) -> Result<Self> {
        config.validate()?;
        weights.validate()?;
        Ok(Self {
            store,
            config,
            weights,
        })
    }

    /// Build an engine from the `[forgetting]` and `[scoring]` sections
    pub fn from_config(store: &'a dyn LifecycleStore, config: &Config) -> Result<Self> {
        Self::with_configs(store, config.forgetting, config.scoring)
    }

    pub fn config(&self) -> &ForgettingConfig {
        &self.config
    }

    pub fn weights(&self) -> &ScoringConfig {
        &self.weights
    }

    /// Score `record` at `now` and decide its next stage
    pub fn evaluate_record(&self, record: &MemoryRecord, now: DateTime<Utc>) -> Decision {
        let score = calculate_score(record, now, self.config.half_life_days, &self.weights);
        evaluate(record, score, &self.config)
    }

    /// Run one pass over the user's non-forgotten memories.
    ///
    /// With `dry_run` nothing is written and a memory is counted as forgotten
    /// exactly when a real pass would forget it; everything else is counted as
    /// retained. Fails only when the active memory list cannot be loaded.
    pub async fn run_forgetting_pass(&self, user_id: &str, dry_run: bool) -> Result<ActionSummary> {
        let memory_ids = self.store.list_active_memories(user_id).await?;
        let mut summary = ActionSummary::new(dry_run);

        tracing::info!(
            user_id,
            dry_run,
            count = memory_ids.len(),
            "Starting forgetting pass"
        );

        for memory_id in &memory_ids {
            let now = Utc::now();
            let result = if dry_run {
                self.preview_memory(memory_id, now)
                    .await
                    .map(|outcome| (outcome, None))
            } else {
                self.process_memory(memory_id, now).await
            };

            match result {
                Ok((outcome, log_error)) => {
                    summary.record(outcome, memory_id);
                    if let Some(e) = log_error {
                        tracing::warn!(memory_id = %memory_id, error = %e, "Failed to log transition");
                        summary.record_error(memory_id, &e);
                    }
                }
                Err(e) => {
                    tracing::warn!(memory_id = %memory_id, error = %e, "Failed to process memory");
                    summary.record(Outcome::Retained, memory_id);
                    summary.record_error(memory_id, &e);
                }
            }
        }

        tracing::info!(
            user_id,
            dry_run,
            compressed = summary.compressed.len(),
            archived = summary.archived.len(),
            forgotten = summary.forgotten.len(),
            retained = summary.retained.len(),
            errors = summary.errors.len(),
            "Forgetting pass complete"
        );

        Ok(summary)
    }

    async fn preview_memory(&self, memory_id: &str, now: DateTime<Utc>) -> Result<Outcome> {
        let record = self.store.get(memory_id).await?;
        let decision = self.evaluate_record(&record, now);

        tracing::debug!(
            memory_id,
            score = decision.score.final_score,
            to = %decision.to,
            "Dry run decision"
        );

        if decision.forgets() {
            Ok(Outcome::Forgotten)
        } else {
            Ok(Outcome::Retained)
        }
    }

    /// Apply one decision. Once the record write commits the outcome stands;
    /// a failed audit append is handed back alongside it.
    async fn process_memory(
        &self,
        memory_id: &str,
        now: DateTime<Utc>,
    ) -> Result<(Outcome, Option<LetheError>)> {
        let record = self.store.get(memory_id).await?;
        let decision = self.evaluate_record(&record, now);

        if !decision.is_transition() {
            self.store
                .upsert_stage(memory_id, &StageUpdate::touch(record.forgetting_stage, now))
                .await?;
            return Ok((Outcome::Retained, None));
        }

        let update = match decision.outcome {
            Outcome::Compressed => {
                let compressed = compress(&record.content);
                let ratio =
                    next_compression_ratio(record.compression_ratio, &record.content, &compressed);
                StageUpdate {
                    stage: decision.to,
                    content: (compressed != record.content).then_some(compressed),
                    compression_ratio: Some(ratio),
                    last_accessed: now,
                }
            }
            _ => StageUpdate::touch(decision.to, now),
        };

        // Record first, then the audit entry.
        self.store.upsert_stage(memory_id, &update).await?;

        tracing::debug!(
            memory_id,
            from = %decision.from,
            to = %decision.to,
            reason = %decision.reason,
            "Memory transitioned"
        );

        let log_error = self
            .store
            .append_log(memory_id, decision.from, decision.to, &decision.reason)
            .await
            .err();

        Ok((decision.outcome, log_error))
    }

    /// Whether the policy would forget `memory_id` on a pass run now, with
    /// the policy's reason. `threshold` overrides the configured forgetting
    /// threshold for this check only.
    pub async fn should_forget(
        &self,
        memory_id: &str,
        threshold: Option<f32>,
    ) -> Result<(bool, String)> {
        let record = self.store.get(memory_id).await?;

        let config = match threshold {
            Some(threshold) => {
                let config = self.config.with_threshold(threshold);
                config.validate()?;
                config
            }
            None => self.config,
        };

        let score = calculate_score(&record, Utc::now(), config.half_life_days, &self.weights);
        let decision = evaluate(&record, score, &config);
        Ok((decision.forgets(), decision.reason))
    }

    /// Register a read of `memory_id`
    pub async fn record_access(&self, memory_id: &str) -> Result<()> {
        self.store.increment_access(memory_id).await
    }
}
