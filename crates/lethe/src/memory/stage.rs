//! Stage transition policy
//!
//! Decides, for one memory on one pass, whether it moves one step along
//! `intact -> compressed -> archived -> forgotten`. Rules are evaluated in
//! priority order:
//!
//! 1. intact and compression-ready -> compressed
//! 2. compressed and below the forgetting threshold -> archived
//! 3. archived and below the forgetting threshold -> forgotten
//! 4. otherwise retained
//!
//! Compression readiness is tested only while intact and always wins there,
//! even when the score is already below the threshold.

use serde::Serialize;

use crate::config::ForgettingConfig;
use crate::memory::score::Score;
use crate::memory::types::{ForgettingStage, MemoryRecord};

pub const REASON_COMPRESSION: &str = "Ready for compression";
pub const REASON_ARCHIVAL: &str = "Ready for archival";
pub const REASON_RETAINED: &str = "Memory retained";

/// Which bucket of the pass summary a memory lands in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Outcome {
    Compressed,
    Archived,
    Forgotten,
    Retained,
}

/// Result of evaluating the policy against one record
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Decision {
    pub memory_id: String,
    pub from: ForgettingStage,
    pub to: ForgettingStage,
    pub outcome: Outcome,
    pub reason: String,
    pub score: Score,
}

impl Decision {
    pub fn is_transition(&self) -> bool {
        self.from != self.to
    }

    pub fn forgets(&self) -> bool {
        self.outcome == Outcome::Forgotten
    }
}

/// An intact memory is compression-ready while most of its original text remains
pub fn is_compression_ready(record: &MemoryRecord, config: &ForgettingConfig) -> bool {
    record.compression_ratio > config.compression_ready_ratio
}

/// Evaluate the transition rules for `record` given its current `score`
pub fn evaluate(record: &MemoryRecord, score: Score, config: &ForgettingConfig) -> Decision {
    let threshold = config.forgetting_threshold;
    let below_threshold = score.final_score < threshold;
    let from = record.forgetting_stage;

    let (outcome, reason) = match from {
        ForgettingStage::Intact if is_compression_ready(record, config) => {
            (Outcome::Compressed, REASON_COMPRESSION.to_string())
        }
        ForgettingStage::Compressed if below_threshold => {
            (Outcome::Archived, REASON_ARCHIVAL.to_string())
        }
        ForgettingStage::Archived if below_threshold => (
            Outcome::Forgotten,
            format!("Low score: {:.2} < {}", score.final_score, threshold),
        ),
        _ => (Outcome::Retained, REASON_RETAINED.to_string()),
    };

    let to = match outcome {
        Outcome::Retained => from,
        _ => from.next().unwrap_or(from),
    };

    Decision {
        memory_id: record.memory_id.clone(),
        from,
        to,
        outcome,
        reason,
        score,
    }
}
