//! Memory types for the Lethe system
//!
//! Defines the lifecycle record kept for every stored memory, the retention
//! stages it moves through, and the audit entries written on each transition.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::LetheError;

/// Default importance for memories without an externally supplied score
pub const DEFAULT_IMPORTANCE: f32 = 0.5;

/// Lifecycle state of a single stored memory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemoryRecord {
    /// Unique identifier, immutable once created
    pub memory_id: String,
    /// Owning user; every batch operation is scoped by this
    pub user_id: String,
    /// Current payload (the compressed form after compression)
    pub content: String,
    /// Fingerprint of the original content
    pub content_hash: Option<String>,
    /// Base importance in [0, 1]
    pub importance_score: f32,
    /// Emotional weight in [0, 1], 0 = neutral
    pub emotional_score: f32,
    /// Number of read accesses, never decreases
    pub access_count: u32,
    /// When this memory was created
    pub created_at: DateTime<Utc>,
    /// Last read access or lifecycle pass
    pub last_accessed: DateTime<Utc>,
    /// Fraction of the original content length still stored (1.0 = uncompressed)
    pub compression_ratio: f32,
    /// Current retention stage
    pub forgetting_stage: ForgettingStage,
}

impl MemoryRecord {
    /// Create a fresh, intact record with default scores
    pub fn new(
        memory_id: impl Into<String>,
        user_id: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        let content = content.into();
        let now = Utc::now();
        Self {
            memory_id: memory_id.into(),
            user_id: user_id.into(),
            content_hash: Some(content_fingerprint(&content)),
            content,
            importance_score: DEFAULT_IMPORTANCE,
            emotional_score: 0.0,
            access_count: 0,
            created_at: now,
            last_accessed: now,
            compression_ratio: 1.0,
            forgetting_stage: ForgettingStage::Intact,
        }
    }

    pub fn with_importance(mut self, importance: f32) -> Self {
        self.importance_score = importance.clamp(0.0, 1.0);
        self
    }

    pub fn with_emotional_score(mut self, emotional: f32) -> Self {
        self.emotional_score = emotional.clamp(0.0, 1.0);
        self
    }

    /// Backdate or postdate creation; `last_accessed` follows
    pub fn with_created_at(mut self, created_at: DateTime<Utc>) -> Self {
        self.created_at = created_at;
        self.last_accessed = created_at;
        self
    }

    /// Mark this memory as read, updating access count and timestamp
    pub fn mark_accessed(&mut self, now: DateTime<Utc>) {
        self.access_count = self.access_count.saturating_add(1);
        self.last_accessed = now;
    }

    pub fn is_forgotten(&self) -> bool {
        self.forgetting_stage == ForgettingStage::Forgotten
    }
}

/// Hex-encoded SHA-256 of the given content
pub fn content_fingerprint(content: &str) -> String {
    hex::encode(Sha256::digest(content.as_bytes()))
}

/// Coarse retention stage. Stages only ever move forward, one step at a time.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
#[serde(rename_all = "lowercase")]
pub enum ForgettingStage {
    /// Full content retained
    #[default]
    Intact,
    /// Content reduced to its salient sentences
    Compressed,
    /// Kept for audit, no longer a retrieval candidate
    Archived,
    /// Terminal soft-delete marker
    Forgotten,
}

impl ForgettingStage {
    pub const ALL: [ForgettingStage; 4] = [
        ForgettingStage::Intact,
        ForgettingStage::Compressed,
        ForgettingStage::Archived,
        ForgettingStage::Forgotten,
    ];

    /// The stage that follows this one, `None` for the terminal stage
    pub fn next(self) -> Option<ForgettingStage> {
        match self {
            ForgettingStage::Intact => Some(ForgettingStage::Compressed),
            ForgettingStage::Compressed => Some(ForgettingStage::Archived),
            ForgettingStage::Archived => Some(ForgettingStage::Forgotten),
            ForgettingStage::Forgotten => None,
        }
    }

    pub fn is_terminal(self) -> bool {
        self == ForgettingStage::Forgotten
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ForgettingStage::Intact => "intact",
            ForgettingStage::Compressed => "compressed",
            ForgettingStage::Archived => "archived",
            ForgettingStage::Forgotten => "forgotten",
        }
    }
}

impl fmt::Display for ForgettingStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ForgettingStage {
    type Err = LetheError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "intact" => Ok(ForgettingStage::Intact),
            "compressed" => Ok(ForgettingStage::Compressed),
            "archived" => Ok(ForgettingStage::Archived),
            "forgotten" => Ok(ForgettingStage::Forgotten),
            other => Err(LetheError::Storage(format!(
                "Unknown forgetting stage: {other}"
            ))),
        }
    }
}

/// Append-only audit record of one stage transition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransitionLogEntry {
    pub memory_id: String,
    pub old_stage: ForgettingStage,
    pub new_stage: ForgettingStage,
    pub reason: String,
    pub timestamp: DateTime<Utc>,
}

impl TransitionLogEntry {
    pub fn new(
        memory_id: impl Into<String>,
        old_stage: ForgettingStage,
        new_stage: ForgettingStage,
        reason: impl Into<String>,
    ) -> Self {
        Self {
            memory_id: memory_id.into(),
            old_stage,
            new_stage,
            reason: reason.into(),
            timestamp: Utc::now(),
        }
    }
}

/// Fields written together by a single lifecycle update
#[derive(Debug, Clone, PartialEq)]
pub struct StageUpdate {
    pub stage: ForgettingStage,
    /// Replacement content, `None` keeps the stored content
    pub content: Option<String>,
    /// Replacement compression ratio, `None` keeps the stored ratio
    pub compression_ratio: Option<f32>,
    pub last_accessed: DateTime<Utc>,
}

impl StageUpdate {
    /// Refresh `last_accessed` without changing anything else
    pub fn touch(stage: ForgettingStage, last_accessed: DateTime<Utc>) -> Self {
        Self {
            stage,
            content: None,
            compression_ratio: None,
            last_accessed,
        }
    }

    /// Apply this update to an in-memory record
    pub fn apply_to(&self, record: &mut MemoryRecord) {
        record.forgetting_stage = self.stage;
        if let Some(content) = &self.content {
            record.content = content.clone();
        }
        if let Some(ratio) = self.compression_ratio {
            record.compression_ratio = ratio.clamp(0.0, 1.0);
        }
        record.last_accessed = self.last_accessed;
    }
}
