//! Composite importance scoring
//!
//! A memory's current importance combines its externally supplied base
//! importance, an exponential recency decay, its emotional weight, and a
//! capped access-frequency term. Scoring is pure: the same record and `now`
//! always produce the same score.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::config::ScoringConfig;
use crate::memory::types::MemoryRecord;

/// Sub-scores and the weighted composite for one memory
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Score {
    /// Base importance, as stored
    pub base: f32,
    /// `exp(-age_days / half_life_days)`, in (0, 1]
    pub recency: f32,
    /// Emotional weight, as stored
    pub emotional: f32,
    /// `min(access_count * step, cap)`
    pub frequency: f32,
    /// Weighted sum of the four terms
    pub final_score: f32,
}

/// Whole days elapsed since creation, clamped at zero for clock skew
pub fn age_days(record: &MemoryRecord, now: DateTime<Utc>) -> i64 {
    (now - record.created_at).num_days().max(0)
}

/// Exponential recency decay
pub fn recency_term(age_days: i64, half_life_days: f32) -> f32 {
    (-(age_days as f32) / half_life_days).exp()
}

/// Diminishing, capped contribution from repeated access
pub fn frequency_term(access_count: u32, weights: &ScoringConfig) -> f32 {
    (access_count as f32 * weights.frequency_step).min(weights.frequency_cap)
}

/// Calculate the composite score of a memory at `now`
pub fn calculate_score(
    record: &MemoryRecord,
    now: DateTime<Utc>,
    half_life_days: f32,
    weights: &ScoringConfig,
) -> Score {
    let recency = recency_term(age_days(record, now), half_life_days);
    let frequency = frequency_term(record.access_count, weights);
    let base = record.importance_score;
    let emotional = record.emotional_score;

    let final_score = base * weights.base_weight
        + recency * weights.recency_weight
        + emotional * weights.emotional_weight
        + frequency * weights.frequency_weight;

    Score {
        base,
        recency,
        emotional,
        frequency,
        final_score,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn record_aged(days: i64, now: DateTime<Utc>) -> MemoryRecord {
        MemoryRecord::new("m", "u", "content").with_created_at(now - Duration::days(days))
    }

    #[test]
    fn test_fresh_memory_has_full_recency() {
        let now = Utc::now();
        let score = calculate_score(&record_aged(0, now), now, 30.0, &ScoringConfig::default());

        assert_eq!(score.recency, 1.0);
        assert!((score.final_score - (0.5 * 0.4 + 0.3)).abs() < 1e-6);
    }

    #[test]
    fn test_future_creation_clamps_to_zero_age() {
        let now = Utc::now();
        let record = record_aged(-5, now);

        assert_eq!(age_days(&record, now), 0);
        let score = calculate_score(&record, now, 30.0, &ScoringConfig::default());
        assert_eq!(score.recency, 1.0);
    }

    #[test]
    fn test_partial_days_truncate() {
        let now = Utc::now();
        let record =
            MemoryRecord::new("m", "u", "c").with_created_at(now - Duration::hours(47));
        assert_eq!(age_days(&record, now), 1);
    }

    #[test]
    fn test_frequency_term_caps() {
        let weights = ScoringConfig::default();
        assert_eq!(frequency_term(0, &weights), 0.0);
        assert!((frequency_term(3, &weights) - 0.3).abs() < 1e-6);
        assert_eq!(frequency_term(5, &weights), 0.5);
        assert_eq!(frequency_term(1000, &weights), 0.5);
    }

    #[test]
    fn test_recency_decreases_with_age() {
        assert!(recency_term(10, 30.0) > recency_term(20, 30.0));
        assert!(recency_term(10, 60.0) > recency_term(10, 30.0));
    }

    #[test]
    fn test_scoring_is_deterministic() {
        let now = Utc::now();
        let record = record_aged(12, now).with_emotional_score(0.4);
        let weights = ScoringConfig::default();

        assert_eq!(
            calculate_score(&record, now, 30.0, &weights),
            calculate_score(&record, now, 30.0, &weights)
        );
    }
}
