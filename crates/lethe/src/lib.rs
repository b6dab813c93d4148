//! Lethe - memory lifecycle and forgetting engine
//!
//! Scores stored memories by importance, recency, emotional weight and
//! access frequency, and moves them one-way through
//! `intact -> compressed -> archived -> forgotten` with an audit log of every
//! transition. Forgotten memories are soft-deleted, never removed.

pub mod config;
pub mod error;
pub mod forgetting;
pub mod memory;
pub mod storage;
pub mod testing;

pub use error::LetheError;
pub use forgetting::{ActionSummary, ForgettingEngine, PassError};
