//! Memory lifecycle types and pure policy
//!
//! Scoring, stage decisions and compression are side-effect free; the
//! forgetting engine is what applies them to storage.

pub mod compress;
pub mod score;
pub mod stage;
pub mod types;

pub use compress::{COMPRESSED_MARKER, compress, is_compressed};
pub use score::{Score, calculate_score};
pub use stage::{Decision, Outcome, evaluate};
pub use types::{ForgettingStage, MemoryRecord, StageUpdate, TransitionLogEntry};
