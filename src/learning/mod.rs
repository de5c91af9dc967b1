//! Learning core
//!
//! Scoring, storage and retrieval of learned request→reply associations.

pub mod cache;
pub mod entry;
pub mod matcher;
pub mod quality;
pub mod store;

pub use cache::{CacheStats, ResponseCache};
pub use entry::{now_millis, MemorySnapshot, PatternEntry, Stats, MAX_QUALITY};
pub use matcher::{Candidate, MatchResult, MatchSource, Matcher};
pub use quality::QualityScorer;
pub use store::{LearnOutcome, LearnSource, MergeAction, PatternStore, SharedStore};
