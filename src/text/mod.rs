//! Text front-end — cleaning, garbage classification and keyword extraction
//!
//! Every message passes through `TextCleaner` and `GarbageClassifier` before it
//! reaches the learning core; keyword extraction is shared by learning and
//! retrieval.

pub mod garbage;
pub mod keywords;
pub mod sanitize;

pub use garbage::{default_garbage_rules, GarbageClassifier, GarbageRule, GarbageVerdict};
pub use keywords::{extract_keywords, overlap, STOP_WORDS};
pub use sanitize::{TextCleaner, DEFAULT_MAX_CHARS};
