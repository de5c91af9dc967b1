//! Parley - a conversational response engine that learns from its conversations
//!
//! Parley answers messages with replies it has learned from earlier
//! exchanges. Every user message is treated as a human reply to whatever the
//! engine said before it, so the knowledge base grows as people talk to it.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                     ResponseEngine                           │
//! │  ┌───────────────┐  ┌──────────────┐  ┌──────────────────┐   │
//! │  │  TextCleaner  │─▶│   Garbage    │─▶│ ResponseCache →  │   │
//! │  │               │  │  Classifier  │  │     Matcher      │   │
//! │  └───────────────┘  └──────────────┘  └────────┬─────────┘   │
//! │                                                │             │
//! │  ┌───────────────┐  ┌──────────────────────────▼─────────┐   │
//! │  │ QualityScorer │─▶│            PatternStore            │   │
//! │  └───────────────┘  │  clusters · context pairs · stats  │   │
//! │                     └──────────────────┬─────────────────┘   │
//! └────────────────────────────────────────┼─────────────────────┘
//!                                          │ SaveSignal
//! ┌────────────────────────────────────────▼─────────────────────┐
//! │                  PersistenceCoordinator                      │
//! │  primary file · durable mirror · backups · KV · Postgres     │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`text`]: Cleaning, garbage classification and keyword extraction
//! - [`learning`]: Quality scoring, the pattern store, matching and caching
//! - [`persistence`]: Snapshot backends and the save coordinator
//! - [`engine`]: The response engine tying it all together
//! - [`gateway`]: HTTP API
//! - [`config`]: Configuration management

pub mod config;
pub mod engine;
pub mod error;
pub mod gateway;
pub mod learning;
pub mod persistence;
pub mod text;

pub use config::ParleyConfig;
pub use engine::{Reply, ReplySource, ResponseEngine};
pub use error::{Error, Result};
