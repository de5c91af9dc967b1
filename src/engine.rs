//! Conversational response engine
//!
//! Wires the pieces together for one process:
//!
//! ```text
//! raw text → TextCleaner → GarbageClassifier ─(garbage)→ fixed reply
//!                                │
//!                                ▼
//!                 ResponseCache → Matcher ─(no match)→ canned fallback
//!                                │
//!                                ▼
//!        previous bot reply + this message → QualityScorer → PatternStore
//!                                                                │
//!                                                  SaveSignal → PersistenceCoordinator
//! ```
//!
//! A user message is treated as a human reply to whatever the engine said last
//! in the same conversation; that pair is what gets learned live.

use crate::config::ParleyConfig;
use crate::error::{Error, Result};
use crate::learning::{
    CacheStats, LearnOutcome, LearnSource, MatchSource, Matcher, PatternStore, QualityScorer,
    ResponseCache, SharedStore, Stats,
};
use crate::persistence::{PersistenceCoordinator, SaveSignal, StorageSet};
use crate::text::{GarbageClassifier, TextCleaner, DEFAULT_MAX_CHARS};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};

/// Reply to a message the garbage classifier rejected
pub const GARBAGE_REPLY: &str = "Sorry, I couldn't make sense of that. Could you rephrase?";

/// Replies used when nothing relevant has been learned yet
pub const FALLBACK_REPLIES: &[&str] = &[
    "I'm not sure what to say to that yet. What would you say?",
    "Tell me more about that.",
    "Interesting. How would you answer that yourself?",
    "I'm still learning. What's a good reply to that?",
    "Hmm, I don't know. Can you teach me?",
];

/// How a reply was produced
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReplySource {
    /// Served from the response cache
    Cache,
    /// Exact context pair match
    Exact,
    /// Keyword cluster match
    Cluster,
    /// No match; canned reply
    Fallback,
    /// Input classified as garbage
    Rejected,
}

impl From<MatchSource> for ReplySource {
    fn from(source: MatchSource) -> Self {
        match source {
            MatchSource::Exact => ReplySource::Exact,
            MatchSource::Cluster => ReplySource::Cluster,
        }
    }
}

/// The engine's answer to one message
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Reply {
    /// Reply text
    pub text: String,
    /// How it was produced
    pub source: ReplySource,
    /// Outcome of live learning triggered by the message, if any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub learned: Option<LearnOutcome>,
}

/// One operator-supplied training example
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainingRecord {
    /// Prompt text
    pub input: String,
    /// Reply to learn
    pub response: String,
    /// Explicit quality; scored automatically when absent
    #[serde(default)]
    pub quality: Option<u8>,
}

/// Result of a bulk import
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportSummary {
    /// Records learned
    pub accepted: usize,
    /// Records refused as invalid or garbage
    pub rejected: usize,
}

/// Engine status for operators
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EngineStatus {
    /// Usage counters
    pub stats: Stats,
    /// Number of keyword clusters
    pub cluster_count: usize,
    /// Number of context pairs
    pub context_pair_count: usize,
    /// Active conversations
    pub conversations: usize,
    /// Cache counters, `None` when the cache is disabled
    pub cache: Option<CacheStats>,
}

/// The response engine
pub struct ResponseEngine {
    config: ParleyConfig,
    cleaner: TextCleaner,
    classifier: GarbageClassifier,
    matcher: Matcher,
    store: SharedStore,
    cache: Option<Mutex<ResponseCache>>,
    /// Conversation id → last reply the engine gave in it
    conversations: RwLock<HashMap<String, Option<String>>>,
    coordinator: PersistenceCoordinator,
}

impl ResponseEngine {
    /// Load the knowledge base from the configured backends and start persistence
    pub async fn open(config: ParleyConfig) -> Result<Self> {
        let storage = StorageSet::from_config(&config)?;
        Self::with_storage(config, storage).await
    }

    /// Same as [`open`](Self::open) with explicitly built storage
    pub async fn with_storage(config: ParleyConfig, storage: StorageSet) -> Result<Self> {
        config.validate()?;
        let cleaner = TextCleaner::new(DEFAULT_MAX_CHARS)?;
        let classifier = GarbageClassifier::with_default_rules()?;

        let loaded = storage.load().await;
        let signal = SaveSignal::new();
        let mut store = PatternStore::from_snapshot(config.learning.clone(), loaded.snapshot);
        store.attach_save_signal(signal.clone());
        let store: SharedStore = Arc::new(RwLock::new(store));

        let coordinator = PersistenceCoordinator::start(storage, Arc::clone(&store), signal);
        let cache = config
            .cache
            .enabled
            .then(|| Mutex::new(ResponseCache::new(config.cache.ttl(), config.cache.capacity)));

        Ok(Self {
            cleaner,
            classifier,
            matcher: Matcher::new(config.learning.relevance_threshold),
            store,
            cache,
            conversations: RwLock::new(HashMap::new()),
            coordinator,
            config,
        })
    }

    /// Active configuration
    pub fn config(&self) -> &ParleyConfig {
        &self.config
    }

    /// Shared handle to the learning store
    pub fn store(&self) -> &SharedStore {
        &self.store
    }

    /// Persistence coordinator
    pub fn coordinator(&self) -> &PersistenceCoordinator {
        &self.coordinator
    }

    /// Start a new conversation and return its id
    pub async fn begin_conversation(&self) -> String {
        let id = uuid::Uuid::new_v4().to_string();
        self.conversations.write().await.insert(id.clone(), None);
        self.store.write().await.record_conversation();
        tracing::debug!(conversation = %id, "Conversation started");
        id
    }

    /// Forget a conversation's state
    pub async fn end_conversation(&self, conversation: &str) -> bool {
        self.conversations.write().await.remove(conversation).is_some()
    }

    /// Answer one user message and learn from it.
    ///
    /// Unknown conversation ids are registered as new conversations.
    pub async fn respond(&self, conversation: &str, raw: &str) -> Result<Reply> {
        let text = self.cleaner.clean(raw)?;
        self.store.write().await.record_message();

        let previous = {
            let mut conversations = self.conversations.write().await;
            match conversations.get(conversation) {
                Some(last) => last.clone(),
                None => {
                    conversations.insert(conversation.to_string(), None);
                    self.store.write().await.record_conversation();
                    None
                }
            }
        };

        if self.classifier.is_garbage(&text) {
            self.store.write().await.record_garbage();
            tracing::debug!(conversation = %conversation, "Message rejected as garbage");
            // Nothing useful can be learned from a reply to the rejection
            self.remember_reply(conversation, None).await;
            return Ok(Reply {
                text: GARBAGE_REPLY.to_string(),
                source: ReplySource::Rejected,
                learned: None,
            });
        }

        let (reply, source) = match self.find(&text).await {
            Some(found) => found,
            None => (fallback_reply(&text).to_string(), ReplySource::Fallback),
        };

        let learned = match previous {
            Some(bot_said) => self.learn_live(&bot_said, &text).await,
            None => None,
        };

        self.remember_reply(conversation, Some(reply.clone())).await;
        Ok(Reply {
            text: reply,
            source,
            learned,
        })
    }

    /// Best known response for `text`, consulting the cache first
    pub async fn find(&self, text: &str) -> Option<(String, ReplySource)> {
        if let Some(cache) = &self.cache {
            if let Some(hit) = cache.lock().await.get(text) {
                return Some((hit, ReplySource::Cache));
            }
        }

        let found = {
            let store = self.store.read().await;
            self.matcher.find(&store, text)
        }?;

        if let Some(cache) = &self.cache {
            cache.lock().await.insert(text, found.response.clone());
        }
        Some((found.response, found.source.into()))
    }

    /// Operator teaching with source `Training`.
    ///
    /// Without an explicit quality the pair is scored like live traffic.
    pub async fn teach(
        &self,
        input: &str,
        response: &str,
        quality: Option<u8>,
    ) -> Result<LearnOutcome> {
        let input = self.cleaner.clean(input)?;
        let response = self.cleaner.clean(response)?;

        for (side, text) in [("input", &input), ("response", &response)] {
            let verdict = self.classifier.classify(text);
            if verdict.garbage {
                return Err(Error::Rejected(format!(
                    "{} classified as garbage ({})",
                    side,
                    verdict.reasons.join(", ")
                )));
            }
        }

        let quality =
            quality.unwrap_or_else(|| QualityScorer::new(&self.classifier).score(&input, &response));
        self.learn(&input, &response, quality, LearnSource::Training)
            .await
    }

    /// Teach every record of a JSON array file
    pub async fn import(&self, path: &Path) -> Result<ImportSummary> {
        let data = tokio::fs::read(path).await?;
        let records: Vec<TrainingRecord> = serde_json::from_slice(&data)?;
        self.import_records(records).await
    }

    /// Teach a batch of records, skipping the ones that fail
    pub async fn import_records(&self, records: Vec<TrainingRecord>) -> Result<ImportSummary> {
        let mut summary = ImportSummary::default();
        for record in records {
            match self
                .teach(&record.input, &record.response, record.quality)
                .await
            {
                Ok(_) => summary.accepted += 1,
                Err(e @ (Error::Validation(_) | Error::Rejected(_))) => {
                    tracing::debug!(input = %record.input, error = %e, "Skipping training record");
                    summary.rejected += 1;
                }
                Err(e) => return Err(e),
            }
        }
        tracing::info!(
            accepted = summary.accepted,
            rejected = summary.rejected,
            "Imported training data"
        );
        Ok(summary)
    }

    /// Copy of the usage counters
    pub async fn stats(&self) -> Stats {
        self.store.read().await.stats()
    }

    /// Counters plus store and cache sizes
    pub async fn status(&self) -> EngineStatus {
        let (stats, cluster_count, context_pair_count) = {
            let store = self.store.read().await;
            (store.stats(), store.cluster_count(), store.context_pair_count())
        };
        let cache = match &self.cache {
            Some(cache) => Some(cache.lock().await.stats()),
            None => None,
        };
        EngineStatus {
            stats,
            cluster_count,
            context_pair_count,
            conversations: self.conversations.read().await.len(),
            cache,
        }
    }

    /// Flush all pending state and close backends
    pub async fn shutdown(&self) -> Result<()> {
        self.coordinator.shutdown().await
    }

    async fn learn_live(&self, bot_said: &str, user_said: &str) -> Option<LearnOutcome> {
        let quality = QualityScorer::new(&self.classifier).score(bot_said, user_said);
        if quality < self.config.learning.min_learn_quality {
            tracing::debug!(quality, "Exchange below learning threshold");
            return None;
        }
        match self.learn(bot_said, user_said, quality, LearnSource::Live).await {
            Ok(outcome) => Some(outcome),
            Err(e) => {
                tracing::warn!(error = %e, "Live learning failed");
                None
            }
        }
    }

    async fn learn(
        &self,
        input: &str,
        response: &str,
        quality: u8,
        source: LearnSource,
    ) -> Result<LearnOutcome> {
        let (outcome, snapshot) = {
            let mut store = self.store.write().await;
            let outcome = store.learn_pattern(input, response, quality, source)?;
            let snapshot = self
                .config
                .storage
                .sync_after_learn
                .then(|| store.snapshot());
            (outcome, snapshot)
        };

        if let Some(cache) = &self.cache {
            cache.lock().await.clear();
        }

        if let Some(snapshot) = snapshot {
            if let Err(e) = self.coordinator.save_sync(&snapshot) {
                tracing::error!(error = %e, "Synchronous save after learn failed");
            }
        }

        tracing::debug!(?source, quality, outcome = ?outcome, "Learned pattern");
        Ok(outcome)
    }

    async fn remember_reply(&self, conversation: &str, reply: Option<String>) {
        self.conversations
            .write()
            .await
            .insert(conversation.to_string(), reply);
    }
}

/// Deterministic pick from [`FALLBACK_REPLIES`]
fn fallback_reply(text: &str) -> &'static str {
    let hash = text
        .bytes()
        .fold(0usize, |acc, b| acc.wrapping_mul(31).wrapping_add(usize::from(b)));
    FALLBACK_REPLIES[hash % FALLBACK_REPLIES.len()]
}
