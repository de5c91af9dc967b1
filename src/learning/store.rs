//! In-memory knowledge base
//!
//! `PatternStore` owns every learned entry: keyword clusters, the capped
//! context pairs used for exact matching, last quality scores and usage
//! counters. All mutation and eviction happens here. The store never performs
//! I/O; after a learning event it raises the attached [`SaveSignal`].

use super::entry::{now_millis, MemorySnapshot, PatternEntry, Stats, MAX_QUALITY};
use crate::config::LearningConfig;
use crate::error::{Error, Result};
use crate::persistence::SaveSignal;
use crate::text::extract_keywords;
use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Process-wide store handle shared by the engine and the save coordinator
pub type SharedStore = Arc<RwLock<PatternStore>>;

/// Where a learning event came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LearnSource {
    /// Observed in a live conversation
    Live,
    /// Taught by an operator or imported from training data
    Training,
}

/// What happened to one sequence (a cluster or the context pairs) during a learn
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MergeAction {
    /// No entry for the input existed
    Inserted,
    /// Same response observed again
    Reinforced,
    /// A different response superseded the entry
    Replaced,
    /// A different response was not strong enough to supersede the entry
    Kept,
}

/// Summary of a `learn_pattern` call
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LearnOutcome {
    /// Clusters that received a new entry
    pub inserted: usize,
    /// Clusters whose entry was reinforced
    pub reinforced: usize,
    /// Clusters whose entry was replaced
    pub replaced: usize,
    /// Clusters whose entry resisted the new response
    pub kept: usize,
    /// Action on the context pairs, if the exchange qualified for them
    pub context_pair: Option<MergeAction>,
}

impl LearnOutcome {
    fn record(&mut self, action: MergeAction) {
        match action {
            MergeAction::Inserted => self.inserted += 1,
            MergeAction::Reinforced => self.reinforced += 1,
            MergeAction::Replaced => self.replaced += 1,
            MergeAction::Kept => self.kept += 1,
        }
    }

    /// Whether any stored entry changed
    pub fn changed(&self) -> bool {
        self.inserted + self.reinforced + self.replaced > 0
            || matches!(
                self.context_pair,
                Some(MergeAction::Inserted | MergeAction::Reinforced | MergeAction::Replaced)
            )
    }
}

/// The learning store
pub struct PatternStore {
    policy: LearningConfig,
    clusters: HashMap<String, Vec<PatternEntry>>,
    context_pairs: Vec<PatternEntry>,
    quality_scores: HashMap<String, u8>,
    legacy_patterns: serde_json::Map<String, serde_json::Value>,
    stats: Stats,
    save_signal: Option<SaveSignal>,
}

impl PatternStore {
    /// Create an empty store
    pub fn new(policy: LearningConfig) -> Self {
        Self {
            policy,
            clusters: HashMap::new(),
            context_pairs: Vec::new(),
            quality_scores: HashMap::new(),
            legacy_patterns: serde_json::Map::new(),
            stats: Stats::default(),
            save_signal: None,
        }
    }

    /// Rebuild a store from a persisted snapshot, re-applying the caps
    pub fn from_snapshot(policy: LearningConfig, snapshot: MemorySnapshot) -> Self {
        let mut store = Self::new(policy);

        for (keyword, mut entries) in snapshot.semantic_clusters {
            if entries.is_empty() {
                continue;
            }
            rank_and_truncate(&mut entries, store.policy.cluster_capacity);
            store.clusters.insert(keyword, entries);
        }

        store.context_pairs = snapshot.context_pairs;
        rank_and_truncate(&mut store.context_pairs, store.policy.context_capacity);

        store.quality_scores = snapshot.quality_scores.into_iter().collect();
        store.legacy_patterns = snapshot.patterns;
        store.stats = snapshot.stats;
        store
    }

    /// Copy the full state out for persistence
    pub fn snapshot(&self) -> MemorySnapshot {
        MemorySnapshot {
            patterns: self.legacy_patterns.clone(),
            context_pairs: self.context_pairs.clone(),
            semantic_clusters: self
                .clusters
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
            quality_scores: self
                .quality_scores
                .iter()
                .map(|(k, v)| (k.clone(), *v))
                .collect(),
            stats: self.stats.clone(),
        }
    }

    /// Raise `signal` after every learning event
    pub fn attach_save_signal(&mut self, signal: SaveSignal) {
        self.save_signal = Some(signal);
    }

    /// Learning policy in effect
    pub fn policy(&self) -> &LearningConfig {
        &self.policy
    }

    /// Fold an observed exchange into the knowledge base.
    ///
    /// Each keyword cluster of the input gets the find / reinforce / replace /
    /// insert treatment and is re-ranked and capped; exchanges at or above the
    /// context threshold get the same treatment in the context pairs.
    pub fn learn_pattern(
        &mut self,
        input: &str,
        response: &str,
        quality: u8,
        source: LearnSource,
    ) -> Result<LearnOutcome> {
        let input = input.trim().to_lowercase();
        let response = response.trim();
        if input.is_empty() {
            return Err(Error::Validation("input must not be empty".to_string()));
        }
        if response.is_empty() {
            return Err(Error::Validation("response must not be empty".to_string()));
        }
        let quality = quality.min(MAX_QUALITY);
        let now = now_millis();
        let mut outcome = LearnOutcome::default();

        for keyword in extract_keywords(&input) {
            let cluster = self.clusters.entry(keyword).or_default();
            let action = merge(cluster, &input, response, quality, now, &self.policy);
            rank_and_truncate(cluster, self.policy.cluster_capacity);
            outcome.record(action);
        }

        if quality >= self.policy.context_quality_threshold {
            let action = merge(
                &mut self.context_pairs,
                &input,
                response,
                quality,
                now,
                &self.policy,
            );
            rank_and_truncate(&mut self.context_pairs, self.policy.context_capacity);
            outcome.context_pair = Some(action);
        }

        self.quality_scores.insert(input, quality);
        self.stats.training_data_points += 1;
        if source == LearnSource::Live {
            self.stats.live_conversations_learned += 1;
        }

        if let Some(signal) = &self.save_signal {
            signal.request();
        }

        Ok(outcome)
    }

    /// Context pair whose input equals the lowercased, trimmed query
    pub fn find_exact(&self, query: &str) -> Option<&PatternEntry> {
        let query = query.trim().to_lowercase();
        self.context_pairs.iter().find(|e| e.input == query)
    }

    /// Entries of one keyword cluster, best first
    pub fn cluster(&self, keyword: &str) -> &[PatternEntry] {
        self.clusters.get(keyword).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Context pairs, best first
    pub fn context_pairs(&self) -> &[PatternEntry] {
        &self.context_pairs
    }

    /// Last quality recorded for an input
    pub fn quality_score(&self, input: &str) -> Option<u8> {
        self.quality_scores.get(&input.trim().to_lowercase()).copied()
    }

    /// Number of keyword clusters
    pub fn cluster_count(&self) -> usize {
        self.clusters.len()
    }

    /// Number of context pairs
    pub fn context_pair_count(&self) -> usize {
        self.context_pairs.len()
    }

    /// Copy of the usage counters
    pub fn stats(&self) -> Stats {
        self.stats.clone()
    }

    /// Count an incoming message
    pub fn record_message(&mut self) {
        self.stats.total_messages += 1;
    }

    /// Count a message rejected by the garbage classifier
    pub fn record_garbage(&mut self) {
        self.stats.garbage_filtered += 1;
    }

    /// Count a new conversation
    pub fn record_conversation(&mut self) {
        self.stats.total_conversations += 1;
    }
}

fn merge(
    entries: &mut Vec<PatternEntry>,
    input: &str,
    response: &str,
    quality: u8,
    now: DateTime<Utc>,
    policy: &LearningConfig,
) -> MergeAction {
    let Some(index) = entries.iter().position(|e| e.input == input) else {
        entries.push(PatternEntry::new(input, response, quality, now));
        return MergeAction::Inserted;
    };
    let existing = &mut entries[index];

    if existing.response == response {
        existing.confidence += 1;
        existing.quality = existing
            .quality
            .saturating_add(policy.reinforce_bonus)
            .min(MAX_QUALITY);
        existing.timestamp = now;
        return MergeAction::Reinforced;
    }

    let outscored =
        u16::from(quality) > u16::from(existing.quality) + u16::from(policy.replace_margin);
    let stale = now - existing.timestamp > Duration::days(policy.aging_days);
    if outscored || stale {
        *existing = PatternEntry::new(input, response, quality, now);
        MergeAction::Replaced
    } else {
        MergeAction::Kept
    }
}

/// Order by `quality × confidence` descending and evict beyond `capacity`.
/// The sort is stable, so equal weights keep their previous order.
fn rank_and_truncate(entries: &mut Vec<PatternEntry>, capacity: usize) {
    entries.sort_by(|a, b| b.weight().cmp(&a.weight()));
    entries.truncate(capacity);
}
