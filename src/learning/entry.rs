//! Learned pattern entries, usage statistics and the persisted snapshot

use crate::error::{Error, Result};
use bytes::Bytes;
use chrono::{DateTime, SubsecRound, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Highest quality score an entry can carry.
pub const MAX_QUALITY: u8 = 100;

/// One learned input→response association.
///
/// The same association appears as an independent copy in every keyword
/// cluster of its input and, if it ever scored high enough, in the context
/// pairs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PatternEntry {
    /// Lowercased, trimmed input
    pub input: String,
    /// Learned response
    pub response: String,
    /// Quality score (0-100)
    pub quality: u8,
    /// Times this exact pair has been observed (>= 1)
    pub confidence: u32,
    /// Last observation, stored as epoch milliseconds
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub timestamp: DateTime<Utc>,
}

impl PatternEntry {
    /// Create a first observation of a pair
    pub fn new(
        input: impl Into<String>,
        response: impl Into<String>,
        quality: u8,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            input: input.into(),
            response: response.into(),
            quality: quality.min(MAX_QUALITY),
            confidence: 1,
            timestamp,
        }
    }

    /// Ranking weight used for ordering and eviction
    pub fn weight(&self) -> u64 {
        u64::from(self.quality) * u64::from(self.confidence)
    }

    fn normalize(&mut self) {
        self.quality = self.quality.min(MAX_QUALITY);
        self.confidence = self.confidence.max(1);
    }
}

/// Current time at the precision the snapshot format keeps.
pub fn now_millis() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(3)
}

/// Aggregate usage counters. They only grow within a process lifetime.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Stats {
    /// Messages received
    pub total_messages: u64,
    /// Conversations started
    pub total_conversations: u64,
    /// Accepted learning events from any source
    pub training_data_points: u64,
    /// Messages rejected by the garbage classifier
    pub garbage_filtered: u64,
    /// Accepted learning events that came from live traffic
    pub live_conversations_learned: u64,
}

/// Complete serializable state of the learning store
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MemorySnapshot {
    /// Legacy section, carried through untouched
    #[serde(default)]
    pub patterns: serde_json::Map<String, Value>,
    /// High-quality pairs for exact matching
    pub context_pairs: Vec<PatternEntry>,
    /// Keyword → entries
    pub semantic_clusters: BTreeMap<String, Vec<PatternEntry>>,
    /// Input → last quality score
    #[serde(default)]
    pub quality_scores: BTreeMap<String, u8>,
    /// Usage counters
    #[serde(default)]
    pub stats: Stats,
}

impl MemorySnapshot {
    /// Parse and validate a persisted snapshot.
    ///
    /// `contextPairs` must be an array and `semanticClusters` an object;
    /// anything else is a `CorruptSnapshot`.
    pub fn from_slice(data: &[u8]) -> Result<Self> {
        let value: Value = serde_json::from_slice(data)
            .map_err(|e| Error::CorruptSnapshot(format!("invalid JSON: {}", e)))?;

        let root = value
            .as_object()
            .ok_or_else(|| Error::CorruptSnapshot("top level is not an object".to_string()))?;
        if !root.get("contextPairs").is_some_and(Value::is_array) {
            return Err(Error::CorruptSnapshot(
                "contextPairs is missing or not an array".to_string(),
            ));
        }
        if !root.get("semanticClusters").is_some_and(Value::is_object) {
            return Err(Error::CorruptSnapshot(
                "semanticClusters is missing or not an object".to_string(),
            ));
        }

        let mut snapshot: MemorySnapshot = serde_json::from_value(value)
            .map_err(|e| Error::CorruptSnapshot(format!("invalid structure: {}", e)))?;
        snapshot
            .context_pairs
            .iter_mut()
            .chain(snapshot.semantic_clusters.values_mut().flatten())
            .for_each(PatternEntry::normalize);
        Ok(snapshot)
    }

    /// Serialize for storage
    pub fn to_bytes(&self) -> Result<Bytes> {
        Ok(Bytes::from(serde_json::to_vec_pretty(self)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entry_weight() {
        let mut entry = PatternEntry::new("hello", "hi", 70, now_millis());
        assert_eq!(entry.weight(), 70);
        entry.confidence = 3;
        assert_eq!(entry.weight(), 210);
    }

    #[test]
    fn test_new_entry_clamps_quality() {
        let entry = PatternEntry::new("hello", "hi", 250, now_millis());
        assert_eq!(entry.quality, 100);
        assert_eq!(entry.confidence, 1);
    }

    #[test]
    fn test_entry_wire_format() {
        let ts = DateTime::from_timestamp_millis(1_700_000_000_123).unwrap();
        let entry = PatternEntry::new("hello", "hi there", 65, ts);
        let json = serde_json::to_value(&entry).unwrap();
        assert_eq!(json["input"], "hello");
        assert_eq!(json["quality"], 65);
        assert_eq!(json["confidence"], 1);
        assert_eq!(json["timestamp"], 1_700_000_000_123i64);
    }

    #[test]
    fn test_snapshot_keys_are_camel_case() {
        let mut snapshot = MemorySnapshot::default();
        snapshot.stats.garbage_filtered = 4;
        let json: Value = serde_json::from_slice(&snapshot.to_bytes().unwrap()).unwrap();
        for key in ["patterns", "contextPairs", "semanticClusters", "qualityScores", "stats"] {
            assert!(json.get(key).is_some(), "missing {key}");
        }
        assert_eq!(json["stats"]["garbageFiltered"], 4);
    }

    #[test]
    fn test_from_slice_round_trip() {
        let mut snapshot = MemorySnapshot::default();
        let entry = PatternEntry::new("favorite color", "blue", 80, now_millis());
        snapshot.context_pairs.push(entry.clone());
        snapshot
            .semantic_clusters
            .insert("favorite".to_string(), vec![entry.clone()]);
        snapshot.quality_scores.insert("favorite color".to_string(), 80);
        snapshot.stats.total_messages = 9;

        let parsed = MemorySnapshot::from_slice(&snapshot.to_bytes().unwrap()).unwrap();
        assert_eq!(parsed, snapshot);
    }

    #[test]
    fn test_from_slice_rejects_invalid_json() {
        let err = MemorySnapshot::from_slice(b"{not json").unwrap_err();
        assert!(matches!(err, Error::CorruptSnapshot(_)));
    }

    #[test]
    fn test_from_slice_rejects_wrong_shapes() {
        let missing = br#"{"semanticClusters": {}}"#;
        assert!(matches!(
            MemorySnapshot::from_slice(missing),
            Err(Error::CorruptSnapshot(_))
        ));

        let wrong_type = br#"{"contextPairs": {}, "semanticClusters": {}}"#;
        assert!(matches!(
            MemorySnapshot::from_slice(wrong_type),
            Err(Error::CorruptSnapshot(_))
        ));

        let clusters_array = br#"{"contextPairs": [], "semanticClusters": []}"#;
        assert!(matches!(
            MemorySnapshot::from_slice(clusters_array),
            Err(Error::CorruptSnapshot(_))
        ));
    }

    #[test]
    fn test_from_slice_accepts_minimal_and_normalizes() {
        let data = br#"{
            "contextPairs": [
                {"input": "hi", "response": "hello", "quality": 100, "confidence": 0, "timestamp": 1}
            ],
            "semanticClusters": {}
        }"#;
        let snapshot = MemorySnapshot::from_slice(data).unwrap();
        assert_eq!(snapshot.context_pairs[0].confidence, 1);
        assert_eq!(snapshot.stats, Stats::default());
        assert!(snapshot.patterns.is_empty());
    }
}
