//! Short-lived response cache in front of the matcher

use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::time::{Duration, Instant};

struct CachedResponse {
    response: String,
    inserted_at: Instant,
}

/// Hit/miss counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheStats {
    /// Lookups answered from the cache
    pub hits: u64,
    /// Lookups that fell through to the matcher
    pub misses: u64,
    /// Live entries
    pub entries: usize,
}

/// TTL-bounded map from normalized input to response
pub struct ResponseCache {
    ttl: Duration,
    capacity: usize,
    entries: HashMap<String, CachedResponse>,
    hits: u64,
    misses: u64,
}

impl ResponseCache {
    /// Create a cache holding at most `capacity` entries for `ttl` each
    pub fn new(ttl: Duration, capacity: usize) -> Self {
        Self {
            ttl,
            capacity,
            entries: HashMap::new(),
            hits: 0,
            misses: 0,
        }
    }

    /// Cache key: SHA-256 of the lowercased, trimmed input
    pub fn key(input: &str) -> String {
        let normalized = input.trim().to_lowercase();
        let digest = Sha256::digest(normalized.as_bytes());
        digest.iter().map(|b| format!("{:02x}", b)).collect()
    }

    /// Look up a response, recording a hit or miss
    pub fn get(&mut self, input: &str) -> Option<String> {
        let key = Self::key(input);
        let fresh = match self.entries.get(&key) {
            Some(cached) if cached.inserted_at.elapsed() < self.ttl => {
                Some(cached.response.clone())
            }
            Some(_) => {
                self.entries.remove(&key);
                None
            }
            None => None,
        };

        if fresh.is_some() {
            self.hits += 1;
        } else {
            self.misses += 1;
        }
        fresh
    }

    /// Remember a response for `input`
    pub fn insert(&mut self, input: &str, response: impl Into<String>) {
        if self.capacity == 0 {
            return;
        }
        let key = Self::key(input);
        if !self.entries.contains_key(&key) && self.entries.len() >= self.capacity {
            self.evict();
        }
        self.entries.insert(
            key,
            CachedResponse {
                response: response.into(),
                inserted_at: Instant::now(),
            },
        );
    }

    /// Drop every entry; counters are kept
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Current counters
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits,
            misses: self.misses,
            entries: self.entries.len(),
        }
    }

    fn evict(&mut self) {
        let ttl = self.ttl;
        self.entries.retain(|_, c| c.inserted_at.elapsed() < ttl);
        if self.entries.len() < self.capacity {
            return;
        }
        let oldest = self
            .entries
            .iter()
            .min_by_key(|(_, c)| c.inserted_at)
            .map(|(k, _)| k.clone());
        if let Some(key) = oldest {
            self.entries.remove(&key);
        }
    }
}
