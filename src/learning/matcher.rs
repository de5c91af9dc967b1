//! Retrieval by exact match, then keyword-overlap relevance

use super::entry::PatternEntry;
use super::store::PatternStore;
use crate::text::{extract_keywords, overlap};
use serde::Serialize;

/// How a response was found
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchSource {
    /// Context pair with the same input
    Exact,
    /// Best-ranked keyword cluster candidate
    Cluster,
}

/// A retrieved response
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MatchResult {
    /// Response text
    pub response: String,
    /// Relevance of the winning candidate
    pub relevance: f64,
    /// How it was found
    pub source: MatchSource,
}

/// A ranked cluster candidate
#[derive(Debug, Clone)]
pub struct Candidate<'a> {
    /// The stored entry
    pub entry: &'a PatternEntry,
    /// Shared keywords with the query
    pub overlap: usize,
    /// `overlap / max(|keywords(query)|, 1) × quality`
    pub relevance: f64,
}

/// Finds the best known response for a query
#[derive(Debug, Clone)]
pub struct Matcher {
    threshold: f64,
}

impl Matcher {
    /// Create a matcher; cluster candidates must score above `threshold`
    pub fn new(threshold: f64) -> Self {
        Self { threshold }
    }

    /// Exact context pair first, otherwise the top cluster candidate above the threshold
    pub fn find(&self, store: &PatternStore, query: &str) -> Option<MatchResult> {
        if let Some(entry) = store.find_exact(query) {
            return Some(MatchResult {
                response: entry.response.clone(),
                relevance: f64::from(entry.quality),
                source: MatchSource::Exact,
            });
        }

        let best = self.rank(store, query).into_iter().next()?;
        if best.relevance > self.threshold {
            Some(MatchResult {
                response: best.entry.response.clone(),
                relevance: best.relevance,
                source: MatchSource::Cluster,
            })
        } else {
            tracing::debug!(
                relevance = best.relevance,
                threshold = self.threshold,
                "Best candidate below relevance threshold"
            );
            None
        }
    }

    /// Every cluster candidate for the query, most relevant first.
    ///
    /// Candidates are gathered keyword by keyword in the query's keyword order,
    /// each cluster contributing its entries best first; an entry filed under
    /// several matching keywords appears once per cluster. The sort is stable,
    /// so ties keep that gathering order.
    pub fn rank<'a>(&self, store: &'a PatternStore, query: &str) -> Vec<Candidate<'a>> {
        let query_keywords = extract_keywords(query);
        let denominator = query_keywords.len().max(1) as f64;

        let mut candidates: Vec<Candidate<'a>> = query_keywords
            .iter()
            .flat_map(move |keyword| store.cluster(keyword))
            .map(|entry| {
                let shared = overlap(&query_keywords, &extract_keywords(&entry.input));
                Candidate {
                    entry,
                    overlap: shared,
                    relevance: shared as f64 / denominator * f64::from(entry.quality),
                }
            })
            .collect();

        candidates.sort_by(|a, b| {
            b.relevance
                .partial_cmp(&a.relevance)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        candidates
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LearningConfig;
    use crate::learning::store::LearnSource;

    fn matcher() -> Matcher {
        Matcher::new(LearningConfig::default().relevance_threshold)
    }

    fn store_with(pairs: &[(&str, &str, u8)]) -> PatternStore {
        let mut store = PatternStore::new(LearningConfig::default());
        for (input, response, quality) in pairs {
            store
                .learn_pattern(input, response, *quality, LearnSource::Training)
                .unwrap();
        }
        store
    }

    #[test]
    fn test_exact_match_takes_precedence() {
        let store = store_with(&[
            ("hello", "hi there", 65),
            ("hello world program", "print it", 100),
        ]);
        let result = matcher().find(&store, "Hello").unwrap();
        assert_eq!(result.source, MatchSource::Exact);
        assert_eq!(result.response, "hi there");
    }

    #[test]
    fn test_cluster_match_by_overlap() {
        let store = store_with(&[("favorite pizza topping", "pineapple", 50)]);
        let result = matcher().find(&store, "what pizza topping is best").unwrap();
        assert_eq!(result.source, MatchSource::Cluster);
        assert_eq!(result.response, "pineapple");
        // query keywords: pizza, topping, best → 2/3 × 50
        assert!((result.relevance - 100.0 / 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_below_threshold_is_no_match() {
        let store = store_with(&[("favorite pizza topping", "pineapple", 40)]);
        // 2/3 × 40 ≈ 26.7 is not above 30
        assert!(matcher().find(&store, "what pizza topping is best").is_none());
    }

    #[test]
    fn test_zero_overlap_is_no_match() {
        let store = store_with(&[
            ("favorite pizza topping", "pineapple", 90),
            ("weather today", "rainy", 90),
        ]);
        assert!(matcher().find(&store, "quantum physics lecture").is_none());
        assert!(matcher().find(&store, "how are you").is_none());
    }

    #[test]
    fn test_ranking_prefers_higher_relevance() {
        let store = store_with(&[
            ("music jazz", "miles davis", 50),
            ("music jazz piano", "bill evans", 50),
            ("music rock", "led zeppelin", 55),
        ]);
        let ranked = matcher().rank(&store, "jazz piano music");
        assert_eq!(ranked[0].entry.response, "bill evans");
        assert_eq!(ranked[0].overlap, 3);
        assert!(ranked.windows(2).all(|w| w[0].relevance >= w[1].relevance));

        let result = matcher().find(&store, "jazz piano music").unwrap();
        assert_eq!(result.response, "bill evans");
    }

    #[test]
    fn test_duplicates_across_clusters_are_candidates() {
        let store = store_with(&[("music jazz", "miles davis", 50)]);
        let ranked = matcher().rank(&store, "music jazz");
        assert_eq!(ranked.len(), 2);
        assert!(ranked.iter().all(|c| c.entry.response == "miles davis"));
    }
}
