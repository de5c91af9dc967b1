//! Quality scoring for observed exchanges
//!
//! Scores are length heuristics layered on the garbage classifier: a pair
//! whose input or response is garbage scores 0, otherwise the score starts
//! from a neutral base and moves with how substantial each side is.

use crate::text::{extract_keywords, GarbageClassifier};

const BASE_SCORE: i32 = 50;

/// Assigns a bounded 0-100 quality score to an (input, response) pair
pub struct QualityScorer<'a> {
    classifier: &'a GarbageClassifier,
}

impl<'a> QualityScorer<'a> {
    /// Create a scorer backed by a garbage classifier
    pub fn new(classifier: &'a GarbageClassifier) -> Self {
        Self { classifier }
    }

    /// Score a pair (0-100)
    pub fn score(&self, input: &str, response: &str) -> u8 {
        let input = input.trim();
        let response = response.trim();
        if input.is_empty() || response.is_empty() {
            return 0;
        }
        if self.classifier.is_garbage(input) || self.classifier.is_garbage(response) {
            return 0;
        }

        let mut score = BASE_SCORE;

        score += match response.chars().count() {
            0..=2 => -20,
            3..=9 => 0,
            10..=200 => 20,
            _ => 10,
        };

        score += match input.split_whitespace().count() {
            1 => 0,
            2..=20 => 10,
            _ => 5,
        };

        if !extract_keywords(response).is_empty() {
            score += 10;
        }

        if response.ends_with(&['.', '!', '?'][..]) {
            score += 5;
        }

        // Echoes teach nothing
        if input.eq_ignore_ascii_case(response) {
            score -= 40;
        }

        score.clamp(0, 100) as u8
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn classifier() -> GarbageClassifier {
        GarbageClassifier::with_default_rules().unwrap()
    }

    #[test]
    fn test_substantial_pair_scores_high() {
        let c = classifier();
        let scorer = QualityScorer::new(&c);
        let score = scorer.score("what is your favorite food", "I really love fresh pasta.");
        assert_eq!(score, 95);
    }

    #[test]
    fn test_short_response_scores_low() {
        let c = classifier();
        let scorer = QualityScorer::new(&c);
        assert_eq!(scorer.score("hello", "ok"), 30);
    }

    #[test]
    fn test_garbage_scores_zero() {
        let c = classifier();
        let scorer = QualityScorer::new(&c);
        assert_eq!(scorer.score("asdfghjkl", "a perfectly fine reply"), 0);
        assert_eq!(scorer.score("a perfectly fine question", "zzzzzz"), 0);
        assert_eq!(scorer.score("", "reply"), 0);
    }

    #[test]
    fn test_echo_is_penalized() {
        let c = classifier();
        let scorer = QualityScorer::new(&c);
        let echo = scorer.score("good morning friend", "Good morning friend");
        let reply = scorer.score("good morning friend", "morning, sleep well?");
        assert!(echo < reply);
    }

    #[test]
    fn test_score_is_bounded() {
        let c = classifier();
        let scorer = QualityScorer::new(&c);
        let long = "this response goes on and on ".repeat(20);
        for (input, response) in [
            ("x y", "no"),
            ("tell me a story about dragons", long.as_str()),
            ("hi", "hey there, nice to meet you!"),
        ] {
            let score = scorer.score(input, response);
            assert!(score <= 100, "{score}");
        }
    }
}
