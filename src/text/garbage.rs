//! Garbage classifier
//!
//! Decides whether a cleaned message is acceptable to learn from or answer.
//! The regex list is a replaceable policy table; the structural heuristics
//! (character runs, vowel-less tokens, symbol density) are fixed.

use crate::error::{Error, Result};
use regex::Regex;
use serde::{Deserialize, Serialize};

/// A single regex rule in the garbage policy table
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GarbageRule {
    /// Rule name reported in verdicts
    pub name: String,
    /// Regex matched against the whole message
    pub pattern: String,
    /// Human-readable description
    pub description: String,
}

/// Default policy table
pub fn default_garbage_rules() -> Vec<GarbageRule> {
    vec![
        GarbageRule {
            name: "keyboard_mash".to_string(),
            pattern: r"(?i)^\s*(?:asdf|qwer|zxcv|hjkl|sdfg|dfgh|fghj|uiop|wasd)[a-z;]*\s*$"
                .to_string(),
            description: "Adjacent-key sequences typed without meaning".to_string(),
        },
        GarbageRule {
            name: "filler".to_string(),
            pattern: r"(?i)^\s*(?:test|testing|asd|xx+|zz+|123+|\.+|\?+)\s*$".to_string(),
            description: "Placeholder or probe messages".to_string(),
        },
        GarbageRule {
            name: "link_spam".to_string(),
            pattern: r"(?i)(?:https?://|www\.)\S+".to_string(),
            description: "Messages carrying links".to_string(),
        },
        GarbageRule {
            name: "single_character".to_string(),
            pattern: r"^\s*\S\s*$".to_string(),
            description: "A lone character".to_string(),
        },
    ]
}

/// Outcome of classifying a message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GarbageVerdict {
    /// Whether the message should be rejected
    pub garbage: bool,
    /// Names of the rules and heuristics that fired
    pub reasons: Vec<String>,
}

struct CompiledRule {
    name: String,
    pattern: Regex,
}

/// Runs of the same character at or above this length are noise.
const MAX_CHAR_RUN: usize = 5;

/// Alphabetic tokens at least this long must contain a vowel.
const VOWEL_CHECK_LEN: usize = 7;

/// Pure predicate over normalized text
pub struct GarbageClassifier {
    rules: Vec<CompiledRule>,
}

impl GarbageClassifier {
    /// Create a classifier with the given rules
    pub fn new(rules: Vec<GarbageRule>) -> Result<Self> {
        let rules = rules
            .into_iter()
            .map(|rule| {
                let pattern = Regex::new(&rule.pattern).map_err(|e| {
                    Error::Config(format!(
                        "Invalid regex pattern for garbage rule '{}': {}",
                        rule.name, e
                    ))
                })?;
                Ok(CompiledRule {
                    name: rule.name,
                    pattern,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self { rules })
    }

    /// Create a classifier with the default policy table
    pub fn with_default_rules() -> Result<Self> {
        Self::new(default_garbage_rules())
    }

    /// Classify a message
    pub fn classify(&self, text: &str) -> GarbageVerdict {
        let mut reasons: Vec<String> = self
            .rules
            .iter()
            .filter(|rule| rule.pattern.is_match(text))
            .map(|rule| rule.name.clone())
            .collect();

        if !text.chars().any(|c| c.is_alphanumeric()) {
            reasons.push("no_content".to_string());
        }
        if longest_run(text) >= MAX_CHAR_RUN {
            reasons.push("repeated_characters".to_string());
        }
        if has_vowelless_token(text) {
            reasons.push("unpronounceable".to_string());
        }
        if symbol_heavy(text) {
            reasons.push("symbol_heavy".to_string());
        }

        GarbageVerdict {
            garbage: !reasons.is_empty(),
            reasons,
        }
    }

    /// Check if text should be rejected
    pub fn is_garbage(&self, text: &str) -> bool {
        self.classify(text).garbage
    }
}

fn longest_run(text: &str) -> usize {
    let mut longest = 0;
    let mut current = 0;
    let mut previous = None;
    for c in text.chars().filter(|c| !c.is_whitespace()) {
        let c = c.to_ascii_lowercase();
        if Some(c) == previous {
            current += 1;
        } else {
            current = 1;
            previous = Some(c);
        }
        longest = longest.max(current);
    }
    longest
}

fn has_vowelless_token(text: &str) -> bool {
    text.split_whitespace().any(|token| {
        token.chars().count() >= VOWEL_CHECK_LEN
            && token.chars().all(|c| c.is_ascii_alphabetic())
            && !token
                .chars()
                .any(|c| matches!(c.to_ascii_lowercase(), 'a' | 'e' | 'i' | 'o' | 'u' | 'y'))
    })
}

fn symbol_heavy(text: &str) -> bool {
    let visible: Vec<char> = text.chars().filter(|c| !c.is_whitespace()).collect();
    if visible.len() < 4 {
        return false;
    }
    let symbols = visible.iter().filter(|c| !c.is_alphanumeric()).count();
    symbols * 2 > visible.len()
}
