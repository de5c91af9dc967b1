//! Text cleaning applied before any learning or matching call

use crate::error::{Error, Result};
use regex::Regex;

/// Default maximum cleaned length in characters.
pub const DEFAULT_MAX_CHARS: usize = 500;

/// Markup-like tags are removed before anything else.
const TAG_PATTERN: &str = r"</?[a-zA-Z][^<>]{0,200}>";

/// Normalizes raw user text into the form the learning core expects.
#[derive(Debug, Clone)]
pub struct TextCleaner {
    tag_pattern: Regex,
    max_chars: usize,
}

impl TextCleaner {
    /// Create a cleaner that rejects text longer than `max_chars` after cleaning
    pub fn new(max_chars: usize) -> Result<Self> {
        let tag_pattern = Regex::new(TAG_PATTERN)
            .map_err(|e| Error::Internal(format!("Invalid tag pattern: {}", e)))?;
        Ok(Self {
            tag_pattern,
            max_chars,
        })
    }

    /// Strip tags and control characters, collapse whitespace and trim.
    ///
    /// Returns `Error::Validation` when nothing is left or the result is too long.
    pub fn clean(&self, raw: &str) -> Result<String> {
        let without_tags = self.tag_pattern.replace_all(raw, " ");
        let printable: String = without_tags
            .chars()
            .map(|c| if c.is_control() { ' ' } else { c })
            .collect();
        let cleaned = printable.split_whitespace().collect::<Vec<_>>().join(" ");

        if cleaned.is_empty() {
            return Err(Error::Validation("message is empty".to_string()));
        }
        let len = cleaned.chars().count();
        if len > self.max_chars {
            return Err(Error::Validation(format!(
                "message is {} characters, limit is {}",
                len, self.max_chars
            )));
        }
        Ok(cleaned)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cleaner() -> TextCleaner {
        TextCleaner::new(DEFAULT_MAX_CHARS).unwrap()
    }

    #[test]
    fn test_collapses_whitespace() {
        assert_eq!(cleaner().clean("  hello \n\t there  ").unwrap(), "hello there");
    }

    #[test]
    fn test_strips_tags() {
        assert_eq!(
            cleaner().clean("<b>bold</b> <script>alert(1)</script>move").unwrap(),
            "bold alert(1) move"
        );
    }

    #[test]
    fn test_strips_control_characters() {
        assert_eq!(cleaner().clean("hi\u{0007}there\u{0000}").unwrap(), "hi there");
    }

    #[test]
    fn test_empty_is_validation_error() {
        assert!(matches!(cleaner().clean("   "), Err(Error::Validation(_))));
        assert!(matches!(cleaner().clean("<br>"), Err(Error::Validation(_))));
    }

    #[test]
    fn test_too_long_is_validation_error() {
        let cleaner = TextCleaner::new(10).unwrap();
        assert!(cleaner.clean("0123456789").is_ok());
        let err = cleaner.clean("0123456789a").unwrap_err();
        assert!(err.to_string().contains("limit is 10"));
    }

    #[test]
    fn test_keeps_comparison_operators() {
        assert_eq!(cleaner().clean("is 3 < 5 and 7 > 2").unwrap(), "is 3 < 5 and 7 > 2");
    }
}
