//! Keyword extraction
//!
//! Turns free text into the content words used to key semantic clusters and
//! to score overlap at retrieval time. Extraction is deterministic: the same
//! text always yields the same keywords in the same (first-seen) order.

/// Function words that carry no retrieval signal.
pub const STOP_WORDS: &[&str] = &[
    "the", "a", "an", "and", "or", "but", "is", "are", "was", "were", "be", "been", "being",
    "have", "has", "had", "do", "does", "did", "will", "would", "could", "should", "may",
    "might", "can", "to", "of", "in", "on", "at", "by", "for", "with", "about", "from", "this",
    "that", "these", "those", "it", "its", "you", "your", "what", "how", "when", "where", "why",
    "who", "they", "them", "there", "then", "than", "not",
];

/// Tokens at or below this many characters are dropped.
const MIN_KEYWORD_LEN: usize = 2;

/// Extract a deduplicated, insertion-ordered list of keywords from `text`.
pub fn extract_keywords(text: &str) -> Vec<String> {
    let normalized: String = text
        .to_lowercase()
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { ' ' })
        .collect();

    let mut keywords: Vec<String> = Vec::new();
    for token in normalized.split_whitespace() {
        if token.chars().count() <= MIN_KEYWORD_LEN || STOP_WORDS.contains(&token) {
            continue;
        }
        if !keywords.iter().any(|k| k == token) {
            keywords.push(token.to_string());
        }
    }
    keywords
}

/// Number of keywords shared by two keyword lists.
pub fn overlap(a: &[String], b: &[String]) -> usize {
    a.iter().filter(|k| b.contains(k)).count()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lowercases_and_strips_punctuation() {
        assert_eq!(
            extract_keywords("Favorite MOVIE, please!"),
            vec!["favorite", "movie", "please"]
        );
    }

    #[test]
    fn test_drops_stop_words_and_short_tokens() {
        assert!(extract_keywords("how are you").is_empty());
        assert_eq!(extract_keywords("I am in a big red car"), vec!["big", "red", "car"]);
    }

    #[test]
    fn test_deduplicates_in_insertion_order() {
        assert_eq!(
            extract_keywords("pizza pasta pizza salad pasta"),
            vec!["pizza", "pasta", "salad"]
        );
    }

    #[test]
    fn test_keeps_digits() {
        assert_eq!(extract_keywords("route 66 in 2024"), vec!["route", "2024"]);
    }

    #[test]
    fn test_non_ascii_letters_are_content() {
        assert_eq!(extract_keywords("café crème"), vec!["café", "crème"]);
    }

    #[test]
    fn test_overlap() {
        let a = extract_keywords("weather today sunny");
        let b = extract_keywords("sunny weather tomorrow");
        assert_eq!(overlap(&a, &b), 2);
        assert_eq!(overlap(&a, &[]), 0);
    }
}
