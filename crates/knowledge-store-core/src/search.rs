//! Keyword-overlap scoring for degraded-mode retrieval.
//!
//! When no embedding provider is configured (or a query-time embedding
//! fails), the store ranks chunks by the fraction of query words they
//! contain instead of cosine similarity. Tokenization is lowercase with
//! word boundaries at any non-alphanumeric character, and the query is
//! treated as a set.

use std::collections::HashSet;

/// Tokenize text into a lowercase word set.
///
/// `"ContentAI supports 10+ languages"` → `{contentai, supports, 10,
/// languages}`. Punctuation never survives tokenization, so `"$29/month"`
/// matches both `29` and `month`.
pub fn tokenize(text: &str) -> HashSet<String> {
    text.to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .map(str::to_string)
        .collect()
}

/// Score a chunk against a tokenized query: `|query ∩ chunk| / |query|`.
///
/// Returns a value in `[0.0, 1.0]`; `0.0` for an empty query.
pub fn keyword_overlap(query_words: &HashSet<String>, chunk_text: &str) -> f32 {
    if query_words.is_empty() {
        return 0.0;
    }
    let chunk_words = tokenize(chunk_text);
    let hits = query_words.iter().filter(|w| chunk_words.contains(*w)).count();
    hits as f32 / query_words.len() as f32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tokenize_lowercases_and_splits_punctuation() {
        let words = tokenize("ContentAI supports 10+ languages, $29/month!");
        assert!(words.contains("contentai"));
        assert!(words.contains("10"));
        assert!(words.contains("29"));
        assert!(words.contains("month"));
        assert!(!words.contains("$29/month"));
    }

    #[test]
    fn test_full_overlap_scores_one() {
        let q = tokenize("starter plan pricing");
        let score = keyword_overlap(&q, "Our starter plan pricing is simple.");
        assert!((score - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_partial_overlap() {
        let q = tokenize("alpha beta gamma delta");
        let score = keyword_overlap(&q, "beta and delta only");
        assert!((score - 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_no_overlap_scores_zero() {
        let q = tokenize("quantum flux");
        assert_eq!(keyword_overlap(&q, "completely unrelated text"), 0.0);
    }

    #[test]
    fn test_empty_query_scores_zero() {
        let q = tokenize("!!! ...");
        assert!(q.is_empty());
        assert_eq!(keyword_overlap(&q, "anything"), 0.0);
    }

    #[test]
    fn test_query_is_a_set() {
        // Repeated query words count once.
        let q = tokenize("plan plan plan price");
        assert_eq!(q.len(), 2);
        let score = keyword_overlap(&q, "the plan");
        assert!((score - 0.5).abs() < 1e-6);
    }
}
