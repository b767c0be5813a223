//! Sentence-claim support checking.
//!
//! Decomposes a candidate text into sentence-level claims, retrieves the
//! best-supporting chunks for each, and aggregates a supported/unsupported
//! verdict with an accuracy score. Finding no supporting evidence is a
//! normal outcome represented in the result, never an error, and the check
//! is side-effect-free: the catalog is only read.
//!
//! # Algorithm
//!
//! 1. Split the text into sentence-like segments on `.`, `!`, `?`.
//! 2. Discard segments shorter than 20 characters; analyze at most the
//!    first 10 (bounds retrieval cost).
//! 3. Per segment, `query(segment, doc_types, top_k = 3)`; the segment is
//!    supported when the best score exceeds the support threshold, with
//!    that score as confidence (0 when nothing matched).
//! 4. `accuracy = supported / max(1, total)`; unsupported claim texts are
//!    reported as `potential_issues`, capped at 5.

use knowledge_store_core::models::{ClaimCheck, DocumentType, ValidationResult};

use crate::store::KnowledgeStore;

/// Segments shorter than this are too fragmentary to check.
const MIN_CLAIM_CHARS: usize = 20;
/// At most this many segments are analyzed per call.
const MAX_CLAIMS: usize = 10;
/// Cap on reported unsupported claims.
const MAX_ISSUES: usize = 5;
/// Results fetched per claim.
const CLAIM_TOP_K: usize = 3;

/// Split candidate text into checkable claims.
pub fn split_claims(text: &str) -> Vec<String> {
    text.split(['.', '!', '?'])
        .map(str::trim)
        .filter(|s| s.len() >= MIN_CLAIM_CHARS)
        .take(MAX_CLAIMS)
        .map(str::to_string)
        .collect()
}

pub(crate) fn validate(
    store: &KnowledgeStore,
    text: &str,
    doc_types: Option<&[DocumentType]>,
    threshold: f32,
) -> ValidationResult {
    let claims = split_claims(text);
    let total_claims = claims.len();

    let mut checks: Vec<ClaimCheck> = Vec::with_capacity(total_claims);
    for claim in claims {
        let results = store.query(&claim, doc_types, CLAIM_TOP_K);
        let best = results.first();
        checks.push(ClaimCheck {
            supported: best.map(|r| r.score > threshold).unwrap_or(false),
            confidence: best.map(|r| r.score).unwrap_or(0.0),
            best_source: best.map(|r| r.document_name.clone()),
            text: claim,
        });
    }

    let supported_claims = checks.iter().filter(|c| c.supported).count();
    let potential_issues: Vec<String> = checks
        .iter()
        .filter(|c| !c.supported)
        .take(MAX_ISSUES)
        .map(|c| c.text.clone())
        .collect();

    ValidationResult {
        accuracy_score: supported_claims as f32 / total_claims.max(1) as f32,
        total_claims,
        supported_claims,
        unsupported_claims: total_claims - supported_claims,
        claims: checks,
        potential_issues,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_drops_short_segments() {
        let claims = split_claims("Yes. This segment is long enough to check. No!");
        assert_eq!(claims.len(), 1);
        assert_eq!(claims[0], "This segment is long enough to check");
    }

    #[test]
    fn test_split_caps_at_ten() {
        let text = (0..20)
            .map(|i| format!("This is claim number {} in a long text", i))
            .collect::<Vec<_>>()
            .join(". ");
        assert_eq!(split_claims(&text).len(), MAX_CLAIMS);
    }

    #[test]
    fn test_split_handles_all_terminators() {
        let claims =
            split_claims("Is this a reasonably long question? An exclamation follows here!");
        assert_eq!(claims.len(), 2);
    }

    #[test]
    fn test_split_empty_text() {
        assert!(split_claims("").is_empty());
        assert!(split_claims("Short. Tiny. No.").is_empty());
    }
}
