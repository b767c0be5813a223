//! In-memory vector index with brute-force cosine k-nearest-neighbor.
//!
//! Maps chunk ids to embedding vectors plus the owning document id, so a
//! neighbor can be resolved back to its document without a second lookup
//! table. Entries are derived data: the index is fully rebuilt from the
//! persisted catalog on load and holds no independent identity.
//!
//! The index itself is a plain data structure with no interior locking;
//! the orchestrator wraps it in an `RwLock` alongside the catalog so
//! readers never observe a mid-mutation state.

use std::collections::HashMap;

use crate::embedding::cosine_similarity;

#[derive(Debug, Clone)]
struct Entry {
    chunk_id: String,
    document_id: String,
    vector: Vec<f32>,
}

/// A ranked neighbor returned by [`VectorIndex::knn`].
#[derive(Debug, Clone)]
pub struct Neighbor {
    pub chunk_id: String,
    pub document_id: String,
    /// Cosine similarity to the query vector.
    pub score: f32,
}

/// Insertion-ordered associative store of chunk embeddings.
///
/// `upsert` is O(1) amortized; `knn` is a brute-force scan, which is the
/// right trade-off for single-tenant catalogs of this size and keeps tie
/// ordering stable (ties rank by insertion order).
#[derive(Debug, Default)]
pub struct VectorIndex {
    entries: Vec<Entry>,
    by_id: HashMap<String, usize>,
}

impl VectorIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or overwrite an entry. Overwriting keeps the entry's original
    /// insertion position, so tie-breaking stays stable across updates.
    pub fn upsert(&mut self, chunk_id: &str, vector: Vec<f32>, document_id: &str) {
        if let Some(&pos) = self.by_id.get(chunk_id) {
            self.entries[pos].vector = vector;
            self.entries[pos].document_id = document_id.to_string();
            return;
        }
        self.by_id.insert(chunk_id.to_string(), self.entries.len());
        self.entries.push(Entry {
            chunk_id: chunk_id.to_string(),
            document_id: document_id.to_string(),
            vector,
        });
    }

    /// Remove an entry. Removing an absent id is a no-op, not an error.
    /// Returns whether anything was removed.
    pub fn remove(&mut self, chunk_id: &str) -> bool {
        let Some(pos) = self.by_id.remove(chunk_id) else {
            return false;
        };
        self.entries.remove(pos);
        for idx in self.by_id.values_mut() {
            if *idx > pos {
                *idx -= 1;
            }
        }
        true
    }

    /// Return up to `k` nearest neighbors by cosine similarity, sorted
    /// descending. Ties keep insertion order (the sort is stable).
    pub fn knn(&self, query: &[f32], k: usize) -> Vec<Neighbor> {
        let mut neighbors: Vec<Neighbor> = self
            .entries
            .iter()
            .map(|e| Neighbor {
                chunk_id: e.chunk_id.clone(),
                document_id: e.document_id.clone(),
                score: cosine_similarity(query, &e.vector),
            })
            .collect();
        neighbors.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        neighbors.truncate(k);
        neighbors
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, chunk_id: &str) -> bool {
        self.by_id.contains_key(chunk_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn filled_index() -> VectorIndex {
        let mut index = VectorIndex::new();
        index.upsert("c1", vec![1.0, 0.0], "d1");
        index.upsert("c2", vec![0.0, 1.0], "d1");
        index.upsert("c3", vec![0.7, 0.7], "d2");
        index
    }

    #[test]
    fn test_knn_sorted_descending() {
        let index = filled_index();
        let hits = index.knn(&[1.0, 0.0], 3);
        assert_eq!(hits.len(), 3);
        assert_eq!(hits[0].chunk_id, "c1");
        assert!(hits[0].score >= hits[1].score);
        assert!(hits[1].score >= hits[2].score);
    }

    #[test]
    fn test_knn_truncates_to_k() {
        let index = filled_index();
        assert_eq!(index.knn(&[1.0, 0.0], 2).len(), 2);
        assert_eq!(index.knn(&[1.0, 0.0], 10).len(), 3);
    }

    #[test]
    fn test_knn_ties_keep_insertion_order() {
        let mut index = VectorIndex::new();
        // Identical vectors: identical similarity to any query.
        index.upsert("first", vec![1.0, 1.0], "d1");
        index.upsert("second", vec![1.0, 1.0], "d2");
        index.upsert("third", vec![1.0, 1.0], "d3");
        let hits = index.knn(&[2.0, 2.0], 3);
        let ids: Vec<&str> = hits.iter().map(|n| n.chunk_id.as_str()).collect();
        assert_eq!(ids, vec!["first", "second", "third"]);
    }

    #[test]
    fn test_upsert_overwrites_in_place() {
        let mut index = filled_index();
        index.upsert("c1", vec![0.0, 1.0], "d9");
        assert_eq!(index.len(), 3);
        let hits = index.knn(&[0.0, 1.0], 1);
        // c1 kept its original insertion slot, so it wins the tie with c2.
        assert_eq!(hits[0].chunk_id, "c1");
        assert_eq!(hits[0].document_id, "d9");
    }

    #[test]
    fn test_remove_absent_is_noop() {
        let mut index = filled_index();
        assert!(!index.remove("missing"));
        assert_eq!(index.len(), 3);
    }

    #[test]
    fn test_remove_keeps_later_entries_addressable() {
        let mut index = filled_index();
        assert!(index.remove("c1"));
        assert_eq!(index.len(), 2);
        assert!(!index.contains("c1"));
        // c3's slot shifted down; it must still resolve correctly.
        index.upsert("c3", vec![1.0, 0.0], "d2");
        let hits = index.knn(&[1.0, 0.0], 1);
        assert_eq!(hits[0].chunk_id, "c3");
    }

    #[test]
    fn test_zero_query_vector_scores_zero() {
        let index = filled_index();
        let hits = index.knn(&[0.0, 0.0], 3);
        for n in &hits {
            assert_eq!(n.score, 0.0);
        }
    }
}
