//! The Knowledge Store orchestrator.
//!
//! Sole owner of the tenant's document catalog. Drives the ingest pipeline
//! (parse → chunk → embed → index → persist), answers queries through the
//! vector index or the keyword fallback, and serves claim validation and
//! RAG context assembly.
//!
//! # Consistency
//!
//! Every mutation persists the full catalog to the tenant's JSON file
//! before returning, and is all-or-nothing: a late failure rolls back any
//! catalog and index writes already made. On startup the catalog is
//! deserialized and the vector index rebuilt from the stored embeddings —
//! never re-embedded.
//!
//! # Locking
//!
//! The catalog and index live behind one `RwLock`. Reads (`query`,
//! `validate_content`, `list_documents`) take the shared lock and run
//! concurrently; mutations take the exclusive lock only around the catalog
//! insert, index writes, and persist. Parsing, chunking, and embedding run
//! before the lock is taken, so a slow embedding backend never blocks
//! readers.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::RwLock;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{debug, info, warn};

use knowledge_store_core::chunk::split_windows;
use knowledge_store_core::embedding::EmbeddingProvider;
use knowledge_store_core::index::VectorIndex;
use knowledge_store_core::models::{
    Chunk, Document, DocumentSummary, DocumentType, SearchResult, ValidationResult,
};
use knowledge_store_core::search::{keyword_overlap, tokenize};

use crate::config::{ChunkingConfig, Config, RetrievalConfig};
use crate::error::StoreError;
use crate::extract::{Extracted, ParserRegistry, SourceFormat};
use crate::validate;

/// Separator between context blocks in [`KnowledgeStore::get_context_for_generation`].
const CONTEXT_SEPARATOR: &str = "\n\n---\n\n";

const CATALOG_VERSION: u32 = 1;

/// On-disk catalog shape. Must round-trip losslessly across save/load.
#[derive(Serialize, Deserialize)]
struct CatalogFile {
    version: u32,
    documents: Vec<Document>,
}

/// Mutable state guarded by the store's lock: the ordered document catalog
/// and the vector index derived from it.
struct Catalog {
    documents: Vec<Document>,
    index: VectorIndex,
}

/// Counters reported by [`KnowledgeStore::stats`].
#[derive(Debug, Clone, Serialize)]
pub struct StoreStats {
    pub documents: usize,
    pub chunks: usize,
    pub indexed_vectors: usize,
    /// True when no embedding provider is configured (keyword fallback).
    pub degraded: bool,
}

/// Single-tenant document catalog with vector retrieval and claim
/// validation. See the module docs for the consistency and locking model.
pub struct KnowledgeStore {
    path: PathBuf,
    registry: ParserRegistry,
    provider: Option<Box<dyn EmbeddingProvider>>,
    chunking: ChunkingConfig,
    retrieval: RetrievalConfig,
    inner: RwLock<Catalog>,
}

impl std::fmt::Debug for KnowledgeStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KnowledgeStore")
            .field("path", &self.path)
            .finish_non_exhaustive()
    }
}

impl KnowledgeStore {
    /// Open (or create) the tenant's store.
    ///
    /// Loads the persisted catalog if present and rebuilds the vector
    /// index from the stored embeddings. A catalog that fails to
    /// deserialize is [`StoreError::IndexCorruption`], fatal here —
    /// continuing with a partial catalog would desynchronize the index.
    pub fn open(
        config: &Config,
        registry: ParserRegistry,
        provider: Option<Box<dyn EmbeddingProvider>>,
    ) -> Result<Self> {
        fs::create_dir_all(&config.storage.dir).with_context(|| {
            format!(
                "Failed to create storage dir: {}",
                config.storage.dir.display()
            )
        })?;
        let path = config
            .storage
            .dir
            .join(format!("{}.json", config.storage.tenant));

        let documents = if path.exists() {
            let content = fs::read_to_string(&path)
                .with_context(|| format!("Failed to read catalog: {}", path.display()))?;
            let file: CatalogFile = serde_json::from_str(&content)
                .map_err(|e| StoreError::IndexCorruption(e.to_string()))?;
            if file.version != CATALOG_VERSION {
                return Err(StoreError::IndexCorruption(format!(
                    "unknown catalog version {}",
                    file.version
                ))
                .into());
            }
            file.documents
        } else {
            Vec::new()
        };

        let mut index = VectorIndex::new();
        for doc in &documents {
            for chunk in &doc.chunks {
                if let Some(vector) = &chunk.embedding {
                    index.upsert(&chunk.id, vector.clone(), &doc.id);
                }
            }
        }

        if provider.is_none() {
            warn!(
                tenant = %config.storage.tenant,
                "no embedding provider configured; retrieval degraded to keyword overlap"
            );
        }
        info!(
            tenant = %config.storage.tenant,
            documents = documents.len(),
            vectors = index.len(),
            "knowledge store opened"
        );

        Ok(Self {
            path,
            registry,
            provider,
            chunking: config.chunking.clone(),
            retrieval: config.retrieval.clone(),
            inner: RwLock::new(Catalog { documents, index }),
        })
    }

    /// Ingest one source file: parse by extension, chunk, embed
    /// (best-effort), index, persist. Returns the recorded [`Document`].
    ///
    /// # Errors
    ///
    /// `UnsupportedFormat` for an unknown extension, `ParseFailure` for
    /// corrupt content, `EmptyContent` when parsing yields nothing. No
    /// partial document survives an error.
    pub fn upload_document(
        &self,
        source: &Path,
        doc_type: DocumentType,
        name: Option<String>,
        metadata: Option<BTreeMap<String, String>>,
        owner: Option<String>,
    ) -> Result<Document> {
        let format = SourceFormat::from_path(source)?;
        let bytes = fs::read(source)
            .with_context(|| format!("Failed to read source: {}", source.display()))?;
        let extracted = self.registry.extract(format, &bytes)?;
        let name = name.unwrap_or_else(|| {
            source
                .file_stem()
                .and_then(|s| s.to_str())
                .unwrap_or("document")
                .to_string()
        });
        self.ingest(
            extracted,
            source.display().to_string(),
            name,
            doc_type,
            metadata.unwrap_or_default(),
            owner,
        )
    }

    /// Ingest already-parsed plain text. Shares the chunk → embed →
    /// index → persist path with [`upload_document`](Self::upload_document).
    pub fn upload_text(
        &self,
        content: &str,
        doc_type: DocumentType,
        name: &str,
        metadata: Option<BTreeMap<String, String>>,
        owner: Option<String>,
    ) -> Result<Document> {
        if content.trim().is_empty() {
            return Err(StoreError::EmptyContent.into());
        }
        self.ingest(
            Extracted {
                text: content.trim().to_string(),
                needs_manual_review: false,
            },
            format!("text:{}", name),
            name.to_string(),
            doc_type,
            metadata.unwrap_or_default(),
            owner,
        )
    }

    fn ingest(
        &self,
        extracted: Extracted,
        source: String,
        name: String,
        doc_type: DocumentType,
        mut metadata: BTreeMap<String, String>,
        owner: Option<String>,
    ) -> Result<Document> {
        // Chunk and embed outside the lock; only catalog/index writes and
        // the persist run under it.
        let windows = split_windows(
            &extracted.text,
            self.chunking.window_words,
            self.chunking.overlap_words,
        );
        if windows.is_empty() {
            return Err(StoreError::EmptyContent.into());
        }

        let embeddings: Vec<Option<Vec<f32>>> = match &self.provider {
            Some(provider) => windows
                .iter()
                .map(|text| match provider.embed(text) {
                    Ok(vector) => Some(vector),
                    Err(e) => {
                        warn!(error = %e, "chunk embedding failed; storing without vector");
                        None
                    }
                })
                .collect(),
            None => vec![None; windows.len()],
        };

        if extracted.needs_manual_review {
            metadata.insert("needs_manual_review".to_string(), "true".to_string());
        }

        let mut chunk_metadata = metadata.clone();
        chunk_metadata.insert("doc_type".to_string(), doc_type.as_str().to_string());

        let mut catalog = self.inner.write().unwrap();
        let now = Utc::now();
        let id = derive_document_id(&name, now, &catalog.documents);

        let chunks: Vec<Chunk> = windows
            .into_iter()
            .zip(embeddings)
            .enumerate()
            .map(|(index, (text, embedding))| Chunk {
                id: format!("{}-{}", id, index),
                document_id: id.clone(),
                chunk_index: index,
                text,
                metadata: chunk_metadata.clone(),
                embedding,
            })
            .collect();

        let document = Document {
            id: id.clone(),
            name,
            doc_type,
            source,
            chunks,
            metadata,
            created_at: now,
            updated_at: now,
            owner,
        };

        for chunk in &document.chunks {
            if let Some(vector) = &chunk.embedding {
                catalog.index.upsert(&chunk.id, vector.clone(), &id);
            }
        }
        catalog.documents.push(document);

        if let Err(e) = self.persist(&catalog.documents) {
            // Roll back: no partial entries may remain in catalog or index.
            let doc = catalog.documents.pop().unwrap();
            for chunk in &doc.chunks {
                catalog.index.remove(&chunk.id);
            }
            return Err(e);
        }

        let document = catalog.documents.last().unwrap().clone();
        info!(
            doc_id = %document.id,
            doc_type = %document.doc_type,
            chunks = document.chunks.len(),
            "document ingested"
        );
        Ok(document)
    }

    /// Retrieve the `top_k` most relevant chunks for a question.
    ///
    /// With an embedding provider the question is embedded and ranked by
    /// cosine similarity over a `top_k × candidate_multiplier` knn pool;
    /// without one (or if embedding the question fails) chunks are ranked
    /// by keyword overlap. Both paths return results strictly sorted by
    /// descending score, ties in document insertion order. Never errors.
    pub fn query(
        &self,
        question: &str,
        doc_types: Option<&[DocumentType]>,
        top_k: usize,
    ) -> Vec<SearchResult> {
        let catalog = self.inner.read().unwrap();

        let results = match &self.provider {
            Some(provider) => match provider.embed(question) {
                Ok(query_vec) => Self::vector_query(
                    &catalog,
                    &query_vec,
                    doc_types,
                    top_k,
                    self.retrieval.candidate_multiplier,
                ),
                Err(e) => {
                    warn!(error = %e, "query embedding failed; falling back to keyword overlap");
                    Self::keyword_query(&catalog, question, doc_types, top_k)
                }
            },
            None => Self::keyword_query(&catalog, question, doc_types, top_k),
        };

        debug!(results = results.len(), top_k, "query answered");
        results
    }

    fn vector_query(
        catalog: &Catalog,
        query_vec: &[f32],
        doc_types: Option<&[DocumentType]>,
        top_k: usize,
        candidate_multiplier: usize,
    ) -> Vec<SearchResult> {
        let candidates = catalog.index.knn(query_vec, top_k * candidate_multiplier);
        let mut results = Vec::new();
        for neighbor in candidates {
            let Some(doc) = catalog.documents.iter().find(|d| d.id == neighbor.document_id)
            else {
                continue;
            };
            if let Some(filter) = doc_types {
                if !filter.contains(&doc.doc_type) {
                    continue;
                }
            }
            let Some(chunk) = doc.chunks.iter().find(|c| c.id == neighbor.chunk_id) else {
                continue;
            };
            results.push(SearchResult {
                chunk_id: chunk.id.clone(),
                document_id: doc.id.clone(),
                document_name: doc.name.clone(),
                doc_type: doc.doc_type,
                text: chunk.text.clone(),
                score: neighbor.score,
            });
            if results.len() == top_k {
                break;
            }
        }
        results
    }

    fn keyword_query(
        catalog: &Catalog,
        question: &str,
        doc_types: Option<&[DocumentType]>,
        top_k: usize,
    ) -> Vec<SearchResult> {
        let query_words = tokenize(question);
        if query_words.is_empty() {
            return Vec::new();
        }

        let mut results: Vec<SearchResult> = Vec::new();
        for doc in &catalog.documents {
            if let Some(filter) = doc_types {
                if !filter.contains(&doc.doc_type) {
                    continue;
                }
            }
            for chunk in &doc.chunks {
                let score = keyword_overlap(&query_words, &chunk.text);
                if score > 0.0 {
                    results.push(SearchResult {
                        chunk_id: chunk.id.clone(),
                        document_id: doc.id.clone(),
                        document_name: doc.name.clone(),
                        doc_type: doc.doc_type,
                        text: chunk.text.clone(),
                        score,
                    });
                }
            }
        }

        // Stable sort keeps document insertion order on ties.
        results.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        results.truncate(top_k);
        results
    }

    /// Check each sentence-level claim in `text` for support in the
    /// catalog. Side-effect-free. See [`crate::validate`] for the
    /// algorithm.
    pub fn validate_content(
        &self,
        text: &str,
        doc_types: Option<&[DocumentType]>,
    ) -> ValidationResult {
        validate::validate(self, text, doc_types, self.retrieval.support_threshold)
    }

    /// Assemble source-attributed context for a downstream generator:
    /// up to `max_chunks` query results, each prefixed with its document
    /// name, joined by a visible separator. Empty string when nothing
    /// matches.
    pub fn get_context_for_generation(
        &self,
        topic: &str,
        doc_types: Option<&[DocumentType]>,
        max_chunks: usize,
    ) -> String {
        let results = self.query(topic, doc_types, max_chunks);
        results
            .iter()
            .map(|r| format!("[Source: {}]\n{}", r.document_name, r.text))
            .collect::<Vec<_>>()
            .join(CONTEXT_SEPARATOR)
    }

    /// Remove a document and all its chunks from catalog and index, then
    /// persist. Returns whether anything was removed; an unknown id is an
    /// expected condition, not an error.
    pub fn delete_document(&self, id: &str) -> Result<bool> {
        let mut catalog = self.inner.write().unwrap();
        let Some(pos) = catalog.documents.iter().position(|d| d.id == id) else {
            return Ok(false);
        };

        let doc = catalog.documents.remove(pos);
        for chunk in &doc.chunks {
            catalog.index.remove(&chunk.id);
        }

        if let Err(e) = self.persist(&catalog.documents) {
            // Roll back the delete so memory matches the file on disk.
            for chunk in &doc.chunks {
                if let Some(vector) = &chunk.embedding {
                    catalog.index.upsert(&chunk.id, vector.clone(), &doc.id);
                }
            }
            catalog.documents.insert(pos, doc);
            return Err(e);
        }

        info!(doc_id = %id, chunks = doc.chunks.len(), "document deleted");
        Ok(true)
    }

    /// List document summaries, optionally filtered by type, in insertion
    /// order.
    pub fn list_documents(&self, doc_type: Option<DocumentType>) -> Vec<DocumentSummary> {
        let catalog = self.inner.read().unwrap();
        catalog
            .documents
            .iter()
            .filter(|d| doc_type.map_or(true, |t| d.doc_type == t))
            .map(|d| DocumentSummary {
                id: d.id.clone(),
                name: d.name.clone(),
                doc_type: d.doc_type,
                chunk_count: d.chunks.len(),
                created_at: d.created_at,
            })
            .collect()
    }

    /// Fetch a document by id, chunks included. `None` for an unknown id.
    pub fn get_document(&self, id: &str) -> Option<Document> {
        let catalog = self.inner.read().unwrap();
        catalog.documents.iter().find(|d| d.id == id).cloned()
    }

    /// Set one metadata key on a document and persist. Documents are
    /// immutable except for metadata; this bumps `updated_at`. Returns
    /// false for an unknown id.
    pub fn update_metadata(&self, id: &str, key: &str, value: &str) -> Result<bool> {
        let mut catalog = self.inner.write().unwrap();
        let Some(pos) = catalog.documents.iter().position(|d| d.id == id) else {
            return Ok(false);
        };

        let previous = catalog.documents[pos]
            .metadata
            .insert(key.to_string(), value.to_string());
        let previous_updated_at = catalog.documents[pos].updated_at;
        catalog.documents[pos].updated_at = Utc::now();

        if let Err(e) = self.persist(&catalog.documents) {
            let doc = &mut catalog.documents[pos];
            match previous {
                Some(v) => {
                    doc.metadata.insert(key.to_string(), v);
                }
                None => {
                    doc.metadata.remove(key);
                }
            }
            doc.updated_at = previous_updated_at;
            return Err(e);
        }
        Ok(true)
    }

    pub fn stats(&self) -> StoreStats {
        let catalog = self.inner.read().unwrap();
        StoreStats {
            documents: catalog.documents.len(),
            chunks: catalog.documents.iter().map(|d| d.chunks.len()).sum(),
            indexed_vectors: catalog.index.len(),
            degraded: self.provider.is_none(),
        }
    }

    /// Write the full catalog to the tenant file, via a temp-file rename
    /// so a crash mid-write never leaves a truncated catalog.
    fn persist(&self, documents: &[Document]) -> Result<()> {
        let file = CatalogFile {
            version: CATALOG_VERSION,
            documents: documents.to_vec(),
        };
        let json = serde_json::to_string_pretty(&file)?;
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, json)
            .with_context(|| format!("Failed to write catalog: {}", tmp.display()))?;
        fs::rename(&tmp, &self.path)
            .with_context(|| format!("Failed to replace catalog: {}", self.path.display()))?;
        Ok(())
    }
}

/// Derive a stable document id: hex SHA-256 of name + ingest timestamp,
/// truncated to 16 chars, re-rolled with a salt on collision.
fn derive_document_id(name: &str, now: DateTime<Utc>, existing: &[Document]) -> String {
    for salt in 0u64.. {
        let mut hasher = Sha256::new();
        hasher.update(name.as_bytes());
        hasher.update(
            now.timestamp_nanos_opt()
                .unwrap_or_else(|| now.timestamp())
                .to_le_bytes(),
        );
        hasher.update(salt.to_le_bytes());
        let id = format!("{:x}", hasher.finalize())[..16].to_string();
        if !existing.iter().any(|d| d.id == id) {
            return id;
        }
    }
    unreachable!("id space exhausted")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_derived_ids_differ_for_same_name() {
        let a = derive_document_id("Spec", Utc::now(), &[]);
        std::thread::sleep(std::time::Duration::from_millis(2));
        let b = derive_document_id("Spec", Utc::now(), &[]);
        assert_ne!(a, b);
        assert_eq!(a.len(), 16);
    }
}
