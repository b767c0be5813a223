//! # Knowledge Store
//!
//! A tenant-local document ingestion and retrieval library that lets
//! downstream content generators ground their output in a tenant's own
//! reference material, and lets generated text be checked for factual
//! support against that material.
//!
//! ## Architecture
//!
//! ```text
//! ┌───────────┐   ┌─────────┐   ┌───────────┐   ┌──────────────┐
//! │  Parsers  │──▶│ Chunker │──▶│ Embedding │──▶│ Vector Index │
//! │ txt/md/…  │   │ windows │   │ (optional)│   │  + catalog   │
//! └───────────┘   └─────────┘   └───────────┘   └──────┬───────┘
//!                                                      │
//!                              ┌───────────────────────┤
//!                              ▼                       ▼
//!                        ┌──────────┐           ┌────────────┐
//!                        │  query   │           │  validate  │
//!                        │ RAG ctx  │           │   claims   │
//!                        └──────────┘           └────────────┘
//! ```
//!
//! The [`store::KnowledgeStore`] is the sole owner of the document catalog
//! and the only component callers interact with directly. Without an
//! embedding provider it degrades to keyword-overlap retrieval; it never
//! refuses to answer a query.
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing and validation |
//! | [`error`] | Typed error taxonomy |
//! | [`extract`] | Multi-format text extraction (txt, md, json, csv, pdf, docx) |
//! | [`embedding`] | Embedding provider factory (OpenAI, Ollama, disabled) |
//! | [`store`] | Catalog orchestrator: ingest, query, delete, persist |
//! | [`validate`] | Sentence-claim support checking |

pub mod config;
pub mod embedding;
pub mod error;
pub mod extract;
pub mod store;
pub mod validate;

pub use config::Config;
pub use error::StoreError;
pub use store::KnowledgeStore;

pub use knowledge_store_core::embedding::EmbeddingProvider;
pub use knowledge_store_core::models::{
    Document, DocumentSummary, DocumentType, SearchResult, ValidationResult,
};
