//! Typed error taxonomy for ingest and store construction.
//!
//! Ingest-time errors (`UnsupportedFormat`, `ParseFailure`, `EmptyContent`)
//! are fatal to that one upload and leave no partial state behind.
//! `IndexCorruption` is fatal at store construction: continuing with a
//! partial catalog would break the invariant that the vector index is a
//! perfect derivation of the persisted documents.
//!
//! Expected caller conditions are not errors: deleting or fetching an
//! unknown document id returns `false` / `None`, and a missing embedding
//! provider is a recognized degraded mode, not a failure.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    /// The source has no parser for its extension or format tag.
    #[error("unsupported format: {0}")]
    UnsupportedFormat(String),

    /// The source was recognized but its content could not be decoded.
    #[error("parse failure: {0}")]
    ParseFailure(String),

    /// Parsing produced blank or whitespace-only text.
    #[error("document produced no content")]
    EmptyContent,

    /// The persisted catalog failed to deserialize on startup.
    #[error("catalog corrupt: {0}")]
    IndexCorruption(String),
}
