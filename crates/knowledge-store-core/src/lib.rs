//! # Knowledge Store Core
//!
//! Shared, I/O-free logic for the Knowledge Store: data models, the
//! overlapping word-window chunker, the in-memory vector index, the
//! keyword-overlap scorer, and the embedding provider trait.
//!
//! This crate contains no filesystem, network, or locking dependencies.
//! Concurrency and persistence live in the `knowledge-store` app crate,
//! which drives these pieces through its orchestrator.

pub mod chunk;
pub mod embedding;
pub mod index;
pub mod models;
pub mod search;
