//! Core data models for the Knowledge Store.
//!
//! These types represent the documents, chunks, and result projections that
//! flow through the ingestion and retrieval pipeline. [`Document`] and
//! [`Chunk`] are persisted in the tenant catalog; [`SearchResult`] and
//! [`ValidationResult`] are transient projections and are never stored.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Classification of a reference document, drawn from a fixed enumeration.
///
/// Serialized in `snake_case` (`product_specs`, `faq`, …) both in the
/// persisted catalog and anywhere a type filter is accepted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentType {
    ProductSpecs,
    BrandGuidelines,
    CompanyInfo,
    Faq,
    CaseStudies,
    CompetitorInfo,
    Pricing,
    Legal,
    TechnicalDocs,
    MarketingMaterials,
}

impl DocumentType {
    /// Stable snake_case name, matching the serde representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            DocumentType::ProductSpecs => "product_specs",
            DocumentType::BrandGuidelines => "brand_guidelines",
            DocumentType::CompanyInfo => "company_info",
            DocumentType::Faq => "faq",
            DocumentType::CaseStudies => "case_studies",
            DocumentType::CompetitorInfo => "competitor_info",
            DocumentType::Pricing => "pricing",
            DocumentType::Legal => "legal",
            DocumentType::TechnicalDocs => "technical_docs",
            DocumentType::MarketingMaterials => "marketing_materials",
        }
    }
}

impl fmt::Display for DocumentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DocumentType {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "product_specs" => Ok(DocumentType::ProductSpecs),
            "brand_guidelines" => Ok(DocumentType::BrandGuidelines),
            "company_info" => Ok(DocumentType::CompanyInfo),
            "faq" => Ok(DocumentType::Faq),
            "case_studies" => Ok(DocumentType::CaseStudies),
            "competitor_info" => Ok(DocumentType::CompetitorInfo),
            "pricing" => Ok(DocumentType::Pricing),
            "legal" => Ok(DocumentType::Legal),
            "technical_docs" => Ok(DocumentType::TechnicalDocs),
            "marketing_materials" => Ok(DocumentType::MarketingMaterials),
            other => anyhow::bail!("unknown document type: {}", other),
        }
    }
}

/// A reference document owned by one tenant's catalog.
///
/// Created on successful ingest of one source file or text blob; immutable
/// except for `metadata` / `updated_at`; destroyed with all its chunks on
/// explicit delete.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    pub id: String,
    pub name: String,
    pub doc_type: DocumentType,
    /// Original source locator (file path or `text:{name}`).
    pub source: String,
    /// Ordered chunk sequence; a chunk's lifetime is exactly its parent's.
    pub chunks: Vec<Chunk>,
    #[serde(default)]
    pub metadata: BTreeMap<String, String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner: Option<String>,
}

/// An overlapping word window of a document's text, the atomic retrievable
/// unit.
///
/// The id is derived from the parent document id and the 0-based window
/// index (`{document_id}-{chunk_index}`), so it is stable and
/// reconstructible across save/reload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Chunk {
    pub id: String,
    pub document_id: String,
    pub chunk_index: usize,
    pub text: String,
    #[serde(default)]
    pub metadata: BTreeMap<String, String>,
    /// Absent when no embedding provider was configured at ingest time.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub embedding: Option<Vec<f32>>,
}

/// A ranked chunk returned from `query`. Transient; never persisted.
#[derive(Debug, Clone, Serialize)]
pub struct SearchResult {
    pub chunk_id: String,
    pub document_id: String,
    pub document_name: String,
    pub doc_type: DocumentType,
    pub text: String,
    /// Cosine similarity or keyword-overlap ratio, depending on mode.
    pub score: f32,
}

/// Per-claim detail within a [`ValidationResult`].
#[derive(Debug, Clone, Serialize)]
pub struct ClaimCheck {
    pub text: String,
    pub supported: bool,
    /// Best retrieval score for this claim; `0.0` when nothing matched.
    pub confidence: f32,
    /// Name of the document backing the best match, if any.
    pub best_source: Option<String>,
}

/// Aggregated support verdict for a candidate text. Transient.
#[derive(Debug, Clone, Serialize)]
pub struct ValidationResult {
    /// `supported_claims / max(1, total_claims)`, in `[0.0, 1.0]`.
    pub accuracy_score: f32,
    pub total_claims: usize,
    pub supported_claims: usize,
    pub unsupported_claims: usize,
    pub claims: Vec<ClaimCheck>,
    /// Unsupported claim texts, capped at 5.
    pub potential_issues: Vec<String>,
}

/// Lightweight document listing entry (no chunk payloads).
#[derive(Debug, Clone, Serialize)]
pub struct DocumentSummary {
    pub id: String,
    pub name: String,
    pub doc_type: DocumentType,
    pub chunk_count: usize,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_doc_type_roundtrip() {
        for name in [
            "product_specs",
            "brand_guidelines",
            "company_info",
            "faq",
            "case_studies",
            "competitor_info",
            "pricing",
            "legal",
            "technical_docs",
            "marketing_materials",
        ] {
            let dt: DocumentType = name.parse().unwrap();
            assert_eq!(dt.as_str(), name);
            let json = serde_json::to_string(&dt).unwrap();
            assert_eq!(json, format!("\"{}\"", name));
        }
    }

    #[test]
    fn test_unknown_doc_type_rejected() {
        assert!("press_releases".parse::<DocumentType>().is_err());
    }

    #[test]
    fn test_chunk_serde_omits_absent_embedding() {
        let chunk = Chunk {
            id: "d1-0".to_string(),
            document_id: "d1".to_string(),
            chunk_index: 0,
            text: "hello".to_string(),
            metadata: BTreeMap::new(),
            embedding: None,
        };
        let json = serde_json::to_string(&chunk).unwrap();
        assert!(!json.contains("embedding"));
        let back: Chunk = serde_json::from_str(&json).unwrap();
        assert!(back.embedding.is_none());
    }
}
