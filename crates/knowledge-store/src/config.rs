use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use knowledge_store_core::chunk::{DEFAULT_OVERLAP_WORDS, DEFAULT_WINDOW_WORDS};

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub storage: StorageConfig,
    #[serde(default)]
    pub chunking: ChunkingConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct StorageConfig {
    /// Directory holding one catalog file per tenant.
    pub dir: PathBuf,
    #[serde(default = "default_tenant")]
    pub tenant: String,
}

fn default_tenant() -> String {
    "default".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct ChunkingConfig {
    #[serde(default = "default_window_words")]
    pub window_words: usize,
    #[serde(default = "default_overlap_words")]
    pub overlap_words: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            window_words: DEFAULT_WINDOW_WORDS,
            overlap_words: DEFAULT_OVERLAP_WORDS,
        }
    }
}

fn default_window_words() -> usize {
    DEFAULT_WINDOW_WORDS
}
fn default_overlap_words() -> usize {
    DEFAULT_OVERLAP_WORDS
}

#[derive(Debug, Deserialize, Clone)]
pub struct RetrievalConfig {
    /// Default result count for `query`.
    #[serde(default = "default_top_k")]
    pub top_k: usize,
    /// knn candidate pool is `top_k × candidate_multiplier` before the
    /// doc-type filter is applied.
    #[serde(default = "default_candidate_multiplier")]
    pub candidate_multiplier: usize,
    /// Default chunk count for `get_context_for_generation`.
    #[serde(default = "default_context_chunks")]
    pub context_chunks: usize,
    /// A claim is supported when its best score exceeds this threshold.
    #[serde(default = "default_support_threshold")]
    pub support_threshold: f32,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: default_top_k(),
            candidate_multiplier: default_candidate_multiplier(),
            context_chunks: default_context_chunks(),
            support_threshold: default_support_threshold(),
        }
    }
}

fn default_top_k() -> usize {
    5
}
fn default_candidate_multiplier() -> usize {
    2
}
fn default_context_chunks() -> usize {
    5
}
fn default_support_threshold() -> f32 {
    0.5
}

#[derive(Debug, Deserialize, Clone)]
pub struct EmbeddingConfig {
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub dims: Option<usize>,
    /// Base URL for the ollama provider (default `http://localhost:11434`).
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: "disabled".to_string(),
            model: None,
            dims: None,
            url: None,
            max_retries: default_max_retries(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_provider() -> String {
    "disabled".to_string()
}
fn default_max_retries() -> u32 {
    5
}
fn default_timeout_secs() -> u64 {
    30
}

impl EmbeddingConfig {
    pub fn is_enabled(&self) -> bool {
        self.provider != "disabled"
    }
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;
    validate(config)
}

/// Validate a parsed config. Split from [`load_config`] so tests can feed
/// TOML strings without touching the filesystem.
pub fn validate(config: Config) -> Result<Config> {
    if config.chunking.window_words == 0 {
        anyhow::bail!("chunking.window_words must be > 0");
    }
    if config.chunking.overlap_words >= config.chunking.window_words {
        anyhow::bail!("chunking.overlap_words must be < chunking.window_words");
    }

    if config.retrieval.top_k < 1 {
        anyhow::bail!("retrieval.top_k must be >= 1");
    }
    if config.retrieval.candidate_multiplier < 1 {
        anyhow::bail!("retrieval.candidate_multiplier must be >= 1");
    }
    if !(0.0..=1.0).contains(&config.retrieval.support_threshold) {
        anyhow::bail!("retrieval.support_threshold must be in [0.0, 1.0]");
    }

    if config.embedding.is_enabled() {
        if config.embedding.dims.is_none() || config.embedding.dims == Some(0) {
            anyhow::bail!(
                "embedding.dims must be > 0 when provider is '{}'",
                config.embedding.provider
            );
        }
        if config.embedding.model.is_none() {
            anyhow::bail!(
                "embedding.model must be specified when provider is '{}'",
                config.embedding.provider
            );
        }
    }

    match config.embedding.provider.as_str() {
        "disabled" | "openai" | "ollama" => {}
        other => anyhow::bail!(
            "Unknown embedding provider: '{}'. Must be disabled, openai, or ollama.",
            other
        ),
    }

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(toml_str: &str) -> Result<Config> {
        validate(toml::from_str(toml_str)?)
    }

    #[test]
    fn test_minimal_config_gets_defaults() {
        let config = parse("[storage]\ndir = \"/tmp/ks\"\n").unwrap();
        assert_eq!(config.storage.tenant, "default");
        assert_eq!(config.chunking.window_words, 500);
        assert_eq!(config.chunking.overlap_words, 50);
        assert_eq!(config.retrieval.top_k, 5);
        assert!((config.retrieval.support_threshold - 0.5).abs() < 1e-6);
        assert!(!config.embedding.is_enabled());
    }

    #[test]
    fn test_overlap_must_be_smaller_than_window() {
        let err = parse(
            "[storage]\ndir = \"/tmp/ks\"\n[chunking]\nwindow_words = 50\noverlap_words = 50\n",
        )
        .unwrap_err();
        assert!(err.to_string().contains("overlap_words"));
    }

    #[test]
    fn test_enabled_provider_requires_model_and_dims() {
        let err =
            parse("[storage]\ndir = \"/tmp/ks\"\n[embedding]\nprovider = \"openai\"\n").unwrap_err();
        assert!(err.to_string().contains("dims"));
    }

    #[test]
    fn test_unknown_provider_rejected() {
        let err = parse(
            "[storage]\ndir = \"/tmp/ks\"\n[embedding]\nprovider = \"cohere\"\nmodel = \"m\"\ndims = 8\n",
        )
        .unwrap_err();
        assert!(err.to_string().contains("Unknown embedding provider"));
    }

    #[test]
    fn test_threshold_range_enforced() {
        let err = parse(
            "[storage]\ndir = \"/tmp/ks\"\n[retrieval]\nsupport_threshold = 1.5\n",
        )
        .unwrap_err();
        assert!(err.to_string().contains("support_threshold"));
    }
}
