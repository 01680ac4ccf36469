//! TOML configuration for the review pipeline.
//!
//! Every section carries defaults, so an empty file (or no file at the
//! default location) yields a working configuration pointed at
//! `llvm/llvm-project` with local embeddings and Gemini generation.
//!
//! Secrets are never read from this file. `GITHUB_TOKEN`, `GEMINI_API_KEY`
//! and `OPENAI_API_KEY` come from the environment (a `.env` file in the
//! working directory is loaded by the CLI).
//!
//! ```toml
//! [github]
//! owner = "llvm"
//! repo = "llvm-project"
//! pr_limit = 100
//!
//! [data]
//! dir = "./data"
//!
//! [embedding]
//! provider = "local"
//! model = "all-minilm-l6-v2"
//!
//! [retrieval]
//! top_k = 5
//!
//! [generation]
//! provider = "gemini"
//! model = "gemini-2.0-flash"
//!
//! [suggest]
//! quality_filter = true
//! min_words = 4
//! ```

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Path used when `--config` is not given.
pub const DEFAULT_CONFIG_PATH: &str = "./config/rvh.toml";

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub github: GitHubConfig,
    #[serde(default)]
    pub data: DataConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub generation: GenerationConfig,
    #[serde(default)]
    pub suggest: SuggestConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct GitHubConfig {
    #[serde(default = "default_owner")]
    pub owner: String,
    #[serde(default = "default_repo")]
    pub repo: String,
    #[serde(default = "default_api_url")]
    pub api_url: String,
    /// PR state filter for listing: `open`, `closed` or `all`.
    #[serde(default = "default_state")]
    pub state: String,
    #[serde(default = "default_per_page")]
    pub per_page: u32,
    #[serde(default = "default_pr_limit")]
    pub pr_limit: usize,
    #[serde(default = "default_github_timeout")]
    pub timeout_secs: u64,
}

impl Default for GitHubConfig {
    fn default() -> Self {
        Self {
            owner: default_owner(),
            repo: default_repo(),
            api_url: default_api_url(),
            state: default_state(),
            per_page: default_per_page(),
            pr_limit: default_pr_limit(),
            timeout_secs: default_github_timeout(),
        }
    }
}

fn default_owner() -> String {
    "llvm".to_string()
}
fn default_repo() -> String {
    "llvm-project".to_string()
}
fn default_api_url() -> String {
    "https://api.github.com".to_string()
}
fn default_state() -> String {
    "all".to_string()
}
fn default_per_page() -> u32 {
    30
}
fn default_pr_limit() -> usize {
    100
}
fn default_github_timeout() -> u64 {
    30
}

#[derive(Debug, Deserialize, Clone)]
pub struct DataConfig {
    #[serde(default = "default_data_dir")]
    pub dir: PathBuf,
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            dir: default_data_dir(),
        }
    }
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("./data")
}

#[derive(Debug, Deserialize, Clone)]
pub struct EmbeddingConfig {
    #[serde(default = "default_embedding_provider")]
    pub provider: String,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub dims: Option<usize>,
    /// Base URL for the Ollama provider.
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: default_embedding_provider(),
            model: None,
            dims: None,
            url: None,
            batch_size: default_batch_size(),
            max_retries: default_max_retries(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl EmbeddingConfig {
    pub fn is_enabled(&self) -> bool {
        self.provider != "disabled"
    }
}

fn default_embedding_provider() -> String {
    "local".to_string()
}
fn default_batch_size() -> usize {
    64
}
fn default_max_retries() -> u32 {
    5
}
fn default_timeout_secs() -> u64 {
    30
}

#[derive(Debug, Deserialize, Clone)]
pub struct RetrievalConfig {
    #[serde(default = "default_top_k")]
    pub top_k: usize,
    /// Prepend `PR #n, File: path` to each comment before embedding.
    #[serde(default = "default_true")]
    pub include_context: bool,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: default_top_k(),
            include_context: true,
        }
    }
}

fn default_top_k() -> usize {
    5
}
fn default_true() -> bool {
    true
}

#[derive(Debug, Deserialize, Clone)]
pub struct GenerationConfig {
    #[serde(default = "default_generation_provider")]
    pub provider: String,
    #[serde(default)]
    pub model: Option<String>,
    /// Base URL override (Gemini, OpenAI-compatible, or Ollama endpoint).
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default = "default_generation_timeout")]
    pub timeout_secs: u64,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            provider: default_generation_provider(),
            model: None,
            url: None,
            timeout_secs: default_generation_timeout(),
        }
    }
}

impl GenerationConfig {
    pub fn is_enabled(&self) -> bool {
        self.provider != "disabled"
    }
}

fn default_generation_provider() -> String {
    "gemini".to_string()
}
fn default_generation_timeout() -> u64 {
    60
}

#[derive(Debug, Deserialize, Clone)]
pub struct SuggestConfig {
    #[serde(default = "default_true")]
    pub quality_filter: bool,
    #[serde(default = "default_min_words")]
    pub min_words: usize,
}

impl Default for SuggestConfig {
    fn default() -> Self {
        Self {
            quality_filter: true,
            min_words: default_min_words(),
        }
    }
}

fn default_min_words() -> usize {
    4
}

/// Load and validate the configuration at `path`.
///
/// A missing file at [`DEFAULT_CONFIG_PATH`] is not an error: the built-in
/// defaults are used. Any other missing path is.
pub fn load_config(path: &Path) -> Result<Config> {
    if !path.exists() && path == Path::new(DEFAULT_CONFIG_PATH) {
        tracing::debug!("no config at {}, using defaults", path.display());
        let config = Config::default();
        validate(&config)?;
        return Ok(config);
    }

    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;
    parse_config(&content)
}

/// Parse and validate configuration from TOML text.
pub fn parse_config(content: &str) -> Result<Config> {
    let config: Config = toml::from_str(content).with_context(|| "Failed to parse config file")?;
    validate(&config)?;
    Ok(config)
}

fn validate(config: &Config) -> Result<()> {
    if config.github.owner.trim().is_empty() || config.github.repo.trim().is_empty() {
        bail!("github.owner and github.repo must not be empty");
    }
    match config.github.state.as_str() {
        "open" | "closed" | "all" => {}
        other => bail!("github.state must be open, closed, or all (got '{}')", other),
    }
    if config.github.per_page == 0 || config.github.per_page > 100 {
        bail!("github.per_page must be in [1, 100]");
    }

    if config.retrieval.top_k < 1 {
        bail!("retrieval.top_k must be >= 1");
    }

    if config.embedding.batch_size < 1 {
        bail!("embedding.batch_size must be >= 1");
    }

    if config.embedding.dims == Some(0) {
        bail!("embedding.dims must be > 0");
    }

    match config.embedding.provider.as_str() {
        "disabled" | "local" => {}
        "openai" | "ollama" => {
            if config.embedding.dims.is_none() || config.embedding.dims == Some(0) {
                bail!(
                    "embedding.dims must be > 0 when provider is '{}'",
                    config.embedding.provider
                );
            }
            if config.embedding.model.is_none() {
                bail!(
                    "embedding.model must be specified when provider is '{}'",
                    config.embedding.provider
                );
            }
        }
        other => bail!(
            "Unknown embedding provider: '{}'. Must be disabled, openai, ollama, or local.",
            other
        ),
    }

    match config.generation.provider.as_str() {
        "disabled" | "gemini" | "openai" => {}
        "ollama" => {
            if config.generation.model.is_none() {
                bail!("generation.model must be specified when provider is 'ollama'");
            }
        }
        other => bail!(
            "Unknown generation provider: '{}'. Must be disabled, gemini, openai, or ollama.",
            other
        ),
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_uses_defaults() {
        let cfg = parse_config("").unwrap();
        assert_eq!(cfg.github.owner, "llvm");
        assert_eq!(cfg.github.repo, "llvm-project");
        assert_eq!(cfg.retrieval.top_k, 5);
        assert!(cfg.retrieval.include_context);
        assert_eq!(cfg.embedding.provider, "local");
        assert_eq!(cfg.generation.provider, "gemini");
        assert!(cfg.suggest.quality_filter);
        assert_eq!(cfg.suggest.min_words, 4);
    }

    #[test]
    fn rejects_zero_top_k() {
        let err = parse_config("[retrieval]\ntop_k = 0\n").unwrap_err();
        assert!(err.to_string().contains("top_k"));
    }

    #[test]
    fn remote_embedding_requires_dims_and_model() {
        let err = parse_config("[embedding]\nprovider = \"openai\"\n").unwrap_err();
        assert!(err.to_string().contains("dims"));

        let err = parse_config("[embedding]\nprovider = \"ollama\"\ndims = 8\n").unwrap_err();
        assert!(err.to_string().contains("model"));

        let cfg = parse_config(
            "[embedding]\nprovider = \"ollama\"\nmodel = \"nomic-embed-text\"\ndims = 768\n",
        )
        .unwrap();
        assert_eq!(cfg.embedding.dims, Some(768));
    }

    #[test]
    fn rejects_zero_dims_for_every_provider() {
        for provider in ["local", "disabled", "ollama"] {
            let toml = format!(
                "[embedding]\nprovider = \"{}\"\nmodel = \"m\"\ndims = 0\n",
                provider
            );
            let err = parse_config(&toml).unwrap_err();
            assert!(err.to_string().contains("embedding.dims"), "{}", provider);
        }
        let cfg = parse_config("[embedding]\nprovider = \"local\"\n").unwrap();
        assert_eq!(cfg.embedding.dims, None);
    }

    #[test]
    fn rejects_unknown_providers() {
        assert!(parse_config("[embedding]\nprovider = \"faiss\"\n").is_err());
        assert!(parse_config("[generation]\nprovider = \"bard\"\n").is_err());
    }

    #[test]
    fn rejects_bad_state() {
        assert!(parse_config("[github]\nstate = \"merged\"\n").is_err());
    }

    #[test]
    fn missing_non_default_path_is_an_error() {
        let err = load_config(Path::new("/nonexistent/rvh.toml")).unwrap_err();
        assert!(err.to_string().contains("Failed to read config file"));
    }
}
