//! Text embedding backends.
//!
//! Comments and diff hunks become vectors through an [`EmbeddingProvider`].
//! The backend is picked by `[embedding] provider`:
//!
//! | Provider | Type | Notes |
//! |----------|------|-------|
//! | `disabled` | [`DisabledProvider`] | every call errors |
//! | `openai` | [`OpenAIProvider`] | `/v1/embeddings`, needs `OPENAI_API_KEY` |
//! | `ollama` | [`OllamaProvider`] | `/api/embed` on a local server |
//! | `local` | `LocalProvider` | in-process fastembed, feature `local-embeddings-fastembed` |
//!
//! [`vec_to_blob`] / [`blob_to_vec`] define the little-endian f32 layout that
//! [`crate::index`] writes to disk.
//!
//! ```rust,no_run
//! # use review_harness::config::EmbeddingConfig;
//! # use review_harness::embedding::create_provider;
//! let config = EmbeddingConfig {
//!     provider: "disabled".into(),
//!     ..EmbeddingConfig::default()
//! };
//! let provider = create_provider(&config)?;
//! assert_eq!(provider.dims(), 0);
//! # Ok::<(), anyhow::Error>(())
//! ```
//!
//! Remote providers retry a request up to `max_retries` times when the server
//! answers 429 or 5xx or the connection fails. Other 4xx answers fail at once.
//! The wait doubles per attempt from 1s and stops growing at 32s.

use anyhow::{anyhow, bail, Result};
use async_trait::async_trait;
use std::time::Duration;

use crate::config::EmbeddingConfig;

/// Model used by the local provider when none is configured.
pub const DEFAULT_LOCAL_MODEL: &str = "all-minilm-l6-v2";

/// Local models and their output width.
const LOCAL_MODELS: &[(&str, usize)] = &[
    ("all-minilm-l6-v2", 384),
    ("bge-small-en-v1.5", 384),
    ("bge-base-en-v1.5", 768),
    ("bge-large-en-v1.5", 1024),
    ("nomic-embed-text-v1", 768),
    ("nomic-embed-text-v1.5", 768),
];

/// A backend that turns texts into fixed-length vectors.
///
/// Implementations must return exactly one vector per input text, in input
/// order, each of length [`dims`](Self::dims).
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Model identifier (e.g. `"all-minilm-l6-v2"`).
    fn model_name(&self) -> &str;
    /// Vector dimensionality (e.g. `384`).
    fn dims(&self) -> usize;
    /// Embed a batch of texts.
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;
}

/// Embed a single text.
pub async fn embed_query(provider: &dyn EmbeddingProvider, text: &str) -> Result<Vec<f32>> {
    let results = provider.embed(&[text.to_string()]).await?;
    results
        .into_iter()
        .next()
        .ok_or_else(|| anyhow!("Empty embedding response"))
}

/// Check a provider's output against the batch it was given.
fn check_batch(
    provider: &dyn EmbeddingProvider,
    texts: &[String],
    vectors: &[Vec<f32>],
) -> Result<()> {
    if vectors.len() != texts.len() {
        bail!(
            "{} returned {} embeddings for {} texts",
            provider.model_name(),
            vectors.len(),
            texts.len()
        );
    }
    if let Some(bad) = vectors.iter().find(|v| v.len() != provider.dims()) {
        bail!(
            "{} returned a {}-dim vector, expected {}",
            provider.model_name(),
            bad.len(),
            provider.dims()
        );
    }
    Ok(())
}

/// Embed a batch and verify count and dimensionality.
pub async fn embed_checked(
    provider: &dyn EmbeddingProvider,
    texts: &[String],
) -> Result<Vec<Vec<f32>>> {
    let vectors = provider.embed(texts).await?;
    check_batch(provider, texts, &vectors)?;
    Ok(vectors)
}

/// Stands in when `[embedding] provider = "disabled"`; every call errors.
pub struct DisabledProvider;

#[async_trait]
impl EmbeddingProvider for DisabledProvider {
    fn model_name(&self) -> &str {
        "disabled"
    }
    fn dims(&self) -> usize {
        0
    }
    async fn embed(&self, _texts: &[String]) -> Result<Vec<Vec<f32>>> {
        bail!("Embedding provider is disabled. Set [embedding] provider in the config.")
    }
}

/// POST `body` to `url`, retrying transient failures with exponential backoff.
async fn post_with_retry(
    client: &reqwest::Client,
    url: &str,
    bearer: Option<&str>,
    body: &serde_json::Value,
    max_retries: u32,
    label: &str,
) -> Result<serde_json::Value> {
    let mut last_err = None;

    for attempt in 0..=max_retries {
        if attempt > 0 {
            let delay = Duration::from_secs(1 << (attempt - 1).min(5));
            tracing::debug!("{} retry {} in {:?}", label, attempt, delay);
            tokio::time::sleep(delay).await;
        }

        let mut req = client.post(url).json(body);
        if let Some(token) = bearer {
            req = req.header("Authorization", format!("Bearer {}", token));
        }

        match req.send().await {
            Ok(response) => {
                let status = response.status();

                if status.is_success() {
                    return Ok(response.json().await?);
                }

                let body_text = response.text().await.unwrap_or_default();
                if status.as_u16() == 429 || status.is_server_error() {
                    last_err = Some(anyhow!("{} API error {}: {}", label, status, body_text));
                    continue;
                }

                bail!("{} API error {}: {}", label, status, body_text);
            }
            Err(e) => {
                last_err = Some(anyhow!("{} request to {} failed: {}", label, url, e));
                continue;
            }
        }
    }

    Err(last_err.unwrap_or_else(|| anyhow!("{} embedding failed after retries", label)))
}

fn json_vector(value: &serde_json::Value) -> Option<Vec<f32>> {
    value
        .as_array()
        .map(|arr| arr.iter().map(|v| v.as_f64().unwrap_or(0.0) as f32).collect())
}

fn http_client(config: &EmbeddingConfig) -> Result<reqwest::Client> {
    Ok(reqwest::Client::builder()
        .timeout(Duration::from_secs(config.timeout_secs))
        .build()?)
}

const OPENAI_EMBEDDINGS_URL: &str = "https://api.openai.com/v1/embeddings";

/// Embedding provider using the OpenAI API.
///
/// Requires `OPENAI_API_KEY` in the environment.
pub struct OpenAIProvider {
    model: String,
    dims: usize,
    api_key: String,
    max_retries: u32,
    client: reqwest::Client,
}

impl OpenAIProvider {
    pub fn new(config: &EmbeddingConfig) -> Result<Self> {
        let model = config
            .model
            .clone()
            .ok_or_else(|| anyhow!("embedding.model required for OpenAI provider"))?;
        let dims = config
            .dims
            .ok_or_else(|| anyhow!("embedding.dims required for OpenAI provider"))?;
        let api_key = std::env::var("OPENAI_API_KEY")
            .map_err(|_| anyhow!("OPENAI_API_KEY environment variable not set"))?;

        Ok(Self {
            model,
            dims,
            api_key,
            max_retries: config.max_retries,
            client: http_client(config)?,
        })
    }
}

#[async_trait]
impl EmbeddingProvider for OpenAIProvider {
    fn model_name(&self) -> &str {
        &self.model
    }
    fn dims(&self) -> usize {
        self.dims
    }
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let body = serde_json::json!({
            "model": self.model,
            "input": texts,
        });
        let json = post_with_retry(
            &self.client,
            OPENAI_EMBEDDINGS_URL,
            Some(&self.api_key),
            &body,
            self.max_retries,
            "OpenAI",
        )
        .await?;
        parse_openai_response(&json)
    }
}

/// Extract `data[].embedding`, ordered by `data[].index`.
fn parse_openai_response(json: &serde_json::Value) -> Result<Vec<Vec<f32>>> {
    let data = json
        .get("data")
        .and_then(|d| d.as_array())
        .ok_or_else(|| anyhow!("Invalid OpenAI response: missing data array"))?;

    let mut indexed = Vec::with_capacity(data.len());
    for (pos, item) in data.iter().enumerate() {
        let vec = item
            .get("embedding")
            .and_then(json_vector)
            .ok_or_else(|| anyhow!("Invalid OpenAI response: missing embedding"))?;
        let index = item
            .get("index")
            .and_then(|i| i.as_u64())
            .map(|i| i as usize)
            .unwrap_or(pos);
        indexed.push((index, vec));
    }
    indexed.sort_by_key(|(i, _)| *i);

    Ok(indexed.into_iter().map(|(_, v)| v).collect())
}

const DEFAULT_OLLAMA_URL: &str = "http://localhost:11434";

/// Embedding provider using an Ollama instance (`POST {url}/api/embed`).
pub struct OllamaProvider {
    model: String,
    dims: usize,
    url: String,
    max_retries: u32,
    client: reqwest::Client,
}

impl OllamaProvider {
    pub fn new(config: &EmbeddingConfig) -> Result<Self> {
        let model = config
            .model
            .clone()
            .ok_or_else(|| anyhow!("embedding.model required for Ollama provider"))?;
        let dims = config
            .dims
            .ok_or_else(|| anyhow!("embedding.dims required for Ollama provider"))?;
        let url = config
            .url
            .as_deref()
            .unwrap_or(DEFAULT_OLLAMA_URL)
            .trim_end_matches('/')
            .to_string();

        Ok(Self {
            model,
            dims,
            url,
            max_retries: config.max_retries,
            client: http_client(config)?,
        })
    }
}

#[async_trait]
impl EmbeddingProvider for OllamaProvider {
    fn model_name(&self) -> &str {
        &self.model
    }
    fn dims(&self) -> usize {
        self.dims
    }
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let body = serde_json::json!({
            "model": self.model,
            "input": texts,
        });
        let json = post_with_retry(
            &self.client,
            &format!("{}/api/embed", self.url),
            None,
            &body,
            self.max_retries,
            "Ollama",
        )
        .await?;
        parse_ollama_response(&json)
    }
}

fn parse_ollama_response(json: &serde_json::Value) -> Result<Vec<Vec<f32>>> {
    let embeddings = json
        .get("embeddings")
        .and_then(|e| e.as_array())
        .ok_or_else(|| anyhow!("Invalid Ollama response: missing embeddings array"))?;

    embeddings
        .iter()
        .map(|e| json_vector(e).ok_or_else(|| anyhow!("Invalid Ollama response: embedding is not an array")))
        .collect()
}

/// In-process embedding via fastembed.
///
/// The model is downloaded from Hugging Face on first use and cached; it is
/// loaded once per provider and reused across batches.
#[cfg(feature = "local-embeddings-fastembed")]
pub struct LocalProvider {
    model_name: String,
    dims: usize,
    batch_size: usize,
    model: std::sync::Arc<std::sync::Mutex<Option<fastembed::TextEmbedding>>>,
}

#[cfg(feature = "local-embeddings-fastembed")]
impl LocalProvider {
    pub fn new(config: &EmbeddingConfig) -> Result<Self> {
        let (model_name, dims) = resolve_local_model(config);
        // Reject unknown names before any download starts.
        config_to_fastembed_model(&model_name)?;
        Ok(Self {
            model_name,
            dims,
            batch_size: config.batch_size,
            model: std::sync::Arc::new(std::sync::Mutex::new(None)),
        })
    }
}

#[cfg(feature = "local-embeddings-fastembed")]
#[async_trait]
impl EmbeddingProvider for LocalProvider {
    fn model_name(&self) -> &str {
        &self.model_name
    }
    fn dims(&self) -> usize {
        self.dims
    }
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let fastembed_model = config_to_fastembed_model(&self.model_name)?;
        let cache = self.model.clone();
        let batch_size = self.batch_size;
        let texts = texts.to_vec();

        tokio::task::spawn_blocking(move || {
            let mut guard = cache
                .lock()
                .map_err(|_| anyhow!("Local embedding model lock poisoned"))?;
            if guard.is_none() {
                let loaded = fastembed::TextEmbedding::try_new(
                    fastembed::InitOptions::new(fastembed_model).with_show_download_progress(true),
                )
                .map_err(|e| anyhow!("Failed to initialize local embedding model: {}", e))?;
                *guard = Some(loaded);
            }
            let model = guard
                .as_mut()
                .ok_or_else(|| anyhow!("Local embedding model not loaded"))?;

            model
                .embed(texts, Some(batch_size))
                .map_err(|e| anyhow!("Local embedding failed: {}", e))
        })
        .await?
    }
}

/// Model name and dimensionality for the local provider.
pub fn resolve_local_model(config: &EmbeddingConfig) -> (String, usize) {
    let model_name = config
        .model
        .clone()
        .unwrap_or_else(|| DEFAULT_LOCAL_MODEL.to_string());

    let dims = config.dims.unwrap_or_else(|| {
        LOCAL_MODELS
            .iter()
            .find(|(name, _)| *name == model_name)
            .map_or(384, |&(_, dims)| dims)
    });

    (model_name, dims)
}

#[cfg(feature = "local-embeddings-fastembed")]
fn config_to_fastembed_model(name: &str) -> Result<fastembed::EmbeddingModel> {
    use fastembed::EmbeddingModel as M;
    let model = match name {
        "all-minilm-l6-v2" => M::AllMiniLML6V2,
        "bge-small-en-v1.5" => M::BGESmallENV15,
        "bge-base-en-v1.5" => M::BGEBaseENV15,
        "bge-large-en-v1.5" => M::BGELargeENV15,
        "nomic-embed-text-v1" => M::NomicEmbedTextV1,
        "nomic-embed-text-v1.5" => M::NomicEmbedTextV15,
        other => {
            let known: Vec<&str> = LOCAL_MODELS.iter().map(|(name, _)| *name).collect();
            bail!(
                "Unknown local embedding model '{}' (known: {})",
                other,
                known.join(", ")
            )
        }
    };
    Ok(model)
}

/// Create the provider named by `config.provider` (see the module table).
pub fn create_provider(config: &EmbeddingConfig) -> Result<Box<dyn EmbeddingProvider>> {
    match config.provider.as_str() {
        "disabled" => Ok(Box::new(DisabledProvider)),
        "openai" => Ok(Box::new(OpenAIProvider::new(config)?)),
        "ollama" => Ok(Box::new(OllamaProvider::new(config)?)),
        #[cfg(feature = "local-embeddings-fastembed")]
        "local" => Ok(Box::new(LocalProvider::new(config)?)),
        #[cfg(not(feature = "local-embeddings-fastembed"))]
        "local" => bail!("Local embedding provider requires --features local-embeddings-fastembed"),
        other => bail!("Unknown embedding provider: {}", other),
    }
}

/// Encode a float vector as little-endian f32 bytes.
///
/// ```rust
/// use review_harness::embedding::{vec_to_blob, blob_to_vec};
///
/// let v = vec![1.0f32, -2.5, 3.125];
/// let blob = vec_to_blob(&v);
/// assert_eq!(blob.len(), 12);
/// assert_eq!(blob_to_vec(&blob), v);
/// ```
pub fn vec_to_blob(vec: &[f32]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(vec.len() * 4);
    for &v in vec {
        bytes.extend_from_slice(&v.to_le_bytes());
    }
    bytes
}

/// Decode little-endian f32 bytes; a trailing partial value is ignored.
pub fn blob_to_vec(blob: &[u8]) -> Vec<f32> {
    blob.chunks_exact(4)
        .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect()
}
