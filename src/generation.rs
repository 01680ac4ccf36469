//! Text generation backends for review suggestions.
//!
//! [`Generator`] hides the LLM behind one call: prompt in, trimmed text
//! out. Each request is made once; a failure is returned to the caller,
//! which decides whether the batch continues.
//!
//! | `generation.provider` | Backend | Secret |
//! |-----------------------|---------|--------|
//! | `gemini` | Gemini `generateContent` | `GEMINI_API_KEY` |
//! | `openai` | OpenAI chat completions | `OPENAI_API_KEY` |
//! | `ollama` | Ollama `/api/generate` (`stream=false`) | none |
//! | `disabled` | always fails | none |

use anyhow::{anyhow, bail, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

use crate::config::GenerationConfig;

pub const DEFAULT_GEMINI_MODEL: &str = "gemini-2.0-flash";
pub const DEFAULT_OPENAI_MODEL: &str = "gpt-4o-mini";

const GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com";
const OPENAI_BASE_URL: &str = "https://api.openai.com";
const OLLAMA_BASE_URL: &str = "http://localhost:11434";

#[async_trait]
pub trait Generator: Send + Sync {
    fn model_name(&self) -> &str;
    /// Generate a completion for `prompt`, with surrounding whitespace removed.
    async fn generate(&self, prompt: &str) -> Result<String>;
}

pub struct DisabledGenerator;

#[async_trait]
impl Generator for DisabledGenerator {
    fn model_name(&self) -> &str {
        "disabled"
    }
    async fn generate(&self, _prompt: &str) -> Result<String> {
        bail!("Generation provider is disabled. Set [generation] provider in config.")
    }
}

fn http_client(config: &GenerationConfig) -> Result<reqwest::Client> {
    Ok(reqwest::Client::builder()
        .timeout(Duration::from_secs(config.timeout_secs))
        .build()?)
}

fn base_url(config: &GenerationConfig, default: &str) -> String {
    config
        .url
        .as_deref()
        .unwrap_or(default)
        .trim_end_matches('/')
        .to_string()
}

fn api_key(var: &str) -> Result<String> {
    match std::env::var(var) {
        Ok(key) if !key.trim().is_empty() => Ok(key),
        _ => bail!("{} not found in environment variables.", var),
    }
}

/// Send a prepared request and decode a JSON body, turning non-2xx into errors.
async fn send_json<T: serde::de::DeserializeOwned>(
    request: reqwest::RequestBuilder,
    label: &str,
) -> Result<T> {
    let response = request
        .send()
        .await
        .map_err(|e| anyhow!("{} request failed: {}", label, e))?;
    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        let snippet: String = body.chars().take(300).collect();
        bail!("{} API error {}: {}", label, status, snippet);
    }
    response
        .json::<T>()
        .await
        .map_err(|e| anyhow!("{} returned an undecodable body: {}", label, e))
}

// ============ Gemini ============

#[derive(Serialize)]
struct GeminiRequest<'a> {
    contents: Vec<GeminiContent<'a>>,
}

#[derive(Serialize)]
struct GeminiContent<'a> {
    parts: Vec<GeminiPart<'a>>,
}

#[derive(Serialize)]
struct GeminiPart<'a> {
    text: &'a str,
}

#[derive(Deserialize)]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<GeminiCandidate>,
}

#[derive(Deserialize)]
struct GeminiCandidate {
    content: Option<GeminiResponseContent>,
}

#[derive(Deserialize)]
struct GeminiResponseContent {
    #[serde(default)]
    parts: Vec<GeminiResponsePart>,
}

#[derive(Deserialize)]
struct GeminiResponsePart {
    #[serde(default)]
    text: String,
}

pub struct GeminiGenerator {
    client: reqwest::Client,
    model: String,
    url: String,
    api_key: String,
}

impl GeminiGenerator {
    pub fn new(config: &GenerationConfig) -> Result<Self> {
        let model = config
            .model
            .clone()
            .unwrap_or_else(|| DEFAULT_GEMINI_MODEL.to_string());
        let url = format!(
            "{}/v1beta/models/{}:generateContent",
            base_url(config, GEMINI_BASE_URL),
            model
        );
        Ok(Self {
            client: http_client(config)?,
            model,
            url,
            api_key: api_key("GEMINI_API_KEY")?,
        })
    }
}

#[async_trait]
impl Generator for GeminiGenerator {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn generate(&self, prompt: &str) -> Result<String> {
        let body = GeminiRequest {
            contents: vec![GeminiContent {
                parts: vec![GeminiPart { text: prompt }],
            }],
        };
        debug!("POST {} ({} prompt chars)", self.url, prompt.len());
        let resp: GeminiResponse = send_json(
            self.client
                .post(&self.url)
                .header("x-goog-api-key", &self.api_key)
                .json(&body),
            "Gemini",
        )
        .await?;

        let text: String = resp
            .candidates
            .into_iter()
            .next()
            .and_then(|c| c.content)
            .map(|c| c.parts.into_iter().map(|p| p.text).collect())
            .ok_or_else(|| anyhow!("Gemini response has no candidates"))?;
        Ok(text.trim().to_string())
    }
}

// ============ OpenAI ============

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Deserialize)]
struct ChatChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

pub struct OpenAIGenerator {
    client: reqwest::Client,
    model: String,
    url: String,
    api_key: String,
}

impl OpenAIGenerator {
    pub fn new(config: &GenerationConfig) -> Result<Self> {
        Ok(Self {
            client: http_client(config)?,
            model: config
                .model
                .clone()
                .unwrap_or_else(|| DEFAULT_OPENAI_MODEL.to_string()),
            url: format!("{}/v1/chat/completions", base_url(config, OPENAI_BASE_URL)),
            api_key: api_key("OPENAI_API_KEY")?,
        })
    }
}

#[async_trait]
impl Generator for OpenAIGenerator {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn generate(&self, prompt: &str) -> Result<String> {
        let body = ChatRequest {
            model: &self.model,
            messages: vec![ChatMessage {
                role: "user",
                content: prompt,
            }],
        };
        let resp: ChatResponse = send_json(
            self.client
                .post(&self.url)
                .bearer_auth(&self.api_key)
                .json(&body),
            "OpenAI",
        )
        .await?;

        let text = resp
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| anyhow!("OpenAI response has no choices"))?;
        Ok(text.trim().to_string())
    }
}

// ============ Ollama ============

#[derive(Serialize)]
struct OllamaGenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
}

#[derive(Deserialize)]
struct OllamaGenerateResponse {
    #[serde(default)]
    response: String,
}

pub struct OllamaGenerator {
    client: reqwest::Client,
    model: String,
    url: String,
}

impl OllamaGenerator {
    pub fn new(config: &GenerationConfig) -> Result<Self> {
        let model = config
            .model
            .clone()
            .ok_or_else(|| anyhow!("generation.model required for Ollama provider"))?;
        Ok(Self {
            client: http_client(config)?,
            model,
            url: format!("{}/api/generate", base_url(config, OLLAMA_BASE_URL)),
        })
    }
}

#[async_trait]
impl Generator for OllamaGenerator {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn generate(&self, prompt: &str) -> Result<String> {
        let body = OllamaGenerateRequest {
            model: &self.model,
            prompt,
            stream: false,
        };
        let resp: OllamaGenerateResponse =
            send_json(self.client.post(&self.url).json(&body), "Ollama").await?;
        Ok(resp.response.trim().to_string())
    }
}

/// Create the [`Generator`] named by `config.provider`.
///
/// API keys are checked here, so a missing secret fails before any work.
pub fn create_generator(config: &GenerationConfig) -> Result<Box<dyn Generator>> {
    match config.provider.as_str() {
        "disabled" => Ok(Box::new(DisabledGenerator)),
        "gemini" => Ok(Box::new(GeminiGenerator::new(config)?)),
        "openai" => Ok(Box::new(OpenAIGenerator::new(config)?)),
        "ollama" => Ok(Box::new(OllamaGenerator::new(config)?)),
        other => bail!("Unknown generation provider: {}", other),
    }
}
