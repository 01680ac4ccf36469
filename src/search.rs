//! Retrieval of past review comments similar to a piece of text.
//!
//! [`Retriever`] pairs the flat index with its lookup and turns index hits
//! into [`RetrievedComment`]s. `rvh search` is a thin wrapper that prints
//! them.

use anyhow::{bail, Result};
use serde::Serialize;
use tracing::warn;

use crate::artifacts::{self, DataPaths};
use crate::build::{CommentLookup, LookupEntry};
use crate::config::Config;
use crate::embedding::{self, EmbeddingProvider};
use crate::index::FlatIndex;

/// A past comment returned by retrieval.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RetrievedComment {
    pub id: usize,
    /// Squared L2 distance; lower is closer.
    pub distance: f32,
    pub pr_number: u64,
    pub file_path: String,
    pub query: String,
    pub comment: String,
}

pub struct Retriever {
    index: FlatIndex,
    lookup: CommentLookup,
}

impl Retriever {
    /// Pair an index with its lookup. Fails when their sizes differ.
    pub fn new(index: FlatIndex, lookup: CommentLookup) -> Result<Self> {
        if index.len() != lookup.entries.len() {
            bail!(
                "Index has {} vectors but lookup has {} entries. Run `rvh build --rebuild`.",
                index.len(),
                lookup.entries.len()
            );
        }
        Ok(Self { index, lookup })
    }

    /// Load `comments.index` and `comments_lookup.json`.
    pub fn load(paths: &DataPaths, config: &Config) -> Result<Self> {
        if !paths.index().exists() || !paths.lookup().exists() {
            bail!(
                "Missing {} or {}. Run `rvh build` first.",
                paths.index().display(),
                paths.lookup().display()
            );
        }
        let index = FlatIndex::load(&paths.index())?;
        let lookup: CommentLookup = artifacts::read_json(&paths.lookup())?;

        let (configured, _) = match config.embedding.provider.as_str() {
            "local" => embedding::resolve_local_model(&config.embedding),
            _ => (
                config.embedding.model.clone().unwrap_or_default(),
                config.embedding.dims.unwrap_or(0),
            ),
        };
        if configured != lookup.model {
            warn!(
                "index was built with '{}' but the configured embedding model is '{}'",
                lookup.model, configured
            );
        }

        Self::new(index, lookup)
    }

    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    /// Model the index was built with.
    pub fn model(&self) -> &str {
        &self.lookup.model
    }

    /// Up to `k` nearest comments, closest first.
    pub fn retrieve(&self, query_vec: &[f32], k: usize) -> Result<Vec<RetrievedComment>> {
        let hits = self.index.search(query_vec, k)?;
        Ok(hits
            .into_iter()
            .filter_map(|hit| {
                let entry: &LookupEntry = self.lookup.entries.get(hit.id)?;
                Some(RetrievedComment {
                    id: hit.id,
                    distance: hit.distance,
                    pr_number: entry.pr_number,
                    file_path: entry.file_path.clone(),
                    query: entry.query.clone(),
                    comment: entry.comment.clone(),
                })
            })
            .collect())
    }

    /// Embed `text` with `provider`, then [`retrieve`](Self::retrieve).
    pub async fn retrieve_text(
        &self,
        provider: &dyn EmbeddingProvider,
        text: &str,
        k: usize,
    ) -> Result<Vec<RetrievedComment>> {
        let query_vec = embedding::embed_query(provider, text).await?;
        self.retrieve(&query_vec, k)
    }
}

/// `rvh search <text> [-k N]`.
pub async fn run_search(config: &Config, text: &str, k: Option<usize>) -> Result<()> {
    if text.trim().is_empty() {
        println!("No results.");
        return Ok(());
    }
    if !config.embedding.is_enabled() {
        bail!("Search requires embeddings. Set [embedding] provider in config.");
    }
    if k == Some(0) {
        bail!("k must be at least 1");
    }

    let paths = DataPaths::from_config(config);
    let retriever = Retriever::load(&paths, config)?;
    let provider = embedding::create_provider(&config.embedding)?;
    let k = k.unwrap_or(config.retrieval.top_k);

    let results = retriever.retrieve_text(provider.as_ref(), text, k).await?;
    if results.is_empty() {
        println!("No results.");
        return Ok(());
    }

    for (i, r) in results.iter().enumerate() {
        println!("{}. [{:.4}] PR #{} / {}", i + 1, r.distance, r.pr_number, r.file_path);
        println!("    comment: \"{}\"", r.comment.replace('\n', " ").trim());
        println!("    id: {}", r.id);
        println!();
    }
    Ok(())
}
