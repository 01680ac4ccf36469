//! `rvh build`: embed every mined comment and write the flat index.
//!
//! Produces two artifacts that must stay positionally aligned:
//! `comments.index` (vector `i`) and `comments_lookup.json` (entry `i`).
//! A batch the provider fails on is dropped from both.

use anyhow::{bail, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{info, warn};

use crate::artifacts::{self, DataPaths};
use crate::config::Config;
use crate::embedding::{self, EmbeddingProvider};
use crate::index::FlatIndex;
use crate::models::HunkCommentMapping;
use crate::progress::{ProgressEvent, ProgressReporter};

/// One indexed comment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LookupEntry {
    pub pr_number: u64,
    pub file_path: String,
    /// The text that was embedded.
    pub query: String,
    /// The comment body as written.
    pub comment: String,
}

/// Metadata plus entries, saved as `comments_lookup.json`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommentLookup {
    pub model: String,
    pub dims: usize,
    /// SHA-256 of the mappings file the index was built from.
    pub source_sha256: String,
    pub include_context: bool,
    pub built_at: DateTime<Utc>,
    /// Comments left out because their embedding batch failed.
    #[serde(default)]
    pub failed: usize,
    pub entries: Vec<LookupEntry>,
}

/// Text embedded for a comment: prefixed with its PR and file when
/// `include_context` is set.
pub fn contextual_text(pr_number: u64, file_path: &str, body: &str, include_context: bool) -> String {
    if include_context {
        format!("PR #{}, File: {}\n{}", pr_number, file_path, body)
    } else {
        body.to_string()
    }
}

/// Flatten mappings into lookup entries, one per comment, in mapping order.
pub fn lookup_entries(mappings: &[HunkCommentMapping], include_context: bool) -> Vec<LookupEntry> {
    mappings
        .iter()
        .flat_map(|m| {
            m.comments.iter().map(move |c| LookupEntry {
                pr_number: m.pr_number,
                file_path: m.file_path.clone(),
                query: contextual_text(m.pr_number, &m.file_path, &c.body, include_context),
                comment: c.body.clone(),
            })
        })
        .collect()
}

/// Result of [`build_index`].
pub struct BuiltIndex {
    pub index: FlatIndex,
    pub entries: Vec<LookupEntry>,
    pub failed: usize,
}

/// Embed `entries` in batches and collect the vectors into a [`FlatIndex`].
///
/// Entries of a failed batch are left out of the returned list so the
/// returned entries and index ids match one to one.
pub async fn build_index(
    provider: &dyn EmbeddingProvider,
    entries: Vec<LookupEntry>,
    batch_size: usize,
    progress: &dyn ProgressReporter,
) -> Result<BuiltIndex> {
    let mut index = FlatIndex::new(provider.dims());
    let mut kept = Vec::with_capacity(entries.len());
    let mut failed = 0usize;
    let total = entries.len() as u64;
    let mut done = 0u64;

    for batch in entries.chunks(batch_size.max(1)) {
        let texts: Vec<String> = batch.iter().map(|e| e.query.clone()).collect();
        done += batch.len() as u64;

        match embedding::embed_checked(provider, &texts).await {
            Ok(vectors) => {
                index.add(&vectors)?;
                kept.extend_from_slice(batch);
            }
            Err(e) => {
                warn!("embedding batch failed, skipping {} comments: {}", batch.len(), e);
                failed += batch.len();
            }
        }

        progress.report(ProgressEvent::Working {
            stage: "build".to_string(),
            n: done,
            total,
            item: format!("{} comments embedded", kept.len()),
        });
    }

    Ok(BuiltIndex {
        index,
        entries: kept,
        failed,
    })
}

fn fingerprint(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}

/// True when the existing artifacts were built completely from the same
/// input with the same model and settings.
fn is_up_to_date(
    paths: &DataPaths,
    source_sha256: &str,
    provider: &dyn EmbeddingProvider,
    include_context: bool,
) -> bool {
    if !paths.index().exists() || !paths.lookup().exists() {
        return false;
    }
    match artifacts::read_json::<CommentLookup>(&paths.lookup()) {
        Ok(existing) => {
            existing.failed == 0
                && existing.source_sha256 == source_sha256
                && existing.model == provider.model_name()
                && existing.dims == provider.dims()
                && existing.include_context == include_context
        }
        Err(_) => false,
    }
}

/// `rvh build [--rebuild]`.
pub async fn run_build(config: &Config, rebuild: bool, progress: &dyn ProgressReporter) -> Result<()> {
    if !config.embedding.is_enabled() {
        bail!("Embedding provider is disabled. Set [embedding] provider in config.");
    }

    let paths = DataPaths::from_config(config);
    if !paths.mappings().exists() {
        bail!(
            "Missing {}. Run `rvh map` first.",
            paths.mappings().display()
        );
    }
    let raw = std::fs::read(paths.mappings())?;
    let source_sha256 = fingerprint(&raw);
    let mappings: Vec<HunkCommentMapping> = artifacts::read_json(&paths.mappings())?;

    let provider = embedding::create_provider(&config.embedding)?;
    let include_context = config.retrieval.include_context;

    if !rebuild && is_up_to_date(&paths, &source_sha256, provider.as_ref(), include_context) {
        println!("build");
        println!("  index up to date (use --rebuild to force)");
        return Ok(());
    }

    let entries = lookup_entries(&mappings, include_context);
    info!(
        "embedding {} comments with {} ({} dims)",
        entries.len(),
        provider.model_name(),
        provider.dims()
    );
    progress.report(ProgressEvent::Discovering {
        stage: "build".to_string(),
        found: entries.len() as u64,
    });

    let total = entries.len();
    let built = build_index(
        provider.as_ref(),
        entries,
        config.embedding.batch_size,
        progress,
    )
    .await?;

    built.index.save(&paths.index())?;
    let lookup = CommentLookup {
        model: provider.model_name().to_string(),
        dims: provider.dims(),
        source_sha256,
        include_context,
        built_at: Utc::now(),
        failed: built.failed,
        entries: built.entries,
    };
    artifacts::write_json(&paths.lookup(), &lookup)?;

    println!("build");
    println!("  comments: {}", total);
    println!("  embedded: {}", built.index.len());
    println!("  failed: {}", built.failed);
    println!("  model: {} ({} dims)", lookup.model, lookup.dims);
    println!("  saved: {}", paths.index().display());
    println!("  saved: {}", paths.lookup().display());
    Ok(())
}
