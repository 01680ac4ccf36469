//! Retrieval-augmented review suggestions for a pull request.
//!
//! For every hunk of a PR's diff: retrieve the nearest past comments, build
//! a prompt around them, ask the [`Generator`] for a comment, and screen the
//! answer with [`check_quality`]. Hunks are processed one after another; a
//! failure on one hunk is recorded and the next hunk proceeds.

use anyhow::{bail, Context, Result};
use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use tracing::{info, warn};

use crate::artifacts::{self, DataPaths};
use crate::config::Config;
use crate::diff::parse_unified_diff;
use crate::embedding::{self, EmbeddingProvider};
use crate::generation::{self, Generator};
use crate::github::GitHubClient;
use crate::models::DiffHunk;
use crate::progress::{ProgressEvent, ProgressReporter};
use crate::search::{RetrievedComment, Retriever};

static GENERIC_PRAISE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\bLGTM\b|\blooks good\b|\bthank").expect("generic praise pattern is valid")
});

/// Assemble the generation prompt for one hunk.
pub fn build_prompt(diff: &str, examples: &[RetrievedComment]) -> String {
    let mut prompt = format!("You are reviewing this diff:\n{}\n\n", diff);
    for (i, ex) in examples.iter().enumerate() {
        prompt.push_str(&format!(
            "Similar past example {} from `{}`:\n- {}\n\n",
            i + 1,
            ex.file_path,
            ex.query.trim()
        ));
    }
    prompt.push_str("Write a useful code review comment.");
    prompt
}

/// Why a generated comment was not accepted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RejectReason {
    Empty,
    /// Generic praise such as "LGTM" or "thanks".
    Generic,
    TooShort { words: usize },
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RejectReason::Empty => write!(f, "empty"),
            RejectReason::Generic => write!(f, "generic praise"),
            RejectReason::TooShort { words } => write!(f, "too short ({} words)", words),
        }
    }
}

/// Screen a generated comment.
pub fn check_quality(text: &str, min_words: usize) -> Result<(), RejectReason> {
    if text.trim().is_empty() {
        return Err(RejectReason::Empty);
    }
    if GENERIC_PRAISE.is_match(text) {
        return Err(RejectReason::Generic);
    }
    let words = text.split_whitespace().count();
    if words < min_words {
        return Err(RejectReason::TooShort { words });
    }
    Ok(())
}

/// What happened to one hunk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SuggestionOutcome {
    Accepted { comment: String },
    Rejected { comment: String, reason: RejectReason },
    Failed { error: String },
}

#[derive(Debug, Clone, Serialize)]
pub struct HunkSuggestion {
    pub file: String,
    pub line_start: u32,
    pub examples: Vec<RetrievedComment>,
    pub outcome: SuggestionOutcome,
}

/// Saved as `suggestions/pr-<n>.json`.
#[derive(Debug, Clone, Serialize)]
pub struct SuggestionReport {
    pub pr_number: u64,
    pub generated_at: DateTime<Utc>,
    pub embedding_model: String,
    pub generation_model: String,
    pub quality_filter: bool,
    pub hunks: Vec<HunkSuggestion>,
}

impl SuggestionReport {
    pub fn count(&self, pred: fn(&SuggestionOutcome) -> bool) -> usize {
        self.hunks.iter().filter(|h| pred(&h.outcome)).count()
    }
}

/// Settings for one suggestion run.
pub struct SuggestOptions {
    pub k: usize,
    /// `None` disables the quality filter.
    pub min_words: Option<usize>,
}

async fn suggest_one(
    hunk: &DiffHunk,
    retriever: &Retriever,
    provider: &dyn EmbeddingProvider,
    generator: &dyn Generator,
    options: &SuggestOptions,
) -> (Vec<RetrievedComment>, SuggestionOutcome) {
    let examples = match retriever.retrieve_text(provider, &hunk.hunk, options.k).await {
        Ok(e) => e,
        Err(e) => {
            return (
                Vec::new(),
                SuggestionOutcome::Failed {
                    error: format!("retrieval failed: {:#}", e),
                },
            )
        }
    };

    let prompt = build_prompt(&hunk.hunk, &examples);
    let outcome = match generator.generate(&prompt).await {
        Ok(comment) => match options.min_words.map(|m| check_quality(&comment, m)) {
            Some(Err(reason)) => SuggestionOutcome::Rejected { comment, reason },
            _ => SuggestionOutcome::Accepted { comment },
        },
        Err(e) => SuggestionOutcome::Failed {
            error: format!("{:#}", e),
        },
    };
    (examples, outcome)
}

/// Produce a suggestion (or a recorded failure) for every hunk, in order.
pub async fn suggest_for_hunks(
    hunks: &[DiffHunk],
    retriever: &Retriever,
    provider: &dyn EmbeddingProvider,
    generator: &dyn Generator,
    options: &SuggestOptions,
    progress: &dyn ProgressReporter,
) -> Vec<HunkSuggestion> {
    let total = hunks.len() as u64;
    let mut out = Vec::with_capacity(hunks.len());

    for (i, hunk) in hunks.iter().enumerate() {
        progress.report(ProgressEvent::Working {
            stage: "suggest".to_string(),
            n: i as u64 + 1,
            total,
            item: format!("{}:{}", hunk.file, hunk.line_start),
        });

        let (examples, outcome) = suggest_one(hunk, retriever, provider, generator, options).await;
        match &outcome {
            SuggestionOutcome::Failed { error } => {
                warn!("{}:{}: generation failed: {}", hunk.file, hunk.line_start, error)
            }
            SuggestionOutcome::Rejected { reason, .. } => {
                info!("{}:{}: suggestion rejected ({})", hunk.file, hunk.line_start, reason)
            }
            SuggestionOutcome::Accepted { .. } => {}
        }

        out.push(HunkSuggestion {
            file: hunk.file.clone(),
            line_start: hunk.line_start,
            examples,
            outcome,
        });
    }

    out
}

/// Diff text from a local file, or from GitHub when no file is given.
async fn load_diff(config: &Config, pr_number: u64, diff_file: Option<&Path>) -> Result<String> {
    if let Some(path) = diff_file {
        return std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read diff file {}", path.display()));
    }
    let client = GitHubClient::from_env(&config.github)?;
    let diff = client.fetch_diff(pr_number).await;
    if diff.trim().is_empty() {
        bail!("No diff available for PR #{}", pr_number);
    }
    Ok(diff)
}

/// `rvh hunks <pr>`: print the hunks of a PR's diff.
pub async fn run_hunks(config: &Config, pr_number: u64, diff_file: Option<&Path>) -> Result<()> {
    let diff = load_diff(config, pr_number, diff_file).await?;
    let hunks = parse_unified_diff(&diff);

    println!("hunks for PR #{}", pr_number);
    println!("  count: {}", hunks.len());
    for h in &hunks {
        let lines = h.hunk.lines().count();
        println!("  - {}:{} ({} lines)", h.file, h.line_start, lines);
    }
    Ok(())
}

/// `rvh suggest <pr>`.
pub async fn run_suggest(
    config: &Config,
    pr_number: u64,
    diff_file: Option<&Path>,
    k: Option<usize>,
    no_filter: bool,
    output: Option<PathBuf>,
    progress: &dyn ProgressReporter,
) -> Result<()> {
    if !config.embedding.is_enabled() {
        bail!("Suggestions require embeddings. Set [embedding] provider in config.");
    }
    if k == Some(0) {
        bail!("k must be at least 1");
    }
    let generator = generation::create_generator(&config.generation)?;
    let provider = embedding::create_provider(&config.embedding)?;

    let paths = DataPaths::from_config(config);
    let retriever = Retriever::load(&paths, config)?;

    let diff = load_diff(config, pr_number, diff_file).await?;
    let hunks = parse_unified_diff(&diff);
    progress.report(ProgressEvent::Discovering {
        stage: "suggest".to_string(),
        found: hunks.len() as u64,
    });

    let quality_filter = config.suggest.quality_filter && !no_filter;
    let options = SuggestOptions {
        k: k.unwrap_or(config.retrieval.top_k),
        min_words: quality_filter.then_some(config.suggest.min_words),
    };

    let results = suggest_for_hunks(
        &hunks,
        &retriever,
        provider.as_ref(),
        generator.as_ref(),
        &options,
        progress,
    )
    .await;

    let report = SuggestionReport {
        pr_number,
        generated_at: Utc::now(),
        embedding_model: provider.model_name().to_string(),
        generation_model: generator.model_name().to_string(),
        quality_filter,
        hunks: results,
    };

    for h in &report.hunks {
        println!("{}:{}", h.file, h.line_start);
        match &h.outcome {
            SuggestionOutcome::Accepted { comment } => println!("  suggestion: {}", comment),
            SuggestionOutcome::Rejected { comment, reason } => {
                println!("  rejected ({}): {}", reason, comment)
            }
            SuggestionOutcome::Failed { error } => println!("  failed: {}", error),
        }
        println!();
    }

    let target = output.unwrap_or_else(|| paths.suggestions(pr_number));
    artifacts::write_json(&target, &report)?;

    println!("suggest");
    println!("  hunks: {}", report.hunks.len());
    println!(
        "  accepted: {}",
        report.count(|o| matches!(o, SuggestionOutcome::Accepted { .. }))
    );
    println!(
        "  rejected: {}",
        report.count(|o| matches!(o, SuggestionOutcome::Rejected { .. }))
    );
    println!(
        "  failed: {}",
        report.count(|o| matches!(o, SuggestionOutcome::Failed { .. }))
    );
    println!("  saved: {}", target.display());
    Ok(())
}
