//! JSON artifacts exchanged between pipeline stages.
//!
//! Every stage reads the previous stage's output from the data directory and
//! writes its own next to it:
//!
//! | File | Written by | Read by |
//! |------|------------|---------|
//! | `prs_with_review_comments.json` | `find` | `collect` |
//! | `prs.json` | `collect` | `map` |
//! | `hunks_comments.json` | `map` | `stats`, `build` |
//! | `mapping_stats.json` | `stats` | (none) |
//! | `comments.index` | `build` | `search`, `suggest` |
//! | `comments_lookup.json` | `build` | `search`, `suggest` |
//! | `suggestions/pr-<n>.json` | `suggest` | (none) |

use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::path::{Path, PathBuf};

use crate::config::Config;

/// Resolved artifact locations under the configured data directory.
#[derive(Debug, Clone)]
pub struct DataPaths {
    root: PathBuf,
}

impl DataPaths {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(&config.data.dir)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn reviewed_prs(&self) -> PathBuf {
        self.root.join("prs_with_review_comments.json")
    }

    pub fn pull_requests(&self) -> PathBuf {
        self.root.join("prs.json")
    }

    pub fn mappings(&self) -> PathBuf {
        self.root.join("hunks_comments.json")
    }

    pub fn stats(&self) -> PathBuf {
        self.root.join("mapping_stats.json")
    }

    pub fn index(&self) -> PathBuf {
        self.root.join("comments.index")
    }

    pub fn lookup(&self) -> PathBuf {
        self.root.join("comments_lookup.json")
    }

    pub fn suggestions(&self, pr_number: u64) -> PathBuf {
        self.root
            .join("suggestions")
            .join(format!("pr-{}.json", pr_number))
    }
}

/// Read a JSON artifact, naming the file in the error.
pub fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    serde_json::from_str(&content).with_context(|| format!("Failed to parse {}", path.display()))
}

/// Write a pretty-printed JSON artifact, creating parent directories.
pub fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory {}", parent.display()))?;
    }
    let json = serde_json::to_string_pretty(value)?;
    std::fs::write(path, json).with_context(|| format!("Failed to write {}", path.display()))
}

/// Read an artifact produced by an earlier stage, pointing at that stage
/// when the file is missing.
pub fn read_stage_input<T: DeserializeOwned>(path: &Path, producer: &str) -> Result<T> {
    if !path.exists() {
        anyhow::bail!(
            "Missing {}. Run `rvh {}` first.",
            path.display(),
            producer
        );
    }
    read_json(path)
}
