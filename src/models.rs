//! Core data models used throughout the review pipeline.
//!
//! GitHub payload types keep only the fields the pipeline reads; everything
//! here round-trips through the JSON artifacts written between stages.

use serde::{Deserialize, Serialize};

/// Pseudo file path under which a PR's issue comments are grouped.
pub const GENERAL_FILE_PATH: &str = "[general:issue_comments]";

/// A GitHub account as it appears on comments and PRs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub login: String,
}

/// A git ref (`base` or `head`) of a pull request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GitRef {
    pub sha: String,
    #[serde(rename = "ref", default)]
    pub ref_name: String,
}

/// A pull request as listed by the GitHub API and saved by `rvh find`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PullRequestSummary {
    pub number: u64,
    pub title: String,
    #[serde(default)]
    pub diff_url: String,
    pub base: GitRef,
    pub head: GitRef,
}

/// A comment anchored to a file (and diff position) of a PR.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReviewComment {
    #[serde(default)]
    pub body: String,
    #[serde(default)]
    pub path: Option<String>,
    #[serde(default)]
    pub position: Option<u64>,
    #[serde(default)]
    pub line: Option<u64>,
    #[serde(default)]
    pub user: Option<User>,
}

impl ReviewComment {
    /// True when the comment carries both a file path and a diff position.
    pub fn is_anchored(&self) -> bool {
        self.path.as_deref().is_some_and(|p| !p.is_empty()) && self.position.is_some()
    }

    /// True when the author's login looks like an automation account.
    pub fn is_from_bot(&self) -> bool {
        self.user
            .as_ref()
            .is_some_and(|u| u.login.to_lowercase().contains("bot"))
    }
}

/// A general PR conversation comment with no file/line anchor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IssueComment {
    #[serde(default)]
    pub body: String,
    #[serde(default)]
    pub user: Option<User>,
}

/// Everything collected for one PR by `rvh collect`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PullRequestRecord {
    pub pr_number: u64,
    pub title: String,
    #[serde(default)]
    pub diff: String,
    pub base_sha: String,
    pub head_sha: String,
    #[serde(default)]
    pub review_comments: Vec<ReviewComment>,
    #[serde(default)]
    pub issue_comments: Vec<IssueComment>,
}

/// Classification of a mapped comment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CommentKind {
    #[default]
    Review,
    Issue,
}

/// A comment as stored inside a [`HunkCommentMapping`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MappedComment {
    #[serde(default)]
    pub body: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position: Option<u64>,
    #[serde(default)]
    pub user: Option<User>,
    #[serde(rename = "type", default)]
    pub kind: CommentKind,
}

/// The comments made on one file of one PR.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HunkCommentMapping {
    pub pr_number: u64,
    pub file_path: String,
    pub comments: Vec<MappedComment>,
}

impl HunkCommentMapping {
    pub fn is_general(&self) -> bool {
        self.file_path == GENERAL_FILE_PATH
    }
}

/// A contiguous block of changes from a unified diff.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiffHunk {
    /// Destination path of the file the hunk belongs to.
    pub file: String,
    /// First line of the hunk in the new file, 0 when the header is malformed.
    pub line_start: u32,
    /// Raw hunk text, starting with its `@@` header.
    pub hunk: String,
}
