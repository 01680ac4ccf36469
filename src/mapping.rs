//! Flattening collected PRs into per-file comment mappings.
//!
//! Each PR yields one [`HunkCommentMapping`] per commented file plus, when it
//! has any conversation comments, one mapping under
//! [`GENERAL_FILE_PATH`]. Files stand in for hunks here: comments are not
//! aligned to individual hunks.

use anyhow::Result;
use std::collections::HashMap;
use tracing::debug;

use crate::artifacts::{self, DataPaths};
use crate::config::Config;
use crate::models::{
    CommentKind, HunkCommentMapping, MappedComment, PullRequestRecord, GENERAL_FILE_PATH,
};

/// Group one PR's comments into mappings.
///
/// Review comments without a path or diff position are dropped. Files appear
/// in the order their first comment does.
pub fn map_pull_request(pr: &PullRequestRecord) -> Vec<HunkCommentMapping> {
    let mut by_file: Vec<HunkCommentMapping> = Vec::new();
    let mut slot: HashMap<&str, usize> = HashMap::new();

    for c in &pr.review_comments {
        let (Some(path), Some(position)) = (c.path.as_deref(), c.position) else {
            continue;
        };
        if path.is_empty() {
            continue;
        }
        debug!("mappable comment on {} at position {}", path, position);

        let idx = *slot.entry(path).or_insert_with(|| {
            by_file.push(HunkCommentMapping {
                pr_number: pr.pr_number,
                file_path: path.to_string(),
                comments: Vec::new(),
            });
            by_file.len() - 1
        });

        by_file[idx].comments.push(MappedComment {
            body: c.body.clone(),
            line: c.line,
            position: Some(position),
            user: c.user.clone(),
            kind: CommentKind::Review,
        });
    }

    if !pr.issue_comments.is_empty() {
        by_file.push(HunkCommentMapping {
            pr_number: pr.pr_number,
            file_path: GENERAL_FILE_PATH.to_string(),
            comments: pr
                .issue_comments
                .iter()
                .map(|c| MappedComment {
                    body: c.body.clone(),
                    line: None,
                    position: None,
                    user: c.user.clone(),
                    kind: CommentKind::Issue,
                })
                .collect(),
        });
    }

    by_file
}

/// Map every PR, concatenating results in input order.
pub fn build_hunk_comment_mappings(prs: &[PullRequestRecord]) -> Vec<HunkCommentMapping> {
    prs.iter().flat_map(map_pull_request).collect()
}

/// `rvh map`: read `prs.json`, write `hunks_comments.json`.
pub fn run_map(config: &Config) -> Result<()> {
    let paths = DataPaths::from_config(config);
    let prs: Vec<PullRequestRecord> = artifacts::read_stage_input(&paths.pull_requests(), "collect")?;

    let mappings = build_hunk_comment_mappings(&prs);
    artifacts::write_json(&paths.mappings(), &mappings)?;

    let comment_count: usize = mappings.iter().map(|m| m.comments.len()).sum();
    println!("map");
    println!("  PRs: {}", prs.len());
    println!("  mappings: {}", mappings.len());
    println!("  comments: {}", comment_count);
    println!("  saved: {}", paths.mappings().display());
    Ok(())
}
