//! Statistics over hunk-comment mappings.
//!
//! Gives a quick picture of what was mined: how many comments of each kind,
//! how long they are, how they spread over PRs, and which file types draw
//! review comments. Used by `rvh stats`.

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

use crate::artifacts::{self, DataPaths};
use crate::config::Config;
use crate::models::{CommentKind, HunkCommentMapping};

/// Aggregate statistics, saved as `mapping_stats.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MappingStats {
    pub total_hunks_with_comments: usize,
    pub total_comments: usize,
    pub review_comments: usize,
    pub issue_comments: usize,
    /// Mean review comment length in characters.
    pub avg_review_comment_length: f64,
    pub avg_issue_comment_length: f64,
    pub avg_review_comments_per_pr: f64,
    pub avg_issue_comments_per_pr: f64,
    /// `(extension, review comment count)`, most common first.
    pub file_extensions: Vec<(String, usize)>,
}

/// Arithmetic mean, 0 for an empty set.
fn mean(total: usize, count: usize) -> f64 {
    if count == 0 {
        0.0
    } else {
        total as f64 / count as f64
    }
}

/// Extension of a mapping's file path: text after the last `.`, or `no_ext`.
pub fn file_extension(path: &str) -> &str {
    match path.rfind('.') {
        Some(pos) => &path[pos + 1..],
        None => "no_ext",
    }
}

pub fn analyze_mappings(mappings: &[HunkCommentMapping]) -> MappingStats {
    let mut review_count = 0usize;
    let mut issue_count = 0usize;
    let mut review_chars = 0usize;
    let mut issue_chars = 0usize;
    let mut prs: HashSet<u64> = HashSet::new();
    let mut extensions: HashMap<String, usize> = HashMap::new();

    for item in mappings {
        prs.insert(item.pr_number);
        let ext = file_extension(&item.file_path);

        for comment in &item.comments {
            let len = comment.body.chars().count();
            match comment.kind {
                CommentKind::Review => {
                    review_count += 1;
                    review_chars += len;
                    *extensions.entry(ext.to_string()).or_insert(0) += 1;
                }
                CommentKind::Issue => {
                    issue_count += 1;
                    issue_chars += len;
                }
            }
        }
    }

    let mut file_extensions: Vec<(String, usize)> = extensions.into_iter().collect();
    file_extensions.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));

    MappingStats {
        total_hunks_with_comments: mappings.len(),
        total_comments: review_count + issue_count,
        review_comments: review_count,
        issue_comments: issue_count,
        avg_review_comment_length: mean(review_chars, review_count),
        avg_issue_comment_length: mean(issue_chars, issue_count),
        avg_review_comments_per_pr: mean(review_count, prs.len()),
        avg_issue_comments_per_pr: mean(issue_count, prs.len()),
        file_extensions,
    }
}

/// `rvh stats`: print a summary and save `mapping_stats.json`.
pub fn run_stats(config: &Config, top: usize) -> Result<()> {
    let paths = DataPaths::from_config(config);
    let mappings: Vec<HunkCommentMapping> = artifacts::read_stage_input(&paths.mappings(), "map")?;
    let stats = analyze_mappings(&mappings);

    println!("Mapping Statistics");
    println!("==================");
    println!();
    println!("  Total hunks with comments:   {}", stats.total_hunks_with_comments);
    println!("  Total comments:              {}", stats.total_comments);
    println!("  Review comments:             {}", stats.review_comments);
    println!("  Issue comments:              {}", stats.issue_comments);
    println!(
        "  Avg. review comment length:  {:.2} chars",
        stats.avg_review_comment_length
    );
    println!(
        "  Avg. issue comment length:   {:.2} chars",
        stats.avg_issue_comment_length
    );
    println!(
        "  Avg. review comments per PR: {:.2}",
        stats.avg_review_comments_per_pr
    );
    println!(
        "  Avg. issue comments per PR:  {:.2}",
        stats.avg_issue_comments_per_pr
    );

    if !stats.file_extensions.is_empty() {
        println!();
        println!("  Top file extensions for review comments:");
        for (ext, count) in stats.file_extensions.iter().take(top) {
            println!("    .{:<12} {:>6}", ext, count);
        }
    }
    println!();

    artifacts::write_json(&paths.stats(), &stats)?;
    println!("  saved: {}", paths.stats().display());
    Ok(())
}
