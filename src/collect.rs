//! Mining stages: find reviewed PRs, then collect their diffs and comments.
//!
//! Both stages walk their input list serially, one PR at a time, and rely
//! on [`GitHubClient`]'s empty-on-failure contract: a PR whose comments
//! cannot be fetched simply looks uncommented.

use anyhow::Result;
use tracing::info;

use crate::artifacts::{self, DataPaths};
use crate::config::Config;
use crate::github::GitHubClient;
use crate::models::{PullRequestRecord, PullRequestSummary, ReviewComment};
use crate::progress::{ProgressEvent, ProgressReporter};

/// True when at least one comment is anchored to a diff position and was
/// written by a human (login not containing `bot`).
pub fn has_reviewable_comments(comments: &[ReviewComment]) -> bool {
    comments
        .iter()
        .any(|c| c.position.is_some() && !c.is_from_bot())
}

/// List (or search) PRs and keep those with reviewable comments.
pub async fn find_reviewed_prs(
    client: &GitHubClient,
    limit: usize,
    query: Option<&str>,
    progress: &dyn ProgressReporter,
) -> Vec<PullRequestSummary> {
    let candidates = match query {
        Some(q) => client.search_pull_requests(q, limit).await,
        None => client.list_pull_requests(limit).await,
    };
    progress.report(ProgressEvent::Discovering {
        stage: "find".to_string(),
        found: candidates.len() as u64,
    });

    let total = candidates.len() as u64;
    let mut matching = Vec::new();

    for (i, pr) in candidates.into_iter().enumerate() {
        progress.report(ProgressEvent::Working {
            stage: "find".to_string(),
            n: i as u64 + 1,
            total,
            item: format!("PR #{}", pr.number),
        });

        let comments = client.fetch_review_comments(pr.number).await;
        if has_reviewable_comments(&comments) {
            info!("PR #{} has review comments", pr.number);
            matching.push(pr);
        } else {
            info!("PR #{} has no review comments", pr.number);
        }
    }

    matching
}

/// Fetch diff, review comments and issue comments for each PR.
pub async fn collect_pull_requests(
    client: &GitHubClient,
    prs: &[PullRequestSummary],
    progress: &dyn ProgressReporter,
) -> Vec<PullRequestRecord> {
    let total = prs.len() as u64;
    let mut records = Vec::with_capacity(prs.len());

    for (i, pr) in prs.iter().enumerate() {
        progress.report(ProgressEvent::Working {
            stage: "collect".to_string(),
            n: i as u64 + 1,
            total,
            item: format!("PR #{}", pr.number),
        });

        let diff = client.fetch_diff(pr.number).await;
        let review_comments = client.fetch_review_comments(pr.number).await;
        let issue_comments = client.fetch_issue_comments(pr.number).await;

        info!(
            "PR #{}: {} review comments, {} issue comments",
            pr.number,
            review_comments.len(),
            issue_comments.len()
        );

        records.push(PullRequestRecord {
            pr_number: pr.number,
            title: pr.title.clone(),
            diff,
            base_sha: pr.base.sha.clone(),
            head_sha: pr.head.sha.clone(),
            review_comments,
            issue_comments,
        });
    }

    records
}

/// `rvh find`: write `prs_with_review_comments.json`.
pub async fn run_find(
    config: &Config,
    limit: Option<usize>,
    query: Option<&str>,
    progress: &dyn ProgressReporter,
) -> Result<()> {
    let client = GitHubClient::from_env(&config.github)?;
    let paths = DataPaths::from_config(config);
    let limit = limit.unwrap_or(config.github.pr_limit);

    println!(
        "Searching {} for PRs with review comments...",
        client.repo_slug()
    );
    let matching = find_reviewed_prs(&client, limit, query, progress).await;

    artifacts::write_json(&paths.reviewed_prs(), &matching)?;

    println!("find");
    println!("  PRs with review comments: {}", matching.len());
    for pr in &matching {
        println!("  - #{}: {}", pr.number, pr.title);
    }
    println!("  saved: {}", paths.reviewed_prs().display());
    Ok(())
}

/// `rvh collect`: write `prs.json`.
pub async fn run_collect(config: &Config, progress: &dyn ProgressReporter) -> Result<()> {
    let paths = DataPaths::from_config(config);
    let prs: Vec<PullRequestSummary> = artifacts::read_stage_input(&paths.reviewed_prs(), "find")?;
    let client = GitHubClient::from_env(&config.github)?;

    let records = collect_pull_requests(&client, &prs, progress).await;
    artifacts::write_json(&paths.pull_requests(), &records)?;

    let review_total: usize = records.iter().map(|r| r.review_comments.len()).sum();
    let issue_total: usize = records.iter().map(|r| r.issue_comments.len()).sum();

    println!("collect");
    println!("  PRs: {}", records.len());
    println!("  review comments: {}", review_total);
    println!("  issue comments: {}", issue_total);
    println!("  saved: {}", paths.pull_requests().display());
    Ok(())
}
