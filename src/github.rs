//! Minimal GitHub REST client.
//!
//! Covers the handful of endpoints the pipeline needs: listing and searching
//! pull requests, fetching a PR's unified diff, and listing its review and
//! issue comments.
//!
//! # Error contract
//!
//! Fetch methods never fail: a non-2xx status, a transport error, or an
//! undecodable body is logged with `tracing::warn!` and treated as an empty
//! result. Requests are made once and never retried. The only hard failure
//! is constructing the client without a token.
//!
//! # Environment
//!
//! - `GITHUB_TOKEN`: required, sent as a bearer token.

use anyhow::{bail, Result};
use reqwest::header::{ACCEPT, AUTHORIZATION};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, warn};

use crate::config::GitHubConfig;
use crate::models::{IssueComment, PullRequestSummary, ReviewComment};

const JSON_MEDIA_TYPE: &str = "application/vnd.github+json";
const DIFF_MEDIA_TYPE: &str = "application/vnd.github.v3.diff";
/// GitHub caps comment listings at 100 per page.
const COMMENTS_PER_PAGE: u32 = 100;

/// Read the GitHub token from the environment.
pub fn token_from_env() -> Result<String> {
    match std::env::var("GITHUB_TOKEN") {
        Ok(token) if !token.trim().is_empty() => Ok(token),
        _ => bail!("GITHUB_TOKEN not found in environment variables."),
    }
}

/// GitHub REST client bound to one repository.
pub struct GitHubClient {
    http: reqwest::Client,
    api_url: String,
    owner: String,
    repo: String,
    token: String,
    state: String,
    per_page: u32,
}

#[derive(Deserialize)]
struct SearchResponse {
    #[serde(default)]
    items: Vec<SearchItem>,
}

#[derive(Deserialize)]
struct SearchItem {
    number: u64,
    #[serde(default)]
    pull_request: Option<serde_json::Value>,
}

impl GitHubClient {
    /// Create a client with an explicit token.
    pub fn new(config: &GitHubConfig, token: String) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(concat!("review-harness/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            http,
            api_url: config.api_url.trim_end_matches('/').to_string(),
            owner: config.owner.clone(),
            repo: config.repo.clone(),
            token,
            state: config.state.clone(),
            per_page: config.per_page,
        })
    }

    /// Create a client using `GITHUB_TOKEN`. Fails immediately if unset.
    pub fn from_env(config: &GitHubConfig) -> Result<Self> {
        Self::new(config, token_from_env()?)
    }

    /// `owner/repo` of the configured repository.
    pub fn repo_slug(&self) -> String {
        format!("{}/{}", self.owner, self.repo)
    }

    fn repo_url(&self, tail: &str) -> String {
        format!("{}/repos/{}/{}/{}", self.api_url, self.owner, self.repo, tail)
    }

    /// Issue a GET and decode the JSON body, or log and return `None`.
    async fn get_json<T: DeserializeOwned>(
        &self,
        url: &str,
        query: &[(&str, String)],
    ) -> Option<T> {
        let resp = self
            .http
            .get(url)
            .header(AUTHORIZATION, format!("Bearer {}", self.token))
            .header(ACCEPT, JSON_MEDIA_TYPE)
            .query(query)
            .send()
            .await;

        let response = match resp {
            Ok(r) => r,
            Err(e) => {
                warn!("GET {} failed: {}", url, e);
                return None;
            }
        };

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!("GET {} returned {}: {}", url, status, snippet(&body));
            return None;
        }

        match response.json::<T>().await {
            Ok(value) => Some(value),
            Err(e) => {
                warn!("GET {} returned an undecodable body: {}", url, e);
                None
            }
        }
    }

    /// List pull requests, newest first, paging until `limit` are collected
    /// or the API runs out (or fails).
    pub async fn list_pull_requests(&self, limit: usize) -> Vec<PullRequestSummary> {
        let url = self.repo_url("pulls");
        let mut prs: Vec<PullRequestSummary> = Vec::new();
        let mut page = 1u32;

        while prs.len() < limit {
            let query = [
                ("state", self.state.clone()),
                ("per_page", self.per_page.to_string()),
                ("page", page.to_string()),
            ];
            let Some(batch) = self.get_json::<Vec<PullRequestSummary>>(&url, &query).await else {
                warn!("Failed to fetch PRs (page {})", page);
                break;
            };
            if batch.is_empty() {
                break;
            }
            debug!("page {}: {} pull requests", page, batch.len());
            prs.extend(batch);
            page += 1;
        }

        prs.truncate(limit);
        prs
    }

    /// Fetch a single pull request.
    pub async fn fetch_pull_request(&self, number: u64) -> Option<PullRequestSummary> {
        self.get_json(&self.repo_url(&format!("pulls/{}", number)), &[])
            .await
    }

    /// Search pull requests of this repository with a free-text query.
    ///
    /// Search hits are issues; each is resolved to a full PR so the result
    /// carries base/head refs like [`list_pull_requests`](Self::list_pull_requests).
    pub async fn search_pull_requests(&self, text: &str, limit: usize) -> Vec<PullRequestSummary> {
        let url = format!("{}/search/issues", self.api_url);
        let q = format!("repo:{} is:pr {}", self.repo_slug(), text.trim());
        let query = [
            ("q", q),
            ("per_page", limit.clamp(1, 100).to_string()),
        ];

        let Some(found) = self.get_json::<SearchResponse>(&url, &query).await else {
            return Vec::new();
        };

        let mut prs = Vec::new();
        for item in found.items.into_iter().filter(|i| i.pull_request.is_some()) {
            if prs.len() >= limit {
                break;
            }
            if let Some(pr) = self.fetch_pull_request(item.number).await {
                prs.push(pr);
            }
        }
        prs
    }

    /// Fetch the unified diff of a pull request. Empty on failure.
    pub async fn fetch_diff(&self, number: u64) -> String {
        let url = self.repo_url(&format!("pulls/{}", number));
        let resp = self
            .http
            .get(&url)
            .header(AUTHORIZATION, format!("Bearer {}", self.token))
            .header(ACCEPT, DIFF_MEDIA_TYPE)
            .send()
            .await;

        match resp {
            Ok(response) if response.status().is_success() => {
                response.text().await.unwrap_or_else(|e| {
                    warn!("Failed to read diff for PR #{}: {}", number, e);
                    String::new()
                })
            }
            Ok(response) => {
                warn!(
                    "Failed to fetch diff for PR #{}: HTTP {}",
                    number,
                    response.status()
                );
                String::new()
            }
            Err(e) => {
                warn!("Failed to fetch diff for PR #{}: {}", number, e);
                String::new()
            }
        }
    }

    /// Review comments (anchored to files) of a pull request.
    pub async fn fetch_review_comments(&self, number: u64) -> Vec<ReviewComment> {
        let url = self.repo_url(&format!("pulls/{}/comments", number));
        let query = [("per_page", COMMENTS_PER_PAGE.to_string())];
        self.get_json(&url, &query).await.unwrap_or_default()
    }

    /// Conversation (issue) comments of a pull request.
    pub async fn fetch_issue_comments(&self, number: u64) -> Vec<IssueComment> {
        let url = self.repo_url(&format!("issues/{}/comments", number));
        let query = [("per_page", COMMENTS_PER_PAGE.to_string())];
        self.get_json(&url, &query).await.unwrap_or_default()
    }
}

fn snippet(body: &str) -> String {
    let s: String = body.chars().take(200).collect();
    s.replace('\n', " ")
}
