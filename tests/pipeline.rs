//! End-to-end pipeline tests against an in-process mock of the GitHub REST
//! API and an Ollama server.

use axum::extract::{Path, Query, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tempfile::TempDir;

use review_harness::artifacts::{self, DataPaths};
use review_harness::build::{self, lookup_entries};
use review_harness::collect::{collect_pull_requests, find_reviewed_prs};
use review_harness::config::{parse_config, Config};
use review_harness::embedding::{create_provider, EmbeddingProvider};
use review_harness::github::GitHubClient;
use review_harness::mapping::{self, build_hunk_comment_mappings};
use review_harness::progress::NoProgress;
use review_harness::search::Retriever;
use review_harness::suggest;

const PR1_DIFF: &str = "diff --git a/llvm/lib/Support/APInt.cpp b/llvm/lib/Support/APInt.cpp
index 1111111..2222222 100644
--- a/llvm/lib/Support/APInt.cpp
+++ b/llvm/lib/Support/APInt.cpp
@@ -10,5 +12,7 @@ APInt APInt::operator*(const APInt &RHS) const {
 context
-  return mul(RHS);
+  APInt Result = mul(RHS);
+  return Result;
 context
@@ -80,3 +84,4 @@ void APInt::print(raw_ostream &OS) const {
 context
+  OS.flush();
 context
";

const SUGGESTION: &str = "Consider checking whether the multiplication can overflow here.";

// ─── Mock server ────────────────────────────────────────────────────

fn pr_json(number: u64) -> Value {
    json!({
        "number": number,
        "title": format!("PR number {}", number),
        "diff_url": format!("https://github.com/llvm/llvm-project/pull/{}.diff", number),
        "base": {"sha": format!("base{}", number), "ref": "main"},
        "head": {"sha": format!("head{}", number), "ref": format!("topic-{}", number)}
    })
}

async fn list_pulls(Query(q): Query<HashMap<String, String>>) -> Json<Value> {
    match q.get("page").map(String::as_str) {
        Some("1") => Json(json!([pr_json(1), pr_json(2), pr_json(3)])),
        _ => Json(json!([])),
    }
}

async fn get_pull(Path(number): Path<u64>, headers: HeaderMap) -> Response {
    let wants_diff = headers
        .get(header::ACCEPT)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.contains("diff"));

    match (number, wants_diff) {
        (1, true) => PR1_DIFF.into_response(),
        (1..=3, false) => Json(pr_json(number)).into_response(),
        _ => (StatusCode::NOT_FOUND, "Not Found").into_response(),
    }
}

async fn review_comments(Path(number): Path<u64>) -> Response {
    match number {
        1 => Json(json!([
            {
                "body": "Please keep the result in a named variable for debugging.",
                "path": "llvm/lib/Support/APInt.cpp",
                "position": 3,
                "line": 14,
                "user": {"login": "reviewer-one"}
            },
            {
                "body": "Is flushing the stream needed in print?",
                "path": "llvm/lib/Support/APInt.cpp",
                "position": 9,
                "line": 86,
                "user": {"login": "reviewer-two"}
            }
        ]))
        .into_response(),
        2 => Json(json!([
            {
                "body": "Formatting issue detected.",
                "path": "llvm/lib/IR/Value.cpp",
                "position": 1,
                "user": {"login": "llvmbot"}
            }
        ]))
        .into_response(),
        _ => (StatusCode::INTERNAL_SERVER_ERROR, "boom").into_response(),
    }
}

async fn issue_comments(Path(number): Path<u64>) -> Json<Value> {
    match number {
        1 => Json(json!([
            {"body": "Thanks, merging after CI passes.", "user": {"login": "maintainer"}}
        ])),
        _ => Json(json!([])),
    }
}

async fn search_issues() -> Json<Value> {
    Json(json!({
        "total_count": 2,
        "items": [
            {"number": 1, "pull_request": {"url": "x"}},
            {"number": 7}
        ]
    }))
}

/// Deterministic 26-dim embedding: letter frequencies.
fn letter_counts(text: &str) -> Vec<f32> {
    let mut v = vec![0.0f32; 26];
    for c in text.chars().filter(|c| c.is_ascii_alphabetic()) {
        v[(c.to_ascii_lowercase() as u8 - b'a') as usize] += 1.0;
    }
    v
}

async fn ollama_embed(Json(body): Json<Value>) -> Json<Value> {
    let embeddings: Vec<Vec<f32>> = body["input"]
        .as_array()
        .map(|arr| {
            arr.iter()
                .map(|t| letter_counts(t.as_str().unwrap_or_default()))
                .collect()
        })
        .unwrap_or_default();
    Json(json!({ "model": body["model"], "embeddings": embeddings }))
}

async fn ollama_generate(Json(body): Json<Value>) -> Json<Value> {
    assert_eq!(body["stream"], false);
    let prompt = body["prompt"].as_str().unwrap_or_default();
    assert!(prompt.starts_with("You are reviewing this diff:\n@@"));
    assert!(prompt.ends_with("Write a useful code review comment."));
    // The "terse" model answers with bare praise.
    let reply = if body["model"] == "terse" { "LGTM" } else { SUGGESTION };
    Json(json!({ "model": body["model"], "response": format!("  {}\n", reply), "done": true }))
}

async fn start_mock() -> SocketAddr {
    let app = Router::new()
        .route("/repos/llvm/llvm-project/pulls", get(list_pulls))
        .route("/repos/llvm/llvm-project/pulls/{number}", get(get_pull))
        .route(
            "/repos/llvm/llvm-project/pulls/{number}/comments",
            get(review_comments),
        )
        .route(
            "/repos/llvm/llvm-project/issues/{number}/comments",
            get(issue_comments),
        )
        .route("/search/issues", get(search_issues))
        .route("/api/embed", post(ollama_embed))
        .route("/api/generate", post(ollama_generate));

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.ok();
    });
    addr
}

/// Embedder that rejects any batch mentioning "boom" while `failing` is set.
async fn flaky_embed(State(failing): State<Arc<AtomicBool>>, Json(body): Json<Value>) -> Response {
    let texts: Vec<&str> = body["input"]
        .as_array()
        .map(|arr| arr.iter().filter_map(Value::as_str).collect())
        .unwrap_or_default();
    if failing.load(Ordering::SeqCst) && texts.iter().any(|t| t.contains("boom")) {
        return (StatusCode::BAD_REQUEST, "model not loaded").into_response();
    }
    let embeddings: Vec<Vec<f32>> = texts.iter().map(|t| letter_counts(t)).collect();
    Json(json!({ "model": body["model"], "embeddings": embeddings })).into_response()
}

async fn start_flaky_embedder(failing: Arc<AtomicBool>) -> SocketAddr {
    let app = Router::new()
        .route("/api/embed", post(flaky_embed))
        .with_state(failing);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.ok();
    });
    addr
}

/// find, collect and map against the mock, leaving `hunks_comments.json`.
async fn prepare_mappings(cfg: &Config) {
    let paths = DataPaths::from_config(cfg);
    let client = GitHubClient::new(&cfg.github, "test-token".into()).unwrap();
    let found = find_reviewed_prs(&client, 10, None, &NoProgress).await;
    let records = collect_pull_requests(&client, &found, &NoProgress).await;
    artifacts::write_json(&paths.pull_requests(), &records).unwrap();
    mapping::run_map(cfg).unwrap();
}

fn test_config(addr: SocketAddr, data_dir: &std::path::Path) -> Config {
    parse_config(&format!(
        r#"[github]
api_url = "http://{addr}"
per_page = 3

[data]
dir = "{data}"

[embedding]
provider = "ollama"
model = "letters"
dims = 26
url = "http://{addr}"
batch_size = 2
max_retries = 0

[generation]
provider = "ollama"
model = "reviewer"
url = "http://{addr}"
"#,
        addr = addr,
        data = data_dir.display()
    ))
    .unwrap()
}

// ─── Tests ──────────────────────────────────────────────────────────

#[tokio::test]
async fn test_find_keeps_only_human_reviewed_prs() {
    let addr = start_mock().await;
    let tmp = TempDir::new().unwrap();
    let cfg = test_config(addr, tmp.path());
    let client = GitHubClient::new(&cfg.github, "test-token".into()).unwrap();

    let found = find_reviewed_prs(&client, 10, None, &NoProgress).await;
    let numbers: Vec<u64> = found.iter().map(|p| p.number).collect();
    // PR 2 has only a bot comment, PR 3's comment listing fails.
    assert_eq!(numbers, vec![1]);
    assert_eq!(found[0].head.ref_name, "topic-1");
}

#[tokio::test]
async fn test_listing_respects_limit() {
    let addr = start_mock().await;
    let tmp = TempDir::new().unwrap();
    let cfg = test_config(addr, tmp.path());
    let client = GitHubClient::new(&cfg.github, "test-token".into()).unwrap();

    assert_eq!(client.list_pull_requests(2).await.len(), 2);
    assert_eq!(client.list_pull_requests(50).await.len(), 3);
}

#[tokio::test]
async fn test_search_resolves_pull_requests_only() {
    let addr = start_mock().await;
    let tmp = TempDir::new().unwrap();
    let cfg = test_config(addr, tmp.path());
    let client = GitHubClient::new(&cfg.github, "test-token".into()).unwrap();

    let found = client.search_pull_requests("APInt", 5).await;
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].number, 1);
}

#[tokio::test]
async fn test_non_success_responses_are_empty() {
    let addr = start_mock().await;
    let tmp = TempDir::new().unwrap();
    let cfg = test_config(addr, tmp.path());
    let client = GitHubClient::new(&cfg.github, "test-token".into()).unwrap();

    assert!(client.fetch_review_comments(3).await.is_empty());
    assert_eq!(client.fetch_diff(404).await, "");
    assert!(client.fetch_pull_request(404).await.is_none());
}

#[tokio::test]
async fn test_collect_map_and_retrieve() {
    let addr = start_mock().await;
    let tmp = TempDir::new().unwrap();
    let cfg = test_config(addr, tmp.path());
    let client = GitHubClient::new(&cfg.github, "test-token".into()).unwrap();

    let found = find_reviewed_prs(&client, 10, None, &NoProgress).await;
    let records = collect_pull_requests(&client, &found, &NoProgress).await;
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].diff, PR1_DIFF);
    assert_eq!(records[0].base_sha, "base1");
    assert_eq!(records[0].review_comments.len(), 2);
    assert_eq!(records[0].issue_comments.len(), 1);

    let mappings = build_hunk_comment_mappings(&records);
    assert_eq!(mappings.len(), 2);
    assert!(mappings[1].is_general());

    let provider = create_provider(&cfg.embedding).unwrap();
    assert_eq!(provider.dims(), 26);
    let entries = lookup_entries(&mappings, true);
    assert_eq!(entries.len(), 3);
    let target = entries[1].query.clone();

    let built = build::build_index(provider.as_ref(), entries, 2, &NoProgress)
        .await
        .unwrap();
    assert_eq!(built.failed, 0);
    assert_eq!(built.index.len(), 3);

    let lookup = build::CommentLookup {
        model: provider.model_name().to_string(),
        dims: provider.dims(),
        source_sha256: String::new(),
        include_context: true,
        built_at: chrono::Utc::now(),
        failed: built.failed,
        entries: built.entries,
    };
    let retriever = Retriever::new(built.index, lookup).unwrap();
    let hits = retriever
        .retrieve_text(provider.as_ref(), &target, 5)
        .await
        .unwrap();

    assert_eq!(hits.len(), 3);
    assert_eq!(hits[0].id, 1);
    assert!(hits[0].distance.abs() < 1e-6);
    assert_eq!(hits[0].comment, "Is flushing the stream needed in print?");
}

#[tokio::test]
async fn test_build_and_suggest_from_artifacts() {
    let addr = start_mock().await;
    let tmp = TempDir::new().unwrap();
    let cfg = test_config(addr, tmp.path());
    let paths = DataPaths::from_config(&cfg);

    prepare_mappings(&cfg).await;
    build::run_build(&cfg, false, &NoProgress).await.unwrap();
    assert!(paths.index().exists());

    let lookup: build::CommentLookup = artifacts::read_json(&paths.lookup()).unwrap();
    assert_eq!(lookup.model, "letters");
    assert_eq!(lookup.dims, 26);
    assert_eq!(lookup.entries.len(), 3);
    assert_eq!(lookup.source_sha256.len(), 64);

    // Unchanged inputs: the second build leaves the artifacts alone.
    let before = std::fs::read_to_string(paths.lookup()).unwrap();
    build::run_build(&cfg, false, &NoProgress).await.unwrap();
    assert_eq!(std::fs::read_to_string(paths.lookup()).unwrap(), before);

    // --rebuild re-embeds the same inputs.
    build::run_build(&cfg, true, &NoProgress).await.unwrap();
    let rebuilt: build::CommentLookup = artifacts::read_json(&paths.lookup()).unwrap();
    assert!(rebuilt.built_at > lookup.built_at);
    assert_eq!(rebuilt.entries, lookup.entries);

    let diff_path = tmp.path().join("pr1.diff");
    std::fs::write(&diff_path, PR1_DIFF).unwrap();
    suggest::run_suggest(&cfg, 1, Some(diff_path.as_path()), Some(2), false, None, &NoProgress)
        .await
        .unwrap();

    let report: Value = artifacts::read_json(&paths.suggestions(1)).unwrap();
    assert_eq!(report["pr_number"], 1);
    assert_eq!(report["generation_model"], "reviewer");
    assert_eq!(report["embedding_model"], "letters");
    assert_eq!(report["quality_filter"], true);

    let hunks = report["hunks"].as_array().unwrap();
    assert_eq!(hunks.len(), 2);
    assert_eq!(hunks[0]["file"], "llvm/lib/Support/APInt.cpp");
    assert_eq!(hunks[0]["line_start"], 12);
    assert_eq!(hunks[1]["line_start"], 84);
    for h in hunks {
        assert_eq!(h["outcome"]["status"], "accepted");
        assert_eq!(h["outcome"]["comment"], SUGGESTION);
        assert_eq!(h["examples"].as_array().unwrap().len(), 2);
    }
}

#[tokio::test]
async fn test_incomplete_build_is_redone_once_provider_recovers() {
    let failing = Arc::new(AtomicBool::new(true));
    let addr = start_flaky_embedder(failing.clone()).await;
    let tmp = TempDir::new().unwrap();
    let mut cfg = test_config(addr, tmp.path());
    cfg.embedding.batch_size = 1;
    let paths = DataPaths::from_config(&cfg);

    let mappings = json!([{
        "pr_number": 4,
        "file_path": "llvm/lib/IR/Value.cpp",
        "comments": [
            {"body": "Please avoid the copy here.", "position": 2, "type": "review"},
            {"body": "boom: this shift can overflow.", "position": 5, "type": "review"}
        ]
    }]);
    artifacts::write_json(&paths.mappings(), &mappings).unwrap();

    build::run_build(&cfg, false, &NoProgress).await.unwrap();
    let partial: build::CommentLookup = artifacts::read_json(&paths.lookup()).unwrap();
    assert_eq!(partial.failed, 1);
    assert_eq!(partial.entries.len(), 1);

    failing.store(false, Ordering::SeqCst);
    build::run_build(&cfg, false, &NoProgress).await.unwrap();
    let complete: build::CommentLookup = artifacts::read_json(&paths.lookup()).unwrap();
    assert_eq!(complete.failed, 0);
    assert_eq!(complete.entries.len(), 2);
    assert_eq!(complete.source_sha256, partial.source_sha256);

    // Complete now, so a plain build is a no-op again.
    let before = std::fs::read_to_string(paths.lookup()).unwrap();
    build::run_build(&cfg, false, &NoProgress).await.unwrap();
    assert_eq!(std::fs::read_to_string(paths.lookup()).unwrap(), before);
}

#[tokio::test]
async fn test_quality_filter_switches() {
    let addr = start_mock().await;
    let tmp = TempDir::new().unwrap();
    let mut cfg = test_config(addr, tmp.path());
    cfg.generation.model = Some("terse".into());
    let paths = DataPaths::from_config(&cfg);

    prepare_mappings(&cfg).await;
    build::run_build(&cfg, false, &NoProgress).await.unwrap();
    let diff_path = tmp.path().join("pr1.diff");
    std::fs::write(&diff_path, PR1_DIFF).unwrap();
    let diff = Some(diff_path.as_path());

    // Filter on: bare praise is rejected.
    suggest::run_suggest(&cfg, 1, diff, Some(1), false, None, &NoProgress)
        .await
        .unwrap();
    let report: Value = artifacts::read_json(&paths.suggestions(1)).unwrap();
    assert_eq!(report["quality_filter"], true);
    for h in report["hunks"].as_array().unwrap() {
        assert_eq!(h["outcome"]["status"], "rejected");
        assert_eq!(h["outcome"]["reason"]["kind"], "generic");
    }

    // --no-filter keeps it.
    let no_filter_out = tmp.path().join("no-filter.json");
    suggest::run_suggest(&cfg, 1, diff, Some(1), true, Some(no_filter_out.clone()), &NoProgress)
        .await
        .unwrap();
    let report: Value = artifacts::read_json(&no_filter_out).unwrap();
    assert_eq!(report["quality_filter"], false);
    for h in report["hunks"].as_array().unwrap() {
        assert_eq!(h["outcome"]["status"], "accepted");
        assert_eq!(h["outcome"]["comment"], "LGTM");
    }

    // So does `suggest.quality_filter = false`.
    let mut lax = cfg.clone();
    lax.suggest.quality_filter = false;
    let lax_out = tmp.path().join("lax.json");
    suggest::run_suggest(&lax, 1, diff, Some(1), false, Some(lax_out.clone()), &NoProgress)
        .await
        .unwrap();
    let report: Value = artifacts::read_json(&lax_out).unwrap();
    assert_eq!(report["quality_filter"], false);
    assert!(report["hunks"]
        .as_array()
        .unwrap()
        .iter()
        .all(|h| h["outcome"]["status"] == "accepted"));

    assert!(suggest::run_suggest(&cfg, 1, diff, Some(0), false, None, &NoProgress)
        .await
        .is_err());
}
