//! # Review Harness CLI (`rvh`)
//!
//! One subcommand per pipeline stage. Each stage reads the previous stage's
//! JSON output from the data directory and writes its own.
//!
//! ## Usage
//!
//! ```bash
//! rvh --config ./config/rvh.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `rvh find` | List PRs and keep those with human review comments |
//! | `rvh collect` | Fetch diffs, review comments and issue comments |
//! | `rvh map` | Group comments per file |
//! | `rvh stats` | Print and save mapping statistics |
//! | `rvh build` | Embed comments and write the index |
//! | `rvh search "<text>"` | Nearest past comments for some text |
//! | `rvh hunks <pr>` | Show the hunks of a PR's diff |
//! | `rvh suggest <pr>` | Suggest review comments for a PR |

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use review_harness::config::{self, DEFAULT_CONFIG_PATH};
use review_harness::progress::ProgressMode;
use review_harness::{build, collect, mapping, search, stats, suggest};

/// Review Harness: mine PR review comments and suggest new ones.
#[derive(Parser)]
#[command(
    name = "rvh",
    about = "Review Harness: mine PR review comments and suggest new ones",
    version,
    long_about = "Review Harness collects review comments from a GitHub repository, \
    indexes them by embedding, and uses the most similar past comments to prompt a \
    language model for review suggestions on new pull requests."
)]
struct Cli {
    /// Path to configuration file (TOML).
    ///
    /// Defaults to `./config/rvh.toml`; when that file does not exist the
    /// built-in defaults are used.
    #[arg(long, global = true, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// Progress output on stderr.
    #[arg(long, global = true, value_enum, default_value = "auto")]
    progress: ProgressMode,

    /// Debug logging (overridden by `RUST_LOG`).
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Find PRs that have review comments from humans.
    ///
    /// Writes `prs_with_review_comments.json`. Requires `GITHUB_TOKEN`.
    Find {
        /// Number of PRs to scan (default: `github.pr_limit`).
        #[arg(long)]
        limit: Option<usize>,

        /// Search PRs with this text instead of listing the newest ones.
        #[arg(long)]
        query: Option<String>,
    },

    /// Fetch diff and comments for every found PR.
    ///
    /// Reads `prs_with_review_comments.json`, writes `prs.json`.
    Collect,

    /// Group each PR's comments per file.
    ///
    /// Reads `prs.json`, writes `hunks_comments.json`.
    Map,

    /// Summarize the mappings.
    Stats {
        /// Number of file extensions to list.
        #[arg(long, default_value_t = 5)]
        top: usize,
    },

    /// Embed all mapped comments and write the index.
    Build {
        /// Re-embed even when the inputs are unchanged.
        #[arg(long)]
        rebuild: bool,
    },

    /// Retrieve past comments similar to some text.
    Search {
        text: String,

        /// Number of results (default: `retrieval.top_k`).
        #[arg(short, value_parser = parse_k)]
        k: Option<usize>,
    },

    /// Print the hunks of a PR's diff.
    Hunks {
        pr_number: u64,

        /// Read the diff from a file instead of GitHub.
        #[arg(long)]
        diff_file: Option<PathBuf>,
    },

    /// Suggest review comments for each hunk of a PR.
    Suggest {
        pr_number: u64,

        /// Past comments per hunk (default: `retrieval.top_k`).
        #[arg(short, value_parser = parse_k)]
        k: Option<usize>,

        /// Read the diff from a file instead of GitHub.
        #[arg(long)]
        diff_file: Option<PathBuf>,

        /// Keep generated comments the quality filter would reject.
        #[arg(long)]
        no_filter: bool,

        /// Write the report here instead of `suggestions/pr-<n>.json`.
        #[arg(long)]
        output: Option<PathBuf>,
    },
}

fn parse_k(s: &str) -> Result<usize, String> {
    match s.parse::<usize>() {
        Ok(0) => Err("k must be at least 1".to_string()),
        Ok(k) => Ok(k),
        Err(e) => Err(e.to_string()),
    }
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let cfg = config::load_config(&cli.config)?;
    let progress = cli.progress.reporter();

    match cli.command {
        Commands::Find { limit, query } => {
            collect::run_find(&cfg, limit, query.as_deref(), progress.as_ref()).await?;
        }
        Commands::Collect => {
            collect::run_collect(&cfg, progress.as_ref()).await?;
        }
        Commands::Map => {
            mapping::run_map(&cfg)?;
        }
        Commands::Stats { top } => {
            stats::run_stats(&cfg, top)?;
        }
        Commands::Build { rebuild } => {
            build::run_build(&cfg, rebuild, progress.as_ref()).await?;
        }
        Commands::Search { text, k } => {
            search::run_search(&cfg, &text, k).await?;
        }
        Commands::Hunks {
            pr_number,
            diff_file,
        } => {
            suggest::run_hunks(&cfg, pr_number, diff_file.as_deref()).await?;
        }
        Commands::Suggest {
            pr_number,
            k,
            diff_file,
            no_filter,
            output,
        } => {
            suggest::run_suggest(
                &cfg,
                pr_number,
                diff_file.as_deref(),
                k,
                no_filter,
                output,
                progress.as_ref(),
            )
            .await?;
        }
    }

    Ok(())
}
