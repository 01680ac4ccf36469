//! # Review Harness
//!
//! Mines pull-request review comments from a GitHub repository and uses them
//! to suggest review comments for new diffs.
//!
//! Historical comments are collected, grouped per file, embedded, and stored
//! in an exact nearest-neighbour index. For a new PR, each diff hunk is used
//! as a query; the closest past comments are placed into a prompt and a
//! language model writes a suggestion, which is screened for generic or
//! empty output.
//!
//! ## Architecture
//!
//! ```text
//! ┌────────┐   ┌─────────┐   ┌──────┐   ┌───────┐   ┌─────────────┐
//! │ GitHub │──▶│ find /  │──▶│ map  │──▶│ build │──▶│ FlatIndex + │
//! │  API   │   │ collect │   │      │   │       │   │   lookup    │
//! └────────┘   └─────────┘   └──────┘   └───────┘   └──────┬──────┘
//!                                                          │
//!                    ┌──────────┐   ┌───────────┐          │
//!   PR diff ────────▶│  hunks   │──▶│  suggest  │◀─────────┘
//!                    └──────────┘   └───────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! rvh find --limit 100       # PRs with human review comments
//! rvh collect                # diffs + comments
//! rvh map                    # per-file comment mappings
//! rvh stats                  # summary statistics
//! rvh build                  # embed comments, write the index
//! rvh suggest 98547          # suggestions for a PR
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`models`] | GitHub payloads and pipeline records |
//! | [`artifacts`] | JSON files exchanged between stages |
//! | [`github`] | GitHub REST client |
//! | [`collect`] | `find` and `collect` stages |
//! | [`diff`] | Unified diff parser |
//! | [`mapping`] | Comment grouping per file |
//! | [`stats`] | Mapping statistics |
//! | [`embedding`] | Embedding provider abstraction |
//! | [`index`] | Flat nearest-neighbour index |
//! | [`build`] | Index construction |
//! | [`search`] | Retrieval |
//! | [`generation`] | LLM backends |
//! | [`suggest`] | Prompting and quality filtering |
//! | [`progress`] | Progress reporting |

pub mod artifacts;
pub mod build;
pub mod collect;
pub mod config;
pub mod diff;
pub mod embedding;
pub mod generation;
pub mod github;
pub mod index;
pub mod mapping;
pub mod models;
pub mod progress;
pub mod search;
pub mod stats;
pub mod suggest;
