//! Per-item progress reporting for the batch stages.
//!
//! `find`, `collect`, `build` and `suggest` walk a list one item at a time;
//! reporters show where they are in that list. Progress is emitted on
//! **stderr** so stdout remains parseable for scripts.

use std::io::Write;

/// A single progress event.
#[derive(Clone, Debug)]
pub enum ProgressEvent {
    /// Listing pages from the remote API; the total is not known yet.
    Discovering { stage: String, found: u64 },
    /// Working through a known list: item `n` of `total`.
    Working {
        stage: String,
        n: u64,
        total: u64,
        item: String,
    },
}

/// Reports pipeline progress. Implementations write to stderr (human or JSON).
pub trait ProgressReporter: Send + Sync {
    fn report(&self, event: ProgressEvent);
}

/// Human-friendly progress: `collect  12 / 50  PR #98547`.
pub struct StderrProgress;

impl ProgressReporter for StderrProgress {
    fn report(&self, event: ProgressEvent) {
        let mut stderr = std::io::stderr().lock();
        let _ = writeln!(stderr, "{}", human_line(&event));
        let _ = stderr.flush();
    }
}

/// Machine-readable progress: one JSON object per line on stderr.
pub struct JsonProgress;

impl ProgressReporter for JsonProgress {
    fn report(&self, event: ProgressEvent) {
        let mut stderr = std::io::stderr().lock();
        let _ = writeln!(stderr, "{}", json_value(&event));
        let _ = stderr.flush();
    }
}

/// No-op reporter when progress is disabled.
pub struct NoProgress;

impl ProgressReporter for NoProgress {
    fn report(&self, _event: ProgressEvent) {}
}

fn human_line(event: &ProgressEvent) -> String {
    match event {
        ProgressEvent::Discovering { stage, found } => {
            format!("{}  discovering...  {} found", stage, with_separators(*found))
        }
        ProgressEvent::Working {
            stage,
            n,
            total,
            item,
        } => format!(
            "{}  {} / {}  {}",
            stage,
            with_separators(*n),
            with_separators(*total),
            item
        ),
    }
}

fn json_value(event: &ProgressEvent) -> serde_json::Value {
    match event {
        ProgressEvent::Discovering { stage, found } => serde_json::json!({
            "event": "progress",
            "stage": stage,
            "phase": "discovering",
            "found": found,
        }),
        ProgressEvent::Working {
            stage,
            n,
            total,
            item,
        } => serde_json::json!({
            "event": "progress",
            "stage": stage,
            "phase": "working",
            "n": n,
            "total": total,
            "item": item,
        }),
    }
}

/// `98547` -> `98,547`.
fn with_separators(value: u64) -> String {
    let digits = value.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out
}

/// Progress mode for the CLI.
#[derive(Clone, Copy, Debug, Eq, PartialEq, clap::ValueEnum)]
pub enum ProgressMode {
    /// Human output when stderr is a TTY, otherwise off.
    Auto,
    Human,
    Json,
    Off,
}

impl ProgressMode {
    /// Build a reporter for this mode.
    pub fn reporter(&self) -> Box<dyn ProgressReporter> {
        match self {
            ProgressMode::Auto => {
                if atty::is(atty::Stream::Stderr) {
                    Box::new(StderrProgress)
                } else {
                    Box::new(NoProgress)
                }
            }
            ProgressMode::Human => Box::new(StderrProgress),
            ProgressMode::Json => Box::new(JsonProgress),
            ProgressMode::Off => Box::new(NoProgress),
        }
    }
}
