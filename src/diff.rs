//! Unified diff parsing.
//!
//! Splits a multi-file unified diff (as served by the GitHub
//! `application/vnd.github.v3.diff` media type or `git diff`) into
//! [`DiffHunk`]s in a single forward pass.
//!
//! Recognised lines:
//!
//! | Line | Meaning |
//! |------|---------|
//! | `diff --git a/x b/x` | start of a file section |
//! | `--- a/x` | old path, used only for deleted files |
//! | `+++ b/x` | destination path |
//! | `@@ -a,b +c,d @@` | hunk header; `c` is the start line |
//!
//! File headers are only honoured between `diff --git` and the first `@@` of a
//! section, so hunk body lines such as `+++ b/...` (an added line that starts
//! with `++`) stay part of the hunk.

use crate::models::DiffHunk;

/// Parse the new-file start line from a hunk header.
///
/// `@@ -10,5 +12,7 @@ fn main()` yields 12. Anything that does not carry a
/// parseable `+start` token yields 0.
pub fn parse_hunk_start(header: &str) -> u32 {
    header
        .split("@@")
        .nth(1)
        .and_then(|range| range.split_whitespace().find(|t| t.starts_with('+')))
        .and_then(|token| token[1..].split(',').next())
        .and_then(|n| n.parse().ok())
        .unwrap_or(0)
}

struct OpenHunk {
    line_start: u32,
    lines: Vec<String>,
}

#[derive(Default)]
struct Parser {
    hunks: Vec<DiffHunk>,
    new_path: Option<String>,
    old_path: Option<String>,
    open: Option<OpenHunk>,
}

impl Parser {
    fn current_file(&self) -> Option<&str> {
        self.new_path.as_deref().or(self.old_path.as_deref())
    }

    fn flush(&mut self) {
        let Some(open) = self.open.take() else {
            return;
        };
        match self.current_file() {
            Some(file) => {
                let file = file.to_string();
                self.hunks.push(DiffHunk {
                    file,
                    line_start: open.line_start,
                    hunk: open.lines.join("\n"),
                });
            }
            None => tracing::debug!("dropping hunk without a file path"),
        }
    }

    fn feed(&mut self, line: &str) {
        if line.starts_with("diff --git") {
            self.flush();
            self.new_path = None;
            self.old_path = None;
            return;
        }

        if line.starts_with("@@") {
            self.flush();
            self.open = Some(OpenHunk {
                line_start: parse_hunk_start(line),
                lines: vec![line.to_string()],
            });
            return;
        }

        if let Some(open) = self.open.as_mut() {
            open.lines.push(line.to_string());
            return;
        }

        if let Some(path) = line.strip_prefix("+++ b/") {
            self.new_path = Some(path.to_string());
        } else if let Some(path) = line.strip_prefix("--- a/") {
            self.old_path = Some(path.to_string());
        }
    }

    fn finish(mut self) -> Vec<DiffHunk> {
        self.flush();
        self.hunks
    }
}

/// Split a unified diff into hunks, in input order.
///
/// Hunks whose file path cannot be determined are dropped. Malformed hunk
/// headers never fail the parse; their start line is 0.
pub fn parse_unified_diff(diff_text: &str) -> Vec<DiffHunk> {
    let mut parser = Parser::default();
    for line in diff_text.lines() {
        parser.feed(line);
    }
    parser.finish()
}
