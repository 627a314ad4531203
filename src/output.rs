//! CLI output formatting.
//!
//! Each command has a `format_*` function returning lines (pure, testable)
//! and a `print_*` wrapper that writes them to stdout. Diagnostics go through
//! `tracing` on stderr; only results land here.
//!
//! ## Post
//!
//! ```text
//! Galaxy
//!     elliptical galaxy (CANDELS)
//!     Image: https://example.org/a.jpg (48213 bytes)
//! Caption
//!     An elliptical galaxy, observed with ...
//! Alt text
//!     A elliptical galaxy from the CANDELS project.
//! Posted after 1 attempt: {"cid":"...","uri":"at://..."}
//! ```
//!
//! ## Check
//!
//! ```text
//! row 002: caption error: no known instrument for project 'Radio Galaxy Zoo'
//! Checked 3 rows: 2 ok, 1 malformed
//! ```

use crate::caption::Caption;
use crate::pipeline::{CheckSummary, Draft, RunReport};
use crate::publish::PublishOutcome;
use crate::record::GalaxyRecord;

/// Return indentation string: 4 spaces per depth level.
fn indent(depth: usize) -> String {
    "    ".repeat(depth)
}

fn plural(n: u32, word: &str) -> String {
    if n == 1 {
        format!("{n} {word}")
    } else {
        format!("{n} {word}s")
    }
}

fn record_lines(record: &GalaxyRecord) -> Vec<String> {
    vec![
        "Galaxy".to_string(),
        format!(
            "{}{} ({})",
            indent(1),
            record.classification,
            record.project_name
        ),
    ]
}

fn caption_lines(caption: &Caption) -> Vec<String> {
    let mut lines = vec!["Caption".to_string()];
    for line in caption.text.lines() {
        if line.is_empty() {
            lines.push(String::new());
        } else {
            lines.push(format!("{}{}", indent(1), line));
        }
    }
    lines.push("Alt text".to_string());
    lines.push(format!("{}{}", indent(1), caption.alt_text));
    lines
}

/// One-line verdict for a publish outcome.
pub fn format_outcome(outcome: &PublishOutcome) -> String {
    match outcome {
        PublishOutcome::Succeeded { payload, attempts } => {
            format!("Posted after {}: {}", plural(*attempts, "attempt"), payload)
        }
        PublishOutcome::Rejected { errors, attempts } => format!(
            "Failed: rejected by endpoint after {}: {}",
            plural(*attempts, "attempt"),
            errors.join("; ")
        ),
        PublishOutcome::Exhausted { reason, attempts } => format!(
            "Failed after {}: {}",
            plural(*attempts, "attempt"),
            reason
        ),
        PublishOutcome::Cancelled { reason, attempts } => format!(
            "Cancelled after {}: {}",
            plural(*attempts, "attempt"),
            reason
        ),
    }
}

/// Lines for a finished `post` run.
pub fn format_run_report(report: &RunReport) -> Vec<String> {
    let mut lines = record_lines(&report.record);
    lines.push(format!(
        "{}Image: {} ({} bytes)",
        indent(1),
        report.record.image_url,
        report.image_bytes
    ));
    lines.extend(caption_lines(&report.caption));
    lines.push(format_outcome(&report.outcome));
    lines
}

/// Lines for `preview`.
pub fn format_draft(draft: &Draft) -> Vec<String> {
    let mut lines = record_lines(&draft.record);
    lines.push(format!("{}Image: {}", indent(1), draft.record.image_url));
    lines.extend(caption_lines(&draft.caption));
    lines
}

/// Lines for `check`: one per bad row, then a summary.
pub fn format_check_summary(summary: &CheckSummary) -> Vec<String> {
    let mut lines: Vec<String> = summary
        .failures
        .iter()
        .map(|(row, problem)| format!("row {row:0>3}: {problem}"))
        .collect();
    let bad = summary.failures.len();
    lines.push(format!(
        "Checked {} rows: {} ok, {} malformed",
        summary.rows,
        summary.rows.saturating_sub(bad),
        bad
    ));
    lines
}

pub fn print_run_report(report: &RunReport) {
    for line in format_run_report(report) {
        println!("{}", line);
    }
}

pub fn print_draft(draft: &Draft) {
    for line in format_draft(draft) {
        println!("{}", line);
    }
}

pub fn print_check_summary(summary: &CheckSummary) {
    for line in format_check_summary(summary) {
        println!("{}", line);
    }
}
