//! CLI output formatting.
//!
//! Output is page-centric: each output file leads, with where its date came
//! from and what happened to it as indented context lines.
//!
//! ## Annotate
//!
//! ```text
//! Annotated
//! 001 articles/intro.html
//!     Modified: 2021-03-01 10:00:00 UTC (commit abc1234)
//!     Reason: Fix typo in intro
//! 002 articles/setup.html
//!     Modified: 2021-02-11 08:12:40 UTC (filesystem)
//!
//! Skipped (no content region)
//! 001 redirect.html
//!
//! Failed
//! 001 broken.html
//!     Error: cannot read _site/broken.html: stream did not contain valid UTF-8
//!
//! 2 annotated, 1 skipped, 1 failed (2 from history, 1 from filesystem)
//! ```
//!
//! ## Check
//!
//! ```text
//! Repository
//!     /repo (42 commits)
//!
//! Documents
//! 001 articles/intro.html
//!     Source: /repo/docs/articles/intro.md
//! 002 articles/gone.html
//!     Source: /repo/docs/articles/gone.md (missing)
//!     Output: missing
//!
//! 2 documents, 1 with problems
//! ```
//!
//! Each report has a `format_*` function (returns `Vec<String>`) for
//! testability and a `print_*` wrapper that writes to stdout.

use crate::pipeline::{CheckReport, DocumentReport, Outcome, RunSummary};
use crate::types::ChangeInfo;

/// Format a 1-based positional index as 3-digit zero-padded.
fn format_index(pos: usize) -> String {
    format!("{:0>3}", pos)
}

fn indent(depth: usize) -> String {
    "    ".repeat(depth)
}

fn modified_line(change: &ChangeInfo) -> String {
    format!(
        "{}Modified: {} UTC ({})",
        indent(1),
        change.modified_at.format("%Y-%m-%d %H:%M:%S"),
        change.source
    )
}

/// First line of the reason only; the panel on the page has the rest.
fn reason_line(change: &ChangeInfo) -> Option<String> {
    let first = change.display_reason()?.lines().next()?;
    Some(format!("{}Reason: {}", indent(1), first))
}

fn document_lines(position: usize, report: &DocumentReport) -> Vec<String> {
    let mut lines = vec![format!("{} {}", format_index(position), report.relative_output)];
    if let Some(change) = &report.change {
        lines.push(modified_line(change));
        if report.outcome == Outcome::Annotated {
            lines.extend(reason_line(change));
        }
    }
    if let Outcome::Failed(error) = &report.outcome {
        lines.push(format!("{}Error: {}", indent(1), error));
    }
    lines
}

fn section(lines: &mut Vec<String>, title: &str, reports: &[&DocumentReport]) {
    if reports.is_empty() {
        return;
    }
    if !lines.is_empty() {
        lines.push(String::new());
    }
    lines.push(title.to_string());
    for (i, report) in reports.iter().enumerate() {
        lines.extend(document_lines(i + 1, report));
    }
}

/// Format the result of an `annotate` run, grouped by outcome.
pub fn format_run_summary(summary: &RunSummary) -> Vec<String> {
    let by_outcome = |pick: fn(&Outcome) -> bool| -> Vec<&DocumentReport> {
        summary.documents.iter().filter(|d| pick(&d.outcome)).collect()
    };

    let mut lines = Vec::new();
    section(
        &mut lines,
        "Annotated",
        &by_outcome(|o| matches!(o, Outcome::Annotated)),
    );
    section(
        &mut lines,
        "Skipped (no content region)",
        &by_outcome(|o| matches!(o, Outcome::Skipped)),
    );
    section(
        &mut lines,
        "Failed",
        &by_outcome(|o| matches!(o, Outcome::Failed(_))),
    );

    if !lines.is_empty() {
        lines.push(String::new());
    }
    lines.push(summary.to_string());
    lines
}

pub fn print_run_summary(summary: &RunSummary) {
    for line in format_run_summary(summary) {
        println!("{}", line);
    }
}

/// Format a dry-run report.
pub fn format_check_report(report: &CheckReport) -> Vec<String> {
    let mut lines = vec!["Repository".to_string()];
    match &report.repository {
        Some(repo) => lines.push(format!(
            "{}{} ({} commits)",
            indent(1),
            repo.root.display(),
            repo.commits
        )),
        None => lines.push(format!("{}none (file modification times)", indent(1))),
    }

    lines.push(String::new());
    lines.push("Documents".to_string());
    for (i, doc) in report.documents.iter().enumerate() {
        lines.push(format!("{} {}", format_index(i + 1), doc.job.relative_output));
        let missing = if doc.source_exists { "" } else { " (missing)" };
        lines.push(format!(
            "{}Source: {}{}",
            indent(1),
            doc.job.source.display(),
            missing
        ));
        if !doc.output_exists {
            lines.push(format!("{}Output: missing", indent(1)));
        }
    }

    lines.push(String::new());
    lines.push(format!(
        "{} documents, {} with problems",
        report.documents.len(),
        report.problems()
    ));
    lines
}

pub fn print_check_report(report: &CheckReport) {
    for line in format_check_report(report) {
        println!("{}", line);
    }
}
