//! Shared test utilities for the doc-lastmod test suite.
//!
//! Git fixtures are built with the `git` CLI so the code under test (which
//! reads repositories through `gix`) is checked against real `git` output.
//!
//! # Usage
//!
//! ```rust
//! use crate::test_helpers::*;
//!
//! let tmp = TempDir::new().unwrap();
//! init_repo(tmp.path());
//! commit_file(tmp.path(), "docs/intro.md", "# Intro", "Add intro", "2021-03-01T10:00:00+00:00");
//! write_page(&tmp.path().join("_site/intro.html"), "<p>Hello</p>");
//! ```

use std::path::Path;
use std::process::Command;

// =========================================================================
// Git fixtures
// =========================================================================

/// Run `git` in `repo` isolated from the user's and system's git config.
/// `date` sets both author and committer dates.
pub fn git(repo: &Path, args: &[&str], date: Option<&str>) {
    let mut cmd = Command::new("git");
    cmd.current_dir(repo)
        .env("GIT_CONFIG_NOSYSTEM", "1")
        .env("GIT_CONFIG_GLOBAL", "/dev/null")
        .args([
            "-c",
            "user.name=Doc Writer",
            "-c",
            "user.email=writer@example.com",
            "-c",
            "commit.gpgsign=false",
        ])
        .args(args);
    if let Some(date) = date {
        cmd.env("GIT_AUTHOR_DATE", date)
            .env("GIT_COMMITTER_DATE", date);
    }
    let output = cmd.output().expect("git must be installed to run these tests");
    assert!(
        output.status.success(),
        "git {args:?} failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );
}

/// Create an empty repository at `path`.
pub fn init_repo(path: &Path) {
    std::fs::create_dir_all(path).unwrap();
    git(path, &["init", "-q"], None);
}

/// Write `content` to `relative` inside `repo` and commit it with `message`
/// at `date` (ISO 8601 with explicit offset).
pub fn commit_file(repo: &Path, relative: &str, content: &str, message: &str, date: &str) {
    let path = repo.join(relative);
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(&path, content).unwrap();
    git(repo, &["add", relative], None);
    git(repo, &["commit", "-q", "-m", message], Some(date));
}

// =========================================================================
// HTML fixtures
// =========================================================================

/// A DocFX-shaped page with `body` inside the conceptual content container.
pub fn docfx_page(body: &str) -> String {
    format!(
        r#"<!DOCTYPE html>
<html>
<head>
<meta charset="utf-8">
<title>Intro</title>
<link rel="stylesheet" href="styles/docfx.css">
</head>
<body>
<div class="container body-content">
<article class="content wrap" id="_content" data-uid="intro">
{body}
</article>
</div>
<script type="text/javascript" src="styles/docfx.vendor.js"></script>
</body>
</html>
"#
    )
}

/// Write a page, creating parent directories.
pub fn write_page(path: &Path, html: &str) {
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(path, html).unwrap();
}

/// Count non-overlapping occurrences of `needle` in `haystack`.
pub fn count(haystack: &str, needle: &str) -> usize {
    haystack.matches(needle).count()
}
