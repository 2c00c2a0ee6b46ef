//! Shared fixtures for the integration tests: git repositories built with
//! the `git` CLI, DocFX-shaped pages and manifests.

#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::process::Command;

/// Run `git` in `repo` isolated from the user's and system's git config.
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

pub fn init_repo(path: &Path) {
    std::fs::create_dir_all(path).unwrap();
    git(path, &["init", "-q"], None);
}

pub fn commit_file(repo: &Path, relative: &str, content: &str, message: &str, date: &str) {
    let path = repo.join(relative);
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(&path, content).unwrap();
    git(repo, &["add", relative], None);
    git(repo, &["commit", "-q", "-m", message], Some(date));
}

pub fn docfx_page(title: &str, body: &str) -> String {
    format!(
        r#"<!DOCTYPE html>
<html>
<head>
<meta charset="utf-8">
<title>{title}</title>
<link rel="stylesheet" href="../styles/docfx.css">
</head>
<body>
<div class="container body-content">
<article class="content wrap" id="_content" data-uid="{title}">
{body}
</article>
</div>
<script type="text/javascript" src="../styles/docfx.vendor.js"></script>
</body>
</html>
"#
    )
}

pub fn write_file(path: &Path, content: impl AsRef<[u8]>) {
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(path, content).unwrap();
}

/// One manifest entry: `(type, source_relative_path, html_relative_path)`.
pub type Entry<'a> = (&'a str, &'a str, &'a str);

/// Write a DocFX `manifest.json` into `site` and return its path.
pub fn write_manifest(site: &Path, source_base: &Path, entries: &[Entry]) -> PathBuf {
    let files: Vec<serde_json::Value> = entries
        .iter()
        .map(|(kind, source, output)| {
            serde_json::json!({
                "type": kind,
                "source_relative_path": source,
                "output": { ".html": { "relative_path": output } },
                "is_incremental": false
            })
        })
        .collect();
    let manifest = serde_json::json!({
        "source_base_path": source_base,
        "files": files,
        "xrefmap": "xrefmap.yml"
    });
    let path = site.join("manifest.json");
    write_file(&path, serde_json::to_string_pretty(&manifest).unwrap());
    path
}

/// Text between the first `open` and the next `close`.
pub fn between<'a>(haystack: &'a str, open: &str, close: &str) -> Option<&'a str> {
    let start = haystack.find(open)? + open.len();
    let len = haystack[start..].find(close)?;
    Some(&haystack[start..start + len])
}

pub fn count(haystack: &str, needle: &str) -> usize {
    haystack.matches(needle).count()
}
