//! Injects the last-modified notice into a rendered page.
//!
//! The page is streamed through [`lol_html`] twice:
//!
//! 1. **Scan**: find the content region and note which of the collapsible
//!    panel's includes are already present.
//! 2. **Rewrite**: append the notice (and the commit panel) to the first
//!    content region, and add only the missing includes.
//!
//! Everything outside the appended fragments passes through byte-for-byte.
//! A page with no content region is never rewritten at all, which keeps
//! redirect stubs and custom templates untouched.
//!
//! ## Injected markup
//!
//! ```text
//! <article class="content wrap">
//!   ...page content...
//!   <hr>
//!   <p class="last-modified">This page was last modified at 2021-03-01 10:00:00 (UTC).</p>
//!   <div class="collapse-container last-modified" id="accordion">     ← only with a reason
//!     <span><span class="arrow-r"></span>Commit Message</span>
//!     <div><pre><code class="xml">Fix typo in intro</code></pre></div>
//!   </div>
//! </article>
//! ```
//!
//! The panel needs the collapsible script, an init snippet (end of `<body>`)
//! and the collapsible stylesheet (end of `<head>`). Each is injected at most
//! once per page, so re-running the stage stacks notices but never includes.
//!
//! Fragments are rendered with [maud](https://maud.lambda.xyz/), which escapes
//! the commit message: markup in a message shows up as text.

use crate::config::{AssetsConfig, LastModifiedConfig};
use crate::types::ChangeInfo;
use chrono::{DateTime, Utc};
use lol_html::html_content::ContentType;
use lol_html::{RewriteStrSettings, element, rewrite_str};
use maud::{Markup, PreEscaped, html};
use std::cell::Cell;
use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// `id` of the injected init `<script>`; also how a previous run is detected.
pub const INIT_SCRIPT_ID: &str = "last-modified-collapse-init";

const INIT_SCRIPT: &str = r##"$(function () { $("#accordion").collapsible(); });"##;

#[derive(Error, Debug)]
pub enum AnnotateError {
    #[error("cannot read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("cannot write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid content selector {selector:?}: {source}")]
    Selector {
        selector: String,
        #[source]
        source: lol_html::errors::SelectorError,
    },
    #[error("invalid timestamp format {0:?}")]
    TimestampFormat(String),
    #[error("HTML rewriting failed: {0}")]
    Rewrite(#[from] lol_html::errors::RewritingError),
}

/// What [`annotate`] did to a page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Annotation {
    /// Notice appended and page saved.
    Applied,
    /// No content region; page left untouched.
    MissingAnchor,
}

impl Annotation {
    pub fn is_applied(self) -> bool {
        self == Annotation::Applied
    }
}

/// Append the last-modified notice to the page at `path` and save it in place.
pub fn annotate(
    path: &Path,
    change: &ChangeInfo,
    config: &LastModifiedConfig,
) -> Result<Annotation, AnnotateError> {
    let html = fs::read_to_string(path).map_err(|source| AnnotateError::Read {
        path: path.to_path_buf(),
        source,
    })?;

    match annotate_html(&html, change, config)? {
        Some(rewritten) => {
            fs::write(path, rewritten).map_err(|source| AnnotateError::Write {
                path: path.to_path_buf(),
                source,
            })?;
            tracing::trace!(path = %path.display(), %change, "Wrote last-modified notice");
            Ok(Annotation::Applied)
        }
        None => {
            tracing::debug!(
                path = %path.display(),
                selector = %config.content_selector,
                "Content region not found, page left untouched"
            );
            Ok(Annotation::MissingAnchor)
        }
    }
}

/// In-memory form of [`annotate`]: the rewritten page, or `None` if the
/// page has no content region.
pub fn annotate_html(
    html: &str,
    change: &ChangeInfo,
    config: &LastModifiedConfig,
) -> Result<Option<String>, AnnotateError> {
    config
        .content_selector
        .parse::<lol_html::Selector>()
        .map_err(|source| AnnotateError::Selector {
            selector: config.content_selector.clone(),
            source,
        })?;

    let scan = scan_page(html, config)?;
    if scan.anchors == 0 {
        return Ok(None);
    }
    if scan.anchors > 1 {
        tracing::debug!(
            matches = scan.anchors,
            "Several content regions matched; annotating the first"
        );
    }

    let reason = change
        .display_reason()
        .filter(|_| config.commit_message.enabled);

    let notice = render_notice(change.modified_at, &config.timestamp_format)?;
    let mut anchor_fragment = notice.into_string();
    let mut head_fragment = String::new();
    let mut body_fragment = String::new();

    if let Some(reason) = reason {
        anchor_fragment.push_str(&render_commit_panel(reason).into_string());

        if !scan.has_stylesheet {
            let link = render_stylesheet(&config.assets).into_string();
            if scan.has_head {
                head_fragment = link;
            } else {
                anchor_fragment.push_str(&link);
            }
        }
        let scripts = render_scripts(&scan, &config.assets).into_string();
        if scan.has_body {
            body_fragment = scripts;
        } else {
            anchor_fragment.push_str(&scripts);
        }
    }

    let anchor_done = Cell::new(false);
    let head_done = Cell::new(false);
    let body_done = Cell::new(false);

    let rewritten = rewrite_str(
        html,
        RewriteStrSettings {
            element_content_handlers: vec![
                element!(config.content_selector.as_str(), |el| {
                    if !anchor_done.replace(true) {
                        el.append(&anchor_fragment, ContentType::Html);
                    }
                    Ok(())
                }),
                element!("head", |el| {
                    if !head_fragment.is_empty() && !head_done.replace(true) {
                        el.append(&head_fragment, ContentType::Html);
                    }
                    Ok(())
                }),
                element!("body", |el| {
                    if !body_fragment.is_empty() && !body_done.replace(true) {
                        el.append(&body_fragment, ContentType::Html);
                    }
                    Ok(())
                }),
            ],
            ..RewriteStrSettings::new()
        },
    )?;

    Ok(Some(rewritten))
}

/// What the scan pass learned about a page.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
struct PageScan {
    anchors: usize,
    has_head: bool,
    has_body: bool,
    has_stylesheet: bool,
    has_script: bool,
    has_init_script: bool,
}

fn scan_page(html: &str, config: &LastModifiedConfig) -> Result<PageScan, AnnotateError> {
    let anchors = Cell::new(0usize);
    let has_head = Cell::new(false);
    let has_body = Cell::new(false);
    let has_stylesheet = Cell::new(false);
    let has_script = Cell::new(false);
    let has_init_script = Cell::new(false);
    let assets = &config.assets;

    rewrite_str(
        html,
        RewriteStrSettings {
            element_content_handlers: vec![
                element!(config.content_selector.as_str(), |_el| {
                    anchors.set(anchors.get() + 1);
                    Ok(())
                }),
                element!("head", |_el| {
                    has_head.set(true);
                    Ok(())
                }),
                element!("body", |_el| {
                    has_body.set(true);
                    Ok(())
                }),
                element!("link[href]", |el| {
                    if el.get_attribute("href").as_deref() == Some(assets.stylesheet_url.as_str()) {
                        has_stylesheet.set(true);
                    }
                    Ok(())
                }),
                element!("script[src]", |el| {
                    if el.get_attribute("src").as_deref() == Some(assets.script_url.as_str()) {
                        has_script.set(true);
                    }
                    Ok(())
                }),
                element!(format!("script#{INIT_SCRIPT_ID}"), |_el| {
                    has_init_script.set(true);
                    Ok(())
                }),
            ],
            ..RewriteStrSettings::new()
        },
    )?;

    Ok(PageScan {
        anchors: anchors.get(),
        has_head: has_head.get(),
        has_body: has_body.get(),
        has_stylesheet: has_stylesheet.get(),
        has_script: has_script.get(),
        has_init_script: has_init_script.get(),
    })
}

// ============================================================================
// Fragments
// ============================================================================

/// Separator plus the last-modified paragraph.
fn render_notice(modified_at: DateTime<Utc>, format: &str) -> Result<Markup, AnnotateError> {
    let mut stamp = String::new();
    write!(stamp, "{}", modified_at.format(format))
        .map_err(|_| AnnotateError::TimestampFormat(format.to_string()))?;

    Ok(html! {
        hr;
        p.last-modified { "This page was last modified at " (stamp) " (UTC)." }
    })
}

/// Collapsible panel holding the commit message as literal text.
fn render_commit_panel(reason: &str) -> Markup {
    html! {
        div.collapse-container.last-modified id="accordion" {
            span { span.arrow-r {} "Commit Message" }
            div {
                pre { code.xml { (reason) } }
            }
        }
    }
}

fn render_stylesheet(assets: &AssetsConfig) -> Markup {
    html! {
        link rel="stylesheet" href=(assets.stylesheet_url);
    }
}

/// The collapsible plugin and its init snippet, minus whatever the page
/// already has.
fn render_scripts(scan: &PageScan, assets: &AssetsConfig) -> Markup {
    html! {
        @if !scan.has_script {
            script type="text/javascript" src=(assets.script_url) {}
        }
        @if !scan.has_init_script {
            script id=(INIT_SCRIPT_ID) { (PreEscaped(INIT_SCRIPT)) }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::{count, docfx_page, write_page};
    use crate::types::ChangeSource;
    use chrono::TimeZone;
    use tempfile::TempDir;

    const NOTICE: &str =
        r#"<hr><p class="last-modified">This page was last modified at 2021-03-01 10:00:00 (UTC).</p>"#;

    fn change(reason: Option<&str>) -> ChangeInfo {
        ChangeInfo {
            modified_at: Utc.with_ymd_and_hms(2021, 3, 1, 10, 0, 0).unwrap(),
            reason: reason.map(String::from),
            source: ChangeSource::History {
                commit: "abc1234".to_string(),
            },
        }
    }

    fn config() -> LastModifiedConfig {
        LastModifiedConfig::default()
    }

    #[test]
    fn appends_notice_at_end_of_content_region() {
        let page = docfx_page("<h1>Intro</h1>");
        let out = annotate_html(&page, &change(None), &config()).unwrap().unwrap();

        let expected = page.replace("</article>", &format!("{NOTICE}</article>"));
        assert_eq!(out, expected);
    }

    #[test]
    fn no_reason_means_no_panel_and_no_includes() {
        let page = docfx_page("<p>Body</p>");
        let out = annotate_html(&page, &change(None), &config()).unwrap().unwrap();

        assert!(!out.contains("Commit Message"));
        assert!(!out.contains(INIT_SCRIPT_ID));
        assert!(!out.contains(&config().assets.stylesheet_url));
        assert!(!out.contains(&config().assets.script_url));
    }

    #[test]
    fn whitespace_reason_renders_no_panel() {
        let page = docfx_page("<p>Body</p>");
        let out = annotate_html(&page, &change(Some("  \n ")), &config())
            .unwrap()
            .unwrap();
        assert!(!out.contains("Commit Message"));
    }

    #[test]
    fn reason_renders_trimmed_panel_with_includes() {
        let page = docfx_page("<p>Body</p>");
        let out = annotate_html(&page, &change(Some("\nFix typo in intro\n\n")), &config())
            .unwrap()
            .unwrap();

        assert!(out.contains(r#"<div class="collapse-container last-modified" id="accordion">"#));
        assert!(out.contains(r#"<code class="xml">Fix typo in intro</code>"#));

        let head_end = out.find("</head>").unwrap();
        let link = out.find(&config().assets.stylesheet_url).unwrap();
        assert!(link < head_end, "stylesheet belongs in <head>");

        let article_end = out.find("</article>").unwrap();
        let script = out.find(&config().assets.script_url).unwrap();
        let init = out.find(INIT_SCRIPT_ID).unwrap();
        let body_end = out.find("</body>").unwrap();
        assert!(article_end < script && script < init && init < body_end);
    }

    #[test]
    fn init_script_is_emitted_unescaped() {
        let page = docfx_page("<p>Body</p>");
        let out = annotate_html(&page, &change(Some("Reason")), &config())
            .unwrap()
            .unwrap();
        assert!(out.contains(&format!(
            r##"<script id="{INIT_SCRIPT_ID}">$(function () {{ $("#accordion").collapsible(); }});</script>"##
        )));
    }

    #[test]
    fn reason_markup_is_escaped() {
        let page = docfx_page("<p>Body</p>");
        let out = annotate_html(
            &page,
            &change(Some("Use <script>alert(1)</script> & </article> safely")),
            &config(),
        )
        .unwrap()
        .unwrap();

        assert!(!out.contains("<script>alert"));
        assert!(out.contains("&lt;script&gt;alert(1)&lt;/script&gt; &amp; &lt;/article&gt;"));
        assert_eq!(count(&out, "</article>"), 1);
    }

    #[test]
    fn repeated_runs_inject_includes_once() {
        let page = docfx_page("<p>Body</p>");
        let first = annotate_html(&page, &change(Some("First")), &config())
            .unwrap()
            .unwrap();
        let second = annotate_html(&first, &change(Some("Second")), &config())
            .unwrap()
            .unwrap();

        let assets = config().assets;
        assert_eq!(count(&second, "This page was last modified at"), 2);
        assert_eq!(count(&second, &assets.stylesheet_url), 1);
        assert_eq!(count(&second, &assets.script_url), 1);
        assert_eq!(count(&second, INIT_SCRIPT_ID), 1);
    }

    #[test]
    fn existing_template_includes_are_reused() {
        let assets = config().assets;
        let page = docfx_page("<p>Body</p>").replace(
            "</head>",
            &format!(
                "<link rel=\"stylesheet\" href=\"{}\">\n<script src=\"{}\"></script>\n</head>",
                assets.stylesheet_url, assets.script_url
            ),
        );
        let out = annotate_html(&page, &change(Some("Reason")), &config())
            .unwrap()
            .unwrap();

        assert_eq!(count(&out, &assets.stylesheet_url), 1);
        assert_eq!(count(&out, &assets.script_url), 1);
        assert_eq!(count(&out, INIT_SCRIPT_ID), 1);
    }

    #[test]
    fn only_first_content_region_is_annotated() {
        let page = docfx_page(r#"<article class="content wrap">nested</article>"#);
        let out = annotate_html(&page, &change(None), &config()).unwrap().unwrap();
        assert_eq!(count(&out, "This page was last modified at"), 1);
    }

    #[test]
    fn disabled_commit_panel_keeps_notice_only() {
        let mut cfg = config();
        cfg.commit_message.enabled = false;
        let page = docfx_page("<p>Body</p>");
        let out = annotate_html(&page, &change(Some("Reason")), &cfg)
            .unwrap()
            .unwrap();

        assert!(out.contains("This page was last modified at"));
        assert!(!out.contains("Commit Message"));
        assert!(!out.contains(INIT_SCRIPT_ID));
    }

    #[test]
    fn fragment_without_head_or_body_gets_includes_in_region() {
        let page = r#"<article class="content wrap"><p>Body</p></article>"#;
        let out = annotate_html(page, &change(Some("Reason")), &config())
            .unwrap()
            .unwrap();

        let article_end = out.find("</article>").unwrap();
        assert!(out.find(&config().assets.stylesheet_url).unwrap() < article_end);
        assert!(out.find(INIT_SCRIPT_ID).unwrap() < article_end);
    }

    #[test]
    fn custom_timestamp_format() {
        let mut cfg = config();
        cfg.timestamp_format = "%B %-d, %Y".to_string();
        let page = docfx_page("");
        let out = annotate_html(&page, &change(None), &cfg).unwrap().unwrap();
        assert!(out.contains("last modified at March 1, 2021 (UTC)."));
    }

    #[test]
    fn invalid_selector_is_error() {
        let mut cfg = config();
        cfg.content_selector = "article[[".to_string();
        let result = annotate_html(&docfx_page(""), &change(None), &cfg);
        assert!(matches!(result, Err(AnnotateError::Selector { .. })));
    }

    #[test]
    fn custom_selector() {
        let mut cfg = config();
        cfg.content_selector = "main#content".to_string();
        let page = r#"<html><head></head><body><main id="content">x</main></body></html>"#;
        let out = annotate_html(page, &change(None), &cfg).unwrap().unwrap();
        assert!(out.contains(&format!("x{NOTICE}</main>")));
    }

    #[test]
    fn missing_anchor_leaves_file_untouched() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("redirect.html");
        let page = r#"<html><head><meta http-equiv="refresh" content="0; url=intro.html"></head><body></body></html>"#;
        write_page(&path, page);

        let result = annotate(&path, &change(Some("Reason")), &config()).unwrap();

        assert_eq!(result, Annotation::MissingAnchor);
        assert!(!result.is_applied());
        assert_eq!(std::fs::read(&path).unwrap(), page.as_bytes());
    }

    #[test]
    fn annotate_writes_in_place() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("articles/intro.html");
        write_page(&path, &docfx_page("<p>Body</p>"));

        let result = annotate(&path, &change(Some("Fix typo")), &config()).unwrap();

        assert!(result.is_applied());
        let saved = std::fs::read_to_string(&path).unwrap();
        assert!(saved.contains(NOTICE));
        assert!(saved.contains("Fix typo"));
    }

    #[test]
    fn non_utf8_page_is_read_error() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("broken.html");
        std::fs::write(&path, [0x3c, 0x70, 0x3e, 0xff, 0xfe, 0xfd]).unwrap();

        let result = annotate(&path, &change(None), &config());
        assert!(matches!(result, Err(AnnotateError::Read { .. })));
    }

    #[test]
    fn missing_page_is_read_error() {
        let tmp = TempDir::new().unwrap();
        let result = annotate(&tmp.path().join("nope.html"), &change(None), &config());
        assert!(matches!(result, Err(AnnotateError::Read { .. })));
    }
}
