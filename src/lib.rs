//! # doc-lastmod
//!
//! A post-processing stage for static documentation builds. After the
//! generator has rendered every page, doc-lastmod appends a "last modified"
//! notice to each conceptual article, using the newest git commit that
//! touched the article's source file, and shows that commit's message in a
//! collapsible panel.
//!
//! # Architecture: One Pass Per Document
//!
//! ```text
//! manifest.json ─► pipeline ─► per output file (in parallel):
//!                                 1. history    newest commit touching the source
//!                                 2. timestamp  file mtime if history can't tell
//!                                 3. annotate   append notice to the page, save
//!                              ─► RunSummary (annotated / skipped / failed)
//! ```
//!
//! Documents never share mutable state. The repository is opened once per
//! run and queried read-only from every worker; the run's totals are folded
//! from per-document reports rather than kept in a shared counter.
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`truncate`] | Bounds commit messages by alphanumeric character count |
//! | [`history`] | Git repository discovery and per-file last-change lookup (gix) |
//! | [`timestamp`] | Filesystem modification time fallback |
//! | [`annotate`] | Streaming HTML rewrite: notice, commit panel, script/style includes |
//! | [`pipeline`] | Walks the manifest, chains resolvers, drives the mutator, builds the summary |
//! | [`stage`] | `PostProcessor` trait and the host-owned `StageRegistry` |
//! | [`manifest`] | The generator's `manifest.json` |
//! | [`config`] | `lastmod.toml` loading and validation |
//! | [`types`] | `ChangeInfo` and `ChangeSource`, shared by resolvers and mutator |
//! | [`output`] | CLI report formatting |
//!
//! # Design Decisions
//!
//! ## Streaming Rewrite, Not Re-serialization
//!
//! Pages are rewritten with [lol_html](https://docs.rs/lol_html): content is
//! appended at the end of the matched element and every other byte passes
//! through untouched. Parsing into a DOM and serializing back would normalize
//! whitespace, attribute quoting and entity encoding across the whole page,
//! turning a one-paragraph change into a full-file diff.
//!
//! ## Git Without a `git` Binary
//!
//! History is read with [gix](https://docs.rs/gix). Lookups walk from `HEAD`
//! towards the roots with the same simplification as `git log -1 -- <path>`:
//! children before parents, so a commit with a skewed clock can never hide
//! its own descendant's change, and side branches whose edits a merge
//! discarded are never reported.
//!
//! ## Maud for Injected Markup
//!
//! The notice and panel are rendered with [Maud](https://maud.lambda.xyz/).
//! Commit messages are user-controlled text; Maud escapes every interpolation,
//! so a message containing `</article>` shows up as text instead of breaking
//! the page.
//!
//! ## Fallback Without a Panel
//!
//! When history can't date a source (untracked file, no repository, shallow
//! clone that stops before the change) the file's modification time is used.
//! There is no commit message in that case, so no panel is rendered and no
//! script is injected.

pub mod annotate;
pub mod config;
pub mod history;
pub mod manifest;
pub mod output;
pub mod pipeline;
pub mod stage;
pub mod timestamp;
pub mod truncate;
pub mod types;

#[cfg(test)]
pub(crate) mod test_helpers;
