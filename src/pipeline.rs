//! Drives the stage over a whole build.
//!
//! For every output file of every manifest entry of the configured document
//! type, the orchestrator resolves a [`ChangeInfo`] and hands it to the
//! [`annotate`](crate::annotate) mutator:
//!
//! ```text
//! manifest entry ──► source path ──► git history ──(unresolved)──► file mtime
//!                                         │                            │
//!                                         └──────────► ChangeInfo ◄────┘
//!                                                          │
//!                              output path ──► annotate ◄──┘
//! ```
//!
//! ## Failure policy
//!
//! Only structural problems abort a run (output folder missing or not a
//! directory). Everything per-document is logged and counted:
//!
//! | Situation | Log level | Counted as |
//! |-----------|-----------|------------|
//! | No commit touches the source | `debug` | `from_filesystem` |
//! | No repository at all | `info` (once) | `from_filesystem` |
//! | Page has no content region | `debug` | `skipped` |
//! | Page unreadable / not UTF-8 / source missing | `error` | `failed` |
//!
//! ## Parallelism
//!
//! Documents are independent, so they run on the global rayon pool (sized by
//! the binary from `processing.max_processes`). The repository is opened once
//! and shared read-only; the [`RunSummary`] is folded from per-document
//! reports after the parallel section, in manifest order.

use crate::annotate::{Annotation, annotate};
use crate::config::LastModifiedConfig;
use crate::history::GitHistory;
use crate::manifest::Manifest;
use crate::timestamp::fallback_timestamp;
use crate::types::{ChangeInfo, ChangeSource};
use rayon::prelude::*;
use std::fmt;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("output folder not found: {0}")]
    OutputFolderMissing(PathBuf),
    #[error("output path is not a directory: {0}")]
    NotADirectory(PathBuf),
}

/// One output file to stamp.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Job {
    /// Source document the page was generated from.
    pub source: PathBuf,
    /// Output path as listed in the manifest, relative to the output folder.
    pub relative_output: String,
    /// Absolute (or output-folder-joined) page path.
    pub output: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Annotated,
    /// Page has no content region.
    Skipped,
    Failed(String),
}

/// What happened to a single output file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentReport {
    pub relative_output: String,
    /// `None` when resolution itself failed (source missing).
    pub change: Option<ChangeInfo>,
    pub outcome: Outcome,
}

/// Totals for one run, plus the per-document reports in manifest order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub annotated: usize,
    pub skipped: usize,
    pub failed: usize,
    pub from_history: usize,
    pub from_filesystem: usize,
    pub documents: Vec<DocumentReport>,
}

impl RunSummary {
    fn record(&mut self, report: DocumentReport) {
        match report.outcome {
            Outcome::Annotated => self.annotated += 1,
            Outcome::Skipped => self.skipped += 1,
            Outcome::Failed(_) => self.failed += 1,
        }
        match report.change.as_ref().map(|c| &c.source) {
            Some(ChangeSource::History { .. }) => self.from_history += 1,
            Some(ChangeSource::Filesystem) => self.from_filesystem += 1,
            None => {}
        }
        self.documents.push(report);
    }

    /// Output files looked at (annotated + skipped + failed).
    pub fn processed(&self) -> usize {
        self.documents.len()
    }
}

impl FromIterator<DocumentReport> for RunSummary {
    fn from_iter<I: IntoIterator<Item = DocumentReport>>(iter: I) -> Self {
        let mut summary = RunSummary::default();
        for report in iter {
            summary.record(report);
        }
        summary
    }
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} annotated, {} skipped, {} failed ({} from history, {} from filesystem)",
            self.annotated, self.skipped, self.failed, self.from_history, self.from_filesystem
        )
    }
}

/// The last-modified post-processing stage.
#[derive(Debug, Clone, Default)]
pub struct LastModifiedStage {
    config: LastModifiedConfig,
}

impl LastModifiedStage {
    pub fn new(config: LastModifiedConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &LastModifiedConfig {
        &self.config
    }

    /// Output files this stage would touch, in manifest order.
    pub fn plan(&self, manifest: &Manifest, output_folder: &Path) -> Vec<Job> {
        manifest
            .items_of_type(&self.config.document_type)
            .flat_map(|item| {
                let source = manifest.source_path(item);
                item.output.values().map(move |file| Job {
                    source: source.clone(),
                    relative_output: file.relative_path.clone(),
                    output: output_folder.join(&file.relative_path),
                })
            })
            .collect()
    }

    /// Stamp every planned output file.
    pub fn run(&self, manifest: &Manifest, output_folder: &Path) -> Result<RunSummary, PipelineError> {
        tracing::info!("Version: {}", version_banner());
        check_output_folder(output_folder)?;
        tracing::info!("Begin adding last modified date to items...");

        let history = open_history(&manifest.source_base_path);
        let jobs = self.plan(manifest, output_folder);
        tracing::debug!(documents = jobs.len(), "Planned output files");

        let reports: Vec<DocumentReport> = jobs
            .par_iter()
            .map(|job| process_document(job, history.as_ref(), &self.config))
            .collect();
        let summary: RunSummary = reports.into_iter().collect();

        tracing::info!(
            "Added modification date to {} {} articles.",
            summary.annotated,
            self.config.document_type.to_lowercase()
        );
        tracing::debug!(%summary, "Run complete");
        Ok(summary)
    }

    /// Everything [`run`](Self::run) would do, without touching any page.
    pub fn check(&self, manifest: &Manifest, output_folder: &Path) -> Result<CheckReport, PipelineError> {
        check_output_folder(output_folder)?;
        let repository = open_history(&manifest.source_base_path).map(|h| RepositoryInfo {
            root: h.root().to_path_buf(),
            commits: h.commit_count(),
        });
        let documents = self
            .plan(manifest, output_folder)
            .into_iter()
            .map(|job| PlannedDocument {
                source_exists: job.source.is_file(),
                output_exists: job.output.is_file(),
                job,
            })
            .collect();
        Ok(CheckReport {
            repository,
            documents,
        })
    }
}

/// Where history comes from for a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepositoryInfo {
    pub root: PathBuf,
    pub commits: usize,
}

/// A planned output file and whether its inputs are in place.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedDocument {
    pub job: Job,
    pub source_exists: bool,
    pub output_exists: bool,
}

/// Dry-run result of [`LastModifiedStage::check`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckReport {
    pub repository: Option<RepositoryInfo>,
    pub documents: Vec<PlannedDocument>,
}

impl CheckReport {
    /// Documents whose source or output file is missing.
    pub fn problems(&self) -> usize {
        self.documents
            .iter()
            .filter(|d| !d.source_exists || !d.output_exists)
            .count()
    }
}

/// Crate version plus the commit it was built from, e.g. `0.3.0 (abc1234)`.
pub fn version_banner() -> String {
    match option_env!("DOC_LASTMOD_GIT_HASH") {
        Some(hash) if !hash.is_empty() => format!("{} ({hash})", env!("CARGO_PKG_VERSION")),
        _ => env!("CARGO_PKG_VERSION").to_string(),
    }
}

fn check_output_folder(output_folder: &Path) -> Result<(), PipelineError> {
    if !output_folder.exists() {
        return Err(PipelineError::OutputFolderMissing(output_folder.to_path_buf()));
    }
    if !output_folder.is_dir() {
        return Err(PipelineError::NotADirectory(output_folder.to_path_buf()));
    }
    Ok(())
}

/// Open the repository enclosing the sources, if any.
pub fn open_history(source_base: &Path) -> Option<GitHistory> {
    match GitHistory::discover(source_base) {
        Ok(history) => Some(history),
        Err(e) => {
            tracing::info!(
                path = %source_base.display(),
                reason = %e,
                "No git history available, using file modification times"
            );
            None
        }
    }
}

/// History first, then the source file's modification time.
///
/// Fails only when the fallback can't read the source file either.
pub fn resolve_change(
    history: Option<&GitHistory>,
    source: &Path,
    max_len: usize,
) -> std::io::Result<ChangeInfo> {
    if let Some(change) = history.and_then(|h| h.resolve(source, max_len)) {
        return Ok(change);
    }
    tracing::debug!(
        path = %source.display(),
        "Failed to fetch commit date, falling back to file write time"
    );
    fallback_timestamp(source).map(ChangeInfo::from_filesystem)
}

fn process_document(
    job: &Job,
    history: Option<&GitHistory>,
    config: &LastModifiedConfig,
) -> DocumentReport {
    let change = match resolve_change(history, &job.source, config.commit_message.max_length) {
        Ok(change) => change,
        Err(e) => {
            tracing::error!(
                source = %job.source.display(),
                output = %job.relative_output,
                error = %e,
                "Cannot determine modification date"
            );
            return DocumentReport {
                relative_output: job.relative_output.clone(),
                change: None,
                outcome: Outcome::Failed(e.to_string()),
            };
        }
    };

    tracing::debug!(
        output = %job.relative_output,
        source = %job.source.display(),
        %change,
        "Writing modification date"
    );

    let outcome = match annotate(&job.output, &change, config) {
        Ok(Annotation::Applied) => Outcome::Annotated,
        Ok(Annotation::MissingAnchor) => Outcome::Skipped,
        Err(e) => {
            tracing::error!(output = %job.relative_output, error = %e, "Cannot annotate page");
            Outcome::Failed(e.to_string())
        }
    };

    DocumentReport {
        relative_output: job.relative_output.clone(),
        change: Some(change),
        outcome,
    }
}
