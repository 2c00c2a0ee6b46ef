//! Post-processor seam.
//!
//! A host (the CLI, or a larger build tool embedding this crate) owns a
//! [`StageRegistry`] and registers the post-processors it wants, in the order
//! they should run. Nothing registers itself: what runs is exactly what the
//! host put in the registry.

use crate::manifest::Manifest;
use crate::pipeline::{LastModifiedStage, PipelineError, RunSummary};
use std::path::Path;

/// A step that runs over a finished documentation build.
pub trait PostProcessor: Sync {
    /// Short identifier used in logs and reports.
    fn name(&self) -> &str;

    /// Process the build described by `manifest`, whose pages live in
    /// `output_folder`.
    fn process(&self, manifest: &Manifest, output_folder: &Path) -> Result<RunSummary, PipelineError>;
}

impl PostProcessor for LastModifiedStage {
    fn name(&self) -> &str {
        "last-modified"
    }

    fn process(&self, manifest: &Manifest, output_folder: &Path) -> Result<RunSummary, PipelineError> {
        self.run(manifest, output_folder)
    }
}

/// Ordered set of post-processors.
#[derive(Default)]
pub struct StageRegistry {
    stages: Vec<Box<dyn PostProcessor>>,
}

impl StageRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, stage: impl PostProcessor + 'static) -> &mut Self {
        self.stages.push(Box::new(stage));
        self
    }

    pub fn names(&self) -> Vec<&str> {
        self.stages.iter().map(|s| s.name()).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    /// Run every stage in registration order. Stops at the first stage that
    /// fails structurally; per-document failures live in each summary.
    pub fn run(
        &self,
        manifest: &Manifest,
        output_folder: &Path,
    ) -> Result<Vec<(String, RunSummary)>, PipelineError> {
        let mut results = Vec::with_capacity(self.stages.len());
        for stage in &self.stages {
            tracing::debug!(stage = stage.name(), "Running post-processor");
            let summary = stage.process(manifest, output_folder)?;
            results.push((stage.name().to_string(), summary));
        }
        Ok(results)
    }
}

impl std::fmt::Debug for StageRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StageRegistry")
            .field("stages", &self.names())
            .finish()
    }
}
