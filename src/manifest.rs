//! The documentation generator's build manifest.
//!
//! DocFX writes `manifest.json` into the output folder after a build. Only
//! the parts this stage needs are modelled; unknown keys are ignored so newer
//! generator versions keep working.
//!
//! ```json
//! {
//!   "source_base_path": "/repo/docs",
//!   "files": [
//!     {
//!       "type": "Conceptual",
//!       "source_relative_path": "articles/intro.md",
//!       "output": { ".html": { "relative_path": "articles/intro.html" } }
//!     }
//!   ]
//! }
//! ```

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Conventional manifest file name inside the output folder.
pub const MANIFEST_FILENAME: &str = "manifest.json";

#[derive(Error, Debug)]
pub enum ManifestError {
    #[error("cannot read manifest {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid manifest {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Manifest {
    /// Directory that `source_relative_path` entries are relative to.
    pub source_base_path: PathBuf,
    #[serde(default)]
    pub files: Vec<ManifestItem>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManifestItem {
    #[serde(rename = "type")]
    pub document_type: String,
    pub source_relative_path: String,
    /// Output files keyed by extension (`.html`, `.json`, ...).
    #[serde(default)]
    pub output: BTreeMap<String, OutputFile>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputFile {
    pub relative_path: String,
}

impl Manifest {
    /// Load a manifest from disk.
    ///
    /// A relative `source_base_path` is resolved against the manifest's own
    /// directory so the result never depends on the working directory.
    pub fn load(path: &Path) -> Result<Self, ManifestError> {
        let content = std::fs::read_to_string(path).map_err(|source| ManifestError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let mut manifest: Manifest =
            serde_json::from_str(&content).map_err(|source| ManifestError::Json {
                path: path.to_path_buf(),
                source,
            })?;
        if manifest.source_base_path.is_relative() {
            let base = path.parent().unwrap_or_else(|| Path::new("."));
            manifest.source_base_path = base.join(&manifest.source_base_path);
        }
        Ok(manifest)
    }

    /// Items of the given document type, in manifest order.
    pub fn items_of_type<'a>(
        &'a self,
        document_type: &'a str,
    ) -> impl Iterator<Item = &'a ManifestItem> + 'a {
        self.files
            .iter()
            .filter(move |item| item.document_type == document_type)
    }

    /// Absolute path of an item's source file.
    pub fn source_path(&self, item: &ManifestItem) -> PathBuf {
        self.source_base_path.join(&item.source_relative_path)
    }
}
