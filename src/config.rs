//! Stage configuration.
//!
//! Handles loading and validating `lastmod.toml`. Every key is optional; stock
//! defaults reproduce the classic DocFX behaviour (conceptual articles only,
//! `article.content.wrap` as the content region, commit messages capped at
//! 300 alphanumeric characters).
//!
//! ## Configuration Options
//!
//! ```toml
//! # All options are optional - defaults shown below
//!
//! document_type = "Conceptual"                   # Manifest entries to stamp
//! content_selector = 'article[class*="content wrap"]'
//! timestamp_format = "%Y-%m-%d %H:%M:%S"         # chrono strftime, always UTC
//!
//! [commit_message]
//! enabled = true          # Render the collapsible commit-message panel
//! max_length = 300        # Alphanumeric characters, ellipsis included
//!
//! [assets]
//! script_url = "https://cdn.rawgit.com/jordnkr/collapsible/master/jquery.collapsible.min.js"
//! stylesheet_url = "https://cdn.rawgit.com/jordnkr/collapsible/master/collapsible.css"
//!
//! [processing]
//! max_processes = 4       # Max parallel workers (omit for auto = CPU cores)
//! ```
//!
//! Unknown keys are rejected to catch typos early.

use crate::truncate::ELLIPSIS;
use chrono::format::{Item, StrftimeItems};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use thiserror::Error;

/// Name of the config file looked up by [`load_config`].
pub const CONFIG_FILENAME: &str = "lastmod.toml";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("Config validation error: {0}")]
    Validation(String),
}

/// Configuration for the last-modified stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LastModifiedConfig {
    /// Manifest document type that gets stamped; everything else is skipped.
    pub document_type: String,
    /// CSS selector for the page's main content container.
    pub content_selector: String,
    /// `strftime` pattern for the notice. Rendered in UTC.
    pub timestamp_format: String,
    /// Commit-message panel settings.
    pub commit_message: CommitMessageConfig,
    /// Script and stylesheet backing the collapsible panel.
    pub assets: AssetsConfig,
    /// Parallel processing settings.
    pub processing: ProcessingConfig,
}

impl Default for LastModifiedConfig {
    fn default() -> Self {
        Self {
            document_type: "Conceptual".to_string(),
            content_selector: r#"article[class*="content wrap"]"#.to_string(),
            timestamp_format: "%Y-%m-%d %H:%M:%S".to_string(),
            commit_message: CommitMessageConfig::default(),
            assets: AssetsConfig::default(),
            processing: ProcessingConfig::default(),
        }
    }
}

impl LastModifiedConfig {
    /// Validate config values are usable before any document is touched.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.document_type.trim().is_empty() {
            return Err(ConfigError::Validation(
                "document_type must not be empty".into(),
            ));
        }
        if let Err(e) = self.content_selector.parse::<lol_html::Selector>() {
            return Err(ConfigError::Validation(format!(
                "content_selector {:?} is not a supported CSS selector: {e}",
                self.content_selector
            )));
        }
        if StrftimeItems::new(&self.timestamp_format).any(|item| matches!(item, Item::Error)) {
            return Err(ConfigError::Validation(format!(
                "timestamp_format {:?} is not a valid strftime pattern",
                self.timestamp_format
            )));
        }
        if self.commit_message.max_length <= ELLIPSIS.len() {
            return Err(ConfigError::Validation(format!(
                "commit_message.max_length must be greater than {}",
                ELLIPSIS.len()
            )));
        }
        if self.assets.script_url.trim().is_empty() || self.assets.stylesheet_url.trim().is_empty()
        {
            return Err(ConfigError::Validation(
                "assets.script_url and assets.stylesheet_url must not be empty".into(),
            ));
        }
        Ok(())
    }
}

/// Commit-message panel settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CommitMessageConfig {
    /// When false, pages only get the last-modified line.
    pub enabled: bool,
    /// Maximum alphanumeric characters kept from the commit message.
    pub max_length: usize,
}

impl Default for CommitMessageConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_length: 300,
        }
    }
}

/// External assets for the collapsible panel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AssetsConfig {
    /// jQuery plugin providing `.collapsible()`.
    pub script_url: String,
    /// Stylesheet for the collapsible panel.
    pub stylesheet_url: String,
}

impl Default for AssetsConfig {
    fn default() -> Self {
        Self {
            script_url: "https://cdn.rawgit.com/jordnkr/collapsible/master/jquery.collapsible.min.js"
                .to_string(),
            stylesheet_url: "https://cdn.rawgit.com/jordnkr/collapsible/master/collapsible.css"
                .to_string(),
        }
    }
}

/// Parallel processing settings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProcessingConfig {
    /// Maximum number of documents processed in parallel.
    /// When absent, defaults to the number of CPU cores.
    /// Values larger than the core count are clamped down.
    pub max_processes: Option<usize>,
}

/// Resolve the effective thread count from config.
///
/// - `None` → use all available cores
/// - `Some(n)` → use `min(n, cores)`, never less than one
pub fn effective_threads(config: &ProcessingConfig) -> usize {
    let cores = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1);
    config
        .max_processes
        .map(|n| n.clamp(1, cores))
        .unwrap_or(cores)
}

/// Parse and validate config from TOML text.
pub fn parse_config(content: &str) -> Result<LastModifiedConfig, ConfigError> {
    let config: LastModifiedConfig = toml::from_str(content)?;
    config.validate()?;
    Ok(config)
}

/// Load config from a specific file.
pub fn load_config_file(path: &Path) -> Result<LastModifiedConfig, ConfigError> {
    let content = fs::read_to_string(path)?;
    parse_config(&content)
}

/// Load `lastmod.toml` from the given directory.
///
/// Returns stock defaults if the file doesn't exist. Returns `Err` if it
/// exists but is invalid TOML, has unknown keys, or fails validation.
pub fn load_config(dir: &Path) -> Result<LastModifiedConfig, ConfigError> {
    let path = dir.join(CONFIG_FILENAME);
    if !path.exists() {
        let config = LastModifiedConfig::default();
        config.validate()?;
        return Ok(config);
    }
    load_config_file(&path)
}

/// Returns a fully-commented stock `lastmod.toml` with all keys and explanations.
///
/// Used by the `gen-config` CLI command.
pub fn stock_config_toml() -> &'static str {
    r##"# doc-lastmod configuration
# ========================
# All settings are optional. Remove or comment out any you don't need.
# Values shown below are the defaults. Unknown keys cause an error.

# Manifest document type to stamp. Other types (API reference, TOC, ...)
# are left untouched.
document_type = "Conceptual"

# CSS selector for the page's main content container. The notice is appended
# to the first match; pages without a match are skipped.
content_selector = 'article[class*="content wrap"]'

# chrono strftime pattern for the notice. Always rendered in UTC.
timestamp_format = "%Y-%m-%d %H:%M:%S"

# ---------------------------------------------------------------------------
# Commit message panel
# ---------------------------------------------------------------------------
[commit_message]
# Render the latest commit message in a collapsible panel below the notice.
enabled = true

# Longer messages are cut to this many alphanumeric characters
# (ellipsis included).
max_length = 300

# ---------------------------------------------------------------------------
# Collapsible panel assets (injected once per page)
# ---------------------------------------------------------------------------
[assets]
script_url = "https://cdn.rawgit.com/jordnkr/collapsible/master/jquery.collapsible.min.js"
stylesheet_url = "https://cdn.rawgit.com/jordnkr/collapsible/master/collapsible.css"

# ---------------------------------------------------------------------------
# Processing
# ---------------------------------------------------------------------------
[processing]
# Maximum documents processed in parallel.
# Omit or comment out to auto-detect (= number of CPU cores).
# max_processes = 4
"##
}
