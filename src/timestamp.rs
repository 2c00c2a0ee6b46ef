//! Filesystem fallback for documents without version-control history.

use chrono::{DateTime, Utc};
use std::io;
use std::path::Path;

/// Last-write time of `path`, in UTC.
///
/// The pipeline only calls this for source files listed in the manifest, so
/// the file is expected to exist; an error here means the manifest and the
/// source tree disagree.
pub fn fallback_timestamp(path: &Path) -> io::Result<DateTime<Utc>> {
    let modified = std::fs::metadata(path)?.modified()?;
    Ok(DateTime::<Utc>::from(modified))
}
