//! Shared types passed between the resolver, the mutator, and the pipeline.

use chrono::{DateTime, Utc};
use std::fmt;

/// Where a document's last-modified information came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChangeSource {
    /// The newest commit touching the source file (short commit id).
    History { commit: String },
    /// The source file's filesystem modification time.
    Filesystem,
}

impl fmt::Display for ChangeSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChangeSource::History { commit } => write!(f, "commit {commit}"),
            ChangeSource::Filesystem => f.write_str("filesystem"),
        }
    }
}

/// Resolved last-modified information for one source document.
///
/// `reason` is `None` when no change description exists (always the case for
/// filesystem fallbacks). `Some("")` is never produced by the resolvers but is
/// treated the same as `None` by the mutator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeInfo {
    pub modified_at: DateTime<Utc>,
    pub reason: Option<String>,
    pub source: ChangeSource,
}

impl ChangeInfo {
    /// Information from the filesystem: a timestamp and nothing else.
    pub fn from_filesystem(modified_at: DateTime<Utc>) -> Self {
        Self {
            modified_at,
            reason: None,
            source: ChangeSource::Filesystem,
        }
    }

    /// The reason text worth rendering: trimmed, and only if non-empty.
    pub fn display_reason(&self) -> Option<&str> {
        self.reason
            .as_deref()
            .map(str::trim)
            .filter(|r| !r.is_empty())
    }
}

impl fmt::Display for ChangeInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} ({})",
            self.modified_at.format("%Y-%m-%d %H:%M:%S UTC"),
            self.source
        )?;
        if let Some(reason) = self.display_reason() {
            let first_line = reason.lines().next().unwrap_or_default();
            write!(f, ": {first_line}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(y: i32, m: u32, d: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, 10, 0, 0).unwrap()
    }

    #[test]
    fn filesystem_info_has_no_reason() {
        let info = ChangeInfo::from_filesystem(at(2021, 3, 1));
        assert_eq!(info.reason, None);
        assert_eq!(info.source, ChangeSource::Filesystem);
        assert_eq!(info.display_reason(), None);
    }

    #[test]
    fn display_reason_trims() {
        let info = ChangeInfo {
            modified_at: at(2021, 3, 1),
            reason: Some("\n  Fix typo  \n\n".to_string()),
            source: ChangeSource::History {
                commit: "abc1234".to_string(),
            },
        };
        assert_eq!(info.display_reason(), Some("Fix typo"));
    }

    #[test]
    fn whitespace_reason_is_not_displayed() {
        let info = ChangeInfo {
            reason: Some("   \n\t".to_string()),
            ..ChangeInfo::from_filesystem(at(2021, 3, 1))
        };
        assert_eq!(info.display_reason(), None);
    }

    #[test]
    fn display_shows_time_source_and_subject() {
        let info = ChangeInfo {
            modified_at: at(2021, 3, 1),
            reason: Some("Fix typo\n\nLonger body".to_string()),
            source: ChangeSource::History {
                commit: "abc1234".to_string(),
            },
        };
        assert_eq!(
            info.to_string(),
            "2021-03-01 10:00:00 UTC (commit abc1234): Fix typo"
        );
    }

    #[test]
    fn display_filesystem() {
        let info = ChangeInfo::from_filesystem(at(2020, 1, 2));
        assert_eq!(info.to_string(), "2020-01-02 10:00:00 UTC (filesystem)");
    }
}
