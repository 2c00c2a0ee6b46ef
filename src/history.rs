//! Last-change lookup from git history.
//!
//! For every source document the stage wants the newest commit that changed
//! it: its committer time and its full message. The lookup is answered from
//! the repository's object database through `gix`, without shelling out.
//!
//! ## Which commit
//!
//! The walk starts at `HEAD` and moves from child to parent, so a child
//! always wins over its parent even when committer clocks disagree (a child
//! may carry an older timestamp than its parent; it is still the more recent
//! change).
//!
//! A commit changes a path when the blob at that path differs from the blob
//! in **every** parent (a root commit changes every path it contains). When
//! a commit has the same blob as one of its parents, only that parent is
//! followed. A merge that keeps one side's version therefore hides the other
//! side's edits entirely, which is the history simplification
//! `git log -1 -- <path>` applies.
//!
//! Parents and root trees of all reachable commits are loaded once when the
//! repository is opened and shared by every lookup of the run.
//!
//! ## Failure policy
//!
//! [`GitHistory::last_commit`] reports every failure as a [`HistoryError`].
//! [`GitHistory::resolve`] is what the pipeline calls: it logs failures at
//! debug level and turns them into "unresolved" so the caller falls back to
//! filesystem timestamps.

use crate::truncate::truncate;
use crate::types::{ChangeInfo, ChangeSource};
use chrono::{DateTime, FixedOffset, Utc};
use gix::ObjectId;
use gix::bstr::ByteSlice;
use std::collections::HashMap;
use std::path::{Component, Path, PathBuf};
use thiserror::Error;

/// Length of the abbreviated commit id kept for diagnostics.
const SHORT_ID_LEN: usize = 7;

#[derive(Error, Debug)]
pub enum HistoryError {
    #[error("no git repository at or above {path}: {source}")]
    Discover {
        path: PathBuf,
        #[source]
        source: Box<gix::discover::Error>,
    },
    #[error("repository {0} has no work tree")]
    Bare(PathBuf),
    #[error("{path} is outside the repository work tree {root}")]
    OutsideRepository { path: PathBuf, root: PathBuf },
    #[error("cannot resolve {path}: {source}")]
    Path {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("commit {commit} has an out-of-range timestamp")]
    InvalidTime { commit: String },
    #[error("git query failed: {0}")]
    Query(#[source] Box<dyn std::error::Error + Send + Sync + 'static>),
}

fn query_error<E>(err: E) -> HistoryError
where
    E: std::error::Error + Send + Sync + 'static,
{
    HistoryError::Query(Box::new(err))
}

/// The newest commit touching a file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitInfo {
    /// Abbreviated commit id.
    pub id: String,
    /// Committer time in the committer's own offset.
    pub committed_at: DateTime<FixedOffset>,
    /// Full, untruncated commit message.
    pub message: String,
}

impl CommitInfo {
    /// Convert to pipeline form: UTC time, message trimmed and cut to
    /// `max_len` alphanumeric characters, blank messages dropped.
    pub fn into_change_info(self, max_len: usize) -> ChangeInfo {
        let message = self.message.trim();
        let reason = (!message.is_empty()).then(|| truncate(message, max_len));
        ChangeInfo {
            modified_at: self.committed_at.with_timezone(&Utc),
            reason,
            source: ChangeSource::History { commit: self.id },
        }
    }
}

/// An opened repository plus the commit graph reachable from `HEAD`.
///
/// Read-only after [`discover`](Self::discover); lookups from several
/// threads share one instance.
pub struct GitHistory {
    repo: gix::ThreadSafeRepository,
    root: PathBuf,
    head: ObjectId,
    graph: CommitGraph,
}

impl std::fmt::Debug for GitHistory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GitHistory")
            .field("root", &self.root)
            .field("head", &self.head)
            .field("commits", &self.graph.parents.len())
            .finish()
    }
}

impl GitHistory {
    /// Find the repository enclosing `start` by walking up its ancestors.
    pub fn discover(start: &Path) -> Result<Self, HistoryError> {
        let repo = gix::discover(start).map_err(|source| HistoryError::Discover {
            path: start.to_path_buf(),
            source: Box::new(source),
        })?;
        let work_dir = repo
            .work_dir()
            .ok_or_else(|| HistoryError::Bare(repo.git_dir().to_path_buf()))?;
        let root = work_dir.canonicalize().map_err(|source| HistoryError::Path {
            path: work_dir.to_path_buf(),
            source,
        })?;

        let head = repo.head_id().map_err(query_error)?.detach();
        let graph = CommitGraph::load(&repo, head)?;
        tracing::debug!(
            root = %root.display(),
            commits = graph.parents.len(),
            "Opened git repository"
        );

        Ok(Self {
            repo: repo.into_sync(),
            root,
            head,
            graph,
        })
    }

    /// Canonical work-tree root.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Number of commits reachable from `HEAD`.
    pub fn commit_count(&self) -> usize {
        self.graph.parents.len()
    }

    /// The newest commit that changed `source`, or `None` if no commit
    /// touches it (e.g. an untracked file).
    ///
    /// Walks from `HEAD` towards the roots. A commit whose blob at the path
    /// matches one of its parents' is not a change, and only that parent's
    /// line is followed: side branches whose edits a merge threw away are
    /// never visited.
    pub fn last_commit(&self, source: &Path) -> Result<Option<CommitInfo>, HistoryError> {
        let relative = self.relative_path(source)?;
        let repo = self.repo.to_thread_local();
        let mut blobs = HashMap::new();
        let mut id = self.head;

        loop {
            let current = self.blob_at(&repo, id, &relative, &mut blobs)?;
            let parents = self.graph.parents_of(id);
            if parents.is_empty() {
                return match current {
                    Some(_) => commit_info(&repo, id).map(Some),
                    None => Ok(None),
                };
            }

            let mut same = None;
            for &parent in parents {
                if self.blob_at(&repo, parent, &relative, &mut blobs)? == current {
                    same = Some(parent);
                    break;
                }
            }
            match same {
                Some(parent) => id = parent,
                None => return commit_info(&repo, id).map(Some),
            }
        }
    }

    /// Last-change info for `source`, or `None` when history can't tell.
    ///
    /// Never fails: lookup errors are logged at debug level and reported as
    /// unresolved so the caller can fall back.
    pub fn resolve(&self, source: &Path, max_len: usize) -> Option<ChangeInfo> {
        match self.last_commit(source) {
            Ok(Some(commit)) => {
                tracing::trace!(path = %source.display(), commit = %commit.id, "Resolved from history");
                Some(commit.into_change_info(max_len))
            }
            Ok(None) => {
                tracing::debug!(path = %source.display(), "No commits touch this file");
                None
            }
            Err(e) => {
                tracing::debug!(path = %source.display(), error = %e, "History lookup failed");
                None
            }
        }
    }

    /// Blob id at `path` in `commit`, memoized per lookup. Tree ids come
    /// from the graph, so commits are never re-parsed.
    fn blob_at(
        &self,
        repo: &gix::Repository,
        commit: ObjectId,
        path: &str,
        cache: &mut HashMap<ObjectId, Option<ObjectId>>,
    ) -> Result<Option<ObjectId>, HistoryError> {
        if let Some(hit) = cache.get(&commit) {
            return Ok(*hit);
        }
        let tree_id = self
            .graph
            .trees
            .get(&commit)
            .copied()
            .ok_or_else(|| query_error(MissingCommit(commit)))?;
        let tree = repo.find_tree(tree_id).map_err(query_error)?;
        let blob = tree
            .lookup_entry_by_path(path)
            .map_err(query_error)?
            .map(|entry| entry.object_id());
        cache.insert(commit, blob);
        Ok(blob)
    }

    /// Path of `source` relative to the work tree, `/`-separated.
    fn relative_path(&self, source: &Path) -> Result<String, HistoryError> {
        let absolute = source.canonicalize().map_err(|e| HistoryError::Path {
            path: source.to_path_buf(),
            source: e,
        })?;
        let outside = || HistoryError::OutsideRepository {
            path: absolute.clone(),
            root: self.root.clone(),
        };
        let relative = absolute.strip_prefix(&self.root).map_err(|_| outside())?;

        let parts: Vec<String> = relative
            .components()
            .filter_map(|c| match c {
                Component::Normal(part) => Some(part.to_string_lossy().into_owned()),
                _ => None,
            })
            .collect();
        if parts.is_empty() {
            return Err(outside());
        }
        Ok(parts.join("/"))
    }
}

/// One-shot lookup: open the repository at or above `repo_root`, query
/// `source`, release the repository.
///
/// Open failures are logged at debug level and reported as unresolved.
/// Prefer [`GitHistory::discover`] + [`GitHistory::resolve`] when looking up
/// many files; this re-walks the commit graph on every call.
pub fn resolve(repo_root: &Path, source: &Path, max_len: usize) -> Option<ChangeInfo> {
    match GitHistory::discover(repo_root) {
        Ok(history) => history.resolve(source, max_len),
        Err(e) => {
            tracing::debug!(path = %repo_root.display(), error = %e, "Cannot open repository");
            None
        }
    }
}

#[derive(Debug, Error)]
#[error("commit {0} is not part of the loaded history")]
struct MissingCommit(ObjectId);

/// Parents and root tree of every commit reachable from `HEAD`, loaded once
/// per run.
///
/// Parents missing from the object database (shallow clones) are dropped,
/// making the shallow boundary behave like a root commit.
#[derive(Debug, Default)]
struct CommitGraph {
    parents: HashMap<ObjectId, Vec<ObjectId>>,
    trees: HashMap<ObjectId, ObjectId>,
}

impl CommitGraph {
    fn load(repo: &gix::Repository, head: ObjectId) -> Result<Self, HistoryError> {
        let mut graph = CommitGraph::default();
        let mut pending = vec![head];

        while let Some(id) = pending.pop() {
            if graph.parents.contains_key(&id) {
                continue;
            }
            let commit = repo.find_commit(id).map_err(query_error)?;
            let tree = commit.tree_id().map_err(query_error)?.detach();
            let ids: Vec<ObjectId> = commit
                .parent_ids()
                .map(|p| p.detach())
                .filter(|p| {
                    let present = repo.has_object(p);
                    if !present {
                        tracing::debug!(commit = %p, "Parent commit missing (shallow clone?)");
                    }
                    present
                })
                .collect();
            pending.extend(ids.iter().copied());
            graph.trees.insert(id, tree);
            graph.parents.insert(id, ids);
        }
        Ok(graph)
    }

    fn parents_of(&self, id: ObjectId) -> &[ObjectId] {
        self.parents.get(&id).map(Vec::as_slice).unwrap_or_default()
    }
}

fn commit_info(repo: &gix::Repository, id: ObjectId) -> Result<CommitInfo, HistoryError> {
    let commit = repo.find_commit(id).map_err(query_error)?;
    let time = commit.time().map_err(query_error)?;
    let short_id = id.to_hex_with_len(SHORT_ID_LEN).to_string();

    let invalid = || HistoryError::InvalidTime {
        commit: short_id.clone(),
    };
    let offset = FixedOffset::east_opt(time.offset).ok_or_else(invalid)?;
    let committed_at = DateTime::from_timestamp(time.seconds, 0)
        .ok_or_else(invalid)?
        .with_timezone(&offset);

    Ok(CommitInfo {
        id: short_id.clone(),
        committed_at,
        message: commit.message_raw_sloppy().to_str_lossy().into_owned(),
    })
}
