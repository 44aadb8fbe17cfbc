//! Read-only query surface over the version-control backend.
//!
//! Everything the site needs from a repository goes through [`Backend`]. Raw
//! backend output is turned into [`Commit`], [`FileEntry`] and [`DiffStat`]
//! records at this boundary; the rest of the crate never sees backend types.

use std::fmt::Display;
use std::path::PathBuf;

use thiserror::Error;

use crate::patch;

#[derive(Debug, Error)]
pub enum BackendError {
    #[error("failed to open repository {path:?}: {message}")]
    Open { path: PathBuf, message: String },
    #[error("{context}: {message}")]
    Query { context: String, message: String },
    #[error("malformed {shape} at line {line}: {text:?}")]
    Malformed {
        shape: &'static str,
        line: usize,
        text: String,
    },
    #[error("unknown branch {0:?}")]
    UnknownBranch(String),
    #[error("unknown object {0:?}")]
    UnknownObject(String),
}

/// Wraps any backend failure into a [`BackendError::Query`] tagged with what was
/// being asked for, for use with `map_err`.
pub fn query<E: Display>(context: impl Into<String>) -> impl FnOnce(E) -> BackendError {
    let context = context.into();
    move |error| BackendError::Query {
        context,
        message: error.to_string(),
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Signature {
    pub name: String,
    pub email: String,
}

/// Commit metadata. The file tree is fetched separately with [`Backend::tree`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Commit {
    pub id: String,
    /// Empty for a root commit, two or more for a merge.
    pub parents: Vec<String>,
    pub author: Signature,
    pub committer: Signature,
    /// Committer time in seconds since the unix epoch, UTC.
    pub time: i64,
    /// First line of the log message.
    pub summary: String,
    pub message: String,
}

impl Commit {
    pub fn short_id(&self) -> &str {
        short_id(&self.id)
    }
}

pub fn short_id(id: &str) -> &str {
    id.get(..7).unwrap_or(id)
}

/// A blob at a path in one commit's tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileEntry {
    /// Slash separated path relative to the repository root.
    pub path: String,
    /// Content hash of the blob.
    pub hash: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiffStat {
    pub path: String,
    pub insertions: usize,
    pub deletions: usize,
}

pub trait Backend {
    /// Branch names, in the backend's enumeration order.
    fn list_branches(&self) -> Result<Vec<String>, BackendError>;

    /// Raw graph rows for a branch, youngest commit first. Each row is a run of
    /// graph glyphs optionally followed by the id of the commit on that row.
    ///
    /// The rows are returned whole rather than streamed: lane layout needs the
    /// complete ancestry of the tip before the first row can be drawn.
    fn commit_graph(&self, branch: &str) -> Result<Vec<String>, BackendError>;

    fn metadata(&self, id: &str) -> Result<Commit, BackendError>;

    /// Full recursive listing of a commit's blobs, path sorted.
    fn tree(&self, id: &str) -> Result<Vec<FileEntry>, BackendError>;

    /// Unified diff from `parent` to `id`, one `diff --git` section per file.
    fn diff_patch(&self, parent: &str, id: &str) -> Result<String, BackendError>;

    fn diff_stat(&self, parent: &str, id: &str) -> Result<Vec<DiffStat>, BackendError> {
        patch::stats(&self.diff_patch(parent, id)?)
    }

    fn blob(&self, hash: &str) -> Result<Vec<u8>, BackendError>;
}
