//! Content-addressable store of rendered blob pages.
//!
//! Every distinct blob hash is rendered once into `objects/<xx>/<hash>`,
//! where `xx` is the first two characters of the hash. Commit directories
//! hold hard links to the stored page instead of copies. Stored pages are
//! read-only and never rewritten; their presence on disk is the cache, so the
//! render-once guarantee spans runs.
//!
//! Creation goes through a staging file that is moved into place with
//! `RENAME_NOREPLACE`, so two writers racing on the same hash cannot both
//! publish a page.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Context as _;
use nix::errno::Errno;
use nix::fcntl::{OFlag, RenameFlags, open, renameat2};
use nix::sys::stat::Mode;
use tracing::debug;

/// Moves `from` to `to` unless `to` already exists. Returns whether the move
/// happened. Both paths must be on the same filesystem.
pub fn rename_noreplace(from: &Path, to: &Path) -> anyhow::Result<bool> {
    let (Some(from_dir), Some(from_name)) = (from.parent(), from.file_name()) else {
        anyhow::bail!("cannot move {from:?}, it has no parent directory");
    };
    let (Some(to_dir), Some(to_name)) = (to.parent(), to.file_name()) else {
        anyhow::bail!("cannot move to {to:?}, it has no parent directory");
    };
    let from_fd = open(from_dir, OFlag::O_DIRECTORY | OFlag::O_PATH, Mode::empty())?;
    let to_fd = open(to_dir, OFlag::O_DIRECTORY | OFlag::O_PATH, Mode::empty())?;
    match renameat2(
        from_fd,
        from_name,
        to_fd,
        to_name,
        RenameFlags::RENAME_NOREPLACE,
    ) {
        Ok(()) => Ok(true),
        Err(Errno::EEXIST) | Err(Errno::ENOTEMPTY) => Ok(false),
        Err(error) => Err(error).with_context(|| format!("move {from:?} to {to:?}")),
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ObjectStats {
    pub rendered: usize,
    pub reused: usize,
}

impl fmt::Display for ObjectStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} rendered, {} reused", self.rendered, self.reused)
    }
}

#[derive(Debug)]
pub struct ObjectStore {
    root: PathBuf,
    staging: PathBuf,
    stats: ObjectStats,
}

fn check_hash(hash: &str) -> anyhow::Result<()> {
    if hash.len() < 3 || !hash.bytes().all(|b| b.is_ascii_hexdigit()) {
        anyhow::bail!("invalid content hash {hash:?}");
    }
    Ok(())
}

impl ObjectStore {
    /// `root` is the `objects/` directory, `staging` a scratch directory on
    /// the same filesystem.
    pub fn new(root: PathBuf, staging: PathBuf) -> Self {
        ObjectStore {
            root,
            staging,
            stats: ObjectStats::default(),
        }
    }

    pub fn path(&self, hash: &str) -> PathBuf {
        self.root.join(&hash[..2]).join(hash)
    }

    pub fn stats(&self) -> ObjectStats {
        self.stats
    }

    /// Returns the stored page for `hash`, calling `render` to produce it only
    /// if no page exists yet.
    pub fn ensure(
        &mut self,
        hash: &str,
        render: impl FnOnce() -> anyhow::Result<String>,
    ) -> anyhow::Result<PathBuf> {
        check_hash(hash)?;
        let path = self.path(hash);
        if path.exists() {
            self.stats.reused += 1;
            return Ok(path);
        }

        let page = render()?;
        let staged = self.staging.join(format!("object-{hash}"));
        fs::write(&staged, page).with_context(|| format!("write {staged:?}"))?;
        let mut permissions = fs::metadata(&staged)?.permissions();
        permissions.set_readonly(true);
        fs::set_permissions(&staged, permissions)?;

        fs::create_dir_all(self.root.join(&hash[..2]))?;
        if rename_noreplace(&staged, &path)? {
            debug!(?hash, "rendered object");
            self.stats.rendered += 1;
        } else {
            fs::remove_file(&staged)?;
            self.stats.reused += 1;
        }
        Ok(path)
    }

    /// Makes `destination` another name for the stored page of `hash`.
    pub fn link(&self, hash: &str, destination: &Path) -> anyhow::Result<()> {
        check_hash(hash)?;
        if let Some(parent) = destination.parent() {
            fs::create_dir_all(parent)?;
        }
        let source = self.path(hash);
        fs::hard_link(&source, destination)
            .with_context(|| format!("link {source:?} to {destination:?}"))
    }
}
