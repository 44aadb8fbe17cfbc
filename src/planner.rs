//! Decides which commits need building.
//!
//! A commit is built once its directory exists under `commits/`. Directories
//! only appear there by an atomic move from the staging area, so existence
//! means every page of the commit was written. All output is discarded when
//! the generation logic changed since the site was produced, or when a full
//! rebuild is forced.

use std::fs;
use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};
use tracing::info;

/// Sources of everything that shapes the generated files.
const GENERATOR_SOURCES: [&str; 9] = [
    include_str!("gix_backend.rs"),
    include_str!("patch.rs"),
    include_str!("lanes.rs"),
    include_str!("render.rs"),
    include_str!("html.rs"),
    include_str!("objects.rs"),
    include_str!("site.rs"),
    include_str!("graph.rs"),
    include_str!("planner.rs"),
];

/// Directories dropped on a full rebuild.
const GENERATED_DIRS: [&str; 3] = ["commits", "objects", "branches"];

/// SHA-256 over the crate version and the generator sources.
pub fn fingerprint() -> String {
    let mut hasher = Sha256::new();
    hasher.update(env!("CARGO_PKG_VERSION").as_bytes());
    for source in GENERATOR_SOURCES {
        hasher.update(b"\0");
        hasher.update(source.as_bytes());
    }
    format!("{:x}", hasher.finalize())
}

#[derive(Debug)]
pub struct Planner {
    commits: PathBuf,
    full_rebuild: bool,
}

impl Planner {
    /// Compares the fingerprint the site was generated with against the
    /// current one and clears previous output if they differ or `force` is
    /// set.
    pub fn prepare(
        target: &Path,
        stored: Option<&str>,
        current: &str,
        force: bool,
    ) -> anyhow::Result<Self> {
        let full_rebuild = force || stored != Some(current);
        if full_rebuild {
            info!(?target, force, ?stored, current, "rebuilding everything");
            for dir in GENERATED_DIRS {
                let path = target.join(dir);
                if path.exists() {
                    fs::remove_dir_all(&path)?;
                }
            }
        }
        Ok(Planner {
            commits: target.join("commits"),
            full_rebuild,
        })
    }

    pub fn is_full_rebuild(&self) -> bool {
        self.full_rebuild
    }

    pub fn needs_build(&self, id: &str) -> bool {
        !self.commits.join(id).exists()
    }
}
