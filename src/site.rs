//! Site assembly.
//!
//! Walks every selected branch, builds each commit that has no directory yet
//! and rewrites the branch pages and the top-level index. A commit is built in
//! `.staging/<id>` and moved to `commits/<id>` once all its pages are written.

use std::collections::HashSet;
use std::fmt;
use std::fs;
use std::os::unix::fs::symlink;
use std::path::Path;
use std::time::Instant;

use anyhow::Context as _;
use tracing::{debug, info, warn};

use crate::backend::{Backend, Commit};
use crate::config::Config;
use crate::graph::{self, GraphRow};
use crate::html;
use crate::objects::{ObjectStats, ObjectStore, rename_noreplace};
use crate::patch;
use crate::planner::{self, Planner};
use crate::render::{self, CommitPage, ParentDiff};

const STAGING_DIR: &str = ".staging";

const STYLESHEET: &str = "\
body { font-family: monospace; color: #222; background: #fff; }
a { color: #0645ad; }
table td { padding: 0 0.4em; vertical-align: top; }
td.num { text-align: right; }
td.graph { white-space: pre; }
pre .line { color: #999; text-decoration: none; }
pre .i { color: #080; }
pre .d { color: #c00; }
pre .h { color: #058; }
ul.tree, ul.tree ul { list-style: none; padding-left: 1.2em; }
";

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RunSummary {
    pub commits_built: usize,
    pub commits_skipped: usize,
    pub objects: ObjectStats,
    pub full_rebuild: bool,
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} commits built, {} skipped, objects: {}",
            self.commits_built, self.commits_skipped, self.objects
        )
    }
}

struct Assembler<'a, B: ?Sized> {
    config: &'a Config,
    backend: &'a B,
    planner: Planner,
    objects: ObjectStore,
    staging: &'a Path,
    summary: RunSummary,
}

/// Generates or updates the site in `config.target` from `backend`.
pub fn run<B: Backend + ?Sized>(config: &Config, backend: &B) -> anyhow::Result<RunSummary> {
    let start = Instant::now();
    let target = config.target.as_path();
    info!(?target, project = %config.project, "building site");

    fs::create_dir_all(target).with_context(|| format!("create {target:?}"))?;
    let staging = target.join(STAGING_DIR);
    if staging.exists() {
        warn!(?staging, "removing leftovers of an interrupted run");
        fs::remove_dir_all(&staging)?;
    }
    fs::create_dir_all(&staging)?;

    let fingerprint = planner::fingerprint();
    let planner = Planner::prepare(
        target,
        config.fingerprint.as_deref(),
        &fingerprint,
        config.force,
    )?;
    for dir in ["commits", "objects", "branches"] {
        fs::create_dir_all(target.join(dir))?;
    }
    fs::write(target.join("style.css"), STYLESHEET)?;

    let branches = match &config.branches {
        Some(branches) => branches.clone(),
        None => backend.list_branches()?,
    };

    let mut assembler = Assembler {
        config,
        backend,
        objects: ObjectStore::new(target.join("objects"), staging.clone()),
        summary: RunSummary {
            full_rebuild: planner.is_full_rebuild(),
            ..RunSummary::default()
        },
        planner,
        staging: &staging,
    };

    let mut index_rows = Vec::new();
    for branch in &branches {
        if let Some(head) = assembler.branch(branch)? {
            index_rows.push(render::index_row(branch, &head));
        }
    }
    let index = render::index_page(&config.project, config.link.as_deref(), index_rows);
    fs::write(target.join("index.html"), index)?;

    let mut summary = assembler.summary;
    summary.objects = assembler.objects.stats();
    fs::remove_dir_all(&staging)?;
    config.save(&fingerprint)?;
    info!(%summary, elapsed = ?start.elapsed(), "site built");
    Ok(summary)
}

impl<B: Backend + ?Sized> Assembler<'_, B> {
    /// Writes the page of `branch` and points its link at the head commit.
    /// Returns the head, or `None` for a branch without commits.
    fn branch(&mut self, branch: &str) -> anyhow::Result<Option<Commit>> {
        info!(?branch, "processing branch");
        let config = self.config;
        let target = &config.target;
        let page_path = format!("branches/{branch}.html");
        let root = html::to_root(&page_path);

        let mut head = None;
        let mut rows = Vec::new();
        for row in graph::walk(self.backend.commit_graph(branch)?) {
            match row? {
                GraphRow::Decoration { glyphs } => rows.push(render::decoration_row(&glyphs)),
                GraphRow::Commit { glyphs, id, rank } => {
                    let commit = self.backend.metadata(&id)?;
                    if self.planner.needs_build(&id) {
                        self.build_commit(branch, &commit)
                            .with_context(|| format!("build commit {id}"))?;
                        self.summary.commits_built += 1;
                    } else {
                        debug!(?id, "already built");
                        self.summary.commits_skipped += 1;
                    }
                    rows.push(render::branch_row(&root, &glyphs, &commit));
                    // Only once commits/<id> is published.
                    if rank == 0 {
                        update_branch_link(target, branch, &id)?;
                        head = Some(commit);
                    }
                }
            }
        }
        if head.is_none() {
            warn!(?branch, "branch has no commits");
        }

        let page = render::branch_page(&config.project, branch, &root, rows);
        let path = target.join(&page_path);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, page)?;
        Ok(head)
    }

    fn build_commit(&mut self, branch: &str, commit: &Commit) -> anyhow::Result<()> {
        info!(id = commit.short_id(), summary = %commit.summary, "building commit");
        let backend = self.backend;
        let config = self.config;
        let project = &config.project;
        let stage = self.staging.join(&commit.id);
        fs::create_dir_all(&stage)?;

        let files = backend.tree(&commit.id)?;
        for entry in &files {
            self.objects.ensure(&entry.hash, || {
                Ok(render::blob_page(&entry.hash, &backend.blob(&entry.hash)?))
            })?;
            self.objects
                .link(&entry.hash, &stage.join(format!("{}.raw.html", entry.path)))?;
        }

        let mut parents = Vec::with_capacity(commit.parents.len());
        for parent in &commit.parents {
            let patch = backend.diff_patch(parent, &commit.id)?;
            let stats = patch::stats(&patch)?;
            let page = render::diff_page(project, commit, parent, &patch, &stats);
            fs::write(stage.join(format!("diff-to-{parent}.html")), page)?;
            let paths: HashSet<String> = backend
                .tree(parent)?
                .into_iter()
                .map(|entry| entry.path)
                .collect();
            parents.push(ParentDiff {
                id: parent.clone(),
                stats,
                paths,
            });
        }

        let page = render::commit_index(&CommitPage {
            project,
            branch,
            commit,
            parents: &parents,
            files: &files,
        });
        fs::write(stage.join("index.html"), page)?;

        let destination = config.target.join("commits").join(&commit.id);
        if !rename_noreplace(&stage, &destination)? {
            debug!(id = %commit.id, "commit published concurrently");
            fs::remove_dir_all(&stage)?;
        }
        Ok(())
    }
}

/// Atomically points `branches/<branch>` at `commits/<id>`.
fn update_branch_link(target: &Path, branch: &str, id: &str) -> anyhow::Result<()> {
    let link = target.join("branches").join(branch);
    let root = html::to_root(&format!("branches/{branch}"));
    let destination = format!("{root}commits/{id}");
    if fs::read_link(&link).is_ok_and(|current| current == Path::new(&destination)) {
        return Ok(());
    }
    if let Some(parent) = link.parent() {
        fs::create_dir_all(parent)?;
    }
    let staged = target.join(STAGING_DIR).join("branch-link");
    if fs::symlink_metadata(&staged).is_ok() {
        fs::remove_file(&staged)?;
    }
    symlink(&destination, &staged)?;
    fs::rename(&staged, &link).with_context(|| format!("update branch link {link:?}"))?;
    debug!(?branch, ?destination, "branch link updated");
    Ok(())
}
