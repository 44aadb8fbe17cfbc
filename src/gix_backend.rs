//! [`Backend`] over a local git repository, read through `gix`.

use std::collections::HashMap;
use std::path::Path;

use gix::bstr::ByteSlice as _;
use gix::diff::blob::UnifiedDiff;
use gix::diff::blob::intern::InternedInput;
use gix::diff::blob::unified_diff::{ContextSize, NewlineSeparator};
use gix::objs::tree::EntryKind;
use gix::traverse::tree::Recorder;
use gix::{ObjectId, Repository, Tree};
use tracing::debug;

use crate::backend::{Backend, BackendError, Commit, FileEntry, Signature, query};
use crate::lanes;

pub struct GixBackend {
    repo: Repository,
    /// Short branch name and the full reference it was found under.
    branches: Vec<(String, String)>,
}

enum Content {
    Blob(Vec<u8>),
    Submodule(ObjectId),
}

impl Content {
    /// Text to diff, `None` for binary data.
    fn text(&self) -> Option<String> {
        match self {
            Content::Blob(data) => std::str::from_utf8(data).ok().map(str::to_owned),
            Content::Submodule(id) => Some(format!("Subproject commit {id}\n")),
        }
    }
}

/// One changed file between two trees.
struct FileChange {
    old_path: Option<String>,
    new_path: Option<String>,
}

impl GixBackend {
    pub fn open(path: &Path) -> Result<Self, BackendError> {
        debug!(?path, "opening repository");
        let repo = gix::open(path).map_err(|error| BackendError::Open {
            path: path.to_owned(),
            message: error.to_string(),
        })?;
        let branches = discover_branches(&repo)?;
        debug!(branches = branches.len(), "found branches");
        Ok(GixBackend { repo, branches })
    }

    fn object_id(&self, hex: &str) -> Result<ObjectId, BackendError> {
        ObjectId::from_hex(hex.as_bytes()).map_err(|_| BackendError::UnknownObject(hex.to_owned()))
    }

    fn find_commit(&self, id: &str) -> Result<gix::Commit<'_>, BackendError> {
        let oid = self.object_id(id)?;
        self.repo
            .find_commit(oid)
            .map_err(query(format!("find commit {id}")))
    }

    fn commit_tree(&self, id: &str) -> Result<Tree<'_>, BackendError> {
        self.find_commit(id)?
            .tree()
            .map_err(query(format!("read tree of {id}")))
    }

    fn branch_tip(&self, branch: &str) -> Result<ObjectId, BackendError> {
        let Some((_, full_name)) = self.branches.iter().find(|(name, _)| name == branch) else {
            return Err(BackendError::UnknownBranch(branch.to_owned()));
        };
        let mut reference = self
            .repo
            .find_reference(full_name.as_str())
            .map_err(query(format!("find reference {full_name}")))?;
        let commit = reference
            .peel_to_commit()
            .map_err(query(format!("peel {full_name}")))?;
        Ok(commit.id)
    }

    /// Content at `path` in `tree`, `None` if there is no such entry.
    fn content_at(&self, tree: &Tree<'_>, path: &str) -> Result<Option<Content>, BackendError> {
        let entry = tree
            .lookup_entry_by_path(path)
            .map_err(query(format!("look up {path}")))?;
        let Some(entry) = entry else {
            return Ok(None);
        };
        // The commit a gitlink points to lives in another repository.
        if entry.mode().is_commit() {
            return Ok(Some(Content::Submodule(entry.object_id())));
        }
        let object = entry.object().map_err(query(format!("read {path}")))?;
        Ok(Some(Content::Blob(
            object.try_into_blob().map_or(Vec::new(), |mut b| b.take_data()),
        )))
    }

    fn changes(&self, old: &Tree<'_>, new: &Tree<'_>) -> Result<Vec<FileChange>, BackendError> {
        let mut changes = Vec::new();
        old.changes()
            .map_err(query("prepare tree diff"))?
            .for_each_to_obtain_tree(
                new,
                |change| -> Result<gix::object::tree::diff::Action, std::convert::Infallible> {
                    if change.entry_mode().is_tree() {
                        return Ok(gix::object::tree::diff::Action::Continue);
                    }
                    let (old_path, new_path) = match change {
                        gix::object::tree::diff::Change::Addition { location, .. } => {
                            (None, Some(location))
                        }
                        gix::object::tree::diff::Change::Deletion { location, .. } => {
                            (Some(location), None)
                        }
                        gix::object::tree::diff::Change::Modification { location, .. } => {
                            (Some(location), Some(location))
                        }
                        gix::object::tree::diff::Change::Rewrite {
                            source_location,
                            location,
                            ..
                        } => (Some(source_location), Some(location)),
                    };
                    changes.push(FileChange {
                        old_path: old_path.map(|p| p.to_str_lossy().into_owned()),
                        new_path: new_path.map(|p| p.to_str_lossy().into_owned()),
                    });
                    Ok(gix::object::tree::diff::Action::Continue)
                },
            )
            .map_err(query("diff trees"))?;
        Ok(changes)
    }
}

fn discover_branches(repo: &Repository) -> Result<Vec<(String, String)>, BackendError> {
    let refs = repo.references().map_err(query("list references"))?;
    let mut branches: Vec<(String, String)> = Vec::new();
    for reference in refs
        .remote_branches()
        .map_err(query("list remote branches"))?
    {
        let reference = reference.map_err(query("read remote branch"))?;
        let full_name = reference.name().as_bstr().to_str_lossy().into_owned();
        let short = reference.name().shorten().to_str_lossy().into_owned();
        // origin/main -> main
        let Some((_, name)) = short.split_once('/') else {
            continue;
        };
        if name == "HEAD" || branches.iter().any(|(known, _)| known == name) {
            continue;
        }
        branches.push((name.to_owned(), full_name));
    }
    if !branches.is_empty() {
        return Ok(branches);
    }

    for reference in refs.local_branches().map_err(query("list local branches"))? {
        let reference = reference.map_err(query("read local branch"))?;
        let full_name = reference.name().as_bstr().to_str_lossy().into_owned();
        let name = reference.name().shorten().to_str_lossy().into_owned();
        branches.push((name, full_name));
    }
    Ok(branches)
}

fn unified_diff(old: &str, new: &str) -> Result<String, BackendError> {
    let input = InternedInput::new(old, new);
    let udiff = UnifiedDiff::new(
        &input,
        String::new(),
        NewlineSeparator::AfterHeaderAndWhenNeeded("\n"),
        ContextSize::symmetrical(3),
    );
    gix::diff::blob::diff(gix::diff::blob::Algorithm::Histogram, &input, udiff)
        .map_err(query("compute unified diff"))
}

impl Backend for GixBackend {
    fn list_branches(&self) -> Result<Vec<String>, BackendError> {
        Ok(self.branches.iter().map(|(name, _)| name.clone()).collect())
    }

    fn commit_graph(&self, branch: &str) -> Result<Vec<String>, BackendError> {
        debug!(?branch, "walking branch");
        let tip = self.branch_tip(branch)?;
        let mut parents: HashMap<String, Vec<String>> = HashMap::new();
        let walk = self
            .repo
            .rev_walk([tip])
            .all()
            .map_err(query(format!("walk {branch}")))?;
        for info in walk {
            let info = info.map_err(query(format!("walk {branch}")))?;
            let commit = self
                .repo
                .find_commit(info.id)
                .map_err(query(format!("find commit {}", info.id)))?;
            let commit_parents = commit.parent_ids().map(|p| p.to_string()).collect();
            parents.insert(info.id.to_string(), commit_parents);
        }
        let order = lanes::topo_order(&tip.to_string(), &parents);
        Ok(lanes::draw(&order, &parents))
    }

    fn metadata(&self, id: &str) -> Result<Commit, BackendError> {
        debug!(?id, "reading commit");
        let commit = self.find_commit(id)?;
        let author = commit.author().map_err(query(format!("author of {id}")))?;
        let committer = commit
            .committer()
            .map_err(query(format!("committer of {id}")))?;
        let time = committer
            .time()
            .map_err(query(format!("commit time of {id}")))?;
        let message = commit.message().map_err(query(format!("message of {id}")))?;
        let summary = message.title.trim().to_str_lossy().into_owned();
        let full_message = match message.body {
            Some(body) => format!("{}\n\n{}", summary, body.to_str_lossy().trim_end()),
            None => summary.clone(),
        };
        Ok(Commit {
            id: id.to_owned(),
            parents: commit.parent_ids().map(|p| p.to_string()).collect(),
            author: Signature {
                name: author.name.to_string(),
                email: author.email.to_string(),
            },
            committer: Signature {
                name: committer.name.to_string(),
                email: committer.email.to_string(),
            },
            time: time.seconds,
            summary,
            message: full_message,
        })
    }

    fn tree(&self, id: &str) -> Result<Vec<FileEntry>, BackendError> {
        debug!(?id, "listing tree");
        let tree = self.commit_tree(id)?;
        let mut recorder = Recorder::default();
        tree.traverse()
            .depthfirst(&mut recorder)
            .map_err(query(format!("traverse tree of {id}")))?;
        Ok(recorder
            .records
            .into_iter()
            .filter(|entry| {
                matches!(
                    entry.mode.kind(),
                    EntryKind::Blob | EntryKind::BlobExecutable | EntryKind::Link
                )
            })
            .map(|entry| FileEntry {
                path: entry.filepath.to_string(),
                hash: entry.oid.to_string(),
            })
            .collect())
    }

    fn diff_patch(&self, parent: &str, id: &str) -> Result<String, BackendError> {
        debug!(?parent, ?id, "diffing commits");
        let old_tree = self.commit_tree(parent)?;
        let new_tree = self.commit_tree(id)?;
        let mut patch = String::new();
        for change in self.changes(&old_tree, &new_tree)? {
            let header_old = change.old_path.as_deref().or(change.new_path.as_deref());
            let header_new = change.new_path.as_deref().or(change.old_path.as_deref());
            let (Some(header_old), Some(header_new)) = (header_old, header_new) else {
                continue;
            };
            patch.push_str(&format!("diff --git a/{header_old} b/{header_new}\n"));

            let old = match &change.old_path {
                Some(path) => self.content_at(&old_tree, path)?,
                None => None,
            };
            let new = match &change.new_path {
                Some(path) => self.content_at(&new_tree, path)?,
                None => None,
            };
            let old_text = old.as_ref().map_or(Some(String::new()), Content::text);
            let new_text = new.as_ref().map_or(Some(String::new()), Content::text);
            let (Some(old_text), Some(new_text)) = (old_text, new_text) else {
                patch.push_str(&format!(
                    "Binary files a/{header_old} and b/{header_new} differ\n"
                ));
                continue;
            };

            match &change.old_path {
                Some(path) => patch.push_str(&format!("--- a/{path}\n")),
                None => patch.push_str("--- /dev/null\n"),
            }
            match &change.new_path {
                Some(path) => patch.push_str(&format!("+++ b/{path}\n")),
                None => patch.push_str("+++ /dev/null\n"),
            }
            let hunks = unified_diff(&old_text, &new_text)?;
            patch.push_str(&hunks);
            if !hunks.is_empty() && !hunks.ends_with('\n') {
                patch.push('\n');
            }
        }
        Ok(patch)
    }

    fn blob(&self, hash: &str) -> Result<Vec<u8>, BackendError> {
        debug!(?hash, "reading blob");
        let oid = self.object_id(hash)?;
        let object = self
            .repo
            .find_object(oid)
            .map_err(query(format!("find blob {hash}")))?;
        let mut blob = object
            .try_into_blob()
            .map_err(query(format!("{hash} is not a blob")))?;
        Ok(blob.take_data())
    }
}
