//! In-memory [`Backend`] and filesystem helpers for tests.

use std::cell::Cell;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fs;
use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};

use crate::backend::{Backend, BackendError, Commit, FileEntry, Signature};
use crate::lanes;

fn hash(parts: &[&[u8]]) -> String {
    let mut hasher = Sha256::new();
    for part in parts {
        hasher.update(part);
        hasher.update(b"\0");
    }
    format!("{:x}", hasher.finalize())
}

/// Repository held in memory. Commit ids and blob hashes are 64 hex digits.
#[derive(Debug, Default)]
pub struct MemoryBackend {
    commits: HashMap<String, Commit>,
    trees: HashMap<String, Vec<FileEntry>>,
    blobs: HashMap<String, Vec<u8>>,
    branches: Vec<(String, String)>,
    blob_reads: Cell<usize>,
    diff_patches: Cell<usize>,
}

impl MemoryBackend {
    /// Records a commit whose tree is exactly `files` and returns its id.
    pub fn commit(&mut self, message: &str, parents: &[&str], files: &[(&str, &str)]) -> String {
        let serial = self.commits.len().to_string();
        let mut parts: Vec<&[u8]> = vec![serial.as_bytes(), message.as_bytes()];
        parts.extend(parents.iter().map(|p| p.as_bytes()));
        let id = hash(&parts);

        let mut tree: Vec<FileEntry> = files
            .iter()
            .map(|(path, content)| {
                let blob = hash(&[content.as_bytes()]);
                self.blobs.insert(blob.clone(), content.as_bytes().to_vec());
                FileEntry {
                    path: path.to_string(),
                    hash: blob,
                }
            })
            .collect();
        tree.sort_by(|a, b| a.path.cmp(&b.path));
        self.trees.insert(id.clone(), tree);

        let signature = Signature {
            name: "A U Thor".into(),
            email: "author@example.com".into(),
        };
        let summary = message.lines().next().unwrap_or_default().to_owned();
        self.commits.insert(
            id.clone(),
            Commit {
                id: id.clone(),
                parents: parents.iter().map(|p| p.to_string()).collect(),
                author: signature.clone(),
                committer: signature,
                time: 1_700_000_000 + 60 * self.commits.len() as i64,
                summary,
                message: message.to_owned(),
            },
        );
        id
    }

    /// Creates or moves a branch.
    pub fn branch(&mut self, name: &str, tip: &str) {
        match self.branches.iter_mut().find(|(known, _)| known == name) {
            Some((_, current)) => *current = tip.to_owned(),
            None => self.branches.push((name.to_owned(), tip.to_owned())),
        }
    }

    /// Number of blob contents handed out so far.
    pub fn blob_reads(&self) -> usize {
        self.blob_reads.get()
    }

    pub fn diff_patches(&self) -> usize {
        self.diff_patches.get()
    }

    /// Forgets the tree of `id`, so building that commit fails.
    pub fn drop_tree(&mut self, id: &str) {
        self.trees.remove(id);
    }

    fn files(&self, id: &str) -> Result<&[FileEntry], BackendError> {
        self.trees
            .get(id)
            .map(Vec::as_slice)
            .ok_or_else(|| BackendError::UnknownObject(id.to_owned()))
    }

    fn text(&self, hash: &str) -> &str {
        self.blobs
            .get(hash)
            .and_then(|data| std::str::from_utf8(data).ok())
            .unwrap_or_default()
    }
}

impl Backend for MemoryBackend {
    fn list_branches(&self) -> Result<Vec<String>, BackendError> {
        Ok(self.branches.iter().map(|(name, _)| name.clone()).collect())
    }

    fn commit_graph(&self, branch: &str) -> Result<Vec<String>, BackendError> {
        let Some((_, tip)) = self.branches.iter().find(|(name, _)| name == branch) else {
            return Err(BackendError::UnknownBranch(branch.to_owned()));
        };
        let mut parents = HashMap::new();
        let mut pending = vec![tip.clone()];
        while let Some(id) = pending.pop() {
            if parents.contains_key(&id) {
                continue;
            }
            let commit = self.metadata(&id)?;
            pending.extend(commit.parents.iter().cloned());
            parents.insert(id, commit.parents);
        }
        let order = lanes::topo_order(tip, &parents);
        Ok(lanes::draw(&order, &parents))
    }

    fn metadata(&self, id: &str) -> Result<Commit, BackendError> {
        self.commits
            .get(id)
            .cloned()
            .ok_or_else(|| BackendError::UnknownObject(id.to_owned()))
    }

    fn tree(&self, id: &str) -> Result<Vec<FileEntry>, BackendError> {
        self.files(id).map(<[FileEntry]>::to_vec)
    }

    /// Whole-file hunks: every old line removed, every new line added.
    fn diff_patch(&self, parent: &str, id: &str) -> Result<String, BackendError> {
        self.diff_patches.set(self.diff_patches.get() + 1);
        let old: BTreeMap<&str, &str> = self
            .files(parent)?
            .iter()
            .map(|f| (f.path.as_str(), f.hash.as_str()))
            .collect();
        let new: BTreeMap<&str, &str> = self
            .files(id)?
            .iter()
            .map(|f| (f.path.as_str(), f.hash.as_str()))
            .collect();
        let paths: BTreeSet<&str> = old.keys().chain(new.keys()).copied().collect();

        let mut patch = String::new();
        for path in paths {
            let (before, after) = (old.get(path), new.get(path));
            if before == after {
                continue;
            }
            let before_lines: Vec<&str> = before
                .map(|h| self.text(h).lines().collect())
                .unwrap_or_default();
            let after_lines: Vec<&str> = after
                .map(|h| self.text(h).lines().collect())
                .unwrap_or_default();
            patch.push_str(&format!("diff --git a/{path} b/{path}\n"));
            patch.push_str(&match before {
                Some(_) => format!("--- a/{path}\n"),
                None => "--- /dev/null\n".to_owned(),
            });
            patch.push_str(&match after {
                Some(_) => format!("+++ b/{path}\n"),
                None => "+++ /dev/null\n".to_owned(),
            });
            patch.push_str(&format!(
                "@@ -1,{} +1,{} @@\n",
                before_lines.len(),
                after_lines.len()
            ));
            for line in before_lines {
                patch.push_str(&format!("-{line}\n"));
            }
            for line in after_lines {
                patch.push_str(&format!("+{line}\n"));
            }
        }
        Ok(patch)
    }

    fn blob(&self, hash: &str) -> Result<Vec<u8>, BackendError> {
        self.blob_reads.set(self.blob_reads.get() + 1);
        self.blobs
            .get(hash)
            .cloned()
            .ok_or_else(|| BackendError::UnknownObject(hash.to_owned()))
    }
}

/// Regular files below `dir`, sorted.
pub fn files_under(dir: &Path) -> Vec<PathBuf> {
    let mut files = Vec::new();
    let mut pending = vec![dir.to_owned()];
    while let Some(dir) = pending.pop() {
        for entry in fs::read_dir(&dir).unwrap() {
            let path = entry.unwrap().path();
            let meta = fs::symlink_metadata(&path).unwrap();
            if meta.is_dir() {
                pending.push(path);
            } else if meta.is_file() {
                files.push(path);
            }
        }
    }
    files.sort();
    files
}

/// Every file and symlink below `dir`, keyed by relative path. Symlinks map to
/// their target.
pub fn snapshot(dir: &Path) -> BTreeMap<PathBuf, Vec<u8>> {
    let mut out = BTreeMap::new();
    let mut pending = vec![dir.to_owned()];
    while let Some(current) = pending.pop() {
        for entry in fs::read_dir(&current).unwrap() {
            let path = entry.unwrap().path();
            let relative = path.strip_prefix(dir).unwrap().to_owned();
            let meta = fs::symlink_metadata(&path).unwrap();
            if meta.is_dir() {
                pending.push(path);
            } else if meta.file_type().is_symlink() {
                let target = fs::read_link(&path).unwrap();
                out.insert(relative, target.into_os_string().into_encoded_bytes());
            } else {
                out.insert(relative, fs::read(&path).unwrap());
            }
        }
    }
    out
}
