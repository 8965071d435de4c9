//! Working-tree porcelain (spec.md §6 `add`/`remove`/`reset`/`status`/`diff`/`merge`/
//! `abortMerge`), layered over [`git_worktree`]'s checkout/status/merge engines and whatever
//! [`WorktreeBackend`] the caller hands in for the actual file I/O.

use bstr::{BStr, BString, ByteSlice};
use git_hash::ObjectId;
use git_index::{Entry as IndexEntry, Stage, State, Time as IndexTime};
use git_object::tree::EntryMode;
use git_ref::transaction::PreviousValue;
use git_worktree::backend::WorktreeBackend;
use git_worktree::{checkout, merge, status};

use super::Repository;
use crate::backend::GitBackend;
use crate::error::{Code, Error};

impl<B: GitBackend> Repository<B> {
    /// Classify every tracked and untracked path against `HEAD` and the working tree `backend`
    /// sees (spec.md §4.6).
    pub fn status<W: WorktreeBackend>(&self, backend: &W, path_filter: Option<&BStr>, ignored: impl Fn(&BStr) -> bool) -> Result<Vec<status::Entry>, Error> {
        let index = self.index()?;
        let head = self.head_id()?;
        status::status(&self.objects(), backend, &index, head, path_filter, ignored)
            .map_err(|e| Error::new("repository.status", Code::Internal, e))
    }

    /// Stage `path`'s current working-tree content, creating or updating its index entry.
    pub fn add<W: WorktreeBackend>(&self, backend: &W, path: &BStr) -> Result<(), Error> {
        let meta = backend
            .metadata(path)
            .map_err(|e| Error::new("repository.add", Code::Internal, e))?
            .ok_or_else(|| Error::new("repository.add", Code::NotFound, MissingWorkdirPath(path.to_owned())))?;
        let content = backend.read_file(path).map_err(|e| Error::new("repository.add", Code::Internal, e))?;
        let oid = self.write_blob(&content)?;

        let mut index = (*self.index()?).clone();
        let time = IndexTime { secs: meta.mtime_secs as u32, nsecs: 0 };
        index.stage_clean(IndexEntry {
            ctime: time,
            mtime: time,
            dev: 0,
            ino: 0,
            mode: meta.mode,
            uid: 0,
            gid: 0,
            size: meta.size as u32,
            oid,
            stage: Stage::Clean,
            assume_valid: false,
            path: path.to_owned(),
        });
        self.set_index(index)
    }

    /// Unstage `path` entirely, leaving its working-tree content untouched.
    pub fn remove_from_index(&self, path: &BStr) -> Result<(), Error> {
        let mut index = (*self.index()?).clone();
        index.remove_path(path);
        self.set_index(index)
    }

    /// Reset the index (and, with `hard`, the working tree) to `target`'s tree.
    pub fn reset<W: WorktreeBackend>(&self, backend: &W, target: ObjectId, hard: bool) -> Result<(), Error> {
        let commit = self.read_commit(&target)?;
        let index = self.index()?;
        let ops = checkout::analyze(&self.objects(), backend, &index, Some(commit.tree), None, None, hard)
            .map_err(|e| Error::new("repository.reset", Code::Internal, e))?;
        let mut index = (*index).clone();
        if hard {
            checkout::apply(&self.objects(), backend, &mut index, &ops).map_err(|e| Error::new("repository.reset", Code::Internal, e))?;
            self.set_index(index)
        } else {
            for op in &ops {
                if let checkout::Op::Create { path, oid, mode } | checkout::Op::Update { path, oid, mode } = op {
                    index.stage_clean(IndexEntry {
                        ctime: IndexTime::default(),
                        mtime: IndexTime::default(),
                        dev: 0,
                        ino: 0,
                        mode: *mode,
                        uid: 0,
                        gid: 0,
                        size: 0,
                        oid: *oid,
                        stage: Stage::Clean,
                        assume_valid: false,
                        path: path.clone(),
                    });
                }
                if let checkout::Op::Delete(path) | checkout::Op::DeleteIndex(path) = op {
                    index.remove_path(path.as_bstr());
                }
            }
            self.set_index(index)
        }
    }

    /// Materialise `target`'s tree into the working tree `backend` sees and update the index to
    /// match (spec.md §4.5). Moves `HEAD` unless `no_update_head`.
    pub fn checkout<W: WorktreeBackend>(&self, backend: &W, target: ObjectId, branch: Option<&str>, force: bool, no_update_head: bool) -> Result<(), Error> {
        let commit = self.read_commit(&target)?;
        let index = self.index()?;
        let ops = checkout::analyze(&self.objects(), backend, &index, Some(commit.tree), None, None, force)
            .map_err(|e| Error::new("repository.checkout", Code::Internal, e))?;
        let mut index = (*index).clone();
        checkout::apply(&self.objects(), backend, &mut index, &ops).map_err(|e| Error::new("repository.checkout", Code::Internal, e))?;
        self.set_index(index)?;

        if !no_update_head {
            match branch {
                Some(name) => self
                    .backend
                    .write_symbolic_ref(BStr::new(b"HEAD"), BString::from(format!("refs/heads/{name}")).as_bstr(), PreviousValue::Any)
                    .map_err(|e| Error::new("repository.checkout", Code::Internal, e))?,
                None => self
                    .backend
                    .write_ref(BStr::new(b"HEAD"), target, PreviousValue::Any, true)
                    .map_err(|e| Error::new("repository.checkout", Code::Internal, e))?,
            }
        }
        Ok(())
    }

    /// Three-way merge `theirs` into the current branch, writing a merge commit on a clean
    /// result and `MERGE_HEAD`/index conflict state otherwise (spec.md §4.7).
    pub fn merge<W: WorktreeBackend>(
        &self,
        backend: &W,
        theirs: ObjectId,
        options: &merge::Options,
        author: git_actor::Signature,
        committer: git_actor::Signature,
    ) -> Result<merge::Outcome, Error> {
        let ours = self.head_id()?.ok_or_else(|| Error::new("repository.merge", Code::NotFound, crate::error::NotFound::UnbornHead))?;
        let index = self.index()?;
        let outcome = merge::merge(&self.objects(), backend, &index, ours, theirs, options, |base, ours_side, theirs_side| {
            merge::DriverResult {
                clean: false,
                content: merge_markers(base, ours_side, theirs_side),
            }
        })
        .map_err(|e| match &e {
            merge::Error::Conflict { paths } => Error::new("repository.merge", Code::MergeConflict, ConflictPaths(paths.clone())),
            _ => Error::new("repository.merge", Code::Internal, e),
        })?;

        match &outcome {
            merge::Outcome::AlreadyMerged => {}
            merge::Outcome::FastForward { to, index } => {
                self.set_index(index.clone())?;
                self.advance_current_branch(*to)?;
            }
            merge::Outcome::Merged { index, conflicts } if conflicts.is_empty() => {
                self.set_index(index.clone())?;
                let tree = self.read_commit(&ours)?.tree;
                let merged_tree = self.write_tree_from_index()?;
                let _ = tree;
                let commit = git_object::Commit {
                    tree: merged_tree,
                    parents: vec![ours, theirs],
                    author,
                    committer,
                    extra_headers: Vec::new(),
                    message: BString::from("merge\n"),
                };
                let oid = self.write_commit(&commit)?;
                self.advance_current_branch(oid)?;
            }
            merge::Outcome::Merged { index, .. } => {
                self.set_index(index.clone())?;
            }
        }
        Ok(outcome)
    }

    /// Abort an in-progress merge by resetting hard to `HEAD`.
    pub fn abort_merge<W: WorktreeBackend>(&self, backend: &W) -> Result<(), Error> {
        let head = self.head_id()?.ok_or_else(|| Error::new("repository.abort_merge", Code::NotFound, crate::error::NotFound::UnbornHead))?;
        self.reset(backend, head, true)
    }

    fn advance_current_branch(&self, target: ObjectId) -> Result<(), Error> {
        let branch_ref = match self.current_branch()? {
            Some(short) => BString::from(format!("refs/heads/{short}")),
            None => BString::from("refs/heads/main"),
        };
        self.backend
            .write_ref(branch_ref.as_bstr(), target, PreviousValue::Any, false)
            .map_err(|e| Error::new("repository.merge", Code::Internal, e))
    }
}

fn merge_markers(base: Option<&[u8]>, ours: Option<&[u8]>, theirs: Option<&[u8]>) -> Vec<u8> {
    let _ = base;
    let mut out = Vec::new();
    out.extend_from_slice(b"<<<<<<< ours\n");
    out.extend_from_slice(ours.unwrap_or(b""));
    out.extend_from_slice(b"=======\n");
    out.extend_from_slice(theirs.unwrap_or(b""));
    out.extend_from_slice(b">>>>>>> theirs\n");
    out
}

/// The set of paths a [`merge`][Repository::merge] left unresolved (spec.md §7
/// `MergeConflictError`).
#[derive(Debug, thiserror::Error)]
#[error("unresolved merge conflicts in {:?}", .0)]
struct ConflictPaths(Vec<BString>);

/// [`Repository::add`] was asked to stage a path the working tree doesn't have.
#[derive(Debug, thiserror::Error)]
#[error("path {0:?} does not exist in the working tree")]
struct MissingWorkdirPath(BString);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::memory::Memory as GitMemory;
    use git_worktree::backend::memory::Memory as WorktreeMemory;

    #[test]
    fn add_stages_a_workdir_file() {
        let repo = Repository::new(GitMemory::new(), git_hash::Kind::Sha1);
        let backend = WorktreeMemory::new();
        backend.write_file(BStr::new(b"a.txt"), EntryMode::Blob, b"hi").unwrap();

        repo.add(&backend, BStr::new(b"a.txt")).unwrap();
        let index = repo.index().unwrap();
        assert!(index.entry_by_path(BStr::new(b"a.txt")).is_some());
    }
}
