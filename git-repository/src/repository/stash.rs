//! Stash (spec.md §6 `stash(op∈{push,create,apply,pop,drop,list,clear})`): a porcelain
//! composition of [`commit`][super::commit] against the current index, a `refs/stash` stack
//! chained through a `previous-stash` commit header rather than git's second-parent/reflog
//! scheme (this repository's [`GitBackend`] exposes no reflog capability), and
//! [`super::worktree::Repository::merge`]'s three-way engine for `apply`/`pop`.

use bstr::{BString, ByteSlice};
use git_hash::ObjectId;
use git_worktree::backend::WorktreeBackend;

use super::Repository;
use crate::backend::GitBackend;
use crate::error::{Code, Error};

const STASH_REF: &str = "refs/stash";
const PREVIOUS_STASH_HEADER: &str = "previous-stash";

impl<B: GitBackend> Repository<B> {
    /// Record the current index as a new stash entry on top of the stack, then hard-reset the
    /// index and working tree back to `HEAD`. Equivalent to `stash push` with no pathspec.
    pub fn stash_push<W: WorktreeBackend>(
        &self,
        backend: &W,
        message: Option<&str>,
        author: git_actor::Signature,
        committer: git_actor::Signature,
    ) -> Result<ObjectId, Error> {
        let oid = self.stash_create(message, author, committer)?;
        let head = self.head_id()?.ok_or_else(|| Error::new("repository.stash_push", Code::NotFound, crate::error::NotFound::UnbornHead))?;
        self.reset(backend, head, true)?;
        Ok(oid)
    }

    /// Record the current index as a new stash entry without touching the index or working tree.
    pub fn stash_create(&self, message: Option<&str>, author: git_actor::Signature, committer: git_actor::Signature) -> Result<ObjectId, Error> {
        let head = self.head_id()?.ok_or_else(|| Error::new("repository.stash_create", Code::NotFound, crate::error::NotFound::UnbornHead))?;
        let tree = self.write_tree_from_index()?;
        let previous = self.resolve(bstr::BStr::new(STASH_REF.as_bytes()))?;

        let branch = self.current_branch()?.map(|b| b.to_string()).unwrap_or_else(|| "HEAD".to_owned());
        let text = message.map(str::to_owned).unwrap_or_else(|| format!("WIP on {branch}"));

        let mut extra_headers = Vec::new();
        if let Some(prev) = previous {
            extra_headers.push((BString::from(PREVIOUS_STASH_HEADER), BString::from(prev.to_hex().to_string())));
        }
        let commit = git_object::Commit {
            tree,
            parents: vec![head],
            author,
            committer,
            extra_headers,
            message: BString::from(format!("{text}\n")),
        };
        let oid = self.write_commit(&commit)?;
        self.backend
            .write_ref(bstr::BStr::new(STASH_REF.as_bytes()), oid, git_ref::transaction::PreviousValue::Any, false)
            .map_err(|e| Error::new("repository.stash_create", Code::Internal, e))?;
        Ok(oid)
    }

    /// Every stash entry, newest first.
    pub fn stash_list(&self) -> Result<Vec<ObjectId>, Error> {
        let mut out = Vec::new();
        let mut next = self.resolve(bstr::BStr::new(STASH_REF.as_bytes()))?;
        while let Some(oid) = next {
            out.push(oid);
            next = self.previous_stash_of(&oid)?;
        }
        Ok(out)
    }

    /// Three-way merge stash entry `index` (0 = top of stack) into the current `HEAD`, leaving
    /// the stack untouched.
    pub fn stash_apply<W: WorktreeBackend>(
        &self,
        backend: &W,
        index: usize,
        author: git_actor::Signature,
        committer: git_actor::Signature,
    ) -> Result<git_worktree::merge::Outcome, Error> {
        let stash = self.nth_stash(index)?;
        self.merge(backend, stash, &git_worktree::merge::Options::default(), author, committer)
    }

    /// [`Repository::stash_apply`] followed by dropping that entry from the stack on a clean
    /// (non-conflicting) result.
    pub fn stash_pop<W: WorktreeBackend>(
        &self,
        backend: &W,
        index: usize,
        author: git_actor::Signature,
        committer: git_actor::Signature,
    ) -> Result<git_worktree::merge::Outcome, Error> {
        let outcome = self.stash_apply(backend, index, author, committer)?;
        if !matches!(&outcome, git_worktree::merge::Outcome::Merged { conflicts, .. } if !conflicts.is_empty()) {
            self.stash_drop(index)?;
        }
        Ok(outcome)
    }

    /// Remove stash entry `index` from the stack, relinking the entries above it to the one
    /// below.
    pub fn stash_drop(&self, index: usize) -> Result<(), Error> {
        let entries = self.stash_list()?;
        if index >= entries.len() {
            return Err(Error::new("repository.stash_drop", Code::NotFound, MissingStashEntry(index)));
        }
        if entries.len() == 1 {
            return self.stash_clear();
        }
        if index == 0 {
            let new_top = self.previous_stash_of(&entries[0])?.expect("checked entries.len() > 1");
            return self
                .backend
                .write_ref(bstr::BStr::new(STASH_REF.as_bytes()), new_top, git_ref::transaction::PreviousValue::Any, false)
                .map_err(|e| Error::new("repository.stash_drop", Code::Internal, e));
        }

        // Rewrite every entry above `index`, from the bottom of that range up, so each one's
        // `previous-stash` header points at the right place once the dropped entry is gone.
        let mut relinked = self.previous_stash_of(&entries[index])?;
        for oid in entries[..index].iter().rev() {
            let commit = self.read_commit(oid)?;
            let mut extra_headers: Vec<_> = commit.extra_headers.into_iter().filter(|(k, _)| k.as_bytes() != PREVIOUS_STASH_HEADER.as_bytes()).collect();
            if let Some(prev) = relinked {
                extra_headers.push((BString::from(PREVIOUS_STASH_HEADER), BString::from(prev.to_hex().to_string())));
            }
            let rewritten = git_object::Commit {
                tree: commit.tree,
                parents: commit.parents,
                author: commit.author,
                committer: commit.committer,
                extra_headers,
                message: commit.message,
            };
            relinked = Some(self.write_commit(&rewritten)?);
        }
        self.backend
            .write_ref(bstr::BStr::new(STASH_REF.as_bytes()), relinked.expect("at least one entry precedes index 0"), git_ref::transaction::PreviousValue::Any, false)
            .map_err(|e| Error::new("repository.stash_drop", Code::Internal, e))
    }

    /// Delete the entire stash stack.
    pub fn stash_clear(&self) -> Result<(), Error> {
        self.backend.delete_ref(bstr::BStr::new(STASH_REF.as_bytes())).map_err(|e| Error::new("repository.stash_clear", Code::Internal, e))
    }

    fn nth_stash(&self, index: usize) -> Result<ObjectId, Error> {
        self.stash_list()?
            .into_iter()
            .nth(index)
            .ok_or_else(|| Error::new("repository.stash_apply", Code::NotFound, MissingStashEntry(index)))
    }

    fn previous_stash_of(&self, oid: &ObjectId) -> Result<Option<ObjectId>, Error> {
        let commit = self.read_commit(oid)?;
        commit
            .extra_headers
            .iter()
            .find(|(k, _)| k.as_bytes() == PREVIOUS_STASH_HEADER.as_bytes())
            .map(|(_, v)| ObjectId::from_hex(v.as_bytes()).map_err(|e| Error::new("repository.stash_list", Code::Internal, e)))
            .transpose()
    }
}

/// A `stash_apply`/`stash_pop`/`stash_drop` index was out of range.
#[derive(Debug, thiserror::Error)]
#[error("no stash entry at index {0}")]
struct MissingStashEntry(usize);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::memory::Memory as GitMemory;
    use git_date::Time;
    use git_worktree::backend::memory::Memory as WorktreeMemory;

    fn signature() -> git_actor::Signature {
        git_actor::Signature { name: "Ann".into(), email: "ann@x".into(), time: Time { seconds_since_epoch: 1, offset_in_minutes: 0 } }
    }

    fn repo_with_head() -> (Repository<GitMemory>, ObjectId) {
        let repo = Repository::new(GitMemory::new(), git_hash::Kind::Sha1);
        let tree = repo.write_tree(&git_object::Tree { entries: Vec::new() }).unwrap();
        let commit = repo.write_commit(&git_object::Commit {
            tree,
            parents: Vec::new(),
            author: signature(),
            committer: signature(),
            extra_headers: Vec::new(),
            message: "root\n".into(),
        })
        .unwrap();
        repo.backend().write_ref(bstr::BStr::new(b"refs/heads/main"), commit, git_ref::transaction::PreviousValue::Any, false).unwrap();
        repo.backend().write_symbolic_ref(bstr::BStr::new(b"HEAD"), bstr::BStr::new(b"refs/heads/main"), git_ref::transaction::PreviousValue::Any).unwrap();
        (repo, commit)
    }

    #[test]
    fn push_then_list_then_drop() {
        let (repo, _head) = repo_with_head();
        let backend = WorktreeMemory::new();
        backend.write_file(bstr::BStr::new(b"a.txt"), git_object::tree::EntryMode::Blob, b"hi").unwrap();
        repo.add(&backend, bstr::BStr::new(b"a.txt")).unwrap();

        let first = repo.stash_push(&backend, Some("wip 1"), signature(), signature()).unwrap();
        assert_eq!(repo.stash_list().unwrap(), vec![first]);

        repo.stash_drop(0).unwrap();
        assert!(repo.stash_list().unwrap().is_empty());
    }

    #[test]
    fn dropping_a_middle_entry_relinks_the_stack() {
        let (repo, _head) = repo_with_head();
        let a = repo.stash_create(Some("a"), signature(), signature()).unwrap();
        let b = repo.stash_create(Some("b"), signature(), signature()).unwrap();
        let c = repo.stash_create(Some("c"), signature(), signature()).unwrap();
        assert_eq!(repo.stash_list().unwrap(), vec![c, b, a]);

        repo.stash_drop(1).unwrap();
        let remaining = repo.stash_list().unwrap();
        assert_eq!(remaining.len(), 2);
        assert_eq!(remaining.last().copied(), Some(a));
    }
}
