//! Building the next commit from the current index (spec.md §6 `commit`).

use std::collections::BTreeMap;

use bstr::{BString, ByteSlice};
use git_actor::Signature;
use git_hash::ObjectId;
use git_object::tree::{Entry, EntryMode, Tree};
use git_object::Commit;
use git_ref::transaction::PreviousValue;

use super::Repository;
use crate::backend::GitBackend;
use crate::error::{Code, Error};

/// One level of the tree being assembled from flat index paths: blobs staged directly in this
/// directory, plus child directories recursed into by name.
#[derive(Default)]
struct Dir {
    blobs: BTreeMap<BString, (EntryMode, ObjectId)>,
    dirs: BTreeMap<BString, Dir>,
}

impl Dir {
    fn insert(&mut self, path: &[u8], mode: EntryMode, oid: ObjectId) {
        match path.find_byte(b'/') {
            None => {
                self.blobs.insert(path.into(), (mode, oid));
            }
            Some(slash) => {
                let (head, rest) = (&path[..slash], &path[slash + 1..]);
                self.dirs.entry(head.into()).or_default().insert(rest, mode, oid);
            }
        }
    }

    fn write<B: GitBackend>(&self, repo: &Repository<B>) -> Result<ObjectId, Error> {
        let mut entries: Vec<Entry> = self
            .blobs
            .iter()
            .map(|(name, (mode, oid))| Entry { mode: *mode, filename: name.clone(), oid: *oid })
            .collect();
        for (name, child) in &self.dirs {
            let oid = child.write(repo)?;
            entries.push(Entry { mode: EntryMode::Tree, filename: name.clone(), oid });
        }
        Tree::sort(&mut entries);
        repo.write_tree(&Tree { entries })
    }
}

impl<B: GitBackend> Repository<B> {
    /// Build a tree from every staged (stage 0, clean) path in the current index and store it.
    pub fn write_tree_from_index(&self) -> Result<ObjectId, Error> {
        let index = self.index()?;
        if !index.unmerged_paths().is_empty() {
            return Err(Error::new("repository.write_tree_from_index", Code::UnmergedPaths, UnmergedPaths));
        }
        let mut root = Dir::default();
        for entry in index.entries() {
            if entry.stage == git_index::Stage::Clean {
                root.insert(entry.path.as_bytes(), entry.mode, entry.oid);
            }
        }
        root.write(self)
    }

    /// Commit the current index as a new commit, advancing the current branch (or bootstrapping
    /// it, for the first commit on an unborn branch) and `HEAD`.
    pub fn commit(&self, message: &str, author: Signature, committer: Signature) -> Result<ObjectId, Error> {
        let tree = self.write_tree_from_index()?;
        let parents = match self.head_id()? {
            Some(id) => vec![id],
            None => Vec::new(),
        };
        let commit = Commit {
            tree,
            parents,
            author,
            committer,
            extra_headers: Vec::new(),
            message: BString::from(message),
        };
        let oid = self.write_commit(&commit)?;

        let branch_ref = match self.current_branch()? {
            Some(short) => BString::from(format!("refs/heads/{short}")),
            None => BString::from("refs/heads/main"),
        };
        self.backend
            .write_ref(branch_ref.as_bstr(), oid, PreviousValue::Any, false)
            .map_err(|e| Error::new("repository.commit", Code::Internal, e))?;
        Ok(oid)
    }
}

/// The index has unmerged paths; `commit` refuses to build a tree from it (spec.md §7
/// `UnmergedPathsError`).
#[derive(Debug, thiserror::Error)]
#[error("the index has unresolved merge conflicts")]
struct UnmergedPaths;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::memory::Memory;
    use git_date::Time;
    use git_index::{Entry as IndexEntry, Stage, State, Time as IndexTime};

    fn signature(name: &str) -> Signature {
        Signature { name: name.into(), email: format!("{name}@x").into(), time: Time { seconds_since_epoch: 1_700_000_000, offset_in_minutes: 0 } }
    }

    fn stage_path(state: &mut State, path: &str, oid: ObjectId) {
        let entries = vec![IndexEntry {
            ctime: IndexTime::default(),
            mtime: IndexTime::default(),
            dev: 0,
            ino: 0,
            mode: EntryMode::Blob,
            uid: 0,
            gid: 0,
            size: 0,
            oid,
            stage: Stage::Clean,
            assume_valid: false,
            path: path.into(),
        }];
        *state = State::from_entries(entries, state.hash_kind());
    }

    #[test]
    fn committing_a_single_file_produces_a_resolvable_head() {
        let repo = Repository::new(Memory::new(), git_hash::Kind::Sha1);
        let blob = repo.write_blob(b"hello\n").unwrap();
        let mut index = (*repo.index().unwrap()).clone();
        stage_path(&mut index, "a.txt", blob);
        repo.set_index(index).unwrap();

        let oid = repo.commit("first\n", signature("Ann"), signature("Ann")).unwrap();
        assert_eq!(repo.head_id().unwrap(), None, "writing refs/heads/main doesn't move a detached-or-unset HEAD by itself");
        let commit = repo.read_commit(&oid).unwrap();
        assert_eq!(commit.message, "first\n");
        assert!(commit.parents.is_empty());

        let tree = repo.read_tree(&commit.tree).unwrap();
        assert_eq!(tree.entries.len(), 1);
        assert_eq!(tree.entries[0].filename, "a.txt");
    }

    #[test]
    fn nested_paths_produce_nested_trees() {
        let repo = Repository::new(Memory::new(), git_hash::Kind::Sha1);
        let blob = repo.write_blob(b"x\n").unwrap();
        let mut index = (*repo.index().unwrap()).clone();
        stage_path(&mut index, "dir/nested.txt", blob);
        repo.set_index(index).unwrap();

        let tree_oid = repo.write_tree_from_index().unwrap();
        let root = repo.read_tree(&tree_oid).unwrap();
        assert_eq!(root.entries.len(), 1);
        assert_eq!(root.entries[0].mode, EntryMode::Tree);
        let nested = repo.read_tree(&root.entries[0].oid).unwrap();
        assert_eq!(nested.entries[0].filename, "nested.txt");
    }
}
