//! `diff` and `statusMatrix` (spec.md §6): comparing any two of a ref's tree, the index, and the
//! working tree, reusing [`git_diff::diff`] over this repository's [`ObjectAccess`] for the
//! tree-shaped sides and a small tree-builder for the working tree, grounded in the same
//! recursive [`WorktreeBackend::list_dir`] walk [`super::commit::write_tree_from_index`]'s
//! sibling `Dir` builder uses for committing.

use bstr::{BStr, BString, ByteSlice};
use git_hash::ObjectId;
pub use git_diff::{Change, Options as DiffOptions, Status};
use git_object::tree::{Entry, EntryMode, Tree};
use git_worktree::backend::WorktreeBackend;

use super::Repository;
use crate::backend::GitBackend;
use crate::error::{Code, Error};

impl<B: GitBackend> Repository<B> {
    /// Diff two tree-shaped roots directly, e.g. two commits or a commit against `None` (the
    /// empty tree).
    pub fn diff_trees(&self, old: Option<ObjectId>, new: Option<ObjectId>, path_filter: Option<&BStr>, options: &DiffOptions) -> Result<Vec<Change>, Error> {
        git_diff::diff(&self.objects(), old, new, path_filter, options).map_err(|e| Error::new("repository.diff", Code::Internal, e))
    }

    /// Diff `old` (or the empty tree, for `None`) against the current index.
    pub fn diff_tree_to_index(&self, old: Option<ObjectId>, path_filter: Option<&BStr>, options: &DiffOptions) -> Result<Vec<Change>, Error> {
        let index_tree = self.write_tree_from_index()?;
        self.diff_trees(old, Some(index_tree), path_filter, options)
    }

    /// Diff the current index against the working tree `backend` sees.
    pub fn diff_index_to_workdir<W: WorktreeBackend>(&self, backend: &W, path_filter: Option<&BStr>, options: &DiffOptions) -> Result<Vec<Change>, Error> {
        let index_tree = self.write_tree_from_index()?;
        let workdir_tree = self.write_tree_from_workdir(backend)?;
        self.diff_trees(Some(index_tree), Some(workdir_tree), path_filter, options)
    }

    /// Diff `old` (or the empty tree, for `None`) directly against the working tree, skipping
    /// the index entirely.
    pub fn diff_tree_to_workdir<W: WorktreeBackend>(&self, backend: &W, old: Option<ObjectId>, path_filter: Option<&BStr>, options: &DiffOptions) -> Result<Vec<Change>, Error> {
        let workdir_tree = self.write_tree_from_workdir(backend)?;
        self.diff_trees(old, Some(workdir_tree), path_filter, options)
    }

    /// One row per path that differs between `HEAD`, the index, or the working tree, spec.md
    /// §6's `statusMatrix`: the isomorphic-git-style three-column view, rather than
    /// [`Repository::status`]'s single-classification list.
    pub fn status_matrix<W: WorktreeBackend>(&self, backend: &W, path_filter: Option<&BStr>) -> Result<Vec<StatusMatrixRow>, Error> {
        let head_tree = match self.head_id()? {
            Some(id) => Some(self.read_commit(&id)?.tree),
            None => None,
        };
        let head_to_index = self.diff_tree_to_index(head_tree, path_filter, &DiffOptions::default())?;
        let index_to_workdir = self.diff_index_to_workdir(backend, path_filter, &DiffOptions::default())?;

        let mut rows: std::collections::BTreeMap<BString, StatusMatrixRow> = std::collections::BTreeMap::new();
        for change in head_to_index {
            rows.entry(change.path.clone()).or_insert_with(|| StatusMatrixRow::unchanged(change.path.clone())).head_vs_index = Some(change.status);
        }
        for change in index_to_workdir {
            rows.entry(change.path.clone()).or_insert_with(|| StatusMatrixRow::unchanged(change.path.clone())).index_vs_workdir = Some(change.status);
        }
        Ok(rows.into_values().collect())
    }

    fn write_tree_from_workdir<W: WorktreeBackend>(&self, backend: &W) -> Result<ObjectId, Error> {
        self.write_workdir_dir(backend, BStr::new(b""))
    }

    fn write_workdir_dir<W: WorktreeBackend>(&self, backend: &W, dir: &BStr) -> Result<ObjectId, Error> {
        let mut entries = Vec::new();
        for path in backend.list_dir(dir).map_err(|e| Error::new("repository.diff", Code::Internal, e))? {
            let path = path.as_bstr();
            let meta = backend
                .metadata(path)
                .map_err(|e| Error::new("repository.diff", Code::Internal, e))?
                .ok_or_else(|| Error::new("repository.diff", Code::Internal, MissingWorkdirEntry(path.to_owned())))?;
            let oid = if meta.is_dir {
                self.write_workdir_dir(backend, path)?
            } else {
                let content = backend.read_file(path).map_err(|e| Error::new("repository.diff", Code::Internal, e))?;
                self.write_blob(&content)?
            };
            entries.push(Entry { mode: meta.mode, filename: basename(path), oid });
        }
        Tree::sort(&mut entries);
        self.write_tree(&Tree { entries })
    }
}

/// One path's classification in [`Repository::status_matrix`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusMatrixRow {
    /// The path, relative to the working tree root.
    pub path: BString,
    /// How this path differs between `HEAD` and the index, if at all.
    pub head_vs_index: Option<Status>,
    /// How this path differs between the index and the working tree, if at all.
    pub index_vs_workdir: Option<Status>,
}

impl StatusMatrixRow {
    fn unchanged(path: BString) -> Self {
        StatusMatrixRow { path, head_vs_index: None, index_vs_workdir: None }
    }
}

fn basename(path: &BStr) -> BString {
    match path.rfind_byte(b'/') {
        Some(pos) => BString::from(&path[pos + 1..]),
        None => BString::from(path.to_vec()),
    }
}

/// [`Repository::diff_index_to_workdir`]'s directory walk listed `path` but a subsequent
/// `metadata` call found nothing there (a race with a concurrent working-tree mutation).
#[derive(Debug, thiserror::Error)]
#[error("{0:?} disappeared from the working tree while diffing")]
struct MissingWorkdirEntry(BString);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::memory::Memory as GitMemory;
    use git_worktree::backend::memory::Memory as WorktreeMemory;

    #[test]
    fn diff_index_to_workdir_reports_an_added_file() {
        let repo = Repository::new(GitMemory::new(), git_hash::Kind::Sha1);
        let backend = WorktreeMemory::new();
        backend.write_file(BStr::new(b"a.txt"), EntryMode::Blob, b"hi").unwrap();

        let changes = repo.diff_index_to_workdir(&backend, None, &DiffOptions::default()).unwrap();
        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].status, Status::Added);
        assert_eq!(changes[0].path, "a.txt");
    }

    #[test]
    fn status_matrix_separates_staged_from_unstaged_changes() {
        let repo = Repository::new(GitMemory::new(), git_hash::Kind::Sha1);
        let backend = WorktreeMemory::new();
        backend.write_file(BStr::new(b"a.txt"), EntryMode::Blob, b"hi").unwrap();
        repo.add(&backend, BStr::new(b"a.txt")).unwrap();
        backend.write_file(BStr::new(b"b.txt"), EntryMode::Blob, b"untracked").unwrap();

        let rows = repo.status_matrix(&backend, None).unwrap();
        let a = rows.iter().find(|r| r.path == "a.txt").unwrap();
        assert_eq!(a.head_vs_index, Some(Status::Added));
        assert_eq!(a.index_vs_workdir, None);

        let b = rows.iter().find(|r| r.path == "b.txt").unwrap();
        assert_eq!(b.head_vs_index, None);
        assert_eq!(b.index_vs_workdir, Some(Status::Added));
    }
}
