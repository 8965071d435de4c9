//! Classifying every path into the single status code `status()` reports (spec.md §4.6).

use std::collections::BTreeSet;

use bstr::{BStr, BString, ByteSlice};
use git_hash::ObjectId;
use git_index::{Stage, State};

use crate::backend::WorktreeBackend;
use crate::checkout::{expand_tree, workdir_oid};
use crate::store::Store;

/// The single-letter (or `*`-prefixed) code `status()` assigns to one path, per spec.md §4.6's
/// table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Code {
    /// `" "`: index matches HEAD, working tree matches index.
    Unchanged,
    /// `"M"`: staged change relative to HEAD, working tree matches the index.
    StagedModified,
    /// `"*A"`: not in the index, present in the working tree, not ignored.
    Untracked,
    /// `"*M"`: staged, but the working tree copy differs from what's staged.
    WorkdirModified,
    /// `"*D"`: staged, but missing from the working tree.
    WorkdirDeleted,
    /// `"U"`: left unmerged by a conflicted three-way merge.
    Unmerged,
    /// `"D"`: in HEAD, removed from the index.
    StagedDeleted,
    /// `"A"`: in the index, absent from HEAD.
    StagedAdded,
    /// `"I"`: untracked, but matched by an ignore pattern.
    Ignored,
}

/// One path's classification, as emitted by [`status()`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    #[allow(missing_docs)]
    pub path: BString,
    #[allow(missing_docs)]
    pub code: Code,
}

/// The error produced by [`status()`].
#[derive(Debug, thiserror::Error)]
pub enum Error<S, B> {
    #[allow(missing_docs)]
    #[error(transparent)]
    Store(S),
    #[allow(missing_docs)]
    #[error(transparent)]
    Backend(B),
}

fn list_all<B: WorktreeBackend>(backend: &B, dir: &BStr, out: &mut BTreeSet<BString>) -> Result<(), B::Error> {
    for child in backend.list_dir(dir)? {
        match backend.metadata(child.as_bstr())? {
            Some(meta) if meta.is_dir => list_all(backend, child.as_bstr(), out)?,
            Some(_) => {
                out.insert(child);
            }
            None => {}
        }
    }
    Ok(())
}

/// Classify every path reachable from the index, `head`'s tree, or the working tree `backend`
/// sees, restricting to `path_filter` when given. `ignored` decides whether an untracked path is
/// reported as [`Code::Untracked`] or [`Code::Ignored`].
pub fn status<S: Store, B: WorktreeBackend>(
    store: &S,
    backend: &B,
    index: &State,
    head: Option<ObjectId>,
    path_filter: Option<&BStr>,
    ignored: impl Fn(&BStr) -> bool,
) -> Result<Vec<Entry>, Error<S::Error, B::Error>> {
    let head_files = expand_tree(store, head).map_err(Error::Store)?;

    let mut paths: BTreeSet<BString> = index.entries().iter().map(|e| e.path.clone()).collect();
    paths.extend(head_files.keys().cloned());
    list_all(backend, BStr::new(b""), &mut paths).map_err(Error::Backend)?;

    let mut out = Vec::new();
    for path in paths {
        if let Some(filter) = path_filter {
            if !path_matches(path.as_bstr(), filter) {
                continue;
            }
        }

        if index.unmerged_paths().iter().any(|p| *p == path.as_bstr()) {
            out.push(Entry { path, code: Code::Unmerged });
            continue;
        }

        let index_entry = index.entries().iter().find(|e| e.stage == Stage::Clean && e.path == path);
        let head_entry = head_files.get(&path).copied();
        let workdir_meta = backend.metadata(path.as_bstr()).map_err(Error::Backend)?;

        let code = match index_entry {
            None => match (head_entry, workdir_meta) {
                (Some(_), None) => Code::StagedDeleted,
                (_, Some(_)) => {
                    if ignored(path.as_bstr()) {
                        Code::Ignored
                    } else {
                        Code::Untracked
                    }
                }
                (None, None) => continue,
            },
            Some(entry) => match workdir_meta {
                None => Code::WorkdirDeleted,
                Some(meta) if meta.is_dir => Code::WorkdirModified,
                Some(meta) => {
                    let actual_oid = workdir_oid(backend, path.as_bstr(), index.hash_kind()).map_err(Error::Backend)?;
                    if meta.mode != entry.mode || actual_oid != entry.oid {
                        Code::WorkdirModified
                    } else {
                        match head_entry {
                            None => Code::StagedAdded,
                            Some((head_mode, head_oid)) => {
                                if head_mode != entry.mode || head_oid != entry.oid {
                                    Code::StagedModified
                                } else {
                                    Code::Unchanged
                                }
                            }
                        }
                    }
                }
            },
        };
        out.push(Entry { path, code });
    }

    out.sort_by(|a, b| a.path.cmp(&b.path));
    Ok(out)
}

fn path_matches(path: &BStr, filter: &BStr) -> bool {
    let path_bytes: &[u8] = path;
    let filter_bytes: &[u8] = filter;
    path_bytes == filter_bytes || (path_bytes.starts_with(filter_bytes) && path_bytes.get(filter_bytes.len()) == Some(&b'/'))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::memory::Memory;
    use crate::test_support::{blob_entry, MemoryStore};
    use git_index::{Entry as IndexEntry, Time};
    use git_object::tree::EntryMode;

    fn clean_entry(path: &str, oid: ObjectId) -> IndexEntry {
        IndexEntry {
            ctime: Time::default(),
            mtime: Time::default(),
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
        }
    }

    #[test]
    fn unchanged_when_head_index_and_workdir_all_agree() {
        let store = MemoryStore::default();
        let blob = store.put_blob(b"same");
        let head = store.put_tree(vec![blob_entry("a.txt", blob)]);
        let backend = Memory::new();
        backend.write_file(BStr::new(b"a.txt"), EntryMode::Blob, b"same").unwrap();
        let index = State::from_entries(vec![clean_entry("a.txt", blob)], git_hash::Kind::Sha1);

        let entries = status(&store, &backend, &index, Some(head), None, |_| false).unwrap();
        assert_eq!(entries, vec![Entry { path: "a.txt".into(), code: Code::Unchanged }]);
    }

    #[test]
    fn untracked_file_not_in_the_index() {
        let store = MemoryStore::default();
        let backend = Memory::new();
        backend.write_file(BStr::new(b"new.txt"), EntryMode::Blob, b"hi").unwrap();
        let index = State::from_entries(Vec::new(), git_hash::Kind::Sha1);

        let entries = status(&store, &backend, &index, None, None, |_| false).unwrap();
        assert_eq!(entries, vec![Entry { path: "new.txt".into(), code: Code::Untracked }]);
    }

    #[test]
    fn ignored_file_is_reported_as_ignored() {
        let store = MemoryStore::default();
        let backend = Memory::new();
        backend.write_file(BStr::new(b"build.log"), EntryMode::Blob, b"x").unwrap();
        let index = State::from_entries(Vec::new(), git_hash::Kind::Sha1);

        let entries = status(&store, &backend, &index, None, None, |p: &BStr| -> bool {
            let bytes: &[u8] = p;
            bytes == b"build.log"
        })
        .unwrap();
        assert_eq!(entries, vec![Entry { path: "build.log".into(), code: Code::Ignored }]);
    }

    #[test]
    fn workdir_modification_over_a_clean_index_entry() {
        let store = MemoryStore::default();
        let blob = store.put_blob(b"original");
        let backend = Memory::new();
        backend.write_file(BStr::new(b"a.txt"), EntryMode::Blob, b"edited").unwrap();
        let index = State::from_entries(vec![clean_entry("a.txt", blob)], git_hash::Kind::Sha1);

        let entries = status(&store, &backend, &index, None, None, |_| false).unwrap();
        assert_eq!(entries, vec![Entry { path: "a.txt".into(), code: Code::WorkdirModified }]);
    }

    #[test]
    fn staged_addition_not_present_in_head() {
        let store = MemoryStore::default();
        let blob = store.put_blob(b"new");
        let backend = Memory::new();
        backend.write_file(BStr::new(b"a.txt"), EntryMode::Blob, b"new").unwrap();
        let index = State::from_entries(vec![clean_entry("a.txt", blob)], git_hash::Kind::Sha1);

        let entries = status(&store, &backend, &index, None, None, |_| false).unwrap();
        assert_eq!(entries, vec![Entry { path: "a.txt".into(), code: Code::StagedAdded }]);
    }
}
