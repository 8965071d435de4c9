//! Three-way content merge: fast-forward/no-op detection, merge-base computation, and per-path
//! merging of the resulting trees (spec.md §4.7). Writing the resulting merge commit and moving
//! branch/HEAD refs is left to the caller, which has the ref store this crate doesn't depend on.

use std::collections::BTreeSet;

use bstr::{BStr, BString, ByteSlice};
use git_hash::ObjectId;
use git_index::{Entry, Stage, State, Time};
use git_object::tree::EntryMode;
use git_revision::CommitGraph;

use crate::backend::WorktreeBackend;
use crate::checkout::expand_tree;
use crate::store::Store;

/// Knobs mirroring `merge()`'s options object (spec.md §4.7).
#[derive(Debug, Clone, Copy, Default)]
pub struct Options {
    /// Permit writing a fast-forward when `theirs` is a descendant of `ours`.
    pub fast_forward: bool,
    /// Fail instead of performing a real merge when a fast-forward isn't possible.
    pub fast_forward_only: bool,
    /// Roll back instead of leaving conflict markers and unmerged index entries.
    pub abort_on_conflict: bool,
}

/// What a [`merge()`] call decided to do. [`Outcome::Merged`] and [`Outcome::FastForward`] both
/// carry the index their caller should adopt; [`Outcome::AlreadyMerged`] leaves everything as-is.
#[derive(Debug)]
pub enum Outcome {
    /// `theirs` was already reachable from `ours`; nothing to do.
    AlreadyMerged,
    /// `ours` was a strict ancestor of `theirs`; the working tree and `index` were updated to
    /// `theirs` directly, no merge commit needed.
    FastForward { to: ObjectId, index: State },
    /// A real three-way merge ran. `conflicts` lists paths left unmerged in `index`; empty means
    /// a clean merge, ready for its caller to write a merge commit with parents `[ours, theirs]`.
    Merged { index: State, conflicts: Vec<BString> },
}

/// What a caller-supplied merge driver decided for one conflicting path.
pub struct DriverResult {
    /// `true` if `content` should be staged as the resolved blob; `false` if the path should
    /// instead be written with conflict markers and left unmerged.
    pub clean: bool,
    /// The driver's merged content. Ignored when `clean` is `false`.
    pub content: Vec<u8>,
}

/// The error produced by [`merge()`].
#[derive(Debug, thiserror::Error)]
pub enum Error<S, B> {
    #[allow(missing_docs)]
    #[error(transparent)]
    Store(S),
    #[allow(missing_docs)]
    #[error(transparent)]
    Backend(B),
    #[allow(missing_docs)]
    #[error(transparent)]
    Graph(git_revision::graph::Error<S>),
    /// `options.fast_forward_only` was set but `ours` and `theirs` had diverged.
    #[error("a fast-forward merge wasn't possible and fast_forward_only was set")]
    FastForwardOnly,
    /// `options.abort_on_conflict` was set and at least one path conflicted.
    #[error("merge produced conflicts and abort_on_conflict was set")]
    Conflict {
        #[allow(missing_docs)]
        paths: Vec<BString>,
    },
    /// `ours` and `theirs` share no common history at all.
    #[error("{ours} and {theirs} share no common ancestor")]
    Unrelated {
        #[allow(missing_docs)]
        ours: ObjectId,
        #[allow(missing_docs)]
        theirs: ObjectId,
    },
}

const MAX_ANCESTRY_DEPTH: usize = 1 << 20;

fn is_descendant<S: Store>(store: &S, oid: ObjectId, ancestor: ObjectId) -> Result<bool, git_revision::graph::Error<S::Error>> {
    git_revision::is_descendant(store, oid, ancestor, MAX_ANCESTRY_DEPTH)
}

fn commit_tree<S: Store>(store: &S, commit: ObjectId) -> Result<ObjectId, git_revision::graph::Error<S::Error>> {
    store
        .find_commit(&commit)
        .map_err(git_revision::graph::Error::Lookup)?
        .map(|c| c.tree)
        .ok_or(git_revision::graph::Error::NotACommit { id: commit })
}

enum Resolution {
    Take(EntryMode, ObjectId),
    Remove,
    Conflict {
        marker: Vec<u8>,
        base: Option<(EntryMode, ObjectId)>,
        ours: Option<(EntryMode, ObjectId)>,
        theirs: Option<(EntryMode, ObjectId)>,
    },
}

/// Merge `theirs` into `ours`, three-way, against `base_index`'s hash kind. A clean resolution at
/// a path always produces a fresh index entry for it; [`Outcome::Merged`]/[`Outcome::FastForward`]
/// never carry over `base_index`'s stat cache, since every touched path's content may have moved.
pub fn merge<S: Store, B: WorktreeBackend>(
    store: &S,
    backend: &B,
    base_index: &State,
    ours: ObjectId,
    theirs: ObjectId,
    options: &Options,
    mut merge_driver: impl FnMut(Option<&[u8]>, Option<&[u8]>, Option<&[u8]>) -> DriverResult,
) -> Result<Outcome, Error<S::Error, B::Error>> {
    if is_descendant(store, ours, theirs).map_err(Error::Graph)? {
        return Ok(Outcome::AlreadyMerged);
    }
    if is_descendant(store, theirs, ours).map_err(Error::Graph)? {
        if !options.fast_forward {
            return Err(Error::FastForwardOnly);
        }
        let index = fast_forward(store, backend, theirs, base_index.hash_kind())?;
        return Ok(Outcome::FastForward { to: theirs, index });
    }
    if options.fast_forward_only {
        return Err(Error::FastForwardOnly);
    }

    let base = git_revision::find_merge_base(store, &[ours, theirs])
        .map_err(Error::Graph)?
        .ok_or(Error::Unrelated { ours, theirs })?;

    let base_tree = commit_tree(store, base).map_err(Error::Graph)?;
    let ours_tree = commit_tree(store, ours).map_err(Error::Graph)?;
    let theirs_tree = commit_tree(store, theirs).map_err(Error::Graph)?;

    let base_files = expand_tree(store, Some(base_tree)).map_err(Error::Store)?;
    let ours_files = expand_tree(store, Some(ours_tree)).map_err(Error::Store)?;
    let theirs_files = expand_tree(store, Some(theirs_tree)).map_err(Error::Store)?;

    let mut all_paths: BTreeSet<BString> = base_files.keys().cloned().collect();
    all_paths.extend(ours_files.keys().cloned());
    all_paths.extend(theirs_files.keys().cloned());

    // Every path is resolved purely in memory first, touching only the object store (writing a
    // clean mergeDriver result as a new blob is harmless to leave behind even if the merge is
    // later aborted). The working tree and index are only mutated once we know the merge won't
    // be rolled back.
    let mut plan = Vec::new();
    let mut conflicts = Vec::new();

    for path in all_paths {
        let base_side = base_files.get(&path).copied();
        let ours_side = ours_files.get(&path).copied();
        let theirs_side = theirs_files.get(&path).copied();

        let resolution = if ours_side == theirs_side {
            ours_side.map_or(Resolution::Remove, |(m, o)| Resolution::Take(m, o))
        } else if base_side == ours_side {
            theirs_side.map_or(Resolution::Remove, |(m, o)| Resolution::Take(m, o))
        } else if base_side == theirs_side {
            ours_side.map_or(Resolution::Remove, |(m, o)| Resolution::Take(m, o))
        } else {
            let base_blob = read_blob_if_file(store, base_side).map_err(Error::Store)?;
            let ours_blob = read_blob_if_file(store, ours_side).map_err(Error::Store)?;
            let theirs_blob = read_blob_if_file(store, theirs_side).map_err(Error::Store)?;

            let all_blob_like = [base_side, ours_side, theirs_side]
                .iter()
                .flatten()
                .all(|(mode, _)| matches!(mode, EntryMode::Blob | EntryMode::BlobExecutable));

            let driver_result = all_blob_like.then(|| merge_driver(base_blob.as_deref(), ours_blob.as_deref(), theirs_blob.as_deref()));

            match driver_result {
                Some(result) if result.clean => {
                    let mode = ours_side.map(|(m, _)| m).or(theirs_side.map(|(m, _)| m)).unwrap_or(EntryMode::Blob);
                    let oid = store.write_blob(&result.content).map_err(Error::Store)?;
                    Resolution::Take(mode, oid)
                }
                _ => {
                    conflicts.push(path.clone());
                    Resolution::Conflict {
                        marker: conflict_markers(ours_blob.as_deref(), theirs_blob.as_deref()),
                        base: base_side,
                        ours: ours_side,
                        theirs: theirs_side,
                    }
                }
            }
        };

        plan.push((path, resolution));
    }

    if options.abort_on_conflict && !conflicts.is_empty() {
        return Err(Error::Conflict { paths: conflicts });
    }

    let mut entries = Vec::new();
    for (path, resolution) in plan {
        match resolution {
            Resolution::Take(mode, oid) => {
                let content = store.find_blob(&oid).map_err(Error::Store)?;
                backend.write_file(path.as_bstr(), mode, &content).map_err(Error::Backend)?;
                entries.push(Entry {
                    ctime: Time::default(),
                    mtime: Time::default(),
                    dev: 0,
                    ino: 0,
                    mode,
                    uid: 0,
                    gid: 0,
                    size: content.len() as u32,
                    oid,
                    stage: Stage::Clean,
                    assume_valid: false,
                    path,
                });
            }
            Resolution::Remove => backend.remove_file(path.as_bstr()).map_err(Error::Backend)?,
            Resolution::Conflict { marker, base, ours, theirs } => {
                backend.write_file(path.as_bstr(), EntryMode::Blob, &marker).map_err(Error::Backend)?;
                for (stage, side) in [(Stage::Base, base), (Stage::Ours, ours), (Stage::Theirs, theirs)] {
                    if let Some((mode, oid)) = side {
                        entries.push(unmerged_entry(path.as_bstr(), mode, oid, stage));
                    }
                }
            }
        }
    }

    let index = State::from_entries(entries, base_index.hash_kind());
    Ok(Outcome::Merged { index, conflicts })
}

fn fast_forward<S: Store, B: WorktreeBackend>(
    store: &S,
    backend: &B,
    theirs: ObjectId,
    hash_kind: git_hash::Kind,
) -> Result<State, Error<S::Error, B::Error>> {
    let tree = commit_tree(store, theirs).map_err(Error::Graph)?;
    let files = expand_tree(store, Some(tree)).map_err(Error::Store)?;
    let mut entries = Vec::new();
    for (path, (mode, oid)) in files {
        let content = store.find_blob(&oid).map_err(Error::Store)?;
        backend.write_file(path.as_bstr(), mode, &content).map_err(Error::Backend)?;
        entries.push(Entry {
            ctime: Time::default(),
            mtime: Time::default(),
            dev: 0,
            ino: 0,
            mode,
            uid: 0,
            gid: 0,
            size: content.len() as u32,
            oid,
            stage: Stage::Clean,
            assume_valid: false,
            path,
        });
    }
    Ok(State::from_entries(entries, hash_kind))
}

fn read_blob_if_file<S: Store>(store: &S, side: Option<(EntryMode, ObjectId)>) -> Result<Option<Vec<u8>>, S::Error> {
    match side {
        Some((mode, oid)) if matches!(mode, EntryMode::Blob | EntryMode::BlobExecutable) => Ok(Some(store.find_blob(&oid)?)),
        _ => Ok(None),
    }
}

fn unmerged_entry(path: &BStr, mode: EntryMode, oid: ObjectId, stage: Stage) -> Entry {
    Entry {
        ctime: Time::default(),
        mtime: Time::default(),
        dev: 0,
        ino: 0,
        mode,
        uid: 0,
        gid: 0,
        size: 0,
        oid,
        stage,
        assume_valid: false,
        path: path.to_owned(),
    }
}

fn conflict_markers(ours: Option<&[u8]>, theirs: Option<&[u8]>) -> Vec<u8> {
    let mut out = Vec::new();
    out.extend_from_slice(b"<<<<<<< ours\n");
    out.extend_from_slice(ours.unwrap_or(b""));
    out.extend_from_slice(b"=======\n");
    out.extend_from_slice(theirs.unwrap_or(b""));
    out.extend_from_slice(b">>>>>>> theirs\n");
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::memory::Memory;
    use crate::test_support::{blob_entry, MemoryStore};

    fn no_driver(_base: Option<&[u8]>, _ours: Option<&[u8]>, _theirs: Option<&[u8]>) -> DriverResult {
        DriverResult { clean: false, content: Vec::new() }
    }

    fn empty_index() -> State {
        State::from_entries(Vec::new(), git_hash::Kind::Sha1)
    }

    #[test]
    fn already_merged_when_theirs_is_an_ancestor_of_ours() {
        let store = MemoryStore::default();
        let blob = store.put_blob(b"x");
        let tree = store.put_tree(vec![blob_entry("a.txt", blob)]);
        let base = store.put_commit(tree, &[], 1);
        let ours = store.put_commit(tree, &[base], 2);
        let backend = Memory::new();

        let outcome = merge(&store, &backend, &empty_index(), ours, base, &Options::default(), no_driver).unwrap();
        assert!(matches!(outcome, Outcome::AlreadyMerged));
    }

    #[test]
    fn fast_forward_writes_theirs_tree_and_advances() {
        let store = MemoryStore::default();
        let blob_a = store.put_blob(b"a");
        let blob_b = store.put_blob(b"b");
        let tree1 = store.put_tree(vec![blob_entry("a.txt", blob_a)]);
        let tree2 = store.put_tree(vec![blob_entry("a.txt", blob_a), blob_entry("b.txt", blob_b)]);
        let ours = store.put_commit(tree1, &[], 1);
        let theirs = store.put_commit(tree2, &[ours], 2);
        let backend = Memory::new();

        let options = Options { fast_forward: true, ..Options::default() };
        let outcome = merge(&store, &backend, &empty_index(), ours, theirs, &options, no_driver).unwrap();
        match outcome {
            Outcome::FastForward { to, index } => {
                assert_eq!(to, theirs);
                assert_eq!(index.entries().len(), 2);
                assert_eq!(backend.read_file(BStr::new(b"b.txt")).unwrap(), b"b");
            }
            other => panic!("expected fast-forward, got {other:?}"),
        }
    }

    #[test]
    fn fast_forward_only_fails_on_divergent_history() {
        let store = MemoryStore::default();
        let blob = store.put_blob(b"x");
        let base_tree = store.put_tree(vec![blob_entry("a.txt", blob)]);
        let base = store.put_commit(base_tree, &[], 1);
        let ours_blob = store.put_blob(b"ours");
        let ours_tree = store.put_tree(vec![blob_entry("a.txt", ours_blob)]);
        let ours = store.put_commit(ours_tree, &[base], 2);
        let theirs_blob = store.put_blob(b"theirs");
        let theirs_tree = store.put_tree(vec![blob_entry("a.txt", theirs_blob)]);
        let theirs = store.put_commit(theirs_tree, &[base], 2);
        let backend = Memory::new();

        let options = Options { fast_forward_only: true, ..Options::default() };
        let err = merge(&store, &backend, &empty_index(), ours, theirs, &options, no_driver).unwrap_err();
        assert!(matches!(err, Error::FastForwardOnly));
    }

    #[test]
    fn clean_merge_when_each_side_touches_a_different_path() {
        let store = MemoryStore::default();
        let shared = store.put_blob(b"shared");
        let base_tree = store.put_tree(vec![blob_entry("shared.txt", shared)]);
        let base = store.put_commit(base_tree, &[], 1);

        let ours_new = store.put_blob(b"ours-only");
        let ours_tree = store.put_tree(vec![blob_entry("shared.txt", shared), blob_entry("ours.txt", ours_new)]);
        let ours = store.put_commit(ours_tree, &[base], 2);

        let theirs_new = store.put_blob(b"theirs-only");
        let theirs_tree = store.put_tree(vec![blob_entry("shared.txt", shared), blob_entry("theirs.txt", theirs_new)]);
        let theirs = store.put_commit(theirs_tree, &[base], 2);

        let backend = Memory::new();
        let outcome = merge(&store, &backend, &empty_index(), ours, theirs, &Options::default(), no_driver).unwrap();
        match outcome {
            Outcome::Merged { index, conflicts } => {
                assert!(conflicts.is_empty());
                assert_eq!(index.entries().len(), 3);
                assert_eq!(backend.read_file(BStr::new(b"ours.txt")).unwrap(), b"ours-only");
                assert_eq!(backend.read_file(BStr::new(b"theirs.txt")).unwrap(), b"theirs-only");
            }
            other => panic!("expected a clean merge, got {other:?}"),
        }
    }

    #[test]
    fn conflicting_edits_fall_back_to_conflict_markers() {
        let store = MemoryStore::default();
        let base_blob = store.put_blob(b"base\n");
        let base_tree = store.put_tree(vec![blob_entry("a.txt", base_blob)]);
        let base = store.put_commit(base_tree, &[], 1);

        let ours_blob = store.put_blob(b"ours\n");
        let ours_tree = store.put_tree(vec![blob_entry("a.txt", ours_blob)]);
        let ours = store.put_commit(ours_tree, &[base], 2);

        let theirs_blob = store.put_blob(b"theirs\n");
        let theirs_tree = store.put_tree(vec![blob_entry("a.txt", theirs_blob)]);
        let theirs = store.put_commit(theirs_tree, &[base], 2);

        let backend = Memory::new();
        let outcome = merge(&store, &backend, &empty_index(), ours, theirs, &Options::default(), no_driver).unwrap();
        match outcome {
            Outcome::Merged { index, conflicts } => {
                assert_eq!(conflicts, vec![BString::from("a.txt")]);
                assert!(index.unmerged_paths().iter().any(|p| *p == BStr::new(b"a.txt")));
                let content = backend.read_file(BStr::new(b"a.txt")).unwrap();
                assert_eq!(content, b"<<<<<<< ours\nours\n=======\ntheirs\n>>>>>>> theirs\n");
            }
            other => panic!("expected a conflicted merge, got {other:?}"),
        }
    }

    #[test]
    fn abort_on_conflict_leaves_the_backend_untouched() {
        let store = MemoryStore::default();
        let base_blob = store.put_blob(b"base\n");
        let base_tree = store.put_tree(vec![blob_entry("a.txt", base_blob)]);
        let base = store.put_commit(base_tree, &[], 1);

        let ours_blob = store.put_blob(b"ours\n");
        let ours_tree = store.put_tree(vec![blob_entry("a.txt", ours_blob)]);
        let ours = store.put_commit(ours_tree, &[base], 2);

        let theirs_blob = store.put_blob(b"theirs\n");
        let theirs_tree = store.put_tree(vec![blob_entry("a.txt", theirs_blob)]);
        let theirs = store.put_commit(theirs_tree, &[base], 2);

        let backend = Memory::new();
        let options = Options { abort_on_conflict: true, ..Options::default() };
        let err = merge(&store, &backend, &empty_index(), ours, theirs, &options, no_driver).unwrap_err();
        assert!(matches!(err, Error::Conflict { .. }));
        assert!(backend.metadata(BStr::new(b"a.txt")).unwrap().is_none());
    }

    #[test]
    fn merge_driver_resolves_a_conflict_cleanly() {
        let store = MemoryStore::default();
        let base_blob = store.put_blob(b"base\n");
        let base_tree = store.put_tree(vec![blob_entry("a.txt", base_blob)]);
        let base = store.put_commit(base_tree, &[], 1);

        let ours_blob = store.put_blob(b"ours\n");
        let ours_tree = store.put_tree(vec![blob_entry("a.txt", ours_blob)]);
        let ours = store.put_commit(ours_tree, &[base], 2);

        let theirs_blob = store.put_blob(b"theirs\n");
        let theirs_tree = store.put_tree(vec![blob_entry("a.txt", theirs_blob)]);
        let theirs = store.put_commit(theirs_tree, &[base], 2);

        let backend = Memory::new();
        let driver = |_base: Option<&[u8]>, _ours: Option<&[u8]>, _theirs: Option<&[u8]>| DriverResult {
            clean: true,
            content: b"resolved\n".to_vec(),
        };
        let outcome = merge(&store, &backend, &empty_index(), ours, theirs, &Options::default(), driver).unwrap();
        match outcome {
            Outcome::Merged { conflicts, .. } => {
                assert!(conflicts.is_empty());
                assert_eq!(backend.read_file(BStr::new(b"a.txt")).unwrap(), b"resolved\n");
            }
            other => panic!("expected a clean merge, got {other:?}"),
        }
    }
}
