//! The checkout planner: diff a target tree against the index and working tree, produce a list
//! of operations, then apply them in a dependency-safe order (spec.md §4.5).

use std::collections::BTreeSet;

use bstr::{BStr, BString, ByteSlice};
use git_hash::ObjectId;
use git_index::{Entry, Stage, State, Time};
use git_object::tree::EntryMode;

use crate::backend::{Metadata, WorktreeBackend};
use crate::store::Store;

/// Why [`analyze()`] refused to plan an update for a path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum ConflictReason {
    /// The working tree file differs from both the index and the target, and `force` wasn't set.
    #[error("the working tree file has local modifications that would be overwritten")]
    WorkdirModified,
    /// The target wants a file at this path, but the working tree has a directory there.
    #[error("a directory occupies this path in the working tree")]
    DirectoryInTheWay,
}

/// One step of a checkout plan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Op {
    /// Create `path` as a directory; always ordered before any `Create`/`Update` under it.
    Mkdir(BString),
    /// `path` is in the target tree but absent from both index and working tree.
    Create {
        #[allow(missing_docs)]
        path: BString,
        #[allow(missing_docs)]
        oid: ObjectId,
        #[allow(missing_docs)]
        mode: EntryMode,
    },
    /// `path` is in the target tree and already materialised, but at a different oid or mode.
    Update {
        #[allow(missing_docs)]
        path: BString,
        #[allow(missing_docs)]
        oid: ObjectId,
        #[allow(missing_docs)]
        mode: EntryMode,
    },
    /// `path` is tracked but absent from the target; remove it from both index and disk.
    Delete(BString),
    /// `path` must leave the index but its working tree file is kept (sparse exclusion).
    DeleteIndex(BString),
    /// `path` already matches the target; nothing to do.
    Keep(BString),
    /// Applying the target at `path` would silently discard a local change; `force` was false.
    Conflict {
        #[allow(missing_docs)]
        path: BString,
        #[allow(missing_docs)]
        reason: ConflictReason,
    },
}

/// The error produced by [`analyze()`] or [`apply()`], generic over the [`Store`] and
/// [`WorktreeBackend`] error types in use.
#[derive(Debug, thiserror::Error)]
pub enum Error<S, B> {
    #[allow(missing_docs)]
    #[error(transparent)]
    Store(S),
    #[allow(missing_docs)]
    #[error(transparent)]
    Backend(B),
    /// [`apply()`] was handed a plan containing a [`Op::Conflict`]; callers must filter these out
    /// (or re-run [`analyze()`] with `force: true`) before applying.
    #[error("checkout of {path:?} was blocked: {reason}")]
    Conflict {
        #[allow(missing_docs)]
        path: BString,
        #[allow(missing_docs)]
        reason: ConflictReason,
    },
}

pub(crate) fn expand_tree<S: Store>(store: &S, root: Option<ObjectId>) -> Result<std::collections::BTreeMap<BString, (EntryMode, ObjectId)>, S::Error> {
    let mut out = std::collections::BTreeMap::new();
    if let Some(root) = root {
        expand_into(store, &root, BStr::new(b""), &mut out)?;
    }
    Ok(out)
}

fn expand_into<S: Store>(
    store: &S,
    id: &ObjectId,
    prefix: &BStr,
    out: &mut std::collections::BTreeMap<BString, (EntryMode, ObjectId)>,
) -> Result<(), S::Error> {
    let tree = store.find_tree(id)?;
    for entry in tree.entries {
        let path = git_path::join(prefix, entry.filename.as_bstr());
        if entry.mode.is_tree() {
            expand_into(store, &entry.oid, path.as_bstr(), out)?;
        } else {
            out.insert(path, (entry.mode, entry.oid));
        }
    }
    Ok(())
}

fn ancestor_dirs(path: &BStr) -> Vec<BString> {
    let mut dirs = Vec::new();
    let mut current = path;
    loop {
        let (dir, _) = git_path::split_basename(current);
        if dir.is_empty() {
            break;
        }
        dirs.push(dir.to_owned());
        current = dirs.last().expect("just pushed").as_bstr();
    }
    dirs
}

fn path_matches(path: &BStr, filter: &BStr) -> bool {
    let path_bytes: &[u8] = path;
    let filter_bytes: &[u8] = filter;
    path_bytes == filter_bytes || (path_bytes.starts_with(filter_bytes) && path_bytes.get(filter_bytes.len()) == Some(&b'/'))
}

pub(crate) fn workdir_oid<B: WorktreeBackend>(backend: &B, path: &BStr, hash_kind: git_hash::Kind) -> Result<ObjectId, B::Error> {
    let content = backend.read_file(path)?;
    Ok(git_object::hash(hash_kind, git_object::Kind::Blob, &content))
}

/// Compare `target` against `index` and the working tree `backend` sees, producing an ordered
/// plan: directory creations first, then file writes/keeps, then deletions last (spec.md §4.5:
/// "mkdirs before writes; deletes after writes").
///
/// `path_filter` restricts the plan to one path (and its descendants, if it names a directory).
/// `sparse` further restricts which target paths are actually materialised; excluded paths that
/// are staged get [`Op::DeleteIndex`] instead of [`Op::Delete`], per spec.md §4.5. With `force`,
/// what would otherwise be [`Op::Conflict`] becomes [`Op::Update`].
pub fn analyze<S: Store, B: WorktreeBackend>(
    store: &S,
    backend: &B,
    index: &State,
    target: Option<ObjectId>,
    path_filter: Option<&BStr>,
    sparse: Option<&git_glob::PatternList>,
    force: bool,
) -> Result<Vec<Op>, Error<S::Error, B::Error>> {
    let target_files = expand_tree(store, target).map_err(Error::Store)?;

    let mut dirs = BTreeSet::new();
    for path in target_files.keys() {
        dirs.extend(ancestor_dirs(path.as_bstr()));
    }

    let mut mkdirs = Vec::new();
    for dir in dirs {
        if let Some(filter) = path_filter {
            if !path_matches(dir.as_bstr(), filter) && !path_matches(filter, dir.as_bstr()) {
                continue;
            }
        }
        let exists = backend.metadata(dir.as_bstr()).map_err(Error::Backend)?.map_or(false, |m| m.is_dir);
        if !exists {
            mkdirs.push(Op::Mkdir(dir));
        }
    }

    let mut all_paths: BTreeSet<BString> = target_files.keys().cloned().collect();
    for entry in index.entries() {
        if entry.stage == Stage::Clean {
            all_paths.insert(entry.path.clone());
        }
    }

    let mut writes = Vec::new();
    let mut deletes = Vec::new();

    for path in all_paths {
        if let Some(filter) = path_filter {
            if !path_matches(path.as_bstr(), filter) {
                continue;
            }
        }

        let target_entry = target_files.get(&path).copied();
        let index_entry = index.entry_by_path(path.as_bstr());

        let sparse_excludes = sparse.map_or(false, |patterns| !patterns.is_match(path.as_bstr(), false));
        if sparse_excludes && target_entry.is_some() {
            if index_entry.is_some() {
                deletes.push(Op::DeleteIndex(path));
            }
            continue;
        }

        match target_entry {
            None => deletes.push(Op::Delete(path)),
            Some((mode, oid)) => {
                let workdir_meta = backend.metadata(path.as_bstr()).map_err(Error::Backend)?;
                match workdir_meta {
                    None => writes.push(Op::Create { path, oid, mode }),
                    Some(meta) if meta.is_dir => {
                        if force {
                            writes.push(Op::Update { path, oid, mode });
                        } else {
                            writes.push(Op::Conflict {
                                path,
                                reason: ConflictReason::DirectoryInTheWay,
                            });
                        }
                    }
                    Some(meta) => {
                        let actual_oid = workdir_oid(backend, path.as_bstr(), index.hash_kind()).map_err(Error::Backend)?;
                        if actual_oid == oid && meta.mode == mode {
                            writes.push(Op::Keep(path));
                        } else {
                            let matches_index = index_entry.map_or(false, |e| e.oid == actual_oid && e.mode == meta.mode);
                            if matches_index || force {
                                writes.push(Op::Update { path, oid, mode });
                            } else {
                                writes.push(Op::Conflict {
                                    path,
                                    reason: ConflictReason::WorkdirModified,
                                });
                            }
                        }
                    }
                }
            }
        }
    }

    let mut ops = mkdirs;
    ops.extend(writes);
    ops.extend(deletes);
    Ok(ops)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::memory::Memory;
    use crate::test_support::{blob_entry, oid, MemoryStore};

    fn empty_index() -> State {
        State::from_entries(Vec::new(), git_hash::Kind::Sha1)
    }

    #[test]
    fn analyze_creates_a_file_absent_from_an_empty_workdir() {
        let store = MemoryStore::default();
        let blob = store.put_blob(b"hello");
        let target = store.put_tree(vec![blob_entry("a.txt", blob)]);
        let backend = Memory::new();
        let index = empty_index();

        let ops = analyze(&store, &backend, &index, Some(target), None, None, false).unwrap();
        assert_eq!(ops, vec![Op::Create { path: "a.txt".into(), oid: blob, mode: EntryMode::Blob }]);
    }

    #[test]
    fn apply_writes_the_file_and_stages_it() {
        let store = MemoryStore::default();
        let blob = store.put_blob(b"hello");
        let target = store.put_tree(vec![blob_entry("a.txt", blob)]);
        let backend = Memory::new();
        let mut index = empty_index();

        let ops = analyze(&store, &backend, &index, Some(target), None, None, false).unwrap();
        apply(&store, &backend, &mut index, &ops).unwrap();

        assert_eq!(backend.read_file(BStr::new(b"a.txt")).unwrap(), b"hello");
        assert!(index.entry_by_path(BStr::new(b"a.txt")).is_some());
    }

    #[test]
    fn analyze_creates_mkdir_ops_for_new_directories() {
        let store = MemoryStore::default();
        let blob = store.put_blob(b"hi");
        let target = store.put_tree(vec![blob_entry("dir/a.txt", blob)]);
        let backend = Memory::new();
        let index = empty_index();

        let ops = analyze(&store, &backend, &index, Some(target), None, None, false).unwrap();
        assert!(matches!(&ops[0], Op::Mkdir(p) if p == "dir"));
    }

    #[test]
    fn analyze_deletes_a_path_removed_from_the_target() {
        let store = MemoryStore::default();
        let backend = Memory::new();
        backend.write_file(BStr::new(b"old.txt"), EntryMode::Blob, b"gone").unwrap();
        let oid_old = git_object::hash(git_hash::Kind::Sha1, git_object::Kind::Blob, b"gone");
        let index = State::from_entries(
            vec![Entry {
                ctime: Time::default(),
                mtime: Time::default(),
                dev: 0,
                ino: 0,
                mode: EntryMode::Blob,
                uid: 0,
                gid: 0,
                size: 4,
                oid: oid_old,
                stage: Stage::Clean,
                assume_valid: false,
                path: "old.txt".into(),
            }],
            git_hash::Kind::Sha1,
        );

        let ops = analyze(&store, &backend, &index, None, None, None, false).unwrap();
        assert_eq!(ops, vec![Op::Delete("old.txt".into())]);
    }

    #[test]
    fn analyze_flags_a_dirty_workdir_file_as_conflict_without_force() {
        let store = MemoryStore::default();
        let target_blob = store.put_blob(b"from target");
        let target = store.put_tree(vec![blob_entry("a.txt", target_blob)]);
        let backend = Memory::new();
        backend.write_file(BStr::new(b"a.txt"), EntryMode::Blob, b"local edit").unwrap();
        let index = empty_index();

        let ops = analyze(&store, &backend, &index, Some(target), None, None, false).unwrap();
        assert!(matches!(
            ops[0],
            Op::Conflict {
                reason: ConflictReason::WorkdirModified,
                ..
            }
        ));
    }

    #[test]
    fn force_turns_a_conflict_into_an_update() {
        let store = MemoryStore::default();
        let target_blob = store.put_blob(b"from target");
        let target = store.put_tree(vec![blob_entry("a.txt", target_blob)]);
        let backend = Memory::new();
        backend.write_file(BStr::new(b"a.txt"), EntryMode::Blob, b"local edit").unwrap();
        let index = empty_index();

        let ops = analyze(&store, &backend, &index, Some(target), None, None, true).unwrap();
        assert!(matches!(ops[0], Op::Update { oid, .. } if oid == target_blob));
    }
}

fn staged_entry<B: WorktreeBackend>(backend: &B, path: &BStr, mode: EntryMode, oid: ObjectId) -> Result<Entry, B::Error> {
    let meta = backend.metadata(path)?.unwrap_or(Metadata {
        is_dir: false,
        size: 0,
        mtime_secs: 0,
        mode,
    });
    let time = Time {
        secs: meta.mtime_secs as u32,
        nsecs: 0,
    };
    Ok(Entry {
        ctime: time,
        mtime: time,
        dev: 0,
        ino: 0,
        mode,
        uid: 0,
        gid: 0,
        size: meta.size as u32,
        oid,
        stage: Stage::Clean,
        assume_valid: false,
        path: path.to_owned(),
    })
}

/// Execute a plan produced by [`analyze()`] against `backend`, updating `index` in step so that,
/// on success, `index` reflects the new tree (spec.md §4.5: "update the index entries to
/// reflect the new tree; preserve untracked files").
///
/// Fails immediately, without partially applying later ops, if `ops` still contains an
/// [`Op::Conflict`] — re-run [`analyze()`] with `force: true` or drop the path from the plan.
pub fn apply<S: Store, B: WorktreeBackend>(store: &S, backend: &B, index: &mut State, ops: &[Op]) -> Result<(), Error<S::Error, B::Error>> {
    if let Some(Op::Conflict { path, reason }) = ops.iter().find(|op| matches!(op, Op::Conflict { .. })) {
        return Err(Error::Conflict {
            path: path.clone(),
            reason: *reason,
        });
    }

    let mut entries = index.entries().to_vec();
    for op in ops {
        match op {
            Op::Mkdir(path) => backend.create_dir_all(path.as_bstr()).map_err(Error::Backend)?,
            Op::Create { path, oid, mode } | Op::Update { path, oid, mode } => {
                let content = store.find_blob(oid).map_err(Error::Store)?;
                backend.write_file(path.as_bstr(), *mode, &content).map_err(Error::Backend)?;
                let entry = staged_entry(backend, path.as_bstr(), *mode, *oid).map_err(Error::Backend)?;
                entries.retain(|e| e.path != entry.path);
                entries.push(entry);
            }
            Op::Delete(path) => {
                backend.remove_file(path.as_bstr()).map_err(Error::Backend)?;
                entries.retain(|e| e.path.as_bstr() != path.as_bstr());
                for dir in ancestor_dirs(path.as_bstr()) {
                    backend.remove_dir_if_empty(dir.as_bstr()).map_err(Error::Backend)?;
                }
            }
            Op::DeleteIndex(path) => entries.retain(|e| e.path.as_bstr() != path.as_bstr()),
            Op::Keep(_) => {}
            Op::Conflict { .. } => unreachable!("checked for conflicts above"),
        }
    }
    *index = State::from_entries(entries, index.hash_kind());
    Ok(())
}
