//! Expanding two tree roots into flat path maps and classifying every path that differs
//! (spec.md §4.6).

use std::collections::{BTreeMap, BTreeSet};

use bstr::{BStr, BString, ByteSlice};
use git_hash::ObjectId;
use git_object::tree::{EntryMode, Tree};

use crate::similarity::similarity;

/// Resolves the two object kinds a tree diff needs: the trees themselves, recursively, and the
/// blobs of candidate rename pairs. The only capability `diff()` asks of a caller's object
/// store.
pub trait TreeFind {
    /// The error produced when a lookup fails or the object is missing.
    type Error: std::error::Error + Send + Sync + 'static;

    /// Decode the tree stored at `id`.
    fn find_tree(&self, id: &ObjectId) -> Result<Tree, Self::Error>;

    /// Decode the blob stored at `id`. Only called for deleted/added pairs being considered for
    /// rename detection.
    fn find_blob(&self, id: &ObjectId) -> Result<Vec<u8>, Self::Error>;
}

/// How a path changed between the two sides of a [`diff()`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    /// Present only on the new side.
    Added,
    /// Present only on the old side.
    Deleted,
    /// Present on both sides, at an oid or mode that differs.
    Modified,
    /// A deletion and an addition paired by content similarity (spec.md §4.6).
    Renamed,
}

/// One changed path, as emitted by [`diff()`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Change {
    /// The path on the new side (for [`Status::Deleted`], the path as it was on the old side).
    pub path: BString,
    /// How this path changed.
    pub status: Status,
    /// For [`Status::Renamed`], the path this entry was known as on the old side.
    pub old_path: Option<BString>,
    #[allow(missing_docs)]
    pub old_mode: Option<EntryMode>,
    #[allow(missing_docs)]
    pub new_mode: Option<EntryMode>,
    #[allow(missing_docs)]
    pub old_oid: Option<ObjectId>,
    #[allow(missing_docs)]
    pub new_oid: Option<ObjectId>,
}

/// Tunables mirroring the `diff.renames`/`diff.renameThreshold` config keys (spec.md §6);
/// `git-repository` reads config and fills these in before calling [`diff()`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Options {
    /// If `false`, every unmatched delete/add pair is reported as-is; renames are never paired.
    pub detect_renames: bool,
    /// The minimum [`crate::similarity()`] score (in `[0, 1]`) for a delete/add pair to be
    /// reported as a rename instead. Ignored when `detect_renames` is `false`.
    pub rename_threshold: f32,
}

impl Default for Options {
    fn default() -> Self {
        Options {
            detect_renames: false,
            rename_threshold: 0.5,
        }
    }
}

/// Diff `old` against `new`, recursively expanding both tree roots (`None` stands for the empty
/// tree, e.g. the parentless side of a root commit's diff), restricting to `path_filter` when
/// given (an exact path or a directory prefix).
///
/// Returns changes sorted by their (new-side, or for deletions old-side) path.
pub fn diff<F: TreeFind>(
    store: &F,
    old: Option<ObjectId>,
    new: Option<ObjectId>,
    path_filter: Option<&BStr>,
    options: &Options,
) -> Result<Vec<Change>, F::Error> {
    let old_map = expand(store, old)?;
    let new_map = expand(store, new)?;

    let mut deleted = Vec::new();
    let mut added = Vec::new();
    let mut changes = Vec::new();

    let all_paths: BTreeSet<&BString> = old_map.keys().chain(new_map.keys()).collect();
    for path in all_paths {
        if let Some(filter) = path_filter {
            if !path_matches(path.as_bstr(), filter) {
                continue;
            }
        }
        match (old_map.get(path), new_map.get(path)) {
            (Some(&(old_mode, old_oid)), Some(&(new_mode, new_oid))) => {
                if old_mode != new_mode || old_oid != new_oid {
                    changes.push(Change {
                        path: path.clone(),
                        status: Status::Modified,
                        old_path: None,
                        old_mode: Some(old_mode),
                        new_mode: Some(new_mode),
                        old_oid: Some(old_oid),
                        new_oid: Some(new_oid),
                    });
                }
            }
            (Some(&(old_mode, old_oid)), None) => deleted.push((path.clone(), old_mode, old_oid)),
            (None, Some(&(new_mode, new_oid))) => added.push((path.clone(), new_mode, new_oid)),
            (None, None) => unreachable!("path came from one of the two maps it's now missing from"),
        }
    }

    if options.detect_renames {
        pair_renames(store, &mut deleted, &mut added, options.rename_threshold, &mut changes)?;
    }

    for (path, mode, oid) in deleted {
        changes.push(Change {
            path,
            status: Status::Deleted,
            old_path: None,
            old_mode: Some(mode),
            new_mode: None,
            old_oid: Some(oid),
            new_oid: None,
        });
    }
    for (path, mode, oid) in added {
        changes.push(Change {
            path,
            status: Status::Added,
            old_path: None,
            old_mode: None,
            new_mode: Some(mode),
            old_oid: None,
            new_oid: Some(oid),
        });
    }

    changes.sort_by(|a, b| a.path.cmp(&b.path));
    Ok(changes)
}

type Entries = Vec<(BString, EntryMode, ObjectId)>;

/// Greedily pair each deleted path with its best-scoring unmatched added path, for any pair
/// scoring at or above `threshold`; matched pairs are removed from `deleted`/`added` and pushed
/// onto `changes` as [`Status::Renamed`].
fn pair_renames<F: TreeFind>(
    store: &F,
    deleted: &mut Entries,
    added: &mut Entries,
    threshold: f32,
    changes: &mut Vec<Change>,
) -> Result<(), F::Error> {
    let mut matched = vec![false; added.len()];
    let mut unmatched_deleted = Vec::new();

    for (old_path, old_mode, old_oid) in deleted.drain(..) {
        let old_blob = store.find_blob(&old_oid)?;
        let mut best: Option<(usize, f32)> = None;
        for (i, (_, _, new_oid)) in added.iter().enumerate() {
            if matched[i] {
                continue;
            }
            let new_blob = store.find_blob(new_oid)?;
            let score = similarity(&old_blob, &new_blob);
            if score >= threshold && best.map_or(true, |(_, best_score)| score > best_score) {
                best = Some((i, score));
            }
        }

        match best {
            Some((i, _)) => {
                matched[i] = true;
                let (new_path, new_mode, new_oid) = added[i].clone();
                changes.push(Change {
                    path: new_path,
                    status: Status::Renamed,
                    old_path: Some(old_path),
                    old_mode: Some(old_mode),
                    new_mode: Some(new_mode),
                    old_oid: Some(old_oid),
                    new_oid: Some(new_oid),
                });
            }
            None => unmatched_deleted.push((old_path, old_mode, old_oid)),
        }
    }

    *deleted = unmatched_deleted;
    *added = added
        .drain(..)
        .enumerate()
        .filter(|(i, _)| !matched[*i])
        .map(|(_, entry)| entry)
        .collect();
    Ok(())
}

fn expand<F: TreeFind>(store: &F, root: Option<ObjectId>) -> Result<BTreeMap<BString, (EntryMode, ObjectId)>, F::Error> {
    let mut out = BTreeMap::new();
    if let Some(root) = root {
        expand_into(store, &root, BStr::new(b""), &mut out)?;
    }
    Ok(out)
}

fn expand_into<F: TreeFind>(
    store: &F,
    id: &ObjectId,
    prefix: &BStr,
    out: &mut BTreeMap<BString, (EntryMode, ObjectId)>,
) -> Result<(), F::Error> {
    let tree = store.find_tree(id)?;
    for entry in tree.entries {
        let path = join(prefix, entry.filename.as_bstr());
        if entry.mode.is_tree() {
            expand_into(store, &entry.oid, path.as_bstr(), out)?;
        } else {
            out.insert(path, (entry.mode, entry.oid));
        }
    }
    Ok(())
}

fn join(prefix: &BStr, name: &BStr) -> BString {
    let mut out = BString::from(Vec::new());
    if !prefix.is_empty() {
        out.extend_from_slice(prefix);
        out.extend_from_slice(b"/");
    }
    out.extend_from_slice(name);
    out
}

fn path_matches(path: &BStr, filter: &BStr) -> bool {
    let path_bytes: &[u8] = path;
    let filter_bytes: &[u8] = filter;
    path_bytes == filter_bytes || (path_bytes.starts_with(filter_bytes) && path_bytes.get(filter_bytes.len()) == Some(&b'/'))
}

#[cfg(test)]
mod tests {
    use super::*;
    use git_object::tree::Entry;
    use std::collections::HashMap;

    struct MemoryStore {
        trees: HashMap<ObjectId, Tree>,
        blobs: HashMap<ObjectId, Vec<u8>>,
    }

    #[derive(Debug, thiserror::Error)]
    #[error("object not found")]
    struct NotFound;

    impl TreeFind for MemoryStore {
        type Error = NotFound;

        fn find_tree(&self, id: &ObjectId) -> Result<Tree, Self::Error> {
            self.trees.get(id).cloned().ok_or(NotFound)
        }

        fn find_blob(&self, id: &ObjectId) -> Result<Vec<u8>, Self::Error> {
            self.blobs.get(id).cloned().ok_or(NotFound)
        }
    }

    fn oid(byte: u8) -> ObjectId {
        ObjectId::from_bytes_unchecked(git_hash::Kind::Sha1, &[byte; 20])
    }

    fn blob_entry(name: &str, oid: ObjectId) -> Entry {
        Entry {
            mode: EntryMode::Blob,
            filename: name.into(),
            oid,
        }
    }

    #[test]
    fn reports_an_added_path() {
        let new_root = oid(2);
        let store = MemoryStore {
            trees: HashMap::from([(
                new_root,
                Tree {
                    entries: vec![blob_entry("b", oid(9))],
                },
            )]),
            blobs: HashMap::new(),
        };

        let changes = diff(&store, None, Some(new_root), None, &Options::default()).unwrap();
        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].status, Status::Added);
        assert_eq!(changes[0].path, "b");
    }

    #[test]
    fn reports_a_modified_path_when_oid_changes() {
        let old_root = oid(1);
        let new_root = oid(2);
        let store = MemoryStore {
            trees: HashMap::from([
                (
                    old_root,
                    Tree {
                        entries: vec![blob_entry("a", oid(10))],
                    },
                ),
                (
                    new_root,
                    Tree {
                        entries: vec![blob_entry("a", oid(11))],
                    },
                ),
            ]),
            blobs: HashMap::new(),
        };

        let changes = diff(&store, Some(old_root), Some(new_root), None, &Options::default()).unwrap();
        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].status, Status::Modified);
    }

    #[test]
    fn pairs_a_rename_when_content_is_similar_enough() {
        let old_root = oid(1);
        let new_root = oid(2);
        let old_blob_id = oid(20);
        let new_blob_id = oid(21);
        let store = MemoryStore {
            trees: HashMap::from([
                (
                    old_root,
                    Tree {
                        entries: vec![blob_entry("old_name.txt", old_blob_id)],
                    },
                ),
                (
                    new_root,
                    Tree {
                        entries: vec![blob_entry("new_name.txt", new_blob_id)],
                    },
                ),
            ]),
            blobs: HashMap::from([
                (old_blob_id, b"line one\nline two\nline three\n".to_vec()),
                (new_blob_id, b"line one\nline two\nline four\n".to_vec()),
            ]),
        };

        let options = Options {
            detect_renames: true,
            rename_threshold: 0.5,
        };
        let changes = diff(&store, Some(old_root), Some(new_root), None, &options).unwrap();
        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].status, Status::Renamed);
        assert_eq!(changes[0].path, "new_name.txt");
        assert_eq!(changes[0].old_path.as_deref(), Some("old_name.txt".as_bytes().as_bstr()));
    }

    #[test]
    fn without_rename_detection_a_rename_is_delete_plus_add() {
        let old_root = oid(1);
        let new_root = oid(2);
        let store = MemoryStore {
            trees: HashMap::from([
                (
                    old_root,
                    Tree {
                        entries: vec![blob_entry("old_name.txt", oid(20))],
                    },
                ),
                (
                    new_root,
                    Tree {
                        entries: vec![blob_entry("new_name.txt", oid(21))],
                    },
                ),
            ]),
            blobs: HashMap::new(),
        };

        let changes = diff(&store, Some(old_root), Some(new_root), None, &Options::default()).unwrap();
        assert_eq!(changes.len(), 2);
        assert!(changes.iter().any(|c| c.status == Status::Deleted));
        assert!(changes.iter().any(|c| c.status == Status::Added));
    }

    #[test]
    fn path_filter_restricts_to_a_directory_prefix() {
        let new_root = oid(2);
        let store = MemoryStore {
            trees: HashMap::from([(
                new_root,
                Tree {
                    entries: vec![blob_entry("keep.txt", oid(9)), blob_entry("skip.txt", oid(8))],
                },
            )]),
            blobs: HashMap::new(),
        };

        let changes = diff(&store, None, Some(new_root), Some(BStr::new(b"keep.txt")), &Options::default()).unwrap();
        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].path, "keep.txt");
    }
}
