//! The reference store: routes reads and writes between loose ref files, the packed-refs
//! snapshot and per-ref reflogs, and implements name expansion and symbolic resolution
//! (spec.md §4.1 "GitBackend" ref operations).

use std::{
    fs,
    io::ErrorKind,
    path::{Path, PathBuf},
};

use bstr::{BStr, BString, ByteSlice};
use git_hash::ObjectId;

use crate::{
    reflog,
    transaction::{PreviousValue, RefEdit, Target},
    FullName, FullNameRef,
};

pub mod packed;

/// Symbolic ref chains longer than this are rejected rather than followed forever
/// (spec.md §4.1 step 4: "cap at 5").
const MAX_RESOLUTION_DEPTH: u8 = 5;

/// The candidate ref names tried, in order, when resolving a short name like `"main"`
/// (spec.md §4.1 step 2).
const SHORT_NAME_PREFIXES: &[&str] = &["refs/", "refs/tags/", "refs/heads/", "refs/remotes/"];

/// Whether reflog lines are appended on write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReflogMode {
    /// Append a reflog line for every peeled update, matching `core.logallrefupdates = true`.
    Enabled,
    /// Never append reflog lines.
    Disabled,
}

/// The error returned by most [`Store`] operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A ref file or its lock couldn't be read or written.
    #[error("failed to access reference at {path}")]
    Io {
        #[allow(missing_docs)]
        path: PathBuf,
        #[allow(missing_docs)]
        #[source]
        source: std::io::Error,
    },
    /// A loose ref's content wasn't `"<oid>\n"` or `"ref: <name>\n"`.
    #[error("reference content at {path} is malformed")]
    Malformed {
        #[allow(missing_docs)]
        path: PathBuf,
    },
    #[allow(missing_docs)]
    #[error(transparent)]
    Hash(#[from] git_hash::from_hex::Error),
    #[allow(missing_docs)]
    #[error(transparent)]
    Validate(#[from] git_validate::reference::name::Error),
    #[allow(missing_docs)]
    #[error(transparent)]
    Packed(#[from] packed::Error),
    #[allow(missing_docs)]
    #[error(transparent)]
    Reflog(#[from] reflog::Error),
    #[allow(missing_docs)]
    #[error(transparent)]
    Lock(#[from] git_lock::Error),
    /// No candidate name resolved to an existing reference.
    #[error("reference {name:?} was not found")]
    NotFound {
        #[allow(missing_docs)]
        name: BString,
    },
    /// A chain of symbolic refs exceeded [`MAX_RESOLUTION_DEPTH`].
    #[error("reference {name:?} exceeds the maximum symbolic resolution depth")]
    MaxDepthExceeded {
        #[allow(missing_docs)]
        name: FullName,
    },
    /// [`PreviousValue::MustNotExist`] failed: the reference already exists.
    #[error("reference {name} already exists")]
    AlreadyExists {
        #[allow(missing_docs)]
        name: FullName,
    },
    /// [`PreviousValue::MustExistAndMatch`] failed: the reference's current value differs.
    #[error("reference {name} did not have the expected value")]
    ReferenceOutOfDate {
        #[allow(missing_docs)]
        name: FullName,
    },
    /// A [`Target::Peeled`] oid didn't match the store's configured hash kind.
    #[error("object id has hash kind {actual:?}, expected {expected:?}")]
    HashMismatch {
        #[allow(missing_docs)]
        expected: git_hash::Kind,
        #[allow(missing_docs)]
        actual: git_hash::Kind,
    },
}

/// The reference store for a single repository, possibly shared by multiple worktrees.
#[derive(Debug, Clone)]
pub struct Store {
    /// Where `HEAD` and other worktree-private refs live.
    git_dir: PathBuf,
    /// Where `refs/*`, `packed-refs` and shared reflogs live; equal to `git_dir` for the
    /// repository's main worktree.
    common_dir: PathBuf,
    hash_kind: git_hash::Kind,
    reflog_mode: ReflogMode,
}

/// The result of resolving a reference name to its final peeled value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolved {
    /// The fully-qualified name of the reference that directly held the peeled value, i.e. the
    /// last link in the chain if `name` was symbolic.
    pub name: FullName,
    /// The object the reference ultimately points at.
    pub target: ObjectId,
}

impl Store {
    /// Create a store for a repository whose `git_dir` and `common_dir` are the same, i.e. not
    /// a linked worktree.
    pub fn at(git_dir: impl Into<PathBuf>, hash_kind: git_hash::Kind, reflog_mode: ReflogMode) -> Self {
        let git_dir = git_dir.into();
        Store {
            common_dir: git_dir.clone(),
            git_dir,
            hash_kind,
            reflog_mode,
        }
    }

    /// Create a store for a linked worktree: `git_dir` holds `HEAD` and worktree-private refs,
    /// `common_dir` holds everything shared with the main worktree.
    pub fn with_common_dir(
        git_dir: impl Into<PathBuf>,
        common_dir: impl Into<PathBuf>,
        hash_kind: git_hash::Kind,
        reflog_mode: ReflogMode,
    ) -> Self {
        Store {
            git_dir: git_dir.into(),
            common_dir: common_dir.into(),
            hash_kind,
            reflog_mode,
        }
    }

    fn base_dir_for(&self, name: &FullNameRef<'_>) -> &Path {
        if name.is_head() || !name.as_bstr().starts_with(b"refs/") {
            &self.git_dir
        } else {
            &self.common_dir
        }
    }

    fn loose_path(&self, name: &FullNameRef<'_>) -> PathBuf {
        let mut path = self.base_dir_for(name).to_owned();
        for component in name.as_bstr().to_str_lossy().split('/') {
            path.push(component);
        }
        path
    }

    fn packed_path(&self) -> PathBuf {
        self.common_dir.join("packed-refs")
    }

    fn reflog_path(&self, name: &FullNameRef<'_>) -> PathBuf {
        let mut path = self.base_dir_for(name).to_owned();
        path.push("logs");
        for component in name.as_bstr().to_str_lossy().split('/') {
            path.push(component);
        }
        path
    }

    fn decode_loose(&self, path: &Path, bytes: &[u8]) -> Result<Target, Error> {
        let trimmed = bytes.trim_end().as_bstr();
        match trimmed.strip_prefix(b"ref: ") {
            Some(target) => Ok(Target::Symbolic(FullName::new_unchecked(target.as_bstr().to_owned()))),
            None => {
                if trimmed.is_empty() {
                    return Err(Error::Malformed { path: path.to_owned() });
                }
                Ok(Target::Peeled(ObjectId::from_hex(trimmed)?))
            }
        }
    }

    /// Read the single-hop value of `name`, without following symbolic links. Looks in the
    /// loose ref file first, then `packed-refs` for names under `refs/`. Returns `Ok(None)` if
    /// the reference doesn't exist anywhere.
    pub fn read_raw(&self, name: &FullNameRef<'_>) -> Result<Option<Target>, Error> {
        let path = self.loose_path(name);
        match fs::read(&path) {
            Ok(bytes) => return Ok(Some(self.decode_loose(&path, &bytes)?)),
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(source) => return Err(Error::Io { path, source }),
        }

        if name.as_bstr().starts_with(b"refs/") {
            if let Some(buffer) = packed::Buffer::open(self.packed_path())? {
                if let Some(reference) = buffer.find(name.as_bstr())? {
                    return Ok(Some(Target::Peeled(reference.object()?)));
                }
            }
        }
        Ok(None)
    }

    fn try_resolve(&self, name: FullNameRef<'_>, depth: u8) -> Result<Option<Resolved>, Error> {
        let raw = match self.read_raw(&name)? {
            Some(raw) => raw,
            None => return Ok(None),
        };
        match raw {
            Target::Peeled(target) => Ok(Some(Resolved { name: name.to_owned(), target })),
            Target::Symbolic(next) => {
                if depth == 0 {
                    return Err(Error::MaxDepthExceeded { name: name.to_owned() });
                }
                self.try_resolve(next.as_ref(), depth - 1)
            }
        }
    }

    fn candidates(input: &BStr) -> Vec<BString> {
        let mut out = vec![input.to_owned()];
        if !input.starts_with(b"refs/") {
            for prefix in SHORT_NAME_PREFIXES {
                out.push(format!("{}{}", prefix, input).into());
            }
            out.push(format!("refs/remotes/{}/HEAD", input).into());
        }
        out
    }

    /// Resolve `input` (a full name, a short name like `"main"`, or a hex object id) to its
    /// final peeled target, following symbolic refs (spec.md §4.1 "Ref-resolution algorithm").
    pub fn find(&self, input: &BStr) -> Result<Resolved, Error> {
        if let Ok(id) = ObjectId::from_hex(input) {
            if id.kind() == self.hash_kind {
                return Ok(Resolved {
                    name: FullName::new_unchecked(input.to_owned()),
                    target: id,
                });
            }
        }

        for candidate in Self::candidates(input) {
            let name = FullName::new_unchecked(candidate);
            if let Some(resolved) = self.try_resolve(name.as_ref(), MAX_RESOLUTION_DEPTH)? {
                return Ok(resolved);
            }
        }
        Err(Error::NotFound { name: input.to_owned() })
    }

    fn append_reflog(
        &self,
        name: &FullNameRef<'_>,
        previous: &ObjectId,
        new: &ObjectId,
        signature: &git_actor::Signature,
        message: &BStr,
    ) -> Result<(), Error> {
        let path = self.reflog_path(name);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|source| Error::Io { path: path.clone(), source })?;
        }
        let line = reflog::encode_line(previous, new, signature, message);
        use std::io::Write;
        let mut file = fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|source| Error::Io { path: path.clone(), source })?;
        file.write_all(&line).map_err(|source| Error::Io { path, source })?;
        Ok(())
    }

    /// Apply a single reference update: check `edit.expected` against the current value, write
    /// the new value through a lockfile, and append a reflog line if enabled
    /// (spec.md §4.1 "Ref-write algorithm").
    pub fn write(&self, edit: &RefEdit) -> Result<(), Error> {
        let name = edit.name.as_ref();
        let previous = self.read_raw(&name)?;

        match &edit.expected {
            PreviousValue::Any => {}
            PreviousValue::MustNotExist => {
                if previous.is_some() {
                    return Err(Error::AlreadyExists { name: edit.name.clone() });
                }
            }
            PreviousValue::MustExistAndMatch(expected) => {
                if previous.as_ref() != Some(expected) {
                    return Err(Error::ReferenceOutOfDate { name: edit.name.clone() });
                }
            }
        }

        let content = match &edit.new {
            Target::Peeled(oid) => {
                if oid.kind() != self.hash_kind {
                    return Err(Error::HashMismatch {
                        expected: self.hash_kind,
                        actual: oid.kind(),
                    });
                }
                format!("{}\n", oid.to_hex())
            }
            Target::Symbolic(target) => format!("ref: {}\n", target),
        };

        let path = self.loose_path(&name);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|source| Error::Io { path: path.clone(), source })?;
        }
        let mut lock = git_lock::File::acquire_to_update_resource(&path, git_lock::acquire::Fail::default(), None)?;
        lock.write_all(content.as_bytes())
            .map_err(|source| Error::Io { path: path.clone(), source })?;
        lock.commit()?;

        if let (ReflogMode::Enabled, false, Target::Peeled(new_oid)) = (self.reflog_mode, edit.skip_reflog, &edit.new)
        {
            let previous_oid = match previous {
                Some(Target::Peeled(oid)) => oid,
                _ => ObjectId::null(self.hash_kind),
            };
            self.append_reflog(&name, &previous_oid, new_oid, &edit.signature, edit.message.as_bstr())?;
        }
        Ok(())
    }

    /// Remove a reference's loose file (and its entry from `packed-refs`, if present).
    pub fn delete(&self, name: &FullNameRef<'_>) -> Result<(), Error> {
        let path = self.loose_path(name);
        match fs::remove_file(&path) {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(source) => return Err(Error::Io { path, source }),
        }

        let packed_path = self.packed_path();
        if let Some(buffer) = packed::Buffer::open(&packed_path)? {
            if buffer.find(name.as_bstr())?.is_some() {
                let rewritten = buffer.with_edits(&[(name.as_bstr().to_owned(), None)])?;
                packed::Buffer::persist(&packed_path, &rewritten)?;
            }
        }
        Ok(())
    }

    /// List every loose reference whose name starts with `prefix`, plus any matching entries
    /// from `packed-refs` not shadowed by a loose file.
    pub fn iter_prefixed(&self, prefix: &str) -> Result<Vec<FullName>, Error> {
        let mut seen = std::collections::BTreeSet::new();

        let loose_root = self.common_dir.join(prefix);
        if loose_root.is_dir() {
            for entry in walk_files(&loose_root)? {
                let relative = entry
                    .strip_prefix(&self.common_dir)
                    .expect("walked paths are under common_dir")
                    .to_string_lossy()
                    .replace(std::path::MAIN_SEPARATOR, "/");
                seen.insert(relative);
            }
        }

        if let Some(buffer) = packed::Buffer::open(self.packed_path())? {
            for entry in buffer.iter() {
                let entry = entry?;
                let name = entry.name.as_bstr().to_str_lossy().into_owned();
                if name.starts_with(prefix) {
                    seen.insert(name);
                }
            }
        }

        Ok(seen.into_iter().map(FullName::new_unchecked).collect())
    }
}

fn walk_files(root: &Path) -> Result<Vec<PathBuf>, Error> {
    let mut out = Vec::new();
    let mut stack = vec![root.to_owned()];
    while let Some(dir) = stack.pop() {
        for entry in fs::read_dir(&dir).map_err(|source| Error::Io { path: dir.clone(), source })? {
            let entry = entry.map_err(|source| Error::Io { path: dir.clone(), source })?;
            let path = entry.path();
            let file_type = entry.file_type().map_err(|source| Error::Io { path: path.clone(), source })?;
            if file_type.is_dir() {
                stack.push(path);
            } else {
                out.push(path);
            }
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn signature() -> git_actor::Signature {
        git_actor::Signature {
            name: "Ann Example".into(),
            email: "ann@example.com".into(),
            time: git_date::Time {
                seconds_since_epoch: 1700000000,
                offset_in_minutes: 0,
            },
        }
    }

    fn oid(byte: u8) -> ObjectId {
        ObjectId::from_bytes_unchecked(git_hash::Kind::Sha1, &[byte; 20])
    }

    #[test]
    fn writes_and_resolves_a_branch_by_short_name() {
        let dir = tempfile::tempdir().unwrap();
        let store = Store::at(dir.path(), git_hash::Kind::Sha1, ReflogMode::Enabled);
        let edit = RefEdit {
            name: FullName::try_from("refs/heads/main").unwrap(),
            new: Target::Peeled(oid(1)),
            expected: PreviousValue::MustNotExist,
            skip_reflog: false,
            message: "commit: initial".into(),
            signature: signature(),
        };
        store.write(&edit).unwrap();

        let resolved = store.find(BStr::new(b"main")).unwrap();
        assert_eq!(resolved.target, oid(1));
        assert_eq!(resolved.name.as_bstr(), "refs/heads/main");

        let log_path = dir.path().join("logs/refs/heads/main");
        assert!(log_path.exists());
    }

    #[test]
    fn resolves_head_through_a_symbolic_chain() {
        let dir = tempfile::tempdir().unwrap();
        let store = Store::at(dir.path(), git_hash::Kind::Sha1, ReflogMode::Disabled);
        store
            .write(&RefEdit {
                name: FullName::try_from("refs/heads/main").unwrap(),
                new: Target::Peeled(oid(7)),
                expected: PreviousValue::Any,
                skip_reflog: true,
                message: "".into(),
                signature: signature(),
            })
            .unwrap();
        store
            .write(&RefEdit {
                name: FullName::try_from("HEAD").unwrap(),
                new: Target::Symbolic(FullName::try_from("refs/heads/main").unwrap()),
                expected: PreviousValue::Any,
                skip_reflog: true,
                message: "".into(),
                signature: signature(),
            })
            .unwrap();

        let resolved = store.find(BStr::new(b"HEAD")).unwrap();
        assert_eq!(resolved.target, oid(7));
        assert_eq!(resolved.name.as_bstr(), "refs/heads/main");
    }

    #[test]
    fn rejects_a_mismatched_compare_and_swap() {
        let dir = tempfile::tempdir().unwrap();
        let store = Store::at(dir.path(), git_hash::Kind::Sha1, ReflogMode::Disabled);
        store
            .write(&RefEdit {
                name: FullName::try_from("refs/heads/main").unwrap(),
                new: Target::Peeled(oid(1)),
                expected: PreviousValue::Any,
                skip_reflog: true,
                message: "".into(),
                signature: signature(),
            })
            .unwrap();

        let result = store.write(&RefEdit {
            name: FullName::try_from("refs/heads/main").unwrap(),
            new: Target::Peeled(oid(2)),
            expected: PreviousValue::MustExistAndMatch(Target::Peeled(oid(9))),
            skip_reflog: true,
            message: "".into(),
            signature: signature(),
        });
        assert!(matches!(result, Err(Error::ReferenceOutOfDate { .. })));
    }

    #[test]
    fn deletes_a_loose_reference() {
        let dir = tempfile::tempdir().unwrap();
        let store = Store::at(dir.path(), git_hash::Kind::Sha1, ReflogMode::Disabled);
        store
            .write(&RefEdit {
                name: FullName::try_from("refs/heads/main").unwrap(),
                new: Target::Peeled(oid(1)),
                expected: PreviousValue::Any,
                skip_reflog: true,
                message: "".into(),
                signature: signature(),
            })
            .unwrap();
        store.delete(&FullName::try_from("refs/heads/main").unwrap().as_ref()).unwrap();
        assert!(store.find(BStr::new(b"refs/heads/main")).is_err());
    }
}
