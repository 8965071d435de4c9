//! [`Repository`]: the generic façade every porcelain operation hangs off, parameterised by the
//! [`GitBackend`] it stores through (spec.md §4.9).
//!
//! This replaces gitoxide's own `Easy`/`ObjectRef`/`ThreadSafeRepository`/`attach()` machinery,
//! which existed to let one `Repository` be shared cheaply across an ambient cache of buffers and
//! options objects. Here a `Repository<B>` owns its backend directly and is `Send` whenever `B`
//! is, so the ambient-cache dance collapses to an ordinary struct with ordinary fields.

use std::sync::{Arc, Mutex};

use bstr::{BStr, BString, ByteSlice};
use git_hash::ObjectId;

use crate::backend::{GitBackend, IndexFingerprint};
use crate::error::{Code, Error};
use crate::objects::ObjectAccess;

mod cache;
pub mod clone;
pub mod commit;
pub mod config;
pub mod diff;
pub mod linked_worktree;
pub mod notes;
pub mod object;
pub mod reference;
pub mod remote;
pub mod revision;
pub mod stash;
pub mod worktree;

pub use cache::{clear_cache, open_cached};

/// The cached staging area plus the backend fingerprint it was last loaded against
/// (spec.md §4.4).
struct IndexCache {
    state: Arc<git_index::State>,
    fingerprint: Option<IndexFingerprint>,
}

/// A repository backed by `B`: one object store, one ref store, one config cascade, one index
/// (spec.md §4.9's "one `Repository` per thread, cheap to open, expensive to share").
pub struct Repository<B: GitBackend> {
    backend: B,
    hash_kind: git_hash::Kind,
    index: Mutex<Option<IndexCache>>,
}

impl<B: GitBackend> Repository<B> {
    /// Wrap an already-[`initialize`][GitBackend::initialize]d backend.
    pub fn new(backend: B, hash_kind: git_hash::Kind) -> Self {
        Repository { backend, hash_kind, index: Mutex::new(None) }
    }

    /// The backend this repository reads and writes through.
    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// The hash algorithm this repository's objects and refs use.
    pub fn hash_kind(&self) -> git_hash::Kind {
        self.hash_kind
    }

    /// Borrow the backend as the typed object-graph capability `git-diff`, `git-revision` and
    /// `git-worktree` each need.
    pub fn objects(&self) -> ObjectAccess<'_, B> {
        ObjectAccess(&self.backend)
    }

    /// Load (and cache) the staging area, creating an empty one if none has been written yet
    /// (spec.md §4.4's `readIndexDirect(force=false)`).
    pub fn index(&self) -> Result<Arc<git_index::State>, Error> {
        self.read_index_direct(false)
    }

    /// `readIndexDirect(force)` (spec.md §4.4): `force` discards the cache and always re-parses
    /// from the backend. Otherwise, an unchanged fingerprint still triggers a re-parse (to catch
    /// out-of-band corruption) but, if that re-parse succeeds, the *previously cached* instance
    /// is returned rather than the freshly parsed one — this is what gives
    /// [`Repository::set_index`] its "next read sees `I` by reference identity" guarantee:
    /// a read racing a write at the same mtime resolution must not silently swap the instance
    /// the caller just installed for an equal-but-distinct clone.
    pub fn read_index_direct(&self, force: bool) -> Result<Arc<git_index::State>, Error> {
        let mut cached = self.index.lock().expect("index mutex is never poisoned by a panicking holder");
        let current_fingerprint = self
            .backend
            .index_fingerprint()
            .map_err(|e| Error::new("repository.index", Code::Internal, e))?;

        if !force {
            if let Some(entry) = cached.as_ref() {
                if entry.fingerprint == current_fingerprint {
                    self.load_index_from_backend()?;
                    return Ok(Arc::clone(&entry.state));
                }
            }
        }

        let loaded = self.load_index_from_backend()?;
        let state = Arc::new(loaded);
        *cached = Some(IndexCache { state: Arc::clone(&state), fingerprint: current_fingerprint });
        Ok(state)
    }

    fn load_index_from_backend(&self) -> Result<git_index::State, Error> {
        Ok(self
            .backend
            .read_index()
            .map_err(|e| Error::new("repository.index", Code::Internal, e))?
            .unwrap_or_else(|| git_index::State::empty(self.hash_kind)))
    }

    /// Overwrite the staging area, both in the backend and in this repository's cached copy
    /// (spec.md §4.4's `writeIndexDirect`).
    pub fn set_index(&self, index: git_index::State) -> Result<(), Error> {
        self.backend
            .write_index(&index)
            .map_err(|e| Error::new("repository.set_index", Code::Internal, e))?;
        let fingerprint = self
            .backend
            .index_fingerprint()
            .map_err(|e| Error::new("repository.set_index", Code::Internal, e))?;
        *self.index.lock().expect("index mutex is never poisoned by a panicking holder") =
            Some(IndexCache { state: Arc::new(index), fingerprint });
        Ok(())
    }

    /// Resolve `name` (a full ref name, short branch/tag name, or hex oid) to the commit-ish
    /// object it points at.
    pub fn resolve(&self, name: &BStr) -> Result<Option<ObjectId>, Error> {
        self.backend
            .read_ref(name)
            .map_err(|e| Error::new("repository.resolve", Code::Internal, e))
    }

    /// `resolve()`, but failing with [`Code::NotFound`] instead of returning `None`.
    pub fn resolve_or_fail(&self, name: &BStr) -> Result<ObjectId, Error> {
        self.resolve(name)?
            .ok_or_else(|| Error::new("repository.resolve", Code::NotFound, crate::error::NotFound::Ref { name: name.to_owned() }))
    }

    /// The commit `HEAD` currently points at, or `None` for an unborn branch.
    pub fn head_id(&self) -> Result<Option<ObjectId>, Error> {
        self.resolve(BStr::new(b"HEAD"))
    }

    /// The path component of `HEAD`'s symbolic target under `refs/heads/`, or `None` if `HEAD`
    /// is detached (points directly at an oid) or the backend has no `HEAD` yet.
    pub fn current_branch(&self) -> Result<Option<BString>, Error> {
        match self
            .backend
            .read_symbolic_ref(BStr::new(b"HEAD"))
            .map_err(|e| Error::new("repository.current_branch", Code::Internal, e))?
        {
            Some(git_ref::transaction::Target::Symbolic(name)) => {
                Ok(name.as_bstr().strip_prefix(b"refs/heads/").map(|short| short.to_owned()))
            }
            _ => Ok(None),
        }
    }

    /// Discover the repository root above `start` and open it the same way `init`/porcelain
    /// callers would (spec.md §6 `findRoot`).
    pub fn find_root(start: &std::path::Path) -> Result<std::path::PathBuf, Error> {
        git_discover::repository::upwards(start)
            .map(|(root, _kind)| root)
            .map_err(|e| Error::new("repository.find_root", Code::NotFound, e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::fs::Fs;
    use crate::backend::memory::Memory;
    use crate::backend::InitOptions;

    #[test]
    fn index_missing_file_reads_as_fresh_empty() {
        let repo = Repository::new(Memory::new(), git_hash::Kind::Sha1);
        let index = repo.index().unwrap();
        assert!(index.entries().is_empty());
    }

    #[test]
    fn write_index_then_read_returns_the_same_instance() {
        let repo = Repository::new(Memory::new(), git_hash::Kind::Sha1);
        repo.set_index(git_index::State::empty(git_hash::Kind::Sha1)).unwrap();

        let first = repo.index().unwrap();
        let second = repo.index().unwrap();
        assert!(Arc::ptr_eq(&first, &second), "readIndexDirect(force=false) must return the just-written instance by identity");
    }

    #[test]
    fn forced_read_does_not_preserve_identity() {
        let repo = Repository::new(Memory::new(), git_hash::Kind::Sha1);
        repo.set_index(git_index::State::empty(git_hash::Kind::Sha1)).unwrap();

        let cached = repo.index().unwrap();
        let forced = repo.read_index_direct(true).unwrap();
        assert!(!Arc::ptr_eq(&cached, &forced), "force=true always re-parses, breaking identity");
    }

    #[test]
    fn zero_byte_index_file_is_an_internal_error() {
        let dir = tempfile::tempdir().unwrap();
        let git_dir = dir.path().join(".git");
        let backend = Fs::at(&git_dir, &git_dir, git_hash::Kind::Sha1).unwrap();
        backend.initialize(&InitOptions::default()).unwrap();
        std::fs::write(git_dir.join("index"), b"").unwrap();

        let repo = Repository::new(backend, git_hash::Kind::Sha1);
        let err = repo.index().unwrap_err();
        assert_eq!(err.code, Code::Internal);
    }

    #[test]
    fn all_zero_magic_index_is_treated_as_empty() {
        let dir = tempfile::tempdir().unwrap();
        let git_dir = dir.path().join(".git");
        let backend = Fs::at(&git_dir, &git_dir, git_hash::Kind::Sha1).unwrap();
        backend.initialize(&InitOptions::default()).unwrap();
        std::fs::write(git_dir.join("index"), [0u8; 12]).unwrap();

        let repo = Repository::new(backend, git_hash::Kind::Sha1);
        let index = repo.index().unwrap();
        assert!(index.entries().is_empty());
    }
}
