//! The process-wide, filesystem-keyed [`Repository`] cache (spec.md §4.9): opening the same
//! `(filesystem, gitdir)` twice hands back the same instance instead of re-reading config and
//! re-opening the object store from scratch.
//!
//! Only [`Fs`]-backed repositories go through here — an in-memory [`crate::backend::memory::Memory`]
//! has no filesystem identity to key on, and callers that want one simply call [`Repository::new`]
//! directly.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, OnceLock};

use super::Repository;
use crate::backend::fs::Fs;
use crate::error::{Code, Error};

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct CacheKey {
    fs_identity: PathBuf,
    gitdir: PathBuf,
    bare: bool,
}

type Cache = HashMap<CacheKey, Arc<Repository<Fs>>>;

fn cache() -> &'static Mutex<Cache> {
    static CACHE: OnceLock<Mutex<Cache>> = OnceLock::new();
    CACHE.get_or_init(|| Mutex::new(HashMap::new()))
}

/// Open (or reuse) the [`Fs`]-backed repository whose private git-dir is `git_dir` and whose
/// shared object/ref storage lives under `common_dir`. Two calls with the same canonicalised
/// `(common_dir, git_dir, bare)` return the identical cached instance; a cached bare repository
/// never satisfies a non-bare open of the same paths, or vice versa.
pub fn open_cached(git_dir: &Path, common_dir: &Path, hash_kind: git_hash::Kind, bare: bool) -> Result<Arc<Repository<Fs>>, Error> {
    let fs_identity = common_dir
        .canonicalize()
        .map_err(|e| Error::new("repository.open_cached", Code::Internal, e))?;
    let gitdir = git_dir
        .canonicalize()
        .map_err(|e| Error::new("repository.open_cached", Code::Internal, e))?;
    let key = CacheKey { fs_identity, gitdir: gitdir.clone(), bare };

    let mut cache = cache().lock().expect("cache mutex is never poisoned by a panicking holder");
    if let Some(repo) = cache.get(&key) {
        return Ok(Arc::clone(repo));
    }

    let backend = Fs::at(git_dir, common_dir, hash_kind).map_err(|e| Error::new("repository.open_cached", Code::Internal, e))?;
    let repo = Arc::new(Repository::new(backend, hash_kind));
    cache.insert(key, Arc::clone(&repo));
    Ok(repo)
}

/// Drop every cached instance, releasing their object-store handles. Mainly useful in tests that
/// open many short-lived repositories at overlapping paths.
pub fn clear_cache() {
    cache().lock().expect("cache mutex is never poisoned by a panicking holder").clear();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::GitBackend;

    #[test]
    fn opening_the_same_gitdir_twice_reuses_the_instance() {
        clear_cache();
        let dir = tempfile::tempdir().unwrap();
        let git_dir = dir.path().join(".git");
        std::fs::create_dir_all(&git_dir).unwrap();
        let backend = Fs::at(&git_dir, &git_dir, git_hash::Kind::Sha1).unwrap();
        backend.initialize(&crate::backend::InitOptions::default()).unwrap();
        drop(backend);

        let first = open_cached(&git_dir, &git_dir, git_hash::Kind::Sha1, false).unwrap();
        let second = open_cached(&git_dir, &git_dir, git_hash::Kind::Sha1, false).unwrap();
        assert!(OwnShared::ptr_eq(&first, &second));
    }
}
