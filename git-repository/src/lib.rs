//! Repository facade: the [`backend::GitBackend`] trait every storage substrate implements, the
//! process-wide [`Repository`] cache, and the porcelain surface (`init`/`clone`/`commit`/
//! `branch`/`tag`/`merge`/`status`/`add`/`reset`/`log`/`notes`/`stash`/`worktree`/`remote`)
//! layered over the lower `git-*` crates.
//!
//! A `git-repository` caller picks (or implements) one [`backend::GitBackend`] and, for anything
//! that touches a working tree, one [`git_worktree::backend::WorktreeBackend`], then drives every
//! operation through a single [`Repository<B>`]. The two filesystem-backed implementations
//! ([`backend::fs::Fs`] and [`git_worktree::backend::fs::Fs`]) cover the common case; the
//! in-memory pair ([`backend::memory::Memory`] and [`git_worktree::backend::memory::Memory`])
//! exists for both embedding scenarios with no real disk and for this crate's own tests.
#![deny(missing_docs, unsafe_code, rust_2018_idioms)]

pub use git_actor as actor;
pub use git_hash as hash;
pub use git_object as objs;
pub use git_object::bstr;
pub use git_ref as refs;
pub use git_revision as revision;
pub use git_sec as sec;
pub use git_worktree as worktree;
pub use hash::ObjectId;

pub mod backend;
pub mod error;
pub mod objects;
mod repository;

pub use backend::GitBackend;
pub use error::{Code, Error};
pub use repository::{clear_cache, open_cached, Repository};

/// Create a repository at `dir` (spec.md §4.10 `init`): a no-op if `dir/.git` (or `dir` itself,
/// for `options.bare`) is already initialized.
pub fn init(dir: impl AsRef<std::path::Path>, options: backend::InitOptions) -> Result<Repository<backend::fs::Fs>, Error> {
    let dir = dir.as_ref();
    let git_dir = if options.bare { dir.to_owned() } else { dir.join(".git") };
    std::fs::create_dir_all(&git_dir).map_err(|e| Error::new("git.init", Code::Internal, e))?;
    let backend = backend::fs::Fs::at(git_dir.clone(), git_dir.clone(), options.object_format).map_err(|e| Error::new("git.init", Code::Internal, e))?;
    backend.initialize(&options).map_err(|e| Error::new("git.init", Code::Internal, e))?;
    Ok(Repository::new(backend, options.object_format))
}

/// Open the repository whose gitdir is exactly `git_dir` (no upward search), going through the
/// process-wide [`open_cached`] cache.
pub fn open(git_dir: impl AsRef<std::path::Path>, hash_kind: git_hash::Kind) -> Result<std::sync::Arc<Repository<backend::fs::Fs>>, Error> {
    let git_dir = git_dir.as_ref();
    open_cached(git_dir, git_dir, hash_kind, !git_dir.ends_with(".git"))
}

/// Discover the repository above `start` (spec.md §4.9 `findRoot`) and open it.
pub fn discover(start: impl AsRef<std::path::Path>) -> Result<std::sync::Arc<Repository<backend::fs::Fs>>, Error> {
    let root = Repository::<backend::fs::Fs>::find_root(start.as_ref())?;
    open(root, git_hash::Kind::Sha1)
}
