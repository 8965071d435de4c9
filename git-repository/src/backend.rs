//! The storage substrate a [`crate::Repository`] is generic over (spec.md §4.1): object
//! read/write, ref read/write/expand, config read/write, index read/write, `HEAD` and
//! linked-worktree administration, and `packed-refs` access.
//!
//! A backend owns no policy beyond "how do these bytes get to and from durable storage" — the
//! porcelain layer in [`crate::repository`] and its submodules decides what to write and when.

use std::collections::BTreeMap;
use std::path::Path;

use bstr::{BStr, BString};
use git_hash::ObjectId;

pub mod fs;
pub mod memory;

/// Where a freshly created linked worktree's private git-dir lives, returned by
/// [`GitBackend::create_worktree_gitdir`].
#[derive(Debug, Clone)]
pub struct WorktreeGitdir {
    /// The worktree's own `.git/worktrees/<name>` directory, holding its private `HEAD`,
    /// `index` and `logs/HEAD`.
    pub path: std::path::PathBuf,
    /// The name it was registered under, i.e. the final path component above.
    pub name: String,
}

/// A cheap-to-compare fingerprint of the on-disk (or equivalent) index state, used by
/// [`crate::Repository::read_index_direct`] to decide whether a cached [`git_index::State`] is
/// still current without re-parsing it on every read (spec.md §4.4).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexFingerprint {
    /// Last-modified time, whole seconds.
    pub mtime_secs: i64,
    /// Last-modified time, the sub-second remainder.
    pub mtime_nanos: u32,
    /// The index file's length in bytes.
    pub len: u64,
}

/// What [`GitBackend::initialize`] is asked to create.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InitOptions {
    /// Create a bare repository (no working tree, no linked index).
    pub bare: bool,
    /// The hash algorithm new objects and refs are written with.
    pub object_format: git_hash::Kind,
}

impl Default for InitOptions {
    fn default() -> Self {
        InitOptions { bare: false, object_format: git_hash::Kind::Sha1 }
    }
}

/// The storage operations a repository needs, independent of whether it's backed by the
/// filesystem or an in-memory fixture (spec.md §4.1's `GitBackend` capability list).
///
/// Ref operations take and return raw byte names rather than [`git_ref::FullName`] so that a
/// backend is free to validate (or not) however it sees fit; [`crate::repository`] is the layer
/// that enforces naming rules before a write reaches here.
pub trait GitBackend {
    /// The error every fallible method here returns.
    type Error: std::error::Error + Send + Sync + 'static;

    /// Create the on-disk (or in-memory) layout for a new repository: object database
    /// directories, empty `refs/`, `HEAD` pointing at the default branch, and initial config.
    /// A no-op if already initialized.
    fn initialize(&self, options: &InitOptions) -> Result<(), Self::Error>;

    /// Whether [`GitBackend::initialize`] has already run against this location.
    fn is_initialized(&self) -> bool;

    /// Read a single object's kind and uncompressed bytes, or `None` if it isn't present.
    fn read_object(&self, id: &ObjectId) -> Result<Option<(git_object::Kind, Vec<u8>)>, Self::Error>;

    /// Hash and store `data` as an object of kind `kind`, returning its id. Writing an object
    /// that already exists is a no-op that still returns the (unchanged) id.
    fn write_object(&self, kind: git_object::Kind, data: &[u8]) -> Result<ObjectId, Self::Error>;

    /// Whether an object exists without reading its contents.
    fn has_object(&self, id: &ObjectId) -> Result<bool, Self::Error>;

    /// Resolve `name` (a full ref name, a short name such as `"main"`, or a hex object id) to
    /// the object it ultimately points at, following symbolic refs (spec.md §4.1 step 2-4).
    /// `Ok(None)` if nothing matched.
    fn read_ref(&self, name: &BStr) -> Result<Option<ObjectId>, Self::Error>;

    /// Expand `name` to the fully-qualified ref name that would be read, without resolving a
    /// symbolic target any further than the first existing candidate (spec.md §4.1 step 2-3).
    /// `Ok(None)` if no candidate exists.
    fn expand_ref(&self, name: &BStr) -> Result<Option<BString>, Self::Error>;

    /// Point the peeled reference `name` at `new`, enforcing `expected` as a compare-and-swap
    /// precondition. `skip_reflog` suppresses the reflog line even when logging is enabled.
    fn write_ref(
        &self,
        name: &BStr,
        new: ObjectId,
        expected: git_ref::transaction::PreviousValue,
        skip_reflog: bool,
    ) -> Result<(), Self::Error>;

    /// Point the symbolic reference `name` at `target` (another ref name, not an object),
    /// enforcing `expected` the same way as [`GitBackend::write_ref`].
    fn write_symbolic_ref(
        &self,
        name: &BStr,
        target: &BStr,
        expected: git_ref::transaction::PreviousValue,
    ) -> Result<(), Self::Error>;

    /// Read `name`'s single-hop value without following a symbolic target.
    fn read_symbolic_ref(&self, name: &BStr) -> Result<Option<git_ref::transaction::Target>, Self::Error>;

    /// Delete a reference. A no-op if it doesn't exist.
    fn delete_ref(&self, name: &BStr) -> Result<(), Self::Error>;

    /// Every fully-qualified ref name starting with `prefix`, loose or packed.
    fn list_refs(&self, prefix: &str) -> Result<Vec<BString>, Self::Error>;

    /// The merged four-scope configuration view (spec.md §3, §6).
    fn read_config(&self) -> Result<git_config::cascade::Cascade, Self::Error>;

    /// Set `section[.subsection].key = value` in exactly the named scope, creating that scope's
    /// file if it didn't exist, and persist it.
    fn write_config(
        &self,
        scope: git_sec::Scope,
        section: &str,
        subsection: Option<&str>,
        key: &str,
        value: &str,
    ) -> Result<(), Self::Error>;

    /// Remove every `section[.subsection]` entry from the local scope, e.g. forgetting a remote
    /// entirely rather than overwriting one of its keys. A no-op if it wasn't present.
    fn remove_config_section(&self, section: &str, subsection: Option<&str>) -> Result<(), Self::Error>;

    /// Read the current worktree's staging area, or `None` if no index has been written yet.
    fn read_index(&self) -> Result<Option<git_index::State>, Self::Error>;

    /// Overwrite the current worktree's staging area.
    fn write_index(&self, index: &git_index::State) -> Result<(), Self::Error>;

    /// Whether an index has ever been written for this worktree.
    fn has_index(&self) -> Result<bool, Self::Error>;

    /// A fingerprint of the index's current on-disk state, or `None` if it doesn't exist
    /// (spec.md §4.4's mtime comparison driving `readIndexDirect`'s cache-reuse decision).
    fn index_fingerprint(&self) -> Result<Option<IndexFingerprint>, Self::Error>;

    /// Overwrite `HEAD`'s raw content directly (`"ref: <name>\n"` or `"<oid>\n"`), bypassing the
    /// compare-and-swap machinery `write_symbolic_ref`/`write_ref` apply to ordinary refs, for
    /// the bootstrap case where `HEAD` must be created before any ref exists for it to point at.
    fn write_head(&self, content: &BStr) -> Result<(), Self::Error>;

    /// Register and create the private git-dir for a new linked worktree named `name`.
    fn create_worktree_gitdir(&self, name: &str) -> Result<WorktreeGitdir, Self::Error>;

    /// Write a linked worktree's private `HEAD`.
    fn write_worktree_head(&self, worktree: &WorktreeGitdir, content: &BStr) -> Result<(), Self::Error>;

    /// The parsed `packed-refs` snapshot, name to peeled object id.
    fn read_packed_refs(&self) -> Result<BTreeMap<BString, ObjectId>, Self::Error>;

    /// Replace the `packed-refs` snapshot wholesale.
    fn write_packed_refs(&self, refs: &BTreeMap<BString, ObjectId>) -> Result<(), Self::Error>;

    /// The filesystem root backing this repository, if any; `None` for a purely in-memory
    /// backend, used by callers that need a real path (e.g. spawning an external diff tool).
    fn file_system_root(&self) -> Option<&Path>;
}
