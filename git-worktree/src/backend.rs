//! `WorktreeBackend`: byte-oriented access to the working tree's files (spec.md §1's L0
//! "Storage backends" entry, the worktree half of the pair alongside `GitBackend`).

use bstr::{BStr, BString};
use git_object::tree::EntryMode;

pub mod fs;
pub mod memory;

/// The `lstat`-derived facts [`status()`][crate::status::status] and the checkout planner need
/// to decide whether a workdir path differs from what the index or target tree expects, without
/// necessarily reading and hashing its full content.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Metadata {
    /// `true` if the path is a directory rather than a regular file or symlink.
    pub is_dir: bool,
    /// File size in bytes; meaningless when `is_dir` is `true`.
    pub size: u64,
    /// Modification time, seconds since the Unix epoch.
    pub mtime_secs: u64,
    /// The mode this path would be staged with if added right now.
    pub mode: EntryMode,
}

/// Working-tree file I/O, parameterised so the checkout/status/merge algorithms in this crate
/// never touch `std::fs` directly (spec.md §4.5's `WorktreeBackend` parameter).
pub trait WorktreeBackend {
    /// The error produced by any operation below.
    type Error: std::error::Error + Send + Sync + 'static;

    /// `lstat`-equivalent metadata for `path`, or `None` if nothing exists there.
    fn metadata(&self, path: &BStr) -> Result<Option<Metadata>, Self::Error>;

    /// Read the full content of the file at `path`. Only called on paths [`metadata()`] reported
    /// as a non-directory.
    fn read_file(&self, path: &BStr) -> Result<Vec<u8>, Self::Error>;

    /// Write `content` to `path` at `mode`, creating or truncating as needed. Parent directories
    /// are created separately via [`create_dir_all()`][Self::create_dir_all].
    fn write_file(&self, path: &BStr, mode: EntryMode, content: &[u8]) -> Result<(), Self::Error>;

    /// Remove the file at `path`. A no-op if nothing is there.
    fn remove_file(&self, path: &BStr) -> Result<(), Self::Error>;

    /// Create `path` and every missing ancestor directory.
    fn create_dir_all(&self, path: &BStr) -> Result<(), Self::Error>;

    /// Remove the directory at `path` if it exists and is empty; a no-op otherwise. Used to
    /// clean up after the last file under a directory is deleted.
    fn remove_dir_if_empty(&self, path: &BStr) -> Result<(), Self::Error>;

    /// List the immediate children of `path` (`""` for the worktree root), as full paths
    /// relative to the worktree root. Used to discover untracked files during `status()`.
    fn list_dir(&self, path: &BStr) -> Result<Vec<BString>, Self::Error>;
}
