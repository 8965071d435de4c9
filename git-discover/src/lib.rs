//! Locating a git repository from an arbitrary starting directory, and classifying whether a
//! given candidate directory is a worktree or a bare gitdir (spec.md §4.9's `findRoot`, and the
//! implicit discovery `open()` performs when not handed a gitdir directly).

#![deny(missing_docs)]

pub mod repository;

pub use repository::{is_git, upwards, Kind};

use std::path::PathBuf;

/// The error produced when locating or classifying a git repository fails.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Neither `directory` nor any of its parents looks like a git repository.
    #[error("neither '{}' nor any parent directory is a git repository", .directory.display())]
    NoGitRepository {
        #[allow(missing_docs)]
        directory: PathBuf,
    },
    /// `path` had a `.git` file but its `gitdir: <path>` content didn't resolve to a real gitdir.
    #[error("'{}' points at a gitdir that doesn't exist or isn't one: {}", .path.display(), .reason)]
    BrokenGitFile {
        #[allow(missing_docs)]
        path: PathBuf,
        #[allow(missing_docs)]
        reason: &'static str,
    },
    /// Reading a candidate directory or its `.git` file failed.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}
