//! Classifying a directory as a gitdir or worktree, and walking parents to find one.

use std::path::{Path, PathBuf};

use crate::Error;

/// What a discovered directory turned out to be.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Kind {
    /// The directory handed to [`is_git()`] or found by [`upwards()`] is itself the gitdir:
    /// there is no separate worktree wrapping it.
    Bare,
    /// The directory is a worktree; its `.git` entry is either a directory (the gitdir itself)
    /// or a file whose `gitdir: <path>` content points at the real gitdir elsewhere (a linked
    /// worktree or a submodule's `modules/<name>` directory).
    WorkTree {
        /// Set when `.git` was a file redirecting to a gitdir outside the worktree.
        linked_git_dir: Option<PathBuf>,
    },
}

/// `true` if `path` has the markers of a gitdir: a `HEAD` file, an `objects` directory, and
/// either a `refs` directory or a `packed-refs` file (spec.md §6's on-disk layout).
pub fn is_git(path: &Path) -> bool {
    path.join("HEAD").is_file()
        && path.join("objects").is_dir()
        && (path.join("refs").is_dir() || path.join("packed-refs").is_file())
}

/// Classify `directory`: is it a worktree (`.git` directory or file) or a bare gitdir itself?
/// Returns `None` if `directory` matches neither shape.
pub fn classify(directory: &Path) -> Result<Option<(PathBuf, Kind)>, Error> {
    let dot_git = directory.join(".git");
    if dot_git.is_dir() {
        return Ok(is_git(&dot_git).then(|| (dot_git, Kind::WorkTree { linked_git_dir: None })));
    }
    if dot_git.is_file() {
        return match resolve_git_file(&dot_git)? {
            Some(target) if is_git(&target) => Ok(Some((
                target.clone(),
                Kind::WorkTree {
                    linked_git_dir: Some(target),
                },
            ))),
            Some(_) => Err(Error::BrokenGitFile {
                path: dot_git,
                reason: "the gitdir it points at doesn't look like one",
            }),
            None => Err(Error::BrokenGitFile {
                path: dot_git,
                reason: "expected a 'gitdir: <path>' line",
            }),
        };
    }
    Ok(is_git(directory).then(|| (directory.to_owned(), Kind::Bare)))
}

fn resolve_git_file(dot_git: &Path) -> Result<Option<PathBuf>, Error> {
    let content = std::fs::read_to_string(dot_git)?;
    let raw = match content.trim_end().strip_prefix("gitdir: ") {
        Some(raw) => raw,
        None => return Ok(None),
    };
    let target = PathBuf::from(raw);
    let target = if target.is_relative() {
        dot_git
            .parent()
            .expect("a file always has a parent directory")
            .join(target)
    } else {
        target
    };
    Ok(Some(target))
}

/// Walk `directory` and its ancestors, returning the gitdir and [`Kind`] of the first one that
/// looks like a repository (spec.md §4.9: `findRoot`).
pub fn upwards(directory: &Path) -> Result<(PathBuf, Kind), Error> {
    for candidate in directory.ancestors() {
        if let Some(found) = classify(candidate)? {
            return Ok(found);
        }
    }
    Err(Error::NoGitRepository {
        directory: directory.to_owned(),
    })
}

/// How much the configuration found inside `gitdir` should be trusted, based on filesystem
/// ownership (spec.md §6's config discovery order feeds this into the system/global cascade).
pub fn trust_for(gitdir: &Path) -> git_sec::Trust {
    git_sec::Trust::from_path_ownership(gitdir)
}

#[cfg(test)]
mod tests {
    use std::fs;

    use super::*;

    fn make_gitdir(dir: &Path) {
        fs::create_dir_all(dir.join("objects")).unwrap();
        fs::create_dir_all(dir.join("refs")).unwrap();
        fs::write(dir.join("HEAD"), "ref: refs/heads/main\n").unwrap();
    }

    #[test]
    fn bare_directory_classifies_as_bare() {
        let dir = tempfile::tempdir().unwrap();
        make_gitdir(dir.path());
        let (found, kind) = classify(dir.path()).unwrap().unwrap();
        assert_eq!(found, dir.path());
        assert_eq!(kind, Kind::Bare);
    }

    #[test]
    fn worktree_with_git_directory() {
        let dir = tempfile::tempdir().unwrap();
        make_gitdir(&dir.path().join(".git"));
        let (found, kind) = classify(dir.path()).unwrap().unwrap();
        assert_eq!(found, dir.path().join(".git"));
        assert_eq!(kind, Kind::WorkTree { linked_git_dir: None });
    }

    #[test]
    fn worktree_with_git_file_pointing_elsewhere() {
        let root = tempfile::tempdir().unwrap();
        let real_gitdir = root.path().join("elsewhere");
        make_gitdir(&real_gitdir);

        let worktree = root.path().join("work");
        fs::create_dir_all(&worktree).unwrap();
        fs::write(worktree.join(".git"), format!("gitdir: {}\n", real_gitdir.display())).unwrap();

        let (found, kind) = classify(&worktree).unwrap().unwrap();
        assert_eq!(found, real_gitdir);
        assert_eq!(
            kind,
            Kind::WorkTree {
                linked_git_dir: Some(real_gitdir)
            }
        );
    }

    #[test]
    fn unrelated_directory_classifies_as_none() {
        let dir = tempfile::tempdir().unwrap();
        assert!(classify(dir.path()).unwrap().is_none());
    }

    #[test]
    fn upwards_finds_repo_from_nested_subdirectory() {
        let dir = tempfile::tempdir().unwrap();
        make_gitdir(&dir.path().join(".git"));
        let nested = dir.path().join("a").join("b").join("c");
        fs::create_dir_all(&nested).unwrap();

        let (found, kind) = upwards(&nested).unwrap();
        assert_eq!(found, dir.path().join(".git"));
        assert_eq!(kind, Kind::WorkTree { linked_git_dir: None });
    }

    #[test]
    fn upwards_fails_when_no_ancestor_is_a_repository() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("a").join("b");
        fs::create_dir_all(&nested).unwrap();

        // tempdir() roots are themselves outside of any repository in CI/sandbox environments;
        // guard against a developer running this inside a real checkout.
        if upwards(&nested).is_ok() {
            return;
        }
        let err = upwards(&nested).unwrap_err();
        assert!(matches!(err, Error::NoGitRepository { .. }));
    }
}
