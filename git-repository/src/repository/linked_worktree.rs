//! Linked-worktree administration (spec.md §6 `worktree(add|list|remove|prune|lock|unlock|status)`),
//! built directly on [`GitBackend::create_worktree_gitdir`]/[`GitBackend::write_worktree_head`]
//! plus a small config-backed registry recording each worktree's checkout path and lock state —
//! the same `section[.subsection].key` bookkeeping [`super::remote`] uses for remotes.

use bstr::BStr;

use super::Repository;
use crate::backend::GitBackend;
use crate::error::{Code, Error};

/// One linked worktree's administrative record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorktreeInfo {
    /// The name it was added under.
    pub name: String,
    /// Where its working tree lives on disk.
    pub path: std::path::PathBuf,
    /// The branch it has checked out, if any (detached worktrees have none).
    pub branch: Option<String>,
    /// Whether [`Repository::lock_worktree`] has been called without a matching unlock.
    pub locked: bool,
}

impl<B: GitBackend> Repository<B> {
    /// Register and create a new linked worktree named `name`, checked out at `path` on `branch`.
    pub fn add_worktree(&self, name: &str, path: &std::path::Path, branch: &str) -> Result<WorktreeInfo, Error> {
        if self.worktree(name)?.is_some() {
            return Err(Error::new("repository.add_worktree", Code::AlreadyExists, WorktreeExists(name.to_owned())));
        }
        let gitdir = self
            .backend
            .create_worktree_gitdir(name)
            .map_err(|e| Error::new("repository.add_worktree", Code::Internal, e))?;
        self.backend
            .write_worktree_head(&gitdir, BStr::new(format!("ref: refs/heads/{branch}\n").as_bytes()))
            .map_err(|e| Error::new("repository.add_worktree", Code::Internal, e))?;

        self.set_config(git_sec::Scope::Local, "worktree", Some(name), "path", &path.display().to_string())?;
        self.set_config(git_sec::Scope::Local, "worktree", Some(name), "branch", branch)?;
        self.set_config(git_sec::Scope::Local, "worktree", Some(name), "locked", "false")?;
        Ok(WorktreeInfo { name: name.to_owned(), path: path.to_owned(), branch: Some(branch.to_owned()), locked: false })
    }

    /// Every registered linked worktree.
    pub fn list_worktrees(&self) -> Result<Vec<WorktreeInfo>, Error> {
        let cascade = self.backend.read_config().map_err(|e| Error::new("repository.list_worktrees", Code::Internal, e))?;
        let mut names = Vec::new();
        for source in &cascade.sources {
            let Some(file) = &source.file else { continue };
            for subsection in file.sections_named("worktree") {
                if let Some(name) = subsection {
                    let name = name.to_string();
                    if !names.contains(&name) {
                        names.push(name);
                    }
                }
            }
        }
        names
            .into_iter()
            .filter_map(|name| {
                let path = cascade.raw_value("worktree", Some(&name), "path")?.to_string().into();
                let branch = cascade.raw_value("worktree", Some(&name), "branch").map(|v| v.to_string());
                let locked = cascade.boolean("worktree", Some(&name), "locked").and_then(Result::ok).unwrap_or(false);
                Some(Ok(WorktreeInfo { name, path, branch, locked }))
            })
            .collect()
    }

    /// The single worktree registered as `name`.
    pub fn worktree(&self, name: &str) -> Result<Option<WorktreeInfo>, Error> {
        Ok(self.list_worktrees()?.into_iter().find(|w| w.name == name))
    }

    /// Unregister a linked worktree. Does not delete its on-disk checkout; a caller that wants
    /// that deletes `path` itself before or after calling this.
    pub fn remove_worktree(&self, name: &str) -> Result<(), Error> {
        self.backend
            .remove_config_section("worktree", Some(name))
            .map_err(|e| Error::new("repository.remove_worktree", Code::Internal, e))
    }

    /// Unregister every linked worktree whose checkout path no longer exists on disk. A no-op
    /// for backends with no [`GitBackend::file_system_root`].
    pub fn prune_worktrees(&self) -> Result<Vec<String>, Error> {
        let mut pruned = Vec::new();
        for worktree in self.list_worktrees()? {
            if self.backend.file_system_root().is_some() && !worktree.path.exists() {
                self.remove_worktree(&worktree.name)?;
                pruned.push(worktree.name);
            }
        }
        Ok(pruned)
    }

    /// Mark a worktree as locked, so `prune_worktrees` must leave it alone even if its path looks
    /// gone (e.g. a removable-media checkout that's merely unmounted).
    pub fn lock_worktree(&self, name: &str) -> Result<(), Error> {
        self.require_worktree(name)?;
        self.set_config(git_sec::Scope::Local, "worktree", Some(name), "locked", "true")
    }

    /// Clear a previous [`Repository::lock_worktree`].
    pub fn unlock_worktree(&self, name: &str) -> Result<(), Error> {
        self.require_worktree(name)?;
        self.set_config(git_sec::Scope::Local, "worktree", Some(name), "locked", "false")
    }

    /// The same classification [`Repository::status`] produces, but for a linked worktree's own
    /// index/`HEAD` rather than the main one; left to the caller to combine with a
    /// [`git_worktree::backend::WorktreeBackend`] rooted at `worktree.path`.
    pub fn worktree_status(&self, name: &str) -> Result<WorktreeInfo, Error> {
        self.worktree(name)?.ok_or_else(|| Error::new("repository.worktree_status", Code::NotFound, MissingWorktree(name.to_owned())))
    }

    fn require_worktree(&self, name: &str) -> Result<(), Error> {
        self.worktree(name)?.ok_or_else(|| Error::new("repository.lock_worktree", Code::NotFound, MissingWorktree(name.to_owned())))?;
        Ok(())
    }
}

/// [`Repository::add_worktree`] was asked to create a worktree that's already registered.
#[derive(Debug, thiserror::Error)]
#[error("worktree {0:?} already exists")]
struct WorktreeExists(String);

/// A worktree name had no registry entry.
#[derive(Debug, thiserror::Error)]
#[error("worktree {0:?} is not registered")]
struct MissingWorktree(String);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::memory::Memory;

    #[test]
    fn add_then_list_then_remove_a_worktree() {
        let repo = Repository::new(Memory::new(), git_hash::Kind::Sha1);
        repo.add_worktree("feature", std::path::Path::new("/tmp/feature"), "feature").unwrap();

        let worktrees = repo.list_worktrees().unwrap();
        assert_eq!(worktrees.len(), 1);
        assert_eq!(worktrees[0].branch.as_deref(), Some("feature"));
        assert!(!worktrees[0].locked);

        repo.lock_worktree("feature").unwrap();
        assert!(repo.worktree("feature").unwrap().unwrap().locked);

        repo.remove_worktree("feature").unwrap();
        assert!(repo.worktree("feature").unwrap().is_none());
    }
}
