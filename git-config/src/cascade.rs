//! Discovery and merging of the four config scopes (spec.md §3 and §6).

use std::path::{Path, PathBuf};

use git_sec::Scope;

use crate::File;

/// One discovered scope: where it lives on disk, and the file it parsed to (absent if the path
/// didn't exist — a missing system/global config is normal, not an error).
#[derive(Debug, Clone)]
pub struct Source {
    /// Which of the four scopes this is.
    pub scope: Scope,
    /// The path this scope was (or would be) loaded from.
    pub path: PathBuf,
    /// The parsed contents, or `None` if `path` didn't exist.
    pub file: Option<File>,
    /// Trust derived from path ownership; [`git_sec::Trust::Reduced`] sources still contribute
    /// to reads but should be treated conservatively by callers that execute config-driven
    /// commands (e.g. `core.fsmonitor`).
    pub trust: git_sec::Trust,
}

/// The error returned by [`Cascade::load()`].
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A config file existed but failed to parse.
    #[error("failed to parse config at {path}")]
    Parse {
        #[allow(missing_docs)]
        path: PathBuf,
        #[source]
        source: crate::parse::Error,
    },
    /// A config file existed but could not be read.
    #[error("failed to read config at {path}")]
    Io {
        #[allow(missing_docs)]
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// The merged view across system < global < local < worktree, in the precedence order spec.md
/// §3 defines: later scopes override earlier ones key-for-key, but every scope's entries remain
/// individually addressable for `writeConfig`'s "target a single named scope" requirement.
#[derive(Debug, Clone, Default)]
pub struct Cascade {
    /// One entry per scope that was probed, in [`Scope::ORDER`] order; scopes whose file didn't
    /// exist are still present with `file: None` so callers can locate where a fresh write for
    /// that scope should land.
    pub sources: Vec<Source>,
}

impl Cascade {
    /// Locate and parse every scope for a repository at `gitdir`, honouring `$GIT_CONFIG_SYSTEM`
    /// / `$GIT_CONFIG_GLOBAL` overrides and `extensions.worktreeConfig` for the worktree scope.
    pub fn load(gitdir: &Path, worktree_name: Option<&str>) -> Result<Self, Error> {
        let mut sources = Vec::new();
        sources.push(load_scope(Scope::System, system_config_path())?);
        sources.push(load_scope(Scope::Global, global_config_path())?);
        sources.push(load_scope(Scope::Local, gitdir.join("config"))?);

        let mut cascade = Cascade { sources };
        let worktree_config_enabled = cascade
            .boolean("extensions", None, "worktreeConfig")
            .and_then(Result::ok)
            .unwrap_or(false);
        if worktree_config_enabled {
            if let Some(name) = worktree_name {
                let path = gitdir.join("worktrees").join(name).join("config.worktree");
                cascade.sources.push(load_scope(Scope::Worktree, path)?);
            }
        }
        Ok(cascade)
    }

    /// Look up `section[.subsection].key`, returning the highest-precedence value present in
    /// any loaded scope.
    pub fn raw_value(&self, section: &str, subsection: Option<&str>, key: &str) -> Option<&bstr::BStr> {
        self.sources
            .iter()
            .rev()
            .filter_map(|s| s.file.as_ref())
            .find_map(|f| f.raw_value(section, subsection, key))
    }

    /// Same as [`Cascade::raw_value()`] but coerced to a boolean.
    pub fn boolean(&self, section: &str, subsection: Option<&str>, key: &str) -> Option<Result<bool, crate::values::Error>> {
        self.sources
            .iter()
            .rev()
            .filter_map(|s| s.file.as_ref())
            .find_map(|f| f.boolean(section, subsection, key))
    }

    /// The file backing a given scope, if that scope was loaded and exists; used to target a
    /// write at exactly one named scope (spec.md §3: "write targets a single named scope").
    pub fn scope_mut(&mut self, scope: Scope) -> Option<&mut File> {
        self.sources.iter_mut().find(|s| s.scope == scope)?.file.as_mut()
    }

    /// Ensure scope `scope` has a (possibly empty) [`File`], creating one in-memory if the path
    /// didn't previously exist, so a subsequent [`Cascade::scope_mut()`] always succeeds.
    pub fn ensure_scope(&mut self, scope: Scope) -> &mut File {
        let source = self.sources.iter_mut().find(|s| s.scope == scope).expect("scope probed by load()");
        source.file.get_or_insert_with(File::default)
    }
}

fn load_scope(scope: Scope, path: PathBuf) -> Result<Source, Error> {
    let trust = git_sec::Trust::from_path_ownership(&path);
    let file = match std::fs::read(&path) {
        Ok(bytes) => Some(File::from_bytes(&bytes).map_err(|source| Error::Parse { path: path.clone(), source })?),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => None,
        Err(source) => return Err(Error::Io { path, source }),
    };
    Ok(Source { scope, path, file, trust })
}

fn system_config_path() -> PathBuf {
    if let Some(p) = std::env::var_os("GIT_CONFIG_SYSTEM") {
        return PathBuf::from(p);
    }
    if cfg!(windows) {
        PathBuf::from(r"C:\ProgramData\Git\config")
    } else {
        PathBuf::from("/etc/gitconfig")
    }
}

fn global_config_path() -> PathBuf {
    if let Some(p) = std::env::var_os("GIT_CONFIG_GLOBAL") {
        return PathBuf::from(p);
    }
    if let Some(xdg) = std::env::var_os("XDG_CONFIG_HOME") {
        return PathBuf::from(xdg).join("git").join("config");
    }
    dirs::home_dir().unwrap_or_default().join(".gitconfig")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn local_overrides_global_overrides_system() {
        let dir = tempfile::tempdir().unwrap();
        let gitdir = dir.path().join("repo.git");
        std::fs::create_dir_all(&gitdir).unwrap();
        std::fs::write(gitdir.join("config"), b"[core]\n\tbare = true\n").unwrap();

        std::env::set_var("GIT_CONFIG_SYSTEM", dir.path().join("system-missing"));
        std::env::set_var("GIT_CONFIG_GLOBAL", dir.path().join("global-missing"));
        let cascade = Cascade::load(&gitdir, None).unwrap();
        assert_eq!(cascade.boolean("core", None, "bare").unwrap().unwrap(), true);
        std::env::remove_var("GIT_CONFIG_SYSTEM");
        std::env::remove_var("GIT_CONFIG_GLOBAL");
    }

    #[test]
    fn worktree_scope_is_skipped_without_the_extension() {
        let dir = tempfile::tempdir().unwrap();
        let gitdir = dir.path().join("repo.git");
        std::fs::create_dir_all(gitdir.join("worktrees").join("wt")).unwrap();
        std::fs::write(gitdir.join("config"), b"[core]\n\tbare=false\n").unwrap();
        std::fs::write(gitdir.join("worktrees").join("wt").join("config.worktree"), b"[core]\n\tbare=true\n").unwrap();

        std::env::set_var("GIT_CONFIG_SYSTEM", dir.path().join("system-missing"));
        std::env::set_var("GIT_CONFIG_GLOBAL", dir.path().join("global-missing"));
        let cascade = Cascade::load(&gitdir, Some("wt")).unwrap();
        assert_eq!(cascade.sources.len(), 3);
        std::env::remove_var("GIT_CONFIG_SYSTEM");
        std::env::remove_var("GIT_CONFIG_GLOBAL");
    }
}
