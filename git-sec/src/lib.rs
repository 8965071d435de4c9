//! Trust classification used when deciding whether a discovered config file or
//! gitdir should be trusted.
//!
//! This is deliberately tiny: the core only needs enough of a trust model to
//! decide whether `system`/`global` config is allowed to influence a given
//! repository open, per spec.md §6's config discovery order.

#![deny(missing_docs)]

/// How much a particular source of configuration should be trusted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Trust {
    /// The source is owned by the current user (or explicitly requested via an env override)
    /// and its full effect set is applied.
    Full,
    /// The source is not owned by the current user; only a reduced, safe subset of
    /// configuration keys should be honoured from it.
    Reduced,
}

impl Trust {
    /// Derive trust from whether `path` is owned by the process's effective user.
    ///
    /// On platforms without a meaningful ownership concept this always returns [`Trust::Full`].
    pub fn from_path_ownership(path: &std::path::Path) -> Self {
        owned_by_current_user(path).unwrap_or(true).then(|| Trust::Full).unwrap_or(Trust::Reduced)
    }
}

#[cfg(unix)]
fn owned_by_current_user(path: &std::path::Path) -> Option<bool> {
    use std::os::unix::fs::MetadataExt;
    let meta = std::fs::metadata(path).ok()?;
    // A freshly created file is always owned by our own effective uid; read it back
    // instead of pulling in libc for a single `geteuid(2)` call.
    let marker = std::env::temp_dir().join(format!(".git-sec-euid-probe-{}", std::process::id()));
    std::fs::write(&marker, []).ok()?;
    let euid = std::fs::metadata(&marker).ok()?.uid();
    let _ = std::fs::remove_file(&marker);
    Some(meta.uid() == euid)
}

#[cfg(not(unix))]
fn owned_by_current_user(_path: &std::path::Path) -> Option<bool> {
    None
}

/// Where a piece of configuration originated, mirroring spec.md §3's four-scope cascade.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Scope {
    /// `$GIT_CONFIG_SYSTEM` or the platform default system config.
    System,
    /// `$GIT_CONFIG_GLOBAL`, `$XDG_CONFIG_HOME/git/config`, or `$HOME/.gitconfig`.
    Global,
    /// `<gitdir>/config`.
    Local,
    /// `<gitdir>/worktrees/<name>/config.worktree`, only consulted if `extensions.worktreeConfig=true`.
    Worktree,
}

impl Scope {
    /// Scopes ordered lowest to highest precedence, matching the cascade in spec.md §3.
    pub const ORDER: [Scope; 4] = [Scope::System, Scope::Global, Scope::Local, Scope::Worktree];
}
