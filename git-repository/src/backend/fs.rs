//! A [`GitBackend`] rooted at a real `$GIT_DIR` on disk, delegating to the lower-layer crates
//! that already implement each piece: [`git_odb`] for objects, [`git_ref`] for refs, [`git_config`]
//! for the config cascade, [`git_index`] for the staging area.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use bstr::{BStr, BString, ByteSlice};
use git_features::threading::OwnShared;
use git_hash::ObjectId;
use git_odb::store::general;
use git_odb::{Find, Write as _};
use git_ref::store::{packed, ReflogMode};
use git_ref::transaction::{PreviousValue, Target};

use super::{GitBackend, InitOptions, WorktreeGitdir};

/// The error returned by every [`Fs`] operation: each lower-layer crate's own error, boxed so
/// this type doesn't have to name their private associated-error types.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[allow(missing_docs)]
    #[error("object store access failed")]
    Odb(#[source] Box<dyn std::error::Error + Send + Sync>),
    #[allow(missing_docs)]
    #[error(transparent)]
    Ref(#[from] git_ref::store::Error),
    #[allow(missing_docs)]
    #[error(transparent)]
    Packed(#[from] packed::Error),
    #[allow(missing_docs)]
    #[error(transparent)]
    Config(#[from] git_config::cascade::Error),
    #[allow(missing_docs)]
    #[error(transparent)]
    Index(#[from] git_index::Error),
    /// The index file exists but is zero bytes (spec.md §4.4: distinct from a missing file,
    /// which reads as a fresh empty index instead).
    #[error("index at {path} exists but is empty")]
    EmptyIndex {
        #[allow(missing_docs)]
        path: PathBuf,
    },
    #[allow(missing_docs)]
    #[error("failed to access {path}")]
    Io {
        #[allow(missing_docs)]
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// A repository (or linked worktree) backed by the real filesystem.
pub struct Fs {
    git_dir: PathBuf,
    common_dir: PathBuf,
    worktree_name: Option<String>,
    hash_kind: git_hash::Kind,
    odb: general::Handle<OwnShared<general::Store>>,
    refs: git_ref::Store,
}

impl Fs {
    /// Open a backend for the repository (or linked worktree) whose private git-dir is
    /// `git_dir` and whose shared object/ref storage lives under `common_dir` (equal to
    /// `git_dir` for the main worktree).
    pub fn at(git_dir: impl Into<PathBuf>, common_dir: impl Into<PathBuf>, hash_kind: git_hash::Kind) -> Result<Self, Error> {
        let git_dir = git_dir.into();
        let common_dir = common_dir.into();
        let odb_store = general::Store::at(common_dir.join("objects"), hash_kind);
        let odb = odb_store
            .to_handle(general::RefreshMode::AfterCheckingForMorePacks)
            .map_err(|e| Error::Odb(Box::new(e)))?;
        let refs = git_ref::Store::with_common_dir(&git_dir, &common_dir, hash_kind, ReflogMode::Enabled);
        Ok(Fs { git_dir, common_dir, worktree_name: None, hash_kind, odb, refs })
    }

    /// The same backend, but attributed to linked worktree `name` for config-cascade lookups
    /// (`worktrees/<name>/config.worktree` under `extensions.worktreeConfig`).
    pub fn for_worktree(mut self, name: impl Into<String>) -> Self {
        self.worktree_name = Some(name.into());
        self
    }

    fn packed_path(&self) -> PathBuf {
        self.common_dir.join("packed-refs")
    }
}

impl GitBackend for Fs {
    type Error = Error;

    fn initialize(&self, options: &InitOptions) -> Result<(), Error> {
        if self.is_initialized() {
            return Ok(());
        }
        for dir in ["objects", "objects/pack", "refs", "refs/heads", "refs/tags"] {
            std::fs::create_dir_all(self.common_dir.join(dir)).map_err(|source| Error::Io {
                path: self.common_dir.join(dir),
                source,
            })?;
        }
        self.write_head(BStr::new(b"ref: refs/heads/main\n"))?;
        let mut config = git_config::File::default();
        config.set_raw_value("core", None, "repositoryformatversion", "0");
        config.set_raw_value("core", None, "filemode", "true");
        config.set_raw_value("core", None, "bare", if options.bare { "true" } else { "false" });
        let path = self.git_dir.join("config");
        std::fs::write(&path, config.to_vec()).map_err(|source| Error::Io { path, source })?;
        Ok(())
    }

    fn is_initialized(&self) -> bool {
        self.common_dir.join("objects").is_dir() && self.git_dir.join("HEAD").is_file()
    }

    fn read_object(&self, id: &ObjectId) -> Result<Option<(git_object::Kind, Vec<u8>)>, Error> {
        self.odb
            .try_find(id)
            .map(|found| found.map(|o| (o.kind, o.data)))
            .map_err(|e| Error::Odb(Box::new(e)))
    }

    fn write_object(&self, kind: git_object::Kind, data: &[u8]) -> Result<ObjectId, Error> {
        self.odb.write_buf(kind, data, self.hash_kind).map_err(|e| Error::Odb(Box::new(e)))
    }

    fn has_object(&self, id: &ObjectId) -> Result<bool, Error> {
        Ok(self.odb.contains(id))
    }

    fn read_ref(&self, name: &BStr) -> Result<Option<ObjectId>, Error> {
        match self.refs.find(name) {
            Ok(resolved) => Ok(Some(resolved.target)),
            Err(git_ref::store::Error::NotFound { .. }) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn expand_ref(&self, name: &BStr) -> Result<Option<BString>, Error> {
        match self.refs.find(name) {
            Ok(resolved) => Ok(Some(resolved.name.as_bstr().to_owned())),
            Err(git_ref::store::Error::NotFound { .. }) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn write_ref(&self, name: &BStr, new: ObjectId, expected: PreviousValue, skip_reflog: bool) -> Result<(), Error> {
        let edit = git_ref::RefEdit {
            name: git_ref::FullName::new_unchecked(name.to_owned()),
            new: Target::Peeled(new),
            expected,
            skip_reflog,
            message: BString::from("git-repository"),
            signature: default_signature(),
        };
        self.refs.write(&edit)?;
        Ok(())
    }

    fn write_symbolic_ref(&self, name: &BStr, target: &BStr, expected: PreviousValue) -> Result<(), Error> {
        let edit = git_ref::RefEdit {
            name: git_ref::FullName::new_unchecked(name.to_owned()),
            new: Target::Symbolic(git_ref::FullName::new_unchecked(target.to_owned())),
            expected,
            skip_reflog: true,
            message: BString::default(),
            signature: default_signature(),
        };
        self.refs.write(&edit)?;
        Ok(())
    }

    fn read_symbolic_ref(&self, name: &BStr) -> Result<Option<Target>, Error> {
        let full = git_ref::FullName::new_unchecked(name.to_owned());
        Ok(self.refs.read_raw(&full.as_ref())?)
    }

    fn delete_ref(&self, name: &BStr) -> Result<(), Error> {
        let full = git_ref::FullName::new_unchecked(name.to_owned());
        Ok(self.refs.delete(&full.as_ref())?)
    }

    fn list_refs(&self, prefix: &str) -> Result<Vec<BString>, Error> {
        Ok(self.refs.iter_prefixed(prefix)?.into_iter().map(|n| n.as_bstr().to_owned()).collect())
    }

    fn read_config(&self) -> Result<git_config::cascade::Cascade, Error> {
        Ok(git_config::cascade::Cascade::load(&self.git_dir, self.worktree_name.as_deref())?)
    }

    fn write_config(
        &self,
        scope: git_sec::Scope,
        section: &str,
        subsection: Option<&str>,
        key: &str,
        value: &str,
    ) -> Result<(), Error> {
        let mut cascade = self.read_config()?;
        cascade.ensure_scope(scope).set_raw_value(section, subsection, key, value);
        let source = cascade.sources.iter().find(|s| s.scope == scope).expect("ensure_scope just populated it");
        let file = source.file.as_ref().expect("ensure_scope just populated it");
        std::fs::write(&source.path, file.to_vec()).map_err(|e| Error::Io { path: source.path.clone(), source: e })
    }

    fn remove_config_section(&self, section: &str, subsection: Option<&str>) -> Result<(), Error> {
        let mut cascade = self.read_config()?;
        let scope = git_sec::Scope::Local;
        cascade.ensure_scope(scope).remove_section(section, subsection);
        let source = cascade.sources.iter().find(|s| s.scope == scope).expect("ensure_scope just populated it");
        let file = source.file.as_ref().expect("ensure_scope just populated it");
        std::fs::write(&source.path, file.to_vec()).map_err(|e| Error::Io { path: source.path.clone(), source: e })
    }

    fn read_index(&self) -> Result<Option<git_index::State>, Error> {
        let path = self.git_dir.join("index");
        let data = match std::fs::read(&path) {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(source) => return Err(Error::Io { path, source }),
        };
        if data.is_empty() {
            return Err(Error::EmptyIndex { path });
        }
        // A legacy tool may leave an all-zero-magic placeholder; git treats that as empty
        // rather than a parse error, but any other malformed signature still propagates.
        if data.len() >= 4 && data[..4] == [0u8, 0, 0, 0] {
            return Ok(Some(git_index::State::empty(self.hash_kind)));
        }
        Ok(Some(git_index::State::from_bytes(&data, self.hash_kind)?))
    }

    fn write_index(&self, index: &git_index::State) -> Result<(), Error> {
        Ok(index.write_to_file(self.git_dir.join("index"))?)
    }

    fn has_index(&self) -> Result<bool, Error> {
        Ok(self.git_dir.join("index").is_file())
    }

    fn index_fingerprint(&self) -> Result<Option<super::IndexFingerprint>, Error> {
        let path = self.git_dir.join("index");
        let metadata = match std::fs::metadata(&path) {
            Ok(metadata) => metadata,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(source) => return Err(Error::Io { path, source }),
        };
        let modified = metadata.modified().map_err(|source| Error::Io { path: path.clone(), source })?;
        let since_epoch = modified.duration_since(std::time::UNIX_EPOCH).unwrap_or_default();
        Ok(Some(super::IndexFingerprint {
            mtime_secs: since_epoch.as_secs() as i64,
            mtime_nanos: since_epoch.subsec_nanos(),
            len: metadata.len(),
        }))
    }

    fn write_head(&self, content: &BStr) -> Result<(), Error> {
        let path = self.git_dir.join("HEAD");
        std::fs::write(&path, content.as_bytes()).map_err(|source| Error::Io { path, source })
    }

    fn create_worktree_gitdir(&self, name: &str) -> Result<WorktreeGitdir, Error> {
        let path = self.common_dir.join("worktrees").join(name);
        std::fs::create_dir_all(&path).map_err(|source| Error::Io { path: path.clone(), source })?;
        let gitdir_file = path.join("gitdir");
        std::fs::write(&gitdir_file, b"").map_err(|source| Error::Io { path: gitdir_file, source })?;
        Ok(WorktreeGitdir { path, name: name.to_owned() })
    }

    fn write_worktree_head(&self, worktree: &WorktreeGitdir, content: &BStr) -> Result<(), Error> {
        let path = worktree.path.join("HEAD");
        std::fs::write(&path, content.as_bytes()).map_err(|source| Error::Io { path, source })
    }

    fn read_packed_refs(&self) -> Result<BTreeMap<BString, ObjectId>, Error> {
        let mut out = BTreeMap::new();
        if let Some(buffer) = packed::Buffer::open(self.packed_path())? {
            for entry in buffer.iter() {
                let entry = entry?;
                out.insert(entry.name.as_bstr().to_owned(), entry.object()?);
            }
        }
        Ok(out)
    }

    fn write_packed_refs(&self, refs: &BTreeMap<BString, ObjectId>) -> Result<(), Error> {
        let edits: Vec<_> = refs.iter().map(|(name, oid)| (name.clone(), Some((*oid, None)))).collect();
        let existing = packed::Buffer::open(self.packed_path())?.unwrap_or_default();
        let rewritten = existing.with_edits(&edits)?;
        Ok(packed::Buffer::persist(self.packed_path(), &rewritten)?)
    }

    fn file_system_root(&self) -> Option<&Path> {
        Some(&self.git_dir)
    }
}

fn default_signature() -> git_actor::Signature {
    git_actor::Signature {
        name: BString::from("git-repository"),
        email: BString::from("git-repository@localhost"),
        time: git_date::Time { seconds_since_epoch: 0, offset_in_minutes: 0 },
    }
}
