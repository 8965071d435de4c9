//! A [`WorktreeBackend`] rooted at a real directory on disk.

use std::path::PathBuf;
use std::time::UNIX_EPOCH;

use bstr::{BStr, BString, ByteSlice};
use git_object::tree::EntryMode;

use super::{Metadata, WorktreeBackend};

/// Working-tree I/O against a real directory, the production implementation used by
/// `git-repository`.
#[derive(Debug, Clone)]
pub struct Fs {
    root: PathBuf,
}

impl Fs {
    /// Root every path passed to this backend's methods at `root`.
    pub fn at(root: impl Into<PathBuf>) -> Self {
        Fs { root: root.into() }
    }

    fn native(&self, path: &BStr) -> Result<PathBuf, Error> {
        let rel = git_path::to_native_path(path)?;
        Ok(self.root.join(rel))
    }
}

/// The error produced by [`Fs`]'s [`WorktreeBackend`] implementation.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A path couldn't be converted between git's `/`-separated form and the native encoding.
    #[error(transparent)]
    Path(#[from] git_path::Error),
    /// The underlying filesystem call failed.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl WorktreeBackend for Fs {
    type Error = Error;

    fn metadata(&self, path: &BStr) -> Result<Option<Metadata>, Self::Error> {
        let native = self.native(path)?;
        let meta = match std::fs::symlink_metadata(&native) {
            Ok(meta) => meta,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(err.into()),
        };
        let mtime_secs = meta
            .modified()
            .ok()
            .and_then(|time| time.duration_since(UNIX_EPOCH).ok())
            .map(|duration| duration.as_secs())
            .unwrap_or(0);
        let mode = if meta.file_type().is_symlink() {
            EntryMode::Link
        } else if is_executable(&meta) {
            EntryMode::BlobExecutable
        } else {
            EntryMode::Blob
        };
        Ok(Some(Metadata {
            is_dir: meta.is_dir(),
            size: meta.len(),
            mtime_secs,
            mode,
        }))
    }

    fn read_file(&self, path: &BStr) -> Result<Vec<u8>, Self::Error> {
        Ok(std::fs::read(self.native(path)?)?)
    }

    fn write_file(&self, path: &BStr, mode: EntryMode, content: &[u8]) -> Result<(), Self::Error> {
        let native = self.native(path)?;
        std::fs::write(&native, content)?;
        set_executable(&native, mode == EntryMode::BlobExecutable)?;
        Ok(())
    }

    fn remove_file(&self, path: &BStr) -> Result<(), Self::Error> {
        match std::fs::remove_file(self.native(path)?) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err.into()),
        }
    }

    fn create_dir_all(&self, path: &BStr) -> Result<(), Self::Error> {
        Ok(std::fs::create_dir_all(self.native(path)?)?)
    }

    fn remove_dir_if_empty(&self, path: &BStr) -> Result<(), Self::Error> {
        match std::fs::remove_dir(self.native(path)?) {
            Ok(()) => Ok(()),
            Err(err) if matches!(err.kind(), std::io::ErrorKind::NotFound) => Ok(()),
            // A non-empty directory is left alone; std has no portable "is not empty" kind yet.
            Err(_) => Ok(()),
        }
    }

    fn list_dir(&self, path: &BStr) -> Result<Vec<BString>, Self::Error> {
        let native = self.native(path)?;
        let mut out = Vec::new();
        let entries = match std::fs::read_dir(&native) {
            Ok(entries) => entries,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(out),
            Err(err) => return Err(err.into()),
        };
        for entry in entries {
            let entry = entry?;
            let name = git_path::into_bstr(&PathBuf::from(entry.file_name()))?;
            let child = if path.is_empty() {
                name
            } else {
                git_path::join(path, name.as_bstr())
            };
            out.push(child);
        }
        Ok(out)
    }
}

#[cfg(unix)]
fn is_executable(meta: &std::fs::Metadata) -> bool {
    use std::os::unix::fs::PermissionsExt;
    meta.permissions().mode() & 0o111 != 0
}

#[cfg(not(unix))]
fn is_executable(_meta: &std::fs::Metadata) -> bool {
    false
}

#[cfg(unix)]
fn set_executable(path: &std::path::Path, executable: bool) -> std::io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    let mut perms = std::fs::metadata(path)?.permissions();
    let mode = if executable { 0o755 } else { 0o644 };
    perms.set_mode(mode);
    std::fs::set_permissions(path, perms)
}

#[cfg(not(unix))]
fn set_executable(_path: &std::path::Path, _executable: bool) -> std::io::Result<()> {
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn write_then_read_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let backend = Fs::at(dir.path());
        backend.create_dir_all(BStr::new(b"a")).unwrap();
        backend.write_file(BStr::new(b"a/b.txt"), EntryMode::Blob, b"hello").unwrap();
        assert_eq!(backend.read_file(BStr::new(b"a/b.txt")).unwrap(), b"hello");
        let meta = backend.metadata(BStr::new(b"a/b.txt")).unwrap().unwrap();
        assert!(!meta.is_dir);
        assert_eq!(meta.size, 5);
    }

    #[test]
    fn missing_path_has_no_metadata() {
        let dir = tempfile::tempdir().unwrap();
        let backend = Fs::at(dir.path());
        assert!(backend.metadata(BStr::new(b"nope")).unwrap().is_none());
    }

    #[test]
    fn list_dir_reports_children_as_full_relative_paths() {
        let dir = tempfile::tempdir().unwrap();
        let backend = Fs::at(dir.path());
        backend.create_dir_all(BStr::new(b"a")).unwrap();
        backend.write_file(BStr::new(b"a/one.txt"), EntryMode::Blob, b"1").unwrap();
        let mut children = backend.list_dir(BStr::new(b"a")).unwrap();
        children.sort();
        assert_eq!(children, vec![BString::from("a/one.txt")]);
    }

    #[test]
    fn remove_file_on_missing_path_is_a_no_op() {
        let dir = tempfile::tempdir().unwrap();
        let backend = Fs::at(dir.path());
        backend.remove_file(BStr::new(b"nope")).unwrap();
    }
}
