//! Exclusive lockfiles implementing git's own `<path>.lock` convention: create the lock file
//! with `O_EXCL`, write the new contents into it, then atomically rename it over the real
//! file. Used by `git-ref` (ref and reflog writes) and `git-index` (index writes) to give the
//! ordering guarantees spec.md §5 requires — readers see either the pre- or post-write value,
//! never a torn read.

#![deny(missing_docs)]

use std::{
    fs::{self, File, OpenOptions},
    io,
    path::{Path, PathBuf},
    time::{Duration, Instant},
};

/// Options controlling how long [`File::acquire_to_update_resource`] waits for a competing lock to clear.
pub mod acquire {
    use std::time::Duration;

    /// How to behave if a lock is already held by someone else.
    #[derive(Debug, Clone, Copy)]
    pub enum Fail {
        /// Don't wait at all; fail the moment the lock can't be acquired.
        Immediately,
        /// Retry with the given total timeout before giving up.
        AfterDurationWithBackoff(Duration),
    }

    impl Default for Fail {
        fn default() -> Self {
            // Matches spec.md §5's "default ~1s" lock timeout.
            Fail::AfterDurationWithBackoff(Duration::from_secs(1))
        }
    }
}

/// An error produced while trying to acquire or commit a lock.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Someone else holds the lock and the configured wait budget was exhausted.
    #[error("could not acquire lock for {resource:?} within the configured timeout")]
    Timeout {
        /// The path being locked (without the `.lock` suffix).
        resource: PathBuf,
    },
    /// The lock file or its parent directory could not be created or written.
    #[error("io error handling lock for {resource:?}: {source}")]
    Io {
        /// The path being locked (without the `.lock` suffix).
        resource: PathBuf,
        /// The underlying error.
        #[source]
        source: io::Error,
    },
}

fn lock_path(resource: &Path) -> PathBuf {
    let mut s = resource.as_os_str().to_owned();
    s.push(".lock");
    PathBuf::from(s)
}

fn try_create_exclusive(lock_path: &Path) -> io::Result<File> {
    if let Some(parent) = lock_path.parent() {
        fs::create_dir_all(parent)?;
    }
    OpenOptions::new().write(true).create_new(true).open(lock_path)
}

/// A held lock on `resource.lock`, ready to receive the new contents of `resource`.
#[derive(Debug)]
pub struct File {
    file: fs::File,
    lock_path: PathBuf,
    resource_path: PathBuf,
}

impl File {
    /// Acquire an exclusive lock on `resource` (i.e. create `resource.lock`), waiting according
    /// to `fail` if another writer holds it already.
    pub fn acquire_to_update_resource(resource: impl AsRef<Path>, fail: acquire::Fail, _rety_interval: Option<Duration>) -> Result<Self, Error> {
        let resource_path = resource.as_ref().to_owned();
        let lock = lock_path(&resource_path);
        let start = Instant::now();
        let retry_delay = Duration::from_millis(10);
        loop {
            match try_create_exclusive(&lock) {
                Ok(file) => {
                    return Ok(File {
                        file,
                        lock_path: lock,
                        resource_path,
                    })
                }
                Err(err) if err.kind() == io::ErrorKind::AlreadyExists => match fail {
                    acquire::Fail::Immediately => return Err(Error::Timeout { resource: resource_path }),
                    acquire::Fail::AfterDurationWithBackoff(timeout) => {
                        if start.elapsed() >= timeout {
                            return Err(Error::Timeout { resource: resource_path });
                        }
                        std::thread::sleep(retry_delay);
                    }
                },
                Err(source) => return Err(Error::Io { resource: resource_path, source }),
            }
        }
    }

    /// The path that will be written to on [`commit()`][File::commit()].
    pub fn resource_path(&self) -> &Path {
        &self.resource_path
    }

    /// Write `contents` as the full new body of the locked resource.
    pub fn write_all(&mut self, contents: &[u8]) -> io::Result<()> {
        use io::Write;
        self.file.write_all(contents)
    }

    /// Commit the lock: flush, then atomically rename the lock file over the resource path.
    pub fn commit(mut self) -> Result<PathBuf, Error> {
        use io::Write;
        self.file.flush().map_err(|source| Error::Io {
            resource: self.resource_path.clone(),
            source,
        })?;
        fs::rename(&self.lock_path, &self.resource_path).map_err(|source| Error::Io {
            resource: self.resource_path.clone(),
            source,
        })?;
        Ok(self.resource_path)
    }

    /// Release the lock without writing anything, discarding the lock file.
    pub fn rollback(self) {
        let _ = fs::remove_file(&self.lock_path);
    }
}

/// A lock that is held (the `.lock` file exists) but has no writer attached — used when the
/// caller only needs to assert exclusivity, such as `git-ref`'s packed-refs transaction holding
/// a lock on `packed-refs` while editing loose refs that shadow it.
#[derive(Debug)]
pub struct Marker {
    lock_path: PathBuf,
    resource_path: PathBuf,
}

impl Marker {
    /// Acquire a marker lock on `resource`.
    pub fn acquire_to_hold_resource(resource: impl AsRef<Path>, fail: acquire::Fail, retry_interval: Option<Duration>) -> Result<Self, Error> {
        let file = File::acquire_to_update_resource(resource, fail, retry_interval)?;
        Ok(Marker {
            lock_path: file.lock_path.clone(),
            resource_path: file.resource_path.clone(),
        })
    }

    /// The resource this marker is protecting.
    pub fn resource_path(&self) -> &Path {
        &self.resource_path
    }
}

impl Drop for Marker {
    fn drop(&mut self) {
        let _ = fs::remove_file(&self.lock_path);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn acquire_write_commit_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("HEAD");
        let mut lock = File::acquire_to_update_resource(&target, acquire::Fail::Immediately, None).unwrap();
        lock.write_all(b"ref: refs/heads/main\n").unwrap();
        lock.commit().unwrap();
        assert_eq!(fs::read(&target).unwrap(), b"ref: refs/heads/main\n");
        assert!(!lock_path(&target).exists());
    }

    #[test]
    fn second_acquire_fails_immediately_while_held() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("HEAD");
        let _held = File::acquire_to_update_resource(&target, acquire::Fail::Immediately, None).unwrap();
        let second = File::acquire_to_update_resource(&target, acquire::Fail::Immediately, None);
        assert!(matches!(second, Err(Error::Timeout { .. })));
    }

    #[test]
    fn rollback_removes_lock_without_touching_resource() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("HEAD");
        fs::write(&target, b"old").unwrap();
        let mut lock = File::acquire_to_update_resource(&target, acquire::Fail::Immediately, None).unwrap();
        lock.write_all(b"new").unwrap();
        lock.rollback();
        assert_eq!(fs::read(&target).unwrap(), b"old");
    }
}
