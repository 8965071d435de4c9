//! The git index: a `DIRC` version 2 binary staging file listing every tracked path at its
//! staged oid, from which the next commit's tree is computed (spec.md §3 "Index entry", §4.4
//! "Index engine").
//!
//! [`State`] is the in-memory form; [`State::from_bytes()`]/[`State::to_bytes()`] are the pure
//! codec, and [`State::read_from_file()`]/[`State::write_to_file()`] are filesystem
//! conveniences for backends that keep the index as a plain file. Caching a `State` against a
//! file's mtime, and the byte-identity guarantee that a write is immediately visible to the next
//! read, is a `Repository`-level concern layered on top of this crate, not part of it.

#![deny(missing_docs)]

use std::path::Path;

use bstr::{BStr, ByteSlice};

pub mod decode;
mod encode;
pub mod entry;

pub use entry::{Entry, Stage, Time};

/// The error returned by [`State::from_bytes()`] and [`State::read_from_file()`].
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[allow(missing_docs)]
    #[error(transparent)]
    Decode(#[from] decode::Error),
    /// The file couldn't be read, or the rewritten file couldn't be written/renamed.
    #[error("failed to access index at {path}")]
    Io {
        #[allow(missing_docs)]
        path: std::path::PathBuf,
        #[allow(missing_docs)]
        #[source]
        source: std::io::Error,
    },
    /// The tempfile used to atomically replace the index couldn't be renamed into place.
    #[error("failed to move index into place")]
    Persist(#[from] tempfile::PersistError),
}

/// The parsed contents of an index file: every staged path, sorted by `(path, stage)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct State {
    entries: Vec<Entry>,
    hash_kind: git_hash::Kind,
}

impl State {
    /// An empty index for a repository using `hash_kind`.
    pub fn empty(hash_kind: git_hash::Kind) -> Self {
        State {
            entries: Vec::new(),
            hash_kind,
        }
    }

    /// Wrap already-decoded entries, sorting them into `(path, stage)` order
    /// (spec.md §3: "Entries sorted by `(path, stage)` ascending").
    pub fn from_entries(entries: Vec<Entry>, hash_kind: git_hash::Kind) -> Self {
        let mut state = State { entries, hash_kind };
        state.sort();
        state
    }

    fn sort(&mut self) {
        self.entries.sort_by(|a, b| a.sort_key().cmp(&b.sort_key()));
    }

    /// Parse a complete `DIRC` v2 file already read into memory.
    pub fn from_bytes(data: &[u8], hash_kind: git_hash::Kind) -> Result<Self, Error> {
        let mut entries = decode::from_bytes(data, hash_kind)?;
        entries.sort_by(|a, b| a.sort_key().cmp(&b.sort_key()));
        Ok(State { entries, hash_kind })
    }

    /// Serialise into a complete `DIRC` v2 file, entries in `(path, stage)` order, trailing hash
    /// recomputed.
    pub fn to_bytes(&self) -> Vec<u8> {
        encode::to_bytes(&self.entries, self.hash_kind)
    }

    /// Read and parse `path`.
    ///
    /// Per spec.md §4.4: a missing file yields a fresh empty index, while a file that exists but
    /// is zero bytes is `InternalError`-worthy corruption — callers that need to distinguish
    /// "doesn't exist" from "empty on disk" should `lstat` first and call this only when the
    /// file is known to exist.
    pub fn read_from_file(path: impl AsRef<Path>, hash_kind: git_hash::Kind) -> Result<Self, Error> {
        let path = path.as_ref();
        let data = std::fs::read(path).map_err(|source| Error::Io {
            path: path.to_owned(),
            source,
        })?;
        Self::from_bytes(&data, hash_kind)
    }

    /// Atomically replace `path` with this index's serialised content, via a tempfile in the
    /// same directory renamed into place.
    pub fn write_to_file(&self, path: impl AsRef<Path>) -> Result<(), Error> {
        let path = path.as_ref();
        let dir = path.parent().unwrap_or_else(|| Path::new("."));
        let mut tmp = tempfile::NamedTempFile::new_in(dir).map_err(|source| Error::Io {
            path: path.to_owned(),
            source,
        })?;
        std::io::Write::write_all(&mut tmp, &self.to_bytes()).map_err(|source| Error::Io {
            path: path.to_owned(),
            source,
        })?;
        tmp.persist(path)?;
        Ok(())
    }

    /// The hash family this index's trailer (and its entries' oids) is encoded with.
    pub fn hash_kind(&self) -> git_hash::Kind {
        self.hash_kind
    }

    /// Every entry, in `(path, stage)` order.
    pub fn entries(&self) -> &[Entry] {
        &self.entries
    }

    /// Look up the clean (stage 0) entry for `path`, if any.
    pub fn entry_by_path(&self, path: &BStr) -> Option<&Entry> {
        self.entries
            .iter()
            .find(|e| e.path.as_bstr() == path && e.stage == Stage::Clean)
    }

    /// Replace the entries for `path` at every stage with a single clean entry, preserving sort
    /// order. Used by `add`/`reset` to stage a path cleanly, discarding any unmerged state.
    pub fn stage_clean(&mut self, entry: Entry) {
        self.entries.retain(|e| e.path != entry.path);
        let insert_at = self.entries.partition_point(|e| e.sort_key() < entry.sort_key());
        self.entries.insert(insert_at, entry);
    }

    /// Remove every entry (at any stage) for `path`.
    pub fn remove_path(&mut self, path: &BStr) {
        self.entries.retain(|e| e.path.as_bstr() != path);
    }

    /// The distinct paths that have at least one non-clean-stage entry
    /// (spec.md §4.4: "`unmergedPaths`: list of paths with any stage≠0").
    pub fn unmerged_paths(&self) -> Vec<&BStr> {
        let mut paths = Vec::new();
        for entry in &self.entries {
            if entry.stage.is_unmerged() && !paths.contains(&entry.path.as_bstr()) {
                paths.push(entry.path.as_bstr());
            }
        }
        paths
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use git_hash::ObjectId;
    use git_object::tree::EntryMode;

    fn entry(path: &str, stage: Stage) -> Entry {
        Entry {
            ctime: Time::default(),
            mtime: Time::default(),
            dev: 0,
            ino: 0,
            mode: EntryMode::Blob,
            uid: 0,
            gid: 0,
            size: 5,
            oid: ObjectId::from_bytes_unchecked(git_hash::Kind::Sha1, &[7; 20]),
            stage,
            assume_valid: false,
            path: path.into(),
        }
    }

    #[test]
    fn round_trips_through_bytes() {
        let state = State::from_entries(
            vec![entry("b.txt", Stage::Clean), entry("a.txt", Stage::Clean)],
            git_hash::Kind::Sha1,
        );
        let bytes = state.to_bytes();
        let decoded = State::from_bytes(&bytes, git_hash::Kind::Sha1).unwrap();
        assert_eq!(decoded, state);
        assert_eq!(decoded.entries()[0].path, "a.txt");
        assert_eq!(decoded.entries()[1].path, "b.txt");
    }

    #[test]
    fn rejects_a_corrupted_trailing_hash() {
        let state = State::from_entries(vec![entry("a.txt", Stage::Clean)], git_hash::Kind::Sha1);
        let mut bytes = state.to_bytes();
        let last = bytes.len() - 1;
        bytes[last] ^= 0xff;
        assert!(matches!(State::from_bytes(&bytes, git_hash::Kind::Sha1), Err(Error::Decode(decode::Error::HashMismatch))));
    }

    #[test]
    fn collects_unmerged_paths_once_each() {
        let state = State::from_entries(
            vec![
                entry("clean.txt", Stage::Clean),
                entry("conflict.txt", Stage::Base),
                entry("conflict.txt", Stage::Ours),
                entry("conflict.txt", Stage::Theirs),
            ],
            git_hash::Kind::Sha1,
        );
        assert_eq!(state.unmerged_paths(), vec![BStr::new(b"conflict.txt")]);
    }

    #[test]
    fn write_then_read_round_trips_via_the_filesystem() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("index");
        let state = State::from_entries(vec![entry("a.txt", Stage::Clean)], git_hash::Kind::Sha1);
        state.write_to_file(&path).unwrap();
        let read_back = State::read_from_file(&path, git_hash::Kind::Sha1).unwrap();
        assert_eq!(read_back, state);
    }
}
