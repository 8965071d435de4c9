//! The `packed-refs` file: a sorted, flat snapshot of many refs in one file, used to avoid
//! one-loose-file-per-ref blowups on repositories with many tags/branches (spec.md §4.1
//! "Packed-refs parser", §6).

use std::path::{Path, PathBuf};

use bstr::{BStr, BString, ByteSlice};
use git_hash::ObjectId;

use crate::FullNameRef;

/// The error returned by [`Buffer::open()`], [`Buffer::find()`] and [`Buffer::persist()`].
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The file couldn't be read or the rewritten file couldn't be locked/committed.
    #[error("failed to access packed-refs at {path}")]
    Io {
        #[allow(missing_docs)]
        path: PathBuf,
        #[allow(missing_docs)]
        #[source]
        source: std::io::Error,
    },
    /// A line wasn't `"<oid> <ref>"` or `"^<oid>"`.
    #[error("packed-refs is malformed at line {line}")]
    Malformed {
        #[allow(missing_docs)]
        line: usize,
    },
    /// An oid wasn't valid hex for the active hash.
    #[error(transparent)]
    Hash(#[from] git_hash::from_hex::Error),
    /// Acquiring or committing the rewrite lock failed.
    #[error(transparent)]
    Lock(#[from] git_lock::Error),
}

/// A reference as parsed from the `packed-refs` file.
#[derive(Debug, PartialEq, Eq)]
pub struct Reference<'a> {
    /// The full name of the reference.
    pub name: FullNameRef<'a>,
    /// The oid this reference points at directly, hex-encoded.
    pub target: &'a BStr,
    /// The fully-peeled object this reference ultimately points to (present for annotated tags).
    pub peeled: Option<&'a BStr>,
}

impl<'a> Reference<'a> {
    /// Decode [`target`][Reference::target] as an object id.
    pub fn target(&self) -> Result<ObjectId, Error> {
        Ok(ObjectId::from_hex(self.target)?)
    }

    /// Decode the object this reference ultimately points to: [`peeled`][Reference::peeled] if
    /// set, else [`target()`][Reference::target()].
    pub fn object(&self) -> Result<ObjectId, Error> {
        match self.peeled {
            Some(id) => Ok(ObjectId::from_hex(id)?),
            None => self.target(),
        }
    }
}

/// The whole `packed-refs` file, held in memory, sorted by reference name as git itself
/// guarantees when it writes the file.
#[derive(Debug, Default)]
pub struct Buffer {
    data: Vec<u8>,
    /// Byte offset of the first record, past the optional `# pack-refs with: ...` header line.
    body_start: usize,
    path: PathBuf,
}

impl Buffer {
    /// Read and hold `path` in memory, or return `Ok(None)` if it doesn't exist.
    pub fn open(path: impl AsRef<Path>) -> Result<Option<Self>, Error> {
        let path = path.as_ref();
        let data = match std::fs::read(path) {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(source) => {
                return Err(Error::Io {
                    path: path.to_owned(),
                    source,
                })
            }
        };
        let body_start = if data.starts_with(b"#") {
            data.find_byte(b'\n').map(|i| i + 1).unwrap_or(data.len())
        } else {
            0
        };
        Ok(Some(Buffer {
            data,
            body_start,
            path: path.to_owned(),
        }))
    }

    /// Iterate every reference in the file, in the order it was written (which git keeps
    /// lexically sorted by name).
    pub fn iter(&self) -> Iter<'_> {
        Iter {
            cursor: self.data[self.body_start..].as_bstr(),
        }
    }

    /// Find a single reference by its fully-qualified name.
    pub fn find(&self, name: &BStr) -> Result<Option<Reference<'_>>, Error> {
        for entry in self.iter() {
            let entry = entry?;
            if entry.name.as_bstr() == name {
                return Ok(Some(entry));
            }
        }
        Ok(None)
    }

    /// Rewrite the file's content with `edits` applied: a name mapped to `None` is removed, one
    /// mapped to `Some((target, peeled))` is inserted or replaces its existing line.
    pub fn with_edits(&self, edits: &[(BString, Option<(ObjectId, Option<ObjectId>)>)]) -> Result<Vec<u8>, Error> {
        let mut lines: Vec<(BString, ObjectId, Option<ObjectId>)> = Vec::new();
        for entry in self.iter() {
            let entry = entry?;
            lines.push((
                entry.name.as_bstr().to_owned(),
                entry.target()?,
                entry.peeled.map(|id| ObjectId::from_hex(id)).transpose()?,
            ));
        }
        for (name, replacement) in edits {
            lines.retain(|(existing, _, _)| existing != name);
            if let Some((target, peeled)) = replacement {
                lines.push((name.clone(), *target, *peeled));
            }
        }
        lines.sort_by(|a, b| a.0.cmp(&b.0));

        let mut out = Vec::new();
        out.extend_from_slice(b"# pack-refs with: peeled fully-peeled sorted\n");
        for (name, target, peeled) in lines {
            out.extend_from_slice(target.to_hex().as_bytes());
            out.push(b' ');
            out.extend_from_slice(&name);
            out.push(b'\n');
            if let Some(peeled) = peeled {
                out.push(b'^');
                out.extend_from_slice(peeled.to_hex().as_bytes());
                out.push(b'\n');
            }
        }
        Ok(out)
    }

    /// Atomically replace the file at `path` with `contents`, via an exclusive lockfile.
    pub fn persist(path: impl AsRef<Path>, contents: &[u8]) -> Result<(), Error> {
        let path = path.as_ref();
        let mut lock = git_lock::File::acquire_to_update_resource(path, git_lock::acquire::Fail::default(), None)?;
        lock.write_all(contents).map_err(|source| Error::Io {
            path: path.to_owned(),
            source,
        })?;
        lock.commit()?;
        Ok(())
    }
}

/// An iterator over the references in a [`Buffer`].
pub struct Iter<'a> {
    cursor: &'a BStr,
}

impl<'a> Iterator for Iter<'a> {
    type Item = Result<Reference<'a>, Error>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if self.cursor.is_empty() {
                return None;
            }
            let nl = self.cursor.find_byte(b'\n').unwrap_or_else(|| self.cursor.len());
            let line = self.cursor[..nl].as_bstr();
            self.cursor = self.cursor[nl.saturating_add(1).min(self.cursor.len())..].as_bstr();

            if line.is_empty() || line.first() == Some(&b'^') {
                continue;
            }

            let space = match line.find_byte(b' ') {
                Some(i) => i,
                None => return Some(Err(Error::Malformed { line: 0 })),
            };
            let target = line[..space].as_bstr();
            let name = line[space + 1..].as_bstr();

            let mut peeled = None;
            if self.cursor.first() == Some(&b'^') {
                let peel_nl = self.cursor.find_byte(b'\n').unwrap_or_else(|| self.cursor.len());
                peeled = Some(self.cursor[1..peel_nl].as_bstr());
                self.cursor = self.cursor[peel_nl.saturating_add(1).min(self.cursor.len())..].as_bstr();
            }

            return Some(Ok(Reference {
                name: FullNameRef::new_unchecked(name),
                target,
                peeled,
            }));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_entries_with_peeled_annotations() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("packed-refs");
        std::fs::write(
            &path,
            b"# pack-refs with: peeled fully-peeled sorted\n\
              1111111111111111111111111111111111111111 refs/heads/main\n\
              2222222222222222222222222222222222222222 refs/tags/v1\n\
              ^3333333333333333333333333333333333333333\n",
        )
        .unwrap();

        let buffer = Buffer::open(&path).unwrap().unwrap();
        let entries: Vec<_> = buffer.iter().collect::<Result<_, _>>().unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[1].name.as_bstr(), "refs/tags/v1");
        assert!(entries[1].peeled.is_some());
        assert_eq!(entries[1].object().unwrap().to_hex(), "3333333333333333333333333333333333333333");
    }

    #[test]
    fn find_locates_a_single_ref_by_name() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("packed-refs");
        std::fs::write(&path, b"1111111111111111111111111111111111111111 refs/heads/main\n").unwrap();
        let buffer = Buffer::open(&path).unwrap().unwrap();
        let found = buffer.find(BStr::new(b"refs/heads/main")).unwrap().unwrap();
        assert_eq!(found.target().unwrap().to_hex(), "1111111111111111111111111111111111111111");
        assert!(buffer.find(BStr::new(b"refs/heads/other")).unwrap().is_none());
    }

    #[test]
    fn missing_file_opens_as_none() {
        let dir = tempfile::tempdir().unwrap();
        assert!(Buffer::open(dir.path().join("packed-refs")).unwrap().is_none());
    }
}
