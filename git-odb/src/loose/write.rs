//! Hashing and persisting a new loose object (spec.md §4.1 "Object-write algorithm").

use std::io::{Read, Write as _};

use git_hash::ObjectId;
use git_object::Kind;

/// The error returned by [`super::Db::write_stream()`].
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The source couldn't be fully read.
    #[error("failed to read object content to write")]
    Read(#[source] std::io::Error),
    /// Deflating or writing the tempfile failed.
    #[error("failed to write loose object")]
    Io(#[source] std::io::Error),
    /// The tempfile could not be renamed into place.
    #[error("failed to move loose object into place")]
    Persist(#[from] tempfile::PersistError),
}

impl super::Db {
    /// Read all of `from`, frame and hash it as `kind`, and write it loose unless an object with
    /// the same id is already present (spec.md §4.1: "if new, inflate-roundtrip the bytes,
    /// deflate, write to a tempfile and rename into place").
    pub fn write_stream(&self, kind: Kind, size: u64, mut from: impl Read, hash_kind: git_hash::Kind) -> Result<ObjectId, Error> {
        let mut payload = Vec::with_capacity(size as usize);
        from.read_to_end(&mut payload).map_err(Error::Read)?;
        let id = git_object::hash(hash_kind, kind, &payload);
        if self.contains(&id) {
            return Ok(id);
        }

        let framed = git_object::encode(kind, &payload);
        let dest = self.object_path(&id);
        let dir = dest.parent().expect("object_path always has a fan-out parent");
        std::fs::create_dir_all(dir).map_err(Error::Io)?;

        let mut tmp = tempfile::NamedTempFile::new_in(dir).map_err(Error::Io)?;
        let mut encoder = flate2::write::ZlibEncoder::new(&mut tmp, flate2::Compression::default());
        encoder.write_all(&framed).map_err(Error::Io)?;
        encoder.finish().map_err(Error::Io)?;
        tmp.persist(dest)?;
        Ok(id)
    }
}

#[cfg(test)]
mod tests {
    use super::super::Db;
    use git_object::Kind;

    #[test]
    fn write_then_read_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let db = Db::at(dir.path());
        let id = db.write_stream(Kind::Blob, 6, &b"hello\n"[..], git_hash::Kind::Sha1).unwrap();
        assert_eq!(id.to_hex(), "ce013625030ba8dba906f756967f9e9ca394464a");
        let found = db.try_find(&id).unwrap().unwrap();
        assert_eq!(found.kind, Kind::Blob);
        assert_eq!(found.data, b"hello\n");
    }

    #[test]
    fn writing_an_existing_object_is_a_no_op() {
        let dir = tempfile::tempdir().unwrap();
        let db = Db::at(dir.path());
        let first = db.write_stream(Kind::Blob, 1, &b"a"[..], git_hash::Kind::Sha1).unwrap();
        let second = db.write_stream(Kind::Blob, 1, &b"a"[..], git_hash::Kind::Sha1).unwrap();
        assert_eq!(first, second);
    }
}
