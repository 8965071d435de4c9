//! Typed object read/write (spec.md §6: `readObject`/`readBlob`/`readCommit`/`readTree`/
//! `readTag`, `writeObject`/`writeBlob`/`writeCommit`/`writeTree`/`writeTag`).

use git_hash::ObjectId;
use git_object::{Commit, Kind, Tag, Tree};

use super::Repository;
use crate::backend::GitBackend;
use crate::error::{Code, Error};

/// An object existed but wasn't the kind the caller asked for.
#[derive(Debug, thiserror::Error)]
#[error("object {id} is a {actual:?}, not a {expected:?}")]
pub struct WrongKind {
    #[allow(missing_docs)]
    pub id: ObjectId,
    #[allow(missing_docs)]
    pub expected: Kind,
    #[allow(missing_docs)]
    pub actual: Kind,
}

impl<B: GitBackend> Repository<B> {
    /// Read `id`'s kind and raw bytes, without decoding.
    pub fn read_object(&self, id: &ObjectId) -> Result<(Kind, Vec<u8>), Error> {
        self.backend
            .read_object(id)
            .map_err(|e| Error::new("repository.read_object", Code::Internal, e))?
            .ok_or_else(|| Error::new("repository.read_object", Code::NotFound, crate::error::NotFound::Object { oid: *id }))
    }

    /// Read and decode the blob at `id`.
    pub fn read_blob(&self, id: &ObjectId) -> Result<Vec<u8>, Error> {
        let (kind, data) = self.read_object(id)?;
        self.expect_kind(*id, kind, Kind::Blob)?;
        Ok(data)
    }

    /// Read and decode the tree at `id`.
    pub fn read_tree(&self, id: &ObjectId) -> Result<Tree, Error> {
        let (kind, data) = self.read_object(id)?;
        self.expect_kind(*id, kind, Kind::Tree)?;
        Tree::from_bytes_with_hash(&data, id.kind()).map_err(|e| Error::new("repository.read_tree", Code::Internal, e))
    }

    /// Read and decode the commit at `id`.
    pub fn read_commit(&self, id: &ObjectId) -> Result<Commit, Error> {
        let (kind, data) = self.read_object(id)?;
        self.expect_kind(*id, kind, Kind::Commit)?;
        Commit::from_bytes(&data).map_err(|e| Error::new("repository.read_commit", Code::Internal, e))
    }

    /// Read and decode the tag at `id`.
    pub fn read_tag(&self, id: &ObjectId) -> Result<Tag, Error> {
        let (kind, data) = self.read_object(id)?;
        self.expect_kind(*id, kind, Kind::Tag)?;
        Tag::from_bytes(&data).map_err(|e| Error::new("repository.read_tag", Code::Internal, e))
    }

    fn expect_kind(&self, id: ObjectId, actual: Kind, expected: Kind) -> Result<(), Error> {
        if actual == expected {
            Ok(())
        } else {
            Err(Error::new("repository.read_object", Code::ObjectType, WrongKind { id, expected, actual }))
        }
    }

    /// Hash and store an already-serialised object of the given kind.
    pub fn write_object(&self, kind: Kind, data: &[u8]) -> Result<ObjectId, Error> {
        self.backend.write_object(kind, data).map_err(|e| Error::new("repository.write_object", Code::Internal, e))
    }

    /// Store a blob's raw bytes.
    pub fn write_blob(&self, data: &[u8]) -> Result<ObjectId, Error> {
        self.write_object(Kind::Blob, data)
    }

    /// Store a tree, whose entries must already be sorted ([`Tree::sort`]).
    pub fn write_tree(&self, tree: &Tree) -> Result<ObjectId, Error> {
        let mut bytes = Vec::new();
        tree.write_to(&mut bytes);
        self.write_object(Kind::Tree, &bytes)
    }

    /// Store a commit.
    pub fn write_commit(&self, commit: &Commit) -> Result<ObjectId, Error> {
        let mut bytes = Vec::new();
        commit.write_to(&mut bytes);
        self.write_object(Kind::Commit, &bytes)
    }

    /// Store an annotated tag.
    pub fn write_tag(&self, tag: &Tag) -> Result<ObjectId, Error> {
        let mut bytes = Vec::new();
        tag.write_to(&mut bytes);
        self.write_object(Kind::Tag, &bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::memory::Memory;

    #[test]
    fn blob_round_trips() {
        let repo = Repository::new(Memory::new(), git_hash::Kind::Sha1);
        let id = repo.write_blob(b"hello\n").unwrap();
        assert_eq!(repo.read_blob(&id).unwrap(), b"hello\n");
    }

    #[test]
    fn reading_a_blob_as_a_tree_is_an_object_type_error() {
        let repo = Repository::new(Memory::new(), git_hash::Kind::Sha1);
        let id = repo.write_blob(b"hello\n").unwrap();
        assert_eq!(repo.read_tree(&id).unwrap_err().code, Code::ObjectType);
    }
}
