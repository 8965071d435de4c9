//! A thin adapter turning a [`GitBackend`]'s raw `(kind, bytes)` object access into the typed
//! capabilities [`git_diff`], [`git_revision`] and [`git_worktree`] each ask of their caller, so
//! [`crate::Repository`] can hand the very same backend to all three without re-decoding objects
//! itself at every call site.

use git_hash::ObjectId;
use git_object::{tree, Kind, Tree};

use crate::backend::GitBackend;

/// The error produced by any [`ObjectAccess`] lookup: either the backend failed, the object
/// wasn't there, or it decoded to the wrong shape for what was asked.
#[derive(Debug, thiserror::Error)]
pub enum Error<E> {
    #[allow(missing_docs)]
    #[error(transparent)]
    Backend(E),
    /// No object exists at this id.
    #[error("object {id} not found")]
    Missing {
        #[allow(missing_docs)]
        id: ObjectId,
    },
    /// The object existed but wasn't the kind the caller asked for.
    #[error("object {id} is a {actual:?}, not a {expected:?}")]
    WrongKind {
        #[allow(missing_docs)]
        id: ObjectId,
        #[allow(missing_docs)]
        expected: Kind,
        #[allow(missing_docs)]
        actual: Kind,
    },
    #[allow(missing_docs)]
    #[error(transparent)]
    Tree(#[from] tree::decode::Error),
    #[allow(missing_docs)]
    #[error(transparent)]
    Commit(#[from] git_object::commit::decode::Error),
    #[allow(missing_docs)]
    #[error(transparent)]
    Tag(#[from] git_object::tag::decode::Error),
}

/// Borrows a [`GitBackend`] and exposes it as [`git_diff::TreeFind`], [`git_revision::graph::CommitGraph`]
/// and [`git_worktree::Store`] all at once; every porcelain operation that needs to walk trees,
/// walk history, or drive a checkout/merge goes through one of these instead of talking to the
/// backend's raw bytes directly.
pub struct ObjectAccess<'a, B>(pub &'a B);

impl<'a, B: GitBackend> ObjectAccess<'a, B> {
    fn require(&self, id: &ObjectId, expected: Kind) -> Result<Vec<u8>, Error<B::Error>> {
        let (actual, data) = self.0.read_object(id).map_err(Error::Backend)?.ok_or(Error::Missing { id: *id })?;
        if actual != expected {
            return Err(Error::WrongKind { id: *id, expected, actual });
        }
        Ok(data)
    }
}

impl<'a, B: GitBackend> git_diff::TreeFind for ObjectAccess<'a, B> {
    type Error = Error<B::Error>;

    fn find_tree(&self, id: &ObjectId) -> Result<Tree, Self::Error> {
        Ok(Tree::from_bytes_with_hash(&self.require(id, Kind::Tree)?, id.kind())?)
    }

    fn find_blob(&self, id: &ObjectId) -> Result<Vec<u8>, Self::Error> {
        self.require(id, Kind::Blob)
    }
}

impl<'a, B: GitBackend> git_revision::graph::CommitGraph for ObjectAccess<'a, B> {
    type Error = Error<B::Error>;

    fn find_commit(&self, id: &ObjectId) -> Result<Option<git_object::Commit>, Self::Error> {
        match self.0.read_object(id).map_err(Error::Backend)? {
            Some((Kind::Commit, data)) => Ok(Some(git_object::Commit::from_bytes(&data)?)),
            _ => Ok(None),
        }
    }

    fn find_tag(&self, id: &ObjectId) -> Result<Option<git_object::Tag>, Self::Error> {
        match self.0.read_object(id).map_err(Error::Backend)? {
            Some((Kind::Tag, data)) => Ok(Some(git_object::Tag::from_bytes(&data)?)),
            _ => Ok(None),
        }
    }
}

impl<'a, B: GitBackend> git_worktree::Store for ObjectAccess<'a, B> {
    type Error = Error<B::Error>;

    fn write_blob(&self, data: &[u8]) -> Result<ObjectId, Self::Error> {
        self.0.write_object(Kind::Blob, data).map_err(Error::Backend)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::memory::Memory;
    use git_diff::TreeFind;
    use git_object::tree::{Entry, EntryMode};

    #[test]
    fn find_tree_decodes_a_stored_tree() {
        let backend = Memory::new();
        let blob = backend.write_object(Kind::Blob, b"hi").unwrap();
        let tree = Tree {
            entries: vec![Entry { mode: EntryMode::Blob, filename: "a.txt".into(), oid: blob }],
        };
        let mut bytes = Vec::new();
        tree.write_to(&mut bytes);
        let tree_id = backend.write_object(Kind::Tree, &bytes).unwrap();

        let access = ObjectAccess(&backend);
        assert_eq!(access.find_tree(&tree_id).unwrap(), tree);
    }

    #[test]
    fn missing_object_is_reported() {
        let backend = Memory::new();
        let access = ObjectAccess(&backend);
        let bogus = ObjectId::null(git_hash::Kind::Sha1);
        assert!(matches!(access.find_tree(&bogus), Err(Error::Missing { .. })));
    }
}
