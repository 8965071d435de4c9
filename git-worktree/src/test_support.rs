//! A fully in-memory [`Store`] shared by this crate's own tests: trees, blobs, commits and tags
//! held in `BTreeMap`s, with [`Store::write_blob`] hashing content the way `git-odb`'s loose
//! object writer does.

use std::cell::RefCell;
use std::collections::BTreeMap;

use git_hash::ObjectId;
use git_object::tree::Tree;
use git_object::{Commit, Tag};

use crate::store::Store;

#[derive(Debug, thiserror::Error)]
#[error("object not found in test fixture")]
pub(crate) struct NotFound;

#[derive(Default)]
pub(crate) struct MemoryStore {
    pub(crate) trees: RefCell<BTreeMap<ObjectId, Tree>>,
    pub(crate) blobs: RefCell<BTreeMap<ObjectId, Vec<u8>>>,
    pub(crate) commits: RefCell<BTreeMap<ObjectId, Commit>>,
    pub(crate) tags: RefCell<BTreeMap<ObjectId, Tag>>,
}

impl MemoryStore {
    pub(crate) fn put_blob(&self, content: &[u8]) -> ObjectId {
        let oid = git_object::hash(git_hash::Kind::Sha1, git_object::Kind::Blob, content);
        self.blobs.borrow_mut().insert(oid, content.to_vec());
        oid
    }

    pub(crate) fn put_tree(&self, entries: Vec<git_object::tree::Entry>) -> ObjectId {
        let tree = Tree { entries };
        let oid = oid(self.trees.borrow().len() as u8 + 0x10);
        self.trees.borrow_mut().insert(oid, tree);
        oid
    }

    pub(crate) fn put_commit(&self, tree: ObjectId, parents: &[ObjectId], seconds: u64) -> ObjectId {
        let signature = git_actor::Signature {
            name: "tester".into(),
            email: "tester@example.com".into(),
            time: git_date::Time {
                seconds_since_epoch: seconds,
                offset_in_minutes: 0,
            },
        };
        let commit = Commit {
            tree,
            parents: parents.to_vec(),
            author: signature.clone(),
            committer: signature,
            extra_headers: Vec::new(),
            message: "test".into(),
        };
        let oid = oid(self.commits.borrow().len() as u8 + 0x60);
        self.commits.borrow_mut().insert(oid, commit);
        oid
    }
}

impl git_diff::TreeFind for MemoryStore {
    type Error = NotFound;

    fn find_tree(&self, id: &ObjectId) -> Result<Tree, Self::Error> {
        self.trees.borrow().get(id).cloned().ok_or(NotFound)
    }

    fn find_blob(&self, id: &ObjectId) -> Result<Vec<u8>, Self::Error> {
        self.blobs.borrow().get(id).cloned().ok_or(NotFound)
    }
}

impl git_revision::CommitGraph for MemoryStore {
    type Error = NotFound;

    fn find_commit(&self, id: &ObjectId) -> Result<Option<Commit>, Self::Error> {
        Ok(self.commits.borrow().get(id).cloned())
    }

    fn find_tag(&self, id: &ObjectId) -> Result<Option<Tag>, Self::Error> {
        Ok(self.tags.borrow().get(id).cloned())
    }
}

impl Store for MemoryStore {
    type Error = NotFound;

    fn write_blob(&self, data: &[u8]) -> Result<ObjectId, Self::Error> {
        Ok(self.put_blob(data))
    }
}

pub(crate) fn oid(byte: u8) -> ObjectId {
    ObjectId::from_bytes_unchecked(git_hash::Kind::Sha1, &[byte; 20])
}

pub(crate) fn blob_entry(name: &str, oid: ObjectId) -> git_object::tree::Entry {
    git_object::tree::Entry {
        mode: git_object::tree::EntryMode::Blob,
        filename: name.into(),
        oid,
    }
}
