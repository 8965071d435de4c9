//! Commit/object notes (spec.md §6 `listNotes`/`addNote`/`removeNote`): a flat tree under
//! `refs/notes/commits` keyed by the annotated object's full hex id, grounded in the same
//! tree-expansion machinery [`git_worktree`] uses for checkout.

use bstr::{BString, ByteSlice};
use git_hash::ObjectId;
use git_object::tree::{Entry, EntryMode, Tree};

use super::Repository;
use crate::backend::GitBackend;
use crate::error::{Code, Error};

const NOTES_REF: &str = "refs/notes/commits";

impl<B: GitBackend> Repository<B> {
    /// Every `(annotated object, note blob)` pair currently recorded.
    pub fn list_notes(&self) -> Result<Vec<(ObjectId, ObjectId)>, Error> {
        let Some(tree) = self.notes_tree()? else { return Ok(Vec::new()) };
        tree.entries
            .iter()
            .map(|entry| {
                let hex = entry.filename.to_str().map_err(|e| Error::new("repository.list_notes", Code::Internal, InvalidNoteName(e)))?;
                ObjectId::from_hex(hex.as_bytes())
                    .map(|oid| (oid, entry.oid))
                    .map_err(|e| Error::new("repository.list_notes", Code::Internal, e))
            })
            .collect()
    }

    /// The note blob attached to `object`, if any.
    pub fn note(&self, object: ObjectId) -> Result<Option<ObjectId>, Error> {
        let Some(tree) = self.notes_tree()? else { return Ok(None) };
        let name = BString::from(object.to_hex().to_string());
        Ok(tree.entries.iter().find(|e| e.filename == name).map(|e| e.oid))
    }

    /// Attach `content` as `object`'s note, replacing any existing one, and commit the change.
    pub fn add_note(&self, object: ObjectId, content: &[u8], author: git_actor::Signature, committer: git_actor::Signature) -> Result<ObjectId, Error> {
        let blob = self.write_blob(content)?;
        self.rewrite_notes_tree(object, Some(blob), author, committer)
    }

    /// Remove `object`'s note, if any, and commit the change. A no-op if it had none.
    pub fn remove_note(&self, object: ObjectId, author: git_actor::Signature, committer: git_actor::Signature) -> Result<ObjectId, Error> {
        self.rewrite_notes_tree(object, None, author, committer)
    }

    fn notes_tree(&self) -> Result<Option<Tree>, Error> {
        match self.resolve(bstr::BStr::new(NOTES_REF.as_bytes()))? {
            Some(commit_id) => Ok(Some(self.read_tree(&self.read_commit(&commit_id)?.tree)?)),
            None => Ok(None),
        }
    }

    fn rewrite_notes_tree(
        &self,
        object: ObjectId,
        new_blob: Option<ObjectId>,
        author: git_actor::Signature,
        committer: git_actor::Signature,
    ) -> Result<ObjectId, Error> {
        let name = BString::from(object.to_hex().to_string());
        let parent = self.resolve(bstr::BStr::new(NOTES_REF.as_bytes()))?;
        let mut entries: Vec<Entry> = match &parent {
            Some(commit_id) => self.read_tree(&self.read_commit(commit_id)?.tree)?.entries,
            None => Vec::new(),
        };
        entries.retain(|e| e.filename != name);
        if let Some(oid) = new_blob {
            entries.push(Entry { mode: EntryMode::Blob, filename: name, oid });
        }
        Tree::sort(&mut entries);
        let tree = self.write_tree(&Tree { entries })?;

        let commit = git_object::Commit {
            tree,
            parents: parent.into_iter().collect(),
            author,
            committer,
            extra_headers: Vec::new(),
            message: BString::from("notes update\n"),
        };
        let oid = self.write_commit(&commit)?;
        self.backend
            .write_ref(bstr::BStr::new(NOTES_REF.as_bytes()), oid, git_ref::transaction::PreviousValue::Any, false)
            .map_err(|e| Error::new("repository.add_note", Code::Internal, e))?;
        Ok(oid)
    }
}

/// A notes tree entry's filename wasn't valid hex-id UTF-8.
#[derive(Debug, thiserror::Error)]
#[error("note entry name is not valid UTF-8: {0}")]
struct InvalidNoteName(bstr::Utf8Error);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::memory::Memory;
    use git_date::Time;

    fn signature() -> git_actor::Signature {
        git_actor::Signature { name: "Ann".into(), email: "ann@x".into(), time: Time { seconds_since_epoch: 1, offset_in_minutes: 0 } }
    }

    #[test]
    fn add_then_read_then_remove_a_note() {
        let repo = Repository::new(Memory::new(), git_hash::Kind::Sha1);
        let target = repo.write_blob(b"target\n").unwrap();

        repo.add_note(target, b"looks fine", signature(), signature()).unwrap();
        let note = repo.note(target).unwrap().unwrap();
        assert_eq!(repo.read_blob(&note).unwrap(), b"looks fine");
        assert_eq!(repo.list_notes().unwrap(), vec![(target, note)]);

        repo.remove_note(target, signature(), signature()).unwrap();
        assert_eq!(repo.note(target).unwrap(), None);
    }
}
