//! Branch and tag porcelain (spec.md §6 `branch`/`currentBranch`/`listBranches`/`renameBranch`/
//! `deleteBranch`/`tag`/`listTags`/`listRefs`/`expandRef`/`resolveRef`).

use bstr::{BStr, BString, ByteSlice};
use git_hash::ObjectId;
use git_ref::transaction::PreviousValue;

use super::Repository;
use crate::backend::GitBackend;
use crate::error::{Code, Error};

impl<B: GitBackend> Repository<B> {
    /// Point branch `name` (short, e.g. `"main"`) at `target`, refusing to overwrite an existing
    /// branch (spec.md §7 `AlreadyExistsError`).
    pub fn create_branch(&self, name: &str, target: ObjectId) -> Result<(), Error> {
        let full = self.validated_branch_ref(name)?;
        self.backend
            .write_ref(full.as_bstr(), target, PreviousValue::MustNotExist, false)
            .map_err(|e| Error::new("repository.create_branch", Code::AlreadyExists, e))
    }

    /// Delete branch `name`. A no-op if it doesn't exist.
    pub fn delete_branch(&self, name: &str) -> Result<(), Error> {
        let full = self.validated_branch_ref(name)?;
        self.backend
            .delete_ref(full.as_bstr())
            .map_err(|e| Error::new("repository.delete_branch", Code::Internal, e))
    }

    /// Rename branch `old` to `new`, preserving its current target.
    pub fn rename_branch(&self, old: &str, new: &str) -> Result<(), Error> {
        let old_full = self.validated_branch_ref(old)?;
        let new_full = self.validated_branch_ref(new)?;
        let target = self
            .backend
            .read_ref(old_full.as_bstr())
            .map_err(|e| Error::new("repository.rename_branch", Code::Internal, e))?
            .ok_or_else(|| Error::new("repository.rename_branch", Code::NotFound, crate::error::NotFound::Ref { name: old_full }))?;
        self.backend
            .write_ref(new_full.as_bstr(), target, PreviousValue::MustNotExist, false)
            .map_err(|e| Error::new("repository.rename_branch", Code::AlreadyExists, e))?;
        self.backend
            .delete_ref(old_full.as_bstr())
            .map_err(|e| Error::new("repository.rename_branch", Code::Internal, e))
    }

    /// Every local branch's short name, sorted.
    pub fn list_branches(&self) -> Result<Vec<BString>, Error> {
        let prefix = "refs/heads/";
        let mut names: Vec<BString> = self
            .backend
            .list_refs(prefix)
            .map_err(|e| Error::new("repository.list_branches", Code::Internal, e))?
            .into_iter()
            .map(|full| full[prefix.len()..].into())
            .collect();
        names.sort();
        Ok(names)
    }

    /// Create a lightweight tag (a peeled ref under `refs/tags/`) at `target`.
    pub fn create_tag(&self, name: &str, target: ObjectId) -> Result<(), Error> {
        let full = self.validated_tag_ref(name)?;
        self.backend
            .write_ref(full.as_bstr(), target, PreviousValue::MustNotExist, true)
            .map_err(|e| Error::new("repository.create_tag", Code::AlreadyExists, e))
    }

    /// Every tag's short name, sorted.
    pub fn list_tags(&self) -> Result<Vec<BString>, Error> {
        let prefix = "refs/tags/";
        let mut names: Vec<BString> = self
            .backend
            .list_refs(prefix)
            .map_err(|e| Error::new("repository.list_tags", Code::Internal, e))?
            .into_iter()
            .map(|full| full[prefix.len()..].into())
            .collect();
        names.sort();
        Ok(names)
    }

    /// Every ref starting with `prefix` (e.g. `"refs/heads/"`), loose or packed.
    pub fn list_refs(&self, prefix: &str) -> Result<Vec<BString>, Error> {
        self.backend.list_refs(prefix).map_err(|e| Error::new("repository.list_refs", Code::Internal, e))
    }

    /// The fully-qualified ref name `short` would resolve to, without following it further.
    pub fn expand_ref(&self, short: &BStr) -> Result<Option<BString>, Error> {
        self.backend.expand_ref(short).map_err(|e| Error::new("repository.expand_ref", Code::Internal, e))
    }

    /// `resolve()` under spec.md §6's `resolveRef` name.
    pub fn resolve_ref(&self, name: &BStr) -> Result<Option<ObjectId>, Error> {
        self.resolve(name)
    }

    fn validated_branch_ref(&self, name: &str) -> Result<BString, Error> {
        git_validate::reference::name_partial(name.as_bytes().as_bstr())
            .map_err(|e| Error::new("repository.branch", Code::InvalidRefName, e))?;
        Ok(BString::from(format!("refs/heads/{name}")))
    }

    fn validated_tag_ref(&self, name: &str) -> Result<BString, Error> {
        git_validate::tag::name(name.as_bytes().as_bstr()).map_err(|e| Error::new("repository.tag", Code::InvalidRefName, e))?;
        Ok(BString::from(format!("refs/tags/{name}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::memory::Memory;

    #[test]
    fn create_then_list_branch() {
        let repo = Repository::new(Memory::new(), git_hash::Kind::Sha1);
        let id = repo.write_blob(b"c").unwrap();
        repo.create_branch("main", id).unwrap();
        assert_eq!(repo.list_branches().unwrap(), vec![BString::from("main")]);
    }

    #[test]
    fn creating_an_existing_branch_fails() {
        let repo = Repository::new(Memory::new(), git_hash::Kind::Sha1);
        let id = repo.write_blob(b"c").unwrap();
        repo.create_branch("main", id).unwrap();
        assert_eq!(repo.create_branch("main", id).unwrap_err().code, Code::AlreadyExists);
    }

    #[test]
    fn rename_branch_preserves_target() {
        let repo = Repository::new(Memory::new(), git_hash::Kind::Sha1);
        let id = repo.write_blob(b"c").unwrap();
        repo.create_branch("old", id).unwrap();
        repo.rename_branch("old", "new").unwrap();
        assert_eq!(repo.list_branches().unwrap(), vec![BString::from("new")]);
        assert_eq!(repo.resolve(BStr::new(b"new")).unwrap(), Some(id));
    }
}
