//! A [`GitBackend`] held entirely in memory: the primary fixture for this crate's own tests, and
//! usable as a production backend by embedders with no real filesystem, mirroring
//! `git-worktree`'s own split between a filesystem and an in-memory implementation.

use std::cell::{Cell, RefCell};
use std::collections::BTreeMap;
use std::path::Path;

use bstr::{BString, ByteSlice};
use git_hash::ObjectId;
use git_ref::transaction::{PreviousValue, Target};

use super::{GitBackend, InitOptions, WorktreeGitdir};

const SHORT_NAME_PREFIXES: &[&str] = &["refs/", "refs/tags/", "refs/heads/", "refs/remotes/"];
const MAX_RESOLUTION_DEPTH: u8 = 5;

/// The error returned by a [`Memory`] ref write whose compare-and-swap precondition failed,
/// mirroring [`git_ref::store::Error`]'s two write-precondition variants.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// [`PreviousValue::MustNotExist`] failed: the reference already exists.
    #[error("reference {name} already exists")]
    AlreadyExists {
        #[allow(missing_docs)]
        name: BString,
    },
    /// [`PreviousValue::MustExistAndMatch`] failed: the reference's current value differs.
    #[error("reference {name} did not have the expected value")]
    ReferenceOutOfDate {
        #[allow(missing_docs)]
        name: BString,
    },
}

/// A repository held entirely in process memory.
#[derive(Default)]
pub struct Memory {
    initialized: RefCell<bool>,
    objects: RefCell<BTreeMap<ObjectId, (git_object::Kind, Vec<u8>)>>,
    refs: RefCell<BTreeMap<BString, Target>>,
    packed: RefCell<BTreeMap<BString, ObjectId>>,
    head: RefCell<Vec<u8>>,
    config: RefCell<git_config::File>,
    index: RefCell<Option<git_index::State>>,
    index_version: Cell<u64>,
    worktrees: RefCell<BTreeMap<String, Vec<u8>>>,
}

impl Memory {
    /// An empty, uninitialized repository.
    pub fn new() -> Self {
        Self::default()
    }

    fn resolve(&self, name: &str, depth: u8) -> Option<ObjectId> {
        match self.refs.borrow().get(name.as_bytes().as_bstr())? {
            Target::Peeled(id) => Some(*id),
            Target::Symbolic(next) => {
                if depth == 0 {
                    return None;
                }
                self.resolve(&next.to_string(), depth - 1)
            }
        }
    }

    fn candidates(input: &str) -> Vec<String> {
        let mut out = vec![input.to_owned()];
        if !input.starts_with("refs/") {
            for prefix in SHORT_NAME_PREFIXES {
                out.push(format!("{prefix}{input}"));
            }
            out.push(format!("refs/remotes/{input}/HEAD"));
        }
        out
    }

    fn check_precondition(&self, name: &bstr::BStr, expected: &PreviousValue) -> Result<(), Error> {
        let current = self.refs.borrow().get(name).cloned();
        match expected {
            PreviousValue::Any => Ok(()),
            PreviousValue::MustNotExist => {
                if current.is_some() {
                    Err(Error::AlreadyExists { name: name.to_owned() })
                } else {
                    Ok(())
                }
            }
            PreviousValue::MustExistAndMatch(want) => {
                if current.as_ref() == Some(want) {
                    Ok(())
                } else {
                    Err(Error::ReferenceOutOfDate { name: name.to_owned() })
                }
            }
        }
    }
}

impl GitBackend for Memory {
    type Error = Error;

    fn initialize(&self, _options: &InitOptions) -> Result<(), Error> {
        *self.initialized.borrow_mut() = true;
        *self.head.borrow_mut() = b"ref: refs/heads/main\n".to_vec();
        Ok(())
    }

    fn is_initialized(&self) -> bool {
        *self.initialized.borrow()
    }

    fn read_object(&self, id: &ObjectId) -> Result<Option<(git_object::Kind, Vec<u8>)>, Error> {
        Ok(self.objects.borrow().get(id).cloned())
    }

    fn write_object(&self, kind: git_object::Kind, data: &[u8]) -> Result<ObjectId, Error> {
        let id = git_hash::hash(kind, data);
        self.objects.borrow_mut().entry(id).or_insert_with(|| (kind, data.to_vec()));
        Ok(id)
    }

    fn has_object(&self, id: &ObjectId) -> Result<bool, Error> {
        Ok(self.objects.borrow().contains_key(id))
    }

    fn read_ref(&self, name: &bstr::BStr) -> Result<Option<ObjectId>, Error> {
        let name = name.to_string();
        if let Ok(id) = ObjectId::from_hex(name.as_bytes()) {
            return Ok(Some(id));
        }
        for candidate in Self::candidates(&name) {
            if let Some(id) = self.resolve(&candidate, MAX_RESOLUTION_DEPTH) {
                return Ok(Some(id));
            }
        }
        Ok(None)
    }

    fn expand_ref(&self, name: &bstr::BStr) -> Result<Option<BString>, Error> {
        let name = name.to_string();
        for candidate in Self::candidates(&name) {
            if self.refs.borrow().contains_key(candidate.as_bytes().as_bstr()) {
                return Ok(Some(BString::from(candidate)));
            }
        }
        Ok(None)
    }

    fn write_ref(&self, name: &bstr::BStr, new: ObjectId, expected: PreviousValue, _skip_reflog: bool) -> Result<(), Error> {
        self.check_precondition(name, &expected)?;
        self.refs.borrow_mut().insert(name.to_owned(), Target::Peeled(new));
        Ok(())
    }

    fn write_symbolic_ref(&self, name: &bstr::BStr, target: &bstr::BStr, expected: PreviousValue) -> Result<(), Error> {
        self.check_precondition(name, &expected)?;
        self.refs
            .borrow_mut()
            .insert(name.to_owned(), Target::Symbolic(git_ref::FullName::new_unchecked(target.to_owned())));
        Ok(())
    }

    fn read_symbolic_ref(&self, name: &bstr::BStr) -> Result<Option<Target>, Error> {
        Ok(self.refs.borrow().get(name).cloned())
    }

    fn delete_ref(&self, name: &bstr::BStr) -> Result<(), Error> {
        self.refs.borrow_mut().remove(name);
        Ok(())
    }

    fn list_refs(&self, prefix: &str) -> Result<Vec<BString>, Error> {
        Ok(self
            .refs
            .borrow()
            .keys()
            .filter(|name| name.to_string().starts_with(prefix))
            .cloned()
            .collect())
    }

    fn read_config(&self) -> Result<git_config::cascade::Cascade, Error> {
        Ok(git_config::cascade::Cascade {
            sources: vec![git_config::cascade::Source {
                scope: git_sec::Scope::Local,
                path: std::path::PathBuf::new(),
                file: Some(self.config.borrow().clone()),
                trust: git_sec::Trust::Full,
            }],
        })
    }

    fn write_config(
        &self,
        _scope: git_sec::Scope,
        section: &str,
        subsection: Option<&str>,
        key: &str,
        value: &str,
    ) -> Result<(), Error> {
        self.config.borrow_mut().set_raw_value(section, subsection, key, value);
        Ok(())
    }

    fn remove_config_section(&self, section: &str, subsection: Option<&str>) -> Result<(), Error> {
        self.config.borrow_mut().remove_section(section, subsection);
        Ok(())
    }

    fn read_index(&self) -> Result<Option<git_index::State>, Error> {
        Ok(self.index.borrow().clone())
    }

    fn write_index(&self, index: &git_index::State) -> Result<(), Error> {
        *self.index.borrow_mut() = Some(index.clone());
        self.index_version.set(self.index_version.get() + 1);
        Ok(())
    }

    fn has_index(&self) -> Result<bool, Error> {
        Ok(self.index.borrow().is_some())
    }

    /// No real mtime exists for an in-memory file; `index_version` (bumped on every
    /// `write_index`) stands in for it.
    fn index_fingerprint(&self) -> Result<Option<super::IndexFingerprint>, Error> {
        Ok(self.index.borrow().is_some().then(|| super::IndexFingerprint {
            mtime_secs: self.index_version.get() as i64,
            mtime_nanos: 0,
            len: 0,
        }))
    }

    fn write_head(&self, content: &bstr::BStr) -> Result<(), Error> {
        *self.head.borrow_mut() = content.as_bytes().to_vec();
        Ok(())
    }

    fn create_worktree_gitdir(&self, name: &str) -> Result<WorktreeGitdir, Error> {
        self.worktrees.borrow_mut().entry(name.to_owned()).or_default();
        Ok(WorktreeGitdir { path: std::path::PathBuf::from(format!("worktrees/{name}")), name: name.to_owned() })
    }

    fn write_worktree_head(&self, worktree: &WorktreeGitdir, content: &bstr::BStr) -> Result<(), Error> {
        self.worktrees.borrow_mut().insert(worktree.name.clone(), content.as_bytes().to_vec());
        Ok(())
    }

    fn read_packed_refs(&self) -> Result<BTreeMap<BString, ObjectId>, Error> {
        Ok(self.packed.borrow().clone())
    }

    fn write_packed_refs(&self, refs: &BTreeMap<BString, ObjectId>) -> Result<(), Error> {
        *self.packed.borrow_mut() = refs.clone();
        Ok(())
    }

    fn file_system_root(&self) -> Option<&Path> {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bstr::BStr;

    #[test]
    fn write_then_read_object_round_trips() {
        let backend = Memory::new();
        let id = backend.write_object(git_object::Kind::Blob, b"hi").unwrap();
        assert_eq!(backend.read_object(&id).unwrap(), Some((git_object::Kind::Blob, b"hi".to_vec())));
    }

    #[test]
    fn short_branch_name_resolves_via_refs_heads() {
        let backend = Memory::new();
        let id = backend.write_object(git_object::Kind::Blob, b"c").unwrap();
        backend
            .write_ref(BStr::new(b"refs/heads/main"), id, PreviousValue::Any, true)
            .unwrap();
        assert_eq!(backend.read_ref(BStr::new(b"main")).unwrap(), Some(id));
    }

    #[test]
    fn head_follows_a_symbolic_target() {
        let backend = Memory::new();
        let id = backend.write_object(git_object::Kind::Blob, b"c").unwrap();
        backend
            .write_ref(BStr::new(b"refs/heads/main"), id, PreviousValue::Any, true)
            .unwrap();
        backend
            .write_symbolic_ref(BStr::new(b"HEAD"), BStr::new(b"refs/heads/main"), PreviousValue::Any)
            .unwrap();
        assert_eq!(backend.read_ref(BStr::new(b"HEAD")).unwrap(), Some(id));
    }

    #[test]
    fn must_not_exist_precondition_is_rejected_on_second_write() {
        let backend = Memory::new();
        let id = backend.write_object(git_object::Kind::Blob, b"c").unwrap();
        backend
            .write_ref(BStr::new(b"refs/heads/main"), id, PreviousValue::MustNotExist, true)
            .unwrap();
        assert!(matches!(
            backend.write_ref(BStr::new(b"refs/heads/main"), id, PreviousValue::MustNotExist, true),
            Err(Error::AlreadyExists { .. })
        ));
    }
}
