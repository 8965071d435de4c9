//! An in-memory [`WorktreeBackend`], the primary fixture for this crate's own tests and a
//! pluggable production backend for embedders with no real filesystem (spec.md §1's worktree
//! backend is deliberately byte-oriented rather than `std::fs`-shaped for exactly this reason).

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::convert::Infallible;

use bstr::{BStr, BString, ByteSlice};
use git_object::tree::EntryMode;

use super::{Metadata, WorktreeBackend};

#[derive(Clone)]
struct File {
    mode: EntryMode,
    content: Vec<u8>,
    mtime_secs: u64,
}

/// A working tree held entirely in memory, keyed by `/`-separated path.
#[derive(Default)]
pub struct Memory {
    files: RefCell<BTreeMap<BString, File>>,
    clock: RefCell<u64>,
}

impl Memory {
    /// An empty working tree.
    pub fn new() -> Self {
        Self::default()
    }

    fn tick(&self) -> u64 {
        let mut clock = self.clock.borrow_mut();
        *clock += 1;
        *clock
    }

    fn is_dir_prefix(&self, path: &BStr) -> bool {
        if path.is_empty() {
            return !self.files.borrow().is_empty();
        }
        let prefix = git_path::join(path, BStr::new(b""));
        let prefix_bytes: &[u8] = &prefix;
        self.files.borrow().keys().any(|p| {
            let p_bytes: &[u8] = p;
            p_bytes.starts_with(prefix_bytes)
        })
    }
}

impl WorktreeBackend for Memory {
    type Error = Infallible;

    fn metadata(&self, path: &BStr) -> Result<Option<Metadata>, Self::Error> {
        if let Some(file) = self.files.borrow().get(path.as_bstr()) {
            return Ok(Some(Metadata {
                is_dir: false,
                size: file.content.len() as u64,
                mtime_secs: file.mtime_secs,
                mode: file.mode,
            }));
        }
        Ok(self.is_dir_prefix(path).then(|| Metadata {
            is_dir: true,
            size: 0,
            mtime_secs: 0,
            mode: EntryMode::Tree,
        }))
    }

    fn read_file(&self, path: &BStr) -> Result<Vec<u8>, Self::Error> {
        Ok(self.files.borrow().get(path.as_bstr()).map(|f| f.content.clone()).unwrap_or_default())
    }

    fn write_file(&self, path: &BStr, mode: EntryMode, content: &[u8]) -> Result<(), Self::Error> {
        let mtime_secs = self.tick();
        self.files.borrow_mut().insert(
            path.to_owned(),
            File {
                mode,
                content: content.to_vec(),
                mtime_secs,
            },
        );
        Ok(())
    }

    fn remove_file(&self, path: &BStr) -> Result<(), Self::Error> {
        self.files.borrow_mut().remove(path.as_bstr());
        Ok(())
    }

    fn create_dir_all(&self, _path: &BStr) -> Result<(), Self::Error> {
        // Directories are implicit: any file whose path has `path` as a prefix makes it exist.
        Ok(())
    }

    fn remove_dir_if_empty(&self, _path: &BStr) -> Result<(), Self::Error> {
        Ok(())
    }

    fn list_dir(&self, path: &BStr) -> Result<Vec<BString>, Self::Error> {
        let prefix = if path.is_empty() {
            BString::from("")
        } else {
            git_path::join(path, BStr::new(b""))
        };
        let prefix_bytes: &[u8] = &prefix;
        let mut children = std::collections::BTreeSet::new();
        for file_path in self.files.borrow().keys() {
            let file_bytes: &[u8] = file_path;
            if let Some(rest) = file_bytes.strip_prefix(prefix_bytes) {
                let rest = rest.as_bstr();
                let name = match rest.find_byte(b'/') {
                    Some(pos) => &rest[..pos],
                    None => rest,
                };
                children.insert(if path.is_empty() {
                    BString::from(name)
                } else {
                    git_path::join(path, name.as_bstr())
                });
            }
        }
        Ok(children.into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn write_then_read_round_trips() {
        let backend = Memory::new();
        backend.write_file(BStr::new(b"a/b.txt"), EntryMode::Blob, b"hi").unwrap();
        assert_eq!(backend.read_file(BStr::new(b"a/b.txt")).unwrap(), b"hi");
        assert!(backend.metadata(BStr::new(b"a")).unwrap().unwrap().is_dir);
    }

    #[test]
    fn list_dir_groups_by_immediate_child() {
        let backend = Memory::new();
        backend.write_file(BStr::new(b"a/b/c.txt"), EntryMode::Blob, b"1").unwrap();
        backend.write_file(BStr::new(b"a/d.txt"), EntryMode::Blob, b"2").unwrap();
        let mut children = backend.list_dir(BStr::new(b"a")).unwrap();
        children.sort();
        assert_eq!(children, vec![BString::from("a/b"), BString::from("a/d.txt")]);
    }

    #[test]
    fn missing_path_has_no_metadata() {
        let backend = Memory::new();
        assert!(backend.metadata(BStr::new(b"nope")).unwrap().is_none());
    }
}
