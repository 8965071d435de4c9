//! Tree objects: `{mode, name, oid}` entries sorted the way git sorts them (spec.md §3:
//! directories compare as if they had a trailing `/`).

use bstr::{BStr, BString, ByteSlice};
use git_hash::ObjectId;

/// The mode of a tree entry, matching the octal modes git recognises (spec.md §3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde1", derive(serde::Serialize, serde::Deserialize))]
pub enum EntryMode {
    /// `40000`: a sub-tree (directory).
    Tree,
    /// `100644`: a regular, non-executable file.
    Blob,
    /// `100755`: an executable file.
    BlobExecutable,
    /// `120000`: a symbolic link, whose blob content is the link target.
    Link,
    /// `160000`: a submodule, whose oid is the commit checked out in the submodule.
    Commit,
}

impl EntryMode {
    /// The raw octal mode value as git stores it.
    pub const fn value(&self) -> u32 {
        match self {
            EntryMode::Tree => 0o040000,
            EntryMode::Blob => 0o100644,
            EntryMode::BlobExecutable => 0o100755,
            EntryMode::Link => 0o120000,
            EntryMode::Commit => 0o160000,
        }
    }

    /// Parse an octal mode value, as found in tree entries and index entries.
    pub fn from_value(mode: u32) -> Option<Self> {
        Some(match mode {
            0o040000 => EntryMode::Tree,
            0o100644 => EntryMode::Blob,
            0o100755 => EntryMode::BlobExecutable,
            0o120000 => EntryMode::Link,
            0o160000 => EntryMode::Commit,
            _ => return None,
        })
    }

    /// `true` if this mode denotes a sub-tree, i.e. the entry recurses.
    pub fn is_tree(&self) -> bool {
        matches!(self, EntryMode::Tree)
    }

    /// The key git sorts tree entries by: the entry name, with a trailing `/` appended for
    /// directories so e.g. `"foo"` (a file) sorts before `"foo.c"`, which sorts before the
    /// directory `"foo"` would if it existed as `"foo/"`.
    fn sort_suffix(&self) -> &'static [u8] {
        if self.is_tree() {
            b"/"
        } else {
            b""
        }
    }
}

/// A single entry in a [`Tree`].
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde1", derive(serde::Serialize, serde::Deserialize))]
pub struct Entry {
    /// The entry's file mode.
    pub mode: EntryMode,
    /// The entry's name within its parent tree; never contains `/`.
    pub filename: BString,
    /// The oid of the blob, tree, or commit (for submodules) this entry points at.
    pub oid: ObjectId,
}

impl Entry {
    fn sort_key(&self) -> BString {
        let mut key = self.filename.clone();
        key.extend_from_slice(self.mode.sort_suffix());
        key
    }
}

/// A directory listing: an ordered set of [`Entry`] sorted the way git sorts them.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde1", derive(serde::Serialize, serde::Deserialize))]
pub struct Tree {
    /// The entries, kept in git's sort order (see [`Entry::sort_key()`]).
    pub entries: Vec<Entry>,
}

/// Errors decoding a tree object.
pub mod decode {
    /// The error returned by [`super::Tree::from_bytes()`].
    #[derive(Debug, thiserror::Error)]
    pub enum Error {
        /// The entry's mode field wasn't valid octal, or not a recognised mode.
        #[error("invalid or unrecognised mode in tree entry")]
        InvalidMode,
        /// The entry was missing its NUL-separated name, or the trailing oid was truncated.
        #[error("truncated tree entry")]
        Truncated,
    }
}

impl Tree {
    /// Sort `entries` in place according to git's tree entry ordering.
    pub fn sort(entries: &mut [Entry]) {
        entries.sort_by(|a, b| a.sort_key().cmp(&b.sort_key()));
    }

    /// Parse the raw payload of a tree object (the bytes after the `"tree <len>\0"` header),
    /// assuming SHA-1 oids. The tree format itself doesn't encode the oid length, so every real
    /// caller (`git-odb`, which knows the repository's active hash kind) should use
    /// [`Tree::from_bytes_with_hash()`] instead; this exists for ad-hoc/test content.
    pub fn from_bytes(data: &[u8]) -> Result<Self, decode::Error> {
        Self::from_bytes_with_hash(data, git_hash::Kind::Sha1)
    }

    /// Decode oids with an explicitly known length, which is always what `git-odb` uses since
    /// it knows the repository's active hash kind.
    pub fn from_bytes_with_hash(mut data: &[u8], hash_kind: git_hash::Kind) -> Result<Self, decode::Error> {
        let oid_len = hash_kind.len_in_bytes();
        let mut entries = Vec::new();
        while !data.is_empty() {
            let space = data.iter().position(|&b| b == b' ').ok_or(decode::Error::Truncated)?;
            let mode_str = std::str::from_utf8(&data[..space]).map_err(|_| decode::Error::InvalidMode)?;
            let mode_value = u32::from_str_radix(mode_str, 8).map_err(|_| decode::Error::InvalidMode)?;
            let mode = EntryMode::from_value(mode_value).ok_or(decode::Error::InvalidMode)?;
            data = &data[space + 1..];

            let nul = data.iter().position(|&b| b == 0).ok_or(decode::Error::Truncated)?;
            let filename = BString::from(&data[..nul]);
            data = &data[nul + 1..];

            if data.len() < oid_len {
                return Err(decode::Error::Truncated);
            }
            let oid = ObjectId::from_bytes_unchecked(hash_kind, &data[..oid_len]);
            data = &data[oid_len..];

            entries.push(Entry { mode, filename, oid });
        }
        Ok(Tree { entries })
    }

    /// Serialise this tree's entries, in their current order, into `out`.
    ///
    /// Callers that built entries by hand rather than via [`Tree::sort()`] should sort first;
    /// this does not sort implicitly so that already-sorted data round-trips byte-for-byte.
    pub fn write_to(&self, out: &mut Vec<u8>) {
        for entry in &self.entries {
            let mode_str = format!("{:o}", entry.mode.value());
            out.extend_from_slice(mode_str.as_bytes());
            out.push(b' ');
            out.extend_from_slice(&entry.filename);
            out.push(0);
            out.extend_from_slice(entry.oid.as_bytes());
        }
    }

    /// Look up a direct child entry by name.
    pub fn entry(&self, name: &BStr) -> Option<&Entry> {
        self.entries.iter().find(|e| e.filename.as_bstr() == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn oid(byte: u8) -> ObjectId {
        ObjectId::from_bytes_unchecked(git_hash::Kind::Sha1, &[byte; 20])
    }

    #[test]
    fn entries_sort_directories_after_same_prefixed_files() {
        let mut entries = vec![
            Entry {
                mode: EntryMode::Blob,
                filename: "foo.c".into(),
                oid: oid(1),
            },
            Entry {
                mode: EntryMode::Tree,
                filename: "foo".into(),
                oid: oid(2),
            },
            Entry {
                mode: EntryMode::Blob,
                filename: "foo".into(),
                oid: oid(3),
            },
        ];
        Tree::sort(&mut entries);
        let names: Vec<_> = entries.iter().map(|e| (e.filename.to_string(), e.mode)).collect();
        assert_eq!(
            names,
            vec![
                ("foo".into(), EntryMode::Blob),
                ("foo.c".into(), EntryMode::Blob),
                ("foo".into(), EntryMode::Tree),
            ]
        );
    }

    #[test]
    fn roundtrips_through_bytes() {
        let tree = Tree {
            entries: vec![
                Entry {
                    mode: EntryMode::Blob,
                    filename: "a.txt".into(),
                    oid: oid(7),
                },
                Entry {
                    mode: EntryMode::Tree,
                    filename: "sub".into(),
                    oid: oid(9),
                },
            ],
        };
        let mut bytes = Vec::new();
        tree.write_to(&mut bytes);
        let decoded = Tree::from_bytes_with_hash(&bytes, git_hash::Kind::Sha1).unwrap();
        assert_eq!(decoded, tree);
    }
}
