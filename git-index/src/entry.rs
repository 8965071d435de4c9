//! A single staged path and its cached filesystem/object metadata (spec.md §3 "Index entry").

use bstr::BString;
use git_hash::ObjectId;
use git_object::tree::EntryMode;

/// Which merge slot an entry occupies. `Clean` is the common case; `Base`/`Ours`/`Theirs` only
/// appear on paths left unmerged by a conflicted three-way merge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Stage {
    /// The path is not part of an in-progress merge.
    Clean,
    /// The common-ancestor version of an unmerged path.
    Base,
    /// "Our" side of an unmerged path.
    Ours,
    /// "Their" side of an unmerged path.
    Theirs,
}

impl Stage {
    pub(crate) fn from_bits(bits: u16) -> Self {
        match bits {
            0 => Stage::Clean,
            1 => Stage::Base,
            2 => Stage::Ours,
            3 => Stage::Theirs,
            _ => unreachable!("stage is always masked to its 2 bits before this is called"),
        }
    }

    pub(crate) fn to_bits(self) -> u16 {
        match self {
            Stage::Clean => 0,
            Stage::Base => 1,
            Stage::Ours => 2,
            Stage::Theirs => 3,
        }
    }

    /// `true` for anything other than [`Stage::Clean`].
    pub fn is_unmerged(&self) -> bool {
        !matches!(self, Stage::Clean)
    }
}

/// A point in time with second and nanosecond resolution, as `lstat` reports it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Time {
    /// Seconds since the Unix epoch.
    pub secs: u32,
    /// The sub-second remainder, in nanoseconds.
    pub nsecs: u32,
}

/// One staged path: the cached `lstat` fields used to cheaply detect a dirty working tree, plus
/// the oid and mode that will become the next commit's tree (spec.md §3 "Index entry").
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    #[allow(missing_docs)]
    pub ctime: Time,
    #[allow(missing_docs)]
    pub mtime: Time,
    #[allow(missing_docs)]
    pub dev: u32,
    #[allow(missing_docs)]
    pub ino: u32,
    /// The entry's file mode; only [`EntryMode::Blob`], [`EntryMode::BlobExecutable`],
    /// [`EntryMode::Link`] and [`EntryMode::Commit`] (submodules) are valid here — index entries
    /// never represent a tree directly.
    pub mode: EntryMode,
    #[allow(missing_docs)]
    pub uid: u32,
    #[allow(missing_docs)]
    pub gid: u32,
    /// The file size in bytes, as `lstat` reported it when this entry was staged.
    pub size: u32,
    /// The staged blob (or, for a submodule, commit) oid.
    pub oid: ObjectId,
    #[allow(missing_docs)]
    pub stage: Stage,
    /// `true` if this path should be treated as unchanged without re-`lstat`ing it
    /// (`git update-index --assume-unchanged`).
    pub assume_valid: bool,
    /// The path relative to the worktree root, `/`-separated, UTF-8, never trailing-`/`
    /// (spec.md §3: "Path uses `/` separator, no trailing `/`, UTF-8 bytes").
    pub path: BString,
}

impl Entry {
    pub(crate) fn sort_key(&self) -> (&BString, u16) {
        (&self.path, self.stage.to_bits())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stage_bit_roundtrips() {
        for stage in [Stage::Clean, Stage::Base, Stage::Ours, Stage::Theirs] {
            assert_eq!(Stage::from_bits(stage.to_bits()), stage);
        }
    }
}
