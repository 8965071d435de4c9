//! Stable error codes surfaced on every porcelain error, so callers can match by `code()` rather
//! than by variant or type identity (spec.md §7).

use bstr::BString;
use git_hash::ObjectId;

/// One of the stable error kinds spec.md §7 enumerates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Code {
    /// A required argument was absent.
    MissingParameter,
    /// An OID didn't match the active hash length or charset.
    InvalidOid,
    /// A ref name violated git's naming rules.
    InvalidRefName,
    /// The branch/tag/remote being created already exists.
    AlreadyExists,
    /// An object, ref, remote, submodule, or HEAD was missing.
    NotFound,
    /// An object had an unexpected kind (e.g. a tag where a commit was required).
    ObjectType,
    /// A symbolic-ref or ancestry walk exceeded its depth budget.
    MaxDepth,
    /// One or more paths were left with an unresolved three-way merge.
    MergeConflict,
    /// The operation required a clean index (no unmerged paths) but found one.
    UnmergedPaths,
    /// A ref or index lock could not be acquired.
    Lock,
    /// Data corruption: bad magic, bad checksum, or a short read.
    Internal,
}

/// The error returned by a porcelain operation in this crate: a [`Code`], the operation that
/// produced it (spec.md §7's `caller` attribution, carried structurally instead of mutated onto
/// the error after the fact), and the error that caused it.
#[derive(Debug, thiserror::Error)]
#[error("{caller}: {source}")]
pub struct Error {
    /// The porcelain operation that failed, e.g. `"git.clone"`.
    pub caller: &'static str,
    /// The stable code a caller should match on.
    pub code: Code,
    #[source]
    source: Box<dyn std::error::Error + Send + Sync + 'static>,
}

impl Error {
    /// Wrap `source` as the error of `caller`, classified as `code`.
    pub fn new(caller: &'static str, code: Code, source: impl std::error::Error + Send + Sync + 'static) -> Self {
        Error { caller, code, source: Box::new(source) }
    }
}

/// Helper matching spec.md §7's `NotFoundError(what, ...)` shape; callers that need the specific
/// missing thing wrap one of these as a porcelain error's source.
#[derive(Debug, thiserror::Error)]
pub enum NotFound {
    /// An object was missing from the store.
    #[error("object {oid} not found")]
    Object {
        #[allow(missing_docs)]
        oid: ObjectId,
    },
    /// A reference was missing.
    #[error("reference {name:?} not found")]
    Ref {
        #[allow(missing_docs)]
        name: BString,
    },
    /// A remote was missing.
    #[error("remote {name:?} not found")]
    Remote {
        #[allow(missing_docs)]
        name: String,
    },
    /// A submodule was missing.
    #[error("submodule {path:?} not found")]
    Submodule {
        #[allow(missing_docs)]
        path: BString,
    },
    /// `HEAD` doesn't resolve to anything (an unborn branch with no commits yet).
    #[error("HEAD does not resolve to a commit")]
    UnbornHead,
}
