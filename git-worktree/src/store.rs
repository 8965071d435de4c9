//! The object-store capability the checkout, status and merge algorithms need: everything
//! [`git_diff::TreeFind`] and [`git_revision::CommitGraph`] already ask for, plus writing a new
//! blob (needed by the merge engine to persist a `mergeDriver`'s clean output).

use git_hash::ObjectId;

/// A single capability covering tree/blob/commit/tag lookup and blob writes, implemented once by
/// whatever owns the actual object store (`git-repository`'s `GitBackend`, or a test fixture).
pub trait Store: git_diff::TreeFind<Error = <Self as Store>::Error> + git_revision::CommitGraph<Error = <Self as Store>::Error> {
    /// The error produced by any lookup or write.
    type Error: std::error::Error + Send + Sync + 'static;

    /// Hash and persist `data` as a blob, returning its id.
    fn write_blob(&self, data: &[u8]) -> Result<ObjectId, <Self as Store>::Error>;
}
