//! History traversal (spec.md §4.8, §6 `log`/`findMergeBase`/`isDescendent`/`listCommitsAndTags`),
//! delegating directly to [`git_revision::graph`] over this repository's [`ObjectAccess`].

use git_hash::ObjectId;
use git_revision::graph;

use super::Repository;
use crate::backend::GitBackend;
use crate::error::{Code, Error};

impl<B: GitBackend> Repository<B> {
    /// The closed set of commits reachable from `start` but not from `finish`, annotated tags
    /// peeled to their target commit first.
    pub fn list_commits_and_tags(
        &self,
        start: impl IntoIterator<Item = ObjectId>,
        finish: impl IntoIterator<Item = ObjectId>,
    ) -> Result<std::collections::BTreeSet<ObjectId>, Error> {
        graph::list_commits_and_tags(&self.objects(), start, finish).map_err(|e| Error::new("repository.list_commits_and_tags", Code::Internal, e))
    }

    /// `HEAD`'s (or `from`'s) ancestry, nearest-first: `list_commits_and_tags` from a single
    /// start and no finish, ordered by a walk rather than returned as a set.
    pub fn log(&self, from: ObjectId) -> Result<Vec<ObjectId>, Error> {
        let mut out = Vec::new();
        let mut queue = std::collections::VecDeque::from([from]);
        let mut seen = std::collections::BTreeSet::new();
        while let Some(id) = queue.pop_front() {
            if !seen.insert(id) {
                continue;
            }
            let commit = self.read_commit(&id)?;
            out.push(id);
            queue.extend(commit.parents);
        }
        Ok(out)
    }

    /// `true` if `ancestor` is reachable from `oid` within `depth` generations.
    pub fn is_descendant(&self, oid: ObjectId, ancestor: ObjectId, depth: usize) -> Result<bool, Error> {
        graph::is_descendant(&self.objects(), oid, ancestor, depth).map_err(|e| Error::new("repository.is_descendant", Code::Internal, e))
    }

    /// Every merge base of `a` and `b` (spec.md §4.8's two-oid antichain).
    pub fn find_merge_bases(&self, a: ObjectId, b: ObjectId) -> Result<Vec<ObjectId>, Error> {
        graph::find_merge_bases(&self.objects(), a, b).map_err(|e| Error::new("repository.find_merge_bases", Code::Internal, e))
    }

    /// A single merge base for `oids`, reducing more than two inputs pairwise.
    pub fn find_merge_base(&self, oids: &[ObjectId]) -> Result<Option<ObjectId>, Error> {
        graph::find_merge_base(&self.objects(), oids).map_err(|e| Error::new("repository.find_merge_base", Code::Internal, e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::memory::Memory;
    use git_actor::Signature;
    use git_date::Time;
    use git_object::Commit;

    fn signature(epoch: i64) -> Signature {
        Signature { name: "Ann".into(), email: "ann@x".into(), time: Time { seconds_since_epoch: epoch, offset_in_minutes: 0 } }
    }

    fn commit<B: GitBackend>(repo: &Repository<B>, parents: Vec<ObjectId>, tree: ObjectId, epoch: i64) -> ObjectId {
        repo.write_commit(&Commit {
            tree,
            parents,
            author: signature(epoch),
            committer: signature(epoch),
            extra_headers: Vec::new(),
            message: "c\n".into(),
        })
        .unwrap()
    }

    #[test]
    fn log_walks_parents_oldest_reachable_last() {
        let repo = Repository::new(Memory::new(), git_hash::Kind::Sha1);
        let tree = repo.write_tree(&git_object::Tree { entries: Vec::new() }).unwrap();
        let first = commit(&repo, Vec::new(), tree, 1);
        let second = commit(&repo, vec![first], tree, 2);

        let log = repo.log(second).unwrap();
        assert_eq!(log, vec![second, first]);
    }

    #[test]
    fn merge_base_of_a_linear_history_is_the_older_commit() {
        let repo = Repository::new(Memory::new(), git_hash::Kind::Sha1);
        let tree = repo.write_tree(&git_object::Tree { entries: Vec::new() }).unwrap();
        let first = commit(&repo, Vec::new(), tree, 1);
        let second = commit(&repo, vec![first], tree, 2);

        assert_eq!(repo.find_merge_base(&[first, second]).unwrap(), Some(first));
        assert!(repo.is_descendant(second, first, 10).unwrap());
    }
}
