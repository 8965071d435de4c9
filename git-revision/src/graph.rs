//! Walking the commit graph: the closed set of reachable commits, descendant tests, and
//! merge-base computation (spec.md §4.8 "Walker / ancestry / merge-base").

use std::collections::{BTreeMap, BTreeSet, VecDeque};

use git_hash::ObjectId;
use git_object::{Commit, Tag};

/// Resolves the two object kinds a graph walk needs: commits, for their parents and time, and
/// tags, so an annotated tag can be peeled to the commit it ultimately points at.
pub trait CommitGraph {
    /// The error produced when a lookup fails.
    type Error: std::error::Error + Send + Sync + 'static;

    /// Decode the commit stored at `id`, or `None` if `id` doesn't name a commit.
    fn find_commit(&self, id: &ObjectId) -> Result<Option<Commit>, Self::Error>;

    /// Decode the tag stored at `id`, or `None` if `id` doesn't name a tag.
    fn find_tag(&self, id: &ObjectId) -> Result<Option<Tag>, Self::Error>;
}

/// The error produced by every function in this module, generic over the backing
/// [`CommitGraph`]'s own error type.
#[derive(Debug, thiserror::Error)]
pub enum Error<E> {
    /// The underlying [`CommitGraph`] lookup failed.
    #[error(transparent)]
    Lookup(E),
    /// An oid named by a caller, or reached while peeling a tag, is neither a commit nor a tag.
    #[error("{id} is neither a commit nor a tag pointing at one")]
    NotACommit {
        #[allow(missing_docs)]
        id: ObjectId,
    },
    /// [`is_descendant()`] exhausted its depth budget without reaching `ancestor` or running out
    /// of history to search.
    #[error("is_descendant search exceeded its depth limit of {limit}")]
    MaxDepthExceeded {
        #[allow(missing_docs)]
        limit: usize,
    },
}

fn peel_to_commit<G: CommitGraph>(graph: &G, mut id: ObjectId) -> Result<ObjectId, Error<G::Error>> {
    loop {
        if graph.find_commit(&id).map_err(Error::Lookup)?.is_some() {
            return Ok(id);
        }
        match graph.find_tag(&id).map_err(Error::Lookup)? {
            Some(tag) => id = tag.target,
            None => return Err(Error::NotACommit { id }),
        }
    }
}

fn parents<G: CommitGraph>(graph: &G, id: &ObjectId) -> Result<Vec<ObjectId>, Error<G::Error>> {
    graph
        .find_commit(id)
        .map_err(Error::Lookup)?
        .map(|commit| commit.parents)
        .ok_or(Error::NotACommit { id: *id })
}

fn commit_time<G: CommitGraph>(graph: &G, id: &ObjectId) -> Result<git_date::Time, Error<G::Error>> {
    graph
        .find_commit(id)
        .map_err(Error::Lookup)?
        .map(|commit| commit.committer.time)
        .ok_or(Error::NotACommit { id: *id })
}

/// The closed set of commits reachable from `start`, stopping at anything also reachable from
/// `finish` (spec.md §4.8: `listCommitsAndTags`). Annotated tags in either set are peeled to
/// their target commit before the walk begins.
pub fn list_commits_and_tags<G: CommitGraph>(
    graph: &G,
    start: impl IntoIterator<Item = ObjectId>,
    finish: impl IntoIterator<Item = ObjectId>,
) -> Result<BTreeSet<ObjectId>, Error<G::Error>> {
    let uninteresting = ancestors_closure(graph, finish)?;

    let mut visited = BTreeSet::new();
    let mut queue = VecDeque::new();
    for id in start {
        queue.push_back(peel_to_commit(graph, id)?);
    }
    while let Some(id) = queue.pop_front() {
        if uninteresting.contains(&id) || !visited.insert(id) {
            continue;
        }
        for parent in parents(graph, &id)? {
            queue.push_back(parent);
        }
    }
    Ok(visited)
}

fn ancestors_closure<G: CommitGraph>(graph: &G, seeds: impl IntoIterator<Item = ObjectId>) -> Result<BTreeSet<ObjectId>, Error<G::Error>> {
    let mut visited = BTreeSet::new();
    let mut queue = VecDeque::new();
    for id in seeds {
        queue.push_back(peel_to_commit(graph, id)?);
    }
    while let Some(id) = queue.pop_front() {
        if !visited.insert(id) {
            continue;
        }
        for parent in parents(graph, &id)? {
            queue.push_back(parent);
        }
    }
    Ok(visited)
}

/// `true` if `ancestor` is reachable from `oid` within `depth` generations (spec.md §4.8:
/// `isDescendent`). `oid == ancestor` is always `true`, at zero cost. Exhausting `depth` without
/// either reaching `ancestor` or running out of history to search is [`Error::MaxDepthExceeded`].
pub fn is_descendant<G: CommitGraph>(graph: &G, oid: ObjectId, ancestor: ObjectId, depth: usize) -> Result<bool, Error<G::Error>> {
    let oid = peel_to_commit(graph, oid)?;
    let ancestor = peel_to_commit(graph, ancestor)?;
    if oid == ancestor {
        return Ok(true);
    }

    let mut frontier = vec![oid];
    let mut visited: BTreeSet<ObjectId> = [oid].into_iter().collect();
    for _ in 0..depth {
        if frontier.is_empty() {
            return Ok(false);
        }
        let mut next = Vec::new();
        for id in frontier {
            for parent in parents(graph, &id)? {
                if parent == ancestor {
                    return Ok(true);
                }
                if visited.insert(parent) {
                    next.push(parent);
                }
            }
        }
        frontier = next;
    }
    Err(Error::MaxDepthExceeded { limit: depth })
}

/// Every merge base of `a` and `b`: the antichain of commits reachable from both that aren't
/// themselves an ancestor of another member of the antichain (spec.md §4.8, two-oid case).
/// Empty if `a` and `b` share no common ancestor.
pub fn find_merge_bases<G: CommitGraph>(graph: &G, a: ObjectId, b: ObjectId) -> Result<Vec<ObjectId>, Error<G::Error>> {
    let a = peel_to_commit(graph, a)?;
    let b = peel_to_commit(graph, b)?;

    let ancestors_a = ancestors_closure(graph, [a])?;
    let ancestors_b = ancestors_closure(graph, [b])?;
    let candidates: BTreeSet<ObjectId> = ancestors_a.intersection(&ancestors_b).copied().collect();

    let mut candidate_ancestors: BTreeMap<ObjectId, BTreeSet<ObjectId>> = BTreeMap::new();
    for &candidate in &candidates {
        candidate_ancestors.insert(candidate, ancestors_closure(graph, [candidate])?);
    }

    Ok(candidates
        .iter()
        .copied()
        .filter(|&candidate| {
            !candidates
                .iter()
                .any(|&other| other != candidate && candidate_ancestors[&other].contains(&candidate))
        })
        .collect())
}

/// A single merge base for `oids`, reducing more than two inputs pairwise (spec.md §4.8: "N
/// oids: iteratively reduce via pairwise `mergeBase(x, y)`"). A single input is its own base.
/// When a pairwise reduction yields more than one candidate base, the earliest by commit time
/// (then lowest oid) is picked deterministically. `None` if any pair shares no common ancestor.
pub fn find_merge_base<G: CommitGraph>(graph: &G, oids: &[ObjectId]) -> Result<Option<ObjectId>, Error<G::Error>> {
    let mut iter = oids.iter();
    let first = match iter.next() {
        Some(&id) => peel_to_commit(graph, id)?,
        None => return Ok(None),
    };

    let mut acc = first;
    for &next in iter {
        let bases = find_merge_bases(graph, acc, next)?;
        match pick_earliest(graph, &bases)? {
            Some(base) => acc = base,
            None => return Ok(None),
        }
    }
    Ok(Some(acc))
}

fn pick_earliest<G: CommitGraph>(graph: &G, candidates: &[ObjectId]) -> Result<Option<ObjectId>, Error<G::Error>> {
    let mut best: Option<(git_date::Time, ObjectId)> = None;
    for &candidate in candidates {
        let time = commit_time(graph, &candidate)?;
        if best.map_or(true, |(best_time, best_id)| (time, candidate) < (best_time, best_id)) {
            best = Some((time, candidate));
        }
    }
    Ok(best.map(|(_, id)| id))
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use git_actor::Signature;
    use git_date::Time;
    use git_hash::{self, ObjectId};
    use git_object::{Commit, Tag};

    use super::*;

    #[derive(Debug, thiserror::Error)]
    #[error("commit graph fixture has no entry for this id")]
    struct NotFound;

    #[derive(Default)]
    struct Fixture {
        commits: BTreeMap<ObjectId, Commit>,
        tags: BTreeMap<ObjectId, Tag>,
    }

    impl CommitGraph for Fixture {
        type Error = NotFound;

        fn find_commit(&self, id: &ObjectId) -> Result<Option<Commit>, Self::Error> {
            Ok(self.commits.get(id).cloned())
        }

        fn find_tag(&self, id: &ObjectId) -> Result<Option<Tag>, Self::Error> {
            Ok(self.tags.get(id).cloned())
        }
    }

    fn oid(byte: u8) -> ObjectId {
        ObjectId::from_bytes_unchecked(git_hash::Kind::Sha1, &[byte; 20])
    }

    fn signature(seconds: u64) -> Signature {
        Signature {
            name: "tester".into(),
            email: "tester@example.com".into(),
            time: Time {
                seconds_since_epoch: seconds,
                offset_in_minutes: 0,
            },
        }
    }

    impl Fixture {
        fn commit(&mut self, id: u8, parents: &[u8], seconds: u64) {
            self.commits.insert(
                oid(id),
                Commit {
                    tree: oid(0xff),
                    parents: parents.iter().map(|&p| oid(p)).collect(),
                    author: signature(seconds),
                    committer: signature(seconds),
                    extra_headers: Vec::new(),
                    message: "test".into(),
                },
            );
        }

        fn tag(&mut self, id: u8, target: u8) {
            self.tags.insert(
                oid(id),
                Tag {
                    target: oid(target),
                    target_kind: git_object::Kind::Commit,
                    name: "v1".into(),
                    tagger: Some(signature(0)),
                    message: "test".into(),
                    extra_headers: Vec::new(),
                },
            );
        }
    }

    /// a - b - c
    fn linear() -> Fixture {
        let mut f = Fixture::default();
        f.commit(1, &[], 1);
        f.commit(2, &[1], 2);
        f.commit(3, &[2], 3);
        f
    }

    #[test]
    fn list_commits_and_tags_walks_linear_history() {
        let f = linear();
        let visited = list_commits_and_tags(&f, [oid(3)], []).unwrap();
        assert_eq!(visited, [oid(1), oid(2), oid(3)].into_iter().collect());
    }

    #[test]
    fn list_commits_and_tags_excludes_ancestors_of_finish() {
        let f = linear();
        let visited = list_commits_and_tags(&f, [oid(3)], [oid(2)]).unwrap();
        assert_eq!(visited, [oid(3)].into_iter().collect());
    }

    #[test]
    fn is_descendant_follows_linear_chain() {
        let f = linear();
        assert!(is_descendant(&f, oid(3), oid(1), 10).unwrap());
        assert!(!is_descendant(&f, oid(1), oid(3), 10).unwrap());
        assert!(is_descendant(&f, oid(1), oid(1), 0).unwrap());
    }

    #[test]
    fn is_descendant_reports_exceeded_depth() {
        let f = linear();
        let err = is_descendant(&f, oid(3), oid(1), 1).unwrap_err();
        assert!(matches!(err, Error::MaxDepthExceeded { limit: 1 }));
    }

    /// i - a - o
    ///       \ /
    ///        (o is a merge of a and b)
    ///   i - a - o
    ///   i - b -/
    fn merge() -> Fixture {
        let mut f = Fixture::default();
        f.commit(b'i', &[], 1);
        f.commit(b'a', &[b'i'], 2);
        f.commit(b'b', &[b'i'], 2);
        f.commit(b'o', &[b'a', b'b'], 3);
        f
    }

    #[test]
    fn find_merge_base_of_two_parents_is_their_common_ancestor() {
        let f = merge();
        let base = find_merge_base(&f, &[oid(b'a'), oid(b'b')]).unwrap();
        assert_eq!(base, Some(oid(b'i')));
    }

    #[test]
    fn find_merge_base_of_merge_and_one_parent_is_that_parent() {
        let f = merge();
        let base = find_merge_base(&f, &[oid(b'o'), oid(b'a')]).unwrap();
        assert_eq!(base, Some(oid(b'a')));
    }

    #[test]
    fn find_merge_base_of_identical_oids_is_itself() {
        let f = merge();
        let base = find_merge_base(&f, &[oid(b'a'), oid(b'a')]).unwrap();
        assert_eq!(base, Some(oid(b'a')));
    }

    #[test]
    fn find_merge_base_of_single_oid_is_itself() {
        let f = merge();
        let base = find_merge_base(&f, &[oid(b'a')]).unwrap();
        assert_eq!(base, Some(oid(b'a')));
    }

    #[test]
    fn find_merge_base_of_empty_slice_is_none() {
        let f = merge();
        assert_eq!(find_merge_base(&f, &[]).unwrap(), None);
    }

    /// Octopus merge: i - a, i - b, i - c; o = merge(a, b, c).
    /// findMergeBase([o, a]) == a, findMergeBase([a, b, c]) == i, findMergeBase([o, i]) == i.
    fn octopus() -> Fixture {
        let mut f = Fixture::default();
        f.commit(b'i', &[], 1);
        f.commit(b'a', &[b'i'], 2);
        f.commit(b'b', &[b'i'], 2);
        f.commit(b'c', &[b'i'], 2);
        f.commit(b'o', &[b'a', b'b', b'c'], 3);
        f
    }

    #[test]
    fn find_merge_base_octopus_merge_and_one_parent_is_that_parent() {
        let f = octopus();
        assert_eq!(find_merge_base(&f, &[oid(b'o'), oid(b'a')]).unwrap(), Some(oid(b'a')));
    }

    #[test]
    fn find_merge_base_octopus_all_parents_is_root() {
        let f = octopus();
        assert_eq!(find_merge_base(&f, &[oid(b'a'), oid(b'b'), oid(b'c')]).unwrap(), Some(oid(b'i')));
    }

    #[test]
    fn find_merge_base_octopus_merge_and_root_is_root() {
        let f = octopus();
        assert_eq!(find_merge_base(&f, &[oid(b'o'), oid(b'i')]).unwrap(), Some(oid(b'i')));
    }

    #[test]
    fn find_merge_base_with_no_common_ancestor_is_none() {
        let mut f = Fixture::default();
        f.commit(1, &[], 1);
        f.commit(2, &[], 1);
        assert_eq!(find_merge_base(&f, &[oid(1), oid(2)]).unwrap(), None);
    }

    #[test]
    fn annotated_tags_are_peeled_before_walking() {
        let mut f = linear();
        f.tag(b't', 3);
        let visited = list_commits_and_tags(&f, [oid(b't')], []).unwrap();
        assert_eq!(visited, [oid(1), oid(2), oid(3)].into_iter().collect());
    }
}
