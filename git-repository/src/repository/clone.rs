//! `clone` (spec.md §4.10): copying an existing repository's objects and refs into a fresh one.
//!
//! The local-path form (source and destination both on this machine) is implemented in full per
//! spec.md §4.10 step 1: copy `objects/` and `packed-refs` verbatim, copy either every `refs/*`
//! or just the requested branch depending on `single_branch`, and deliberately do **not** copy
//! the source's `HEAD` or index — the destination gets a fresh `HEAD` pointing at the checked-out
//! branch and a fresh index built from it. The remote form is a thin orchestration over
//! [`super::remote::FetchTransport`] (spec.md §1: wire protocols are external collaborators).

use bstr::{BStr, BString, ByteSlice};
use git_worktree::backend::WorktreeBackend;

use super::remote::FetchTransport;
use super::Repository;
use crate::backend::fs::Fs;
use crate::backend::{GitBackend, InitOptions};
use crate::error::{Code, Error};

/// How much of a repository's ref namespace [`clone_local`]/[`clone_from`] copy.
#[derive(Debug, Clone)]
pub struct CloneOptions {
    /// Copy only `refs/heads/<branch>` (and `HEAD` set to it) instead of every ref.
    pub single_branch: Option<String>,
    /// Create a bare clone (no working tree, no checkout).
    pub bare: bool,
}

impl Default for CloneOptions {
    fn default() -> Self {
        CloneOptions { single_branch: None, bare: false }
    }
}

/// Clone the filesystem repository at `source_git_dir` into a new one rooted at `target_dir`.
pub fn clone_local(source_git_dir: &std::path::Path, target_dir: &std::path::Path, options: &CloneOptions) -> Result<Repository<Fs>, Error> {
    let source = Fs::at(source_git_dir.to_owned(), source_git_dir.to_owned(), git_hash::Kind::Sha1)
        .map_err(|e| Error::new("repository.clone_local", Code::Internal, e))?;
    if !source.is_initialized() {
        return Err(Error::new("repository.clone_local", Code::NotFound, crate::error::NotFound::Ref { name: BString::from("HEAD") }));
    }

    let target_git_dir = if options.bare { target_dir.to_owned() } else { target_dir.join(".git") };
    std::fs::create_dir_all(&target_git_dir).map_err(|e| Error::new("repository.clone_local", Code::Internal, e))?;
    let target = Fs::at(target_git_dir.clone(), target_git_dir.clone(), git_hash::Kind::Sha1)
        .map_err(|e| Error::new("repository.clone_local", Code::Internal, e))?;
    target
        .initialize(&InitOptions { bare: options.bare, object_format: git_hash::Kind::Sha1 })
        .map_err(|e| Error::new("repository.clone_local", Code::Internal, e))?;
    let repo = Repository::new(target, git_hash::Kind::Sha1);

    copy_objects(&source, &repo)?;

    let refs_to_copy: Vec<BString> = match &options.single_branch {
        Some(branch) => vec![BString::from(format!("refs/heads/{branch}"))],
        None => source.list_refs("refs/").map_err(|e| Error::new("repository.clone_local", Code::Internal, e))?,
    };
    for name in &refs_to_copy {
        if let Some(oid) = source.read_ref(name.as_bstr()).map_err(|e| Error::new("repository.clone_local", Code::Internal, e))? {
            repo.backend()
                .write_ref(name.as_bstr(), oid, git_ref::transaction::PreviousValue::Any, true)
                .map_err(|e| Error::new("repository.clone_local", Code::Internal, e))?;
        }
    }

    let source_branch = match source.read_symbolic_ref(BStr::new(b"HEAD")).map_err(|e| Error::new("repository.clone_local", Code::Internal, e))? {
        Some(git_ref::transaction::Target::Symbolic(name)) => name.as_bstr().strip_prefix(b"refs/heads/").map(|s| String::from_utf8_lossy(s).into_owned()),
        _ => None,
    };
    let default_branch = options.single_branch.clone().or(source_branch).unwrap_or_else(|| "main".to_owned());
    repo.backend()
        .write_symbolic_ref(BStr::new(b"HEAD"), BString::from(format!("refs/heads/{default_branch}")).as_bstr(), git_ref::transaction::PreviousValue::Any)
        .map_err(|e| Error::new("repository.clone_local", Code::Internal, e))?;

    Ok(repo)
}

/// Materialise `repo`'s checked-out branch into `backend` after [`clone_local`] (spec.md §4.10
/// step 2's "checkout the default branch", factored out so bare clones can skip it).
pub fn checkout_after_clone<W: WorktreeBackend>(repo: &Repository<Fs>, backend: &W) -> Result<(), Error> {
    let Some(head) = repo.head_id()? else { return Ok(()) };
    repo.checkout(backend, head, None, true, true)
}

/// Clone a remote repository through `transport`: create the destination, register `origin`,
/// fetch, fast-forward `refs/heads/<branch>` to what was advertised, and point `HEAD` at it. The
/// working tree is left unchecked out; call [`checkout_after_clone`] afterwards if one is wanted.
pub fn clone_from<T: FetchTransport>(url: &str, target_dir: &std::path::Path, branch: &str, transport: &T, options: &CloneOptions) -> Result<Repository<Fs>, Error> {
    let target_git_dir = if options.bare { target_dir.to_owned() } else { target_dir.join(".git") };
    std::fs::create_dir_all(&target_git_dir).map_err(|e| Error::new("repository.clone_from", Code::Internal, e))?;
    let target = Fs::at(target_git_dir.clone(), target_git_dir.clone(), git_hash::Kind::Sha1)
        .map_err(|e| Error::new("repository.clone_from", Code::Internal, e))?;
    target
        .initialize(&InitOptions { bare: options.bare, object_format: git_hash::Kind::Sha1 })
        .map_err(|e| Error::new("repository.clone_from", Code::Internal, e))?;
    let repo = Repository::new(target, git_hash::Kind::Sha1);

    repo.add_remote("origin", url)?;
    let refs = repo.fetch("origin", transport)?;

    let wanted = BString::from(format!("refs/heads/{branch}"));
    let oid = refs
        .iter()
        .find(|(name, _)| *name == wanted)
        .map(|(_, oid)| *oid)
        .ok_or_else(|| Error::new("repository.clone_from", Code::NotFound, crate::error::NotFound::Ref { name: wanted.clone() }))?;
    repo.backend()
        .write_ref(wanted.as_bstr(), oid, git_ref::transaction::PreviousValue::Any, true)
        .map_err(|e| Error::new("repository.clone_from", Code::Internal, e))?;
    repo.backend()
        .write_symbolic_ref(BStr::new(b"HEAD"), wanted.as_bstr(), git_ref::transaction::PreviousValue::Any)
        .map_err(|e| Error::new("repository.clone_from", Code::Internal, e))?;
    Ok(repo)
}

fn copy_objects(source: &Fs, target: &Repository<Fs>) -> Result<(), Error> {
    for name in source.list_refs("refs/").map_err(|e| Error::new("repository.clone_local", Code::Internal, e))? {
        let Some(oid) = source.read_ref(name.as_bstr()).map_err(|e| Error::new("repository.clone_local", Code::Internal, e))? else { continue };
        copy_reachable(source, target, oid)?;
    }
    let packed = source.read_packed_refs().map_err(|e| Error::new("repository.clone_local", Code::Internal, e))?;
    target.backend().write_packed_refs(&packed).map_err(|e| Error::new("repository.clone_local", Code::Internal, e))
}

fn copy_reachable(source: &Fs, target: &Repository<Fs>, start: git_hash::ObjectId) -> Result<(), Error> {
    let mut queue = vec![start];
    let mut seen = std::collections::BTreeSet::new();
    while let Some(id) = queue.pop() {
        if !seen.insert(id) || target.backend().has_object(&id).map_err(|e| Error::new("repository.clone_local", Code::Internal, e))? {
            continue;
        }
        let Some((kind, data)) = source.read_object(&id).map_err(|e| Error::new("repository.clone_local", Code::Internal, e))? else { continue };
        target.write_object(kind, &data)?;
        match kind {
            git_object::Kind::Commit => {
                let commit = git_object::Commit::from_bytes(&data).map_err(|e| Error::new("repository.clone_local", Code::Internal, e))?;
                queue.push(commit.tree);
                queue.extend(commit.parents);
            }
            git_object::Kind::Tree => {
                let tree = git_object::tree::Tree::from_bytes_with_hash(&data, id.kind()).map_err(|e| Error::new("repository.clone_local", Code::Internal, e))?;
                queue.extend(tree.entries.into_iter().map(|e| e.oid));
            }
            git_object::Kind::Tag => {
                let tag = git_object::Tag::from_bytes(&data).map_err(|e| Error::new("repository.clone_local", Code::Internal, e))?;
                queue.push(tag.target);
            }
            git_object::Kind::Blob => {}
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cloning_a_local_repository_copies_its_history() {
        let source_dir = tempfile::tempdir().unwrap();
        let source_git_dir = source_dir.path().join(".git");
        let source_backend = Fs::at(source_git_dir.clone(), source_git_dir.clone(), git_hash::Kind::Sha1).unwrap();
        source_backend.initialize(&InitOptions::default()).unwrap();
        let source_repo = Repository::new(source_backend, git_hash::Kind::Sha1);

        let tree = source_repo.write_tree(&git_object::Tree { entries: Vec::new() }).unwrap();
        let signature = git_actor::Signature {
            name: "Ann".into(),
            email: "ann@x".into(),
            time: git_date::Time { seconds_since_epoch: 1, offset_in_minutes: 0 },
        };
        let commit = source_repo
            .write_commit(&git_object::Commit {
                tree,
                parents: Vec::new(),
                author: signature.clone(),
                committer: signature,
                extra_headers: Vec::new(),
                message: "root\n".into(),
            })
            .unwrap();
        source_repo
            .backend()
            .write_ref(BStr::new(b"refs/heads/main"), commit, git_ref::transaction::PreviousValue::Any, false)
            .unwrap();
        source_repo
            .backend()
            .write_symbolic_ref(BStr::new(b"HEAD"), BStr::new(b"refs/heads/main"), git_ref::transaction::PreviousValue::Any)
            .unwrap();

        let target_dir = tempfile::tempdir().unwrap();
        let cloned = clone_local(&source_git_dir, target_dir.path(), &CloneOptions::default()).unwrap();
        assert_eq!(cloned.head_id().unwrap(), Some(commit));
        assert_eq!(cloned.read_commit(&commit).unwrap().message, "root\n");
    }
}
