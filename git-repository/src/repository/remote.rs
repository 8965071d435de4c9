//! Remote bookkeeping and the transport seam (spec.md §1: wire protocols are treated as external
//! collaborators; spec.md §6 `addRemote`/`deleteRemote`/`listRemotes`, `fetch`/`push`/`pull`).
//!
//! `addRemote`/`deleteRemote`/`listRemotes` are ordinary config bookkeeping against
//! `remote.<name>.url`/`.fetch`, the same cascade [`super::config`] already reads and writes.
//! `fetch`/`push`/`pull` never speak a wire protocol themselves: a caller hands in a
//! [`FetchTransport`]/[`PushTransport`] implementation (an SSH/HTTP client, a test double, a
//! bundle reader) and this layer only does the repository-side bookkeeping around it — updating
//! remote-tracking refs after a fetch, and reading what to push before a push.

use bstr::{BString, ByteSlice};
use git_hash::ObjectId;

use super::Repository;
use crate::backend::GitBackend;
use crate::error::{Code, Error};

/// One configured remote.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Remote {
    /// The name it was added under, e.g. `"origin"`.
    pub name: String,
    /// `remote.<name>.url`.
    pub url: String,
    /// `remote.<name>.fetch` refspecs, in file order.
    pub fetch_refspecs: Vec<String>,
}

/// What a [`FetchTransport`] hands back: the refs advertised by the remote and the pack bytes
/// needed to make every advertised tip resolvable locally. Negotiating a minimal pack is the
/// transport's job; this layer just writes what it's given.
pub struct FetchResult {
    /// Every `(full ref name, oid)` the remote advertised.
    pub refs: Vec<(BString, ObjectId)>,
    /// Objects to add to the local store before remote-tracking refs are updated, in an order
    /// where each object's referents already precede it (so a naive insert-in-order is valid).
    pub objects: Vec<(git_object::Kind, Vec<u8>)>,
}

/// The seam a caller implements to speak an actual wire protocol (spec.md §1's "external
/// collaborator"). This crate ships no implementation; tests use a trivial in-process one.
pub trait FetchTransport {
    /// The error this transport's operations can fail with.
    type Error: std::error::Error + Send + Sync + 'static;

    /// Negotiate and fetch whatever refs `wanted` (full names, or empty for "everything") the
    /// remote at `url` advertises.
    fn fetch(&self, url: &str, wanted: &[BString]) -> Result<FetchResult, Self::Error>;
}

/// The seam a caller implements to push local refs to a remote.
pub trait PushTransport {
    /// The error this transport's operations can fail with.
    type Error: std::error::Error + Send + Sync + 'static;

    /// Send `updates` (`(full ref name, new oid)`) and every object they transitively need to
    /// `url`.
    fn push(&self, url: &str, updates: &[(BString, ObjectId)]) -> Result<(), Self::Error>;
}

impl<B: GitBackend> Repository<B> {
    /// Record a new remote's URL and default fetch refspec.
    pub fn add_remote(&self, name: &str, url: &str) -> Result<(), Error> {
        if self.remote(name)?.is_some() {
            return Err(Error::new("repository.add_remote", Code::AlreadyExists, RemoteExists(name.to_owned())));
        }
        self.set_config(git_sec::Scope::Local, "remote", Some(name), "url", url)?;
        self.set_config(
            git_sec::Scope::Local,
            "remote",
            Some(name),
            "fetch",
            &format!("+refs/heads/*:refs/remotes/{name}/*"),
        )
    }

    /// Forget a remote's configuration. A no-op if it wasn't configured.
    pub fn delete_remote(&self, name: &str) -> Result<(), Error> {
        self.backend
            .remove_config_section("remote", Some(name))
            .map_err(|e| Error::new("repository.delete_remote", Code::Internal, e))
    }

    /// The single remote named `name`, if configured.
    pub fn remote(&self, name: &str) -> Result<Option<Remote>, Error> {
        Ok(self.list_remotes()?.into_iter().find(|r| r.name == name))
    }

    /// Every configured remote, in config-file order.
    pub fn list_remotes(&self) -> Result<Vec<Remote>, Error> {
        let cascade = self.backend.read_config().map_err(|e| Error::new("repository.list_remotes", Code::Internal, e))?;
        let mut names = Vec::new();
        for source in &cascade.sources {
            let Some(file) = &source.file else { continue };
            for subsection in file.sections_named("remote") {
                if let Some(name) = subsection {
                    let name = name.to_string();
                    if !names.contains(&name) {
                        names.push(name);
                    }
                }
            }
        }
        names
            .into_iter()
            .filter_map(|name| {
                let url = cascade.raw_value("remote", Some(&name), "url")?.to_string();
                let fetch_refspecs = cascade
                    .sources
                    .iter()
                    .filter_map(|s| s.file.as_ref())
                    .flat_map(|f| f.values("remote", Some(&name), "fetch"))
                    .map(|v| v.to_string())
                    .collect();
                Some(Remote { name, url, fetch_refspecs })
            })
            .map(Ok)
            .collect()
    }

    /// Fetch from `remote` through `transport`, writing every returned object and updating
    /// `refs/remotes/<remote>/*` to match what was advertised.
    pub fn fetch<T: FetchTransport>(&self, remote: &str, transport: &T) -> Result<Vec<(BString, ObjectId)>, Error> {
        let remote = self
            .remote(remote)?
            .ok_or_else(|| Error::new("repository.fetch", Code::NotFound, crate::error::NotFound::Remote { name: remote.to_owned() }))?;
        let result = transport
            .fetch(&remote.url, &[])
            .map_err(|e| Error::new("repository.fetch", Code::Internal, e))?;
        for (kind, data) in &result.objects {
            self.write_object(*kind, data)?;
        }
        for (name, oid) in &result.refs {
            let tracking = remote_tracking_ref(&remote.name, name);
            self.backend
                .write_ref(bstr::BStr::new(tracking.as_bytes()), *oid, git_ref::transaction::PreviousValue::Any, false)
                .map_err(|e| Error::new("repository.fetch", Code::Internal, e))?;
        }
        Ok(result.refs)
    }

    /// Push `updates` to `remote` through `transport`.
    pub fn push<T: PushTransport>(&self, remote: &str, updates: &[(BString, ObjectId)], transport: &T) -> Result<(), Error> {
        let remote = self
            .remote(remote)?
            .ok_or_else(|| Error::new("repository.push", Code::NotFound, crate::error::NotFound::Remote { name: remote.to_owned() }))?;
        transport.push(&remote.url, updates).map_err(|e| Error::new("repository.push", Code::Internal, e))
    }

    /// A fetch from `remote` followed by a fast-forward-only merge of its matching remote-tracking
    /// branch into the current branch.
    pub fn pull<T: FetchTransport, W: git_worktree::backend::WorktreeBackend>(
        &self,
        remote: &str,
        transport: &T,
        backend: &W,
        author: git_actor::Signature,
        committer: git_actor::Signature,
    ) -> Result<git_worktree::merge::Outcome, Error> {
        self.fetch(remote, transport)?;
        let branch = self
            .current_branch()?
            .ok_or_else(|| Error::new("repository.pull", Code::NotFound, crate::error::NotFound::UnbornHead))?;
        let tracking = remote_tracking_ref(remote, bstr::BString::from(format!("refs/heads/{branch}")).as_bytes());
        let theirs = self
            .resolve(bstr::BStr::new(tracking.as_bytes()))?
            .ok_or_else(|| Error::new("repository.pull", Code::NotFound, crate::error::NotFound::Ref { name: tracking }))?;
        self.merge(
            backend,
            theirs,
            &git_worktree::merge::Options { fast_forward: true, fast_forward_only: true, abort_on_conflict: true },
            author,
            committer,
        )
    }
}

fn remote_tracking_ref(remote: &str, full_ref: &[u8]) -> BString {
    let short = full_ref.strip_prefix(b"refs/heads/").unwrap_or(full_ref);
    BString::from(format!("refs/remotes/{remote}/{}", String::from_utf8_lossy(short)))
}

/// [`Repository::add_remote`] was asked to create a remote that already exists.
#[derive(Debug, thiserror::Error)]
#[error("remote {0:?} already exists")]
struct RemoteExists(String);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::memory::Memory;

    struct StaticTransport(FetchResult);

    impl FetchTransport for StaticTransport {
        type Error = std::convert::Infallible;

        fn fetch(&self, _url: &str, _wanted: &[BString]) -> Result<FetchResult, Self::Error> {
            Ok(FetchResult { refs: self.0.refs.clone(), objects: self.0.objects.clone() })
        }
    }

    #[test]
    fn add_then_list_remote() {
        let repo = Repository::new(Memory::new(), git_hash::Kind::Sha1);
        repo.add_remote("origin", "https://example/repo.git").unwrap();
        let remotes = repo.list_remotes().unwrap();
        assert_eq!(remotes.len(), 1);
        assert_eq!(remotes[0].url, "https://example/repo.git");
    }

    #[test]
    fn fetch_writes_objects_and_tracking_refs() {
        let repo = Repository::new(Memory::new(), git_hash::Kind::Sha1);
        repo.add_remote("origin", "https://example/repo.git").unwrap();

        let blob = b"hi\n".to_vec();
        let oid = Repository::new(Memory::new(), git_hash::Kind::Sha1).write_blob(&blob).unwrap();
        let transport = StaticTransport(FetchResult {
            refs: vec![(BString::from("refs/heads/main"), oid)],
            objects: vec![(git_object::Kind::Blob, blob)],
        });

        let updated = repo.fetch("origin", &transport).unwrap();
        assert_eq!(updated, vec![(BString::from("refs/heads/main"), oid)]);
        assert_eq!(repo.resolve(bstr::BStr::new(b"refs/remotes/origin/main")).unwrap(), Some(oid));
        assert_eq!(repo.read_blob(&oid).unwrap(), b"hi\n");
    }
}
