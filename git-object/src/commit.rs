//! Commit objects: `tree`, `parent*`, `author`, `committer`, optional `gpgsig`, a blank line,
//! then the message (spec.md §3).

use bstr::{BStr, BString, ByteSlice};
use git_actor::Signature;
use git_hash::ObjectId;

/// A snapshot of the project: a tree plus zero or more parent commits and the people/times that
/// produced it.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde1", derive(serde::Serialize, serde::Deserialize))]
pub struct Commit {
    /// The oid of this commit's root tree.
    pub tree: ObjectId,
    /// The oids of this commit's parents, in order; empty for a root commit, 2+ for a merge.
    pub parents: Vec<ObjectId>,
    /// Who wrote the change and when.
    pub author: Signature,
    /// Who committed the change and when (may differ from `author` on rebase/cherry-pick).
    pub committer: Signature,
    /// Any header lines other than `tree`/`parent`/`author`/`committer`, preserved verbatim —
    /// most commonly `gpgsig`, the detached signature produced by a [`SignCallback`] external
    /// collaborator (spec.md §6).
    ///
    /// [`SignCallback`]: https://docs.rs/git-repository (see spec.md §6)
    pub extra_headers: Vec<(BString, BString)>,
    /// The commit message, including its trailing newline if the original had one.
    pub message: BString,
}

/// Errors decoding a commit object.
pub mod decode {
    /// The error returned by [`super::Commit::from_bytes()`].
    #[derive(Debug, thiserror::Error)]
    pub enum Error {
        /// A required `tree` header was missing.
        #[error("commit is missing its 'tree' header")]
        MissingTree,
        /// A required `author` or `committer` header was missing or malformed.
        #[error("commit is missing or has a malformed 'author'/'committer' header")]
        MissingOrInvalidSignature(#[source] git_actor::Error),
        /// An object id in a header wasn't valid hex for the active hash kind.
        #[error("invalid object id in commit header")]
        InvalidOid(#[source] git_hash::from_hex::Error),
        /// The header block wasn't terminated by a blank line before the message.
        #[error("commit header is missing the blank line separating it from the message")]
        MissingHeaderTerminator,
    }
}

impl Commit {
    /// Parse the raw payload of a commit object (the bytes after the `"commit <len>\0"` header).
    pub fn from_bytes(data: &[u8]) -> Result<Self, decode::Error> {
        let data = data.as_bstr();
        let mut lines = data.lines();
        let mut tree = None;
        let mut parents = Vec::new();
        let mut author = None;
        let mut committer = None;
        let mut extra_headers = Vec::new();

        let message_start;
        loop {
            let line = match lines.next() {
                Some(l) => l,
                None => return Err(decode::Error::MissingHeaderTerminator),
            };
            if line.is_empty() {
                message_start = offset_after(data, line.as_bstr());
                break;
            }
            let (key, value) = split_header(line.as_bstr());
            match key.as_ref() {
                b"tree" => tree = Some(parse_oid(value)?),
                b"parent" => parents.push(parse_oid(value)?),
                b"author" => author = Some(Signature::from_bytes(value).map_err(decode::Error::MissingOrInvalidSignature)?),
                b"committer" => committer = Some(Signature::from_bytes(value).map_err(decode::Error::MissingOrInvalidSignature)?),
                _ => extra_headers.push((key.to_owned(), value.to_owned())),
            }
        }

        Ok(Commit {
            tree: tree.ok_or(decode::Error::MissingTree)?,
            parents,
            author: author.ok_or_else(|| decode::Error::MissingOrInvalidSignature(missing_signature()))?,
            committer: committer.ok_or_else(|| decode::Error::MissingOrInvalidSignature(missing_signature()))?,
            extra_headers,
            message: data[message_start..].to_owned(),
        })
    }

    /// Serialise the commit back into its `"tree ...\nparent ...\n...\n\n<message>"` form.
    pub fn write_to(&self, out: &mut Vec<u8>) {
        write_header(out, b"tree", self.tree.to_hex().as_bytes());
        for parent in &self.parents {
            write_header(out, b"parent", parent.to_hex().as_bytes());
        }
        write_signature_header(out, b"author", &self.author);
        write_signature_header(out, b"committer", &self.committer);
        for (key, value) in &self.extra_headers {
            write_header(out, key, value);
        }
        out.push(b'\n');
        out.extend_from_slice(&self.message);
    }
}

fn missing_signature() -> git_actor::Error {
    git_actor::Error::Malformed(BString::from("missing"))
}

fn offset_after(whole: &BStr, line: &BStr) -> usize {
    // `line` is a subslice of `whole` produced by `.lines()`; its end plus the line terminator
    // it was split on (always exactly one `\n` for us) is where the message begins.
    let start = line.as_ptr() as usize - whole.as_ptr() as usize;
    (start + line.len() + 1).min(whole.len())
}

fn split_header(line: &BStr) -> (&BStr, &BStr) {
    match line.find_byte(b' ') {
        Some(pos) => (line[..pos].as_bstr(), line[pos + 1..].as_bstr()),
        None => (line, BStr::new(b"")),
    }
}

fn parse_oid(value: &BStr) -> Result<ObjectId, decode::Error> {
    ObjectId::from_hex(value).map_err(decode::Error::InvalidOid)
}

fn write_header(out: &mut Vec<u8>, key: &[u8], value: &[u8]) {
    out.extend_from_slice(key);
    out.push(b' ');
    out.extend_from_slice(value);
    out.push(b'\n');
}

fn write_signature_header(out: &mut Vec<u8>, key: &[u8], sig: &Signature) {
    out.extend_from_slice(key);
    out.push(b' ');
    let _ = sig.write_to(&mut *out);
    out.push(b'\n');
}

#[cfg(test)]
mod tests {
    use super::*;

    fn oid(byte: u8) -> ObjectId {
        ObjectId::from_bytes_unchecked(git_hash::Kind::Sha1, &[byte; 20])
    }

    #[test]
    fn parses_a_root_commit() {
        let tree_hex = oid(1).to_hex();
        let raw = format!(
            "tree {}\nauthor Ann <ann@x> 1700000000 +0000\ncommitter Ann <ann@x> 1700000000 +0000\n\nfirst\n",
            tree_hex
        );
        let commit = Commit::from_bytes(raw.as_bytes()).unwrap();
        assert_eq!(commit.tree, oid(1));
        assert!(commit.parents.is_empty());
        assert_eq!(commit.message, "first\n");
    }

    #[test]
    fn roundtrips_a_merge_commit() {
        let commit = Commit {
            tree: oid(1),
            parents: vec![oid(2), oid(3)],
            author: Signature::from_bytes(b"Ann <ann@x> 1700000000 +0000").unwrap(),
            committer: Signature::from_bytes(b"Ann <ann@x> 1700000000 +0000").unwrap(),
            extra_headers: vec![],
            message: "merge\n".into(),
        };
        let mut bytes = Vec::new();
        commit.write_to(&mut bytes);
        let decoded = Commit::from_bytes(&bytes).unwrap();
        assert_eq!(decoded, commit);
    }

    #[test]
    fn missing_tree_header_is_rejected() {
        let raw = b"author Ann <ann@x> 1700000000 +0000\ncommitter Ann <ann@x> 1700000000 +0000\n\nmsg\n";
        assert!(matches!(Commit::from_bytes(raw), Err(decode::Error::MissingTree)));
    }
}
