//! Annotated tag objects: `object`, `type`, `tag`, optional `tagger`, a blank line, then the
//! message (spec.md §3 refers to these via the `Tag(header+message)` variant).

use bstr::{BStr, BString, ByteSlice};
use git_actor::Signature;
use git_hash::ObjectId;

use crate::Kind;

/// An annotated tag: a named, optionally signed pointer at any other object (usually a commit).
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde1", derive(serde::Serialize, serde::Deserialize))]
pub struct Tag {
    /// The oid of the object this tag points at.
    pub target: ObjectId,
    /// The kind of the target object.
    pub target_kind: Kind,
    /// The tag's own name, without the `refs/tags/` prefix.
    pub name: BString,
    /// Who created the tag and when; absent for some legacy/lightweight-adjacent tags.
    pub tagger: Option<Signature>,
    /// The tag message, including a trailing `gpgsig` if present in `extra_headers`.
    pub message: BString,
    /// Header lines other than `object`/`type`/`tag`/`tagger`, most commonly `gpgsig`.
    pub extra_headers: Vec<(BString, BString)>,
}

/// Errors decoding a tag object.
pub mod decode {
    /// The error returned by [`super::Tag::from_bytes()`].
    #[derive(Debug, thiserror::Error)]
    pub enum Error {
        /// The required `object` header was missing or not a valid oid.
        #[error("tag is missing or has an invalid 'object' header")]
        MissingOrInvalidObject(#[source] Option<git_hash::from_hex::Error>),
        /// The required `type` header was missing or named an unknown kind.
        #[error("tag is missing or has an invalid 'type' header")]
        MissingOrInvalidType(#[source] Option<crate::kind::UnknownKindError>),
        /// The required `tag` (name) header was missing.
        #[error("tag is missing its 'tag' header")]
        MissingName,
        /// The `tagger` header was present but malformed.
        #[error("tag has a malformed 'tagger' header")]
        InvalidTagger(#[source] git_actor::Error),
        /// The header block wasn't terminated by a blank line before the message.
        #[error("tag header is missing the blank line separating it from the message")]
        MissingHeaderTerminator,
    }
}

impl Tag {
    /// Parse the raw payload of a tag object (the bytes after the `"tag <len>\0"` header).
    pub fn from_bytes(data: &[u8]) -> Result<Self, decode::Error> {
        let data = data.as_bstr();
        let mut lines = data.lines();
        let mut target = None;
        let mut target_kind = None;
        let mut name = None;
        let mut tagger = None;
        let mut extra_headers = Vec::new();

        let message_start;
        loop {
            let line = match lines.next() {
                Some(l) => l.as_bstr(),
                None => return Err(decode::Error::MissingHeaderTerminator),
            };
            if line.is_empty() {
                let start = line.as_ptr() as usize - data.as_ptr() as usize;
                message_start = (start + 1).min(data.len());
                break;
            }
            let (key, value) = match line.find_byte(b' ') {
                Some(pos) => (line[..pos].as_bstr(), line[pos + 1..].as_bstr()),
                None => (line, BStr::new(b"")),
            };
            match key.as_ref() {
                b"object" => {
                    target = Some(ObjectId::from_hex(value).map_err(|e| decode::Error::MissingOrInvalidObject(Some(e)))?)
                }
                b"type" => {
                    target_kind = Some(Kind::from_bytes(value).map_err(|e| decode::Error::MissingOrInvalidType(Some(e)))?)
                }
                b"tag" => name = Some(value.to_owned()),
                b"tagger" => tagger = Some(Signature::from_bytes(value).map_err(decode::Error::InvalidTagger)?),
                _ => extra_headers.push((key.to_owned(), value.to_owned())),
            }
        }

        Ok(Tag {
            target: target.ok_or(decode::Error::MissingOrInvalidObject(None))?,
            target_kind: target_kind.ok_or(decode::Error::MissingOrInvalidType(None))?,
            name: name.ok_or(decode::Error::MissingName)?,
            tagger,
            message: data[message_start..].to_owned(),
            extra_headers,
        })
    }

    /// Serialise back into `"object ...\ntype ...\ntag ...\n[tagger ...\n]\n<message>"`.
    pub fn write_to(&self, out: &mut Vec<u8>) {
        write_header(out, b"object", self.target.to_hex().as_bytes());
        write_header(out, b"type", self.target_kind.as_bytes());
        write_header(out, b"tag", &self.name);
        if let Some(tagger) = &self.tagger {
            out.extend_from_slice(b"tagger ");
            let _ = tagger.write_to(&mut *out);
            out.push(b'\n');
        }
        for (key, value) in &self.extra_headers {
            write_header(out, key, value);
        }
        out.push(b'\n');
        out.extend_from_slice(&self.message);
    }
}

fn write_header(out: &mut Vec<u8>, key: &[u8], value: &[u8]) {
    out.extend_from_slice(key);
    out.push(b' ');
    out.extend_from_slice(value);
    out.push(b'\n');
}
