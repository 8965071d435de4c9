//! The git object model: the `{Blob | Tree | Commit | Tag}` sum type from spec.md §3, its
//! `"<type> <len>\0<payload>"` framing, and per-type encode/decode.
//!
//! This crate only knows how to turn bytes into typed objects and back; reading/writing them to
//! storage (loose or packed) is `git-odb`'s job, one layer up.

#![deny(missing_docs)]

mod framing;
pub mod kind;

pub mod blob;
pub mod commit;
pub mod tag;
pub mod tree;

pub use bstr;
pub use framing::{decode_header, encode, hash, Error as FramingError};
pub use kind::Kind;

pub use blob::Blob;
pub use commit::Commit;
pub use tag::Tag;
pub use tree::Tree;

/// The decoded payload of a git object, tagged by its [`Kind`].
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde1", derive(serde::Serialize, serde::Deserialize))]
pub enum Object {
    /// Opaque file content.
    Blob(Blob),
    /// A directory listing.
    Tree(Tree),
    /// A snapshot of the project, pointing at a tree and 0..N parent commits.
    Commit(Commit),
    /// An annotated tag, pointing at any other object.
    Tag(Tag),
}

/// Errors produced decoding any of the four object kinds.
#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    /// The payload was structurally invalid for its claimed kind.
    #[error(transparent)]
    Tree(#[from] tree::decode::Error),
    /// See [`tree::decode::Error`].
    #[error(transparent)]
    Commit(#[from] commit::decode::Error),
    /// See [`tree::decode::Error`].
    #[error(transparent)]
    Tag(#[from] tag::decode::Error),
}

impl Object {
    /// The kind of this object.
    pub fn kind(&self) -> Kind {
        match self {
            Object::Blob(_) => Kind::Blob,
            Object::Tree(_) => Kind::Tree,
            Object::Commit(_) => Kind::Commit,
            Object::Tag(_) => Kind::Tag,
        }
    }

    /// Decode `data` as an object of the given `kind`. `data` must be the payload *after* the
    /// `"<type> <len>\0"` header has already been stripped.
    pub fn from_bytes(kind: Kind, data: &[u8]) -> Result<Self, DecodeError> {
        Ok(match kind {
            Kind::Blob => Object::Blob(Blob { data: data.to_vec() }),
            Kind::Tree => Object::Tree(Tree::from_bytes(data)?),
            Kind::Commit => Object::Commit(Commit::from_bytes(data)?),
            Kind::Tag => Object::Tag(Tag::from_bytes(data)?),
        })
    }

    /// Serialise the payload (without the `"<type> <len>\0"` header) into `out`.
    pub fn write_to(&self, out: &mut Vec<u8>) {
        match self {
            Object::Blob(b) => out.extend_from_slice(&b.data),
            Object::Tree(t) => t.write_to(out),
            Object::Commit(c) => c.write_to(out),
            Object::Tag(t) => t.write_to(out),
        }
    }

    /// Serialise the payload to a freshly allocated buffer.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::new();
        self.write_to(&mut out);
        out
    }
}

impl From<Blob> for Object {
    fn from(v: Blob) -> Self {
        Object::Blob(v)
    }
}
impl From<Tree> for Object {
    fn from(v: Tree) -> Self {
        Object::Tree(v)
    }
}
impl From<Commit> for Object {
    fn from(v: Commit) -> Self {
        Object::Commit(v)
    }
}
impl From<Tag> for Object {
    fn from(v: Tag) -> Self {
        Object::Tag(v)
    }
}
