//! Object identifiers (OIDs) and the hash families git objects may use.
//!
//! Per spec.md §3, the repository's hash family is fixed at initialisation (SHA-1, 20 bytes/40
//! hex chars, or SHA-256, 32 bytes/64 hex chars) and every [`ObjectId`] carries its [`Kind`] so
//! that mixing hash families is a type-level impossibility rather than a runtime footgun.

#![deny(missing_docs)]

mod kind;
mod owned;

pub use kind::Kind;
pub use owned::{from_hex, prefix, ObjectId, Prefix};

/// Hashing helpers built on the active [`Kind`].
pub mod hasher {
    use super::{Kind, ObjectId};

    /// Hash `bytes` with the hash family `kind`, returning the resulting [`ObjectId`].
    pub fn hash(kind: Kind, bytes: &[u8]) -> ObjectId {
        match kind {
            Kind::Sha1 => {
                let mut h = sha1_smol::Sha1::new();
                h.update(bytes);
                ObjectId::from_bytes_unchecked(Kind::Sha1, &h.digest().bytes())
            }
            Kind::Sha256 => {
                use sha2::{Digest, Sha256};
                let mut h = Sha256::new();
                h.update(bytes);
                ObjectId::from_bytes_unchecked(Kind::Sha256, &h.finalize())
            }
        }
    }

    /// An incremental hasher over the active [`Kind`], for hashing framed object bytes or index
    /// contents without buffering the whole payload (e.g. the index trailer hash, spec.md §3).
    pub enum Hasher {
        #[allow(missing_docs)]
        Sha1(sha1_smol::Sha1),
        #[allow(missing_docs)]
        Sha256(Box<sha2::Sha256>),
    }

    impl Hasher {
        /// Start a new incremental hash of the given kind.
        pub fn new(kind: Kind) -> Self {
            match kind {
                Kind::Sha1 => Hasher::Sha1(sha1_smol::Sha1::new()),
                Kind::Sha256 => {
                    use sha2::Digest;
                    Hasher::Sha256(Box::new(sha2::Sha256::new()))
                }
            }
        }

        /// Feed more bytes into the hash.
        pub fn update(&mut self, bytes: &[u8]) {
            match self {
                Hasher::Sha1(h) => h.update(bytes),
                Hasher::Sha256(h) => {
                    use sha2::Digest;
                    h.update(bytes);
                }
            }
        }

        /// Finish hashing and return the resulting id.
        pub fn finish(self) -> ObjectId {
            match self {
                Hasher::Sha1(h) => ObjectId::from_bytes_unchecked(Kind::Sha1, &h.digest().bytes()),
                Hasher::Sha256(h) => {
                    use sha2::Digest;
                    ObjectId::from_bytes_unchecked(Kind::Sha256, &h.finalize())
                }
            }
        }
    }
}
