use std::{cmp::Ordering, convert::TryFrom};

use crate::Kind;

/// An owned object id: a fixed-size byte buffer tagged with the [`Kind`] that determines how
/// many of its bytes are significant.
///
/// Unlike a bare `[u8; 32]`, an `ObjectId` can never be mistaken for the wrong hash family:
/// every comparison and parse goes through [`Kind`], so mixing SHA-1 and SHA-256 ids (explicitly
/// called out as an error condition in spec.md §3) is caught at the API boundary rather than
/// silently truncating or padding.
#[derive(Clone, Copy, Eq, Hash)]
#[cfg_attr(feature = "serde1", derive(serde::Serialize, serde::Deserialize))]
pub struct ObjectId {
    kind: Kind,
    /// Only the first `kind.len_in_bytes()` bytes are significant; the rest are always zero.
    bytes: [u8; 32],
}

impl ObjectId {
    /// An id of `kind` with all bytes set to zero, used as the placeholder "no previous value"
    /// in reflog lines and as the base buffer [`Prefix`] copies into.
    pub fn null(kind: Kind) -> Self {
        ObjectId {
            kind,
            bytes: [0; 32],
        }
    }

    /// Build an id directly from already-hashed bytes, without re-hashing. The caller must
    /// ensure `bytes.len() == kind.len_in_bytes()`.
    pub fn from_bytes_unchecked(kind: Kind, bytes: &[u8]) -> Self {
        let mut buf = [0u8; 32];
        buf[..bytes.len()].copy_from_slice(bytes);
        ObjectId { kind, bytes: buf }
    }

    /// Parse a raw byte slice of exactly `kind.len_in_bytes()` bytes.
    pub fn from_bytes(kind: Kind, bytes: &[u8]) -> Result<Self, FromBytesError> {
        if bytes.len() != kind.len_in_bytes() {
            return Err(FromBytesError {
                expected: kind.len_in_bytes(),
                actual: bytes.len(),
            });
        }
        Ok(Self::from_bytes_unchecked(kind, bytes))
    }

    /// Parse a hexadecimal string, inferring the [`Kind`] from its length (spec.md §3: 40 for
    /// SHA-1, 64 for SHA-256 — any other length is rejected).
    pub fn from_hex(hex: &[u8]) -> Result<Self, from_hex::Error> {
        let kind = Kind::from_hex_len(hex.len()).map_err(|_| from_hex::Error::InvalidLength(hex.len()))?;
        let mut decoded = [0u8; 32];
        hex::decode_to_slice(hex, &mut decoded[..kind.len_in_bytes()]).map_err(from_hex::Error::Invalid)?;
        Ok(ObjectId { kind, bytes: decoded })
    }

    /// The hash family this id belongs to.
    pub fn kind(&self) -> Kind {
        self.kind
    }

    /// The significant bytes of this id (`kind().len_in_bytes()` long).
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes[..self.kind.len_in_bytes()]
    }

    /// Mutable access to the significant bytes, used by [`Prefix`] construction.
    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        let len = self.kind.len_in_bytes();
        &mut self.bytes[..len]
    }

    /// `true` if every significant byte is zero, i.e. this is the placeholder "unborn" id used
    /// as the `oldOid` of a ref's first write.
    pub fn is_null(&self) -> bool {
        self.as_bytes().iter().all(|&b| b == 0)
    }

    /// Render as a full-length lowercase hex string.
    pub fn to_hex(&self) -> String {
        hex::encode(self.as_bytes())
    }

    /// Render only the first `len` hex characters, zero-padding semantics aside (used by
    /// [`Prefix::to_string`]).
    pub fn to_hex_with_len(&self, len: usize) -> String {
        let mut s = self.to_hex();
        s.truncate(len);
        s
    }
}

impl PartialEq for ObjectId {
    fn eq(&self, other: &Self) -> bool {
        self.kind == other.kind && self.as_bytes() == other.as_bytes()
    }
}

impl PartialOrd for ObjectId {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ObjectId {
    fn cmp(&self, other: &Self) -> Ordering {
        self.kind.cmp(&other.kind).then_with(|| self.as_bytes().cmp(other.as_bytes()))
    }
}

impl std::fmt::Debug for ObjectId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "ObjectId({})", self.to_hex())
    }
}

impl std::fmt::Display for ObjectId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl AsRef<ObjectId> for ObjectId {
    fn as_ref(&self) -> &ObjectId {
        self
    }
}

/// The error returned by [`ObjectId::from_bytes()`].
#[derive(Debug, thiserror::Error)]
#[error("expected {expected} raw hash bytes, got {actual}")]
pub struct FromBytesError {
    expected: usize,
    actual: usize,
}

/// Errors produced while parsing an [`ObjectId`] from hexadecimal.
pub mod from_hex {
    /// The error returned by [`super::ObjectId::from_hex()`].
    #[derive(Debug, thiserror::Error)]
    pub enum Error {
        /// The input's length doesn't match any known hash kind's hex length.
        #[error("{0} is not a valid hex object id length (expected 40 or 64)")]
        InvalidLength(usize),
        /// The input contained a non-hexadecimal character.
        #[error("invalid hex digit in object id: {0}")]
        Invalid(#[source] hex::FromHexError),
    }
}

const MIN_HEX_LEN: usize = 4;

/// Errors produced while constructing a [`Prefix`].
pub mod prefix {
    use quick_error::quick_error;

    quick_error! {
        /// The error returned by [`super::Prefix::new()`].
        #[derive(Debug, PartialEq, Eq)]
        #[allow(missing_docs)]
        pub enum Error {
            TooShort { hex_len: usize } {
                display("The minimum hex length of a short object id is {}, got {}", super::MIN_HEX_LEN, hex_len)
            }
            TooLong { object_kind: crate::Kind, hex_len: usize } {
                display("An object of kind {} cannot be larger than {} in hex, but {} was requested", object_kind, object_kind.len_in_hex(), hex_len)
            }
        }
    }

    ///
    pub mod from_hex {
        use quick_error::quick_error;
        quick_error! {
            /// The error returned by [`super::super::Prefix::from_hex()`].
            #[derive(Debug, PartialEq, Eq)]
            #[allow(missing_docs)]
            pub enum Error {
                TooShort { hex_len: usize } {
                    display("The minimum hex length of a short object id is {}, got {}", super::super::MIN_HEX_LEN, hex_len)
                }
                TooLong { hex_len: usize } {
                    display("An id cannot be larger than {} chars in hex, but {} was requested", crate::Kind::longest().len_in_hex(), hex_len)
                }
                Invalid { c: char, index: usize } {
                    display("Invalid character {} at position {}", c, index)
                }
            }
        }
    }
}

/// A truncated [`ObjectId`], as typed by a user or printed in a short log (`git log --oneline`).
///
/// The prefix is guaranteed to be sorted and compared the way git compares abbreviations: only
/// the first `hex_len()` nibbles participate, with all other bits zeroed, per spec.md §3.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct Prefix {
    bytes: ObjectId,
    hex_len: usize,
}

impl Prefix {
    /// Create a new instance by taking a full `id` as input and truncating it to `hex_len`.
    ///
    /// For instance, with `hex_len` of 7 the resulting prefix is 3.5 bytes, or 3 bytes and 4
    /// bits wide, with all other bytes and bits set to zero.
    pub fn new(id: impl AsRef<ObjectId>, hex_len: usize) -> Result<Self, prefix::Error> {
        let id = id.as_ref();
        if hex_len > id.kind().len_in_hex() {
            Err(prefix::Error::TooLong {
                object_kind: id.kind(),
                hex_len,
            })
        } else if hex_len < MIN_HEX_LEN {
            Err(prefix::Error::TooShort { hex_len })
        } else {
            let mut prefix = ObjectId::null(id.kind());
            let b = prefix.as_mut_slice();
            let copy_len = (hex_len + 1) / 2;
            b[..copy_len].copy_from_slice(&id.as_bytes()[..copy_len]);
            if hex_len % 2 == 1 {
                b[hex_len / 2] &= 0xf0;
            }
            Ok(Prefix { bytes: prefix, hex_len })
        }
    }

    /// Returns the prefix as an object id.
    ///
    /// Note that it may be deceptive to use given that it looks like a full object id, even
    /// though its post-prefix bytes/bits are set to zero.
    pub fn as_oid(&self) -> &ObjectId {
        &self.bytes
    }

    /// The amount of hexadecimal characters that are set in the prefix, with a granularity of 4
    /// bits.
    pub fn hex_len(&self) -> usize {
        self.hex_len
    }

    /// Compare this prefix against `candidate`, a full object id, looking only at the prefix
    /// bytes and ignoring everything past them.
    pub fn cmp_oid(&self, candidate: &ObjectId) -> Ordering {
        let common_len = self.hex_len / 2;
        self.bytes.as_bytes()[..common_len]
            .cmp(&candidate.as_bytes()[..common_len])
            .then(if self.hex_len % 2 == 1 {
                let half_byte_idx = self.hex_len / 2;
                self.bytes.as_bytes()[half_byte_idx].cmp(&(candidate.as_bytes()[half_byte_idx] & 0xf0))
            } else {
                Ordering::Equal
            })
    }

    /// Create an instance from the given hexadecimal prefix `value`, e.g. `35e77c16` would
    /// yield a `Prefix` with `hex_len()` == 8. The hash kind is inferred as the longest kind
    /// whose hex length is `>= value.len()`.
    pub fn from_hex(value: &str) -> Result<Self, prefix::from_hex::Error> {
        let hex_len = value.len();
        if hex_len > Kind::longest().len_in_hex() {
            return Err(prefix::from_hex::Error::TooLong { hex_len });
        } else if hex_len < MIN_HEX_LEN {
            return Err(prefix::from_hex::Error::TooShort { hex_len });
        }

        for (index, c) in value.chars().enumerate() {
            if !c.is_ascii_hexdigit() {
                return Err(prefix::from_hex::Error::Invalid { c, index });
            }
        }

        let padded_kind = [Kind::Sha1, Kind::Sha256]
            .into_iter()
            .find(|k| k.len_in_hex() >= hex_len)
            .unwrap_or(Kind::longest());

        let mut padded = value.to_owned();
        if padded.len() % 2 == 1 {
            padded.push('0');
        }
        while padded.len() < padded_kind.len_in_hex() {
            padded.push('0');
        }

        let mut bytes = ObjectId::null(padded_kind);
        hex::decode_to_slice(&padded, bytes.as_mut_slice()).expect("already validated as hex above");

        Ok(Prefix { bytes, hex_len })
    }
}

impl TryFrom<&str> for Prefix {
    type Error = prefix::from_hex::Error;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Prefix::from_hex(value)
    }
}

impl std::fmt::Display for Prefix {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.bytes.to_hex_with_len(self.hex_len).fmt(f)
    }
}

impl std::fmt::Debug for Prefix {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Prefix({})", self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_hex_roundtrips_sha1() {
        let hex = "94954abda49de8615a048f8d2e64b5de848e27a";
        let id = ObjectId::from_hex(hex.as_bytes()).unwrap();
        assert_eq!(id.kind(), Kind::Sha1);
        assert_eq!(id.to_hex(), hex);
    }

    #[test]
    fn from_hex_rejects_odd_lengths() {
        assert!(ObjectId::from_hex(b"abcd").is_err());
    }

    #[test]
    fn prefix_zeroes_the_half_nibble() {
        let full = ObjectId::from_hex(b"94954abda49de8615a048f8d2e64b5de848e27a").unwrap();
        let prefix = Prefix::new(full, 7).unwrap();
        assert_eq!(prefix.to_string(), "94954ab");
        assert_eq!(prefix.cmp_oid(&full), Ordering::Equal);
    }

    #[test]
    fn prefix_rejects_too_short_or_too_long() {
        let full = ObjectId::from_hex(b"94954abda49de8615a048f8d2e64b5de848e27a").unwrap();
        assert!(Prefix::new(full, 2).is_err());
        assert!(Prefix::new(full, 41).is_err());
    }
}
