//! Parsing `DIRC` version 2 (spec.md §3, §4.4 "`readIndex` parses `DIRC`+v2, validates the
//! trailing hash").

use bstr::BString;
use git_hash::ObjectId;
use git_object::tree::EntryMode;

use crate::entry::{Entry, Stage, Time};

const SIGNATURE: &[u8; 4] = b"DIRC";
const SUPPORTED_VERSION: u32 = 2;

const FLAG_ASSUME_VALID: u16 = 0x8000;
const FLAG_EXTENDED: u16 = 0x4000;
const FLAG_STAGE_MASK: u16 = 0x3000;
const FLAG_STAGE_SHIFT: u32 = 12;
const FLAG_NAME_LEN_MASK: u16 = 0x0fff;
const NAME_LEN_OVERFLOW: u16 = 0x0fff;

/// The error returned by [`crate::State::from_bytes()`].
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Fewer bytes than the 12-byte header require.
    #[error("index is truncated")]
    Truncated,
    /// The first four bytes weren't `"DIRC"`.
    #[error("index has an invalid signature")]
    InvalidSignature,
    /// The version field wasn't `2`; this reader only implements version 2.
    #[error("unsupported index version {version}")]
    UnsupportedVersion {
        #[allow(missing_docs)]
        version: u32,
    },
    /// An entry declared the (version-3-only) extended flag bit.
    #[error("index entry at offset {offset} uses unsupported extended flags")]
    ExtendedFlagsUnsupported {
        #[allow(missing_docs)]
        offset: usize,
    },
    /// An entry's fixed-size header or variable-length path ran past the end of the buffer.
    #[error("index entry at offset {offset} is truncated")]
    TruncatedEntry {
        #[allow(missing_docs)]
        offset: usize,
    },
    /// An entry's mode field wasn't one `git_object::tree::EntryMode` recognises.
    #[error("index entry for {path:?} has an invalid mode")]
    InvalidMode {
        #[allow(missing_docs)]
        path: BString,
    },
    /// The trailer's hash didn't match the hash of everything before it.
    #[error("index trailing hash does not match its content")]
    HashMismatch,
}

fn read_u32(data: &[u8], offset: usize) -> Result<u32, Error> {
    data.get(offset..offset + 4)
        .map(|b| u32::from_be_bytes(b.try_into().unwrap()))
        .ok_or(Error::Truncated)
}

fn read_u16(data: &[u8], offset: usize) -> Result<u16, Error> {
    data.get(offset..offset + 2)
        .map(|b| u16::from_be_bytes(b.try_into().unwrap()))
        .ok_or(Error::Truncated)
}

/// The fixed-size portion of one entry, before its variable-length path: five `{secs, nsecs}` /
/// scalar fields (ctime, mtime, dev, ino, mode, uid, gid, size) at 4 bytes each, then the oid,
/// then the 2-byte flags word.
fn fixed_entry_len(hash_len: usize) -> usize {
    4 * 10 + hash_len + 2
}

/// Parse the `DIRC` header, every entry, and validate the trailing hash.
pub fn from_bytes(data: &[u8], hash_kind: git_hash::Kind) -> Result<Vec<Entry>, Error> {
    if data.len() < 12 {
        return Err(Error::Truncated);
    }
    if &data[0..4] != SIGNATURE {
        return Err(Error::InvalidSignature);
    }
    let version = read_u32(data, 4)?;
    if version != SUPPORTED_VERSION {
        return Err(Error::UnsupportedVersion { version });
    }
    let entry_count = read_u32(data, 8)? as usize;

    let hash_len = hash_kind.len_in_bytes();
    if data.len() < hash_len {
        return Err(Error::Truncated);
    }
    let (body, trailer) = data.split_at(data.len() - hash_len);
    let expected = git_hash::hasher::hash(hash_kind, body);
    if expected.as_bytes() != trailer {
        return Err(Error::HashMismatch);
    }

    let fixed_len = fixed_entry_len(hash_len);
    let mut offset = 12;
    let mut entries = Vec::with_capacity(entry_count);
    for _ in 0..entry_count {
        let start = offset;
        if body.len() < offset + fixed_len {
            return Err(Error::TruncatedEntry { offset: start });
        }

        let ctime = Time {
            secs: read_u32(body, offset)?,
            nsecs: read_u32(body, offset + 4)?,
        };
        let mtime = Time {
            secs: read_u32(body, offset + 8)?,
            nsecs: read_u32(body, offset + 12)?,
        };
        let dev = read_u32(body, offset + 16)?;
        let ino = read_u32(body, offset + 20)?;
        let mode_value = read_u32(body, offset + 24)?;
        let uid = read_u32(body, offset + 28)?;
        let gid = read_u32(body, offset + 32)?;
        let size = read_u32(body, offset + 36)?;
        let oid = ObjectId::from_bytes_unchecked(hash_kind, &body[offset + 40..offset + 40 + hash_len]);
        let flags = read_u16(body, offset + 40 + hash_len)?;

        if flags & FLAG_EXTENDED != 0 {
            return Err(Error::ExtendedFlagsUnsupported { offset: start });
        }
        let stage = Stage::from_bits((flags & FLAG_STAGE_MASK) >> FLAG_STAGE_SHIFT);
        let assume_valid = flags & FLAG_ASSUME_VALID != 0;
        let declared_name_len = (flags & FLAG_NAME_LEN_MASK) as usize;

        let name_start = offset + fixed_len;
        let name_len = if flags & FLAG_NAME_LEN_MASK == NAME_LEN_OVERFLOW {
            body[name_start..]
                .iter()
                .position(|&b| b == 0)
                .ok_or(Error::TruncatedEntry { offset: start })?
        } else {
            declared_name_len
        };
        let name_end = name_start
            .checked_add(name_len)
            .ok_or(Error::TruncatedEntry { offset: start })?;
        let path_bytes = body.get(name_start..name_end).ok_or(Error::TruncatedEntry { offset: start })?;
        let path = BString::from(path_bytes);

        let mode = EntryMode::from_value(mode_value).ok_or(Error::InvalidMode { path: path.clone() })?;

        let unpadded_len = fixed_len + name_len;
        let padded_len = unpadded_len + padding_after(unpadded_len);
        offset = start + padded_len;

        entries.push(Entry {
            ctime,
            mtime,
            dev,
            ino,
            mode,
            uid,
            gid,
            size,
            oid,
            stage,
            assume_valid,
            path,
        });
    }

    Ok(entries)
}

/// Git pads each entry so its total on-disk length (fixed part + path) is a multiple of 8,
/// always including at least one NUL terminator byte.
pub(crate) fn padding_after(unpadded_len: usize) -> usize {
    let remainder = unpadded_len % 8;
    8 - remainder
}
