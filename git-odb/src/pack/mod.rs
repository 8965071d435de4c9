//! Packfiles: `"PACK"<ver=2><count>` followed by `count` entries and a trailing hash
//! (spec.md §4.3, §9).

use std::{
    collections::HashMap,
    io::Read,
    path::{Path, PathBuf},
};

use git_hash::ObjectId;
use git_object::Kind;
use memmap2::Mmap;

pub mod delta;
pub mod index;

const SIGNATURE: &[u8; 4] = b"PACK";
const VERSION: u32 = 2;

/// The six packfile entry type tags (spec.md §4.3: "low 3 bits of first byte encode type").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum EntryKind {
    Commit,
    Tree,
    Blob,
    Tag,
    OfsDelta,
    RefDelta,
}

impl EntryKind {
    fn from_tag(tag: u8) -> Result<Self, Error> {
        Ok(match tag {
            1 => EntryKind::Commit,
            2 => EntryKind::Tree,
            3 => EntryKind::Blob,
            4 => EntryKind::Tag,
            6 => EntryKind::OfsDelta,
            7 => EntryKind::RefDelta,
            other => return Err(Error::UnknownEntryType(other)),
        })
    }
}

/// A memory-mapped `.pack` file paired with its `.idx`.
pub struct Bundle {
    data: Mmap,
    index: index::Index,
    hash_kind: git_hash::Kind,
}

/// The error returned by [`Bundle::open()`] and [`Bundle::find()`].
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The pack or index file couldn't be opened or memory-mapped.
    #[error("failed to open pack file at {path}")]
    Io {
        #[allow(missing_docs)]
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    /// The pack's `.idx` didn't parse.
    #[error(transparent)]
    Index(#[from] index::Error),
    /// The pack header's magic or version was unrecognised.
    #[error("pack file has an invalid or unsupported header")]
    InvalidHeader,
    /// An entry header's type tag wasn't one of the six known values.
    #[error("pack entry has unknown type tag {0}")]
    UnknownEntryType(u8),
    /// Inflating an entry's compressed payload failed.
    #[error("failed to inflate pack entry at offset {offset}")]
    Inflate {
        #[allow(missing_docs)]
        offset: u64,
        #[source]
        source: std::io::Error,
    },
    /// A ref-delta's base oid isn't present anywhere this pack (or the walked bases) can see.
    #[error("delta base {0} could not be resolved")]
    UnresolvedBase(ObjectId),
    /// An ofs-delta's negative offset pointed before the start of the pack.
    #[error("ofs-delta offset underflowed the start of the pack")]
    OfsDeltaUnderflow,
    /// Applying a delta against its resolved base failed.
    #[error(transparent)]
    Delta(#[from] delta::Error),
    /// The pack file was shorter than its header or an entry claimed.
    #[error("pack file is truncated")]
    Truncated,
}

impl Bundle {
    /// Memory-map `pack_path` and parse the sibling `.idx` (same stem, `.idx` extension).
    pub fn open(pack_path: impl AsRef<Path>, hash_kind: git_hash::Kind) -> Result<Self, Error> {
        let pack_path = pack_path.as_ref();
        let file = std::fs::File::open(pack_path).map_err(|source| Error::Io {
            path: pack_path.to_owned(),
            source,
        })?;
        let data = unsafe { Mmap::map(&file) }.map_err(|source| Error::Io {
            path: pack_path.to_owned(),
            source,
        })?;
        if data.len() < 12 || &data[0..4] != SIGNATURE || u32::from_be_bytes(data[4..8].try_into().unwrap()) != VERSION {
            return Err(Error::InvalidHeader);
        }

        let idx_path = pack_path.with_extension("idx");
        let idx_bytes = std::fs::read(&idx_path).map_err(|source| Error::Io { path: idx_path, source })?;
        let index = index::Index::from_bytes(&idx_bytes, hash_kind)?;

        Ok(Bundle { data, index, hash_kind })
    }

    /// The number of objects in this pack.
    pub fn len(&self) -> usize {
        self.index.len()
    }

    /// `true` if this pack contains no objects.
    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    /// `true` if `id` is indexed by this pack.
    pub fn contains(&self, id: &ObjectId) -> bool {
        self.index.find_offset(id).is_some()
    }

    /// Every oid this pack indexes, in sorted order.
    pub fn oids(&self) -> impl Iterator<Item = ObjectId> + '_ {
        self.index.iter().map(|(id, _, _)| id)
    }

    /// Resolve `id` to its type and fully-reconstructed bytes, applying delta chains against
    /// `find_base` for ref-deltas that point outside this pack (e.g. thin packs during fetch).
    /// Reconstructed bases are memoised per call to keep long delta chains linear (spec.md §4.3).
    pub fn find(&self, id: &ObjectId, find_base: &dyn Fn(&ObjectId) -> Option<(Kind, Vec<u8>)>) -> Result<Option<(Kind, Vec<u8>)>, Error> {
        let offset = match self.index.find_offset(id) {
            Some(o) => o,
            None => return Ok(None),
        };
        let mut cache = HashMap::new();
        Ok(Some(self.resolve_at(offset, find_base, &mut cache)?))
    }

    fn resolve_at(
        &self,
        offset: u64,
        find_base: &dyn Fn(&ObjectId) -> Option<(Kind, Vec<u8>)>,
        cache: &mut HashMap<u64, (Kind, Vec<u8>)>,
    ) -> Result<(Kind, Vec<u8>), Error> {
        if let Some(cached) = cache.get(&offset) {
            return Ok(cached.clone());
        }
        let (header, body_offset) = EntryHeader::parse(&self.data, offset)?;
        let result = match header.kind {
            EntryKind::Commit | EntryKind::Tree | EntryKind::Blob | EntryKind::Tag => {
                let data = inflate_entry(&self.data, body_offset, header.decompressed_size, offset)?;
                (header.simple_kind().expect("non-delta entry"), data)
            }
            EntryKind::OfsDelta => {
                let base_offset = offset.checked_sub(header.negative_offset.expect("ofs-delta carries an offset")).ok_or(Error::OfsDeltaUnderflow)?;
                let (base_kind, base_data) = self.resolve_at(base_offset, find_base, cache)?;
                let delta_bytes = inflate_entry(&self.data, body_offset, header.decompressed_size, offset)?;
                (base_kind, delta::apply(&base_data, &delta_bytes)?)
            }
            EntryKind::RefDelta => {
                let base_id = header.base_oid.clone().expect("ref-delta carries a base oid");
                let (base_kind, base_data) = match self.index.find_offset(&base_id) {
                    Some(base_offset) => self.resolve_at(base_offset, find_base, cache)?,
                    None => find_base(&base_id).ok_or_else(|| Error::UnresolvedBase(base_id.clone()))?,
                };
                let delta_bytes = inflate_entry(&self.data, body_offset, header.decompressed_size, offset)?;
                (base_kind, delta::apply(&base_data, &delta_bytes)?)
            }
        };
        cache.insert(offset, result.clone());
        Ok(result)
    }
}

struct EntryHeader {
    kind: EntryKind,
    decompressed_size: usize,
    negative_offset: Option<u64>,
    base_oid: Option<ObjectId>,
}

impl EntryHeader {
    fn simple_kind(&self) -> Option<Kind> {
        Some(match self.kind {
            EntryKind::Commit => Kind::Commit,
            EntryKind::Tree => Kind::Tree,
            EntryKind::Blob => Kind::Blob,
            EntryKind::Tag => Kind::Tag,
            _ => return None,
        })
    }

    fn parse(data: &[u8], offset: u64) -> Result<(Self, u64), Error> {
        let mut pos = offset as usize;
        let first = *data.get(pos).ok_or(Error::Truncated)?;
        pos += 1;
        let kind = EntryKind::from_tag((first >> 4) & 0b111)?;
        let mut size = (first & 0b1111) as usize;
        let mut shift = 4;
        let mut byte = first;
        while byte & 0x80 != 0 {
            byte = *data.get(pos).ok_or(Error::Truncated)?;
            pos += 1;
            size |= ((byte & 0x7f) as usize) << shift;
            shift += 7;
        }

        let mut negative_offset = None;
        let mut base_oid = None;
        match kind {
            EntryKind::OfsDelta => {
                let mut value = 0u64;
                loop {
                    let b = *data.get(pos).ok_or(Error::Truncated)?;
                    pos += 1;
                    value = (value << 7) | (b & 0x7f) as u64;
                    if b & 0x80 == 0 {
                        break;
                    }
                    value += 1;
                }
                negative_offset = Some(value);
            }
            EntryKind::RefDelta => {
                let bytes = data.get(pos..pos + 20).ok_or(Error::Truncated)?;
                base_oid = Some(ObjectId::from_bytes_unchecked(git_hash::Kind::Sha1, bytes));
                pos += 20;
            }
            _ => {}
        }

        Ok((
            EntryHeader {
                kind,
                decompressed_size: size,
                negative_offset,
                base_oid,
            },
            pos as u64,
        ))
    }
}

fn inflate_entry(data: &[u8], body_offset: u64, expected_size: usize, entry_offset: u64) -> Result<Vec<u8>, Error> {
    let mut out = Vec::with_capacity(expected_size);
    let mut decoder = flate2::read::ZlibDecoder::new(&data[body_offset as usize..]);
    decoder.read_to_end(&mut out).map_err(|source| Error::Inflate { offset: entry_offset, source })?;
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_entry(out: &mut Vec<u8>, tag: u8, payload: &[u8]) {
        let mut size = payload.len();
        let mut first = (tag << 4) | (size as u8 & 0b1111);
        size >>= 4;
        let mut bytes = vec![];
        while size > 0 {
            bytes.push(0x80 | (size as u8 & 0x7f));
            size >>= 7;
        }
        if !bytes.is_empty() {
            first |= 0x80;
        }
        out.push(first);
        out.extend(bytes);
        let mut encoder = flate2::write::ZlibEncoder::new(Vec::new(), flate2::Compression::default());
        encoder.write_all(payload).unwrap();
        out.extend(encoder.finish().unwrap());
    }

    #[test]
    fn entry_header_roundtrips_a_blob_size() {
        let mut raw = Vec::new();
        write_entry(&mut raw, 3, b"hello\n");
        let (header, body_offset) = EntryHeader::parse(&raw, 0).unwrap();
        assert_eq!(header.decompressed_size, 6);
        assert_eq!(header.simple_kind(), Some(Kind::Blob));
        let mut decoder = flate2::read::ZlibDecoder::new(&raw[body_offset as usize..]);
        let mut out = Vec::new();
        std::io::Read::read_to_end(&mut decoder, &mut out).unwrap();
        assert_eq!(out, b"hello\n");
    }
}
