//! The `.idx` v2 format: a 256-entry fanout table, sorted oids, crc32s, and offsets (spec.md
//! §4.3, §9 "objects/pack/pack-*.idx").

use git_hash::ObjectId;

const MAGIC: [u8; 4] = [0xff, b't', b'O', b'c'];
const VERSION: u32 = 2;
/// Offsets at or above this value are 31-bit indices into the large-offset table; the sentinel
/// bit itself must be masked off.
const LARGE_OFFSET_FLAG: u32 = 0x8000_0000;

/// A parsed `.idx` file: sorted oids with their crc32s and pack offsets.
#[derive(Debug)]
pub struct Index {
    fanout: [u32; 256],
    oids: Vec<u8>,
    crc32: Vec<u32>,
    offsets: Vec<u32>,
    large_offsets: Vec<u64>,
    hash_len: usize,
}

/// The error returned by [`Index::from_bytes()`].
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The file was too short to contain even the header and fanout table.
    #[error("pack index is truncated")]
    Truncated,
    /// The magic bytes or version weren't the ones this reader understands.
    #[error("unsupported or invalid pack index header")]
    UnsupportedVersion,
}

impl Index {
    /// Parse a `.idx` v2 file already read fully into memory.
    pub fn from_bytes(data: &[u8], hash_kind: git_hash::Kind) -> Result<Self, Error> {
        if data.len() < 8 + 256 * 4 {
            return Err(Error::Truncated);
        }
        if data[0..4] != MAGIC || u32::from_be_bytes(data[4..8].try_into().unwrap()) != VERSION {
            return Err(Error::UnsupportedVersion);
        }
        let mut fanout = [0u32; 256];
        for (i, chunk) in data[8..8 + 256 * 4].chunks_exact(4).enumerate() {
            fanout[i] = u32::from_be_bytes(chunk.try_into().unwrap());
        }
        let count = fanout[255] as usize;
        let hash_len = hash_kind.len_in_bytes();

        let mut cursor = 8 + 256 * 4;
        let oids_len = count * hash_len;
        let oids = data.get(cursor..cursor + oids_len).ok_or(Error::Truncated)?.to_vec();
        cursor += oids_len;

        let crc32_len = count * 4;
        let crc32 = data
            .get(cursor..cursor + crc32_len)
            .ok_or(Error::Truncated)?
            .chunks_exact(4)
            .map(|c| u32::from_be_bytes(c.try_into().unwrap()))
            .collect();
        cursor += crc32_len;

        let offsets_len = count * 4;
        let raw_offsets: Vec<u32> = data
            .get(cursor..cursor + offsets_len)
            .ok_or(Error::Truncated)?
            .chunks_exact(4)
            .map(|c| u32::from_be_bytes(c.try_into().unwrap()))
            .collect();
        cursor += offsets_len;

        let large_count = raw_offsets.iter().filter(|&&o| o & LARGE_OFFSET_FLAG != 0).count();
        let large_offsets = data
            .get(cursor..cursor + large_count * 8)
            .ok_or(Error::Truncated)?
            .chunks_exact(8)
            .map(|c| u64::from_be_bytes(c.try_into().unwrap()))
            .collect();

        Ok(Index {
            fanout,
            oids,
            crc32,
            offsets: raw_offsets,
            large_offsets,
            hash_len,
        })
    }

    /// The number of objects indexed.
    pub fn len(&self) -> usize {
        self.fanout[255] as usize
    }

    /// `true` if this index has no entries.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn oid_at(&self, i: usize) -> &[u8] {
        &self.oids[i * self.hash_len..(i + 1) * self.hash_len]
    }

    /// Binary search for `id`, returning its pack offset if present.
    pub fn find_offset(&self, id: &ObjectId) -> Option<u64> {
        let first_byte = id.as_bytes()[0] as usize;
        let lo = if first_byte == 0 { 0 } else { self.fanout[first_byte - 1] as usize };
        let hi = self.fanout[first_byte] as usize;
        let idx = (lo..hi).find(|&i| self.oid_at(i) == id.as_bytes())?;
        Some(self.offset_at(idx))
    }

    fn offset_at(&self, idx: usize) -> u64 {
        let raw = self.offsets[idx];
        if raw & LARGE_OFFSET_FLAG == 0 {
            raw as u64
        } else {
            self.large_offsets[(raw & !LARGE_OFFSET_FLAG) as usize]
        }
    }

    /// Iterate every `(oid, pack_offset, crc32)` triple, in oid-sorted order.
    pub fn iter(&self) -> impl Iterator<Item = (ObjectId, u64, u32)> + '_ {
        (0..self.len()).map(move |i| {
            let kind = if self.hash_len == 32 { git_hash::Kind::Sha256 } else { git_hash::Kind::Sha1 };
            (
                ObjectId::from_bytes_unchecked(kind, self.oid_at(i)),
                self.offset_at(i),
                self.crc32[i],
            )
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn build_idx(entries: &[(ObjectId, u32, u32)]) -> Vec<u8> {
        let mut sorted = entries.to_vec();
        sorted.sort_by(|a, b| a.0.as_bytes().cmp(b.0.as_bytes()));

        let mut fanout = [0u32; 256];
        for (id, _, _) in &sorted {
            let b = id.as_bytes()[0] as usize;
            for slot in fanout.iter_mut().skip(b) {
                *slot += 1;
            }
        }

        let mut out = Vec::new();
        out.extend_from_slice(&MAGIC);
        out.extend_from_slice(&VERSION.to_be_bytes());
        for f in fanout {
            out.extend_from_slice(&f.to_be_bytes());
        }
        for (id, _, _) in &sorted {
            out.extend_from_slice(id.as_bytes());
        }
        for (_, _, crc) in &sorted {
            out.extend_from_slice(&crc.to_be_bytes());
        }
        for (_, off, _) in &sorted {
            out.extend_from_slice(&off.to_be_bytes());
        }
        out
    }

    fn oid(byte: u8) -> ObjectId {
        ObjectId::from_bytes_unchecked(git_hash::Kind::Sha1, &[byte; 20])
    }

    #[test]
    fn finds_offsets_via_fanout_binary_search() {
        let entries = vec![(oid(1), 100, 0xaaaa), (oid(200), 200, 0xbbbb), (oid(50), 300, 0xcccc)];
        let bytes = build_idx(&entries);
        let idx = Index::from_bytes(&bytes, git_hash::Kind::Sha1).unwrap();
        assert_eq!(idx.len(), 3);
        assert_eq!(idx.find_offset(&oid(1)), Some(100));
        assert_eq!(idx.find_offset(&oid(200)), Some(200));
        assert_eq!(idx.find_offset(&oid(99)), None);
    }

    #[test]
    fn rejects_bad_magic() {
        let mut bytes = build_idx(&[(oid(1), 1, 1)]);
        bytes[0] = 0;
        assert!(matches!(Index::from_bytes(&bytes, git_hash::Kind::Sha1), Err(Error::UnsupportedVersion)));
    }
}
