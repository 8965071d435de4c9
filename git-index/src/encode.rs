//! Serialising entries back to `DIRC` version 2 (spec.md §4.4 "`writeIndex` serialises entries
//! in `(path, stage)` order, recomputes the trailing hash").

use crate::decode::padding_after;
use crate::entry::Entry;

const SIGNATURE: &[u8; 4] = b"DIRC";
const VERSION: u32 = 2;

/// Serialise `entries`, which MUST already be sorted by `(path, stage)`, into a complete `DIRC`
/// v2 file, trailing hash included.
pub fn to_bytes(entries: &[Entry], hash_kind: git_hash::Kind) -> Vec<u8> {
    let mut out = Vec::new();
    out.extend_from_slice(SIGNATURE);
    out.extend_from_slice(&VERSION.to_be_bytes());
    out.extend_from_slice(&(entries.len() as u32).to_be_bytes());

    for entry in entries {
        let start = out.len();
        out.extend_from_slice(&entry.ctime.secs.to_be_bytes());
        out.extend_from_slice(&entry.ctime.nsecs.to_be_bytes());
        out.extend_from_slice(&entry.mtime.secs.to_be_bytes());
        out.extend_from_slice(&entry.mtime.nsecs.to_be_bytes());
        out.extend_from_slice(&entry.dev.to_be_bytes());
        out.extend_from_slice(&entry.ino.to_be_bytes());
        out.extend_from_slice(&entry.mode.value().to_be_bytes());
        out.extend_from_slice(&entry.uid.to_be_bytes());
        out.extend_from_slice(&entry.gid.to_be_bytes());
        out.extend_from_slice(&entry.size.to_be_bytes());
        out.extend_from_slice(entry.oid.as_bytes());

        let name_len = entry.path.len();
        let name_len_field = name_len.min(0x0fff) as u16;
        let mut flags = name_len_field | (entry.stage.to_bits() << 12);
        if entry.assume_valid {
            flags |= 0x8000;
        }
        out.extend_from_slice(&flags.to_be_bytes());

        out.extend_from_slice(&entry.path);
        let entry_len = out.len() - start;
        out.resize(start + entry_len + padding_after(entry_len), 0);
    }

    let hash = git_hash::hasher::hash(hash_kind, &out);
    out.extend_from_slice(hash.as_bytes());
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entry::{Stage, Time};
    use bstr::BString;
    use git_hash::ObjectId;
    use git_object::tree::EntryMode;

    #[test]
    fn pads_short_and_long_names_to_a_multiple_of_eight() {
        let entry = Entry {
            ctime: Time::default(),
            mtime: Time::default(),
            dev: 0,
            ino: 0,
            mode: EntryMode::Blob,
            uid: 0,
            gid: 0,
            size: 0,
            oid: ObjectId::null(git_hash::Kind::Sha1),
            stage: Stage::Clean,
            assume_valid: false,
            path: BString::from("a"),
        };
        let bytes = to_bytes(&[entry], git_hash::Kind::Sha1);
        // header (12) + fixed entry (62) + path (1) + padding, all before the 20-byte trailer.
        assert_eq!((bytes.len() - 20 - 12) % 8, 0);
    }
}
