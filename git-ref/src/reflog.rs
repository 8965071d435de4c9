//! Reflog lines: `"<old> <new> <who> <when>\t<message>\n"` (spec.md §4.1, §6).

use bstr::{BStr, BString, ByteSlice};
use git_actor::Signature;
use git_hash::ObjectId;

/// A single decoded reflog entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Line {
    /// The reference's value before this update.
    pub previous_oid: ObjectId,
    /// The reference's value after this update.
    pub new_oid: ObjectId,
    /// Who made the change and when.
    pub signature: Signature,
    /// The free-form update message (e.g. `"commit: add foo"`).
    pub message: BString,
}

/// The error returned by [`parse_line()`].
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The line didn't have the `<old> <new> <who>\t<message>` shape.
    #[error("reflog line is malformed: {0:?}")]
    Malformed(BString),
    /// One of the two oids wasn't valid hex.
    #[error(transparent)]
    Hash(#[from] git_hash::from_hex::Error),
    /// The `<who>` field wasn't a valid signature.
    #[error(transparent)]
    Signature(#[from] git_actor::Error),
}

/// Encode a single reflog line, ready to be appended to `logs/<ref>`.
pub fn encode_line(previous: &ObjectId, new: &ObjectId, signature: &Signature, message: &BStr) -> Vec<u8> {
    let mut out = Vec::new();
    out.extend_from_slice(previous.to_hex().as_bytes());
    out.push(b' ');
    out.extend_from_slice(new.to_hex().as_bytes());
    out.push(b' ');
    out.extend_from_slice(signature.to_string().as_bytes());
    out.push(b'\t');
    out.extend_from_slice(message);
    out.push(b'\n');
    out
}

/// Parse a single reflog line, without its trailing newline requirement (a missing one is
/// tolerated for the last line of a file not ending in `\n`).
pub fn parse_line(line: &BStr) -> Result<Line, Error> {
    let line = line.strip_suffix(b"\n").map(|s| s.as_bstr()).unwrap_or(line);

    let first_space = line.find_byte(b' ').ok_or_else(|| Error::Malformed(line.to_owned()))?;
    let previous_oid = ObjectId::from_hex(&line[..first_space])?;

    let after_prev = &line[first_space + 1..];
    let second_space = after_prev.find_byte(b' ').ok_or_else(|| Error::Malformed(line.to_owned()))?;
    let new_oid = ObjectId::from_hex(&after_prev[..second_space])?;

    let rest = &after_prev[second_space + 1..];
    let tab = rest.find_byte(b'\t').ok_or_else(|| Error::Malformed(line.to_owned()))?;
    let signature = Signature::from_bytes(&rest[..tab])?;
    let message = rest[tab + 1..].as_bstr().to_owned();

    Ok(Line {
        previous_oid,
        new_oid,
        signature,
        message,
    })
}

/// Parse every line of a reflog file's contents, in order.
pub fn parse_lines(data: &BStr) -> Result<Vec<Line>, Error> {
    data.lines().filter(|l| !l.is_empty()).map(|l| parse_line(l.as_bstr())).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use git_date::Time;

    fn oid(byte: u8) -> ObjectId {
        ObjectId::from_bytes_unchecked(git_hash::Kind::Sha1, &[byte; 20])
    }

    #[test]
    fn encodes_and_parses_a_line() {
        let sig = Signature {
            name: "Ann Example".into(),
            email: "ann@example.com".into(),
            time: Time {
                seconds_since_epoch: 1700000000,
                offset_in_minutes: 0,
            },
        };
        let encoded = encode_line(&oid(0), &oid(1), &sig, b"commit: add foo".as_bstr());
        let line = parse_line(encoded.as_bstr()).unwrap();
        assert_eq!(line.previous_oid, oid(0));
        assert_eq!(line.new_oid, oid(1));
        assert_eq!(line.message, "commit: add foo");
    }

    #[test]
    fn rejects_missing_fields() {
        assert!(parse_line(b"not a reflog line".as_bstr()).is_err());
    }
}
