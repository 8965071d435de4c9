//! Git's timestamp format: `<seconds since epoch> <tz offset>`, e.g. `1700000000 +0000`, used in
//! commit/tag headers (spec.md §3) and reflog lines (spec.md §6).

#![deny(missing_docs)]

/// A point in time as git serialises it: seconds since the Unix epoch in UTC, plus the
/// author/committer's local timezone offset in minutes (positive east of UTC).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde1", derive(serde::Serialize, serde::Deserialize))]
pub struct Time {
    /// Seconds since `1970-01-01T00:00:00Z`.
    pub seconds_since_epoch: u64,
    /// Offset from UTC in minutes; e.g. `-420` for `-0700`.
    pub offset_in_minutes: i32,
}

/// The error returned by [`Time::parse()`].
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The input wasn't `<digits> <sign><4 digits>`.
    #[error("expected '<seconds> <+-HHMM>', got {0:?}")]
    Malformed(bstr::BString),
}

impl Time {
    /// Parse a serialised commit/tag timestamp, e.g. `"1700000000 +0000"`.
    pub fn parse(input: &bstr::BStr) -> Result<Self, Error> {
        let input_str = std::str::from_utf8(input).map_err(|_| Error::Malformed(input.to_owned()))?;
        let mut parts = input_str.split(' ');
        let seconds = parts.next().ok_or_else(|| Error::Malformed(input.to_owned()))?;
        let tz = parts.next().ok_or_else(|| Error::Malformed(input.to_owned()))?;
        if parts.next().is_some() {
            return Err(Error::Malformed(input.to_owned()));
        }

        let seconds_since_epoch: u64 = seconds.parse().map_err(|_| Error::Malformed(input.to_owned()))?;
        let offset_in_minutes = parse_offset(tz).ok_or_else(|| Error::Malformed(input.to_owned()))?;
        Ok(Time {
            seconds_since_epoch,
            offset_in_minutes,
        })
    }

    /// Serialise back to git's `<seconds> <+-HHMM>` form.
    pub fn write_to(&self, out: &mut impl std::fmt::Write) -> std::fmt::Result {
        let sign = if self.offset_in_minutes < 0 { '-' } else { '+' };
        let abs = self.offset_in_minutes.unsigned_abs();
        write!(out, "{} {}{:02}{:02}", self.seconds_since_epoch, sign, abs / 60, abs % 60)
    }
}

fn parse_offset(tz: &str) -> Option<i32> {
    let (sign, digits) = match tz.as_bytes().first()? {
        b'+' => (1, &tz[1..]),
        b'-' => (-1, &tz[1..]),
        _ => return None,
    };
    if digits.len() != 4 || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let hours: i32 = digits[0..2].parse().ok()?;
    let minutes: i32 = digits[2..4].parse().ok()?;
    Some(sign * (hours * 60 + minutes))
}

impl std::fmt::Display for Time {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.write_to(f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bstr::BStr;

    #[test]
    fn roundtrips_utc() {
        let t = Time::parse(BStr::new(b"1700000000 +0000")).unwrap();
        assert_eq!(t.seconds_since_epoch, 1700000000);
        assert_eq!(t.offset_in_minutes, 0);
        assert_eq!(t.to_string(), "1700000000 +0000");
    }

    #[test]
    fn roundtrips_negative_offset() {
        let t = Time::parse(BStr::new(b"1700000000 -0700")).unwrap();
        assert_eq!(t.offset_in_minutes, -420);
        assert_eq!(t.to_string(), "1700000000 -0700");
    }

    #[test]
    fn rejects_malformed_input() {
        assert!(Time::parse(BStr::new(b"not-a-time")).is_err());
        assert!(Time::parse(BStr::new(b"123 BOGUS")).is_err());
    }
}
