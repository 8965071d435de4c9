//! The `author`/`committer`/`tagger` signature that appears in commit and tag headers
//! (spec.md §3: `{name, email, timestamp_seconds, tz_offset_minutes}`).

#![deny(missing_docs)]

use bstr::{BStr, BString, ByteSlice};
use git_date::Time;

/// A person identified by name and email, together with the point in time they acted.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde1", derive(serde::Serialize, serde::Deserialize))]
pub struct Signature {
    /// The person's display name, e.g. `"Ann Example"`.
    pub name: BString,
    /// The person's email, without angle brackets, e.g. `"ann@example.com"`.
    pub email: BString,
    /// When the action was taken.
    pub time: Time,
}

quick_error::quick_error! {
    /// The error returned by [`Signature::from_bytes()`].
    #[derive(Debug)]
    #[allow(missing_docs)]
    pub enum Error {
        Malformed(line: BString) {
            display("not a valid 'name <email> timestamp tz' line: {:?}", line)
        }
        Time(err: git_date::Error) {
            display("invalid timestamp in signature")
            from()
            source(err)
        }
    }
}

fn name_email_rest(input: &[u8]) -> nom::IResult<&[u8], (&[u8], &[u8], &[u8])> {
    use nom::{
        bytes::complete::take_until,
        character::complete::{char, space0},
        combinator::rest,
        sequence::{delimited, preceded, tuple},
    };
    tuple((take_until("<"), delimited(char('<'), take_until(">"), char('>')), preceded(space0, rest)))(input)
}

impl Signature {
    /// Parse a header value of the form `"<name> <<email>> <seconds> <+-HHMM>"`, as it appears
    /// after the `author`/`committer`/`tagger` keyword in a commit or tag object.
    pub fn from_bytes(line: &[u8]) -> Result<Self, Error> {
        let line = line.as_bstr();
        let (_, (name, email, rest)) = name_email_rest(line).map_err(|_| Error::Malformed(line.to_owned()))?;

        let name = name.as_bstr().trim_end().to_owned();
        let email = email.as_bstr().to_owned();
        let time = Time::parse(rest.as_bstr().trim_start().as_bstr())?;

        Ok(Signature {
            name: name.into(),
            email: email.into(),
            time,
        })
    }

    /// Serialise back to the `"<name> <<email>> <seconds> <+-HHMM>"` form.
    pub fn write_to(&self, mut out: impl std::io::Write) -> std::io::Result<()> {
        let mut time = String::new();
        use std::fmt::Write as _;
        let _ = time.write_fmt(format_args!("{}", self.time));
        write!(out, "{} <{}> {}", self.name, self.email, time)
    }
}

impl std::fmt::Display for Signature {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} <{}> {}", self.name, self.email, self.time)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_a_well_formed_line() {
        let sig = Signature::from_bytes(b"Ann Example <ann@example.com> 1700000000 +0000").unwrap();
        assert_eq!(sig.name, "Ann Example");
        assert_eq!(sig.email, "ann@example.com");
        assert_eq!(sig.time.seconds_since_epoch, 1700000000);
    }

    #[test]
    fn roundtrips_through_display() {
        let sig = Signature::from_bytes(b"Ann Example <ann@example.com> 1700000000 -0500").unwrap();
        assert_eq!(sig.to_string(), "Ann Example <ann@example.com> 1700000000 -0500");
    }

    #[test]
    fn rejects_missing_angle_brackets() {
        assert!(Signature::from_bytes(b"Ann Example ann@example.com 1700000000 +0000").is_err());
    }
}
