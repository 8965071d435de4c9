//! Rust containers for the handful of typed values spec.md's config table cares about: booleans,
//! integers with a `k`/`m`/`g` suffix, and filesystem paths.

use std::{borrow::Cow, convert::TryFrom, fmt::Display};

use bstr::ByteSlice;

/// The error returned by the `TryFrom` impls in this module.
#[derive(Debug, thiserror::Error)]
#[error("{message}: {:?}", .input)]
pub struct Error {
    message: &'static str,
    input: Vec<u8>,
}

fn err(message: &'static str, input: impl Into<Vec<u8>>) -> Error {
    Error {
        message,
        input: input.into(),
    }
}

/// Strip one layer of double-quoting and unescape `\"`, `\\`, `\n`, `\t` and `\b`, the same
/// escapes git's own config parser recognises inside a quoted value.
#[must_use]
pub fn normalize_cow(input: Cow<'_, [u8]>) -> Cow<'_, [u8]> {
    if !input.contains(&b'"') && !input.contains(&b'\\') {
        return input;
    }
    let mut out = Vec::with_capacity(input.len());
    let mut chars = input.iter().copied().peekable();
    while let Some(c) = chars.next() {
        match c {
            b'"' => continue,
            b'\\' => match chars.next() {
                Some(b'"') => out.push(b'"'),
                Some(b'\\') => out.push(b'\\'),
                Some(b'n') => out.push(b'\n'),
                Some(b't') => out.push(b'\t'),
                Some(b'b') => out.push(0x08),
                Some(other) => out.push(other),
                None => {}
            },
            other => out.push(other),
        }
    }
    Cow::Owned(out)
}

/// `&[u8]` variant of [`normalize_cow()`].
#[must_use]
pub fn normalize_bytes(input: &[u8]) -> Cow<'_, [u8]> {
    normalize_cow(Cow::Borrowed(input))
}

/// A value that parses as one of the boolean spellings git's config accepts:
/// `yes`/`on`/`true`/`1` for true, `no`/`off`/`false`/`0`/`""` for false, case-insensitively. A
/// bare key with no `=` (handled one layer up, in [`crate::File`]) is also true.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Boolean(pub bool);

impl Boolean {
    /// Unwrap to a plain `bool`.
    pub fn to_bool(self) -> bool {
        self.0
    }
}

impl TryFrom<&[u8]> for Boolean {
    type Error = Error;

    fn try_from(value: &[u8]) -> Result<Self, Self::Error> {
        if value.eq_ignore_ascii_case(b"yes")
            || value.eq_ignore_ascii_case(b"on")
            || value.eq_ignore_ascii_case(b"true")
            || value == b"1"
        {
            Ok(Boolean(true))
        } else if value.eq_ignore_ascii_case(b"no")
            || value.eq_ignore_ascii_case(b"off")
            || value.eq_ignore_ascii_case(b"false")
            || value == b"0"
            || value.is_empty()
        {
            Ok(Boolean(false))
        } else {
            Err(err("not a valid boolean ('yes'/'no' and friends)", value))
        }
    }
}

impl Display for Boolean {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(if self.0 { "true" } else { "false" })
    }
}

/// An integer, optionally followed by a `k`/`m`/`g` (case-insensitive) binary-unit suffix.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Integer {
    /// The value, without any suffix multiplier applied.
    pub value: i64,
    /// The parsed suffix, if any.
    pub suffix: Option<IntegerSuffix>,
}

impl Integer {
    /// The value with its suffix multiplier applied, or `None` on overflow.
    pub fn to_decimal(&self) -> Option<i64> {
        match self.suffix {
            None => Some(self.value),
            Some(IntegerSuffix::Kibi) => self.value.checked_mul(1024),
            Some(IntegerSuffix::Mebi) => self.value.checked_mul(1024 * 1024),
            Some(IntegerSuffix::Gibi) => self.value.checked_mul(1024 * 1024 * 1024),
        }
    }
}

/// The binary-unit suffixes git's config integers accept.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IntegerSuffix {
    #[allow(missing_docs)]
    Kibi,
    #[allow(missing_docs)]
    Mebi,
    #[allow(missing_docs)]
    Gibi,
}

impl TryFrom<&[u8]> for Integer {
    type Error = Error;

    fn try_from(s: &[u8]) -> Result<Self, Self::Error> {
        let text = s.to_str().map_err(|_| err("integer value is not UTF-8", s))?;
        if let Ok(value) = text.parse() {
            return Ok(Integer { value, suffix: None });
        }
        if text.len() <= 1 {
            return Err(err("not a valid integer", s));
        }
        let (number, suffix) = text.split_at(text.len() - 1);
        let suffix = match suffix {
            "k" | "K" => IntegerSuffix::Kibi,
            "m" | "M" => IntegerSuffix::Mebi,
            "g" | "G" => IntegerSuffix::Gibi,
            _ => return Err(err("not a valid integer", s)),
        };
        let value = number.parse().map_err(|_| err("not a valid integer", s))?;
        Ok(Integer { value, suffix: Some(suffix) })
    }
}

impl Display for Integer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.value)?;
        match self.suffix {
            Some(IntegerSuffix::Kibi) => f.write_str("k"),
            Some(IntegerSuffix::Mebi) => f.write_str("m"),
            Some(IntegerSuffix::Gibi) => f.write_str("g"),
            None => Ok(()),
        }
    }
}

/// Filesystem-path interpolation, the subset spec.md's config discovery actually needs:
/// `~/` expands to the current user's home directory. `%(prefix)/` expansion (gitoxide's
/// relocatable-install support) has no equivalent concept here and is not supported.
pub mod path {
    /// The error returned by [`interpolate()`].
    #[derive(Debug, thiserror::Error)]
    pub enum Error {
        /// `~/`-prefixed path but no home directory could be determined.
        #[error("failed to determine the current user's home directory")]
        NoHome,
        /// The path portion wasn't representable in this platform's native path encoding.
        #[error(transparent)]
        Path(#[from] git_path::Error),
    }

    /// Expand a leading `~/` in `value` to the current user's home directory; every other value
    /// is returned unchanged (after POSIX-to-native separator conversion).
    pub fn interpolate(value: &bstr::BStr) -> Result<std::path::PathBuf, Error> {
        use bstr::ByteSlice;
        if let Some(rest) = value.strip_prefix(b"~/") {
            let home = dirs::home_dir().ok_or(Error::NoHome)?;
            Ok(home.join(git_path::to_native_path(rest.as_bstr())?))
        } else {
            Ok(git_path::to_native_path(value)?)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn boolean_accepts_common_spellings() {
        assert_eq!(Boolean::try_from(&b"Yes"[..]).unwrap().to_bool(), true);
        assert_eq!(Boolean::try_from(&b"0"[..]).unwrap().to_bool(), false);
        assert!(Boolean::try_from(&b"maybe"[..]).is_err());
    }

    #[test]
    fn integer_applies_binary_suffix() {
        let i = Integer::try_from(&b"2k"[..]).unwrap();
        assert_eq!(i.to_decimal(), Some(2048));
    }

    #[test]
    fn normalize_cow_strips_quotes_and_unescapes() {
        let got = normalize_bytes(br#""hello \"world\"""#);
        assert_eq!(&*got, &b"hello \"world\""[..]);
    }
}
