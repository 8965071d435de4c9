//! The ini-ish syntax: `[section "subsection"]` headers followed by `key = value` lines,
//! `#`/`;` comments, and line continuations via a trailing `\`, per spec.md §6.

use bstr::{BStr, BString, ByteSlice};
use nom::{
    bytes::complete::take_while,
    character::complete::char,
    combinator::{map, rest, verify},
    sequence::terminated,
};

/// A single `key = value` (or bare boolean `key`) entry within a section.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    /// The key, lowercased (git config keys are case-insensitive).
    pub key: BString,
    /// The de-quoted, unescaped value; `None` for a bare key (implicit `true`).
    pub value: Option<BString>,
}

/// One `[section]` or `[section "subsection"]` block and the entries under it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Section {
    /// The section name, lowercased.
    pub name: BString,
    /// The subsection name exactly as written (subsection names are case-sensitive), or `None`.
    pub subsection: Option<BString>,
    /// The entries in the order they appeared.
    pub entries: Vec<Entry>,
}

impl Section {
    /// `true` if this section matches `name` and `subsection` (case-insensitively on `name`).
    pub fn matches(&self, name: &str, subsection: Option<&str>) -> bool {
        self.name.eq_ignore_ascii_case(name.as_bytes())
            && self.subsection.as_deref().map(|s| s.as_bytes()) == subsection.map(str::as_bytes)
    }
}

/// The error returned by [`parse()`].
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A `[` was never closed with a matching `]`.
    #[error("unterminated section header on line {line}")]
    UnterminatedSection {
        #[allow(missing_docs)]
        line: usize,
    },
    /// A section header was empty, or had content after its closing `]`.
    #[error("malformed section header on line {line}")]
    MalformedSectionHeader {
        #[allow(missing_docs)]
        line: usize,
    },
    /// A key=value line appeared before any `[section]` header.
    #[error("entry on line {line} has no enclosing section")]
    EntryOutsideSection {
        #[allow(missing_docs)]
        line: usize,
    },
}

/// Parse a whole config file's contents into its sections, in file order.
///
/// A UTF-8 BOM, if present, is stripped first (git's own parser tolerates one).
pub fn parse(input: &[u8]) -> Result<Vec<Section>, Error> {
    let input = strip_bom(input);
    let mut sections = Vec::new();
    let mut current: Option<Section> = None;
    let mut line_no = 0usize;

    for raw_line in join_continuations(input) {
        line_no += 1;
        let line = trim_comment(raw_line.as_bstr()).trim().as_bstr();
        if line.is_empty() {
            continue;
        }
        if line.first() == Some(&b'[') {
            let (name, subsection) = parse_header(line, line_no)?;
            if let Some(section) = current.take() {
                sections.push(section);
            }
            current = Some(Section {
                name,
                subsection,
                entries: Vec::new(),
            });
        } else {
            let section = current.as_mut().ok_or(Error::EntryOutsideSection { line: line_no })?;
            section.entries.push(parse_entry(line));
        }
    }
    if let Some(section) = current.take() {
        sections.push(section);
    }
    Ok(sections)
}

fn strip_bom(input: &[u8]) -> &[u8] {
    match unicode_bom::Bom::from(input) {
        unicode_bom::Bom::Utf8 => &input[3..],
        _ => input,
    }
}

/// Join `line \` continuations into single logical lines, each returned without its newline.
///
/// Lines are split on raw `\n` bytes via [`memchr`], rather than a `Vec`-allocating
/// [`bstr::ByteSlice::split_str`], since a config file's line count can run into the thousands.
fn join_continuations(input: &[u8]) -> Vec<BString> {
    let mut out = Vec::new();
    let mut pending = BString::from(Vec::new());
    let mut rest = input;
    loop {
        let (line, more_remain) = match memchr::memchr(b'\n', rest) {
            Some(pos) => {
                let line = &rest[..pos];
                rest = &rest[pos + 1..];
                (line, true)
            }
            None => (rest, false),
        };
        let line = line.strip_suffix(b"\r").unwrap_or(line);
        match line.strip_suffix(b"\\") {
            Some(stripped) => pending.extend_from_slice(stripped),
            None => {
                pending.extend_from_slice(line);
                out.push(std::mem::take(&mut pending));
            }
        }
        if !more_remain {
            break;
        }
    }
    if !pending.is_empty() {
        out.push(pending);
    }
    out
}

/// Strip a trailing `#` or `;` comment, respecting double-quoted values (a `#` inside quotes
/// isn't a comment start).
fn trim_comment(line: &BStr) -> &BStr {
    let mut in_quotes = false;
    let mut escaped = false;
    for (i, &b) in line.iter().enumerate() {
        if escaped {
            escaped = false;
            continue;
        }
        match b {
            b'\\' if in_quotes => escaped = true,
            b'"' => in_quotes = !in_quotes,
            b'#' | b';' if !in_quotes => return line[..i].as_bstr(),
            _ => {}
        }
    }
    line
}

/// A `"..."`-quoted subsection: both surrounding quotes present, the rest kept raw (unescaping
/// happens later, in [`crate::values::normalize_bytes`]).
fn quoted_subsection(input: &[u8]) -> nom::IResult<&[u8], &[u8]> {
    map(verify(rest, |r: &[u8]| r.len() >= 2 && r.first() == Some(&b'"') && r.last() == Some(&b'"')), |r: &[u8]| {
        &r[1..r.len() - 1]
    })(input)
}

fn parse_header(line: &BStr, line_no: usize) -> Result<(BString, Option<BString>), Error> {
    if line.last() != Some(&b']') {
        return Err(Error::UnterminatedSection { line: line_no });
    }
    let inner: &[u8] = &line[1..line.len() - 1];
    if inner.is_empty() {
        return Err(Error::MalformedSectionHeader { line: line_no });
    }

    let (after_name, name) = take_while::<_, _, nom::error::Error<&[u8]>>(|b: u8| b != b' ')(inner).expect("take_while never fails");
    if after_name.is_empty() {
        return Ok((name.as_bstr().trim().as_bstr().to_owned(), None));
    }
    let (_, subsection) =
        quoted_subsection(&after_name[1..]).map_err(|_: nom::Err<nom::error::Error<&[u8]>>| Error::MalformedSectionHeader { line: line_no })?;
    let subsection = crate::values::normalize_bytes(subsection).into_owned();
    Ok((name.as_bstr().trim().as_bstr().to_owned(), Some(BString::from(subsection))))
}

/// Split `key = value` on the first unquoted `=`, leaving a bare key as `(key, None)`.
fn split_key_value(input: &[u8]) -> Option<(&[u8], &[u8])> {
    let result: nom::IResult<&[u8], &[u8]> = terminated(take_while(|b: u8| b != b'='), char('='))(input);
    result.ok().map(|(value, key)| (key, value))
}

fn parse_entry(line: &BStr) -> Entry {
    match split_key_value(line) {
        None => Entry {
            key: line.trim().as_bstr().to_owned(),
            value: None,
        },
        Some((key, raw_value)) => {
            let key = key.as_bstr().trim().as_bstr().to_owned();
            let raw_value = raw_value.as_bstr().trim();
            let value = crate::values::normalize_bytes(raw_value).into_owned();
            Entry {
                key,
                value: Some(BString::from(value)),
            }
        }
    }
}

/// Serialise `sections` back into git-config text, one blank line between sections.
pub fn serialize(sections: &[Section]) -> Vec<u8> {
    let mut out = Vec::new();
    for (i, section) in sections.iter().enumerate() {
        if i > 0 {
            out.push(b'\n');
        }
        out.push(b'[');
        out.extend_from_slice(&section.name);
        if let Some(sub) = &section.subsection {
            out.push(b' ');
            out.push(b'"');
            for &b in sub.iter() {
                if b == b'"' || b == b'\\' {
                    out.push(b'\\');
                }
                out.push(b);
            }
            out.push(b'"');
        }
        out.extend_from_slice(b"]\n");
        for entry in &section.entries {
            out.extend_from_slice(b"\t");
            out.extend_from_slice(&entry.key);
            if let Some(value) = &entry.value {
                out.extend_from_slice(b" = ");
                out.extend_from_slice(value);
            }
            out.push(b'\n');
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_sections_and_subsections() {
        let text = b"[core]\n\tbare = true\n[remote \"origin\"]\n\turl = https://example/repo.git\n";
        let sections = parse(text).unwrap();
        assert_eq!(sections.len(), 2);
        assert!(sections[0].matches("core", None));
        assert_eq!(sections[0].entries[0].value.as_deref(), Some(b"true".as_bstr()));
        assert!(sections[1].matches("remote", Some("origin")));
    }

    #[test]
    fn bare_key_has_no_value() {
        let sections = parse(b"[core]\n\tbare\n").unwrap();
        assert_eq!(sections[0].entries[0].value, None);
    }

    #[test]
    fn comment_after_hash_is_ignored_but_quoted_hash_is_kept() {
        let sections = parse(b"[core]\n\teditor = vi # comment\n\tmsg = \"a # b\"\n").unwrap();
        assert_eq!(sections[0].entries[0].value.as_deref(), Some(b"vi".as_bstr()));
        assert_eq!(sections[0].entries[1].value.as_deref(), Some(b"a # b".as_bstr()));
    }

    #[test]
    fn entry_outside_any_section_is_rejected() {
        assert!(matches!(parse(b"bare = 1\n"), Err(Error::EntryOutsideSection { line: 1 })));
    }

    #[test]
    fn parse_then_serialize_then_parse_round_trips() {
        let text = b"[core]\n\tbare = true\n\n[remote \"origin\"]\n\turl = https://example/repo.git\n";
        let once = parse(text).unwrap();
        let twice = parse(&serialize(&once)).unwrap();
        assert_eq!(once, twice);
    }
}
