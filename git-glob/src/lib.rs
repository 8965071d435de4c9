//! `.gitignore`-style pattern matching.
//!
//! Used by the checkout planner's `sparsePatterns` filter (spec.md §4.5) and by `status`'s
//! ignored-path classification (spec.md §4.6, the `"I"` status letter).

#![deny(missing_docs)]

use bitflags::bitflags;
use bstr::{BStr, ByteSlice};

bitflags! {
    /// Flags describing a single parsed pattern line.
    pub struct Mode: u8 {
        /// The pattern matches directories only (trailing `/` in the source line).
        const MUST_BE_DIR = 1 << 0;
        /// The pattern is negated (`!pattern`): a later match un-ignores an earlier one.
        const NEGATIVE = 1 << 1;
        /// The pattern is anchored to the directory it was declared in (contains a `/`
        /// anywhere but at the end), rather than matching at any depth.
        const NO_SUB_DIR = 1 << 2;
    }
}

/// A single compiled ignore/sparse pattern, as it would appear as one line of a
/// `.gitignore` or sparse-checkout file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pattern {
    /// The pattern text with leading `!`, trailing `/`, and escaping resolved away.
    pub text: bstr::BString,
    mode: Mode,
}

impl Pattern {
    /// Parse a single pattern line. Returns `None` for blank lines and comments (`#...`),
    /// matching git's own `.gitignore` line-skipping rules.
    pub fn from_line(line: &BStr) -> Option<Self> {
        let mut line = line.trim_end_with(|c| c == '\n' || c == '\r');
        if line.is_empty() || line.starts_with(b"#") {
            return None;
        }

        let mut mode = Mode::empty();
        if let Some(rest) = line.strip_prefix(b"!") {
            mode |= Mode::NEGATIVE;
            line = rest.as_bstr();
        }
        // `\!` and `\#` escape a literal leading bang/hash.
        let text = if line.starts_with(b"\\!") || line.starts_with(b"\\#") {
            &line[1..]
        } else {
            line
        };

        let mut text = text.to_owned();
        if text.ends_with(b"/") {
            mode |= Mode::MUST_BE_DIR;
            text.pop();
        }
        if text.is_empty() {
            return None;
        }
        if text.find_byte(b'/').map_or(false, |pos| pos + 1 != text.len()) {
            mode |= Mode::NO_SUB_DIR;
        }

        Some(Pattern { text, mode })
    }

    /// Whether this pattern negates a previous match.
    pub fn is_negative(&self) -> bool {
        self.mode.contains(Mode::NEGATIVE)
    }

    /// Match `relative_path` (a `/`-separated path relative to the pattern's root) against this
    /// pattern. `is_dir` allows directory-only patterns to be rejected against plain files.
    pub fn matches(&self, relative_path: &BStr, is_dir: bool) -> bool {
        if self.mode.contains(Mode::MUST_BE_DIR) && !is_dir {
            return false;
        }
        if self.mode.contains(Mode::NO_SUB_DIR) {
            glob_match(self.text.as_bstr(), relative_path)
        } else {
            // Unanchored: try matching the pattern against the full path and against every
            // path suffix that starts right after a `/`, mirroring git's basename-matching rule
            // for single-component patterns like `*.o`.
            if glob_match(self.text.as_bstr(), relative_path) {
                return true;
            }
            let mut rest = relative_path;
            while let Some(pos) = rest.find_byte(b'/') {
                rest = rest[pos + 1..].as_bstr();
                if glob_match(self.text.as_bstr(), rest) {
                    return true;
                }
            }
            false
        }
    }
}

/// An ordered set of patterns, evaluated last-match-wins as git does for `.gitignore` stacks
/// and sparse-checkout cone/non-cone pattern lists.
#[derive(Debug, Clone, Default)]
pub struct PatternList {
    patterns: Vec<Pattern>,
}

impl PatternList {
    /// Parse one pattern per non-empty, non-comment line of `content`.
    pub fn from_bytes(content: &[u8]) -> Self {
        let patterns = content.lines().filter_map(|line| Pattern::from_line(line.as_bstr())).collect();
        PatternList { patterns }
    }

    /// Whether `relative_path` is matched (included, for sparse patterns; ignored, for
    /// `.gitignore`) by this list. Later patterns override earlier ones; a `!`-prefixed pattern
    /// un-matches a path matched by an earlier rule.
    pub fn is_match(&self, relative_path: &BStr, is_dir: bool) -> bool {
        let mut matched = false;
        for pattern in &self.patterns {
            if pattern.matches(relative_path, is_dir) {
                matched = !pattern.is_negative();
            }
        }
        matched
    }
}

/// Match a single glob `pattern` (supporting `*`, `?`, `[...]`, and `**` as a path-spanning
/// wildcard) against `path`, both given as single `/`-joined strings.
fn glob_match(pattern: &BStr, path: &BStr) -> bool {
    fn inner(p: &[u8], s: &[u8]) -> bool {
        match p.first() {
            None => s.is_empty(),
            Some(b'*') if p.get(1) == Some(&b'*') => {
                // `**` spans any number of path components, including zero.
                let rest = &p[2..];
                let rest = if rest.first() == Some(&b'/') { &rest[1..] } else { rest };
                inner(rest, s) || (!s.is_empty() && inner(p, &s[1..]))
            }
            Some(b'*') => {
                let p = &p[1..];
                if inner(p, s) {
                    return true;
                }
                for i in 0..s.len() {
                    if s[i] == b'/' {
                        break;
                    }
                    if inner(p, &s[i + 1..]) {
                        return true;
                    }
                }
                false
            }
            Some(b'?') => !s.is_empty() && s[0] != b'/' && inner(&p[1..], &s[1..]),
            Some(b'[') => {
                let close = match p.iter().position(|&b| b == b']') {
                    Some(pos) if pos > 1 => pos,
                    _ => return !s.is_empty() && s[0] == p[0] && inner(&p[1..], &s[1..]),
                };
                if s.is_empty() || s[0] == b'/' {
                    return false;
                }
                let (class, rest) = (&p[1..close], &p[close + 1..]);
                let (negate, class) = match class.first() {
                    Some(b'!') | Some(b'^') => (true, &class[1..]),
                    _ => (false, class),
                };
                let hit = class_matches(class, s[0]);
                if hit != negate {
                    inner(rest, &s[1..])
                } else {
                    false
                }
            }
            Some(&c) => !s.is_empty() && s[0] == c && inner(&p[1..], &s[1..]),
        }
    }
    inner(pattern.as_bytes(), path.as_bytes())
}

fn class_matches(class: &[u8], byte: u8) -> bool {
    let mut i = 0;
    while i < class.len() {
        if i + 2 < class.len() && class[i + 1] == b'-' {
            if class[i] <= byte && byte <= class[i + 2] {
                return true;
            }
            i += 3;
        } else {
            if class[i] == byte {
                return true;
            }
            i += 1;
        }
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn simple_star_matches_within_a_component() {
        assert!(glob_match(BStr::new(b"*.txt"), BStr::new(b"a.txt")));
        assert!(!glob_match(BStr::new(b"*.txt"), BStr::new(b"dir/a.txt")));
    }

    #[test]
    fn anchored_pattern_requires_full_path() {
        let p = Pattern::from_line(BStr::new(b"/build")).unwrap();
        assert!(p.matches(BStr::new(b"build"), true));
        assert!(!p.matches(BStr::new(b"sub/build"), true));
    }

    #[test]
    fn unanchored_single_component_matches_any_depth() {
        let p = Pattern::from_line(BStr::new(b"*.o")).unwrap();
        assert!(p.matches(BStr::new(b"main.o"), false));
        assert!(p.matches(BStr::new(b"src/main.o"), false));
    }

    #[test]
    fn negation_overrides_an_earlier_match() {
        let list = PatternList::from_bytes(b"*.log\n!keep.log\n");
        assert!(list.is_match(BStr::new(b"debug.log"), false));
        assert!(!list.is_match(BStr::new(b"keep.log"), false));
    }

    #[test]
    fn directory_only_pattern_skips_files() {
        let p = Pattern::from_line(BStr::new(b"build/")).unwrap();
        assert!(p.matches(BStr::new(b"build"), true));
        assert!(!p.matches(BStr::new(b"build"), false));
    }

    #[test]
    fn comments_and_blank_lines_are_skipped() {
        assert!(Pattern::from_line(BStr::new(b"# comment")).is_none());
        assert!(Pattern::from_line(BStr::new(b"")).is_none());
    }
}
