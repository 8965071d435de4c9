//! Path conversions between `bstr` byte strings (how git stores paths, tree entry names, and
//! index entry paths) and native [`std::path::Path`]s, plus the POSIX joining rules git uses
//! for tree entries and index paths (spec.md §3: "Path uses `/` separator, no trailing `/`").

#![deny(missing_docs)]

use std::path::{Path, PathBuf};

use bstr::{BStr, BString, ByteSlice};

/// An error converting between byte strings and native paths.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The path contained bytes that aren't valid in this platform's native path encoding.
    #[error("path is not valid UTF-8 on this platform: {0:?}")]
    IllformedUtf8(BString),
}

/// Convert a POSIX-style, `/`-separated git path into a native [`PathBuf`].
///
/// On Unix this is a zero-cost reinterpretation of the bytes. On Windows, `/` is translated to
/// `\` since git always stores `/` internally regardless of platform (spec.md §3).
pub fn to_native_path(git_path: &BStr) -> Result<PathBuf, Error> {
    #[cfg(unix)]
    {
        use std::os::unix::ffi::OsStrExt;
        Ok(PathBuf::from(std::ffi::OsStr::from_bytes(git_path)))
    }
    #[cfg(not(unix))]
    {
        let s = git_path.to_str().map_err(|_| Error::IllformedUtf8(git_path.to_owned()))?;
        Ok(PathBuf::from(s.replace('/', std::path::MAIN_SEPARATOR_STR)))
    }
}

/// Convert a native path into git's `/`-separated, `BString` representation.
pub fn into_bstr(path: &Path) -> Result<BString, Error> {
    #[cfg(unix)]
    {
        use std::os::unix::ffi::OsStrExt;
        Ok(BString::from(path.as_os_str().as_bytes()))
    }
    #[cfg(not(unix))]
    {
        let s = path.to_str().ok_or_else(|| Error::IllformedUtf8(BString::from(path.to_string_lossy().as_bytes())))?;
        Ok(BString::from(s.replace(std::path::MAIN_SEPARATOR, "/")))
    }
}

/// Join a POSIX-style parent and child component with `/`, as used when recursively expanding
/// tree entries into full paths (spec.md §4.5).
pub fn join(parent: &BStr, child: &BStr) -> BString {
    if parent.is_empty() {
        return child.to_owned();
    }
    let mut out = BString::from(parent.to_vec());
    out.push(b'/');
    out.extend_from_slice(child);
    out
}

/// Split the last `/`-separated component off of `path`, returning `(directory, basename)`.
/// `directory` is empty if `path` has no separator.
pub fn split_basename(path: &BStr) -> (&BStr, &BStr) {
    match path.rfind_byte(b'/') {
        Some(pos) => (path[..pos].as_bstr(), path[pos + 1..].as_bstr()),
        None => (BStr::new(b""), path),
    }
}

/// `true` if `path` is a normalized git path: no leading or trailing `/`, and no `//`,
/// `/./`, or `/../` component, per spec.md §3's index-entry path invariant.
pub fn is_normalized(path: &BStr) -> bool {
    if path.is_empty() || path.first() == Some(&b'/') || path.last() == Some(&b'/') {
        return false;
    }
    path.split_str("/").all(|component| !component.is_empty() && component != b"." && component != b"..")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn join_handles_empty_parent() {
        assert_eq!(join(BStr::new(b""), BStr::new(b"a.txt")), BString::from("a.txt"));
        assert_eq!(join(BStr::new(b"dir"), BStr::new(b"a.txt")), BString::from("dir/a.txt"));
    }

    #[test]
    fn split_basename_without_separator() {
        let (dir, base) = split_basename(BStr::new(b"a.txt"));
        assert_eq!(dir, BStr::new(b""));
        assert_eq!(base, BStr::new(b"a.txt"));
    }

    #[test]
    fn normalized_rejects_dot_segments_and_edges() {
        assert!(is_normalized(BStr::new(b"a/b/c.txt")));
        assert!(!is_normalized(BStr::new(b"/a")));
        assert!(!is_normalized(BStr::new(b"a/")));
        assert!(!is_normalized(BStr::new(b"a//b")));
        assert!(!is_normalized(BStr::new(b"a/../b")));
    }
}
