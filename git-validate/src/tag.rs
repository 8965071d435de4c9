///
pub mod name {
    use bstr::BStr;
    use quick_error::quick_error;

    quick_error! {
        /// The error used in [`name()`].
        #[derive(Debug, PartialEq, Eq)]
        #[allow(missing_docs)]
        pub enum Error {
            Empty {
                display("Names must not be empty")
            }
            StartsWithDot {
                display("Names must not start with a '.'")
            }
            EndsWithSlash {
                display("Names must not end with a '/'")
            }
            EndsWithDotLock {
                display("Names must not end with '.lock'")
            }
            EndsWithDot {
                display("Names must not end with a '.'")
            }
            Control { byte: u8 } {
                display("Control character {} is not allowed", byte)
            }
            Space {
                display("Names must not contain a space")
            }
            DoubleDot {
                display("Names must not contain '..'")
            }
            Tilde {
                display("Names must not contain '~'")
            }
            Caret {
                display("Names must not contain '^'")
            }
            Colon {
                display("Names must not contain ':'")
            }
            QuestionMarkAsteriskOrBracket {
                display("Names must not contain '?', '*', or '['")
            }
            Backslash {
                display("Names must not contain '\\'")
            }
        }
    }
}

/// Validate a tag name (and, by extension, the innermost component of a reference name) against
/// the subset of `git check-ref-format` rules this crate enforces.
pub fn name(path: &bstr::BStr) -> Result<&bstr::BStr, name::Error> {
    use bstr::ByteSlice;
    use name::Error;

    if path.is_empty() {
        return Err(Error::Empty);
    }
    if path.starts_with(b".") {
        return Err(Error::StartsWithDot);
    }
    if path.ends_with(b"/") {
        return Err(Error::EndsWithSlash);
    }
    if path.ends_with(b".lock") {
        return Err(Error::EndsWithDotLock);
    }
    if path.ends_with(b".") {
        return Err(Error::EndsWithDot);
    }
    if path.contains_str("..") {
        return Err(Error::DoubleDot);
    }
    for &byte in path.iter() {
        match byte {
            0..=31 | 127 => return Err(Error::Control { byte }),
            b' ' => return Err(Error::Space),
            b'~' => return Err(Error::Tilde),
            b'^' => return Err(Error::Caret),
            b':' => return Err(Error::Colon),
            b'?' | b'*' | b'[' => return Err(Error::QuestionMarkAsteriskOrBracket),
            b'\\' => return Err(Error::Backslash),
            _ => {}
        }
    }
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use bstr::BStr;

    #[test]
    fn accepts_reasonable_names() {
        assert!(name(BStr::new(b"v1.0.0")).is_ok());
        assert!(name(BStr::new(b"main")).is_ok());
    }

    #[test]
    fn rejects_known_bad_patterns() {
        assert_eq!(name(BStr::new(b"")), Err(name::Error::Empty));
        assert_eq!(name(BStr::new(b".hidden")), Err(name::Error::StartsWithDot));
        assert_eq!(name(BStr::new(b"a..b")), Err(name::Error::DoubleDot));
        assert_eq!(name(BStr::new(b"a b")), Err(name::Error::Space));
        assert_eq!(name(BStr::new(b"a~b")), Err(name::Error::Tilde));
        assert_eq!(name(BStr::new(b"a.lock")), Err(name::Error::EndsWithDotLock));
    }
}
