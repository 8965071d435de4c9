//! Validated reference names (spec.md §3: refs are paths like `refs/heads/main` or `HEAD`).

use bstr::{BStr, BString, ByteSlice};

/// An owned, validated reference name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FullName(BString);

/// A borrowed, validated reference name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FullNameRef<'a>(&'a BStr);

impl FullName {
    /// Validate `name` against the rules in spec.md §8 testable property 9 and wrap it.
    pub fn try_from(name: impl Into<BString>) -> Result<Self, git_validate::reference::name::Error> {
        let name = name.into();
        git_validate::name(name.as_bstr())?;
        Ok(FullName(name))
    }

    /// Wrap `name` without validating it; used when a name is already known-good (e.g. it was
    /// just read back from a file this store itself wrote).
    pub fn new_unchecked(name: impl Into<BString>) -> Self {
        FullName(name.into())
    }

    /// Borrow as a [`FullNameRef`].
    pub fn as_ref(&self) -> FullNameRef<'_> {
        FullNameRef(self.0.as_bstr())
    }

    /// The raw bytes, e.g. `b"refs/heads/main"`.
    pub fn as_bstr(&self) -> &BStr {
        self.0.as_bstr()
    }
}

impl<'a> FullNameRef<'a> {
    /// Wrap `name` without validating it.
    pub fn new_unchecked(name: &'a BStr) -> Self {
        FullNameRef(name)
    }

    /// The raw bytes.
    pub fn as_bstr(&self) -> &'a BStr {
        self.0
    }

    /// `true` if this name is `refs/heads/<anything>`.
    pub fn is_branch(&self) -> bool {
        self.0.starts_with(b"refs/heads/")
    }

    /// `true` if this name is `refs/tags/<anything>`.
    pub fn is_tag(&self) -> bool {
        self.0.starts_with(b"refs/tags/")
    }

    /// `true` if this is the worktree-scoped `HEAD` pseudo-ref.
    pub fn is_head(&self) -> bool {
        self.0 == BStr::new(b"HEAD")
    }

    /// Clone into an owned [`FullName`].
    pub fn to_owned(&self) -> FullName {
        FullName(self.0.to_owned())
    }
}

impl std::fmt::Display for FullName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl<'a> std::fmt::Display for FullNameRef<'a> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_head_and_qualified_names() {
        assert!(FullName::try_from("HEAD").is_ok());
        assert!(FullName::try_from("refs/heads/main").is_ok());
    }

    #[test]
    fn rejects_unqualified_lowercase_names() {
        assert!(FullName::try_from("main").is_err());
    }

    #[test]
    fn classifies_branch_and_tag_refs() {
        let name = FullName::try_from("refs/heads/main").unwrap();
        assert!(name.as_ref().is_branch());
        assert!(!name.as_ref().is_tag());
    }
}
