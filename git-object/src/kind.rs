/// The four object types git knows about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde1", derive(serde::Serialize, serde::Deserialize))]
pub enum Kind {
    /// Opaque file content.
    Blob,
    /// A directory listing.
    Tree,
    /// A snapshot of the project.
    Commit,
    /// An annotated tag.
    Tag,
}

/// The error returned when a type name in an object header isn't one of the four known kinds.
#[derive(Debug, thiserror::Error)]
#[error("{0:?} is not a valid object type name")]
pub struct UnknownKindError(pub Vec<u8>);

impl Kind {
    /// The lowercase ASCII name as it appears in the object header, e.g. `b"commit"`.
    pub const fn as_bytes(&self) -> &'static [u8] {
        match self {
            Kind::Blob => b"blob",
            Kind::Tree => b"tree",
            Kind::Commit => b"commit",
            Kind::Tag => b"tag",
        }
    }

    /// Parse the type name from an object header.
    pub fn from_bytes(name: &[u8]) -> Result<Self, UnknownKindError> {
        Ok(match name {
            b"blob" => Kind::Blob,
            b"tree" => Kind::Tree,
            b"commit" => Kind::Commit,
            b"tag" => Kind::Tag,
            other => return Err(UnknownKindError(other.to_vec())),
        })
    }
}

impl std::fmt::Display for Kind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(std::str::from_utf8(self.as_bytes()).expect("ascii"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roundtrips_every_kind() {
        for kind in [Kind::Blob, Kind::Tree, Kind::Commit, Kind::Tag] {
            assert_eq!(Kind::from_bytes(kind.as_bytes()).unwrap(), kind);
        }
    }

    #[test]
    fn rejects_unknown_names() {
        assert!(Kind::from_bytes(b"bogus").is_err());
    }
}
