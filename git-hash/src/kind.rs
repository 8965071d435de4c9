use quick_error::quick_error;

/// The hash family a repository was initialised with (spec.md §3:
/// `core.repositoryformatversion` + `extensions.objectformat`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde1", derive(serde::Serialize, serde::Deserialize))]
pub enum Kind {
    /// 20-byte SHA-1, the only format supported by `core.repositoryformatversion = 0`.
    Sha1,
    /// 32-byte SHA-256, gated behind `core.repositoryformatversion = 1` and
    /// `extensions.objectformat = sha256`.
    Sha256,
}

quick_error! {
    /// The error returned when a hex length doesn't correspond to any known hash kind.
    #[derive(Debug, PartialEq, Eq)]
    pub enum UnknownLengthError {
        Hex(len: usize) {
            display("{} is not a valid hex length for any known hash kind", len)
        }
        Bytes(len: usize) {
            display("{} is not a valid byte length for any known hash kind", len)
        }
    }
}

impl Kind {
    /// The longest hash kind known, currently [`Kind::Sha256`]. Useful for sizing fixed buffers.
    pub const fn longest() -> Self {
        Kind::Sha256
    }

    /// The raw byte length of a hash of this kind (20 for SHA-1, 32 for SHA-256).
    pub const fn len_in_bytes(&self) -> usize {
        match self {
            Kind::Sha1 => 20,
            Kind::Sha256 => 32,
        }
    }

    /// The hexadecimal string length of a hash of this kind (40 for SHA-1, 64 for SHA-256).
    pub const fn len_in_hex(&self) -> usize {
        self.len_in_bytes() * 2
    }

    /// Look up the hash kind whose raw byte length is `len`, if any.
    pub fn from_bytes_len(len: usize) -> Result<Self, UnknownLengthError> {
        match len {
            20 => Ok(Kind::Sha1),
            32 => Ok(Kind::Sha256),
            other => Err(UnknownLengthError::Bytes(other)),
        }
    }

    /// Look up the hash kind whose hex string length is `len`, if any.
    pub fn from_hex_len(len: usize) -> Result<Self, UnknownLengthError> {
        match len {
            40 => Ok(Kind::Sha1),
            64 => Ok(Kind::Sha256),
            other => Err(UnknownLengthError::Hex(other)),
        }
    }
}

impl std::fmt::Display for Kind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Kind::Sha1 => "SHA1",
            Kind::Sha256 => "SHA256",
        })
    }
}
