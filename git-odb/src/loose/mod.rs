//! Loose objects: one zlib-deflated, framed object per file at `objects/<xx>/<rest>`
//! (spec.md §3, §4.1).

use std::{
    io::Read,
    path::{Path, PathBuf},
};

use git_hash::ObjectId;
use git_object::Kind;

pub mod write;

/// A loose object database rooted at a repository's `objects/` directory.
#[derive(Debug, Clone)]
pub struct Db {
    path: PathBuf,
}

/// The error returned by [`Db::try_find()`].
#[derive(Debug, thiserror::Error)]
pub enum FindError {
    /// The object file could not be read.
    #[error("failed to read loose object at {path}")]
    Io {
        #[allow(missing_docs)]
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    /// The object's zlib stream was corrupt.
    #[error("failed to inflate loose object at {path}")]
    Inflate {
        #[allow(missing_docs)]
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    /// The inflated bytes didn't start with a valid `"<type> <len>\0"` header.
    #[error(transparent)]
    Header(#[from] git_object::FramingError),
}

impl Db {
    /// Open (without validating) the loose object store rooted at `objects_dir`.
    pub fn at(objects_dir: impl Into<PathBuf>) -> Self {
        Db { path: objects_dir.into() }
    }

    /// The `objects/<xx>/<rest>` path an object with id `id` would live at.
    pub fn object_path(&self, id: &ObjectId) -> PathBuf {
        let hex = id.to_hex();
        self.path.join(&hex[..2]).join(&hex[2..])
    }

    /// `true` if a loose file for `id` exists.
    pub fn contains(&self, id: &ObjectId) -> bool {
        self.object_path(id).is_file()
    }

    /// Inflate and frame-parse the loose object named `id`, if present.
    pub fn try_find(&self, id: &ObjectId) -> Result<Option<crate::Object>, FindError> {
        let path = self.object_path(id);
        let compressed = match std::fs::read(&path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(source) => return Err(FindError::Io { path, source }),
        };
        let mut inflated = Vec::new();
        flate2::read::ZlibDecoder::new(&compressed[..])
            .read_to_end(&mut inflated)
            .map_err(|source| FindError::Inflate { path, source })?;
        let (kind, size, body_start) = git_object::decode_header(&inflated)?;
        let data = inflated[body_start..body_start + size].to_vec();
        Ok(Some(crate::Object { kind, data }))
    }

    /// Every object id stored loose, discovered by walking the `objects/<xx>/` fan-out
    /// directories (skipping `pack/` and `info/`).
    pub fn iter(&self) -> impl Iterator<Item = std::io::Result<ObjectId>> + '_ {
        LooseIter {
            root: self.path.clone(),
            fanout: fanout_dirs(&self.path),
            fanout_idx: 0,
            current: Vec::new(),
        }
    }
}

fn fanout_dirs(root: &Path) -> Vec<String> {
    let mut dirs: Vec<String> = std::fs::read_dir(root)
        .into_iter()
        .flatten()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().map(|t| t.is_dir()).unwrap_or(false))
        .filter_map(|e| e.file_name().into_string().ok())
        .filter(|name| name.len() == 2 && name.bytes().all(|b| b.is_ascii_hexdigit()))
        .collect();
    dirs.sort();
    dirs
}

struct LooseIter {
    root: PathBuf,
    fanout: Vec<String>,
    fanout_idx: usize,
    current: Vec<(String, String)>,
}

impl Iterator for LooseIter {
    type Item = std::io::Result<ObjectId>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some((prefix, rest)) = self.current.pop() {
                let hex = format!("{prefix}{rest}");
                return match ObjectId::from_hex(hex.as_bytes()) {
                    Ok(id) => Some(Ok(id)),
                    Err(_) => continue,
                };
            }
            let prefix = self.fanout.get(self.fanout_idx)?.clone();
            self.fanout_idx += 1;
            let dir = self.root.join(&prefix);
            let mut entries: Vec<(String, String)> = match std::fs::read_dir(&dir) {
                Ok(rd) => rd
                    .filter_map(|e| e.ok())
                    .filter_map(|e| e.file_name().into_string().ok())
                    .map(|name| (prefix.clone(), name))
                    .collect(),
                Err(e) => return Some(Err(e)),
            };
            entries.reverse();
            self.current = entries;
        }
    }
}
