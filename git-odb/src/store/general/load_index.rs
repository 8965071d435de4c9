//! Scanning the object directory for the loose root and any packs (spec.md §4.1, §9).

use std::{path::PathBuf, rc::Rc};

use crate::pack;

use super::{RefreshMode, Snapshot, Store};

/// The error returned by [`Store::load_one_index()`].
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The `objects/pack` directory couldn't be listed.
    #[error("failed to list packs in {path}")]
    Io {
        #[allow(missing_docs)]
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    /// A discovered `.pack`/`.idx` pair failed to open.
    #[error(transparent)]
    Pack(#[from] pack::Error),
}

impl Store {
    /// (Re)build a [`Snapshot`] of this store's loose root and packs.
    ///
    /// Returns `Ok(None)` when `refresh_mode` is [`RefreshMode::Never`] and a snapshot has
    /// already been produced (`marker != 0`); the caller keeps using what it has.
    pub fn load_one_index(&self, refresh_mode: RefreshMode, marker: usize) -> Result<Option<Snapshot>, Error> {
        if marker != 0 && matches!(refresh_mode, RefreshMode::Never) {
            return Ok(None);
        }

        let loose_dbs = vec![crate::loose::Db::at(self.object_dir.clone())];

        let pack_dir = self.object_dir.join("pack");
        let mut packs = Vec::new();
        if pack_dir.is_dir() {
            let entries = std::fs::read_dir(&pack_dir).map_err(|source| Error::Io {
                path: pack_dir.clone(),
                source,
            })?;
            let mut pack_paths: Vec<PathBuf> = entries
                .filter_map(|entry| entry.ok())
                .map(|entry| entry.path())
                .filter(|path| path.extension().and_then(|ext| ext.to_str()) == Some("pack"))
                .collect();
            pack_paths.sort();
            for path in pack_paths {
                packs.push(Rc::new(pack::Bundle::open(&path, self.hash_kind)?));
            }
        }

        Ok(Some(Snapshot {
            loose_dbs,
            packs,
            marker: marker + 1,
        }))
    }
}
