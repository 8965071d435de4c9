//! `Store`/`Handle`: a loose-then-packed object database whose handles cache a refreshable
//! [`Snapshot`] instead of re-scanning the object directory on every call (spec.md §4.1, §9).

use std::{cell::RefCell, path::PathBuf, rc::Rc};

use git_features::threading::OwnShared;

use crate::{loose, pack};

mod find;
pub mod load_index;
mod write;

/// The on-disk layout a [`Handle`] reads from: a loose object root plus zero or more packs
/// under `<object_dir>/pack/`.
#[derive(Debug)]
pub struct Store {
    object_dir: PathBuf,
    hash_kind: git_hash::Kind,
}

impl Store {
    /// Open the object store rooted at `object_dir`, sharing it via [`OwnShared`] so many
    /// [`Handle`]s can be created from the same directory cheaply.
    pub fn at(object_dir: impl Into<PathBuf>, hash_kind: git_hash::Kind) -> OwnShared<Self> {
        OwnShared::new(Store {
            object_dir: object_dir.into(),
            hash_kind,
        })
    }

    /// Obtain a [`Handle`] onto this store, eagerly loading its first [`Snapshot`].
    pub fn to_handle(self: &OwnShared<Self>, refresh_mode: RefreshMode) -> Result<Handle<OwnShared<Self>>, load_index::Error> {
        Handle::new(self.clone(), refresh_mode)
    }
}

/// Controls whether a [`Handle`] rescans the object directory for newly written packs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshMode {
    /// Never rescan; packs written by another process after the handle's snapshot was taken
    /// stay invisible to it until a new `Handle` is created.
    Never,
    /// Rescan once more whenever a lookup falls through the current snapshot, to pick up packs
    /// written since it was taken.
    AfterCheckingForMorePacks,
}

/// A point-in-time view of a [`Store`]'s loose root and packs.
pub struct Snapshot {
    pub(crate) loose_dbs: Vec<loose::Db>,
    pub(crate) packs: Vec<Rc<pack::Bundle>>,
    pub(crate) marker: usize,
}

/// A cheap-to-clone handle onto a [`Store`], holding its own refreshable [`Snapshot`].
///
/// Not `Sync`: each thread that talks to the object database owns its own `Handle`
/// (spec.md §5, "one `Repository` per thread").
pub struct Handle<S> {
    pub(crate) store: S,
    pub(crate) snapshot: RefCell<Snapshot>,
    pub(crate) refresh_mode: RefreshMode,
}

impl<S> Handle<S>
where
    S: std::ops::Deref<Target = Store> + Clone,
{
    /// Create a handle over `store`, eagerly loading its first snapshot.
    pub fn new(store: S, refresh_mode: RefreshMode) -> Result<Self, load_index::Error> {
        let snapshot = store.load_one_index(refresh_mode, 0)?.expect("marker 0 always produces a snapshot");
        Ok(Handle {
            store,
            snapshot: RefCell::new(snapshot),
            refresh_mode,
        })
    }
}
