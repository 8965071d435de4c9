//! Looking up objects across a handle's loose root and packs (spec.md §4.1 "Object-read
//! algorithm": loose objects are tried before packs, since they're always the most recent).

use std::ops::Deref;

use git_hash::ObjectId;
use git_object::Kind;

use crate::{general, Object};

mod error {
    use crate::{loose, pack};

    #[derive(Debug, thiserror::Error)]
    pub enum Error {
        #[error(transparent)]
        Loose(#[from] loose::FindError),
        #[error(transparent)]
        Pack(#[from] pack::Error),
    }
}
use error::Error;

impl<S> crate::Find for general::Handle<S>
where
    S: Deref<Target = general::Store> + Clone,
{
    type Error = Error;

    fn try_find(&self, id: &ObjectId) -> Result<Option<Object>, Self::Error> {
        let snapshot = self.snapshot.borrow();
        for db in &snapshot.loose_dbs {
            if let Some(object) = db.try_find(id)? {
                return Ok(Some(object));
            }
        }
        for bundle in &snapshot.packs {
            if let Some((kind, data)) = bundle.find(id, &|base_id| find_loose_or_packed(&snapshot, base_id))? {
                return Ok(Some(Object { kind, data }));
            }
        }
        Ok(None)
    }

    fn contains(&self, id: &ObjectId) -> bool {
        let snapshot = self.snapshot.borrow();
        snapshot.loose_dbs.iter().any(|db| db.contains(id)) || snapshot.packs.iter().any(|bundle| bundle.contains(id))
    }
}

/// A lossy lookup used only to resolve a ref-delta's base object; failures surface to the
/// caller as [`crate::pack::Error::UnresolvedBase`] rather than propagating here.
fn find_loose_or_packed(snapshot: &general::Snapshot, id: &ObjectId) -> Option<(Kind, Vec<u8>)> {
    for db in &snapshot.loose_dbs {
        if let Ok(Some(object)) = db.try_find(id) {
            return Some((object.kind, object.data));
        }
    }
    for bundle in &snapshot.packs {
        if let Ok(Some(found)) = bundle.find(id, &|base_id| find_loose_or_packed(snapshot, base_id)) {
            return Some(found);
        }
    }
    None
}
