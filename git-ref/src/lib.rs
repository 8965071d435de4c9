//! A git-style reference store: loose refs, `packed-refs`, symbolic refs, reflogs, and the
//! name-expansion and resolution rules that turn a short name like `"main"` into an object id
//! (spec.md §4.1 "GitBackend" ref operations).

#![deny(missing_docs)]

pub mod name;
pub mod reflog;
pub mod store;
pub mod transaction;

pub use name::{FullName, FullNameRef};
pub use store::{ReflogMode, Resolved, Store};
pub use transaction::{PreviousValue, RefEdit, Target};
