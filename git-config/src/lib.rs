//! Parsing and cascading of git-config files: the four-scope lookup (system, global, local,
//! worktree) described in spec.md §3 and §6, plus the ini-ish syntax each scope is written in.

#![deny(missing_docs)]

pub mod cascade;
pub mod file;
pub mod parse;
pub mod values;

pub use cascade::Cascade;
pub use file::File;
