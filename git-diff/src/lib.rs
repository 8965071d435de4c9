//! Diffing two git trees: recursively expand both sides, then classify every path that differs
//! (spec.md §4.6 "Status / diff engine", the `diff(refA|index|workdir, refB|index|workdir,
//! filepath?)` operation).
//!
//! This crate only knows how to compare two already-resolved tree roots; turning an index or a
//! working tree into a tree-shaped view for one side of the comparison is a `git-worktree`
//! concern layered on top.

#![deny(missing_docs)]

mod similarity;
mod tree;

pub use tree::{diff, Change, Options, Status, TreeFind};

pub use similarity::similarity;
