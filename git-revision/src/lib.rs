//! Interpreting and walking a commit graph: revspec parsing (`HEAD~2`, `a..b`, `a...b`) and the
//! ancestry queries a revspec resolves to (listing reachable commits, descendant tests,
//! merge-base computation). See spec.md §4.8.

#![deny(missing_docs)]
#![allow(clippy::result_large_err)]

pub mod graph;
pub mod spec;

pub use graph::{find_merge_base, find_merge_bases, is_descendant, list_commits_and_tags, CommitGraph};
