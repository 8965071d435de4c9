//! The object store façade (spec.md §4.1, §9 "Store/Handle").

pub mod general;
