//! Shared-ownership aliases that can be swapped for thread-safe equivalents via the `parallel` feature.

/// A reference-counted, possibly-shared value.
///
/// Without the `parallel` feature this is a plain [`std::rc::Rc`] for single-threaded embedders
/// (the common case for a library driven by one caller at a time, see spec.md §5). With
/// `parallel` it becomes an [`std::sync::Arc`] so the same code works unchanged for embedders
/// that share a `Repository` across threads.
#[cfg(not(feature = "parallel"))]
pub type OwnShared<T> = std::rc::Rc<T>;

/// See the non-`parallel` doc comment on this type.
#[cfg(feature = "parallel")]
pub type OwnShared<T> = std::sync::Arc<T>;

/// A mutable cell matching [`OwnShared`]'s threading mode.
#[cfg(not(feature = "parallel"))]
pub type MutableCell<T> = std::cell::RefCell<T>;

/// See the non-`parallel` doc comment on this type.
#[cfg(feature = "parallel")]
pub type MutableCell<T> = parking_lot::Mutex<T>;
