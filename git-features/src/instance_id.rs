use std::sync::atomic::{AtomicUsize, Ordering};

static NEXT: AtomicUsize = AtomicUsize::new(0);

/// A monotonically increasing integer, unique per process, handed out to every
/// [`Repository`][struct@crate::instance_id::Id] (or similar long-lived handle) for debug
/// attribution in logs.
///
/// Replaces the "pick a random number and hope it doesn't collide" approach to
/// telling instances apart in diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Id(usize);

impl Id {
    /// Allocate a new, never-before-seen id.
    pub fn new() -> Self {
        Id(NEXT.fetch_add(1, Ordering::Relaxed))
    }
}

impl Default for Id {
    fn default() -> Self {
        Id::new()
    }
}

impl std::fmt::Display for Id {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}
