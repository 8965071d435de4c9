//! Small ambient primitives used by every other crate in the workspace.
//!
//! Nothing here is specific to git: it's the plumbing that would otherwise be
//! reinvented (and inconsistently so) in each crate — a shared-ownership
//! pointer, a per-process instance counter for debug attribution, and an
//! optional `tracing` facade that compiles away entirely when the `tracing`
//! feature is off.

#![deny(missing_docs)]

pub mod instance_id;
pub mod threading;

/// Re-exports of the `tracing` facade, present only when the `tracing` feature is enabled.
///
/// Downstream crates call [`span!`] and friends through here so they keep working
/// (as a silent no-op) when the feature is disabled, instead of sprinkling
/// `#[cfg(feature = "tracing")]` through business logic.
#[cfg(feature = "tracing")]
pub mod trace {
    pub use tracing::{debug, error, info, span, warn, Level};
}

/// A no-op stand-in for [`trace`] when the `tracing` feature is disabled.
#[cfg(not(feature = "tracing"))]
pub mod trace {
    /// Does nothing; keeps call sites feature-agnostic.
    #[macro_export]
    macro_rules! __git_features_noop {
        ($($arg:tt)*) => {};
    }
    pub use __git_features_noop as span;
    pub use __git_features_noop as debug;
    pub use __git_features_noop as info;
    pub use __git_features_noop as warn;
    pub use __git_features_noop as error;
}
