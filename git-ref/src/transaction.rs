//! A single reference update, as accepted by [`crate::Store::write()`]
//! (spec.md §4.1 "Ref-write algorithm").

use bstr::BString;
use git_actor::Signature;
use git_hash::ObjectId;

use crate::FullName;

/// What a reference points at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    /// Points directly at an object id.
    Peeled(ObjectId),
    /// Points at another reference by name, e.g. `HEAD` → `refs/heads/main`.
    Symbolic(FullName),
}

/// A compare-and-swap precondition for a [`RefEdit`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PreviousValue {
    /// Don't check the current value; always write.
    Any,
    /// The reference must not exist yet.
    MustNotExist,
    /// The reference must currently hold exactly this value.
    MustExistAndMatch(Target),
}

impl Default for PreviousValue {
    fn default() -> Self {
        PreviousValue::Any
    }
}

/// One reference update: its new value and the precondition it must satisfy.
#[derive(Debug, Clone)]
pub struct RefEdit {
    /// The reference being changed.
    pub name: FullName,
    /// Its new value.
    pub new: Target,
    /// What the old value must have been for this edit to apply.
    pub expected: PreviousValue,
    /// Whether to skip appending a reflog line for this edit even if reflogs are enabled.
    pub skip_reflog: bool,
    /// The reflog message to record (ignored if reflogs are disabled or `skip_reflog` is set).
    pub message: BString,
    /// Who is making this change and when, for the reflog line (ignored under the same
    /// conditions as `message`).
    pub signature: Signature,
}
