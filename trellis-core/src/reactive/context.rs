//! Reactive Context
//!
//! The reactive context tracks which memo is currently recomputing. This
//! enables automatic dependency tracking: when a signal or memo is read, the
//! runtime links it to the current memo.
//!
//! # Implementation
//!
//! The runtime holds a single "current memo" slot. Entering a context swaps
//! the memo in and keeps the previous occupant in the guard; dropping the
//! guard swaps it back. Nested recomputations therefore behave like a call
//! stack, and the slot is restored even if the computation panics.

use crate::graph::SourceId;

use super::runtime::Runtime;

/// Guard that restores the previous context when dropped.
pub struct ReactiveContext {
    memo: Option<SourceId>,
    previous: Option<SourceId>,
}

impl ReactiveContext {
    /// Make `memo` the current context. `None` suspends tracking.
    pub(crate) fn enter(memo: Option<SourceId>) -> Self {
        let previous = Runtime::with(|rt| rt.replace_current(memo));
        Self { memo, previous }
    }

    /// Check if there is an active reactive context.
    pub fn is_active() -> bool {
        Self::current().is_some()
    }

    /// Get the memo currently recomputing, if any.
    pub fn current() -> Option<SourceId> {
        Runtime::with(|rt| rt.current())
    }
}

impl Drop for ReactiveContext {
    fn drop(&mut self) {
        Runtime::try_with(|rt| {
            let popped = rt.replace_current(self.previous);
            debug_assert_eq!(
                popped, self.memo,
                "ReactiveContext mismatch: expected {:?}, got {:?}",
                self.memo, popped
            );
        });
    }
}

/// Run `f` without tracking any of the values it reads.
///
/// ```rust
/// use trellis_core::reactive::{untracked, Memo, Signal};
///
/// let count = Signal::new(1);
/// let step = Signal::new(10);
///
/// let total = Memo::new({
///     let (count, step) = (count.clone(), step.clone());
///     move || count.get() * untracked(|| step.get())
/// });
///
/// assert_eq!(total.get(), 10);
/// step.set(20);
/// // `step` was read untracked, so the memo is still clean.
/// assert_eq!(total.get(), 10);
/// ```
pub fn untracked<R>(f: impl FnOnce() -> R) -> R {
    let _ctx = ReactiveContext::enter(None);
    f()
}
