//! Batching
//!
//! Writes inside [`batch`] update values immediately but hold back dirty
//! marking and listener notification until the outermost batch returns.
//! Each written signal is flushed once, in the order it was first written,
//! and each listener runs at most once per flush.

use super::runtime::Runtime;

/// Run `f` inside a batch and return its result.
///
/// Batches nest; only the outermost one flushes. The flush also happens when
/// `f` panics.
///
/// ```rust
/// use std::cell::Cell;
/// use std::rc::Rc;
/// use trellis_core::reactive::{batch, Signal};
///
/// let a = Signal::new(0);
/// let b = Signal::new(0);
/// let calls = Rc::new(Cell::new(0));
///
/// for signal in [&a, &b] {
///     let calls = calls.clone();
///     signal.subscribe(move || calls.set(calls.get() + 1));
/// }
///
/// batch(|| {
///     a.set(1);
///     b.set(2);
///     assert_eq!(calls.get(), 0);
/// });
/// assert_eq!(calls.get(), 2);
/// ```
pub fn batch<R>(f: impl FnOnce() -> R) -> R {
    let _batch = BatchGuard::enter();
    f()
}

/// Closes a batch when dropped.
struct BatchGuard(());

impl BatchGuard {
    fn enter() -> Self {
        Runtime::with(Runtime::enter_batch);
        Self(())
    }
}

impl Drop for BatchGuard {
    fn drop(&mut self) {
        Runtime::try_with(Runtime::exit_batch);
    }
}
