//! Memo Implementation
//!
//! A Memo is a cached derived value that re-evaluates only when its
//! dependencies change.
//!
//! # How Memos Work
//!
//! 1. On first access, the memo runs its computation and caches the result.
//!    Every signal or memo read during the run becomes a dependency.
//!
//! 2. When accessed again, if no dependency has changed, the cached value is
//!    returned.
//!
//! 3. When a dependency changes, the memo is marked dirty and its listeners
//!    run. Nothing is recomputed yet.
//!
//! 4. The next access recomputes and rebuilds the dependency list, so a memo
//!    that stops reading a signal stops depending on it.
//!
//! # Why This Matters
//!
//! This lazy approach avoids unnecessary recomputation:
//!
//! - A signal changes
//! - 10 memos depend on it
//! - Only the memos actually accessed will recompute
//! - Memos that are never read stay dirty (no wasted work)
//!
//! # Failure
//!
//! A memo whose function fails (or panics) keeps its previous value and
//! stays dirty, so the next read tries again. Reading a memo from inside its
//! own computation is reported as [`ReactiveError::Cycle`].

use std::cell::RefCell;
use std::fmt::{self, Debug};
use std::rc::Rc;

use super::context::{untracked, ReactiveContext};
use super::runtime::Runtime;
use super::subscriber::ListenerId;
use crate::error::ReactiveError;
use crate::graph::{MemoState, ReadPlan, SourceId};

type ComputeFn<T> = Box<dyn Fn() -> Result<T, ReactiveError>>;
type EqFn<T> = Box<dyn Fn(&T, &T) -> bool>;

struct MemoInner<T> {
    id: SourceId,

    /// The cached value (None if never computed).
    value: RefCell<Option<T>>,

    compute: ComputeFn<T>,

    /// When set, a recomputed value equal to the cached one is discarded and
    /// the cached value kept.
    eq: Option<EqFn<T>>,
}

impl<T> Drop for MemoInner<T> {
    fn drop(&mut self) {
        Runtime::try_with(|rt| rt.release(self.id));
    }
}

/// A cached derived value that recomputes only when dependencies change.
///
/// # Example
///
/// ```rust
/// use trellis_core::reactive::{Memo, Signal};
///
/// let count = Signal::new(0);
/// let doubled = Memo::new({
///     let count = count.clone();
///     move || count.get() * 2
/// });
///
/// count.set(5);
/// assert_eq!(doubled.get(), 10);
/// ```
pub struct Memo<T: 'static> {
    inner: Rc<MemoInner<T>>,
}

impl<T: 'static> Memo<T> {
    /// Create a new memo with the given computation function.
    ///
    /// The computation is not run immediately. It runs on first access.
    pub fn new<F>(compute: F) -> Self
    where
        F: Fn() -> T + 'static,
    {
        Self::build(Box::new(move || Ok(compute())), None)
    }

    /// Create a memo that keeps its cached value when a recomputation
    /// produces an equal one.
    pub fn with_eq<F, E>(compute: F, eq: E) -> Self
    where
        F: Fn() -> T + 'static,
        E: Fn(&T, &T) -> bool + 'static,
    {
        Self::build(Box::new(move || Ok(compute())), Some(Box::new(eq)))
    }

    /// Create a memo whose computation can fail.
    ///
    /// Errors are returned from [`Memo::try_get`] and friends. Reading other
    /// memos with `try_get` and `?` inside the computation forwards their
    /// errors, including cycles.
    pub fn try_new<F>(compute: F) -> Self
    where
        F: Fn() -> Result<T, ReactiveError> + 'static,
    {
        Self::build(Box::new(compute), None)
    }

    fn build(compute: ComputeFn<T>, eq: Option<EqFn<T>>) -> Self {
        let id = Runtime::with(|rt| rt.graph(|graph| graph.insert_memo()));
        Self {
            inner: Rc::new(MemoInner {
                id,
                value: RefCell::new(None),
                compute,
                eq,
            }),
        }
    }

    /// Get the memo's graph ID.
    pub fn id(&self) -> SourceId {
        self.inner.id
    }

    /// Get the current value, recomputing if necessary.
    ///
    /// # Panics
    ///
    /// Panics if the computation fails or a cycle is detected. Use
    /// [`Memo::try_get`] to handle those cases.
    pub fn get(&self) -> T
    where
        T: Clone,
    {
        self.try_get()
            .unwrap_or_else(|err| panic!("failed to read memo {:?}: {err}", self.inner.id))
    }

    /// Get the current value, recomputing if necessary.
    pub fn try_get(&self) -> Result<T, ReactiveError>
    where
        T: Clone,
    {
        self.try_with(T::clone)
    }

    /// Borrow the current value, recomputing if necessary.
    ///
    /// # Panics
    ///
    /// Panics like [`Memo::get`].
    pub fn with<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        self.try_with(f)
            .unwrap_or_else(|err| panic!("failed to read memo {:?}: {err}", self.inner.id))
    }

    /// Borrow the current value, recomputing if necessary.
    ///
    /// If called while another memo is recomputing, this memo becomes one of
    /// its dependencies.
    pub fn try_with<R>(&self, f: impl FnOnce(&T) -> R) -> Result<R, ReactiveError> {
        self.refresh()?;
        Runtime::with(|rt| rt.track(self.inner.id));

        let value = self.inner.value.borrow();
        Ok(f(value.as_ref().expect("memo has a value after a successful refresh")))
    }

    /// Get the current value without registering a dependency.
    ///
    /// The memo still recomputes if it is dirty.
    pub fn get_untracked(&self) -> T
    where
        T: Clone,
    {
        untracked(|| self.get())
    }

    /// Recompute if the cached value is stale.
    fn refresh(&self) -> Result<(), ReactiveError> {
        let id = self.inner.id;
        match Runtime::with(|rt| rt.graph(|graph| graph.begin_read(id)))? {
            ReadPlan::Cached => Ok(()),
            ReadPlan::Recompute => self.recompute(true),
            ReadPlan::Untracked => self.recompute(false),
        }
    }

    fn recompute(&self, tracked: bool) -> Result<(), ReactiveError> {
        tracing::debug!(memo = ?self.inner.id, tracked, "recomputing memo");

        let run = Recompute::start(self.inner.id, tracked);
        let value = (self.inner.compute)()?;
        self.store(value);
        run.succeed();
        Ok(())
    }

    fn store(&self, value: T) {
        let mut slot = self.inner.value.borrow_mut();
        if let (Some(current), Some(eq)) = (slot.as_ref(), self.inner.eq.as_ref()) {
            if eq(current, &value) {
                return;
            }
        }
        *slot = Some(value);
    }

    /// Register a listener, invoked when this memo becomes dirty.
    ///
    /// The listener runs before the memo recomputes; read the memo from the
    /// listener to get the new value.
    pub fn subscribe<F>(&self, notify: F) -> ListenerId
    where
        F: Fn() + 'static,
    {
        Runtime::with(|rt| rt.subscribe(self.inner.id, Rc::new(notify)))
    }

    /// Remove a listener. Returns false if it was not registered.
    pub fn unsubscribe(&self, listener: ListenerId) -> bool {
        Runtime::with(|rt| rt.unsubscribe(self.inner.id, listener))
    }

    /// Detach the memo from the graph.
    ///
    /// A disposed memo drops its dependencies and listeners. Reading it
    /// still works: a stale value is recomputed once without tracking.
    pub fn dispose(&self) {
        Runtime::with(|rt| rt.dispose(self.inner.id));
    }

    pub fn is_disposed(&self) -> bool {
        self.state().is_disposed()
    }

    /// Get the current state.
    pub fn state(&self) -> MemoState {
        Runtime::with(|rt| rt.graph(|graph| graph.memo_state(self.inner.id)))
            .unwrap_or(MemoState::Disposed { stale: true })
    }

    /// Get the number of sources read on the latest run.
    pub fn dependency_count(&self) -> usize {
        Runtime::with(|rt| rt.graph(|graph| graph.dependency_count(self.inner.id)))
    }

    /// Get the number of memos depending on this one.
    pub fn dependent_count(&self) -> usize {
        Runtime::with(|rt| rt.graph(|graph| graph.dependent_count(self.inner.id)))
    }

    /// Check if the memo has a cached value.
    pub fn has_value(&self) -> bool {
        self.inner.value.borrow().is_some()
    }
}

/// An in-progress recomputation.
///
/// Dropping it, on success, error or unwind, restores the previous context
/// and finishes the memo's bookkeeping.
struct Recompute {
    memo: SourceId,
    context: Option<ReactiveContext>,
    succeeded: bool,
}

impl Recompute {
    fn start(memo: SourceId, tracked: bool) -> Self {
        let context = ReactiveContext::enter(tracked.then_some(memo));
        Self {
            memo,
            context: Some(context),
            succeeded: false,
        }
    }

    fn succeed(mut self) {
        self.succeeded = true;
    }
}

impl Drop for Recompute {
    fn drop(&mut self) {
        drop(self.context.take());
        Runtime::try_with(|rt| rt.graph(|graph| graph.finish_recompute(self.memo, self.succeeded)));
    }
}

impl<T: 'static> Clone for Memo<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<T> Debug for Memo<T>
where
    T: Debug + 'static,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Memo")
            .field("id", &self.inner.id)
            .field("state", &self.state())
            .field("value", &*self.inner.value.borrow())
            .field("dependent_count", &self.dependent_count())
            .finish()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reactive::Signal;
    use std::sync::atomic::{AtomicI32, Ordering};
    use std::sync::Arc;

    #[test]
    fn memo_computes_on_first_access() {
        let call_count = Arc::new(AtomicI32::new(0));
        let call_count_clone = call_count.clone();

        let memo = Memo::new(move || {
            call_count_clone.fetch_add(1, Ordering::SeqCst);
            42
        });

        // Not computed yet
        assert!(!memo.has_value());
        assert_eq!(call_count.load(Ordering::SeqCst), 0);

        // First access triggers computation
        let value = memo.get();
        assert_eq!(value, 42);
        assert_eq!(call_count.load(Ordering::SeqCst), 1);
        assert!(memo.has_value());
    }

    #[test]
    fn memo_caches_value_when_clean() {
        let call_count = Arc::new(AtomicI32::new(0));
        let call_count_clone = call_count.clone();

        let memo = Memo::new(move || {
            call_count_clone.fetch_add(1, Ordering::SeqCst);
            42
        });

        assert_eq!(memo.get(), 42);
        assert_eq!(memo.get(), 42);
        assert_eq!(memo.get(), 42);
        assert_eq!(call_count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn memo_recomputes_when_dependency_changes() {
        let call_count = Arc::new(AtomicI32::new(0));
        let call_count_clone = call_count.clone();

        let signal = Signal::new(0);
        let signal_clone = signal.clone();
        let memo = Memo::new(move || {
            call_count_clone.fetch_add(1, Ordering::SeqCst);
            signal_clone.get()
        });

        assert_eq!(memo.get(), 0);
        assert_eq!(memo.dependency_count(), 1);
        assert_eq!(signal.dependent_count(), 1);

        signal.set(5);
        assert_eq!(memo.state(), MemoState::Dirty);
        assert_eq!(call_count.load(Ordering::SeqCst), 1);

        assert_eq!(memo.get(), 5);
        assert_eq!(call_count.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn memo_state_transitions() {
        let signal = Signal::new(1);
        let signal_clone = signal.clone();
        let memo = Memo::new(move || signal_clone.get());

        // Starts dirty
        assert_eq!(memo.state(), MemoState::Dirty);

        // After get, becomes clean
        memo.get();
        assert_eq!(memo.state(), MemoState::Clean);

        signal.set(2);
        assert_eq!(memo.state(), MemoState::Dirty);

        memo.get();
        assert_eq!(memo.state(), MemoState::Clean);

        memo.dispose();
        assert_eq!(memo.state(), MemoState::Disposed { stale: false });
    }

    #[test]
    fn self_read_is_a_cycle() {
        let slot: Rc<RefCell<Option<Memo<i32>>>> = Rc::new(RefCell::new(None));
        let slot_clone = slot.clone();
        let memo = Memo::try_new(move || {
            let me = slot_clone.borrow().clone().expect("memo installed");
            Ok(me.try_get()? + 1)
        });
        *slot.borrow_mut() = Some(memo.clone());

        for _ in 0..2 {
            let err = memo.try_get().unwrap_err();
            assert!(err.is_cycle());
            assert_eq!(memo.state(), MemoState::Dirty);
        }
        assert!(!Runtime::is_tracking());

        // Break the Rc cycle so the memo is freed.
        slot.borrow_mut().take();
    }

    #[test]
    fn failed_computation_keeps_previous_value() {
        let signal = Signal::new(4);
        let signal_clone = signal.clone();
        let memo = Memo::try_new(move || {
            let n = signal_clone.get();
            if n < 0 {
                return Err(ReactiveError::compute(format!("negative input {n}")));
            }
            Ok(n * 10)
        });

        assert_eq!(memo.try_get().unwrap(), 40);

        signal.set(-1);
        let err = memo.try_get().unwrap_err();
        assert!(matches!(err, ReactiveError::Compute(_)));
        assert_eq!(memo.state(), MemoState::Dirty);
        assert_eq!(*memo.inner.value.borrow(), Some(40));
        // The dependency survives the failed run.
        assert_eq!(signal.dependent_count(), 1);

        signal.set(2);
        assert_eq!(memo.try_get().unwrap(), 20);
        assert_eq!(memo.state(), MemoState::Clean);
    }

    #[test]
    fn panicking_computation_leaves_graph_consistent() {
        let signal = Signal::new(0);
        let signal_clone = signal.clone();
        let memo = Memo::new(move || {
            let n = signal_clone.get();
            assert!(n != 3, "three is not allowed");
            n
        });
        assert_eq!(memo.get(), 0);

        signal.set(3);
        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| memo.get()));
        assert!(result.is_err());

        assert!(!Runtime::is_tracking());
        assert_eq!(memo.state(), MemoState::Dirty);
        assert_eq!(signal.dependent_count(), 1);

        signal.set(4);
        assert_eq!(memo.get(), 4);
    }

    #[test]
    fn equality_keeps_cached_value() {
        let signal = Signal::new(1.0f64);
        let signal_clone = signal.clone();
        let memo = Memo::with_eq(
            move || signal_clone.get().round(),
            |a: &f64, b: &f64| (a - b).abs() < f64::EPSILON,
        );

        assert_eq!(memo.get(), 1.0);
        signal.set(1.2);
        assert_eq!(memo.get(), 1.0);
        assert_eq!(memo.state(), MemoState::Clean);
    }

    #[test]
    fn disposed_memo_computes_untracked() {
        let call_count = Arc::new(AtomicI32::new(0));
        let call_count_clone = call_count.clone();

        let signal = Signal::new(1);
        let signal_clone = signal.clone();
        let memo = Memo::new(move || {
            call_count_clone.fetch_add(1, Ordering::SeqCst);
            signal_clone.get() + 1
        });

        memo.dispose();
        assert!(memo.is_disposed());

        assert_eq!(memo.get(), 2);
        assert_eq!(memo.get(), 2);
        assert_eq!(call_count.load(Ordering::SeqCst), 1);
        assert_eq!(signal.dependent_count(), 0);

        // No longer tracks the signal.
        signal.set(10);
        assert_eq!(memo.get(), 2);
    }

    #[test]
    fn memo_clone_shares_state() {
        let memo1 = Memo::new(|| 42);
        assert_eq!(memo1.get(), 42);

        let memo2 = memo1.clone();
        assert_eq!(memo1.id(), memo2.id());
        assert!(memo2.has_value());
        assert_eq!(memo2.get(), 42);

        memo1.dispose();
        assert!(memo2.is_disposed());
    }
}
