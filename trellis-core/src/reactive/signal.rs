//! Signal Implementation
//!
//! A Signal is the fundamental reactive primitive. It holds a value and
//! tracks which memos depend on it.
//!
//! # How Signals Work
//!
//! 1. When a signal is read while a memo is recomputing, the signal is
//!    linked as a dependency of that memo.
//!
//! 2. When a signal is written with a value that differs from the current
//!    one, every dependent memo is marked dirty and the signal's listeners
//!    run. Inside a [`batch`](super::batch) both steps wait for the
//!    outermost batch to exit.
//!
//! 3. Writing an equal value does nothing at all.
//!
//! # Lifetime
//!
//! Clones of a signal share one value. Dropping the last clone frees the
//! signal's slot in the graph; [`Signal::dispose`] detaches it earlier while
//! keeping the last value readable.

use std::cell::RefCell;
use std::fmt::{self, Debug};
use std::rc::Rc;

use super::runtime::Runtime;
use super::subscriber::ListenerId;
use crate::graph::SourceId;

type EqFn<T> = Box<dyn Fn(&T, &T) -> bool>;

struct SignalInner<T> {
    id: SourceId,
    value: RefCell<T>,
    eq: EqFn<T>,
}

impl<T> Drop for SignalInner<T> {
    fn drop(&mut self) {
        Runtime::try_with(|rt| rt.release(self.id));
    }
}

/// A reactive signal holding a value of type T.
///
/// # Example
///
/// ```rust
/// use trellis_core::reactive::Signal;
///
/// let count = Signal::new(0);
///
/// // Read the value
/// assert_eq!(count.get(), 0);
///
/// // Update the value (notifies subscribers)
/// count.set(5);
/// count.update(|n| n + 1);
/// assert_eq!(count.get(), 6);
/// ```
pub struct Signal<T: 'static> {
    inner: Rc<SignalInner<T>>,
}

impl<T: 'static> Signal<T> {
    /// Create a new signal compared with `PartialEq` on write.
    pub fn new(value: T) -> Self
    where
        T: PartialEq,
    {
        Self::with_eq(value, |a: &T, b: &T| a == b)
    }

    /// Create a new signal with a custom equality predicate.
    ///
    /// A write is ignored when `eq(current, new)` returns true. Pass
    /// `|_, _| false` to notify on every write.
    pub fn with_eq<E>(value: T, eq: E) -> Self
    where
        E: Fn(&T, &T) -> bool + 'static,
    {
        let id = Runtime::with(|rt| rt.graph(|graph| graph.insert_signal()));
        Self {
            inner: Rc::new(SignalInner {
                id,
                value: RefCell::new(value),
                eq: Box::new(eq),
            }),
        }
    }

    /// Get the signal's graph ID.
    pub fn id(&self) -> SourceId {
        self.inner.id
    }

    /// Get the current value.
    ///
    /// If called while a memo is recomputing, this also registers the
    /// signal as one of its dependencies.
    pub fn get(&self) -> T
    where
        T: Clone,
    {
        self.with(T::clone)
    }

    /// Borrow the current value, tracking it like [`Signal::get`].
    ///
    /// Writing this signal from inside `f` panics.
    pub fn with<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        Runtime::with(|rt| rt.track(self.inner.id));
        f(&self.inner.value.borrow())
    }

    /// Get the current value without tracking dependencies.
    pub fn get_untracked(&self) -> T
    where
        T: Clone,
    {
        self.inner.value.borrow().clone()
    }

    /// Set a new value.
    ///
    /// Ignored when the signal is disposed or the value equals the current
    /// one. Otherwise dependents are marked dirty and listeners run, now or
    /// when the enclosing batch finishes.
    pub fn set(&self, value: T) {
        let id = self.inner.id;
        if Runtime::with(|rt| rt.graph(|graph| graph.is_disposed(id))) {
            tracing::trace!(signal = ?id, "write to disposed signal ignored");
            return;
        }

        let unchanged = (self.inner.eq)(&self.inner.value.borrow(), &value);
        if unchanged {
            return;
        }
        *self.inner.value.borrow_mut() = value;

        Runtime::with(|rt| rt.notify_write(id));
    }

    /// Update the value using a function of the current one.
    pub fn update<F>(&self, f: F)
    where
        F: FnOnce(&T) -> T,
    {
        let next = self.with(f);
        self.set(next);
    }

    /// Register a listener, invoked after each change to this signal.
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

    /// Detach the signal from the graph.
    ///
    /// Dependents keep their last value, listeners are dropped and further
    /// writes are ignored. Calling this twice is harmless.
    pub fn dispose(&self) {
        Runtime::with(|rt| rt.dispose(self.inner.id));
    }

    pub fn is_disposed(&self) -> bool {
        Runtime::with(|rt| rt.graph(|graph| graph.is_disposed(self.inner.id)))
    }

    /// Check if the signal was written in the open batch and is waiting for
    /// the flush.
    pub fn is_queued(&self) -> bool {
        Runtime::with(|rt| rt.is_queued(self.inner.id))
    }

    /// Get the number of memos depending on this signal.
    pub fn dependent_count(&self) -> usize {
        Runtime::with(|rt| rt.graph(|graph| graph.dependent_count(self.inner.id)))
    }

    pub fn listener_count(&self) -> usize {
        Runtime::with(|rt| rt.graph(|graph| graph.listener_count(self.inner.id)))
    }
}

impl<T: 'static> Clone for Signal<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<T> Debug for Signal<T>
where
    T: Debug + 'static,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Signal")
            .field("id", &self.inner.id)
            .field("value", &*self.inner.value.borrow())
            .field("dependent_count", &self.dependent_count())
            .finish()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
