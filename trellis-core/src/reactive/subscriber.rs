//! Listener types for the reactive system.
//!
//! A listener is a plain `Fn()` callback attached to a signal or memo. It
//! receives no payload: when it runs, it re-reads whatever it cares about.

use std::fmt;
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};

use smallvec::SmallVec;

/// Unique identifier for a listener.
///
/// Returned by `subscribe` and passed back to `unsubscribe`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

impl ListenerId {
    /// Generate a new unique listener ID.
    pub fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

impl Default for ListenerId {
    fn default() -> Self {
        Self::new()
    }
}

/// A shared listener callback.
pub(crate) type Notify = Rc<dyn Fn()>;

/// Buffer of callbacks collected while the graph is borrowed and invoked
/// once the borrow is released.
pub(crate) type Pending = SmallVec<[Notify; 4]>;

/// The listeners registered on a single source, in registration order.
#[derive(Default)]
pub(crate) struct Listeners {
    entries: SmallVec<[(ListenerId, Notify); 2]>,
}

impl Listeners {
    pub fn add(&mut self, id: ListenerId, notify: Notify) {
        self.entries.push((id, notify));
    }

    /// Remove a listener, handing it back so the caller can drop it outside
    /// of any graph borrow.
    pub fn remove(&mut self, id: ListenerId) -> Option<Notify> {
        let index = self.entries.iter().position(|(entry, _)| *entry == id)?;
        Some(self.entries.remove(index).1)
    }

    /// Queue every listener onto `pending`.
    pub fn queue(&self, pending: &mut Pending) {
        pending.extend(self.entries.iter().map(|(_, notify)| Rc::clone(notify)));
    }

    pub fn take(&mut self) -> Pending {
        self.entries.drain(..).map(|(_, notify)| notify).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }
}

impl fmt::Debug for Listeners {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.entries.iter().map(|(id, _)| id))
            .finish()
    }
}

/// Invoke queued listeners in order.
///
/// A panicking listener aborts the rest of the dispatch. Dirty marking is
/// complete before the first listener runs, so the graph is consistent
/// either way.
pub(crate) fn dispatch(pending: Pending) {
    if pending.is_empty() {
        return;
    }
    tracing::trace!(count = pending.len(), "dispatching listeners");
    for notify in pending {
        notify();
    }
}
