//! Reactive Runtime
//!
//! The runtime is the central coordinator that connects signals and memos.
//! It owns the dependency graph, the evaluation context and the batch
//! scheduler.
//!
//! # How It Works
//!
//! 1. When a signal or memo is created, it takes a slot in the graph.
//!
//! 2. When a memo reads a signal or another memo, the runtime links the two
//!    through a dependency node.
//!
//! 3. When a signal's value changes, the runtime:
//!    a. Marks every dependent memo dirty, transitively
//!    b. Collects the listeners of everything it marked
//!    c. Invokes the listeners once the graph is no longer borrowed
//!    d. Memos are lazy - they recompute on next access
//!
//! Inside a batch, step 3 is deferred until the outermost batch exits.
//!
//! # Thread Safety
//!
//! There is one runtime per thread. Signal and memo handles are `!Send`, so
//! a graph can only ever be touched from the thread that built it. Hosts with
//! several threads keep the graph on one of them and forward work to it.

use std::cell::{Cell, RefCell};

use crate::config::RuntimeConfig;
use crate::error::ReactiveError;
use crate::graph::{BatchScheduler, Graph, SourceId};

use super::subscriber::{dispatch, ListenerId, Notify, Pending};

thread_local! {
    static RUNTIME: Runtime = Runtime::new(RuntimeConfig::default());
}

/// A snapshot of the current thread's graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct GraphStats {
    /// Live signals (including disposed ones whose handles are still held).
    pub signals: usize,

    /// Live memos.
    pub memos: usize,

    /// Dependency nodes currently linking sources to memos.
    pub nodes: usize,

    /// Number of open batches.
    pub batch_depth: usize,

    /// Signals written in the open batch and awaiting the flush.
    pub queued: usize,
}

/// The per-thread reactive runtime.
pub struct Runtime {
    graph: RefCell<Graph>,

    /// The memo currently recomputing, if any.
    current: Cell<Option<SourceId>>,

    batch: RefCell<BatchScheduler>,
}

impl Runtime {
    fn new(config: RuntimeConfig) -> Self {
        Self {
            graph: RefCell::new(Graph::with_capacity(config.source_capacity, config.node_capacity)),
            current: Cell::new(None),
            batch: RefCell::new(BatchScheduler::with_capacity(config.batch_capacity)),
        }
    }

    /// Run `f` against this thread's runtime.
    pub(crate) fn with<R>(f: impl FnOnce(&Runtime) -> R) -> R {
        RUNTIME.with(f)
    }

    /// Like [`Runtime::with`], but does nothing once the thread-local has
    /// been torn down. Used from `Drop` impls.
    pub(crate) fn try_with<R>(f: impl FnOnce(&Runtime) -> R) -> Option<R> {
        RUNTIME.try_with(f).ok()
    }

    /// Borrow the graph for the duration of `f`.
    ///
    /// `f` must not call back into user code.
    pub(crate) fn graph<R>(&self, f: impl FnOnce(&mut Graph) -> R) -> R {
        f(&mut self.graph.borrow_mut())
    }

    // ------------------------------------------------------------------------
    // Evaluation context
    // ------------------------------------------------------------------------

    pub(crate) fn current(&self) -> Option<SourceId> {
        self.current.get()
    }

    pub(crate) fn replace_current(&self, memo: Option<SourceId>) -> Option<SourceId> {
        self.current.replace(memo)
    }

    /// Link `source` as a dependency of the memo being recomputed.
    pub(crate) fn track(&self, source: SourceId) {
        if let Some(target) = self.current.get() {
            self.graph(|graph| graph.track(source, target));
        }
    }

    // ------------------------------------------------------------------------
    // Writes and batching
    // ------------------------------------------------------------------------

    /// Handle a signal whose value just changed.
    pub(crate) fn notify_write(&self, signal: SourceId) {
        {
            let mut batch = self.batch.borrow_mut();
            if batch.is_active() {
                if batch.enqueue(signal) {
                    tracing::trace!(?signal, "queued write for batch flush");
                }
                return;
            }
        }

        let mut pending = Pending::new();
        self.graph(|graph| graph.write(signal, &mut pending));
        dispatch(pending);
    }

    pub(crate) fn enter_batch(&self) {
        self.batch.borrow_mut().enter();
    }

    pub(crate) fn exit_batch(&self) {
        let Some(queue) = self.batch.borrow_mut().exit() else {
            return;
        };
        if queue.is_empty() {
            return;
        }

        tracing::debug!(signals = queue.len(), "flushing batch");
        let mut pending = Pending::new();
        self.graph(|graph| graph.flush(&queue, &mut pending));
        dispatch(pending);
    }

    pub(crate) fn is_queued(&self, signal: SourceId) -> bool {
        self.batch.borrow().contains(signal)
    }

    // ------------------------------------------------------------------------
    // Listeners and disposal
    // ------------------------------------------------------------------------

    pub(crate) fn subscribe(&self, source: SourceId, notify: Notify) -> ListenerId {
        let id = ListenerId::new();
        let rejected = self.graph(|graph| graph.subscribe(source, id, notify));
        drop(rejected);
        id
    }

    pub(crate) fn unsubscribe(&self, source: SourceId, listener: ListenerId) -> bool {
        let removed = self.graph(|graph| graph.unsubscribe(source, listener));
        removed.is_some()
    }

    pub(crate) fn dispose(&self, source: SourceId) {
        let listeners = self.graph(|graph| graph.dispose(source));
        drop(listeners);
    }

    /// Free a source whose last handle was dropped.
    pub(crate) fn release(&self, source: SourceId) {
        self.batch.borrow_mut().forget(source);
        let listeners = self.graph(|graph| graph.remove(source));
        drop(listeners);
    }

    // ------------------------------------------------------------------------
    // Public API
    // ------------------------------------------------------------------------

    /// Rebuild this thread's arenas with new capacities.
    ///
    /// Only allowed while no signals or memos are alive.
    pub fn configure(config: RuntimeConfig) -> Result<(), ReactiveError> {
        Self::with(|rt| {
            let live = rt.graph.borrow().live();
            if live > 0 {
                return Err(ReactiveError::RuntimeInUse { live });
            }

            *rt.graph.borrow_mut() = Graph::with_capacity(config.source_capacity, config.node_capacity);
            let mut batch = rt.batch.borrow_mut();
            if !batch.is_active() {
                *batch = BatchScheduler::with_capacity(config.batch_capacity);
            }
            tracing::debug!(?config, "runtime reconfigured");
            Ok(())
        })
    }

    /// Take a snapshot of this thread's graph.
    pub fn stats() -> GraphStats {
        Self::with(|rt| {
            let graph = rt.graph.borrow();
            let batch = rt.batch.borrow();
            let memos = graph.memo_count();
            GraphStats {
                signals: graph.live() - memos,
                memos,
                nodes: graph.node_count(),
                batch_depth: batch.depth(),
                queued: batch.queued(),
            }
        })
    }

    /// Check if a memo is currently recomputing on this thread.
    pub fn is_tracking() -> bool {
        Self::with(|rt| rt.current().is_some())
    }

    /// Number of batches currently open on this thread.
    pub fn batch_depth() -> usize {
        Self::with(|rt| rt.batch.borrow().depth())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::rc::Rc;
    use std::sync::atomic::{AtomicI32, Ordering};
    use std::sync::Arc;

    #[test]
    fn write_outside_batch_notifies_immediately() {
        let call_count = Arc::new(AtomicI32::new(0));
        let call_count_clone = call_count.clone();

        let signal = Runtime::with(|rt| rt.graph(Graph::insert_signal));
        Runtime::with(|rt| {
            rt.subscribe(signal, Rc::new(move || {
                call_count_clone.fetch_add(1, Ordering::SeqCst);
            }))
        });

        Runtime::with(|rt| rt.notify_write(signal));
        assert_eq!(call_count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn batched_writes_notify_on_outermost_exit() {
        let call_count = Arc::new(AtomicI32::new(0));
        let call_count_clone = call_count.clone();

        let signal = Runtime::with(|rt| rt.graph(Graph::insert_signal));
        Runtime::with(|rt| {
            rt.subscribe(signal, Rc::new(move || {
                call_count_clone.fetch_add(1, Ordering::SeqCst);
            }))
        });

        Runtime::with(|rt| {
            rt.enter_batch();
            rt.enter_batch();
            rt.notify_write(signal);
            rt.notify_write(signal);
            assert!(rt.is_queued(signal));

            rt.exit_batch();
            assert_eq!(call_count.load(Ordering::SeqCst), 0);

            rt.exit_batch();
            assert!(!rt.is_queued(signal));
        });
        assert_eq!(call_count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn unsubscribe_reports_removal() {
        let signal = Runtime::with(|rt| rt.graph(Graph::insert_signal));
        let id = Runtime::with(|rt| rt.subscribe(signal, Rc::new(|| {})));

        assert!(Runtime::with(|rt| rt.unsubscribe(signal, id)));
        assert!(!Runtime::with(|rt| rt.unsubscribe(signal, id)));
    }

    #[test]
    fn configure_rejects_live_graph() {
        assert!(Runtime::configure(RuntimeConfig::default().with_node_capacity(8)).is_ok());

        let signal = Runtime::with(|rt| rt.graph(Graph::insert_signal));
        let err = Runtime::configure(RuntimeConfig::default()).unwrap_err();
        assert!(matches!(err, ReactiveError::RuntimeInUse { live: 1 }));

        Runtime::with(|rt| rt.release(signal));
        assert!(Runtime::configure(RuntimeConfig::default()).is_ok());
    }

    #[test]
    fn stats_count_sources() {
        Runtime::with(|rt| {
            rt.graph(Graph::insert_signal);
            rt.graph(Graph::insert_memo);
            rt.enter_batch();
        });

        let stats = Runtime::stats();
        assert_eq!(stats.signals, 1);
        assert_eq!(stats.memos, 1);
        assert_eq!(stats.nodes, 0);
        assert_eq!(stats.batch_depth, 1);
        assert_eq!(Runtime::batch_depth(), 1);
        assert!(!Runtime::is_tracking());

        Runtime::with(Runtime::exit_batch);
    }
}
