//! Dependency Graph
//!
//! This module implements the graph that connects signals and memos.
//!
//! # Overview
//!
//! - Sources are signals or memos, stored in one arena keyed by [`SourceId`].
//! - Edges are [`DepNode`]s stored in a second arena keyed by [`NodeId`].
//!   A node is threaded through its source's target list and its target's
//!   source list, so either side can unlink it in O(1).
//!
//! # Linking Protocol
//!
//! A memo's dependency set is rebuilt on every recomputation without
//! reallocating the edges that persist:
//!
//! 1. *Prepare*: every node in the memo's source list is marked inactive and
//!    becomes its source's tracking claim. The previous claim is kept in the
//!    node's `rollback` slot.
//! 2. *Track*: each read of a source either reactivates the claimed node or,
//!    when the claim belongs to another memo, appends a fresh node.
//! 3. *Cleanup*: claims are rolled back and every node still inactive is
//!    unlinked from both lists and released.
//!
//! Nested recomputations push and pop claims in call order, so a memo read
//! in the middle of another memo's run never disturbs the outer run's
//! bookkeeping.
//!
//! # Propagation
//!
//! Writes mark dependents dirty depth first. A memo that is already dirty
//! stops the walk, which is what keeps diamond-shaped graphs from notifying a
//! memo twice. Listeners are collected while the arena is borrowed and
//! invoked only after the borrow is released.

mod node;
mod scheduler;
mod source;

pub use node::{NodeId, SourceId};
pub use scheduler::BatchScheduler;
pub use source::{MemoState, SignalState};

pub(crate) use node::{Chain, DepNode, NodeList};
pub(crate) use source::{Source, SourceKind};

use slotmap::SlotMap;

use crate::error::ReactiveError;
use crate::reactive::subscriber::{ListenerId, Notify, Pending};

/// What a memo read has to do before it can return the cached value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadPlan {
    /// The cached value is current.
    Cached,

    /// Run the function with dependency tracking. The memo is now Running.
    Recompute,

    /// The memo is disposed and stale; run the function without tracking.
    Untracked,
}

/// Arena of sources and dependency nodes.
#[derive(Debug, Default)]
pub struct Graph {
    sources: SlotMap<SourceId, Source>,
    nodes: SlotMap<NodeId, DepNode>,
}

impl Graph {
    /// Create a graph with preallocated arenas.
    pub fn with_capacity(sources: usize, nodes: usize) -> Self {
        Self {
            sources: SlotMap::with_capacity_and_key(sources),
            nodes: SlotMap::with_capacity_and_key(nodes),
        }
    }

    pub fn insert_signal(&mut self) -> SourceId {
        self.sources.insert(Source::signal())
    }

    pub fn insert_memo(&mut self) -> SourceId {
        self.sources.insert(Source::memo())
    }

    /// Check if a source is disposed. Freed sources count as disposed.
    pub fn is_disposed(&self, id: SourceId) -> bool {
        self.sources.get(id).map_or(true, Source::is_disposed)
    }

    pub fn memo_state(&self, id: SourceId) -> Option<MemoState> {
        self.sources.get(id).and_then(Source::memo_state)
    }

    /// Number of memos currently depending on `id`.
    pub fn dependent_count(&self, id: SourceId) -> usize {
        self.sources.get(id).map_or(0, |source| source.targets.len())
    }

    /// Number of sources the memo `id` read on its latest run.
    pub fn dependency_count(&self, id: SourceId) -> usize {
        self.sources
            .get(id)
            .and_then(Source::sources)
            .map_or(0, |sources| sources.len())
    }

    pub fn listener_count(&self, id: SourceId) -> usize {
        self.sources.get(id).map_or(0, |source| source.listeners.len())
    }

    /// Number of live signals and memos.
    pub fn live(&self) -> usize {
        self.sources.len()
    }

    pub fn memo_count(&self) -> usize {
        self.sources.values().filter(|source| source.is_memo()).count()
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Attach a listener.
    ///
    /// Disposed sources do not accept listeners; the callback is handed back
    /// so the caller can drop it outside the graph borrow.
    pub fn subscribe(&mut self, id: SourceId, listener: ListenerId, notify: Notify) -> Option<Notify> {
        match self.sources.get_mut(id) {
            Some(source) if !source.is_disposed() => {
                source.listeners.add(listener, notify);
                None
            }
            _ => Some(notify),
        }
    }

    pub fn unsubscribe(&mut self, id: SourceId, listener: ListenerId) -> Option<Notify> {
        self.sources.get_mut(id)?.listeners.remove(listener)
    }

    // ------------------------------------------------------------------------
    // Linking protocol
    // ------------------------------------------------------------------------

    /// Record that the running memo `target` read `source`.
    pub fn track(&mut self, source: SourceId, target: SourceId) {
        if source == target {
            return;
        }
        let Some(claimed) = self
            .sources
            .get(source)
            .filter(|source| !source.is_disposed())
            .map(|source| source.tracking)
        else {
            return;
        };
        if !matches!(self.memo_state(target), Some(MemoState::Running { .. })) {
            return;
        }

        let reusable = claimed.and_then(|id| {
            self.nodes
                .get(id)
                .filter(|node| node.target == target)
                .map(|node| (id, node.active))
        });

        match reusable {
            Some((_, true)) => {}
            Some((id, false)) => {
                if let Some(node) = self.nodes.get_mut(id) {
                    node.active = true;
                }
                if let Some(sources) = self.sources.get_mut(target).and_then(Source::sources_mut) {
                    sources.move_to_back(&mut self.nodes, Chain::Sources, id);
                }
                tracing::trace!(?source, ?target, node = ?id, "reused dependency node");
            }
            None => {
                let id = self.nodes.insert(DepNode::new(source, target, claimed));
                if let Some(entry) = self.sources.get_mut(source) {
                    entry.targets.push_back(&mut self.nodes, Chain::Targets, id);
                    entry.tracking = Some(id);
                }
                if let Some(sources) = self.sources.get_mut(target).and_then(Source::sources_mut) {
                    sources.push_back(&mut self.nodes, Chain::Sources, id);
                }
                tracing::trace!(?source, ?target, node = ?id, "linked dependency node");
            }
        }
    }

    /// Deactivate the memo's nodes and claim them on their sources.
    fn prepare(&mut self, memo: SourceId) {
        let Some(sources) = self.sources.get(memo).and_then(Source::sources) else {
            return;
        };
        for id in sources.collect(&self.nodes, Chain::Sources) {
            let Some(node) = self.nodes.get_mut(id) else {
                continue;
            };
            node.active = false;
            if let Some(source) = self.sources.get_mut(node.source) {
                node.rollback = source.tracking;
                source.tracking = Some(id);
            }
        }
    }

    /// Roll back claims and release nodes that were not read.
    ///
    /// With `drop_all` every node is released, active or not.
    fn cleanup(&mut self, memo: SourceId, drop_all: bool) {
        let Some(sources) = self.sources.get(memo).and_then(Source::sources) else {
            return;
        };
        for id in sources.collect(&self.nodes, Chain::Sources) {
            let Some(node) = self.nodes.get_mut(id) else {
                continue;
            };
            let rollback = node.rollback.take();
            let active = node.active;
            if let Some(source) = self.sources.get_mut(node.source) {
                if source.tracking == Some(id) {
                    source.tracking = rollback;
                }
            }
            if drop_all || !active {
                self.release(id);
            }
        }
    }

    /// Unlink a node from both of its lists and free it.
    fn release(&mut self, id: NodeId) {
        let Some(node) = self.nodes.get(id) else {
            return;
        };
        let (source, target, rollback) = (node.source, node.target, node.rollback);

        if let Some(entry) = self.sources.get_mut(source) {
            entry.targets.unlink(&mut self.nodes, Chain::Targets, id);
            if entry.tracking == Some(id) {
                entry.tracking = rollback;
            }
        }
        if let Some(sources) = self.sources.get_mut(target).and_then(Source::sources_mut) {
            sources.unlink(&mut self.nodes, Chain::Sources, id);
        }
        self.nodes.remove(id);
        tracing::trace!(?source, ?target, node = ?id, "released dependency node");
    }

    // ------------------------------------------------------------------------
    // Memo lifecycle
    // ------------------------------------------------------------------------

    /// Decide how a memo read proceeds, entering Running when it must
    /// recompute.
    pub fn begin_read(&mut self, memo: SourceId) -> Result<ReadPlan, ReactiveError> {
        let Some(state) = self.memo_state(memo) else {
            return Ok(ReadPlan::Untracked);
        };
        match state {
            MemoState::Running { .. } => {
                tracing::warn!(?memo, "cycle detected");
                Err(ReactiveError::Cycle(memo))
            }
            MemoState::Clean | MemoState::Disposed { stale: false } => Ok(ReadPlan::Cached),
            MemoState::Disposed { stale: true } => Ok(ReadPlan::Untracked),
            MemoState::Dirty => {
                self.set_memo_state(memo, MemoState::Running { dirtied: false });
                self.prepare(memo);
                Ok(ReadPlan::Recompute)
            }
        }
    }

    /// Finish a recomputation started by [`Graph::begin_read`].
    ///
    /// A failed run, or one whose dependencies changed underneath it, leaves
    /// the memo dirty so the next read tries again.
    pub fn finish_recompute(&mut self, memo: SourceId, succeeded: bool) {
        self.cleanup(memo, false);
        let Some(state) = self.memo_state(memo) else {
            return;
        };
        let next = match state {
            MemoState::Running { dirtied } if succeeded && !dirtied => MemoState::Clean,
            MemoState::Running { .. } => MemoState::Dirty,
            MemoState::Disposed { .. } => MemoState::Disposed { stale: !succeeded },
            MemoState::Clean | MemoState::Dirty => state,
        };
        self.set_memo_state(memo, next);
    }

    fn set_memo_state(&mut self, memo: SourceId, next: MemoState) {
        if let Some(SourceKind::Memo { state, .. }) = self.sources.get_mut(memo).map(|source| &mut source.kind) {
            *state = next;
        }
    }

    // ------------------------------------------------------------------------
    // Propagation
    // ------------------------------------------------------------------------

    /// Mark every memo that depends on `source` dirty.
    pub fn propagate(&mut self, source: SourceId, pending: &mut Pending) {
        let Some(entry) = self.sources.get(source).filter(|entry| !entry.targets.is_empty()) else {
            return;
        };
        for id in entry.targets.collect(&self.nodes, Chain::Targets) {
            if let Some(target) = self.nodes.get(id).map(|node| node.target) {
                self.mark_dirty(target, pending);
            }
        }
    }

    fn mark_dirty(&mut self, memo: SourceId, pending: &mut Pending) {
        let Some(state) = self.memo_state(memo) else {
            return;
        };
        let next = match state {
            MemoState::Clean => MemoState::Dirty,
            MemoState::Running { dirtied: false } => MemoState::Running { dirtied: true },
            MemoState::Dirty | MemoState::Running { dirtied: true } | MemoState::Disposed { .. } => return,
        };
        self.set_memo_state(memo, next);
        self.propagate(memo, pending);
        if let Some(entry) = self.sources.get(memo) {
            entry.listeners.queue(pending);
        }
    }

    /// Propagate a signal write and queue the signal's own listeners.
    pub fn write(&mut self, signal: SourceId, pending: &mut Pending) {
        if self.is_disposed(signal) {
            return;
        }
        self.propagate(signal, pending);
        if let Some(entry) = self.sources.get(signal) {
            entry.listeners.queue(pending);
        }
    }

    /// Propagate every signal written during a batch, in write order.
    pub fn flush(&mut self, queue: &[SourceId], pending: &mut Pending) {
        for &signal in queue {
            self.write(signal, pending);
        }
    }

    // ------------------------------------------------------------------------
    // Disposal
    // ------------------------------------------------------------------------

    /// Detach a source from the graph and mark it disposed.
    ///
    /// Returns the removed listeners, which must be dropped after the graph
    /// borrow is released.
    pub fn dispose(&mut self, id: SourceId) -> Pending {
        if self.is_disposed(id) {
            return Pending::new();
        }

        self.cleanup(id, true);
        if let Some(entry) = self.sources.get(id) {
            for node in entry.targets.collect(&self.nodes, Chain::Targets) {
                self.release(node);
            }
        }

        let Some(entry) = self.sources.get_mut(id) else {
            return Pending::new();
        };
        entry.tracking = None;
        entry.kind = match entry.kind {
            SourceKind::Signal(_) => SourceKind::Signal(SignalState::Disposed),
            SourceKind::Memo { state, .. } => SourceKind::Memo {
                state: MemoState::Disposed {
                    stale: state != MemoState::Clean,
                },
                sources: NodeList::default(),
            },
        };
        tracing::debug!(source = ?id, "disposed");
        entry.listeners.take()
    }

    /// Dispose a source and free its slot.
    pub fn remove(&mut self, id: SourceId) -> Pending {
        let listeners = self.dispose(id);
        self.sources.remove(id);
        listeners
    }
}
