//! Source records.
//!
//! Every signal and memo owns one [`Source`] slot in the graph arena. The
//! typed value lives in the handle; the arena only keeps the bookkeeping the
//! linking protocol needs.

use super::node::{NodeId, NodeList};
use crate::reactive::subscriber::Listeners;

/// Lifecycle of a signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignalState {
    /// Accepting writes.
    Active,

    /// Writes are ignored and no dependents are tracked.
    Disposed,
}

/// Lifecycle of a memo.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemoState {
    /// The cached value is up to date.
    Clean,

    /// A dependency changed; the next read recomputes.
    Dirty,

    /// The memo's function is executing.
    Running {
        /// A dependency changed while the function was running, so the
        /// result is already stale when it returns.
        dirtied: bool,
    },

    /// The memo no longer tracks dependencies. Reads still compute.
    Disposed {
        /// The cached value has not been computed since it went stale.
        stale: bool,
    },
}

impl MemoState {
    /// Check if the memo is disposed.
    pub fn is_disposed(self) -> bool {
        matches!(self, Self::Disposed { .. })
    }
}

/// What kind of reactive value a source slot holds.
#[derive(Debug)]
pub enum SourceKind {
    Signal(SignalState),
    Memo {
        state: MemoState,
        /// Nodes for everything this memo read on its latest run.
        sources: NodeList,
    },
}

/// One signal or memo in the graph.
#[derive(Debug)]
pub struct Source {
    pub kind: SourceKind,

    /// Nodes for every memo that reads this source.
    pub targets: NodeList,

    /// The node this source is claimed by during an in-progress
    /// recomputation, if any.
    pub tracking: Option<NodeId>,

    pub listeners: Listeners,
}

impl Source {
    pub fn signal() -> Self {
        Self::new(SourceKind::Signal(SignalState::Active))
    }

    /// Memos start dirty so the first read computes.
    pub fn memo() -> Self {
        Self::new(SourceKind::Memo {
            state: MemoState::Dirty,
            sources: NodeList::default(),
        })
    }

    fn new(kind: SourceKind) -> Self {
        Self {
            kind,
            targets: NodeList::default(),
            tracking: None,
            listeners: Listeners::default(),
        }
    }

    pub fn is_disposed(&self) -> bool {
        match self.kind {
            SourceKind::Signal(state) => state == SignalState::Disposed,
            SourceKind::Memo { state, .. } => state.is_disposed(),
        }
    }

    pub fn is_memo(&self) -> bool {
        matches!(self.kind, SourceKind::Memo { .. })
    }

    pub fn memo_state(&self) -> Option<MemoState> {
        match self.kind {
            SourceKind::Memo { state, .. } => Some(state),
            SourceKind::Signal(_) => None,
        }
    }

    /// The memo's own dependency list, if this is a memo.
    pub fn sources_mut(&mut self) -> Option<&mut NodeList> {
        match &mut self.kind {
            SourceKind::Memo { sources, .. } => Some(sources),
            SourceKind::Signal(_) => None,
        }
    }

    pub fn sources(&self) -> Option<NodeList> {
        match self.kind {
            SourceKind::Memo { sources, .. } => Some(sources),
            SourceKind::Signal(_) => None,
        }
    }
}
