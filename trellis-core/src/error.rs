//! Error types for the reactive engine.

use std::error::Error as StdError;

use crate::graph::SourceId;

/// Errors raised while reading or configuring the reactive graph.
#[derive(Debug, thiserror::Error)]
pub enum ReactiveError {
    /// A memo was read while it was already recomputing.
    ///
    /// This happens when a memo's function reads the memo itself, either
    /// directly or through a chain of other memos.
    #[error("cycle detected while recomputing memo {0:?}")]
    Cycle(SourceId),

    /// A fallible memo function returned an error.
    #[error("memo computation failed: {0}")]
    Compute(#[source] Box<dyn StdError + Send + Sync + 'static>),

    /// The runtime was reconfigured while reactive values were still alive.
    #[error("runtime cannot be reconfigured while {live} sources are alive")]
    RuntimeInUse {
        /// Number of live signals and memos.
        live: usize,
    },
}

impl ReactiveError {
    /// Wrap an arbitrary error as a computation failure.
    pub fn compute<E>(error: E) -> Self
    where
        E: Into<Box<dyn StdError + Send + Sync + 'static>>,
    {
        Self::Compute(error.into())
    }

    /// Check if this error is a cycle.
    pub fn is_cycle(&self) -> bool {
        matches!(self, Self::Cycle(_))
    }
}
