//! Reactive Primitives
//!
//! This module implements the core reactive system: signals, memos, and
//! batches. These primitives form the foundation of Trellis's fine-grained
//! reactivity.
//!
//! # Concepts
//!
//! ## Signals
//!
//! A Signal is a container for mutable state. When a signal's value is read
//! while a memo is recomputing, the signal is registered as one of that
//! memo's dependencies. When the signal's value changes, its dependents are
//! marked dirty and its listeners run.
//!
//! ## Memos
//!
//! A Memo is a derived value that caches its result. It re-evaluates only
//! when one of its dependencies changed and it is read again. Each
//! re-evaluation rebuilds its dependency list, so conditional reads are
//! tracked precisely.
//!
//! ## Batches
//!
//! A batch coalesces writes: listeners run once per written signal after the
//! outermost batch returns, never in between.
//!
//! # Implementation Notes
//!
//! The reactive system uses a thread-local runtime holding the current
//! memo, so dependency capture is automatic. When a value is read, we check
//! whether a memo is recomputing and, if so, link the two in the graph.
//!
//! Listeners observe "this became stale", not a new value: memos recompute
//! lazily on the next read, after every affected memo has been marked. No
//! listener can therefore observe a half-updated graph.

mod batch;
mod context;
mod memo;
mod runtime;
mod signal;
pub(crate) mod subscriber;

pub use batch::batch;
pub use context::{untracked, ReactiveContext};
pub use memo::Memo;
pub use runtime::{GraphStats, Runtime};
pub use signal::Signal;
pub use subscriber::ListenerId;
