//! Trellis Core
//!
//! This crate provides a glitch-free reactive dependency graph. It
//! implements:
//!
//! - Signals: mutable cells with equality-gated writes
//! - Memos: lazily recomputed, dependency-tracked derived values
//! - Batches: coalesced notification for groups of writes
//!
//! # Architecture
//!
//! The crate is organized into several modules:
//!
//! - `reactive`: the public primitives and the per-thread runtime
//! - `graph`: the arena of sources and dependency nodes, the linking
//!   protocol and the batch scheduler
//! - `config` / `error`: runtime configuration and error types
//!
//! # Example
//!
//! ```rust
//! use trellis_core::reactive::{batch, Memo, Signal};
//!
//! // Create signals
//! let width = Signal::new(2);
//! let height = Signal::new(3);
//!
//! // Create a derived value
//! let area = Memo::new({
//!     let (width, height) = (width.clone(), height.clone());
//!     move || width.get() * height.get()
//! });
//! assert_eq!(area.get(), 6);
//!
//! // Update both signals; listeners see a single change
//! batch(|| {
//!     width.set(4);
//!     height.set(5);
//! });
//! assert_eq!(area.get(), 20);
//! ```

mod config;
mod error;
mod graph;
pub mod reactive;

pub use config::RuntimeConfig;
pub use error::ReactiveError;
pub use graph::{MemoState, SourceId};
pub use reactive::{batch, untracked, GraphStats, ListenerId, Memo, ReactiveContext, Runtime, Signal};
