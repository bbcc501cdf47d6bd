//! Batch Scheduler
//!
//! The scheduler defers notifications while a batch is open. Writes inside a
//! batch store their value immediately but only enqueue the signal; dirty
//! marking and listener dispatch happen once, when the outermost batch exits.
//!
//! # Algorithm
//!
//! 1. `enter` increments the depth.
//! 2. A write while the depth is non-zero enqueues its signal. The queue is
//!    insertion ordered and holds each signal at most once, no matter how
//!    many times it was written.
//! 3. `exit` decrements the depth. When it reaches zero the queue is drained
//!    and handed back to the runtime to flush, in enqueue order.

use indexmap::IndexSet;

use super::node::SourceId;

/// Depth counter plus the signals written during the open batch.
#[derive(Debug, Default)]
pub struct BatchScheduler {
    depth: usize,
    queue: IndexSet<SourceId>,
}

impl BatchScheduler {
    /// Create a scheduler whose queue can hold `capacity` signals without
    /// reallocating.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            depth: 0,
            queue: IndexSet::with_capacity(capacity),
        }
    }

    /// Open a (possibly nested) batch.
    pub fn enter(&mut self) {
        self.depth += 1;
    }

    /// Close a batch.
    ///
    /// Returns the queued signals when this closed the outermost batch, and
    /// `None` while an outer batch is still open.
    pub fn exit(&mut self) -> Option<Vec<SourceId>> {
        debug_assert!(self.depth > 0, "batch exit without matching enter");
        self.depth = self.depth.saturating_sub(1);
        if self.depth > 0 {
            return None;
        }
        Some(self.queue.drain(..).collect())
    }

    /// Check if a batch is open.
    pub fn is_active(&self) -> bool {
        self.depth > 0
    }

    pub fn depth(&self) -> usize {
        self.depth
    }

    /// Queue a written signal. Returns false if it was already queued.
    pub fn enqueue(&mut self, id: SourceId) -> bool {
        self.queue.insert(id)
    }

    /// Check if a signal is waiting for the flush.
    pub fn contains(&self, id: SourceId) -> bool {
        self.queue.contains(&id)
    }

    /// Forget a signal, e.g. because it was freed before the flush.
    pub fn forget(&mut self, id: SourceId) {
        self.queue.shift_remove(&id);
    }

    pub fn queued(&self) -> usize {
        self.queue.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use slotmap::SlotMap;

    fn ids(n: usize) -> Vec<SourceId> {
        let mut map: SlotMap<SourceId, ()> = SlotMap::with_key();
        (0..n).map(|_| map.insert(())).collect()
    }

    #[test]
    fn only_outermost_exit_flushes() {
        let ids = ids(1);
        let mut scheduler = BatchScheduler::default();

        scheduler.enter();
        scheduler.enter();
        scheduler.enqueue(ids[0]);

        assert_eq!(scheduler.exit(), None);
        assert!(scheduler.is_active());
        assert!(scheduler.contains(ids[0]));

        assert_eq!(scheduler.exit(), Some(vec![ids[0]]));
        assert!(!scheduler.is_active());
        assert_eq!(scheduler.queued(), 0);
    }

    #[test]
    fn queue_is_ordered_and_deduplicated() {
        let ids = ids(3);
        let mut scheduler = BatchScheduler::with_capacity(4);

        scheduler.enter();
        assert!(scheduler.enqueue(ids[2]));
        assert!(scheduler.enqueue(ids[0]));
        assert!(!scheduler.enqueue(ids[2]));
        assert!(scheduler.enqueue(ids[1]));

        assert_eq!(scheduler.exit(), Some(vec![ids[2], ids[0], ids[1]]));
    }

    #[test]
    fn forget_keeps_remaining_order() {
        let ids = ids(3);
        let mut scheduler = BatchScheduler::default();

        scheduler.enter();
        for &id in &ids {
            scheduler.enqueue(id);
        }
        scheduler.forget(ids[1]);

        assert_eq!(scheduler.depth(), 1);
        assert_eq!(scheduler.exit(), Some(vec![ids[0], ids[2]]));
    }
}
