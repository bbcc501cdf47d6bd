//! Dependency Nodes
//!
//! A dependency node is the edge between one source and one dependent memo.
//! Each node is threaded through two doubly linked lists at once:
//!
//! - the *target list* of its source (everything that depends on the source)
//! - the *source list* of its target (everything the memo currently reads)
//!
//! Nodes live in a [`SlotMap`] and the links are [`NodeId`] handles rather
//! than pointers. Removed slots go onto the map's free list and are handed
//! out again for the next edge, and stale handles fail lookups instead of
//! aliasing a recycled node.

use slotmap::{new_key_type, SlotMap};
use smallvec::SmallVec;

new_key_type! {
    /// Handle to a signal or memo in the graph.
    pub struct SourceId;

    /// Handle to a dependency node.
    pub struct NodeId;
}

/// Selects which of a node's two list memberships an operation walks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Chain {
    /// The target's list of sources.
    Sources,

    /// The source's list of targets.
    Targets,
}

/// A single source -> target edge.
#[derive(Debug, Clone)]
pub struct DepNode {
    /// The signal or memo being read.
    pub source: SourceId,

    /// The memo doing the reading.
    pub target: SourceId,

    /// False while the target is recomputing and has not read the source yet.
    /// Nodes still inactive at the end of a recomputation are released.
    pub active: bool,

    /// The source's previous tracking claim, restored after recomputation.
    pub rollback: Option<NodeId>,

    prev_source: Option<NodeId>,
    next_source: Option<NodeId>,
    prev_target: Option<NodeId>,
    next_target: Option<NodeId>,
}

impl DepNode {
    /// Create an unlinked, active node.
    pub fn new(source: SourceId, target: SourceId, rollback: Option<NodeId>) -> Self {
        Self {
            source,
            target,
            active: true,
            rollback,
            prev_source: None,
            next_source: None,
            prev_target: None,
            next_target: None,
        }
    }

    fn prev(&self, chain: Chain) -> Option<NodeId> {
        match chain {
            Chain::Sources => self.prev_source,
            Chain::Targets => self.prev_target,
        }
    }

    fn next(&self, chain: Chain) -> Option<NodeId> {
        match chain {
            Chain::Sources => self.next_source,
            Chain::Targets => self.next_target,
        }
    }

    fn set_prev(&mut self, chain: Chain, id: Option<NodeId>) {
        match chain {
            Chain::Sources => self.prev_source = id,
            Chain::Targets => self.prev_target = id,
        }
    }

    fn set_next(&mut self, chain: Chain, id: Option<NodeId>) {
        match chain {
            Chain::Sources => self.next_source = id,
            Chain::Targets => self.next_target = id,
        }
    }
}

/// Head and tail of one intrusive list of nodes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NodeList {
    head: Option<NodeId>,
    tail: Option<NodeId>,
    len: usize,
}

impl NodeList {
    /// Number of nodes in the list.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Check if the list is empty.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// The most recently appended node.
    pub fn tail(&self) -> Option<NodeId> {
        self.tail
    }

    /// Append `id` to the end of the list.
    ///
    /// The node must not currently be a member of this chain.
    pub fn push_back(&mut self, nodes: &mut SlotMap<NodeId, DepNode>, chain: Chain, id: NodeId) {
        let prev = self.tail;
        if let Some(node) = nodes.get_mut(id) {
            node.set_prev(chain, prev);
            node.set_next(chain, None);
        }

        match prev.and_then(|prev| nodes.get_mut(prev)) {
            Some(prev) => prev.set_next(chain, Some(id)),
            None => self.head = Some(id),
        }

        self.tail = Some(id);
        self.len += 1;
    }

    /// Detach `id` from the list, leaving the node itself in the arena.
    pub fn unlink(&mut self, nodes: &mut SlotMap<NodeId, DepNode>, chain: Chain, id: NodeId) {
        let Some(node) = nodes.get_mut(id) else {
            return;
        };
        let prev = node.prev(chain);
        let next = node.next(chain);
        node.set_prev(chain, None);
        node.set_next(chain, None);

        match prev.and_then(|prev| nodes.get_mut(prev)) {
            Some(prev) => prev.set_next(chain, next),
            None => self.head = next,
        }
        match next.and_then(|next| nodes.get_mut(next)) {
            Some(next) => next.set_prev(chain, prev),
            None => self.tail = prev,
        }

        self.len = self.len.saturating_sub(1);
    }

    /// Move `id` to the end of the list.
    pub fn move_to_back(&mut self, nodes: &mut SlotMap<NodeId, DepNode>, chain: Chain, id: NodeId) {
        if self.tail == Some(id) {
            return;
        }
        self.unlink(nodes, chain, id);
        self.push_back(nodes, chain, id);
    }

    /// Snapshot the list from head to tail.
    ///
    /// Callers that mutate the arena while walking use the snapshot rather
    /// than following links that may change underneath them.
    pub fn collect(&self, nodes: &SlotMap<NodeId, DepNode>, chain: Chain) -> SmallVec<[NodeId; 8]> {
        let mut out = SmallVec::with_capacity(self.len);
        let mut cursor = self.head;
        while let Some(id) = cursor {
            out.push(id);
            cursor = nodes.get(id).and_then(|node| node.next(chain));
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn arena() -> (SlotMap<SourceId, ()>, SlotMap<NodeId, DepNode>) {
        (SlotMap::with_key(), SlotMap::with_key())
    }

    #[test]
    fn push_back_preserves_order() {
        let (mut sources, mut nodes) = arena();
        let source = sources.insert(());
        let target = sources.insert(());

        let mut list = NodeList::default();
        let a = nodes.insert(DepNode::new(source, target, None));
        let b = nodes.insert(DepNode::new(source, target, None));
        let c = nodes.insert(DepNode::new(source, target, None));
        list.push_back(&mut nodes, Chain::Sources, a);
        list.push_back(&mut nodes, Chain::Sources, b);
        list.push_back(&mut nodes, Chain::Sources, c);

        assert_eq!(list.len(), 3);
        assert_eq!(list.collect(&nodes, Chain::Sources).as_slice(), &[a, b, c]);
        assert_eq!(list.tail(), Some(c));
    }

    #[test]
    fn unlink_middle_head_and_tail() {
        let (mut sources, mut nodes) = arena();
        let source = sources.insert(());
        let target = sources.insert(());

        let mut list = NodeList::default();
        let ids: Vec<_> = (0..4)
            .map(|_| nodes.insert(DepNode::new(source, target, None)))
            .collect();
        for &id in &ids {
            list.push_back(&mut nodes, Chain::Targets, id);
        }

        list.unlink(&mut nodes, Chain::Targets, ids[1]);
        assert_eq!(list.collect(&nodes, Chain::Targets).as_slice(), &[ids[0], ids[2], ids[3]]);

        list.unlink(&mut nodes, Chain::Targets, ids[0]);
        list.unlink(&mut nodes, Chain::Targets, ids[3]);
        assert_eq!(list.collect(&nodes, Chain::Targets).as_slice(), &[ids[2]]);
        assert_eq!(list.tail(), Some(ids[2]));

        list.unlink(&mut nodes, Chain::Targets, ids[2]);
        assert!(list.is_empty());
        assert_eq!(list, NodeList::default());
    }

    #[test]
    fn chains_are_independent() {
        let (mut sources, mut nodes) = arena();
        let source = sources.insert(());
        let target = sources.insert(());

        let mut by_source = NodeList::default();
        let mut by_target = NodeList::default();
        let a = nodes.insert(DepNode::new(source, target, None));
        let b = nodes.insert(DepNode::new(source, target, None));

        by_source.push_back(&mut nodes, Chain::Sources, a);
        by_source.push_back(&mut nodes, Chain::Sources, b);
        by_target.push_back(&mut nodes, Chain::Targets, b);
        by_target.push_back(&mut nodes, Chain::Targets, a);

        by_source.unlink(&mut nodes, Chain::Sources, a);

        assert_eq!(by_source.collect(&nodes, Chain::Sources).as_slice(), &[b]);
        assert_eq!(by_target.collect(&nodes, Chain::Targets).as_slice(), &[b, a]);
    }

    #[test]
    fn move_to_back_reorders() {
        let (mut sources, mut nodes) = arena();
        let source = sources.insert(());
        let target = sources.insert(());

        let mut list = NodeList::default();
        let a = nodes.insert(DepNode::new(source, target, None));
        let b = nodes.insert(DepNode::new(source, target, None));
        list.push_back(&mut nodes, Chain::Sources, a);
        list.push_back(&mut nodes, Chain::Sources, b);

        list.move_to_back(&mut nodes, Chain::Sources, a);
        assert_eq!(list.collect(&nodes, Chain::Sources).as_slice(), &[b, a]);
        assert_eq!(list.len(), 2);
    }
}
