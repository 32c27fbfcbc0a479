use super::{InputBinding, Model, NodeId, PortId};
use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap, HashSet};

/// Reverse-reachability check run before a node is committed: adding a node
/// closes a cycle exactly when some existing consumer of a port the node
/// claims can already reach some producer of a port the node consumes.
pub(crate) fn would_close_cycle(
    model: &Model,
    claimed: &[PortId],
    bindings: &[InputBinding],
) -> bool {
    let mut targets: HashSet<NodeId> = HashSet::new();
    for binding in bindings {
        for range in &binding.ranges {
            if let Some(port) = model.ports.get(&range.port) {
                if let Some(producer) = port.producer() {
                    targets.insert(producer);
                }
            }
        }
    }
    if targets.is_empty() {
        return false;
    }

    let mut stack: Vec<NodeId> = Vec::new();
    for port in claimed {
        stack.extend_from_slice(model.consumers_of(*port));
    }
    let mut visited: HashSet<NodeId> = HashSet::new();
    while let Some(id) = stack.pop() {
        if !visited.insert(id) {
            continue;
        }
        if targets.contains(&id) {
            return true;
        }
        if let Some(node) = model.nodes.get(&id) {
            for out in node.outputs() {
                stack.extend_from_slice(model.consumers_of(out));
            }
        }
    }
    false
}

/// Lazy dependency-order iterator over a model's nodes. Every node is yielded
/// after all of its producers; among the ready set the smallest id (earliest
/// inserted) is yielded first, so the order is fully deterministic. Each call
/// to [`Model::topological_order`] starts a fresh traversal.
pub struct TopologicalOrder<'a> {
    model: &'a Model,
    ready: BinaryHeap<Reverse<NodeId>>,
    pending: HashMap<NodeId, usize>,
}

impl<'a> TopologicalOrder<'a> {
    pub(crate) fn new(model: &'a Model) -> Self {
        let mut ready = BinaryHeap::new();
        let mut pending = HashMap::new();
        for (id, node) in &model.nodes {
            let mut producers: HashSet<NodeId> = HashSet::new();
            for binding in node.inputs() {
                for range in &binding.ranges {
                    if let Some(port) = model.ports.get(&range.port) {
                        if let Some(producer) = port.producer() {
                            producers.insert(producer);
                        }
                    }
                }
            }
            if producers.is_empty() {
                ready.push(Reverse(*id));
            } else {
                pending.insert(*id, producers.len());
            }
        }
        Self {
            model,
            ready,
            pending,
        }
    }
}

impl Iterator for TopologicalOrder<'_> {
    type Item = NodeId;

    fn next(&mut self) -> Option<Self::Item> {
        let Reverse(id) = self.ready.pop()?;
        let mut unlocked: HashSet<NodeId> = HashSet::new();
        if let Some(node) = self.model.nodes.get(&id) {
            for out in node.outputs() {
                for consumer in self.model.consumers_of(out) {
                    unlocked.insert(*consumer);
                }
            }
        }
        for consumer in unlocked {
            if let Some(count) = self.pending.get_mut(&consumer) {
                *count -= 1;
                if *count == 0 {
                    self.pending.remove(&consumer);
                    self.ready.push(Reverse(consumer));
                }
            }
        }
        Some(id)
    }
}
