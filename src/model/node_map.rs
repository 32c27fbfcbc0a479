use super::NodeId;
use std::collections::HashMap;

/// Transient per-pass scratch state keyed by node identity, with an explicit
/// default for absent keys. Created fresh for each compiler or algorithm
/// pass and discarded at pass end; never persisted.
///
/// Presence is key membership, so `contains` stays correct even when the
/// stored value equals the default.
#[derive(Debug, Clone)]
pub struct NodeMap<V> {
    entries: HashMap<NodeId, V>,
    default: V,
}

impl<V> NodeMap<V> {
    pub fn new(default: V) -> Self {
        Self {
            entries: HashMap::new(),
            default,
        }
    }

    pub fn get(&self, node: NodeId) -> &V {
        self.entries.get(&node).unwrap_or(&self.default)
    }

    pub fn set(&mut self, node: NodeId, value: V) {
        self.entries.insert(node, value);
    }

    pub fn contains(&self, node: NodeId) -> bool {
        self.entries.contains_key(&node)
    }

    pub fn remove(&mut self, node: NodeId) -> Option<V> {
        self.entries.remove(&node)
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<V: Default> Default for NodeMap<V> {
    fn default() -> Self {
        Self::new(V::default())
    }
}
