use crate::dtype::ElementType;
use crate::vector::NumericVector;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

pub mod node;
pub mod node_map;
pub mod topology;
pub mod transform;

use node::{ComputeContext, ComputeError, Node};
use topology::{TopologicalOrder, would_close_cycle};

#[derive(Debug, thiserror::Error)]
pub enum ModelError {
    #[error("Element type mismatch: declared {expected}, upstream port \"{port_name}\" is {found}")]
    TypeMismatch {
        expected: ElementType,
        found: ElementType,
        port_name: String,
    },
    #[error("Adding node {type_tag} would create a dependency cycle")]
    CycleDetected { type_tag: String },
    #[error("No node with id {0:?}")]
    NodeNotFound(NodeId),
    #[error("No output port with id {0:?}")]
    PortNotFound(PortId),
    #[error("Output port \"{0}\" already has a producer")]
    PortAlreadyProduced(String),
    #[error("Range of {len} elements at {start} exceeds port \"{port_name}\" of size {size}")]
    InvalidRange {
        port_name: String,
        start: usize,
        len: usize,
        size: usize,
    },
    #[error("Size mismatch on \"{port_name}\": expected {expected}, found {found}")]
    SizeMismatch {
        port_name: String,
        expected: usize,
        found: usize,
    },
    #[error("Duplicate output port name \"{0}\" on a single node")]
    DuplicatePortName(String),
    #[error("A node must declare at least one output port")]
    NoOutputs,
    #[error("Input \"{0}\" references no output port ranges")]
    EmptyInput(String),
    #[error("Output port {0:?} has no mapping in the destination model")]
    UnmappedPort(PortId),
}

#[derive(Debug, Clone, Copy, Hash, Ord, PartialOrd, Eq, PartialEq, Serialize, Deserialize)]
pub struct NodeId {
    inner: usize,
}

impl NodeId {
    pub fn index(&self) -> usize {
        self.inner
    }
}

#[derive(Debug, Clone, Copy, Hash, Ord, PartialOrd, Eq, PartialEq, Serialize, Deserialize)]
pub struct PortId {
    inner: usize,
}

impl PortId {
    pub fn index(&self) -> usize {
        self.inner
    }
}

/// An output port living in the model's port arena. Created through
/// [`Model::new_port`], possibly before the node that produces it exists.
#[derive(Debug, Clone)]
pub struct OutputPort {
    pub name: String,
    pub dtype: ElementType,
    pub size: usize,
    producer: Option<NodeId>,
}

impl OutputPort {
    pub fn producer(&self) -> Option<NodeId> {
        self.producer
    }
}

/// A contiguous selection of elements of one upstream output port.
#[derive(Debug, Clone, Copy, Hash, Eq, PartialEq, Serialize, Deserialize)]
pub struct PortRange {
    pub port: PortId,
    pub start: usize,
    pub len: usize,
}

impl PortRange {
    pub fn new(port: PortId, start: usize, len: usize) -> Self {
        Self { port, start, len }
    }
}

/// One declared input of a node: a name, the element type every referenced
/// range must carry, and the ordered ranges whose elements concatenate into
/// the input value.
#[derive(Debug, Clone)]
pub struct InputBinding {
    pub name: &'static str,
    pub dtype: ElementType,
    pub ranges: Vec<PortRange>,
}

impl InputBinding {
    pub fn new(name: &'static str, dtype: ElementType, ranges: Vec<PortRange>) -> Self {
        Self {
            name,
            dtype,
            ranges,
        }
    }

    pub fn len(&self) -> usize {
        self.ranges.iter().map(|r| r.len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.ranges.is_empty()
    }
}

/// Owning container for a node graph. Nodes and output ports live in arenas
/// keyed by monotonically assigned ids; dependency edges are implied by the
/// port ranges each node's inputs reference. The graph is acyclic at all
/// times: an add that would close a cycle is rejected before any mutation.
pub struct Model {
    nodes: HashMap<NodeId, Box<dyn Node>>,
    ports: HashMap<PortId, OutputPort>,
    consumers: HashMap<PortId, Vec<NodeId>>,
    next_node_id: usize,
    next_port_id: usize,
}

impl Default for Model {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Model {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut tags: Vec<(usize, String)> = self
            .nodes
            .iter()
            .map(|(id, node)| (id.index(), node.type_tag()))
            .collect();
        tags.sort();
        f.debug_struct("Model")
            .field("nodes", &tags)
            .field("ports", &self.ports.len())
            .finish()
    }
}

impl Model {
    pub fn new() -> Self {
        Self {
            nodes: HashMap::new(),
            ports: HashMap::new(),
            consumers: HashMap::new(),
            next_node_id: 0,
            next_port_id: 0,
        }
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Node ids in insertion order.
    pub fn node_ids(&self) -> Vec<NodeId> {
        let mut ids: Vec<_> = self.nodes.keys().copied().collect();
        ids.sort();
        ids
    }

    pub fn node(&self, id: NodeId) -> Result<&dyn Node, ModelError> {
        self.nodes
            .get(&id)
            .map(|n| n.as_ref())
            .ok_or(ModelError::NodeNotFound(id))
    }

    pub fn port(&self, id: PortId) -> Result<&OutputPort, ModelError> {
        self.ports.get(&id).ok_or(ModelError::PortNotFound(id))
    }

    /// Creates an output port in the arena. The port is unproduced until a
    /// node declaring it as an output is added.
    pub fn new_port(&mut self, name: impl Into<String>, dtype: ElementType, size: usize) -> PortId {
        let id = PortId {
            inner: self.next_port_id,
        };
        self.next_port_id += 1;
        self.ports.insert(
            id,
            OutputPort {
                name: name.into(),
                dtype,
                size,
                producer: None,
            },
        );
        id
    }

    pub fn full_range(&self, port: PortId) -> Result<PortRange, ModelError> {
        let p = self.port(port)?;
        Ok(PortRange::new(port, 0, p.size))
    }

    pub(crate) fn consumers_of(&self, port: PortId) -> &[NodeId] {
        self.consumers.get(&port).map(|v| v.as_slice()).unwrap_or(&[])
    }

    pub fn add_node(&mut self, node: impl Node + 'static) -> Result<NodeId, ModelError> {
        self.add_boxed_node(Box::new(node))
    }

    pub fn add_boxed_node(&mut self, node: Box<dyn Node>) -> Result<NodeId, ModelError> {
        let outputs = node.outputs();
        if outputs.is_empty() {
            return Err(ModelError::NoOutputs);
        }
        let mut seen_names: Vec<&str> = Vec::new();
        for port_id in &outputs {
            let port = self.port(*port_id)?;
            if port.producer.is_some() {
                return Err(ModelError::PortAlreadyProduced(port.name.clone()));
            }
            if seen_names.contains(&port.name.as_str()) {
                return Err(ModelError::DuplicatePortName(port.name.clone()));
            }
            seen_names.push(port.name.as_str());
        }

        let bindings = node.inputs();
        for binding in &bindings {
            if binding.ranges.is_empty() {
                return Err(ModelError::EmptyInput(binding.name.to_string()));
            }
            for range in &binding.ranges {
                if outputs.contains(&range.port) {
                    return Err(ModelError::CycleDetected {
                        type_tag: node.type_tag(),
                    });
                }
                let port = self.port(range.port)?;
                if port.dtype != binding.dtype {
                    return Err(ModelError::TypeMismatch {
                        expected: binding.dtype,
                        found: port.dtype,
                        port_name: port.name.clone(),
                    });
                }
                if range.len == 0 || range.start + range.len > port.size {
                    return Err(ModelError::InvalidRange {
                        port_name: port.name.clone(),
                        start: range.start,
                        len: range.len,
                        size: port.size,
                    });
                }
            }
        }

        if would_close_cycle(self, &outputs, &bindings) {
            return Err(ModelError::CycleDetected {
                type_tag: node.type_tag(),
            });
        }

        // All checks passed; commit.
        let node_id = NodeId {
            inner: self.next_node_id,
        };
        self.next_node_id += 1;
        for port_id in &outputs {
            if let Some(port) = self.ports.get_mut(port_id) {
                port.producer = Some(node_id);
            }
        }
        for binding in &bindings {
            for range in &binding.ranges {
                let entry = self.consumers.entry(range.port).or_default();
                if !entry.contains(&node_id) {
                    entry.push(node_id);
                }
            }
        }
        self.nodes.insert(node_id, node);
        Ok(node_id)
    }

    /// Deterministic dependency order: every node after its producers, ties
    /// between independent nodes broken by insertion order.
    pub fn topological_order(&self) -> TopologicalOrder<'_> {
        TopologicalOrder::new(self)
    }

    /// Applies `f` to every node in topological order, stopping at the first
    /// error.
    pub fn visit<E, F>(&self, mut f: F) -> Result<(), E>
    where
        F: FnMut(NodeId, &dyn Node) -> Result<(), E>,
    {
        for id in self.topological_order() {
            f(id, self.nodes[&id].as_ref())?;
        }
        Ok(())
    }

    /// Nodes downcastable to `N`, in insertion order.
    pub fn nodes_of_type<N: Node + 'static>(&self) -> Vec<(NodeId, &N)> {
        let mut found: Vec<(NodeId, &N)> = self
            .nodes
            .iter()
            .filter_map(|(id, n)| n.as_any().downcast_ref::<N>().map(|n| (*id, n)))
            .collect();
        found.sort_by_key(|(id, _)| *id);
        found
    }

    /// Named external inputs, in insertion order.
    pub fn sources(&self) -> Vec<(String, NodeId)> {
        let mut out = Vec::new();
        for id in self.node_ids() {
            if let Some(name) = self.nodes[&id].source_name() {
                out.push((name.to_string(), id));
            }
        }
        out
    }

    /// Named external outputs, in insertion order.
    pub fn sinks(&self) -> Vec<(String, NodeId)> {
        let mut out = Vec::new();
        for id in self.node_ids() {
            if let Some(name) = self.nodes[&id].sink_name() {
                out.push((name.to_string(), id));
            }
        }
        out
    }

    /// Interpreted execution: walks nodes once in topological order, caching
    /// every produced port value for the duration of the call, and returns the
    /// values of all sink nodes keyed by sink name.
    pub fn compute(
        &self,
        external: &HashMap<String, NumericVector>,
    ) -> Result<HashMap<String, NumericVector>, ComputeError> {
        let mut port_values: HashMap<PortId, NumericVector> = HashMap::new();
        let mut results = HashMap::new();
        for node_id in self.topological_order() {
            let node = self.nodes[&node_id].as_ref();
            let mut wired = Vec::new();
            for binding in node.inputs() {
                wired.push(self.gather_ranges(&binding.ranges, &port_values)?);
            }
            let ctx = ComputeContext::new(wired, external);
            let values = node.compute(&ctx)?;
            let declared = node.outputs();
            if values.len() != declared.len() {
                return Err(ComputeError::InvalidNodeOutput {
                    type_tag: node.type_tag(),
                    port_name: "<arity>".to_string(),
                });
            }
            for (port_id, value) in declared.iter().zip(values) {
                let port = self.port(*port_id)?;
                if value.dtype() != port.dtype || value.len() != port.size {
                    return Err(ComputeError::InvalidNodeOutput {
                        type_tag: node.type_tag(),
                        port_name: port.name.clone(),
                    });
                }
                port_values.insert(*port_id, value);
            }
            if let Some(name) = node.sink_name() {
                if let Some(first) = declared.first() {
                    if let Some(value) = port_values.get(first) {
                        results.insert(name.to_string(), value.clone());
                    }
                }
            }
        }
        Ok(results)
    }

    fn gather_ranges(
        &self,
        ranges: &[PortRange],
        port_values: &HashMap<PortId, NumericVector>,
    ) -> Result<NumericVector, ComputeError> {
        let mut parts = Vec::with_capacity(ranges.len());
        for range in ranges {
            let port = self.port(range.port)?;
            let value = port_values
                .get(&range.port)
                .ok_or_else(|| ComputeError::DanglingPort(port.name.clone()))?;
            if range.start == 0 && range.len == value.len() {
                parts.push(value.clone());
            } else {
                parts.push(value.slice(range.start, range.len)?);
            }
        }
        if parts.len() == 1 {
            Ok(parts.remove(0))
        } else {
            Ok(NumericVector::concat(&parts)?)
        }
    }
}
