//! Versioned model serialization. A model becomes a flat [`ModelArchive`]:
//! one property record per node plus the port wiring as explicit edges, with
//! ports themselves re-derived by node constructors when reading back. Node
//! kinds are looked up by stable type tag in the [`registry`], so downstream
//! crates can archive their own node types.

use crate::model::{Model, ModelError, PortId, PortRange};
use crate::vector::{NumericMatrix, NumericVector};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

pub mod registry;

pub use registry::{NodeFactory, register_builtin_nodes, register_node_type};

/// Version of the archive container layout itself. Node records carry their
/// own per-kind versions on top of this.
pub const FORMAT_VERSION: u32 = 1;

#[derive(Debug, thiserror::Error)]
pub enum ArchiveError {
    #[error("Unknown archived node type \"{0}\"")]
    UnknownArchiveType(String),
    #[error("Archived {type_tag} has version {found}, newest readable is {supported}")]
    UnsupportedArchiveVersion {
        type_tag: String,
        found: u32,
        supported: u32,
    },
    #[error("Archive format version {0} is newer than this build's {latest}", latest = FORMAT_VERSION)]
    UnsupportedFormatVersion(u32),
    #[error("Node {type_tag} is missing required property \"{name}\"")]
    MissingProperty { type_tag: String, name: String },
    #[error("Property \"{name}\" of {type_tag} has the wrong shape")]
    WrongPropertyType { type_tag: String, name: String },
    #[error("Archived node {type_tag} has no wiring for input \"{name}\"")]
    MissingInputWiring { type_tag: String, name: String },
    #[error("Archived edge references unknown node {0}")]
    UnknownArchivedNode(u64),
    #[error("Archived edge references unknown port \"{port}\" of node {node}")]
    UnknownArchivedPort { node: u64, port: String },
    #[error("Archive contains node {0} more than once")]
    DuplicateArchivedNode(u64),
    #[error("Archived node {0} depends on a node that is not in the archive or forms a cycle")]
    UnresolvableNode(u64),
    #[error("Factory for \"{type_tag}\" returned a port with no producing node")]
    FactoryWithoutNode { type_tag: String },
    #[error("Port \"{0}\" is consumed but has no producing node")]
    DanglingPort(String),
    #[error(transparent)]
    Model(#[from] ModelError),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// One serializable property value. `Record` nests a named property list for
/// node kinds whose parameters are themselves structured.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ArchiveValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    Seq(Vec<ArchiveValue>),
    Vector(NumericVector),
    Matrix(NumericMatrix),
    Record(Vec<(String, ArchiveValue)>),
}

impl From<bool> for ArchiveValue {
    fn from(value: bool) -> Self {
        ArchiveValue::Bool(value)
    }
}

impl From<i64> for ArchiveValue {
    fn from(value: i64) -> Self {
        ArchiveValue::Int(value)
    }
}

impl From<u32> for ArchiveValue {
    fn from(value: u32) -> Self {
        ArchiveValue::Int(i64::from(value))
    }
}

impl From<usize> for ArchiveValue {
    fn from(value: usize) -> Self {
        ArchiveValue::Int(value as i64)
    }
}

impl From<f64> for ArchiveValue {
    fn from(value: f64) -> Self {
        ArchiveValue::Float(value)
    }
}

impl From<&str> for ArchiveValue {
    fn from(value: &str) -> Self {
        ArchiveValue::Str(value.to_string())
    }
}

impl From<String> for ArchiveValue {
    fn from(value: String) -> Self {
        ArchiveValue::Str(value)
    }
}

impl From<Vec<ArchiveValue>> for ArchiveValue {
    fn from(value: Vec<ArchiveValue>) -> Self {
        ArchiveValue::Seq(value)
    }
}

impl From<NumericVector> for ArchiveValue {
    fn from(value: NumericVector) -> Self {
        ArchiveValue::Vector(value)
    }
}

impl From<NumericMatrix> for ArchiveValue {
    fn from(value: NumericMatrix) -> Self {
        ArchiveValue::Matrix(value)
    }
}

impl From<PropertyWriter> for ArchiveValue {
    fn from(value: PropertyWriter) -> Self {
        ArchiveValue::Record(value.into_properties())
    }
}

/// Conversion out of an [`ArchiveValue`], used by [`NodeReadContext`] property
/// accessors. `None` means the value had the wrong shape.
pub trait FromArchiveValue: Sized {
    fn from_archive_value(value: &ArchiveValue) -> Option<Self>;
}

impl FromArchiveValue for bool {
    fn from_archive_value(value: &ArchiveValue) -> Option<Self> {
        match value {
            ArchiveValue::Bool(v) => Some(*v),
            _ => None,
        }
    }
}

impl FromArchiveValue for i64 {
    fn from_archive_value(value: &ArchiveValue) -> Option<Self> {
        match value {
            ArchiveValue::Int(v) => Some(*v),
            _ => None,
        }
    }
}

impl FromArchiveValue for i32 {
    fn from_archive_value(value: &ArchiveValue) -> Option<Self> {
        match value {
            ArchiveValue::Int(v) => i32::try_from(*v).ok(),
            _ => None,
        }
    }
}

impl FromArchiveValue for u32 {
    fn from_archive_value(value: &ArchiveValue) -> Option<Self> {
        match value {
            ArchiveValue::Int(v) => u32::try_from(*v).ok(),
            _ => None,
        }
    }
}

impl FromArchiveValue for usize {
    fn from_archive_value(value: &ArchiveValue) -> Option<Self> {
        match value {
            ArchiveValue::Int(v) => usize::try_from(*v).ok(),
            _ => None,
        }
    }
}

impl FromArchiveValue for f64 {
    fn from_archive_value(value: &ArchiveValue) -> Option<Self> {
        match value {
            ArchiveValue::Float(v) => Some(*v),
            _ => None,
        }
    }
}

impl FromArchiveValue for f32 {
    fn from_archive_value(value: &ArchiveValue) -> Option<Self> {
        match value {
            ArchiveValue::Float(v) => Some(*v as f32),
            _ => None,
        }
    }
}

impl FromArchiveValue for String {
    fn from_archive_value(value: &ArchiveValue) -> Option<Self> {
        match value {
            ArchiveValue::Str(v) => Some(v.clone()),
            _ => None,
        }
    }
}

impl FromArchiveValue for NumericVector {
    fn from_archive_value(value: &ArchiveValue) -> Option<Self> {
        match value {
            ArchiveValue::Vector(v) => Some(v.clone()),
            _ => None,
        }
    }
}

impl FromArchiveValue for NumericMatrix {
    fn from_archive_value(value: &ArchiveValue) -> Option<Self> {
        match value {
            ArchiveValue::Matrix(v) => Some(v.clone()),
            _ => None,
        }
    }
}

impl<V: FromArchiveValue> FromArchiveValue for Vec<V> {
    fn from_archive_value(value: &ArchiveValue) -> Option<Self> {
        match value {
            ArchiveValue::Seq(items) => items.iter().map(V::from_archive_value).collect(),
            _ => None,
        }
    }
}

/// The archived form of one node: its parameters, not its wiring.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArchiveRecord {
    pub id: u64,
    pub type_tag: String,
    pub version: u32,
    pub properties: Vec<(String, ArchiveValue)>,
}

/// One wired port range, recorded as (consumer, input name) against
/// (producer, port name).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArchivedEdge {
    pub to_node: u64,
    pub to_input: String,
    pub from_node: u64,
    pub from_port: String,
    pub start: u64,
    pub len: u64,
}

/// A whole model in archived form. Two models serialize to equal archives
/// exactly when they are structurally identical, so this doubles as the
/// model's comparison key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelArchive {
    pub format_version: u32,
    pub nodes: Vec<ArchiveRecord>,
    pub edges: Vec<ArchivedEdge>,
}

/// Collects the named properties a node writes during archiving.
#[derive(Debug, Default)]
pub struct PropertyWriter {
    properties: Vec<(String, ArchiveValue)>,
}

impl PropertyWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn write(&mut self, name: &str, value: impl Into<ArchiveValue>) {
        self.properties.push((name.to_string(), value.into()));
    }

    fn into_properties(self) -> Vec<(String, ArchiveValue)> {
        self.properties
    }
}

/// Everything a node factory needs to rebuild one archived node: mutable
/// access to the model under construction, the node's property record, and
/// its input wiring resolved to ports that already exist in that model.
pub struct NodeReadContext<'a> {
    model: &'a mut Model,
    record: &'a ArchiveRecord,
    inputs: HashMap<String, Vec<PortRange>>,
}

impl<'a> NodeReadContext<'a> {
    pub fn model(&mut self) -> &mut Model {
        self.model
    }

    pub fn type_tag(&self) -> &str {
        &self.record.type_tag
    }

    pub fn version(&self) -> u32 {
        self.record.version
    }

    /// Rejects records written by a build newer than what this reader
    /// understands.
    pub fn require_version(&self, supported: u32) -> Result<(), ArchiveError> {
        if self.record.version > supported {
            return Err(ArchiveError::UnsupportedArchiveVersion {
                type_tag: self.record.type_tag.clone(),
                found: self.record.version,
                supported,
            });
        }
        Ok(())
    }

    pub fn raw_property(&self, name: &str) -> Option<&ArchiveValue> {
        self.record
            .properties
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v)
    }

    pub fn property<V: FromArchiveValue>(&self, name: &str) -> Result<V, ArchiveError> {
        let value = self
            .raw_property(name)
            .ok_or_else(|| ArchiveError::MissingProperty {
                type_tag: self.record.type_tag.clone(),
                name: name.to_string(),
            })?;
        V::from_archive_value(value).ok_or_else(|| ArchiveError::WrongPropertyType {
            type_tag: self.record.type_tag.clone(),
            name: name.to_string(),
        })
    }

    pub fn optional_property<V: FromArchiveValue>(
        &self,
        name: &str,
    ) -> Result<Option<V>, ArchiveError> {
        match self.raw_property(name) {
            None => Ok(None),
            Some(value) => {
                V::from_archive_value(value)
                    .map(Some)
                    .ok_or_else(|| ArchiveError::WrongPropertyType {
                        type_tag: self.record.type_tag.clone(),
                        name: name.to_string(),
                    })
            }
        }
    }

    /// The resolved wiring for the input binding called `name`.
    pub fn input(&self, name: &str) -> Result<Vec<PortRange>, ArchiveError> {
        self.inputs
            .get(name)
            .cloned()
            .ok_or_else(|| ArchiveError::MissingInputWiring {
                type_tag: self.record.type_tag.clone(),
                name: name.to_string(),
            })
    }
}

/// Serializes `model`. Nodes are recorded in insertion order, each node's
/// edges in binding order, so equal models produce byte-equal archives.
pub fn write_model(model: &Model) -> Result<ModelArchive, ArchiveError> {
    let mut nodes = Vec::new();
    let mut edges = Vec::new();
    for node_id in model.node_ids() {
        let node = model.node(node_id)?;
        let mut writer = PropertyWriter::new();
        node.write_properties(&mut writer);
        nodes.push(ArchiveRecord {
            id: node_id.index() as u64,
            type_tag: node.type_tag(),
            version: node.archive_version(),
            properties: writer.into_properties(),
        });
        for binding in node.inputs() {
            for range in &binding.ranges {
                let port = model.port(range.port)?;
                let producer = port
                    .producer()
                    .ok_or_else(|| ArchiveError::DanglingPort(port.name.clone()))?;
                edges.push(ArchivedEdge {
                    to_node: node_id.index() as u64,
                    to_input: binding.name.to_string(),
                    from_node: producer.index() as u64,
                    from_port: port.name.clone(),
                    start: range.start as u64,
                    len: range.len as u64,
                });
            }
        }
    }
    Ok(ModelArchive {
        format_version: FORMAT_VERSION,
        nodes,
        edges,
    })
}

/// Rebuilds a model from its archive through the node-type registry. Records
/// are constructed producers-first; for models whose insertion order already
/// respects dependencies (anything built through the node constructors) this
/// preserves the original node numbering.
pub fn read_model(archive: &ModelArchive) -> Result<Model, ArchiveError> {
    if archive.format_version > FORMAT_VERSION {
        return Err(ArchiveError::UnsupportedFormatVersion(archive.format_version));
    }
    register_builtin_nodes();

    let mut model = Model::new();
    let mut ports: HashMap<u64, Vec<(String, PortId)>> = HashMap::new();
    let mut done = vec![false; archive.nodes.len()];
    loop {
        let mut progressed = false;
        for (index, record) in archive.nodes.iter().enumerate() {
            if done[index] {
                continue;
            }
            let ready = archive
                .edges
                .iter()
                .filter(|e| e.to_node == record.id)
                .all(|e| ports.contains_key(&e.from_node));
            if !ready {
                continue;
            }
            if ports.contains_key(&record.id) {
                return Err(ArchiveError::DuplicateArchivedNode(record.id));
            }

            let mut inputs: HashMap<String, Vec<PortRange>> = HashMap::new();
            for edge in archive.edges.iter().filter(|e| e.to_node == record.id) {
                let named = ports
                    .get(&edge.from_node)
                    .ok_or(ArchiveError::UnknownArchivedNode(edge.from_node))?;
                let port = named
                    .iter()
                    .find(|(name, _)| *name == edge.from_port)
                    .map(|(_, port)| *port)
                    .ok_or_else(|| ArchiveError::UnknownArchivedPort {
                        node: edge.from_node,
                        port: edge.from_port.clone(),
                    })?;
                inputs
                    .entry(edge.to_input.clone())
                    .or_default()
                    .push(PortRange::new(port, edge.start as usize, edge.len as usize));
            }

            let factory = registry::factory_for(&record.type_tag)?;
            let mut ctx = NodeReadContext {
                model: &mut model,
                record,
                inputs,
            };
            let output = factory(&mut ctx)?;
            let producer = model.port(output)?.producer().ok_or_else(|| {
                ArchiveError::FactoryWithoutNode {
                    type_tag: record.type_tag.clone(),
                }
            })?;
            let node = model.node(producer)?;
            let mut named = Vec::new();
            for port_id in node.outputs() {
                let port = model.port(port_id)?;
                named.push((port.name.clone(), port_id));
            }
            ports.insert(record.id, named);
            done[index] = true;
            progressed = true;
        }
        if done.iter().all(|d| *d) {
            break;
        }
        if !progressed {
            let stuck = archive
                .nodes
                .iter()
                .zip(&done)
                .find(|(_, d)| !**d)
                .map(|(r, _)| r.id)
                .unwrap_or_default();
            return Err(ArchiveError::UnresolvableNode(stuck));
        }
    }
    log::debug!(
        "read archive with {} nodes and {} edges",
        archive.nodes.len(),
        archive.edges.len()
    );
    Ok(model)
}

/// Structural identity, defined as equality of archived form.
pub fn models_equal(a: &Model, b: &Model) -> Result<bool, ArchiveError> {
    Ok(write_model(a)? == write_model(b)?)
}

pub fn to_json_string(archive: &ModelArchive) -> Result<String, ArchiveError> {
    Ok(serde_json::to_string_pretty(archive)?)
}

pub fn from_json_string(text: &str) -> Result<ModelArchive, ArchiveError> {
    Ok(serde_json::from_str(text)?)
}

pub fn write_json_file(model: &Model, path: impl AsRef<Path>) -> Result<(), ArchiveError> {
    let archive = write_model(model)?;
    std::fs::write(path, to_json_string(&archive)?)?;
    Ok(())
}

pub fn read_json_file(path: impl AsRef<Path>) -> Result<Model, ArchiveError> {
    let text = std::fs::read_to_string(path)?;
    read_model(&from_json_string(&text)?)
}
