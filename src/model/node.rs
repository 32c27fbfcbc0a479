use super::{InputBinding, ModelError, PortId};
use crate::archive::PropertyWriter;
use crate::compile::{CompileError, LowerContext};
use crate::model::transform::ModelTransformer;
use crate::vector::{NumericVector, VectorError};
use std::any::Any;
use std::collections::HashMap;

#[derive(Debug, thiserror::Error)]
pub enum ComputeError {
    #[error("Missing external input \"{0}\"")]
    MissingInput(String),
    #[error("No wired input at index {0}")]
    InputIndexOutOfRange(usize),
    #[error("Port \"{0}\" is consumed but has no producing node")]
    DanglingPort(String),
    #[error("Node {type_tag} produced an invalid value for port \"{port_name}\"")]
    InvalidNodeOutput { type_tag: String, port_name: String },
    #[error(transparent)]
    Vector(#[from] VectorError),
    #[error(transparent)]
    Model(#[from] ModelError),
}

/// Resolved inputs handed to [`Node::compute`]: the wired input values in
/// binding order (ranges already gathered and concatenated), plus the
/// external values supplied to the enclosing `Model::compute` call.
pub struct ComputeContext<'a> {
    wired: Vec<NumericVector>,
    external: &'a HashMap<String, NumericVector>,
}

impl<'a> ComputeContext<'a> {
    pub(crate) fn new(
        wired: Vec<NumericVector>,
        external: &'a HashMap<String, NumericVector>,
    ) -> Self {
        Self { wired, external }
    }

    pub fn input(&self, index: usize) -> Result<&NumericVector, ComputeError> {
        self.wired
            .get(index)
            .ok_or(ComputeError::InputIndexOutOfRange(index))
    }

    pub fn external(&self, name: &str) -> Result<&NumericVector, ComputeError> {
        self.external
            .get(name)
            .ok_or_else(|| ComputeError::MissingInput(name.to_string()))
    }
}

/// The capability interface every node kind implements. The rest of the
/// system depends only on this trait: the model stores `Box<dyn Node>`, the
/// transformer drives `refine`/`copy`, the compiler drives `lower`, and the
/// archiver drives `type_tag`/`archive_version`/`write_properties`. New node
/// kinds participate in all of it without touching the core.
pub trait Node: Send + Sync {
    /// Stable archive tag; generic node families append their element type
    /// (`BinaryNode<Float32>`).
    fn type_tag(&self) -> String;

    /// Declared inputs, in the order `compute` receives them.
    fn inputs(&self) -> Vec<InputBinding>;

    /// Output ports, in declaration order. Never empty.
    fn outputs(&self) -> Vec<PortId>;

    /// Whether the node carries data beyond its port wiring (coefficients,
    /// captured constants). Stateful nodes get their state embedded as
    /// constants when lowered.
    fn has_state(&self) -> bool {
        false
    }

    /// The external-input name, for graph-boundary source nodes.
    fn source_name(&self) -> Option<&str> {
        None
    }

    /// The external-output name, for graph-boundary sink nodes.
    fn sink_name(&self) -> Option<&str> {
        None
    }

    fn compute(&self, ctx: &ComputeContext<'_>) -> Result<Vec<NumericVector>, ComputeError>;

    /// Either decline (return `Ok(false)`, the default) and be copied
    /// verbatim, or build an equivalent subgraph in the transformer's
    /// destination model, call [`ModelTransformer::map_output`] for every
    /// output port, and return `Ok(true)`.
    fn refine(&self, transformer: &mut ModelTransformer) -> Result<bool, ModelError> {
        let _ = transformer;
        Ok(false)
    }

    /// Re-creates this node in the transformer's destination model with its
    /// input ranges mapped through the port mapping, registering every output
    /// port. This is the default-copy path taken when `refine` declines.
    fn copy(&self, transformer: &mut ModelTransformer) -> Result<(), ModelError>;

    /// Emits this node against the compile target. The default declines,
    /// which the compiler reports as an unsupported node: anything without a
    /// direct lowering must have decomposed during refinement.
    fn lower(&self, ctx: &mut LowerContext<'_>) -> Result<(), CompileError> {
        let _ = ctx;
        Err(CompileError::UnsupportedNode {
            type_tag: self.type_tag(),
        })
    }

    /// Version written into this node's archive records.
    fn archive_version(&self) -> u32 {
        1
    }

    /// Serializes the node's parameters (not its wiring) as named properties.
    fn write_properties(&self, writer: &mut PropertyWriter);

    fn as_any(&self) -> &dyn Any;
}
