use crate::dtype::ElementType;
use crate::model::node_map::NodeMap;
use crate::model::{Model, ModelError, NodeId};
use crate::vector::NumericVector;

pub mod program;
pub mod target;

pub use program::{Program, ProgramError};
pub use target::{TargetBuilder, TargetOp, ValueId};

#[derive(Debug, thiserror::Error)]
pub enum CompileError {
    #[error("No lowering for node {type_tag}; refine the model to a fixed point first")]
    UnsupportedNode { type_tag: String },
    #[error("Port \"{0}\" is consumed but has no producing node")]
    DanglingPort(String),
    #[error("Node {type_tag} did not define a value for output {index}")]
    MissingOutputValue { type_tag: String, index: usize },
    #[error("No emitted value handle for port \"{0}\"")]
    MissingValueHandle(String),
    #[error("No input binding at index {0}")]
    InputIndexOutOfRange(usize),
    #[error("No output port at index {0}")]
    OutputIndexOutOfRange(usize),
    #[error("Value {0} is not defined in the target")]
    UndefinedValue(ValueId),
    #[error("Wrong argument count for target operation {op}")]
    WrongArity { op: String },
    #[error(transparent)]
    Model(#[from] ModelError),
}

/// Per-node view of the compilation handed to [`Node::lower`]. Input values
/// resolve through the handles of already-lowered producers; partial and
/// multi-range inputs are materialized with slice/concat operations on the
/// target as needed.
///
/// [`Node::lower`]: crate::model::node::Node::lower
pub struct LowerContext<'a> {
    model: &'a Model,
    node: NodeId,
    target: &'a mut dyn TargetBuilder,
    values: &'a NodeMap<Vec<ValueId>>,
    outputs: Vec<Option<ValueId>>,
}

impl<'a> LowerContext<'a> {
    /// The value handle for the node's input binding at `index`, emitting
    /// slice/concat target operations when the wiring is not one full port.
    pub fn input_value(&mut self, index: usize) -> Result<ValueId, CompileError> {
        let node = self.model.node(self.node)?;
        let bindings = node.inputs();
        let binding = bindings
            .get(index)
            .ok_or(CompileError::InputIndexOutOfRange(index))?;
        let mut parts = Vec::with_capacity(binding.ranges.len());
        for range in &binding.ranges {
            let port = self.model.port(range.port)?;
            let producer = port
                .producer()
                .ok_or_else(|| CompileError::DanglingPort(port.name.clone()))?;
            let producer_node = self.model.node(producer)?;
            let slot = producer_node
                .outputs()
                .iter()
                .position(|p| *p == range.port)
                .ok_or_else(|| CompileError::MissingValueHandle(port.name.clone()))?;
            let handle = self
                .values
                .get(producer)
                .get(slot)
                .copied()
                .ok_or_else(|| CompileError::MissingValueHandle(port.name.clone()))?;
            if range.start == 0 && range.len == port.size {
                parts.push(handle);
            } else {
                parts.push(self.target.emit(
                    TargetOp::Slice {
                        start: range.start,
                        len: range.len,
                    },
                    &[handle],
                    port.dtype,
                    range.len,
                )?);
            }
        }
        if parts.len() == 1 {
            Ok(parts[0])
        } else {
            self.target
                .emit(TargetOp::Concat, &parts, binding.dtype, binding.len())
        }
    }

    pub fn emit(
        &mut self,
        op: TargetOp,
        args: &[ValueId],
        dtype: ElementType,
        size: usize,
    ) -> Result<ValueId, CompileError> {
        self.target.emit(op, args, dtype, size)
    }

    pub fn emit_constant(&mut self, value: NumericVector) -> Result<ValueId, CompileError> {
        self.target.emit_constant(value)
    }

    pub fn bind_input(
        &mut self,
        name: &str,
        dtype: ElementType,
        size: usize,
    ) -> Result<ValueId, CompileError> {
        self.target.bind_input(name, dtype, size)
    }

    pub fn mark_output(&mut self, name: &str, value: ValueId) -> Result<(), CompileError> {
        self.target.mark_output(name, value)
    }

    /// Registers the handle that now carries the node's output port at
    /// `index`. Every output must be defined before `lower` returns.
    pub fn define_output(&mut self, index: usize, value: ValueId) -> Result<(), CompileError> {
        let slot = self
            .outputs
            .get_mut(index)
            .ok_or(CompileError::OutputIndexOutOfRange(index))?;
        *slot = Some(value);
        Ok(())
    }
}

/// Walks a model in dependency order and lowers each node against a target
/// builder exactly once, threading output-port handles from producers to
/// consumers through a per-run [`NodeMap`]. Compiling the same model twice
/// against fresh builders emits the identical sequence.
pub struct Compiler<'m> {
    model: &'m Model,
}

impl<'m> Compiler<'m> {
    pub fn new(model: &'m Model) -> Self {
        Self { model }
    }

    pub fn compile(&self, target: &mut dyn TargetBuilder) -> Result<(), CompileError> {
        let mut emitted: NodeMap<bool> = NodeMap::new(false);
        let mut values: NodeMap<Vec<ValueId>> = NodeMap::new(Vec::new());
        for node_id in self.model.topological_order() {
            if *emitted.get(node_id) {
                continue;
            }
            let node = self.model.node(node_id)?;
            let arity = node.outputs().len();
            let mut ctx = LowerContext {
                model: self.model,
                node: node_id,
                target: &mut *target,
                values: &values,
                outputs: vec![None; arity],
            };
            node.lower(&mut ctx)?;
            let defined = ctx.outputs;
            let mut handles = Vec::with_capacity(arity);
            for (index, handle) in defined.into_iter().enumerate() {
                handles.push(handle.ok_or_else(|| CompileError::MissingOutputValue {
                    type_tag: node.type_tag(),
                    index,
                })?);
            }
            values.set(node_id, handles);
            emitted.set(node_id, true);
        }
        log::debug!("lowered {} nodes", self.model.node_count());
        Ok(())
    }
}

/// Compiles `model` into the bundled sequential program representation.
pub fn compile_to_program(model: &Model) -> Result<Program, CompileError> {
    let mut program = Program::new();
    Compiler::new(model).compile(&mut program)?;
    Ok(program)
}
