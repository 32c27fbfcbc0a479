use crate::archive::PropertyWriter;
use crate::compile::{CompileError, LowerContext, TargetOp};
use crate::model::node::{ComputeContext, ComputeError, Node};
use crate::model::transform::ModelTransformer;
use crate::model::{InputBinding, Model, ModelError, NodeId, PortId, PortRange};
use crate::vector::{FloatElement, NumericVector, UnaryOpKind};
use std::any::Any;
use std::marker::PhantomData;

/// Elementwise one-operand float math.
pub struct UnaryNode<T: FloatElement> {
    op: UnaryOpKind,
    input: Vec<PortRange>,
    output: PortId,
    marker: PhantomData<T>,
}

impl<T: FloatElement> UnaryNode<T> {
    pub fn new(model: &mut Model, op: UnaryOpKind, input: PortId) -> Result<PortId, ModelError> {
        let input = vec![model.full_range(input)?];
        Self::with_ranges(model, op, input)
    }

    pub fn with_ranges(
        model: &mut Model,
        op: UnaryOpKind,
        input: Vec<PortRange>,
    ) -> Result<PortId, ModelError> {
        let size = input.iter().map(|r| r.len).sum();
        let output = model.new_port("out", T::ELEMENT_TYPE, size);
        Self::with_output(model, op, input, output)?;
        Ok(output)
    }

    /// Claims `output`, a port created up front with [`Model::new_port`], as
    /// this node's output instead of allocating a fresh one.
    pub fn with_output(
        model: &mut Model,
        op: UnaryOpKind,
        input: Vec<PortRange>,
        output: PortId,
    ) -> Result<NodeId, ModelError> {
        let size: usize = input.iter().map(|r| r.len).sum();
        let port = model.port(output)?;
        if port.dtype != T::ELEMENT_TYPE {
            return Err(ModelError::TypeMismatch {
                expected: T::ELEMENT_TYPE,
                found: port.dtype,
                port_name: port.name.clone(),
            });
        }
        if port.size != size {
            return Err(ModelError::SizeMismatch {
                port_name: port.name.clone(),
                expected: size,
                found: port.size,
            });
        }
        model.add_node(Self {
            op,
            input,
            output,
            marker: PhantomData,
        })
    }

    pub fn op(&self) -> UnaryOpKind {
        self.op
    }

    fn size(&self) -> usize {
        self.input.iter().map(|r| r.len).sum()
    }
}

impl<T: FloatElement> Node for UnaryNode<T> {
    fn type_tag(&self) -> String {
        format!("UnaryNode<{}>", T::ELEMENT_TYPE)
    }

    fn inputs(&self) -> Vec<InputBinding> {
        vec![InputBinding::new("in", T::ELEMENT_TYPE, self.input.clone())]
    }

    fn outputs(&self) -> Vec<PortId> {
        vec![self.output]
    }

    fn compute(&self, ctx: &ComputeContext<'_>) -> Result<Vec<NumericVector>, ComputeError> {
        let value = NumericVector::unary_op(self.op, ctx.input(0)?)?;
        Ok(vec![value])
    }

    fn copy(&self, transformer: &mut ModelTransformer) -> Result<(), ModelError> {
        let input = transformer.mapped_ranges(&self.input)?;
        let new = Self::with_ranges(transformer.model(), self.op, input)?;
        transformer.map_output(self.output, new);
        Ok(())
    }

    fn lower(&self, ctx: &mut LowerContext<'_>) -> Result<(), CompileError> {
        let input = ctx.input_value(0)?;
        let value = ctx.emit(
            TargetOp::Unary(self.op),
            &[input],
            T::ELEMENT_TYPE,
            self.size(),
        )?;
        ctx.define_output(0, value)
    }

    fn write_properties(&self, writer: &mut PropertyWriter) {
        writer.write("operation", self.op.to_string());
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
