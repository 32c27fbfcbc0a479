use crate::archive::PropertyWriter;
use crate::compile::{CompileError, LowerContext, TargetOp};
use crate::model::node::{ComputeContext, ComputeError, Node};
use crate::model::transform::ModelTransformer;
use crate::model::{InputBinding, Model, ModelError, NodeId, PortId, PortRange};
use crate::vector::{BinaryOpKind, Element, NumericVector};
use std::any::Any;
use std::marker::PhantomData;

/// Elementwise two-operand arithmetic over same-sized inputs.
pub struct BinaryNode<T: Element> {
    op: BinaryOpKind,
    left: Vec<PortRange>,
    right: Vec<PortRange>,
    output: PortId,
    marker: PhantomData<T>,
}

impl<T: Element> BinaryNode<T> {
    pub fn new(
        model: &mut Model,
        op: BinaryOpKind,
        left: PortId,
        right: PortId,
    ) -> Result<PortId, ModelError> {
        let left = vec![model.full_range(left)?];
        let right = vec![model.full_range(right)?];
        Self::with_ranges(model, op, left, right)
    }

    pub fn with_ranges(
        model: &mut Model,
        op: BinaryOpKind,
        left: Vec<PortRange>,
        right: Vec<PortRange>,
    ) -> Result<PortId, ModelError> {
        let size = left.iter().map(|r| r.len).sum();
        let output = model.new_port("out", T::ELEMENT_TYPE, size);
        Self::with_output(model, op, left, right, output)?;
        Ok(output)
    }

    /// Claims `output`, a port created up front with [`Model::new_port`], as
    /// this node's output instead of allocating a fresh one.
    pub fn with_output(
        model: &mut Model,
        op: BinaryOpKind,
        left: Vec<PortRange>,
        right: Vec<PortRange>,
        output: PortId,
    ) -> Result<NodeId, ModelError> {
        let size: usize = left.iter().map(|r| r.len).sum();
        let right_size: usize = right.iter().map(|r| r.len).sum();
        if right_size != size {
            return Err(ModelError::SizeMismatch {
                port_name: "right".to_string(),
                expected: size,
                found: right_size,
            });
        }
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
            left,
            right,
            output,
            marker: PhantomData,
        })
    }

    pub fn op(&self) -> BinaryOpKind {
        self.op
    }

    fn size(&self) -> usize {
        self.left.iter().map(|r| r.len).sum()
    }
}

impl<T: Element> Node for BinaryNode<T> {
    fn type_tag(&self) -> String {
        format!("BinaryNode<{}>", T::ELEMENT_TYPE)
    }

    fn inputs(&self) -> Vec<InputBinding> {
        vec![
            InputBinding::new("left", T::ELEMENT_TYPE, self.left.clone()),
            InputBinding::new("right", T::ELEMENT_TYPE, self.right.clone()),
        ]
    }

    fn outputs(&self) -> Vec<PortId> {
        vec![self.output]
    }

    fn compute(&self, ctx: &ComputeContext<'_>) -> Result<Vec<NumericVector>, ComputeError> {
        let value = NumericVector::binary_op(self.op, ctx.input(0)?, ctx.input(1)?)?;
        Ok(vec![value])
    }

    fn copy(&self, transformer: &mut ModelTransformer) -> Result<(), ModelError> {
        let left = transformer.mapped_ranges(&self.left)?;
        let right = transformer.mapped_ranges(&self.right)?;
        let new = Self::with_ranges(transformer.model(), self.op, left, right)?;
        transformer.map_output(self.output, new);
        Ok(())
    }

    fn lower(&self, ctx: &mut LowerContext<'_>) -> Result<(), CompileError> {
        let left = ctx.input_value(0)?;
        let right = ctx.input_value(1)?;
        let value = ctx.emit(
            TargetOp::Binary(self.op),
            &[left, right],
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
