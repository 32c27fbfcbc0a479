use crate::archive::PropertyWriter;
use crate::model::node::{ComputeContext, ComputeError, Node};
use crate::model::transform::ModelTransformer;
use crate::model::{InputBinding, Model, ModelError, PortId, PortRange};
use crate::nodes::{BinaryNode, SumNode};
use crate::vector::{BinaryOpKind, Element, NumericVector};
use std::any::Any;
use std::marker::PhantomData;

/// Inner product of two same-sized inputs. Has no direct lowering; it
/// refines into an elementwise multiply feeding a sum, so compiling a model
/// that still contains one fails until the model is refined.
pub struct DotProductNode<T: Element> {
    left: Vec<PortRange>,
    right: Vec<PortRange>,
    output: PortId,
    marker: PhantomData<T>,
}

impl<T: Element> DotProductNode<T> {
    pub fn new(model: &mut Model, left: PortId, right: PortId) -> Result<PortId, ModelError> {
        let left = vec![model.full_range(left)?];
        let right = vec![model.full_range(right)?];
        Self::with_ranges(model, left, right)
    }

    pub fn with_ranges(
        model: &mut Model,
        left: Vec<PortRange>,
        right: Vec<PortRange>,
    ) -> Result<PortId, ModelError> {
        let left_size: usize = left.iter().map(|r| r.len).sum();
        let right_size: usize = right.iter().map(|r| r.len).sum();
        if right_size != left_size {
            return Err(ModelError::SizeMismatch {
                port_name: "right".to_string(),
                expected: left_size,
                found: right_size,
            });
        }
        let output = model.new_port("out", T::ELEMENT_TYPE, 1);
        model.add_node(Self {
            left,
            right,
            output,
            marker: PhantomData,
        })?;
        Ok(output)
    }
}

impl<T: Element> Node for DotProductNode<T> {
    fn type_tag(&self) -> String {
        format!("DotProductNode<{}>", T::ELEMENT_TYPE)
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
        let product = NumericVector::binary_op(BinaryOpKind::Mul, ctx.input(0)?, ctx.input(1)?)?;
        Ok(vec![product.sum()?])
    }

    fn refine(&self, transformer: &mut ModelTransformer) -> Result<bool, ModelError> {
        let left = transformer.mapped_ranges(&self.left)?;
        let right = transformer.mapped_ranges(&self.right)?;
        let product =
            BinaryNode::<T>::with_ranges(transformer.model(), BinaryOpKind::Mul, left, right)?;
        let sum = SumNode::<T>::new(transformer.model(), product)?;
        transformer.map_output(self.output, sum);
        Ok(true)
    }

    fn copy(&self, transformer: &mut ModelTransformer) -> Result<(), ModelError> {
        let left = transformer.mapped_ranges(&self.left)?;
        let right = transformer.mapped_ranges(&self.right)?;
        let new = Self::with_ranges(transformer.model(), left, right)?;
        transformer.map_output(self.output, new);
        Ok(())
    }

    fn write_properties(&self, _writer: &mut PropertyWriter) {}

    fn as_any(&self) -> &dyn Any {
        self
    }
}
