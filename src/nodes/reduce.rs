use crate::archive::PropertyWriter;
use crate::compile::{CompileError, LowerContext, TargetOp};
use crate::model::node::{ComputeContext, ComputeError, Node};
use crate::model::transform::ModelTransformer;
use crate::model::{InputBinding, Model, ModelError, PortId, PortRange};
use crate::vector::{Element, NumericVector};
use std::any::Any;
use std::marker::PhantomData;

/// Reduces its input to a single-element vector by summation.
pub struct SumNode<T: Element> {
    input: Vec<PortRange>,
    output: PortId,
    marker: PhantomData<T>,
}

impl<T: Element> SumNode<T> {
    pub fn new(model: &mut Model, input: PortId) -> Result<PortId, ModelError> {
        let range = model.full_range(input)?;
        Self::with_ranges(model, vec![range])
    }

    pub fn with_ranges(model: &mut Model, input: Vec<PortRange>) -> Result<PortId, ModelError> {
        let output = model.new_port("out", T::ELEMENT_TYPE, 1);
        model.add_node(Self {
            input,
            output,
            marker: PhantomData,
        })?;
        Ok(output)
    }
}

impl<T: Element> Node for SumNode<T> {
    fn type_tag(&self) -> String {
        format!("SumNode<{}>", T::ELEMENT_TYPE)
    }

    fn inputs(&self) -> Vec<InputBinding> {
        vec![InputBinding::new("in", T::ELEMENT_TYPE, self.input.clone())]
    }

    fn outputs(&self) -> Vec<PortId> {
        vec![self.output]
    }

    fn compute(&self, ctx: &ComputeContext<'_>) -> Result<Vec<NumericVector>, ComputeError> {
        Ok(vec![ctx.input(0)?.sum()?])
    }

    fn copy(&self, transformer: &mut ModelTransformer) -> Result<(), ModelError> {
        let input = transformer.mapped_ranges(&self.input)?;
        let new = Self::with_ranges(transformer.model(), input)?;
        transformer.map_output(self.output, new);
        Ok(())
    }

    fn lower(&self, ctx: &mut LowerContext<'_>) -> Result<(), CompileError> {
        let input = ctx.input_value(0)?;
        let value = ctx.emit(TargetOp::Sum, &[input], T::ELEMENT_TYPE, 1)?;
        ctx.define_output(0, value)
    }

    fn write_properties(&self, _writer: &mut PropertyWriter) {}

    fn as_any(&self) -> &dyn Any {
        self
    }
}
