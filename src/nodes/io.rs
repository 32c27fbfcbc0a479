use crate::archive::PropertyWriter;
use crate::compile::{CompileError, LowerContext};
use crate::model::node::{ComputeContext, ComputeError, Node};
use crate::model::transform::ModelTransformer;
use crate::model::{InputBinding, Model, ModelError, PortId, PortRange};
use crate::vector::{Element, NumericVector, VectorError};
use std::any::Any;
use std::marker::PhantomData;

/// Graph boundary source. Produces the external value supplied under `name`
/// at each `Model::compute` call; lowers to a target input binding.
pub struct InputNode<T: Element> {
    name: String,
    output: PortId,
    size: usize,
    marker: PhantomData<T>,
}

impl<T: Element> InputNode<T> {
    pub fn new(
        model: &mut Model,
        name: impl Into<String>,
        size: usize,
    ) -> Result<PortId, ModelError> {
        let output = model.new_port("out", T::ELEMENT_TYPE, size);
        model.add_node(Self {
            name: name.into(),
            output,
            size,
            marker: PhantomData,
        })?;
        Ok(output)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn size(&self) -> usize {
        self.size
    }
}

impl<T: Element> Node for InputNode<T> {
    fn type_tag(&self) -> String {
        format!("InputNode<{}>", T::ELEMENT_TYPE)
    }

    fn inputs(&self) -> Vec<InputBinding> {
        Vec::new()
    }

    fn outputs(&self) -> Vec<PortId> {
        vec![self.output]
    }

    fn source_name(&self) -> Option<&str> {
        Some(&self.name)
    }

    fn compute(&self, ctx: &ComputeContext<'_>) -> Result<Vec<NumericVector>, ComputeError> {
        let value = ctx.external(&self.name)?;
        if value.dtype() != T::ELEMENT_TYPE {
            return Err(VectorError::WrongElementType(T::ELEMENT_TYPE, value.dtype()).into());
        }
        if value.len() != self.size {
            return Err(VectorError::LengthMismatch(value.len(), self.size).into());
        }
        Ok(vec![value.clone()])
    }

    fn copy(&self, transformer: &mut ModelTransformer) -> Result<(), ModelError> {
        let new = Self::new(transformer.model(), self.name.clone(), self.size)?;
        transformer.map_output(self.output, new);
        Ok(())
    }

    fn lower(&self, ctx: &mut LowerContext<'_>) -> Result<(), CompileError> {
        let value = ctx.bind_input(&self.name, T::ELEMENT_TYPE, self.size)?;
        ctx.define_output(0, value)
    }

    fn write_properties(&self, writer: &mut PropertyWriter) {
        writer.write("name", self.name.as_str());
        writer.write("size", self.size);
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Graph boundary sink. Passes its input through unchanged and exposes it
/// under `name` in the results of `Model::compute` and in the compiled
/// program's outputs.
pub struct OutputNode<T: Element> {
    name: String,
    input: Vec<PortRange>,
    output: PortId,
    marker: PhantomData<T>,
}

impl<T: Element> OutputNode<T> {
    pub fn new(
        model: &mut Model,
        name: impl Into<String>,
        input: PortId,
    ) -> Result<PortId, ModelError> {
        let range = model.full_range(input)?;
        Self::with_ranges(model, name, vec![range])
    }

    pub fn with_ranges(
        model: &mut Model,
        name: impl Into<String>,
        input: Vec<PortRange>,
    ) -> Result<PortId, ModelError> {
        let size = input.iter().map(|r| r.len).sum();
        let output = model.new_port("out", T::ELEMENT_TYPE, size);
        model.add_node(Self {
            name: name.into(),
            input,
            output,
            marker: PhantomData,
        })?;
        Ok(output)
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl<T: Element> Node for OutputNode<T> {
    fn type_tag(&self) -> String {
        format!("OutputNode<{}>", T::ELEMENT_TYPE)
    }

    fn inputs(&self) -> Vec<InputBinding> {
        vec![InputBinding::new("in", T::ELEMENT_TYPE, self.input.clone())]
    }

    fn outputs(&self) -> Vec<PortId> {
        vec![self.output]
    }

    fn sink_name(&self) -> Option<&str> {
        Some(&self.name)
    }

    fn compute(&self, ctx: &ComputeContext<'_>) -> Result<Vec<NumericVector>, ComputeError> {
        Ok(vec![ctx.input(0)?.clone()])
    }

    fn copy(&self, transformer: &mut ModelTransformer) -> Result<(), ModelError> {
        let input = transformer.mapped_ranges(&self.input)?;
        let new = Self::with_ranges(transformer.model(), self.name.clone(), input)?;
        transformer.map_output(self.output, new);
        Ok(())
    }

    fn lower(&self, ctx: &mut LowerContext<'_>) -> Result<(), CompileError> {
        let value = ctx.input_value(0)?;
        ctx.mark_output(&self.name, value)?;
        ctx.define_output(0, value)
    }

    fn write_properties(&self, writer: &mut PropertyWriter) {
        writer.write("name", self.name.as_str());
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
