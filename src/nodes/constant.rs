use crate::archive::PropertyWriter;
use crate::compile::{CompileError, LowerContext};
use crate::model::node::{ComputeContext, ComputeError, Node};
use crate::model::transform::ModelTransformer;
use crate::model::{InputBinding, Model, ModelError, PortId};
use crate::vector::{Element, NumericVector};
use std::any::Any;
use std::marker::PhantomData;

/// A captured vector of values with no inputs. Lowers to a program constant.
pub struct ConstantNode<T: Element> {
    values: NumericVector,
    output: PortId,
    marker: PhantomData<T>,
}

impl<T: Element> ConstantNode<T> {
    /// Bumped when the property layout changed from a plain value sequence to
    /// a tagged vector. Readers still accept the old layout.
    pub const ARCHIVE_VERSION: u32 = 2;

    pub fn new(model: &mut Model, values: Vec<T>) -> Result<PortId, ModelError> {
        Self::from_vector(model, T::vector_from_vec(values))
    }

    pub fn from_vector(model: &mut Model, values: NumericVector) -> Result<PortId, ModelError> {
        if values.dtype() != T::ELEMENT_TYPE {
            return Err(ModelError::TypeMismatch {
                expected: T::ELEMENT_TYPE,
                found: values.dtype(),
                port_name: "out".to_string(),
            });
        }
        let output = model.new_port("out", T::ELEMENT_TYPE, values.len());
        model.add_node(Self {
            values,
            output,
            marker: PhantomData,
        })?;
        Ok(output)
    }

    pub fn values(&self) -> &NumericVector {
        &self.values
    }
}

impl<T: Element> Node for ConstantNode<T> {
    fn type_tag(&self) -> String {
        format!("ConstantNode<{}>", T::ELEMENT_TYPE)
    }

    fn inputs(&self) -> Vec<InputBinding> {
        Vec::new()
    }

    fn outputs(&self) -> Vec<PortId> {
        vec![self.output]
    }

    fn has_state(&self) -> bool {
        true
    }

    fn compute(&self, _ctx: &ComputeContext<'_>) -> Result<Vec<NumericVector>, ComputeError> {
        Ok(vec![self.values.clone()])
    }

    fn copy(&self, transformer: &mut ModelTransformer) -> Result<(), ModelError> {
        let new = Self::from_vector(transformer.model(), self.values.clone())?;
        transformer.map_output(self.output, new);
        Ok(())
    }

    fn lower(&self, ctx: &mut LowerContext<'_>) -> Result<(), CompileError> {
        let value = ctx.emit_constant(self.values.clone())?;
        ctx.define_output(0, value)
    }

    fn archive_version(&self) -> u32 {
        Self::ARCHIVE_VERSION
    }

    fn write_properties(&self, writer: &mut PropertyWriter) {
        writer.write("values", self.values.clone());
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
