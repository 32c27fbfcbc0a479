use crate::archive::PropertyWriter;
use crate::compile::{CompileError, LowerContext, TargetOp};
use crate::model::node::{ComputeContext, ComputeError, Node};
use crate::model::transform::ModelTransformer;
use crate::model::{InputBinding, Model, ModelError, PortId, PortRange};
use crate::vector::{FloatElement, NumericMatrix, NumericVector};
use std::any::Any;
use std::marker::PhantomData;

/// Multiplies a captured coefficient matrix by the input vector. The matrix
/// is node state; lowering embeds it as a row-major flattened constant.
pub struct MatrixVectorProductNode<T: FloatElement> {
    matrix: NumericMatrix,
    input: Vec<PortRange>,
    output: PortId,
    marker: PhantomData<T>,
}

impl<T: FloatElement> MatrixVectorProductNode<T> {
    pub fn new(
        model: &mut Model,
        matrix: NumericMatrix,
        input: PortId,
    ) -> Result<PortId, ModelError> {
        let range = model.full_range(input)?;
        Self::with_ranges(model, matrix, vec![range])
    }

    pub fn with_ranges(
        model: &mut Model,
        matrix: NumericMatrix,
        input: Vec<PortRange>,
    ) -> Result<PortId, ModelError> {
        if matrix.dtype() != T::ELEMENT_TYPE {
            return Err(ModelError::TypeMismatch {
                expected: T::ELEMENT_TYPE,
                found: matrix.dtype(),
                port_name: "matrix".to_string(),
            });
        }
        let input_size: usize = input.iter().map(|r| r.len).sum();
        if input_size != matrix.cols() {
            return Err(ModelError::SizeMismatch {
                port_name: "in".to_string(),
                expected: matrix.cols(),
                found: input_size,
            });
        }
        let output = model.new_port("out", T::ELEMENT_TYPE, matrix.rows());
        model.add_node(Self {
            matrix,
            input,
            output,
            marker: PhantomData,
        })?;
        Ok(output)
    }

    pub fn matrix(&self) -> &NumericMatrix {
        &self.matrix
    }
}

impl<T: FloatElement> Node for MatrixVectorProductNode<T> {
    fn type_tag(&self) -> String {
        format!("MatrixVectorProductNode<{}>", T::ELEMENT_TYPE)
    }

    fn inputs(&self) -> Vec<InputBinding> {
        vec![InputBinding::new("in", T::ELEMENT_TYPE, self.input.clone())]
    }

    fn outputs(&self) -> Vec<PortId> {
        vec![self.output]
    }

    fn has_state(&self) -> bool {
        true
    }

    fn compute(&self, ctx: &ComputeContext<'_>) -> Result<Vec<NumericVector>, ComputeError> {
        Ok(vec![self.matrix.matvec(ctx.input(0)?)?])
    }

    fn copy(&self, transformer: &mut ModelTransformer) -> Result<(), ModelError> {
        let input = transformer.mapped_ranges(&self.input)?;
        let new = Self::with_ranges(transformer.model(), self.matrix.clone(), input)?;
        transformer.map_output(self.output, new);
        Ok(())
    }

    fn lower(&self, ctx: &mut LowerContext<'_>) -> Result<(), CompileError> {
        let matrix = ctx.emit_constant(self.matrix.to_flat_vector())?;
        let input = ctx.input_value(0)?;
        let value = ctx.emit(
            TargetOp::MatVec {
                rows: self.matrix.rows(),
                cols: self.matrix.cols(),
            },
            &[matrix, input],
            T::ELEMENT_TYPE,
            self.matrix.rows(),
        )?;
        ctx.define_output(0, value)
    }

    fn write_properties(&self, writer: &mut PropertyWriter) {
        writer.write("matrix", self.matrix.clone());
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
