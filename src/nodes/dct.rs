use crate::archive::PropertyWriter;
use crate::model::node::{ComputeContext, ComputeError, Node};
use crate::model::transform::ModelTransformer;
use crate::model::{InputBinding, Model, ModelError, PortId, PortRange};
use crate::nodes::MatrixVectorProductNode;
use crate::vector::{FloatElement, NumericMatrix, NumericVector};
use ndarray::Array2;
use std::any::Any;
use std::marker::PhantomData;

/// The orthonormal DCT-II basis for signals of length `size`. Row `k` holds
/// `sqrt(2/N) * cos(pi/N * (j + 1/2) * k)`, with row 0 scaled by `1/sqrt(2)`
/// so the matrix times its transpose is the identity.
pub fn dct_matrix<T: FloatElement>(size: usize) -> NumericMatrix {
    let n = size as f64;
    let scale = (2.0 / n).sqrt();
    let matrix = Array2::from_shape_fn((size, size), |(k, j)| {
        let mut coeff = scale * (std::f64::consts::PI / n * (j as f64 + 0.5) * k as f64).cos();
        if k == 0 {
            coeff *= std::f64::consts::FRAC_1_SQRT_2;
        }
        T::from_f64(coeff)
    });
    T::matrix_from(matrix)
}

/// Discrete cosine transform of the input. The basis is derived from the
/// input length rather than stored, and refinement expands the node into a
/// plain matrix-vector product over that basis.
pub struct DctNode<T: FloatElement> {
    input: Vec<PortRange>,
    size: usize,
    output: PortId,
    marker: PhantomData<T>,
}

impl<T: FloatElement> DctNode<T> {
    pub fn new(model: &mut Model, input: PortId) -> Result<PortId, ModelError> {
        let range = model.full_range(input)?;
        Self::with_ranges(model, vec![range])
    }

    pub fn with_ranges(model: &mut Model, input: Vec<PortRange>) -> Result<PortId, ModelError> {
        let size = input.iter().map(|r| r.len).sum();
        let output = model.new_port("out", T::ELEMENT_TYPE, size);
        model.add_node(Self {
            input,
            size,
            output,
            marker: PhantomData,
        })?;
        Ok(output)
    }
}

impl<T: FloatElement> Node for DctNode<T> {
    fn type_tag(&self) -> String {
        format!("DctNode<{}>", T::ELEMENT_TYPE)
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
        Ok(vec![dct_matrix::<T>(self.size).matvec(ctx.input(0)?)?])
    }

    fn refine(&self, transformer: &mut ModelTransformer) -> Result<bool, ModelError> {
        let input = transformer.mapped_ranges(&self.input)?;
        let new = MatrixVectorProductNode::<T>::with_ranges(
            transformer.model(),
            dct_matrix::<T>(self.size),
            input,
        )?;
        transformer.map_output(self.output, new);
        Ok(true)
    }

    fn copy(&self, transformer: &mut ModelTransformer) -> Result<(), ModelError> {
        let input = transformer.mapped_ranges(&self.input)?;
        let new = Self::with_ranges(transformer.model(), input)?;
        transformer.map_output(self.output, new);
        Ok(())
    }

    fn write_properties(&self, _writer: &mut PropertyWriter) {}

    fn as_any(&self) -> &dyn Any {
        self
    }
}
