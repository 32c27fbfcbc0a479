use crate::dtype::ElementType;
use ndarray::{Array1, Array2, Axis, s};
use num_traits::{Float, FloatConst, PrimInt};
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

#[derive(Debug, thiserror::Error)]
pub enum VectorError {
    #[error("Requested element type {0}, but had {1}")]
    WrongElementType(ElementType, ElementType),
    #[error("Element type mismatch between operands: {0} vs {1}")]
    ElementTypeMismatch(ElementType, ElementType),
    #[error("Length mismatch: {0} vs {1}")]
    LengthMismatch(usize, usize),
    #[error("Slice of {count} elements at {start} out of bounds for vector of length {len}")]
    SliceOutOfBounds {
        start: usize,
        count: usize,
        len: usize,
    },
    #[error("Unsupported operation {0} for element type {1}")]
    UnsupportedOperationForType(String, ElementType),
    #[error("Matrix of shape {rows}x{cols} cannot multiply vector of length {len}")]
    MatVecShapeMismatch {
        rows: usize,
        cols: usize,
        len: usize,
    },
    #[error("Integer division by zero")]
    DivisionByZero,
    #[error("Cannot concatenate an empty list of vectors")]
    EmptyConcat,
    #[error(transparent)]
    ShapeError(#[from] ndarray::ShapeError),
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, strum_macros::Display, strum_macros::EnumString, Serialize, Deserialize)]
pub enum BinaryOpKind {
    Add,
    Sub,
    Mul,
    Div,
    Min,
    Max,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, strum_macros::Display, strum_macros::EnumString, Serialize, Deserialize)]
pub enum UnaryOpKind {
    Negate,
    Abs,
    Exp,
    Log,
    Sqrt,
    Tanh,
}

impl BinaryOpKind {
    fn apply_float<T: Float>(&self, a: &Array1<T>, b: &Array1<T>) -> Array1<T> {
        match self {
            BinaryOpKind::Add => a + b,
            BinaryOpKind::Sub => a - b,
            BinaryOpKind::Mul => a * b,
            BinaryOpKind::Div => a / b,
            BinaryOpKind::Min => ndarray::Zip::from(a).and(b).map_collect(|x, y| x.min(*y)),
            BinaryOpKind::Max => ndarray::Zip::from(a).and(b).map_collect(|x, y| x.max(*y)),
        }
    }

    fn apply_int<T: PrimInt>(&self, a: &Array1<T>, b: &Array1<T>) -> Result<Array1<T>, VectorError> {
        let result = match self {
            BinaryOpKind::Add => ndarray::Zip::from(a).and(b).map_collect(|x, y| *x + *y),
            BinaryOpKind::Sub => ndarray::Zip::from(a).and(b).map_collect(|x, y| *x - *y),
            BinaryOpKind::Mul => ndarray::Zip::from(a).and(b).map_collect(|x, y| *x * *y),
            BinaryOpKind::Div => {
                // Integer division panics on a zero divisor.
                if b.iter().any(|y| y.is_zero()) {
                    return Err(VectorError::DivisionByZero);
                }
                ndarray::Zip::from(a).and(b).map_collect(|x, y| *x / *y)
            }
            BinaryOpKind::Min => ndarray::Zip::from(a).and(b).map_collect(|x, y| (*x).min(*y)),
            BinaryOpKind::Max => ndarray::Zip::from(a).and(b).map_collect(|x, y| (*x).max(*y)),
        };
        Ok(result)
    }
}

impl UnaryOpKind {
    fn apply_float<T: Float>(&self, x: &Array1<T>) -> Array1<T> {
        match self {
            UnaryOpKind::Negate => x.mapv(|v| -v),
            UnaryOpKind::Abs => x.mapv(|v| v.abs()),
            UnaryOpKind::Exp => x.mapv(|v| v.exp()),
            UnaryOpKind::Log => x.mapv(|v| v.ln()),
            UnaryOpKind::Sqrt => x.mapv(|v| v.sqrt()),
            UnaryOpKind::Tanh => x.mapv(|v| v.tanh()),
        }
    }
}

/// A rank-1 value flowing through the graph, one arm per element type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum NumericVector {
    F32(Array1<f32>),
    F64(Array1<f64>),
    I32(Array1<i32>),
    I64(Array1<i64>),
    Bool(Array1<bool>),
}

impl Display for NumericVector {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            NumericVector::F32(x) => x.fmt(f),
            NumericVector::F64(x) => x.fmt(f),
            NumericVector::I32(x) => x.fmt(f),
            NumericVector::I64(x) => x.fmt(f),
            NumericVector::Bool(x) => x.fmt(f),
        }
    }
}

impl NumericVector {
    pub fn dtype(&self) -> ElementType {
        match self {
            NumericVector::F32(_) => ElementType::F32,
            NumericVector::F64(_) => ElementType::F64,
            NumericVector::I32(_) => ElementType::I32,
            NumericVector::I64(_) => ElementType::I64,
            NumericVector::Bool(_) => ElementType::Bool,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            NumericVector::F32(x) => x.len(),
            NumericVector::F64(x) => x.len(),
            NumericVector::I32(x) => x.len(),
            NumericVector::I64(x) => x.len(),
            NumericVector::Bool(x) => x.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn try_to_vec<T: Element>(&self) -> Result<Vec<T>, VectorError> {
        T::typed_view(self)
            .map(|x| x.to_vec())
            .ok_or(VectorError::WrongElementType(T::ELEMENT_TYPE, self.dtype()))
    }

    pub fn slice(&self, start: usize, count: usize) -> Result<Self, VectorError> {
        if start + count > self.len() {
            return Err(VectorError::SliceOutOfBounds {
                start,
                count,
                len: self.len(),
            });
        }
        Ok(match self {
            NumericVector::F32(x) => NumericVector::F32(x.slice(s![start..start + count]).to_owned()),
            NumericVector::F64(x) => NumericVector::F64(x.slice(s![start..start + count]).to_owned()),
            NumericVector::I32(x) => NumericVector::I32(x.slice(s![start..start + count]).to_owned()),
            NumericVector::I64(x) => NumericVector::I64(x.slice(s![start..start + count]).to_owned()),
            NumericVector::Bool(x) => NumericVector::Bool(x.slice(s![start..start + count]).to_owned()),
        })
    }

    pub fn concat(parts: &[Self]) -> Result<Self, VectorError> {
        let first = parts.first().ok_or(VectorError::EmptyConcat)?;
        match first {
            NumericVector::F32(_) => {
                let mut selected = vec![];
                for p in parts {
                    if let NumericVector::F32(x) = p {
                        selected.push(x.view());
                    } else {
                        return Err(VectorError::ElementTypeMismatch(ElementType::F32, p.dtype()));
                    }
                }
                Ok(NumericVector::F32(ndarray::concatenate(Axis(0), &selected)?))
            }
            NumericVector::F64(_) => {
                let mut selected = vec![];
                for p in parts {
                    if let NumericVector::F64(x) = p {
                        selected.push(x.view());
                    } else {
                        return Err(VectorError::ElementTypeMismatch(ElementType::F64, p.dtype()));
                    }
                }
                Ok(NumericVector::F64(ndarray::concatenate(Axis(0), &selected)?))
            }
            NumericVector::I32(_) => {
                let mut selected = vec![];
                for p in parts {
                    if let NumericVector::I32(x) = p {
                        selected.push(x.view());
                    } else {
                        return Err(VectorError::ElementTypeMismatch(ElementType::I32, p.dtype()));
                    }
                }
                Ok(NumericVector::I32(ndarray::concatenate(Axis(0), &selected)?))
            }
            NumericVector::I64(_) => {
                let mut selected = vec![];
                for p in parts {
                    if let NumericVector::I64(x) = p {
                        selected.push(x.view());
                    } else {
                        return Err(VectorError::ElementTypeMismatch(ElementType::I64, p.dtype()));
                    }
                }
                Ok(NumericVector::I64(ndarray::concatenate(Axis(0), &selected)?))
            }
            NumericVector::Bool(_) => {
                let mut selected = vec![];
                for p in parts {
                    if let NumericVector::Bool(x) = p {
                        selected.push(x.view());
                    } else {
                        return Err(VectorError::ElementTypeMismatch(ElementType::Bool, p.dtype()));
                    }
                }
                Ok(NumericVector::Bool(ndarray::concatenate(Axis(0), &selected)?))
            }
        }
    }

    pub fn binary_op(op: BinaryOpKind, a: &Self, b: &Self) -> Result<Self, VectorError> {
        if a.len() != b.len() {
            return Err(VectorError::LengthMismatch(a.len(), b.len()));
        }
        Ok(match (a, b) {
            (NumericVector::F32(a), NumericVector::F32(b)) => NumericVector::F32(op.apply_float(a, b)),
            (NumericVector::F64(a), NumericVector::F64(b)) => NumericVector::F64(op.apply_float(a, b)),
            (NumericVector::I32(a), NumericVector::I32(b)) => NumericVector::I32(op.apply_int(a, b)?),
            (NumericVector::I64(a), NumericVector::I64(b)) => NumericVector::I64(op.apply_int(a, b)?),
            _ => {
                return Err(VectorError::UnsupportedOperationForType(
                    op.to_string(),
                    a.dtype(),
                ));
            }
        })
    }

    pub fn unary_op(op: UnaryOpKind, x: &Self) -> Result<Self, VectorError> {
        Ok(match x {
            NumericVector::F32(x) => NumericVector::F32(op.apply_float(x)),
            NumericVector::F64(x) => NumericVector::F64(op.apply_float(x)),
            _ => {
                return Err(VectorError::UnsupportedOperationForType(
                    op.to_string(),
                    x.dtype(),
                ));
            }
        })
    }

    /// Reduces to a single-element vector of the same element type.
    pub fn sum(&self) -> Result<Self, VectorError> {
        Ok(match self {
            NumericVector::F32(x) => NumericVector::F32(Array1::from_vec(vec![x.sum()])),
            NumericVector::F64(x) => NumericVector::F64(Array1::from_vec(vec![x.sum()])),
            NumericVector::I32(x) => NumericVector::I32(Array1::from_vec(vec![x.sum()])),
            NumericVector::I64(x) => NumericVector::I64(Array1::from_vec(vec![x.sum()])),
            NumericVector::Bool(_) => {
                return Err(VectorError::UnsupportedOperationForType(
                    "Sum".to_string(),
                    ElementType::Bool,
                ));
            }
        })
    }
}

impl From<Vec<f32>> for NumericVector {
    fn from(values: Vec<f32>) -> Self {
        NumericVector::F32(Array1::from_vec(values))
    }
}

impl From<Vec<f64>> for NumericVector {
    fn from(values: Vec<f64>) -> Self {
        NumericVector::F64(Array1::from_vec(values))
    }
}

impl From<Vec<i32>> for NumericVector {
    fn from(values: Vec<i32>) -> Self {
        NumericVector::I32(Array1::from_vec(values))
    }
}

impl From<Vec<i64>> for NumericVector {
    fn from(values: Vec<i64>) -> Self {
        NumericVector::I64(Array1::from_vec(values))
    }
}

impl From<Vec<bool>> for NumericVector {
    fn from(values: Vec<bool>) -> Self {
        NumericVector::Bool(Array1::from_vec(values))
    }
}

/// A rank-2 float value. Matrices never flow through ports; they only appear
/// as node state (coefficient banks) and as flattened program constants.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum NumericMatrix {
    F32(Array2<f32>),
    F64(Array2<f64>),
}

impl NumericMatrix {
    pub fn dtype(&self) -> ElementType {
        match self {
            NumericMatrix::F32(_) => ElementType::F32,
            NumericMatrix::F64(_) => ElementType::F64,
        }
    }

    pub fn rows(&self) -> usize {
        match self {
            NumericMatrix::F32(x) => x.nrows(),
            NumericMatrix::F64(x) => x.nrows(),
        }
    }

    pub fn cols(&self) -> usize {
        match self {
            NumericMatrix::F32(x) => x.ncols(),
            NumericMatrix::F64(x) => x.ncols(),
        }
    }

    /// Row-major flattening, the layout `from_flat` expects back.
    pub fn to_flat_vector(&self) -> NumericVector {
        match self {
            NumericMatrix::F32(x) => NumericVector::F32(x.iter().copied().collect()),
            NumericMatrix::F64(x) => NumericVector::F64(x.iter().copied().collect()),
        }
    }

    pub fn from_flat(flat: &NumericVector, rows: usize, cols: usize) -> Result<Self, VectorError> {
        if flat.len() != rows * cols {
            return Err(VectorError::LengthMismatch(flat.len(), rows * cols));
        }
        Ok(match flat {
            NumericVector::F32(x) => NumericMatrix::F32(Array2::from_shape_vec((rows, cols), x.to_vec())?),
            NumericVector::F64(x) => NumericMatrix::F64(Array2::from_shape_vec((rows, cols), x.to_vec())?),
            _ => {
                return Err(VectorError::UnsupportedOperationForType(
                    "MatrixFromFlat".to_string(),
                    flat.dtype(),
                ));
            }
        })
    }

    pub fn matvec(&self, x: &NumericVector) -> Result<NumericVector, VectorError> {
        if self.cols() != x.len() {
            return Err(VectorError::MatVecShapeMismatch {
                rows: self.rows(),
                cols: self.cols(),
                len: x.len(),
            });
        }
        match (self, x) {
            (NumericMatrix::F32(m), NumericVector::F32(v)) => Ok(NumericVector::F32(m.dot(v))),
            (NumericMatrix::F64(m), NumericVector::F64(v)) => Ok(NumericVector::F64(m.dot(v))),
            _ => Err(VectorError::ElementTypeMismatch(self.dtype(), x.dtype())),
        }
    }
}

/// Maps a Rust primitive to its element type and typed vector storage.
pub trait Element: Copy + std::fmt::Debug + PartialEq + Send + Sync + 'static {
    const ELEMENT_TYPE: ElementType;
    fn vector_from_vec(values: Vec<Self>) -> NumericVector;
    fn typed_view(vector: &NumericVector) -> Option<&Array1<Self>>;
}

impl Element for f32 {
    const ELEMENT_TYPE: ElementType = ElementType::F32;
    fn vector_from_vec(values: Vec<Self>) -> NumericVector {
        NumericVector::F32(Array1::from_vec(values))
    }
    fn typed_view(vector: &NumericVector) -> Option<&Array1<Self>> {
        match vector {
            NumericVector::F32(x) => Some(x),
            _ => None,
        }
    }
}

impl Element for f64 {
    const ELEMENT_TYPE: ElementType = ElementType::F64;
    fn vector_from_vec(values: Vec<Self>) -> NumericVector {
        NumericVector::F64(Array1::from_vec(values))
    }
    fn typed_view(vector: &NumericVector) -> Option<&Array1<Self>> {
        match vector {
            NumericVector::F64(x) => Some(x),
            _ => None,
        }
    }
}

impl Element for i32 {
    const ELEMENT_TYPE: ElementType = ElementType::I32;
    fn vector_from_vec(values: Vec<Self>) -> NumericVector {
        NumericVector::I32(Array1::from_vec(values))
    }
    fn typed_view(vector: &NumericVector) -> Option<&Array1<Self>> {
        match vector {
            NumericVector::I32(x) => Some(x),
            _ => None,
        }
    }
}

impl Element for i64 {
    const ELEMENT_TYPE: ElementType = ElementType::I64;
    fn vector_from_vec(values: Vec<Self>) -> NumericVector {
        NumericVector::I64(Array1::from_vec(values))
    }
    fn typed_view(vector: &NumericVector) -> Option<&Array1<Self>> {
        match vector {
            NumericVector::I64(x) => Some(x),
            _ => None,
        }
    }
}

impl Element for bool {
    const ELEMENT_TYPE: ElementType = ElementType::Bool;
    fn vector_from_vec(values: Vec<Self>) -> NumericVector {
        NumericVector::Bool(Array1::from_vec(values))
    }
    fn typed_view(vector: &NumericVector) -> Option<&Array1<Self>> {
        match vector {
            NumericVector::Bool(x) => Some(x),
            _ => None,
        }
    }
}

/// Element types with float math, the bound for coefficient-bearing nodes.
pub trait FloatElement: Element + Float + FloatConst {
    fn from_f64(value: f64) -> Self;
    fn matrix_from(matrix: Array2<Self>) -> NumericMatrix;
    fn typed_matrix_view(matrix: &NumericMatrix) -> Option<&Array2<Self>>;
}

impl FloatElement for f32 {
    fn from_f64(value: f64) -> Self {
        value as f32
    }
    fn matrix_from(matrix: Array2<Self>) -> NumericMatrix {
        NumericMatrix::F32(matrix)
    }
    fn typed_matrix_view(matrix: &NumericMatrix) -> Option<&Array2<Self>> {
        match matrix {
            NumericMatrix::F32(x) => Some(x),
            _ => None,
        }
    }
}

impl FloatElement for f64 {
    fn from_f64(value: f64) -> Self {
        value
    }
    fn matrix_from(matrix: Array2<Self>) -> NumericMatrix {
        NumericMatrix::F64(matrix)
    }
    fn typed_matrix_view(matrix: &NumericMatrix) -> Option<&Array2<Self>> {
        match matrix {
            NumericMatrix::F64(x) => Some(x),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slice_and_concat_roundtrip() {
        let v = NumericVector::from(vec![1.0f32, 2.0, 3.0, 4.0, 5.0]);
        let head = v.slice(0, 2).unwrap();
        let tail = v.slice(2, 3).unwrap();
        let joined = NumericVector::concat(&[head, tail]).unwrap();
        assert_eq!(joined, v);
    }

    #[test]
    fn test_slice_out_of_bounds() {
        let v = NumericVector::from(vec![1i64, 2, 3]);
        assert!(matches!(
            v.slice(2, 2),
            Err(VectorError::SliceOutOfBounds { .. })
        ));
    }

    #[test]
    fn test_binary_op_rejects_mixed_types() {
        let a = NumericVector::from(vec![1.0f32, 2.0]);
        let b = NumericVector::from(vec![1i32, 2]);
        assert!(NumericVector::binary_op(BinaryOpKind::Add, &a, &b).is_err());
    }

    #[test]
    fn test_int_min_max() {
        let a = NumericVector::from(vec![3i32, -1, 7]);
        let b = NumericVector::from(vec![2i32, 5, 7]);
        let min = NumericVector::binary_op(BinaryOpKind::Min, &a, &b).unwrap();
        let max = NumericVector::binary_op(BinaryOpKind::Max, &a, &b).unwrap();
        assert_eq!(min.try_to_vec::<i32>().unwrap(), vec![2, -1, 7]);
        assert_eq!(max.try_to_vec::<i32>().unwrap(), vec![3, 5, 7]);
    }

    #[test]
    fn test_int_division_by_zero_is_an_error() {
        let a = NumericVector::from(vec![6i32, 9]);
        let b = NumericVector::from(vec![3i32, 0]);
        let result = NumericVector::binary_op(BinaryOpKind::Div, &a, &b);
        assert!(matches!(result, Err(VectorError::DivisionByZero)));

        // Float division keeps IEEE semantics.
        let a = NumericVector::from(vec![1.0f64]);
        let b = NumericVector::from(vec![0.0f64]);
        let quotient = NumericVector::binary_op(BinaryOpKind::Div, &a, &b).unwrap();
        assert!(quotient.try_to_vec::<f64>().unwrap()[0].is_infinite());
    }

    #[test]
    fn test_matvec() {
        let m = NumericMatrix::from_flat(&NumericVector::from(vec![1.0f64, 2.0, 3.0, 4.0]), 2, 2).unwrap();
        let x = NumericVector::from(vec![1.0f64, 1.0]);
        let y = m.matvec(&x).unwrap();
        assert_eq!(y.try_to_vec::<f64>().unwrap(), vec![3.0, 7.0]);
    }
}
