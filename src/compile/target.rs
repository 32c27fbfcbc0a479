use super::CompileError;
use crate::dtype::ElementType;
use crate::vector::{BinaryOpKind, NumericVector, UnaryOpKind};
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

/// Handle to a value in the target representation. Minted only by builders;
/// the compiler just threads them from producers to consumers.
#[derive(Debug, Clone, Copy, Hash, Ord, PartialOrd, Eq, PartialEq, Serialize, Deserialize)]
pub struct ValueId {
    inner: usize,
}

impl ValueId {
    pub fn from_index(index: usize) -> Self {
        Self { inner: index }
    }

    pub fn index(&self) -> usize {
        self.inner
    }
}

impl Display for ValueId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "%{}", self.inner)
    }
}

/// The operation vocabulary of the emit boundary. Static parameters ride in
/// the variant; runtime operands arrive as value handles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TargetOp {
    Binary(BinaryOpKind),
    Unary(UnaryOpKind),
    Sum,
    /// Matrix stored row-major as the first (flattened constant) operand,
    /// the vector as the second.
    MatVec { rows: usize, cols: usize },
    Slice { start: usize, len: usize },
    Concat,
}

impl Display for TargetOp {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            TargetOp::Binary(op) => write!(f, "{}", op),
            TargetOp::Unary(op) => write!(f, "{}", op),
            TargetOp::Sum => write!(f, "Sum"),
            TargetOp::MatVec { rows, cols } => write!(f, "MatVec[{}x{}]", rows, cols),
            TargetOp::Slice { start, len } => write!(f, "Slice[{}+{}]", start, len),
            TargetOp::Concat => write!(f, "Concat"),
        }
    }
}

/// The abstract emit boundary the compiler drives. The bundled
/// [`Program`](super::Program) is one implementation; hosts that want a
/// different artifact implement this and hand it to the compiler.
pub trait TargetBuilder {
    /// Declares a named external input of the emitted artifact.
    fn bind_input(
        &mut self,
        name: &str,
        dtype: ElementType,
        size: usize,
    ) -> Result<ValueId, CompileError>;

    /// Embeds a constant. Stateful nodes land their state here.
    fn emit_constant(&mut self, value: NumericVector) -> Result<ValueId, CompileError>;

    /// Emits one operation producing one value of the given type and size.
    fn emit(
        &mut self,
        op: TargetOp,
        args: &[ValueId],
        dtype: ElementType,
        size: usize,
    ) -> Result<ValueId, CompileError>;

    /// Declares a named external output of the emitted artifact.
    fn mark_output(&mut self, name: &str, value: ValueId) -> Result<(), CompileError>;
}
