use serde::{Deserialize, Serialize};

/// Element types a port can carry. The `Display` names are load-bearing:
/// they are spliced into composite archive type tags (`BinaryNode<Float32>`)
/// and must stay stable across releases.
#[derive(Copy, Clone, Debug, Hash, Eq, PartialEq, Ord, PartialOrd, Serialize, Deserialize)]
pub enum ElementType {
    F32,
    F64,
    I32,
    I64,
    Bool,
}

impl ElementType {
    pub fn size(&self) -> usize {
        match self {
            ElementType::F32 => 4,
            ElementType::F64 => 8,
            ElementType::I32 => 4,
            ElementType::I64 => 8,
            ElementType::Bool => 1,
        }
    }

    pub fn is_float(&self) -> bool {
        matches!(self, ElementType::F32 | ElementType::F64)
    }
}

impl std::fmt::Display for ElementType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ElementType::F32 => write!(f, "Float32"),
            ElementType::F64 => write!(f, "Float64"),
            ElementType::I32 => write!(f, "Int32"),
            ElementType::I64 => write!(f, "Int64"),
            ElementType::Bool => write!(f, "Bool"),
        }
    }
}
