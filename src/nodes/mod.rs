pub mod binary;
pub mod constant;
pub mod dct;
pub mod dot;
pub mod io;
pub mod matvec;
pub mod reduce;
pub mod unary;

pub use binary::BinaryNode;
pub use constant::ConstantNode;
pub use dct::{DctNode, dct_matrix};
pub use dot::DotProductNode;
pub use io::{InputNode, OutputNode};
pub use matvec::MatrixVectorProductNode;
pub use reduce::SumNode;
pub use unary::UnaryNode;
