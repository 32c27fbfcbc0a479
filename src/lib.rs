pub mod archive;
pub mod compile;
pub mod dtype;
pub mod model;
pub mod nodes;
pub mod select;
pub mod vector;

pub use compile::{Program, compile_to_program};
pub use dtype::ElementType;
pub use model::node_map::NodeMap;
pub use model::transform::{RefineOptions, RefineResult, refine_to_fixed_point};
pub use model::{Model, NodeId, PortId, PortRange};
pub use select::CoordinateList;
pub use vector::{BinaryOpKind, NumericMatrix, NumericVector, UnaryOpKind};
