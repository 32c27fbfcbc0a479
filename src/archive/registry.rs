use super::{ArchiveError, FromArchiveValue, NodeReadContext};
use crate::model::PortId;
use crate::nodes::{
    BinaryNode, ConstantNode, DctNode, DotProductNode, InputNode, MatrixVectorProductNode,
    OutputNode, SumNode, UnaryNode,
};
use crate::vector::{BinaryOpKind, Element, FloatElement, NumericVector, UnaryOpKind};
use std::collections::HashMap;
use std::str::FromStr;
use std::sync::{Arc, OnceLock, RwLock};

/// Rebuilds one archived node inside the read context's model and returns one
/// of the ports it produced.
pub type NodeFactory =
    Arc<dyn Fn(&mut NodeReadContext<'_>) -> Result<PortId, ArchiveError> + Send + Sync>;

fn registry() -> &'static RwLock<HashMap<String, NodeFactory>> {
    static REGISTRY: OnceLock<RwLock<HashMap<String, NodeFactory>>> = OnceLock::new();
    REGISTRY.get_or_init(|| RwLock::new(HashMap::new()))
}

/// Registers a reader for `type_tag`, replacing any previous registration.
/// Downstream crates call this for their own node kinds before reading
/// archives that contain them.
pub fn register_node_type(type_tag: impl Into<String>, factory: NodeFactory) {
    registry()
        .write()
        .expect("node type registry lock poisoned")
        .insert(type_tag.into(), factory);
}

pub(crate) fn factory_for(type_tag: &str) -> Result<NodeFactory, ArchiveError> {
    registry()
        .read()
        .expect("node type registry lock poisoned")
        .get(type_tag)
        .cloned()
        .ok_or_else(|| ArchiveError::UnknownArchiveType(type_tag.to_string()))
}

/// Registers readers for every bundled node family, once per process.
/// Reading an archive does this implicitly; later explicit registrations can
/// still override individual tags.
pub fn register_builtin_nodes() {
    static ONCE: OnceLock<()> = OnceLock::new();
    ONCE.get_or_init(|| {
        register_io_nodes::<f32>();
        register_io_nodes::<f64>();
        register_io_nodes::<i32>();
        register_io_nodes::<i64>();
        register_io_nodes::<bool>();
        register_arithmetic_nodes::<f32>();
        register_arithmetic_nodes::<f64>();
        register_arithmetic_nodes::<i32>();
        register_arithmetic_nodes::<i64>();
        register_float_nodes::<f32>();
        register_float_nodes::<f64>();
    });
}

fn register_io_nodes<T: Element + FromArchiveValue>() {
    register_node_type(
        format!("InputNode<{}>", T::ELEMENT_TYPE),
        Arc::new(|ctx| {
            let name: String = ctx.property("name")?;
            let size: usize = ctx.property("size")?;
            Ok(InputNode::<T>::new(ctx.model(), name, size)?)
        }),
    );
    register_node_type(
        format!("OutputNode<{}>", T::ELEMENT_TYPE),
        Arc::new(|ctx| {
            let name: String = ctx.property("name")?;
            let input = ctx.input("in")?;
            Ok(OutputNode::<T>::with_ranges(ctx.model(), name, input)?)
        }),
    );
    register_node_type(
        format!("ConstantNode<{}>", T::ELEMENT_TYPE),
        Arc::new(|ctx| {
            ctx.require_version(ConstantNode::<T>::ARCHIVE_VERSION)?;
            let values: NumericVector = if ctx.version() >= 2 {
                ctx.property("values")?
            } else {
                let raw: Vec<T> = ctx.property("values")?;
                T::vector_from_vec(raw)
            };
            Ok(ConstantNode::<T>::from_vector(ctx.model(), values)?)
        }),
    );
}

fn register_arithmetic_nodes<T: Element>() {
    register_node_type(
        format!("BinaryNode<{}>", T::ELEMENT_TYPE),
        Arc::new(|ctx| {
            let op = parse_op::<BinaryOpKind>(ctx, "operation")?;
            let left = ctx.input("left")?;
            let right = ctx.input("right")?;
            Ok(BinaryNode::<T>::with_ranges(ctx.model(), op, left, right)?)
        }),
    );
    register_node_type(
        format!("SumNode<{}>", T::ELEMENT_TYPE),
        Arc::new(|ctx| {
            let input = ctx.input("in")?;
            Ok(SumNode::<T>::with_ranges(ctx.model(), input)?)
        }),
    );
    register_node_type(
        format!("DotProductNode<{}>", T::ELEMENT_TYPE),
        Arc::new(|ctx| {
            let left = ctx.input("left")?;
            let right = ctx.input("right")?;
            Ok(DotProductNode::<T>::with_ranges(ctx.model(), left, right)?)
        }),
    );
}

fn register_float_nodes<T: FloatElement>() {
    register_node_type(
        format!("UnaryNode<{}>", T::ELEMENT_TYPE),
        Arc::new(|ctx| {
            let op = parse_op::<UnaryOpKind>(ctx, "operation")?;
            let input = ctx.input("in")?;
            Ok(UnaryNode::<T>::with_ranges(ctx.model(), op, input)?)
        }),
    );
    register_node_type(
        format!("MatrixVectorProductNode<{}>", T::ELEMENT_TYPE),
        Arc::new(|ctx| {
            let matrix = ctx.property("matrix")?;
            let input = ctx.input("in")?;
            Ok(MatrixVectorProductNode::<T>::with_ranges(
                ctx.model(),
                matrix,
                input,
            )?)
        }),
    );
    register_node_type(
        format!("DctNode<{}>", T::ELEMENT_TYPE),
        Arc::new(|ctx| {
            let input = ctx.input("in")?;
            Ok(DctNode::<T>::with_ranges(ctx.model(), input)?)
        }),
    );
}

fn parse_op<O: FromStr>(ctx: &NodeReadContext<'_>, name: &str) -> Result<O, ArchiveError> {
    let text: String = ctx.property(name)?;
    O::from_str(&text).map_err(|_| ArchiveError::WrongPropertyType {
        type_tag: ctx.type_tag().to_string(),
        name: name.to_string(),
    })
}
