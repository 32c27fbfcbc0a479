use ember_graph::archive::{
    ArchiveError, ArchiveRecord, ArchiveValue, ArchivedEdge, ModelArchive, PropertyWriter,
    from_json_string, models_equal, read_json_file, read_model, register_node_type,
    to_json_string, write_json_file, write_model,
};
use ember_graph::dtype::ElementType;
use ember_graph::model::node::{ComputeContext, ComputeError, Node};
use ember_graph::model::transform::ModelTransformer;
use ember_graph::model::{InputBinding, Model, ModelError, PortId, PortRange};
use ember_graph::nodes::{BinaryNode, ConstantNode, InputNode, OutputNode};
use ember_graph::vector::{BinaryOpKind, NumericVector};
use std::any::Any;
use std::collections::HashMap;
use std::sync::Arc;

fn double_model(op: BinaryOpKind) -> Model {
    let mut model = Model::new();
    let x = InputNode::<f32>::new(&mut model, "x", 3).unwrap();
    let folded = BinaryNode::<f32>::new(&mut model, op, x, x).unwrap();
    OutputNode::<f32>::new(&mut model, "y", folded).unwrap();
    model
}

#[test]
fn test_round_trip_preserves_structure_and_meaning() {
    let model = double_model(BinaryOpKind::Add);
    let archive = write_model(&model).unwrap();
    let restored = read_model(&archive).unwrap();
    assert!(models_equal(&model, &restored).unwrap());

    let mut inputs = HashMap::new();
    inputs.insert("x".to_string(), NumericVector::from(vec![1.0f32, 2.0, 3.0]));
    let results = restored.compute(&inputs).unwrap();
    assert_eq!(results["y"], NumericVector::from(vec![2.0f32, 4.0, 6.0]));

    let other = double_model(BinaryOpKind::Mul);
    assert!(!models_equal(&model, &other).unwrap());
}

#[test]
fn test_write_read_write_is_stable() {
    let model = double_model(BinaryOpKind::Add);
    let first = write_model(&model).unwrap();
    let restored = read_model(&first).unwrap();
    let second = write_model(&restored).unwrap();
    assert_eq!(first, second);
}

#[test]
fn test_json_round_trip() {
    let model = double_model(BinaryOpKind::Add);
    let text = to_json_string(&write_model(&model).unwrap()).unwrap();
    assert!(text.contains("InputNode<Float32>"));
    assert!(text.contains("BinaryNode<Float32>"));

    let restored = read_model(&from_json_string(&text).unwrap()).unwrap();
    assert!(models_equal(&model, &restored).unwrap());
}

#[test]
fn test_json_file_round_trip() {
    let model = double_model(BinaryOpKind::Add);
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("model.json");
    write_json_file(&model, &path).unwrap();
    let restored = read_json_file(&path).unwrap();
    assert!(models_equal(&model, &restored).unwrap());
}

#[test]
fn test_nested_record_properties_round_trip() {
    let mut window = PropertyWriter::new();
    window.write("rows", 2usize);
    window.write("label", "hann");

    let archive = ModelArchive {
        format_version: 1,
        nodes: vec![ArchiveRecord {
            id: 0,
            type_tag: "InputNode<Float32>".to_string(),
            version: 1,
            properties: vec![
                ("name".to_string(), ArchiveValue::from("x")),
                ("size".to_string(), ArchiveValue::from(2usize)),
                ("window".to_string(), ArchiveValue::from(window)),
            ],
        }],
        edges: vec![],
    };
    let restored = from_json_string(&to_json_string(&archive).unwrap()).unwrap();
    assert_eq!(archive, restored);

    // Properties a factory does not ask for, nested or not, are ignored.
    let model = read_model(&restored).unwrap();
    assert_eq!(model.node_count(), 1);
}

#[test]
fn test_unknown_node_type_is_rejected() {
    let archive = ModelArchive {
        format_version: 1,
        nodes: vec![ArchiveRecord {
            id: 0,
            type_tag: "MysteryNode".to_string(),
            version: 1,
            properties: Vec::new(),
        }],
        edges: Vec::new(),
    };
    assert!(matches!(
        read_model(&archive),
        Err(ArchiveError::UnknownArchiveType(tag)) if tag == "MysteryNode"
    ));
}

#[test]
fn test_newer_format_version_is_rejected() {
    let model = double_model(BinaryOpKind::Add);
    let mut archive = write_model(&model).unwrap();
    archive.format_version = 2;
    assert!(matches!(
        read_model(&archive),
        Err(ArchiveError::UnsupportedFormatVersion(2))
    ));
}

#[test]
fn test_newer_record_version_is_rejected() {
    let mut model = Model::new();
    let values = ConstantNode::<f32>::new(&mut model, vec![1.0, 2.0]).unwrap();
    OutputNode::<f32>::new(&mut model, "y", values).unwrap();

    let mut archive = write_model(&model).unwrap();
    assert_eq!(archive.nodes[0].version, 2);
    archive.nodes[0].version = 99;
    match read_model(&archive) {
        Err(ArchiveError::UnsupportedArchiveVersion {
            type_tag,
            found,
            supported,
        }) => {
            assert_eq!(type_tag, "ConstantNode<Float32>");
            assert_eq!(found, 99);
            assert_eq!(supported, 2);
        }
        other => panic!("expected a version rejection, got {other:?}"),
    }
}

#[test]
fn test_old_constant_layout_still_reads() {
    // Version 1 stored constants as a plain value sequence.
    let archive = ModelArchive {
        format_version: 1,
        nodes: vec![
            ArchiveRecord {
                id: 0,
                type_tag: "ConstantNode<Float64>".to_string(),
                version: 1,
                properties: vec![(
                    "values".to_string(),
                    ArchiveValue::Seq(vec![ArchiveValue::Float(1.0), ArchiveValue::Float(2.5)]),
                )],
            },
            ArchiveRecord {
                id: 1,
                type_tag: "OutputNode<Float64>".to_string(),
                version: 1,
                properties: vec![("name".to_string(), ArchiveValue::Str("y".to_string()))],
            },
        ],
        edges: vec![ArchivedEdge {
            to_node: 1,
            to_input: "in".to_string(),
            from_node: 0,
            from_port: "out".to_string(),
            start: 0,
            len: 2,
        }],
    };

    let model = read_model(&archive).unwrap();
    let results = model.compute(&HashMap::new()).unwrap();
    assert_eq!(results["y"], NumericVector::from(vec![1.0f64, 2.5]));

    // Writing the restored model upgrades the record to the current layout.
    let rewritten = write_model(&model).unwrap();
    assert_eq!(rewritten.nodes[0].version, 2);
    assert_eq!(
        rewritten.nodes[0].properties,
        vec![(
            "values".to_string(),
            ArchiveValue::Vector(NumericVector::from(vec![1.0f64, 2.5])),
        )]
    );
}

#[test]
fn test_missing_and_malformed_properties_are_reported() {
    let mut archive = ModelArchive {
        format_version: 1,
        nodes: vec![ArchiveRecord {
            id: 0,
            type_tag: "InputNode<Float32>".to_string(),
            version: 1,
            properties: vec![("name".to_string(), ArchiveValue::Str("x".to_string()))],
        }],
        edges: Vec::new(),
    };
    match read_model(&archive) {
        Err(ArchiveError::MissingProperty { type_tag, name }) => {
            assert_eq!(type_tag, "InputNode<Float32>");
            assert_eq!(name, "size");
        }
        other => panic!("expected a missing property, got {other:?}"),
    }

    archive.nodes[0]
        .properties
        .push(("size".to_string(), ArchiveValue::Str("three".to_string())));
    assert!(matches!(
        read_model(&archive),
        Err(ArchiveError::WrongPropertyType { name, .. }) if name == "size"
    ));
}

#[test]
fn test_unresolvable_records_are_rejected() {
    let record = |id: u64, name: &str| ArchiveRecord {
        id,
        type_tag: "OutputNode<Float32>".to_string(),
        version: 1,
        properties: vec![("name".to_string(), ArchiveValue::Str(name.to_string()))],
    };
    let edge = |to: u64, from: u64| ArchivedEdge {
        to_node: to,
        to_input: "in".to_string(),
        from_node: from,
        from_port: "out".to_string(),
        start: 0,
        len: 1,
    };

    // Mutual dependency between two records can never make progress.
    let cyclic = ModelArchive {
        format_version: 1,
        nodes: vec![record(0, "a"), record(1, "b")],
        edges: vec![edge(0, 1), edge(1, 0)],
    };
    assert!(matches!(
        read_model(&cyclic),
        Err(ArchiveError::UnresolvableNode(0))
    ));

    // An edge from a record that is not in the archive is just as stuck.
    let truncated = ModelArchive {
        format_version: 1,
        nodes: vec![record(0, "a")],
        edges: vec![edge(0, 7)],
    };
    assert!(matches!(
        read_model(&truncated),
        Err(ArchiveError::UnresolvableNode(0))
    ));
}

#[test]
fn test_duplicate_record_ids_are_rejected() {
    let record = || ArchiveRecord {
        id: 0,
        type_tag: "InputNode<Float32>".to_string(),
        version: 1,
        properties: vec![
            ("name".to_string(), ArchiveValue::Str("x".to_string())),
            ("size".to_string(), ArchiveValue::Int(2)),
        ],
    };
    let archive = ModelArchive {
        format_version: 1,
        nodes: vec![record(), record()],
        edges: Vec::new(),
    };
    assert!(matches!(
        read_model(&archive),
        Err(ArchiveError::DuplicateArchivedNode(0))
    ));
}

/// Element-wise multiply by a fixed factor, defined outside the bundled node
/// families to exercise third-party registration.
struct ScaleNode {
    factor: f64,
    input: Vec<PortRange>,
    output: PortId,
}

impl ScaleNode {
    fn new(model: &mut Model, factor: f64, input: PortId) -> Result<PortId, ModelError> {
        let range = model.full_range(input)?;
        Self::with_ranges(model, factor, vec![range])
    }

    fn with_ranges(
        model: &mut Model,
        factor: f64,
        input: Vec<PortRange>,
    ) -> Result<PortId, ModelError> {
        let size = input.iter().map(|r| r.len).sum();
        let output = model.new_port("out", ElementType::F64, size);
        model.add_node(Self {
            factor,
            input,
            output,
        })?;
        Ok(output)
    }
}

impl Node for ScaleNode {
    fn type_tag(&self) -> String {
        "ScaleNode".to_string()
    }

    fn inputs(&self) -> Vec<InputBinding> {
        vec![InputBinding::new(
            "in",
            ElementType::F64,
            self.input.clone(),
        )]
    }

    fn outputs(&self) -> Vec<PortId> {
        vec![self.output]
    }

    fn has_state(&self) -> bool {
        true
    }

    fn compute(&self, ctx: &ComputeContext<'_>) -> Result<Vec<NumericVector>, ComputeError> {
        let scaled: Vec<f64> = ctx
            .input(0)?
            .try_to_vec::<f64>()?
            .into_iter()
            .map(|v| v * self.factor)
            .collect();
        Ok(vec![NumericVector::from(scaled)])
    }

    fn copy(&self, transformer: &mut ModelTransformer) -> Result<(), ModelError> {
        let input = transformer.mapped_ranges(&self.input)?;
        let replacement = Self::with_ranges(transformer.model(), self.factor, input)?;
        transformer.map_output(self.output, replacement);
        Ok(())
    }

    fn write_properties(&self, writer: &mut PropertyWriter) {
        writer.write("factor", self.factor);
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

#[test]
fn test_registered_custom_node_round_trips() {
    register_node_type(
        "ScaleNode",
        Arc::new(|ctx| {
            let factor = ctx.optional_property("factor")?.unwrap_or(1.0);
            let input = ctx.input("in")?;
            Ok(ScaleNode::with_ranges(ctx.model(), factor, input)?)
        }),
    );

    let mut model = Model::new();
    let x = InputNode::<f64>::new(&mut model, "x", 3).unwrap();
    let scaled = ScaleNode::new(&mut model, 2.5, x).unwrap();
    OutputNode::<f64>::new(&mut model, "y", scaled).unwrap();

    let restored = read_model(&write_model(&model).unwrap()).unwrap();
    assert!(models_equal(&model, &restored).unwrap());

    let mut inputs = HashMap::new();
    inputs.insert("x".to_string(), NumericVector::from(vec![1.0f64, 2.0, -4.0]));
    let results = restored.compute(&inputs).unwrap();
    assert_eq!(results["y"], NumericVector::from(vec![2.5f64, 5.0, -10.0]));

    // A record without the optional factor falls back to the identity scale.
    let mut archive = write_model(&model).unwrap();
    archive.nodes[1].properties.clear();
    let identity = read_model(&archive).unwrap();
    let results = identity.compute(&inputs).unwrap();
    assert_eq!(results["y"], NumericVector::from(vec![1.0f64, 2.0, -4.0]));
}
