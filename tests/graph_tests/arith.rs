use crate::graph_tests::{Evaluator, inputs_of, test_eq_exact, test_eq_f32, test_eq_f64};
use ember_graph::model::{Model, PortRange};
use ember_graph::nodes::{BinaryNode, ConstantNode, InputNode, OutputNode, UnaryNode};
use ember_graph::vector::{BinaryOpKind, NumericVector, UnaryOpKind};

pub fn test_double_fp32(eval: &Evaluator) {
    let mut model = Model::new();
    let x = InputNode::<f32>::new(&mut model, "x", 3).unwrap();
    let two = ConstantNode::<f32>::new(&mut model, vec![2.0; 3]).unwrap();
    let doubled = BinaryNode::<f32>::new(&mut model, BinaryOpKind::Mul, x, two).unwrap();
    OutputNode::<f32>::new(&mut model, "y", doubled).unwrap();

    let inputs = inputs_of(&[("x", NumericVector::from(vec![1.0f32, 2.0, 3.0]))]);
    let results = eval.run(&model, &inputs);
    test_eq_f32(&results["y"], &[2.0, 4.0, 6.0]);
}

pub fn test_add_fp32(eval: &Evaluator) {
    let mut model = Model::new();
    let a = InputNode::<f32>::new(&mut model, "a", 3).unwrap();
    let b = InputNode::<f32>::new(&mut model, "b", 3).unwrap();
    let sum = BinaryNode::<f32>::new(&mut model, BinaryOpKind::Add, a, b).unwrap();
    OutputNode::<f32>::new(&mut model, "y", sum).unwrap();

    let inputs = inputs_of(&[
        ("a", NumericVector::from(vec![0.5f32, 1.25, -3.0])),
        ("b", NumericVector::from(vec![4.5f32, 0.75, 3.0])),
    ]);
    let results = eval.run(&model, &inputs);
    test_eq_f32(&results["y"], &[5.0, 2.0, 0.0]);
}

pub fn test_div_fp64(eval: &Evaluator) {
    let mut model = Model::new();
    let x = InputNode::<f64>::new(&mut model, "x", 2).unwrap();
    let halves = ConstantNode::<f64>::new(&mut model, vec![2.0, 4.0]).unwrap();
    let scaled = BinaryNode::<f64>::new(&mut model, BinaryOpKind::Div, x, halves).unwrap();
    OutputNode::<f64>::new(&mut model, "y", scaled).unwrap();

    let inputs = inputs_of(&[("x", NumericVector::from(vec![9.0f64, 10.0]))]);
    let results = eval.run(&model, &inputs);
    test_eq_f64(&results["y"], &[4.5, 2.5]);
}

pub fn test_add_mul_i32(eval: &Evaluator) {
    let mut model = Model::new();
    let x = InputNode::<i32>::new(&mut model, "x", 4).unwrap();
    let offset = ConstantNode::<i32>::new(&mut model, vec![1, 1, 1, 1]).unwrap();
    let shifted = BinaryNode::<i32>::new(&mut model, BinaryOpKind::Add, x, offset).unwrap();
    let squared = BinaryNode::<i32>::new(&mut model, BinaryOpKind::Mul, shifted, shifted).unwrap();
    OutputNode::<i32>::new(&mut model, "y", squared).unwrap();

    let inputs = inputs_of(&[("x", NumericVector::from(vec![0i32, 1, 2, -3]))]);
    let results = eval.run(&model, &inputs);
    test_eq_exact(&results["y"], &[1i32, 4, 9, 4]);
}

pub fn test_min_max_i64(eval: &Evaluator) {
    let mut model = Model::new();
    let x = InputNode::<i64>::new(&mut model, "x", 3).unwrap();
    let bound = ConstantNode::<i64>::new(&mut model, vec![0, 0, 0]).unwrap();
    let clipped = BinaryNode::<i64>::new(&mut model, BinaryOpKind::Max, x, bound).unwrap();
    let ceiling = ConstantNode::<i64>::new(&mut model, vec![10, 10, 10]).unwrap();
    let limited = BinaryNode::<i64>::new(&mut model, BinaryOpKind::Min, clipped, ceiling).unwrap();
    OutputNode::<i64>::new(&mut model, "y", limited).unwrap();

    let inputs = inputs_of(&[("x", NumericVector::from(vec![-5i64, 3, 40]))]);
    let results = eval.run(&model, &inputs);
    test_eq_exact(&results["y"], &[0i64, 3, 10]);
}

pub fn test_unary_chain_fp32(eval: &Evaluator) {
    let mut model = Model::new();
    let x = InputNode::<f32>::new(&mut model, "x", 3).unwrap();
    let magnitude = UnaryNode::<f32>::new(&mut model, UnaryOpKind::Abs, x).unwrap();
    let root = UnaryNode::<f32>::new(&mut model, UnaryOpKind::Sqrt, magnitude).unwrap();
    OutputNode::<f32>::new(&mut model, "y", root).unwrap();

    let inputs = inputs_of(&[("x", NumericVector::from(vec![-4.0f32, 9.0, -16.0]))]);
    let results = eval.run(&model, &inputs);
    test_eq_f32(&results["y"], &[2.0, 3.0, 4.0]);
}

pub fn test_exp_log_fp64(eval: &Evaluator) {
    let mut model = Model::new();
    let x = InputNode::<f64>::new(&mut model, "x", 3).unwrap();
    let lifted = UnaryNode::<f64>::new(&mut model, UnaryOpKind::Exp, x).unwrap();
    let back = UnaryNode::<f64>::new(&mut model, UnaryOpKind::Log, lifted).unwrap();
    OutputNode::<f64>::new(&mut model, "y", back).unwrap();

    let inputs = inputs_of(&[("x", NumericVector::from(vec![0.25f64, 1.0, 2.5]))]);
    let results = eval.run(&model, &inputs);
    let got: Vec<f64> = results["y"].try_to_vec().unwrap();
    for (a, b) in got.iter().zip([0.25f64, 1.0, 2.5]) {
        assert!((a - b).abs() < 1e-12);
    }
}

pub fn test_slice_wiring_fp32(eval: &Evaluator) {
    let mut model = Model::new();
    let x = InputNode::<f32>::new(&mut model, "x", 4).unwrap();
    let head = vec![PortRange::new(x, 0, 2)];
    let tail = vec![PortRange::new(x, 2, 2)];
    let folded = BinaryNode::<f32>::with_ranges(&mut model, BinaryOpKind::Add, head, tail).unwrap();
    OutputNode::<f32>::new(&mut model, "y", folded).unwrap();

    let inputs = inputs_of(&[("x", NumericVector::from(vec![1.0f32, 2.0, 10.0, 20.0]))]);
    let results = eval.run(&model, &inputs);
    test_eq_f32(&results["y"], &[11.0, 22.0]);
}

pub fn test_concat_wiring_fp32(eval: &Evaluator) {
    let mut model = Model::new();
    let a = InputNode::<f32>::new(&mut model, "a", 2).unwrap();
    let b = InputNode::<f32>::new(&mut model, "b", 2).unwrap();
    let joined = vec![
        model.full_range(a).unwrap(),
        model.full_range(b).unwrap(),
    ];
    let negated = UnaryNode::<f32>::with_ranges(&mut model, UnaryOpKind::Negate, joined).unwrap();
    OutputNode::<f32>::new(&mut model, "y", negated).unwrap();

    let inputs = inputs_of(&[
        ("a", NumericVector::from(vec![1.0f32, 2.0])),
        ("b", NumericVector::from(vec![3.0f32, 4.0])),
    ]);
    let results = eval.run(&model, &inputs);
    test_eq_f32(&results["y"], &[-1.0, -2.0, -3.0, -4.0]);
}

pub fn test_bool_passthrough(eval: &Evaluator) {
    let mut model = Model::new();
    let flags = InputNode::<bool>::new(&mut model, "flags", 3).unwrap();
    OutputNode::<bool>::new(&mut model, "y", flags).unwrap();

    let inputs = inputs_of(&[("flags", NumericVector::from(vec![true, false, true]))]);
    let results = eval.run(&model, &inputs);
    test_eq_exact(&results["y"], &[true, false, true]);
}
