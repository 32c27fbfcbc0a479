use crate::graph_tests::{Evaluator, inputs_of, test_eq_exact, test_eq_f32, test_eq_f64};
use ember_graph::model::Model;
use ember_graph::nodes::{
    BinaryNode, ConstantNode, DotProductNode, InputNode, MatrixVectorProductNode, OutputNode,
    SumNode,
};
use ember_graph::vector::{BinaryOpKind, NumericMatrix, NumericVector};
use ndarray::array;
use std::collections::HashMap;

pub fn test_dot_product_fp32(eval: &Evaluator) {
    let mut model = Model::new();
    let x = InputNode::<f32>::new(&mut model, "x", 3).unwrap();
    let weights = ConstantNode::<f32>::new(&mut model, vec![1.0, 0.5, 2.0]).unwrap();
    let dot = DotProductNode::<f32>::new(&mut model, x, weights).unwrap();
    OutputNode::<f32>::new(&mut model, "y", dot).unwrap();

    let inputs = inputs_of(&[("x", NumericVector::from(vec![2.0f32, 4.0, 1.0]))]);
    let results = eval.run(&model, &inputs);
    test_eq_f32(&results["y"], &[6.0]);
}

pub fn test_dot_product_i64(eval: &Evaluator) {
    let mut model = Model::new();
    let x = InputNode::<i64>::new(&mut model, "x", 4).unwrap();
    let weights = ConstantNode::<i64>::new(&mut model, vec![1, -1, 1, -1]).unwrap();
    let dot = DotProductNode::<i64>::new(&mut model, x, weights).unwrap();
    OutputNode::<i64>::new(&mut model, "y", dot).unwrap();

    let inputs = inputs_of(&[("x", NumericVector::from(vec![10i64, 3, 2, 1]))]);
    let results = eval.run(&model, &inputs);
    test_eq_exact(&results["y"], &[8i64]);
}

pub fn test_sum_fp64(eval: &Evaluator) {
    let mut model = Model::new();
    let x = InputNode::<f64>::new(&mut model, "x", 5).unwrap();
    let total = SumNode::<f64>::new(&mut model, x).unwrap();
    OutputNode::<f64>::new(&mut model, "y", total).unwrap();

    let inputs = inputs_of(&[("x", NumericVector::from(vec![0.5f64, 1.5, 2.0, -1.0, 7.0]))]);
    let results = eval.run(&model, &inputs);
    test_eq_f64(&results["y"], &[10.0]);
}

pub fn test_matvec_fp32(eval: &Evaluator) {
    let mut model = Model::new();
    let x = InputNode::<f32>::new(&mut model, "x", 2).unwrap();
    let matrix = NumericMatrix::F32(array![[1.0, 2.0], [3.0, 4.0], [5.0, 6.0]]);
    let product = MatrixVectorProductNode::<f32>::new(&mut model, matrix, x).unwrap();
    OutputNode::<f32>::new(&mut model, "y", product).unwrap();

    let inputs = inputs_of(&[("x", NumericVector::from(vec![1.0f32, 10.0]))]);
    let results = eval.run(&model, &inputs);
    test_eq_f32(&results["y"], &[21.0, 43.0, 65.0]);
}

pub fn test_matvec_of_constant_fp64(eval: &Evaluator) {
    let mut model = Model::new();
    let signal = ConstantNode::<f64>::new(&mut model, vec![1.0, -1.0]).unwrap();
    let matrix = NumericMatrix::F64(array![[2.0, 0.0], [0.0, 3.0]]);
    let product = MatrixVectorProductNode::<f64>::new(&mut model, matrix, signal).unwrap();
    OutputNode::<f64>::new(&mut model, "y", product).unwrap();

    let results = eval.run(&model, &HashMap::new());
    test_eq_f64(&results["y"], &[2.0, -3.0]);
}

pub fn test_two_sinks_fp32(eval: &Evaluator) {
    let mut model = Model::new();
    let x = InputNode::<f32>::new(&mut model, "x", 2).unwrap();
    let doubled = BinaryNode::<f32>::new(&mut model, BinaryOpKind::Add, x, x).unwrap();
    OutputNode::<f32>::new(&mut model, "raw", x).unwrap();
    OutputNode::<f32>::new(&mut model, "doubled", doubled).unwrap();

    let inputs = inputs_of(&[("x", NumericVector::from(vec![1.5f32, -2.0]))]);
    let results = eval.run(&model, &inputs);
    test_eq_f32(&results["raw"], &[1.5, -2.0]);
    test_eq_f32(&results["doubled"], &[3.0, -4.0]);
}

pub fn test_shared_subexpression_fp32(eval: &Evaluator) {
    let mut model = Model::new();
    let x = InputNode::<f32>::new(&mut model, "x", 2).unwrap();
    let offset = ConstantNode::<f32>::new(&mut model, vec![1.0, 1.0]).unwrap();
    let shifted = BinaryNode::<f32>::new(&mut model, BinaryOpKind::Add, x, offset).unwrap();
    let squared = BinaryNode::<f32>::new(&mut model, BinaryOpKind::Mul, shifted, shifted).unwrap();
    let tripled = ConstantNode::<f32>::new(&mut model, vec![3.0, 3.0]).unwrap();
    let scaled = BinaryNode::<f32>::new(&mut model, BinaryOpKind::Mul, shifted, tripled).unwrap();
    OutputNode::<f32>::new(&mut model, "square", squared).unwrap();
    OutputNode::<f32>::new(&mut model, "scaled", scaled).unwrap();

    let inputs = inputs_of(&[("x", NumericVector::from(vec![1.0f32, 2.0]))]);
    let results = eval.run(&model, &inputs);
    test_eq_f32(&results["square"], &[4.0, 9.0]);
    test_eq_f32(&results["scaled"], &[6.0, 9.0]);
}
