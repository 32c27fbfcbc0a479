use crate::graph_tests::{Evaluator, inputs_of, test_eq_f32, test_eq_f64};
use ember_graph::model::{Model, PortRange};
use ember_graph::nodes::{DctNode, InputNode, OutputNode, dct_matrix};
use ember_graph::vector::NumericVector;

pub fn test_dct_constant_signal_fp64(eval: &Evaluator) {
    let mut model = Model::new();
    let x = InputNode::<f64>::new(&mut model, "x", 4).unwrap();
    let spectrum = DctNode::<f64>::new(&mut model, x).unwrap();
    OutputNode::<f64>::new(&mut model, "y", spectrum).unwrap();

    // A constant signal has all of its energy in the zeroth coefficient.
    let inputs = inputs_of(&[("x", NumericVector::from(vec![1.0f64; 4]))]);
    let results = eval.run(&model, &inputs);
    test_eq_f64(&results["y"], &[2.0, 0.0, 0.0, 0.0]);
}

pub fn test_dct_ramp_signal_fp32(eval: &Evaluator) {
    let mut model = Model::new();
    let x = InputNode::<f32>::new(&mut model, "x", 4).unwrap();
    let spectrum = DctNode::<f32>::new(&mut model, x).unwrap();
    OutputNode::<f32>::new(&mut model, "y", spectrum).unwrap();

    let signal = NumericVector::from(vec![0.0f32, 1.0, 2.0, 3.0]);
    let expected: Vec<f32> = dct_matrix::<f32>(4)
        .matvec(&signal)
        .unwrap()
        .try_to_vec()
        .unwrap();

    let inputs = inputs_of(&[("x", signal)]);
    let results = eval.run(&model, &inputs);
    test_eq_f32(&results["y"], &expected);
}

pub fn test_dct_low_coefficients_fp64(eval: &Evaluator) {
    let mut model = Model::new();
    let x = InputNode::<f64>::new(&mut model, "x", 8).unwrap();
    let spectrum = DctNode::<f64>::new(&mut model, x).unwrap();
    OutputNode::<f64>::with_ranges(&mut model, "low", vec![PortRange::new(spectrum, 0, 3)])
        .unwrap();

    let signal = NumericVector::from(vec![3.0f64, 2.5, 2.0, 1.5, 1.0, 0.5, 0.0, -0.5]);
    let expected: Vec<f64> = dct_matrix::<f64>(8)
        .matvec(&signal)
        .unwrap()
        .try_to_vec()
        .unwrap();

    let inputs = inputs_of(&[("x", signal)]);
    let results = eval.run(&model, &inputs);
    test_eq_f64(&results["low"], &expected[..3]);
}
