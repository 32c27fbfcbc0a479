use ember_graph::compile::compile_to_program;
use ember_graph::model::Model;
use ember_graph::model::transform::{RefineOptions, refine_to_fixed_point};
use ember_graph::vector::{Element, NumericVector};
use std::collections::HashMap;

pub mod arith;
pub mod pipelines;
pub mod signal;

/// Which execution path a test exercises. Both must agree on every model,
/// since refinement and lowering preserve semantics.
pub enum Evaluator {
    Direct,
    Compiled,
}

impl Evaluator {
    pub fn run(
        &self,
        model: &Model,
        inputs: &HashMap<String, NumericVector>,
    ) -> HashMap<String, NumericVector> {
        match self {
            Evaluator::Direct => model.compute(inputs).unwrap(),
            Evaluator::Compiled => {
                let refined = refine_to_fixed_point(model, &RefineOptions::default())
                    .unwrap()
                    .into_converged()
                    .unwrap();
                let program = compile_to_program(&refined).unwrap();
                program.run(inputs).unwrap()
            }
        }
    }
}

pub fn inputs_of(pairs: &[(&str, NumericVector)]) -> HashMap<String, NumericVector> {
    pairs
        .iter()
        .map(|(name, value)| (name.to_string(), value.clone()))
        .collect()
}

fn assert_close(value: &[f64], correct: &[f64], atol: f64, rtol: f64) {
    assert_eq!(value.len(), correct.len());
    for i in 0..value.len() {
        let a = value[i];
        let b = correct[i];
        let err = (a - b).abs();
        let limit = atol + rtol * a.abs().max(b.abs());
        assert!(err <= limit, "{a} != {b}: {err} <= {limit}");
    }
}

pub fn test_eq_f32(value: &NumericVector, correct: &[f32]) {
    let value: Vec<f64> = value
        .try_to_vec::<f32>()
        .unwrap()
        .into_iter()
        .map(f64::from)
        .collect();
    let correct: Vec<f64> = correct.iter().copied().map(f64::from).collect();
    assert_close(&value, &correct, 1e-6, 1e-5);
}

pub fn test_eq_f64(value: &NumericVector, correct: &[f64]) {
    let value: Vec<f64> = value.try_to_vec().unwrap();
    assert_close(&value, correct, 1e-12, 1e-12);
}

pub fn test_eq_exact<T: Element>(value: &NumericVector, correct: &[T]) {
    let value: Vec<T> = value.try_to_vec().unwrap();
    assert_eq!(value, correct);
}
