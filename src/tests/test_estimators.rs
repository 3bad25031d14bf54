use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;

use ndarray::{array, Array1, ArrayView1};

use crate::activations::Activation;
use crate::error::Result;
use crate::estimator::{Estimator, PolicyEstimator, Prediction, TrainableModel, ValueEstimator};
use crate::network::NeuralNetwork;
use crate::normalization::{MeanVariance, Preprocess};

/// y = w2 * (w1 * x + b1) + b2
fn chain(w1: f32, b1: f32, w2: f32, b2: f32) -> NeuralNetwork {
    let mut network = NeuralNetwork::new(&[1, 1, 1], &[Activation::Linear, Activation::Linear]).unwrap();
    network.import_parameters(&[w1, b1, w2, b2]).unwrap();
    network
}

/// Declares one output but produces three.
#[derive(Clone)]
struct WrongSize;

impl TrainableModel for WrongSize {
    fn input_size(&self) -> usize {
        2
    }

    fn output_size(&self) -> usize {
        1
    }

    fn calculate(&self, _input: ArrayView1<f32>) -> Result<Prediction> {
        Ok(Prediction::exact(array![1.0, 2.0, 3.0]))
    }

    fn import_parameters(&mut self, _parameters: &[f32]) -> Result<()> {
        Ok(())
    }

    fn export_parameters(&self) -> Vec<f32> {
        Vec::new()
    }

    fn save(&self, _path: &Path) -> Result<()> {
        Ok(())
    }

    fn load(&mut self, _path: &Path) -> Result<()> {
        Ok(())
    }
}

#[test]
fn test_import_is_atomic_for_readers() {
    let estimator = Arc::new(Estimator::new("chain", chain(1.0, 0.0, 1.0, 0.0)));
    let scaled = Preprocess {
        input: None,
        output: Some(MeanVariance { mean: array![5.0], std: array![2.0] }),
    };
    // Old model: 1. New model: (6 + 4) * 2 + 5 = 25.
    let allowed = [1.0_f32, 25.0];

    let done = Arc::new(AtomicBool::new(false));
    let readers: Vec<_> = (0..4)
        .map(|_| {
            let estimator = Arc::clone(&estimator);
            let done = Arc::clone(&done);
            thread::spawn(move || {
                let mut seen = 0;
                while !done.load(Ordering::SeqCst) || seen == 0 {
                    let y = estimator.calculate(array![1.0].view()).unwrap()[0];
                    assert!(allowed.iter().any(|a| (a - y).abs() < 1e-4), "torn read: {}", y);
                    seen += 1;
                }
            })
        })
        .collect();

    for i in 0..2000 {
        if i % 2 == 0 {
            estimator.import(chain(2.0, 1.0, 3.0, 1.0), scaled.clone()).unwrap();
        } else {
            estimator.import(chain(1.0, 0.0, 1.0, 0.0), Preprocess::identity()).unwrap();
        }
    }
    done.store(true, Ordering::SeqCst);
    for reader in readers {
        reader.join().unwrap();
    }
}

#[test]
fn test_wrong_output_size_is_clamped_to_zeros() {
    let estimator = Estimator::new("mock", WrongSize);
    let output = estimator.calculate(array![0.5, 0.5].view()).unwrap();
    assert_eq!(output, Array1::<f32>::zeros(1));

    let policy = PolicyEstimator::new(WrongSize);
    assert_eq!(policy.action(array![0.5, 0.5].view()), Array1::<f32>::zeros(1));
}

#[test]
fn test_wrong_input_size_is_an_error() {
    let estimator = Estimator::new("chain", chain(1.0, 0.0, 1.0, 0.0));
    assert!(estimator.calculate(array![1.0, 2.0].view()).is_err());
}

#[test]
fn test_import_rejects_other_shapes() {
    let estimator = Estimator::new("chain", chain(1.0, 0.0, 1.0, 0.0));
    let wide = NeuralNetwork::new(&[2, 1], &[Activation::Linear]).unwrap();
    assert!(estimator.import(wide, Preprocess::identity()).is_err());

    let wrong_preprocess = Preprocess {
        input: Some(MeanVariance { mean: array![0.0, 0.0], std: array![1.0, 1.0] }),
        output: None,
    };
    assert!(estimator.import(chain(2.0, 0.0, 1.0, 0.0), wrong_preprocess).is_err());
    assert_eq!(estimator.calculate(array![3.0].view()).unwrap()[0], 3.0);
}

#[test]
fn test_normalization_applies_on_both_sides() {
    let estimator = Estimator::new("chain", chain(1.0, 0.0, 1.0, 0.0));
    let preprocess = Preprocess {
        input: Some(MeanVariance { mean: array![10.0], std: array![2.0] }),
        output: Some(MeanVariance { mean: array![-1.0], std: array![3.0] }),
    };
    estimator.import(chain(1.0, 0.0, 1.0, 0.0), preprocess).unwrap();

    // x = 14 -> (14 - 10) / 2 = 2 -> identity -> 2 * 3 - 1 = 5
    let y = estimator.calculate(array![14.0].view()).unwrap()[0];
    assert!((y - 5.0).abs() < 1e-5);
}

#[test]
fn test_save_and_load_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let model_path = dir.path().join("value");
    let preprocess_path = dir.path().join("value-preprocess");

    let value = ValueEstimator::with_architecture(2, 1, 2).unwrap();
    let state = array![0.3, -0.7];
    let action = array![0.5];
    let before = value.value(state.view(), action.view()).unwrap();
    value.save(&model_path, &preprocess_path).unwrap();

    let restored = ValueEstimator::with_architecture(2, 1, 2).unwrap();
    restored.load(&model_path, &preprocess_path).unwrap();
    assert_eq!(restored.value(state.view(), action.view()).unwrap(), before);
    assert_eq!(restored.export_parameters(), value.export_parameters());
}

#[test]
fn test_failed_load_leaves_estimator_untouched() {
    let dir = tempfile::tempdir().unwrap();
    let model_path = dir.path().join("policy");
    let preprocess_path = dir.path().join("policy-preprocess");

    let other = PolicyEstimator::with_architecture(3, 1, 2).unwrap();
    other.save(&model_path, &preprocess_path).unwrap();

    let policy = PolicyEstimator::with_architecture(2, 1, 2).unwrap();
    let before = policy.export_parameters();
    assert!(policy.load(&model_path, &preprocess_path).is_err());
    assert_eq!(policy.export_parameters(), before);

    assert!(policy.load(&dir.path().join("missing"), &preprocess_path).is_err());
    assert_eq!(policy.export_parameters(), before);
}
