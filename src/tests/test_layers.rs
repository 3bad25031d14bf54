use ndarray::{arr2, Array2};
use crate::activations::Activation;
use crate::layers::{DenseLayer, WeightInit};

#[test]
fn test_layer_creation() {
    let layer = DenseLayer::new(3, 2, Activation::Relu);
    assert_eq!(layer.weights.shape(), [3, 2]);
    assert_eq!(layer.biases.shape(), [2]);
    assert_eq!(layer.parameter_count(), 8);
}

#[test]
fn test_dense_layer_forward() {
    let mut layer = DenseLayer::new(2, 2, Activation::Relu);
    layer.weights = arr2(&[[1.0, -1.0], [2.0, 0.5]]);
    layer.biases = ndarray::arr1(&[0.0, -10.0]);

    let output = layer.forward_batch(arr2(&[[1.0, 1.0]]).view());
    assert_eq!(output, arr2(&[[3.0, 0.0]]));
}

#[test]
fn test_weight_initialization() {
    let layer = DenseLayer::new_with_init(10, 20, Activation::Tanh, WeightInit::XavierUniform);
    let limit = (6.0 / 30.0_f32).sqrt();
    for &w in layer.weights.iter() {
        assert!(w >= -limit && w <= limit);
    }

    let layer = DenseLayer::new_with_init(10, 20, Activation::Relu, WeightInit::HeNormal);
    let var: f32 = layer.weights.iter().map(|&x| x * x).sum::<f32>() / (10.0 * 20.0);
    let expected_var = 2.0 / 10.0;
    assert!((var - expected_var).abs() < 0.5);
}

#[test]
fn test_backward_shapes() {
    let layer = DenseLayer::new(4, 3, Activation::Tanh);
    let inputs = Array2::ones((5, 4));
    let pre = layer.pre_activation(inputs.view());
    let grads = layer.backward_batch(inputs.view(), pre.view(), Array2::ones((5, 3)).view());

    assert_eq!(grads.weights.dim(), (4, 3));
    assert_eq!(grads.biases.len(), 3);
    assert_eq!(grads.input_errors.dim(), (5, 4));
}

#[test]
fn test_randomize_keeps_shape() {
    let mut layer = DenseLayer::new_with_init(3, 2, Activation::Linear, WeightInit::Uniform { min: 5.0, max: 6.0 });
    layer.biases.fill(1.0);
    layer.randomize();

    assert_eq!(layer.weights.dim(), (3, 2));
    assert!(layer.biases.iter().all(|&b| b == 0.0));
    assert!(layer.weights.iter().all(|&w| w.abs() < 5.0));
}
