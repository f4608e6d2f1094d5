use crate::{math::matrix::Matrix, activation::activation::ActivationFunction};

/// A dense map applied independently to every pixel (a 1×1 convolution).
///
/// Inputs are `(pixels, input_size)` matrices; outputs are `(pixels, size)`.
#[derive(Debug, Clone)]
pub struct Layer {
    pub name: String,
    pub size: usize,
    pub weights: Matrix,
    pub biases: Matrix,
    pub activator: ActivationFunction,
}

/// Values cached by a forward pass that the backward pass needs.
#[derive(Debug)]
pub struct ForwardCache {
    pub input: Matrix,
    pre_activation: Matrix,
}

impl Layer {
    pub fn new(name: impl Into<String>, size: usize, input_size: usize, activation: ActivationFunction) -> Layer {
        let weights = match activation {
            ActivationFunction::ReLU | ActivationFunction::LeakyReLU { .. } => Matrix::he(input_size, size),
            _ => Matrix::xavier(input_size, size),
        };
        Layer {
            name: name.into(),
            size,
            weights,
            biases: Matrix::zeros(1, size),
            activator: activation,
        }
    }

    /// Layer initialised to pass its input through unchanged.
    pub fn identity(name: impl Into<String>, size: usize) -> Layer {
        Layer {
            name: name.into(),
            size,
            weights: Matrix::identity(size),
            biases: Matrix::zeros(1, size),
            activator: ActivationFunction::Identity,
        }
    }

    pub fn input_size(&self) -> usize {
        self.weights.rows
    }

    /// Forward pass without touching the layer's state.
    pub fn forward(&self, input: &Matrix) -> Matrix {
        let z = input.matmul(&self.weights).add_row(&self.biases);
        z.map(|x| self.activator.function(x))
    }

    /// Forward pass that also returns what `compute_gradients` needs.
    pub fn forward_cached(&self, input: Matrix) -> (Matrix, ForwardCache) {
        let z = input.matmul(&self.weights).add_row(&self.biases);
        let a = z.map(|x| self.activator.function(x));
        (a, ForwardCache { input, pre_activation: z })
    }

    /// Computes gradient adjustments. Returns (weights_grad, biases_grad, input_delta).
    /// `output_delta` is ∂L/∂a for this layer (error in activation space).
    pub fn compute_gradients(&self, output_delta: &Matrix, cache: &ForwardCache) -> (Matrix, Matrix, Matrix) {
        // Use pre-activation z so that derivative(z) = σ'(z) is computed correctly
        let act_derivative = cache.pre_activation.map(|x| self.activator.derivative(x));
        let layer_delta = output_delta.hadamard(&act_derivative);

        let weights_grad = cache.input.transpose().matmul(&layer_delta);
        let biases_grad = layer_delta.sum_rows();
        let input_delta = layer_delta.matmul(&self.weights.transpose());

        (weights_grad, biases_grad, input_delta)
    }

    /// Applies pre-computed gradients scaled by lr.
    pub fn apply_gradients(&mut self, weights_grad: Matrix, biases_grad: Matrix, lr: f64) {
        self.weights = self.weights.clone() - weights_grad.map(|x| x * lr);
        self.biases = self.biases.clone() - biases_grad.map(|x| x * lr);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identity_layer_passes_pixels_through() {
        let layer = Layer::identity("color", 3);
        let x = Matrix::from_vec(2, 3, vec![0.1, 0.2, 0.3, 0.4, 0.5, 0.6]);
        assert_eq!(layer.forward(&x), x);
    }

    #[test]
    fn test_weight_gradient_matches_finite_difference() {
        let mut layer = Layer::new("hidden", 2, 3, ActivationFunction::Tanh);
        let x = Matrix::from_vec(2, 3, vec![0.1, -0.4, 0.7, 0.5, 0.2, -0.3]);
        // L = sum(a), so dL/da = 1
        let loss = |l: &Layer| l.forward(&x).data.iter().sum::<f64>();

        let (a, cache) = layer.forward_cached(x.clone());
        let ones = a.map(|_| 1.0);
        let (w_grad, b_grad, _) = layer.compute_gradients(&ones, &cache);

        let h = 1e-6;
        let base = layer.weights.get(1, 0);
        layer.weights.set(1, 0, base + h);
        let up = loss(&layer);
        layer.weights.set(1, 0, base - h);
        let down = loss(&layer);
        layer.weights.set(1, 0, base);
        assert!(((up - down) / (2.0 * h) - w_grad.get(1, 0)).abs() < 1e-6);
        assert_eq!((b_grad.rows, b_grad.cols), (1, 2));
    }
}
