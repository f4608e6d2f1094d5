use crate::{math::matrix::Matrix, layers::dense::Layer};

/// SGD with a learning rate and an L2 penalty per layer.
#[derive(Debug, Clone, PartialEq)]
pub struct LayerwiseSgd {
    pub learning_rates: Vec<f64>,
    pub penalties: Vec<f64>,
}

impl LayerwiseSgd {
    pub fn new(learning_rates: Vec<f64>, penalties: Vec<f64>) -> LayerwiseSgd {
        assert_eq!(learning_rates.len(), penalties.len(), "one penalty per learning rate");
        LayerwiseSgd { learning_rates, penalties }
    }

    /// Penalty term `Σ penalty_i · ‖W_i‖²` over the layers' weights.
    pub fn regularization(&self, layers: &[Layer]) -> f64 {
        layers.iter().zip(self.penalties.iter())
            .map(|(layer, p)| p * layer.weights.sum_of_squares())
            .sum()
    }

    /// Applies one update to layer `index`; the penalty gradient is added here.
    pub fn step(&self, index: usize, layer: &mut Layer, weights_grad: Matrix, biases_grad: Matrix) {
        let penalty = self.penalties[index];
        let weights_grad = if penalty > 0.0 {
            weights_grad + layer.weights.map(|w| 2.0 * penalty * w)
        } else {
            weights_grad
        };
        layer.apply_gradients(weights_grad, biases_grad, self.learning_rates[index]);
    }
}
