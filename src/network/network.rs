use crate::{
    error::{Result, SolverError},
    layers::dense::Layer,
    loss::mse::MseLoss,
    math::{image_batch::ImageBatch, matrix::Matrix},
    network::{hyperparams::Hyperparams, spec::NetworkSpec},
    optim::sgd::LayerwiseSgd,
    train::trainable::{ParamArray, Prediction, StepOutput, Trainable},
};

/// A stack of per-pixel layers trained with layer-wise SGD.
pub struct Network {
    pub name: String,
    pub layers: Vec<Layer>,
    optimizer: LayerwiseSgd,
}

impl Network {
    /// Builds a freshly initialised network; every layer needs an entry in both
    /// hyperparameter maps.
    pub fn build(spec: &NetworkSpec, hyperparams: &Hyperparams, channels: usize) -> Result<Network> {
        spec.validate(channels)?;
        let mut learning_rates = Vec::with_capacity(spec.layers.len());
        let mut penalties = Vec::with_capacity(spec.layers.len());
        for layer in &spec.layers {
            let (lr, penalty) = hyperparams.for_layer(&layer.name)?;
            learning_rates.push(lr);
            penalties.push(penalty);
        }
        let layers = spec.layers.iter()
            .map(|l| Layer::new(l.name.clone(), l.size, l.input_size, l.activation))
            .collect();
        Ok(Network {
            name: spec.name.clone(),
            layers,
            optimizer: LayerwiseSgd::new(learning_rates, penalties),
        })
    }

    /// Network from ready-made layers, for callers that set weights directly.
    pub fn from_layers(name: impl Into<String>, layers: Vec<Layer>, optimizer: LayerwiseSgd) -> Network {
        Network { name: name.into(), layers, optimizer }
    }

    fn forward(&self, input: Matrix) -> Matrix {
        self.layers.iter().fold(input, |x, layer| layer.forward(&x))
    }

    fn check_shapes(&self, inputs: &ImageBatch, targets: &ImageBatch) -> Result<()> {
        if (inputs.n, inputs.height, inputs.width) != (targets.n, targets.height, targets.width) {
            return Err(SolverError::training(format!(
                "input batch {:?}x{} does not match target batch {:?}x{}",
                inputs.image_shape(), inputs.n, targets.image_shape(), targets.n
            )));
        }
        Ok(())
    }
}

impl Trainable for Network {
    fn train_step(&mut self, inputs: &ImageBatch, targets: &ImageBatch) -> Result<StepOutput> {
        self.check_shapes(inputs, targets)?;
        let expected = targets.to_pixel_matrix();

        // Forward pass, keeping per-layer caches for backprop.
        let mut caches = Vec::with_capacity(self.layers.len());
        let mut current = inputs.to_pixel_matrix();
        for layer in &self.layers {
            let (a, cache) = layer.forward_cached(current);
            caches.push(cache);
            current = a;
        }

        let loss = MseLoss::loss(&current, &expected);
        let regularization = self.optimizer.regularization(&self.layers);
        if !loss.is_finite() || !regularization.is_finite() {
            return Err(SolverError::training(format!(
                "objective diverged (loss={}, reg={})",
                loss, regularization
            )));
        }

        // Backward pass: gradients for every layer first, then apply.
        let mut delta = MseLoss::derivative(&current, &expected);
        let mut grads = Vec::with_capacity(self.layers.len());
        for (layer, cache) in self.layers.iter().zip(caches.iter()).rev() {
            let (w_grad, b_grad, input_delta) = layer.compute_gradients(&delta, cache);
            grads.push((w_grad, b_grad));
            delta = input_delta;
        }
        grads.reverse();
        for (i, (w_grad, b_grad)) in grads.into_iter().enumerate() {
            self.optimizer.step(i, &mut self.layers[i], w_grad, b_grad);
        }

        let prediction = ImageBatch::from_pixel_matrix(inputs.n, inputs.height, inputs.width, &current)?;
        Ok(StepOutput { error: loss + regularization, loss, regularization, prediction })
    }

    fn predict(&self, inputs: &ImageBatch, targets: &ImageBatch) -> Result<Prediction> {
        self.check_shapes(inputs, targets)?;
        let output = self.forward(inputs.to_pixel_matrix());
        let loss = MseLoss::loss(&output, &targets.to_pixel_matrix());
        let prediction = ImageBatch::from_pixel_matrix(inputs.n, inputs.height, inputs.width, &output)?;
        Ok(Prediction { loss, prediction })
    }

    fn parameters(&self) -> Vec<ParamArray> {
        self.layers.iter()
            .flat_map(|layer| {
                [
                    ParamArray {
                        layer: layer.name.clone(),
                        name: "W".to_string(),
                        shape: vec![layer.weights.rows, layer.weights.cols],
                        values: layer.weights.data.clone(),
                    },
                    ParamArray {
                        layer: layer.name.clone(),
                        name: "b".to_string(),
                        shape: vec![layer.biases.cols],
                        values: layer.biases.data.clone(),
                    },
                ]
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::activation::activation::ActivationFunction;
    use crate::network::spec::LayerSpec;

    fn hyperparams(layers: &[(&str, f64, f64)]) -> Hyperparams {
        let mut hp = Hyperparams::default();
        for (name, lr, p) in layers {
            hp.learning_rates.insert(name.to_string(), *lr);
            hp.penalties.insert(name.to_string(), *p);
        }
        hp
    }

    fn batch(values: Vec<f64>) -> ImageBatch {
        ImageBatch::from_vec(1, 3, 2, 2, values).unwrap()
    }

    #[test]
    fn test_build_requires_hyperparams_for_every_layer() {
        let spec = NetworkSpec {
            name: "mlp".into(),
            layers: vec![
                LayerSpec::new("hidden", 4, 3, ActivationFunction::ReLU),
                LayerSpec::new("output", 3, 4, ActivationFunction::Sigmoid),
            ],
        };
        let partial = hyperparams(&[("hidden", 0.1, 0.0)]);
        assert!(matches!(Network::build(&spec, &partial, 3), Err(SolverError::Config(_))));
        let full = hyperparams(&[("hidden", 0.1, 0.0), ("output", 0.1, 0.0)]);
        assert_eq!(Network::build(&spec, &full, 3).unwrap().parameters().len(), 4);
    }

    #[test]
    fn test_training_reduces_loss() {
        let spec = NetworkSpec {
            name: "linear".into(),
            layers: vec![LayerSpec::new("color", 3, 3, ActivationFunction::Identity)],
        };
        let mut net = Network::build(&spec, &hyperparams(&[("color", 0.5, 0.0)]), 3).unwrap();
        let inputs = batch(vec![0.2, 0.4, 0.6, 0.8, 0.1, 0.3, 0.5, 0.7, 0.9, 0.6, 0.3, 0.0]);
        let targets = batch(vec![0.3, 0.5, 0.7, 0.9, 0.2, 0.2, 0.4, 0.6, 0.8, 0.7, 0.4, 0.1]);

        let first = net.train_step(&inputs, &targets).unwrap();
        let mut last = first.loss;
        for _ in 0..200 {
            last = net.train_step(&inputs, &targets).unwrap().loss;
        }
        assert!(last < first.loss, "loss did not decrease: {} -> {}", first.loss, last);
        assert_eq!(first.prediction.image_shape(), (3, 2, 2));
    }

    #[test]
    fn test_predict_leaves_parameters_untouched() {
        let layers = vec![Layer::identity("color", 3)];
        let net = Network::from_layers("id", layers, LayerwiseSgd::new(vec![0.1], vec![0.0]));
        let before = net.parameters();
        let x = batch(vec![0.5; 12]);
        let out = net.predict(&x, &x).unwrap();
        assert_eq!(out.loss, 0.0);
        assert_eq!(out.prediction, x);
        assert_eq!(net.parameters(), before);
    }

    #[test]
    fn test_error_is_loss_plus_penalty() {
        let layers = vec![Layer::identity("color", 3)];
        let mut net = Network::from_layers("id", layers, LayerwiseSgd::new(vec![0.0], vec![0.5]));
        let x = batch(vec![0.5; 12]);
        let out = net.train_step(&x, &x).unwrap();
        // ‖I₃‖² = 3, penalty 0.5
        assert!((out.regularization - 1.5).abs() < 1e-12);
        assert!((out.error - (out.loss + out.regularization)).abs() < 1e-12);
    }

    #[test]
    fn test_mismatched_target_is_training_error() {
        let layers = vec![Layer::identity("color", 3)];
        let mut net = Network::from_layers("id", layers, LayerwiseSgd::new(vec![0.1], vec![0.0]));
        let x = batch(vec![0.5; 12]);
        let y = ImageBatch::zeros(1, 3, 1, 1);
        assert!(matches!(net.train_step(&x, &y), Err(SolverError::Training(_))));
    }
}
