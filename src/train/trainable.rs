use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::math::image_batch::ImageBatch;

/// Output of one training step.
#[derive(Debug, Clone)]
pub struct StepOutput {
    /// Objective that was minimised (`loss + regularization` for the built-in models).
    pub error: f64,
    /// Data term.
    pub loss: f64,
    /// Penalty term.
    pub regularization: f64,
    pub prediction: ImageBatch,
}

/// Output of one prediction-only pass.
#[derive(Debug, Clone)]
pub struct Prediction {
    pub loss: f64,
    pub prediction: ImageBatch,
}

/// One named parameter tensor, flattened row-major.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParamArray {
    pub layer: String,
    pub name: String,
    pub shape: Vec<usize>,
    pub values: Vec<f64>,
}

/// A model the solver can drive.
///
/// `train_step` is the training function: it updates parameters as a side
/// effect. `predict` is the prediction function and must leave parameters
/// untouched.
pub trait Trainable {
    fn train_step(&mut self, inputs: &ImageBatch, targets: &ImageBatch) -> Result<StepOutput>;

    fn predict(&self, inputs: &ImageBatch, targets: &ImageBatch) -> Result<Prediction>;

    /// `(height, width)` of the prediction for an input of the given size.
    /// Targets are center-cropped to this shape before being handed over.
    fn output_shape(&self, height: usize, width: usize) -> (usize, usize) {
        (height, width)
    }

    /// Every parameter tensor in a stable order, grouped by layer.
    fn parameters(&self) -> Vec<ParamArray>;
}
