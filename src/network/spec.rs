use serde::{Serialize, Deserialize};
use crate::activation::activation::ActivationFunction;
use crate::error::{Result, SolverError};

/// Describes one per-pixel layer in a network specification.
///
/// Fields:
/// - `name`      : key into the hyperparameter maps
/// - `size`      : output channels
/// - `input_size`: input channels (the previous layer's `size`, or the
///                  image channel count for the first layer)
/// - `activation`: activation function applied after the linear transform
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayerSpec {
    pub name: String,
    pub size: usize,
    pub input_size: usize,
    pub activation: ActivationFunction,
}

impl LayerSpec {
    pub fn new(name: &str, size: usize, input_size: usize, activation: ActivationFunction) -> LayerSpec {
        LayerSpec { name: name.to_string(), size, input_size, activation }
    }
}

/// Architecture of a registered model, independent of its trained weights.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NetworkSpec {
    pub name: String,
    /// Ordered list of layer descriptions (input → output).
    pub layers: Vec<LayerSpec>,
}

impl NetworkSpec {
    /// Checks that layers chain and that the network maps `channels` to `channels`.
    pub fn validate(&self, channels: usize) -> Result<()> {
        let first = self.layers.first()
            .ok_or_else(|| SolverError::model(format!("network '{}' has no layers", self.name)))?;
        if first.input_size != channels {
            return Err(SolverError::model(format!(
                "network '{}' expects {} input channels, images have {}",
                self.name, first.input_size, channels
            )));
        }
        for pair in self.layers.windows(2) {
            if pair[0].size != pair[1].input_size {
                return Err(SolverError::model(format!(
                    "layer '{}' outputs {} channels but '{}' expects {}",
                    pair[0].name, pair[0].size, pair[1].name, pair[1].input_size
                )));
            }
        }
        let last = &self.layers[self.layers.len() - 1];
        if last.size != channels {
            return Err(SolverError::model(format!(
                "network '{}' outputs {} channels, images have {}",
                self.name, last.size, channels
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_catches_broken_chain() {
        let spec = NetworkSpec {
            name: "broken".into(),
            layers: vec![
                LayerSpec::new("hidden", 8, 3, ActivationFunction::ReLU),
                LayerSpec::new("output", 3, 4, ActivationFunction::Sigmoid),
            ],
        };
        assert!(matches!(spec.validate(3), Err(SolverError::Model(_))));
    }

    #[test]
    fn test_validate_accepts_rgb_to_rgb() {
        let spec = NetworkSpec {
            name: "ok".into(),
            layers: vec![
                LayerSpec::new("hidden", 8, 3, ActivationFunction::ReLU),
                LayerSpec::new("output", 3, 8, ActivationFunction::Sigmoid),
            ],
        };
        assert!(spec.validate(3).is_ok());
        assert!(spec.validate(1).is_err());
    }
}
