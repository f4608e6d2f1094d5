use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Result, SolverError};

/// Per-layer training hyperparameters, read from `hyperparams.json`.
///
/// ```json
/// {
///   "learning_rates": { "color": 0.05 },
///   "penalties":      { "color": 0.0001 }
/// }
/// ```
///
/// Extra top-level keys are ignored so one file can serve several tools.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Hyperparams {
    pub learning_rates: BTreeMap<String, f64>,
    pub penalties: BTreeMap<String, f64>,
}

impl Hyperparams {
    /// Deserializes hyperparameters from a JSON file.
    pub fn load_json(path: impl AsRef<Path>) -> Result<Hyperparams> {
        let path = path.as_ref();
        let file = std::fs::File::open(path).map_err(|e| {
            SolverError::config(format!("cannot open hyperparameter file {}: {}", path.display(), e))
        })?;
        let reader = std::io::BufReader::new(file);
        Ok(serde_json::from_reader(reader)?)
    }

    /// Learning rate and L2 penalty for `layer`; both must be present.
    pub fn for_layer(&self, layer: &str) -> Result<(f64, f64)> {
        let lr = self.learning_rates.get(layer).copied().ok_or_else(|| {
            SolverError::config(format!("no learning rate configured for layer '{}'", layer))
        })?;
        let penalty = self.penalties.get(layer).copied().ok_or_else(|| {
            SolverError::config(format!("no penalty configured for layer '{}'", layer))
        })?;
        if !lr.is_finite() || lr < 0.0 || !penalty.is_finite() || penalty < 0.0 {
            return Err(SolverError::config(format!(
                "layer '{}' has invalid hyperparameters (lr={}, penalty={})",
                layer, lr, penalty
            )));
        }
        Ok((lr, penalty))
    }
}
