use tracing::warn;

use crate::activation::activation::ActivationFunction;
use crate::network::spec::{LayerSpec, NetworkSpec};

/// A model selectable from the command line by its 1-based position.
pub struct ModelEntry {
    pub name: &'static str,
    pub spec: fn(channels: usize) -> NetworkSpec,
}

/// Registered models, in command-line order (id 1 is the first entry).
pub fn registry() -> Vec<ModelEntry> {
    vec![
        ModelEntry { name: "baseline_linear", spec: baseline_linear },
        ModelEntry { name: "baseline_mlp", spec: baseline_mlp },
    ]
}

/// Single per-pixel colour transform.
fn baseline_linear(channels: usize) -> NetworkSpec {
    NetworkSpec {
        name: "baseline_linear".to_string(),
        layers: vec![LayerSpec::new("color", channels, channels, ActivationFunction::Identity)],
    }
}

/// Per-pixel two-layer perceptron with a sigmoid output in [0, 1].
fn baseline_mlp(channels: usize) -> NetworkSpec {
    NetworkSpec {
        name: "baseline_mlp".to_string(),
        layers: vec![
            LayerSpec::new("hidden", 16, channels, ActivationFunction::ReLU),
            LayerSpec::new("output", channels, 16, ActivationFunction::Sigmoid),
        ],
    }
}

/// Maps 1-based model ids onto registry indices.
///
/// Ids outside `1..=available` are skipped with a warning; the remaining ids
/// keep their order.
pub fn plan_jobs(ids: &[i64], available: usize) -> Vec<usize> {
    ids.iter()
        .filter_map(|&id| {
            let index = id - 1;
            if index < 0 || index as usize >= available {
                warn!(model_id = id, available, "Invalid model id. Skipping");
                None
            } else {
                Some(index as usize)
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_id_is_skipped_not_fatal() {
        assert_eq!(plan_jobs(&[99, 1, 0, 2, -3], 2), vec![0, 1]);
    }

    #[test]
    fn test_registered_specs_are_valid_for_rgb() {
        for entry in registry() {
            let spec = (entry.spec)(3);
            assert_eq!(spec.name, entry.name);
            assert!(spec.validate(3).is_ok(), "{} invalid", entry.name);
        }
    }
}
