use serde::{Deserialize, Serialize};
use tracing::info;

use crate::train::trainable::ParamArray;

/// Summary statistics of one parameter tensor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayerStat {
    pub layer: String,
    pub param: String,
    pub shape: Vec<usize>,
    pub min: f64,
    pub mean: f64,
    pub max: f64,
    pub sum_sq: f64,
}

/// One `LayerStat` per parameter tensor, in parameter order.
/// Empty tensors report zeros.
pub fn summarize(params: &[ParamArray]) -> Vec<LayerStat> {
    params.iter()
        .map(|p| {
            let (min, max, sum, sum_sq) = p.values.iter().fold(
                (f64::INFINITY, f64::NEG_INFINITY, 0.0, 0.0),
                |(lo, hi, s, sq), &v| (lo.min(v), hi.max(v), s + v, sq + v * v),
            );
            let (min, mean, max) = if p.values.is_empty() {
                (0.0, 0.0, 0.0)
            } else {
                (min, sum / p.values.len() as f64, max)
            };
            LayerStat {
                layer: p.layer.clone(),
                param: p.name.clone(),
                shape: p.shape.clone(),
                min,
                mean,
                max,
                sum_sq,
            }
        })
        .collect()
}

/// Writes the parameter dump to the log, one line per tensor.
pub fn log_stats(stats: &[LayerStat]) {
    info!("Network dump");
    for s in stats {
        info!(
            "{:<20}{:<10}{:?} {:.2} {:.2} {:.2} {:.2}",
            s.layer, s.param, s.shape, s.min, s.mean, s.max, s.sum_sq
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn param(layer: &str, name: &str, values: Vec<f64>) -> ParamArray {
        ParamArray { layer: layer.into(), name: name.into(), shape: vec![values.len()], values }
    }

    #[test]
    fn test_summarize_keeps_order_and_computes_stats() {
        let stats = summarize(&[
            param("color", "W", vec![-1.0, 2.0, 5.0]),
            param("color", "b", vec![0.5]),
        ]);
        assert_eq!(stats.len(), 2);
        assert_eq!(stats[0].param, "W");
        assert_eq!((stats[0].min, stats[0].mean, stats[0].max, stats[0].sum_sq), (-1.0, 2.0, 5.0, 30.0));
        assert_eq!(stats[1].sum_sq, 0.25);
    }

    #[test]
    fn test_empty_tensor_reports_zeros() {
        let stats = summarize(&[param("x", "W", vec![])]);
        assert_eq!((stats[0].min, stats[0].mean, stats[0].max), (0.0, 0.0, 0.0));
    }
}
