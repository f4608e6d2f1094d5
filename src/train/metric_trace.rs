use serde::{Deserialize, Serialize};

/// Per-batch training metrics, in `train_step` call order.
///
/// Append-only: one entry per completed step, never rewritten.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MetricTrace {
    losses: Vec<f64>,
    regularization: Vec<f64>,
}

impl MetricTrace {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, loss: f64, regularization: f64) {
        self.losses.push(loss);
        self.regularization.push(regularization);
    }

    pub fn len(&self) -> usize {
        self.losses.len()
    }

    pub fn is_empty(&self) -> bool {
        self.losses.is_empty()
    }

    pub fn losses(&self) -> &[f64] {
        &self.losses
    }

    pub fn regularization(&self) -> &[f64] {
        &self.regularization
    }

    /// Mean loss and penalty over entries `from..`; `None` if that range is empty.
    pub fn mean_since(&self, from: usize) -> Option<(f64, f64)> {
        let losses = self.losses.get(from..)?;
        if losses.is_empty() {
            return None;
        }
        let n = losses.len() as f64;
        let regs = &self.regularization[from..];
        Some((losses.iter().sum::<f64>() / n, regs.iter().sum::<f64>() / n))
    }
}
