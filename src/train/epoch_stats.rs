use serde::{Serialize, Deserialize};

/// Per-epoch training statistics emitted by the solver.
///
/// One value is logged at the end of every completed epoch and, when a
/// `progress_tx` channel is configured in `SolverConfig`, sent on it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EpochStats {
    /// 0-based epoch number, as used in snapshot file names.
    pub epoch: usize,
    /// Total epochs requested for this run.
    pub total_epochs: usize,
    /// Training steps completed in this epoch.
    pub batches: usize,
    /// Mean data loss over the epoch's steps.
    pub train_loss: f64,
    /// Mean regularization penalty over the epoch's steps.
    pub regularization: f64,
    /// Wall-clock duration of this single epoch in milliseconds.
    pub elapsed_ms: u64,
}
