use std::sync::mpsc;
use std::sync::{Arc, atomic::AtomicBool};
use std::time::Duration;

use crate::data::dataset_code::{DatasetCode, StainLevel};
use crate::train::epoch_stats::EpochStats;

/// Configuration for a `Solver` run.
///
/// # Fields
/// - `save_batch_freq`: a training snapshot is written every this many batches
/// - `save_time_freq`: or once more than this has passed since the last one;
///   also the validation interval, and a tenth of it is the validation budget
/// - `dataset`: training set selector, also part of the save directory name
/// - `val_keys`: validation sets, concatenated in order
/// - `dir_prefix`: first component of the save directory name
/// - `epochs`: fixed number of passes over the training set
/// - `batch_size`: samples per batch for training and validation
/// - `progress_tx`: optional channel; one `EpochStats` is sent per completed
///   epoch. A dropped receiver is ignored.
/// - `stop_flag`: optional atomic flag; when set the run stops before the
///   next batch and goes straight to the checkpoint write.
#[derive(Debug, Clone)]
pub struct SolverConfig {
    pub save_batch_freq: usize,
    pub save_time_freq: Duration,
    pub dataset: DatasetCode,
    pub val_keys: Vec<DatasetCode>,
    pub dir_prefix: String,
    pub epochs: usize,
    pub batch_size: usize,
    pub progress_tx: Option<mpsc::Sender<EpochStats>>,
    pub stop_flag: Option<Arc<AtomicBool>>,
}

impl SolverConfig {
    pub const DEFAULT_SAVE_BATCH_FREQ: usize = 100;
    pub const DEFAULT_SAVE_TIME_FREQ: Duration = Duration::from_secs(240);
    pub const DEFAULT_EPOCHS: usize = 20;
    pub const DEFAULT_BATCH_SIZE: usize = 64;

    /// `H.E.T-`, `H.E-T.` and `H+E+T.`
    pub fn default_val_keys() -> Vec<DatasetCode> {
        use StainLevel::*;
        vec![
            DatasetCode::new(Neutral, Neutral, Minus),
            DatasetCode::new(Neutral, Minus, Neutral),
            DatasetCode::new(Plus, Plus, Neutral),
        ]
    }

    pub fn with_dataset(mut self, dataset: DatasetCode) -> Self {
        self.dataset = dataset;
        self
    }

    pub fn with_val_keys(mut self, keys: Vec<DatasetCode>) -> Self {
        self.val_keys = keys;
        self
    }

    pub fn with_dir_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.dir_prefix = prefix.into();
        self
    }

    pub fn with_epochs(mut self, epochs: usize) -> Self {
        self.epochs = epochs;
        self
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    pub fn with_save_freq(mut self, batches: usize, time: Duration) -> Self {
        self.save_batch_freq = batches;
        self.save_time_freq = time;
        self
    }

    pub fn with_stop_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.stop_flag = Some(flag);
        self
    }

    pub fn with_progress(mut self, tx: mpsc::Sender<EpochStats>) -> Self {
        self.progress_tx = Some(tx);
        self
    }

    /// Wall-clock budget of one validation pass.
    pub fn validation_budget(&self) -> Duration {
        self.save_time_freq / 10
    }
}

impl Default for SolverConfig {
    fn default() -> Self {
        SolverConfig {
            save_batch_freq: Self::DEFAULT_SAVE_BATCH_FREQ,
            save_time_freq: Self::DEFAULT_SAVE_TIME_FREQ,
            dataset: DatasetCode::default(),
            val_keys: Self::default_val_keys(),
            dir_prefix: "run".to_string(),
            epochs: Self::DEFAULT_EPOCHS,
            batch_size: Self::DEFAULT_BATCH_SIZE,
            progress_tx: None,
            stop_flag: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = SolverConfig::default();
        assert_eq!(config.save_batch_freq, 100);
        assert_eq!(config.save_time_freq, Duration::from_secs(240));
        assert_eq!(config.epochs, 20);
        assert_eq!(config.dataset.to_string(), "H.E.T.");
        assert_eq!(config.dir_prefix, "run");
        let keys: Vec<String> = config.val_keys.iter().map(|k| k.to_string()).collect();
        assert_eq!(keys, vec!["H.E.T-", "H.E-T.", "H+E+T."]);
    }

    #[test]
    fn test_validation_budget_is_a_tenth() {
        let config = SolverConfig::default().with_save_freq(10, Duration::from_secs(240));
        assert_eq!(config.validation_budget(), Duration::from_secs(24));
    }

    #[test]
    fn test_builders_override_defaults() {
        let code: DatasetCode = "H-E+T.".parse().unwrap();
        let config = SolverConfig::default()
            .with_dataset(code)
            .with_val_keys(vec![code])
            .with_dir_prefix("ablation")
            .with_epochs(3)
            .with_batch_size(8);
        assert_eq!(config.dataset, code);
        assert_eq!(config.val_keys, vec![code]);
        assert_eq!(config.dir_prefix, "ablation");
        assert_eq!((config.epochs, config.batch_size), (3, 8));
        assert!(config.stop_flag.is_none() && config.progress_tx.is_none());
    }
}
