pub mod cadence;
pub mod clock;
pub mod epoch_stats;
pub mod metric_trace;
pub mod run;
pub mod solver;
pub mod train_config;
pub mod trainable;
pub mod validation;

pub use cadence::Cadence;
pub use clock::{Clock, ManualClock, SystemClock};
pub use epoch_stats::EpochStats;
pub use metric_trace::MetricTrace;
pub use run::{save_dir_name, Run};
pub use solver::{RunOutcome, RunReport, Solver};
pub use train_config::SolverConfig;
pub use trainable::{ParamArray, Prediction, StepOutput, Trainable};
pub use validation::{run_validation, ValidationOutcome, ValidationPass};
