use std::any::Any;
use std::error::Error;
use std::panic::{self, AssertUnwindSafe};
use std::path::PathBuf;
use std::rc::Rc;
use std::sync::atomic::Ordering;

use tracing::{error, info, warn};

use crate::checkpoint::Checkpoint;
use crate::data::iterator::{Batch, IterOptions, SampleIterator};
use crate::data::provider::Datasets;
use crate::error::Result;
use crate::math::image_batch::ImageBatch;
use crate::snapshot::composite::{training_snapshot_path, write_composite};
use crate::snapshot::layer_stats::{log_stats, summarize};
use crate::train::cadence::Cadence;
use crate::train::clock::{Clock, SystemClock};
use crate::train::epoch_stats::EpochStats;
use crate::train::metric_trace::MetricTrace;
use crate::train::run::Run;
use crate::train::train_config::SolverConfig;
use crate::train::trainable::Trainable;
use crate::train::validation::{run_validation, ValidationPass};

/// Why the training loop stopped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    /// Every epoch ran.
    Completed,
    /// The stop flag was set.
    Interrupted,
    /// An error or panic escaped the loop body.
    Failed(String),
}

/// What `Solver::run` leaves behind.
#[derive(Debug)]
pub struct RunReport {
    pub outcome: RunOutcome,
    pub trace: MetricTrace,
    /// Path of the written checkpoint, or why it could not be written.
    pub checkpoint: Result<PathBuf>,
}

/// Drives a `Trainable` over the training set, with periodic snapshots,
/// time-boxed validation passes and a final checkpoint.
pub struct Solver {
    config: SolverConfig,
    clock: Rc<dyn Clock>,
}

impl Solver {
    pub fn new(config: SolverConfig) -> Self {
        Solver { config, clock: Rc::new(SystemClock) }
    }

    /// Replaces the wall clock used by both cadences and the validation budget.
    pub fn with_clock(mut self, clock: Rc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Trains until the epochs run out, the stop flag is set, or the loop
    /// body fails, then writes `<save_dir>/<experiment_id>.npz`.
    ///
    /// Never panics and never returns early: every route ends in exactly one
    /// checkpoint write attempt, reported in `RunReport::checkpoint`.
    pub fn run<M: Trainable + ?Sized>(
        &self,
        model: &mut M,
        run: &Run,
        datasets: &Datasets,
        sampler: &dyn SampleIterator,
    ) -> RunReport {
        info!(
            experiment = %run.experiment_id,
            train = datasets.train.len(),
            validation = datasets.validation.len(),
            epochs = self.config.epochs,
            "Start training"
        );

        let mut trace = MetricTrace::new();
        let result = panic::catch_unwind(AssertUnwindSafe(|| {
            self.train_epochs(model, run, datasets, sampler, &mut trace)
        }));
        let outcome = match result {
            Ok(Ok(outcome)) => outcome,
            Ok(Err(e)) => {
                error!(error = ?e, "Unhandled error in training loop");
                RunOutcome::Failed(error_chain(&e))
            }
            Err(payload) => RunOutcome::Failed(format!("panic: {}", panic_message(&*payload))),
        };

        let checkpoint = self.finalize(&*model, run, &outcome, &trace);
        if let Err(e) = &checkpoint {
            error!(error = %e, "Could not save checkpoint");
        }
        RunReport { outcome, trace, checkpoint }
    }

    fn stop_requested(&self) -> bool {
        self.config.stop_flag.as_ref().is_some_and(|flag| flag.load(Ordering::SeqCst))
    }

    fn train_epochs<M: Trainable + ?Sized>(
        &self,
        model: &mut M,
        run: &Run,
        datasets: &Datasets,
        sampler: &dyn SampleIterator,
        trace: &mut MetricTrace,
    ) -> Result<RunOutcome> {
        let cfg = &self.config;
        let start = self.clock.now();
        let mut snapshot = Cadence::new(start, cfg.save_batch_freq, cfg.save_time_freq);
        let mut validation = Cadence::timed(start, cfg.save_time_freq);

        if let Some(sample) = datasets.train.first() {
            let (oh, ow) = model.output_shape(sample.input.height, sample.input.width);
            info!("Setting output size to {}x{}", oh, ow);
        }

        for epoch in 0..cfg.epochs {
            let epoch_start = self.clock.now();
            let first_entry = trace.len();
            let mut batch = 0;
            let mut val_batch = 0;

            let mut batches = sampler.iterate(&datasets.train, IterOptions::training(cfg.batch_size));
            loop {
                if self.stop_requested() {
                    return Ok(RunOutcome::Interrupted);
                }
                let Some(next) = batches.next() else { break };
                let Batch { inputs, targets } = next?;

                let (oh, ow) = model.output_shape(inputs.height, inputs.width);
                let targets = targets.crop(oh, ow);
                let step = model.train_step(&inputs, &targets)?;
                batch += 1;
                trace.record(step.loss, step.regularization);

                let (pmin, pmean, pmax) = step.prediction.value_range();
                info!(
                    "#{}: loss [{:.3}, {:.3}, {:.3}], outp range [{:.3}, {:.3}, {:.3}]",
                    batch, step.error, step.loss, step.regularization, pmin, pmean, pmax
                );

                if snapshot.should_fire(self.clock.now(), batch) {
                    self.write_snapshot(&*model, run, epoch, batch, &inputs.crop(oh, ow), &step.prediction, &targets);
                    snapshot.reset(self.clock.now());
                }

                if validation.should_fire(self.clock.now(), batch) {
                    info!("Start validation run");
                    let pass = ValidationPass {
                        run,
                        epoch,
                        batch_size: cfg.batch_size,
                        budget: cfg.validation_budget(),
                        clock: &*self.clock,
                    };
                    match run_validation(&*model, &datasets.validation, sampler, &pass, &mut val_batch) {
                        Ok(outcome) => info!(
                            batches = outcome.batches,
                            loss = ?outcome.mean_loss,
                            truncated = outcome.budget_exhausted,
                            "Finished validation run"
                        ),
                        Err(e) => error!(error = %e, "Error in validation run. Continue training"),
                    }
                    validation.reset(self.clock.now());
                }
            }

            let (train_loss, regularization) = trace.mean_since(first_entry).unwrap_or((0.0, 0.0));
            let stats = EpochStats {
                epoch,
                total_epochs: cfg.epochs,
                batches: batch,
                train_loss,
                regularization,
                elapsed_ms: self.clock.now().saturating_duration_since(epoch_start).as_millis() as u64,
            };
            info!(
                epoch,
                batches = stats.batches,
                loss = stats.train_loss,
                reg = stats.regularization,
                elapsed_ms = stats.elapsed_ms,
                "Finished epoch {}/{}",
                epoch + 1,
                cfg.epochs
            );
            if let Some(tx) = &cfg.progress_tx {
                // A dropped receiver only loses progress reports.
                let _ = tx.send(stats);
            }
        }

        Ok(RunOutcome::Completed)
    }

    /// Composite image plus parameter dump. Failures are logged only.
    #[allow(clippy::too_many_arguments)]
    fn write_snapshot<M: Trainable + ?Sized>(
        &self,
        model: &M,
        run: &Run,
        epoch: usize,
        batch: usize,
        inputs: &ImageBatch,
        prediction: &ImageBatch,
        targets: &ImageBatch,
    ) {
        let path = training_snapshot_path(&run.save_dir, &run.experiment_id, epoch, batch);
        match write_composite(&path, inputs, prediction, targets) {
            Ok((width, height)) => info!("Saved output image: {}x{} to {}", width, height, path.display()),
            Err(e) => warn!(error = %e, path = %path.display(), "Could not write snapshot"),
        }
        log_stats(&summarize(&model.parameters()));
    }

    fn finalize<M: Trainable + ?Sized>(
        &self,
        model: &M,
        run: &Run,
        outcome: &RunOutcome,
        trace: &MetricTrace,
    ) -> Result<PathBuf> {
        match outcome {
            RunOutcome::Completed => info!(batches = trace.len(), "Done. (Completed)"),
            RunOutcome::Interrupted => info!(batches = trace.len(), "Done. (User Interrupt)"),
            RunOutcome::Failed(msg) => error!(batches = trace.len(), error = %msg, "Done. (Unhandled error)"),
        }

        info!("Saving network");
        let params = panic::catch_unwind(AssertUnwindSafe(|| model.parameters())).unwrap_or_else(|payload| {
            error!(error = %panic_message(&*payload), "Could not read parameters; saving metrics only");
            Vec::new()
        });
        let checkpoint = Checkpoint {
            params,
            losses: trace.losses().to_vec(),
            regularization: trace.regularization().to_vec(),
            model_id: run.model_id,
        };
        let path = Checkpoint::path_for(&run.save_dir, &run.experiment_id);
        checkpoint.write(&path)?;
        info!(path = %path.display(), "Saved weights and loss history");
        Ok(path)
    }
}

/// The error's message followed by every `source()` not already part of it.
pub(crate) fn error_chain(err: &(dyn Error + 'static)) -> String {
    let mut text = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        let msg = cause.to_string();
        if !text.contains(&msg) {
            text.push_str(": ");
            text.push_str(&msg);
        }
        source = cause.source();
    }
    text
}

/// Text of a panic payload, if it carried one.
pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug)]
    struct Wrapped {
        msg: &'static str,
        source: Option<Box<Wrapped>>,
    }

    impl std::fmt::Display for Wrapped {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            f.write_str(self.msg)
        }
    }

    impl Error for Wrapped {
        fn source(&self) -> Option<&(dyn Error + 'static)> {
            self.source.as_deref().map(|e| e as &(dyn Error + 'static))
        }
    }

    #[test]
    fn test_error_chain_keeps_every_cause() {
        let err = Wrapped {
            msg: "batch 3 failed",
            source: Some(Box::new(Wrapped {
                msg: "decoding tile",
                source: Some(Box::new(Wrapped { msg: "unexpected end of file", source: None })),
            })),
        };
        assert_eq!(error_chain(&err), "batch 3 failed: decoding tile: unexpected end of file");
    }

    #[test]
    fn test_error_chain_skips_causes_already_in_message() {
        let err = Wrapped {
            msg: "IO error: disk full",
            source: Some(Box::new(Wrapped { msg: "disk full", source: None })),
        };
        assert_eq!(error_chain(&err), "IO error: disk full");
    }

    #[test]
    fn test_panic_message_extracts_text() {
        let payload = panic::catch_unwind(|| panic!("boom {}", 3)).unwrap_err();
        assert_eq!(panic_message(&*payload), "boom 3");
        let payload = panic::catch_unwind(|| panic!("static")).unwrap_err();
        assert_eq!(panic_message(&*payload), "static");
    }
}
