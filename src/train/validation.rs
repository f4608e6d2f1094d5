use std::panic::{self, AssertUnwindSafe};
use std::time::Duration;

use tracing::debug;

use crate::data::iterator::{IterOptions, SampleIterator};
use crate::data::provider::Sample;
use crate::error::{Result, SolverError};
use crate::snapshot::composite::{validation_snapshot_path, write_composite};
use crate::train::clock::Clock;
use crate::train::run::Run;
use crate::train::solver::panic_message;
use crate::train::trainable::Trainable;

/// Summary of one validation pass.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidationOutcome {
    /// Batches predicted and written.
    pub batches: usize,
    /// Mean prediction loss over those batches.
    pub mean_loss: Option<f64>,
    /// Whether the pass stopped on the time budget.
    pub budget_exhausted: bool,
}

/// Where a validation pass writes and how long it may take.
pub struct ValidationPass<'a> {
    pub run: &'a Run,
    pub epoch: usize,
    pub batch_size: usize,
    pub budget: Duration,
    pub clock: &'a dyn Clock,
}

/// Predicts the validation set in order, writing one composite per batch.
///
/// Stops after the first batch that finishes past `pass.budget`, measured from
/// entry. `val_batch` numbers the composites and carries over between passes
/// of the same epoch. Every failure, panics included, comes back as `Err`.
pub fn run_validation<M: Trainable + ?Sized>(
    model: &M,
    samples: &[Sample],
    sampler: &dyn SampleIterator,
    pass: &ValidationPass<'_>,
    val_batch: &mut usize,
) -> Result<ValidationOutcome> {
    panic::catch_unwind(AssertUnwindSafe(|| validate(model, samples, sampler, pass, val_batch)))
        .unwrap_or_else(|payload| {
            Err(SolverError::training(format!("validation panicked: {}", panic_message(&*payload))))
        })
}

fn validate<M: Trainable + ?Sized>(
    model: &M,
    samples: &[Sample],
    sampler: &dyn SampleIterator,
    pass: &ValidationPass<'_>,
    val_batch: &mut usize,
) -> Result<ValidationOutcome> {
    let started = pass.clock.now();
    let mut batches = 0;
    let mut loss_sum = 0.0;

    for next in sampler.iterate(samples, IterOptions::validation(pass.batch_size)) {
        let batch = next?;
        let (oh, ow) = model.output_shape(batch.inputs.height, batch.inputs.width);
        let targets = batch.targets.crop(oh, ow);
        let out = model.predict(&batch.inputs, &targets)?;
        debug!(loss = out.loss, "Validation batch {}", *val_batch);

        let path = validation_snapshot_path(&pass.run.save_dir, &pass.run.experiment_id, pass.epoch, *val_batch);
        write_composite(&path, &batch.inputs.crop(oh, ow), &out.prediction, &targets)?;
        *val_batch += 1;
        batches += 1;
        loss_sum += out.loss;

        if pass.clock.now().saturating_duration_since(started) > pass.budget {
            return Ok(ValidationOutcome {
                batches,
                mean_loss: Some(loss_sum / batches as f64),
                budget_exhausted: true,
            });
        }
    }

    Ok(ValidationOutcome {
        batches,
        mean_loss: (batches > 0).then(|| loss_sum / batches as f64),
        budget_exhausted: false,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::dataset_code::DatasetCode;
    use crate::data::iterator::PcaIterator;
    use crate::math::image_batch::ImageBatch;
    use crate::train::clock::ManualClock;
    use crate::train::trainable::{ParamArray, Prediction, StepOutput};

    /// Echoes its input; every prediction advances the clock by `cost`.
    struct Echo<'a> {
        clock: &'a ManualClock,
        cost: Duration,
        fail_at: Option<usize>,
        calls: std::cell::Cell<usize>,
    }

    impl Trainable for Echo<'_> {
        fn train_step(&mut self, _: &ImageBatch, _: &ImageBatch) -> Result<StepOutput> {
            unreachable!("validation never trains")
        }

        fn predict(&self, inputs: &ImageBatch, _: &ImageBatch) -> Result<Prediction> {
            let call = self.calls.get();
            self.calls.set(call + 1);
            if self.fail_at == Some(call) {
                return Err(SolverError::model("prediction failed"));
            }
            self.clock.advance(self.cost);
            Ok(Prediction { loss: 1.0, prediction: inputs.clone() })
        }

        fn parameters(&self) -> Vec<ParamArray> {
            Vec::new()
        }
    }

    fn samples(n: usize) -> Vec<Sample> {
        (0..n).map(|_| Sample::reconstruction(ImageBatch::zeros(1, 3, 2, 2))).collect()
    }

    fn make_run(dir: &std::path::Path) -> Run {
        Run::create(dir, "run", DatasetCode::default(), "7", 7, 1000).unwrap()
    }

    #[test]
    fn test_budget_stops_long_validation() {
        let tmp = tempfile::tempdir().unwrap();
        let run = make_run(tmp.path());
        let clock = ManualClock::new();
        let model = Echo { clock: &clock, cost: Duration::from_secs(10), fail_at: None, calls: Default::default() };
        let pass = ValidationPass { run: &run, epoch: 0, batch_size: 1, budget: Duration::from_secs(24), clock: &clock };
        let mut val_batch = 0;

        let outcome = run_validation(&model, &samples(1000), &PcaIterator::plain(), &pass, &mut val_batch).unwrap();
        assert_eq!(outcome.batches, 3);
        assert!(outcome.budget_exhausted);
        assert_eq!(val_batch, 3);
        assert!(run.save_dir.join("val_model7_ep0_b2.png").is_file());
        assert!(!run.save_dir.join("val_model7_ep0_b3.png").exists());
    }

    #[test]
    fn test_batch_numbers_continue_across_passes() {
        let tmp = tempfile::tempdir().unwrap();
        let run = make_run(tmp.path());
        let clock = ManualClock::new();
        let model = Echo { clock: &clock, cost: Duration::ZERO, fail_at: None, calls: Default::default() };
        let pass = ValidationPass { run: &run, epoch: 2, batch_size: 2, budget: Duration::from_secs(1), clock: &clock };
        let mut val_batch = 0;

        let first = run_validation(&model, &samples(4), &PcaIterator::plain(), &pass, &mut val_batch).unwrap();
        assert_eq!(first, ValidationOutcome { batches: 2, mean_loss: Some(1.0), budget_exhausted: false });
        run_validation(&model, &samples(4), &PcaIterator::plain(), &pass, &mut val_batch).unwrap();
        assert_eq!(val_batch, 4);
        assert!(run.save_dir.join("val_model7_ep2_b3.png").is_file());
    }

    #[test]
    fn test_prediction_error_is_returned() {
        let tmp = tempfile::tempdir().unwrap();
        let run = make_run(tmp.path());
        let clock = ManualClock::new();
        let model = Echo { clock: &clock, cost: Duration::ZERO, fail_at: Some(1), calls: Default::default() };
        let pass = ValidationPass { run: &run, epoch: 0, batch_size: 1, budget: Duration::from_secs(1), clock: &clock };
        let mut val_batch = 0;

        let result = run_validation(&model, &samples(3), &PcaIterator::plain(), &pass, &mut val_batch);
        assert!(matches!(result, Err(SolverError::Model(_))));
        assert_eq!(val_batch, 1);
    }

    #[test]
    fn test_empty_validation_set() {
        let tmp = tempfile::tempdir().unwrap();
        let run = make_run(tmp.path());
        let clock = ManualClock::new();
        let model = Echo { clock: &clock, cost: Duration::ZERO, fail_at: None, calls: Default::default() };
        let pass = ValidationPass { run: &run, epoch: 0, batch_size: 4, budget: Duration::from_secs(1), clock: &clock };
        let mut val_batch = 0;

        let outcome = run_validation(&model, &[], &PcaIterator::plain(), &pass, &mut val_batch).unwrap();
        assert_eq!(outcome.batches, 0);
        assert_eq!(outcome.mean_loss, None);
    }
}
