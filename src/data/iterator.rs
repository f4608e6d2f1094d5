use rand::seq::SliceRandom;

use crate::data::pca::{shift_colors, ColorPca};
use crate::data::provider::Sample;
use crate::error::Result;
use crate::math::image_batch::ImageBatch;

/// Paired input and target images for one step.
#[derive(Debug, Clone)]
pub struct Batch {
    pub inputs: ImageBatch,
    pub targets: ImageBatch,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IterOptions {
    pub batch_size: usize,
    pub shuffle: bool,
    pub augment: bool,
}

impl IterOptions {
    /// Shuffled and augmented.
    pub fn training(batch_size: usize) -> Self {
        IterOptions { batch_size, shuffle: true, augment: true }
    }

    /// In order, unaugmented.
    pub fn validation(batch_size: usize) -> Self {
        IterOptions { batch_size, shuffle: false, augment: false }
    }
}

/// Produces batches over a sample collection. Each call starts a fresh pass;
/// batches are assembled lazily as the iterator is advanced.
pub trait SampleIterator {
    fn iterate<'a>(
        &'a self,
        samples: &'a [Sample],
        options: IterOptions,
    ) -> Box<dyn Iterator<Item = Result<Batch>> + 'a>;
}

/// Batch iterator whose augmentation shifts input colours along the
/// principal axes of the fitted colour distribution. Targets are never
/// augmented.
pub struct PcaIterator {
    pca: Option<ColorPca>,
    sigma: f64,
}

impl PcaIterator {
    pub const DEFAULT_SIGMA: f64 = 0.5;

    /// Fits colour statistics on the target images of `samples`.
    pub fn fit<'a>(samples: impl IntoIterator<Item = &'a Sample>) -> Result<Self> {
        let pca = ColorPca::fit(samples.into_iter().map(|s| &s.target))?;
        Ok(PcaIterator { pca: Some(pca), sigma: Self::DEFAULT_SIGMA })
    }

    /// Iterator that never augments.
    pub fn plain() -> Self {
        PcaIterator { pca: None, sigma: 0.0 }
    }

    pub fn with_sigma(mut self, sigma: f64) -> Self {
        self.sigma = sigma;
        self
    }

    fn make_batch(&self, samples: &[Sample], indices: &[usize], augment: bool) -> Result<Batch> {
        let mut rng = rand::thread_rng();
        let inputs: Vec<ImageBatch> = indices.iter()
            .map(|&i| match (&self.pca, augment) {
                (Some(pca), true) => shift_colors(&samples[i].input, &pca.sample_shift(&mut rng, self.sigma)),
                _ => samples[i].input.clone(),
            })
            .collect();
        let inputs = ImageBatch::concat(&inputs.iter().collect::<Vec<_>>())?;
        let targets = ImageBatch::concat(&indices.iter().map(|&i| &samples[i].target).collect::<Vec<_>>())?;
        Ok(Batch { inputs, targets })
    }
}

impl SampleIterator for PcaIterator {
    fn iterate<'a>(
        &'a self,
        samples: &'a [Sample],
        options: IterOptions,
    ) -> Box<dyn Iterator<Item = Result<Batch>> + 'a> {
        let mut order: Vec<usize> = (0..samples.len()).collect();
        if options.shuffle {
            order.shuffle(&mut rand::thread_rng());
        }
        let chunks: Vec<Vec<usize>> = order.chunks(options.batch_size.max(1)).map(|c| c.to_vec()).collect();
        Box::new(
            chunks.into_iter()
                .map(move |chunk| self.make_batch(samples, &chunk, options.augment)),
        )
    }
}
