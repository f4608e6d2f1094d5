use std::collections::HashMap;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::data::dataset_code::DatasetCode;
use crate::error::{Result, SolverError};
use crate::math::image_batch::ImageBatch;

/// One training pair; `input` and `target` each hold a single image.
#[derive(Debug, Clone, PartialEq)]
pub struct Sample {
    pub input: ImageBatch,
    pub target: ImageBatch,
}

impl Sample {
    /// A sample whose target is the image itself.
    pub fn reconstruction(image: ImageBatch) -> Sample {
        Sample { input: image.clone(), target: image }
    }
}

/// Training and validation collections for one run.
#[derive(Debug, Clone, Default)]
pub struct Datasets {
    pub train: Vec<Sample>,
    pub validation: Vec<Sample>,
}

/// Source of labelled samples keyed by dataset code.
pub trait DatasetProvider {
    fn load(&self, key: &DatasetCode) -> Result<Vec<Sample>>;

    /// Loads the training set and the concatenation of all validation sets.
    fn load_split(&self, train_key: &DatasetCode, val_keys: &[DatasetCode]) -> Result<Datasets> {
        let train = self.load(train_key)?;
        if train.is_empty() {
            return Err(SolverError::dataset(format!("training set {} is empty", train_key)));
        }
        // Validation sets are batched together, so every image must share one shape.
        let mut validation: Vec<Sample> = Vec::new();
        for key in val_keys {
            let samples = self.load(key)?;
            if let (Some(first), Some(next)) = (validation.first(), samples.first()) {
                if first.input.image_shape() != next.input.image_shape() {
                    return Err(SolverError::dataset(format!(
                        "validation set {} has images of shape {:?}, earlier sets have {:?}",
                        key,
                        next.input.image_shape(),
                        first.input.image_shape()
                    )));
                }
            }
            validation.extend(samples);
        }
        Ok(Datasets { train, validation })
    }
}

/// Reads `<root>/<sanitized code>/*.png`, sorted by file name.
pub struct ImageDirProvider {
    root: PathBuf,
}

impl ImageDirProvider {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn load_image(path: &Path) -> Result<ImageBatch> {
        let rgb = image::open(path)?.to_rgb8();
        let (width, height) = (rgb.width() as usize, rgb.height() as usize);
        let plane = width * height;
        let mut data = vec![0.0; 3 * plane];
        for (p, pixel) in rgb.pixels().enumerate() {
            for c in 0..3 {
                data[c * plane + p] = pixel.0[c] as f64 / 255.0;
            }
        }
        ImageBatch::from_vec(1, 3, height, width, data)
    }
}

impl DatasetProvider for ImageDirProvider {
    fn load(&self, key: &DatasetCode) -> Result<Vec<Sample>> {
        let dir = self.root.join(key.sanitized());
        let entries = std::fs::read_dir(&dir).map_err(|e| {
            SolverError::dataset(format!("cannot read dataset directory {}: {}", dir.display(), e))
        })?;

        let mut paths = Vec::new();
        for entry in entries {
            let path = entry?.path();
            let is_png = path.extension()
                .map(|ext| ext.eq_ignore_ascii_case("png"))
                .unwrap_or(false);
            if is_png {
                paths.push(path);
            }
        }
        paths.sort();

        let mut samples: Vec<Sample> = Vec::with_capacity(paths.len());
        for path in &paths {
            let image = Self::load_image(path)?;
            if let Some(first) = samples.first() {
                if first.target.image_shape() != image.image_shape() {
                    return Err(SolverError::dataset(format!(
                        "{} has shape {:?}, expected {:?}",
                        path.display(),
                        image.image_shape(),
                        first.target.image_shape()
                    )));
                }
            }
            samples.push(Sample::reconstruction(image));
        }
        debug!(code = %key, count = samples.len(), "Loaded dataset directory");
        Ok(samples)
    }
}

/// Provider over samples already in memory.
#[derive(Default)]
pub struct InMemoryProvider {
    sets: HashMap<DatasetCode, Vec<Sample>>,
}

impl InMemoryProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_set(mut self, key: DatasetCode, samples: Vec<Sample>) -> Self {
        self.sets.insert(key, samples);
        self
    }
}

impl DatasetProvider for InMemoryProvider {
    fn load(&self, key: &DatasetCode) -> Result<Vec<Sample>> {
        self.sets.get(key)
            .cloned()
            .ok_or_else(|| SolverError::dataset(format!("no dataset registered for {}", key)))
    }
}
