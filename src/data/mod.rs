pub mod dataset_code;
pub mod iterator;
pub mod pca;
pub mod provider;

pub use dataset_code::{sanitize, DatasetCode, StainLevel};
pub use iterator::{Batch, IterOptions, PcaIterator, SampleIterator};
pub use pca::ColorPca;
pub use provider::{DatasetProvider, Datasets, ImageDirProvider, InMemoryProvider, Sample};
