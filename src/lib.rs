pub mod error;
pub mod math;
pub mod activation;
pub mod layers;
pub mod network;
pub mod loss;
pub mod optim;
pub mod data;
pub mod snapshot;
pub mod checkpoint;
pub mod train;

// Convenience re-exports
pub use error::{Result, SolverError};
pub use math::matrix::Matrix;
pub use math::image_batch::ImageBatch;
pub use activation::activation::ActivationFunction;
pub use layers::dense::Layer;
pub use network::network::Network;
pub use loss::mse::MseLoss;
pub use optim::sgd::LayerwiseSgd;
pub use data::{DatasetCode, DatasetProvider, ImageDirProvider, PcaIterator, SampleIterator};
pub use checkpoint::Checkpoint;
pub use train::{Run, RunOutcome, RunReport, Solver, SolverConfig, Trainable};
