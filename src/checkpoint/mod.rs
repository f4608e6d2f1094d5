pub mod checkpoint;
pub mod npy;

pub use checkpoint::Checkpoint;
