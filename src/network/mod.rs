pub mod hyperparams;
pub mod network;
pub mod registry;
pub mod spec;

pub use hyperparams::Hyperparams;
pub use network::Network;
pub use registry::{plan_jobs, registry, ModelEntry};
pub use spec::{NetworkSpec, LayerSpec};
