pub mod sgd;

pub use sgd::LayerwiseSgd;
