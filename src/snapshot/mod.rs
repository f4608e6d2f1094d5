pub mod composite;
pub mod layer_stats;

pub use composite::{composite, panelize, write_composite, Panel};
pub use layer_stats::{log_stats, summarize, LayerStat};
