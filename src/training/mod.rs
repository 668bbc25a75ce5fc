pub mod dataset;
pub mod metrics;
pub mod trainer;

pub use dataset::SyntheticKeypoints;
pub use metrics::{EpochMetrics, MetricsLogger};
pub use trainer::{FitSummary, StartState, Trainer, FINAL_STATE_FILENAME};
