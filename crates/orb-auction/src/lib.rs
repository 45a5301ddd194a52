mod classifier;
mod metrics;

pub use classifier::{AuctionStateClassifier, AuctionStateThresholds};
pub use metrics::AuctionMetricsBuilder;
