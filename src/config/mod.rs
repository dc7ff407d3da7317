pub mod aggregator;

pub use aggregator::AggregatorConfig;
