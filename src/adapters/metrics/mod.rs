//! Metrics Adapters
//!
//! Prometheus counters and histograms for the settlement flows,
//! rendered in the text exposition format.

pub mod prometheus;

pub use self::prometheus::SettlementMetrics;
