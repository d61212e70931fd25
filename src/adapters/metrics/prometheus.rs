//! Prometheus Metrics Registry - Settlement Observability
//!
//! Counts funding transfers, fee bumps, failed bundler notices and
//! withdrawals, and records how long funding transfers take to reach
//! the confirmation threshold. The registry is rendered in the text
//! exposition format on demand; the CLI dumps it at debug level on exit.

use prometheus::{Encoder, HistogramOpts, HistogramVec, IntCounterVec, Opts, Registry, TextEncoder};

use crate::domain::CurrencyError;

/// Centralized Prometheus metrics for settlement flows.
///
/// All metrics follow the naming convention `bundlr_currency_*` and
/// carry a `currency` label.
pub struct SettlementMetrics {
    registry: Registry,
    /// Funding transfers broadcast.
    pub transfers_submitted: IntCounterVec,
    /// Broadcasts retried with a bumped fee.
    pub fee_bumps: IntCounterVec,
    /// Funding notices the bundler did not accept.
    pub notices_failed: IntCounterVec,
    /// Withdrawal requests by outcome (`accepted`, `rejected`, `error`).
    pub withdrawals: IntCounterVec,
    /// Seconds from broadcast to confirmation.
    pub confirmation_latency_secs: HistogramVec,
}

impl SettlementMetrics {
    /// Create and register all metrics.
    pub fn new() -> Result<Self, CurrencyError> {
        let registry = Registry::new();

        let transfers_submitted = IntCounterVec::new(
            Opts::new(
                "bundlr_currency_transfers_submitted_total",
                "Funding transfers broadcast",
            ),
            &["currency"],
        )
        .map_err(metrics_error)?;

        let fee_bumps = IntCounterVec::new(
            Opts::new(
                "bundlr_currency_fee_bumps_total",
                "Broadcasts retried with a bumped fee",
            ),
            &["currency"],
        )
        .map_err(metrics_error)?;

        let notices_failed = IntCounterVec::new(
            Opts::new(
                "bundlr_currency_funding_notices_failed_total",
                "Funding notices the bundler did not accept",
            ),
            &["currency"],
        )
        .map_err(metrics_error)?;

        let withdrawals = IntCounterVec::new(
            Opts::new("bundlr_currency_withdrawals_total", "Withdrawal requests by outcome"),
            &["currency", "outcome"],
        )
        .map_err(metrics_error)?;

        let confirmation_latency_secs = HistogramVec::new(
            HistogramOpts::new(
                "bundlr_currency_confirmation_latency_seconds",
                "Seconds from broadcast to confirmation",
            )
            .buckets(vec![5.0, 15.0, 30.0, 60.0, 120.0, 300.0, 900.0, 1800.0]),
            &["currency"],
        )
        .map_err(metrics_error)?;

        for collector in [
            Box::new(transfers_submitted.clone()) as Box<dyn prometheus::core::Collector>,
            Box::new(fee_bumps.clone()),
            Box::new(notices_failed.clone()),
            Box::new(withdrawals.clone()),
            Box::new(confirmation_latency_secs.clone()),
        ] {
            registry.register(collector).map_err(metrics_error)?;
        }

        Ok(Self {
            registry,
            transfers_submitted,
            fee_bumps,
            notices_failed,
            withdrawals,
            confirmation_latency_secs,
        })
    }

    /// Render every registered metric in the Prometheus text format.
    pub fn render(&self) -> String {
        let encoder = TextEncoder::new();
        let mut buffer = Vec::new();
        if encoder.encode(&self.registry.gather(), &mut buffer).is_err() {
            return String::new();
        }
        String::from_utf8(buffer).unwrap_or_default()
    }
}

fn metrics_error(err: prometheus::Error) -> CurrencyError {
    CurrencyError::Config(format!("metrics registration failed: {err}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_includes_counters() {
        let metrics = SettlementMetrics::new().unwrap();
        metrics.transfers_submitted.with_label_values(&["matic"]).inc();
        metrics.withdrawals.with_label_values(&["near", "rejected"]).inc();
        let text = metrics.render();
        assert!(text.contains("bundlr_currency_transfers_submitted_total{currency=\"matic\"} 1"));
        assert!(text.contains("outcome=\"rejected\""));
    }
}
