//! USD price resolution for adapters.
//!
//! Adapters carry their price/fee overrides as construction-time
//! strategies; this module turns a strategy into a number, asking the
//! bundler's price endpoint only when the strategy says so.

use std::sync::Arc;

use tracing::debug;

use crate::domain::{CurrencyError, FeeStrategy, PriceStrategy};
use crate::ports::BundlerApi;

/// Resolves price and gas-asset strategies against an optional bundler client.
#[derive(Clone)]
pub struct PriceSource {
    bundler: Option<Arc<dyn BundlerApi>>,
}

impl PriceSource {
    pub fn new(bundler: Option<Arc<dyn BundlerApi>>) -> Self {
        Self { bundler }
    }

    /// USD price of one whole `ticker` under `strategy`.
    pub async fn price(&self, ticker: &str, strategy: &PriceStrategy) -> Result<f64, CurrencyError> {
        match strategy {
            PriceStrategy::Fixed(price) => Ok(*price),
            PriceStrategy::Bundler => self.quote(ticker).await,
        }
    }

    /// USD price of the asset fees are paid in.
    pub async fn gas_asset_price(&self, strategy: &FeeStrategy) -> Result<f64, CurrencyError> {
        match strategy {
            FeeStrategy::Fixed(price) => Ok(*price),
            FeeStrategy::Bundler { gas_ticker } => self.quote(gas_ticker).await,
        }
    }

    async fn quote(&self, ticker: &str) -> Result<f64, CurrencyError> {
        let bundler = self.bundler.as_ref().ok_or_else(|| {
            CurrencyError::Config(format!("no bundler configured to quote {ticker}"))
        })?;
        let usd = bundler.price(ticker).await?;
        debug!(ticker, usd, "Price quoted by bundler");
        Ok(usd)
    }
}

impl std::fmt::Debug for PriceSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PriceSource")
            .field("bundler", &self.bundler.is_some())
            .finish()
    }
}
