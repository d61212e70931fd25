//! Funding Use Case - Transfer Funds to the Bundler
//!
//! Funding flow:
//! 1. Resolve the bundler's receiving address for the network
//! 2. Estimate the fee (optionally scaled by the request multiplier)
//! 3. Create, sign and broadcast one transfer; if the network refuses
//!    it for an insufficient fee, rebuild it once with a bumped fee
//! 4. Tell the bundler about the transfer (best effort)
//! 5. Optionally wait for confirmation
//!
//! The receipt proves submission, not credit: the bundler credits the
//! balance on its own schedule once it sees the transfer confirmed.
//! Once a transfer is broadcast, `fund` always returns a receipt so the
//! caller keeps the transaction id whatever happens during the wait.

use std::sync::Arc;

use alloy::primitives::U256;
use tokio::sync::broadcast;
use tracing::{info, instrument, warn};

use super::confirmation::{ConfirmationTracker, PollConfig};
use crate::adapters::metrics::SettlementMetrics;
use crate::domain::units::apply_multiplier;
use crate::domain::{CurrencyError, Tx, TxId};
use crate::ports::{BundlerApi, Currency};

/// Funding behaviour.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FundingConfig {
  /// Applied to the previous fee when the network refuses it as too low.
  pub fee_bump_multiplier: f64,
  /// Wait for confirmation before returning.
  pub await_confirmation: bool,
  pub poll: PollConfig,
}

impl Default for FundingConfig {
  fn default() -> Self {
    Self {
      fee_bump_multiplier: 1.5,
      await_confirmation: true,
      poll: PollConfig::default(),
    }
  }
}

/// Amount to move to the bundler.
#[derive(Debug, Clone, PartialEq)]
pub struct FundingRequest {
  /// Base units.
  pub amount: U256,
  /// Scales the initial fee estimate.
  pub fee_multiplier: Option<f64>,
}

impl FundingRequest {
  pub fn new(amount: U256) -> Self {
    Self {
      amount,
      fee_multiplier: None,
    }
  }

  pub fn with_fee_multiplier(mut self, multiplier: f64) -> Self {
    self.fee_multiplier = Some(multiplier);
    self
  }
}

/// Where the transfer stood when `fund` returned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FundingStatus {
  Confirmed(Tx),
  /// Broadcast; confirmation was not awaited or the wait was cancelled.
  Submitted,
  /// Broadcast; not confirmed within the configured wait.
  TimedOut,
  /// Broadcast, then failed on-chain.
  Failed(String),
  /// Broadcast; the wait stopped on an unrecoverable status error.
  Unconfirmed(String),
}

/// Proof of submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FundingReceipt {
  pub id: TxId,
  /// Bundler receiving address.
  pub target: String,
  /// Amount transferred, base units.
  pub quantity: U256,
  /// Fee the broadcast transaction was built with, base units.
  pub fee: U256,
  /// Whether the bundler accepted the funding notice.
  pub bundler_notified: bool,
  /// Whether the first fee was refused and the transfer rebuilt.
  pub fee_bumped: bool,
  pub status: FundingStatus,
}

/// Coordinates funding transfers for one adapter.
pub struct FundingCoordinator<C: ?Sized + Currency, B: ?Sized + BundlerApi> {
  currency: Arc<C>,
  bundler: Arc<B>,
  tracker: ConfirmationTracker<C>,
  config: FundingConfig,
  metrics: Option<Arc<SettlementMetrics>>,
}

impl<C: ?Sized + Currency, B: ?Sized + BundlerApi> FundingCoordinator<C, B> {
  pub fn new(currency: Arc<C>, bundler: Arc<B>, config: FundingConfig) -> Self {
    let tracker = ConfirmationTracker::new(Arc::clone(&currency), config.poll);
    Self {
      currency,
      bundler,
      tracker,
      config,
      metrics: None,
    }
  }

  pub fn with_metrics(mut self, metrics: Arc<SettlementMetrics>) -> Self {
    self.metrics = Some(metrics);
    self
  }

  /// Bundler-tracked balance of this adapter's address, base units.
  pub async fn balance(&self) -> Result<U256, CurrencyError> {
    let address = self.currency.address().ok_or(CurrencyError::InsufficientAddress)?;
    self.bundler.balance(self.currency.id(), &address).await
  }

  /// Send `request.amount` to the bundler.
  ///
  /// Exactly one transfer reaches the network per successful call.
  #[instrument(skip(self, shutdown), fields(currency = %self.currency.id(), amount = %request.amount))]
  pub async fn fund(
    &self,
    request: FundingRequest,
    shutdown: &mut broadcast::Receiver<()>,
  ) -> Result<FundingReceipt, CurrencyError> {
    if request.amount.is_zero() {
      return Err(CurrencyError::InvalidAmount("funding amount must be positive".to_string()));
    }
    let currency_id = self.currency.id();
    let label = currency_id.as_str();

    let target = self.bundler.receiving_address(currency_id).await?;
    let estimate = self.currency.get_fee(request.amount, Some(&target)).await?;
    let fee = match request.fee_multiplier {
      Some(multiplier) => apply_multiplier(estimate, multiplier)?,
      None => estimate,
    };

    let (id, fee, fee_bumped) = match self.submit(request.amount, &target, fee).await {
      Ok(id) => (id, fee, false),
      Err(CurrencyError::FeeTooLow(reason)) => {
        let bumped = apply_multiplier(fee, self.config.fee_bump_multiplier)?;
        warn!(%reason, fee = %fee, bumped = %bumped, "Fee refused, retrying once with bumped fee");
        if let Some(m) = &self.metrics {
          m.fee_bumps.with_label_values(&[label]).inc();
        }
        let id = self.submit(request.amount, &target, bumped).await?;
        (id, bumped, true)
      }
      Err(e) => return Err(e),
    };

    if let Some(m) = &self.metrics {
      m.transfers_submitted.with_label_values(&[label]).inc();
    }
    info!(tx_id = %id, target = %target, fee = %fee, "Funding transfer submitted");

    let bundler_notified = match self.bundler.notify_funding(currency_id, &id).await {
      Ok(()) => true,
      Err(e) => {
        warn!(error = %e, tx_id = %id, "Bundler funding notice failed; it will credit on its own scan");
        if let Some(m) = &self.metrics {
          m.notices_failed.with_label_values(&[label]).inc();
        }
        false
      }
    };

    let status = if self.config.await_confirmation {
      self.await_confirmation(&id, shutdown).await
    } else {
      FundingStatus::Submitted
    };

    Ok(FundingReceipt {
      id,
      target,
      quantity: request.amount,
      fee,
      bundler_notified,
      fee_bumped,
      status,
    })
  }

  async fn submit(&self, amount: U256, target: &str, fee: U256) -> Result<TxId, CurrencyError> {
    let tx = self.currency.create_tx(amount, target, Some(fee)).await?;
    self.currency.send_tx(tx).await
  }

  async fn await_confirmation(
    &self,
    id: &TxId,
    shutdown: &mut broadcast::Receiver<()>,
  ) -> FundingStatus {
    let started = std::time::Instant::now();
    match self.tracker.wait(id, shutdown).await {
      Ok(tx) => {
        if let Some(m) = &self.metrics {
          m.confirmation_latency_secs
            .with_label_values(&[self.currency.id().as_str()])
            .observe(started.elapsed().as_secs_f64());
        }
        FundingStatus::Confirmed(tx)
      }
      Err(CurrencyError::Timeout {
        operation: "confirmation",
        elapsed,
      }) => {
        warn!(tx_id = %id, elapsed_secs = elapsed.as_secs(), "Funding transfer not confirmed in time");
        FundingStatus::TimedOut
      }
      Err(CurrencyError::Cancelled) => {
        info!(tx_id = %id, "Confirmation wait cancelled; transfer remains submitted");
        FundingStatus::Submitted
      }
      Err(CurrencyError::TransactionFailed { reason, .. }) => {
        warn!(tx_id = %id, %reason, "Funding transfer failed on-chain");
        FundingStatus::Failed(reason)
      }
      Err(e) => {
        warn!(tx_id = %id, error = %e, "Confirmation wait aborted; transfer was broadcast");
        FundingStatus::Unconfirmed(e.to_string())
      }
    }
  }
}
