//! Withdrawal Use Case - Reclaim Bundler Balance
//!
//! The bundler executes withdrawals from its own reserve; this side
//! only authorizes them. The request is signed with the adapter key
//! over the deep hash of `[currency, amount, nonce]`, where the nonce
//! comes from the bundler and makes every authorization single-use.
//! No on-chain transaction is built or signed here.

use std::sync::Arc;

use alloy::primitives::U256;
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use tracing::{info, instrument, warn};

use crate::adapters::metrics::SettlementMetrics;
use crate::domain::{CurrencyError, DeepHashItem, deep_hash};
use crate::ports::{BundlerApi, Currency, WithdrawalPayload, WithdrawalReceipt};

/// Amount to pull back from the bundler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WithdrawalRequest {
  /// Base units.
  pub amount: U256,
  /// Must be the adapter's own address.
  pub destination: String,
}

/// Authorizes withdrawals for one adapter.
pub struct WithdrawalCoordinator<C: ?Sized + Currency, B: ?Sized + BundlerApi> {
  currency: Arc<C>,
  bundler: Arc<B>,
  metrics: Option<Arc<SettlementMetrics>>,
}

impl<C: ?Sized + Currency, B: ?Sized + BundlerApi> WithdrawalCoordinator<C, B> {
  pub fn new(currency: Arc<C>, bundler: Arc<B>) -> Self {
    Self {
      currency,
      bundler,
      metrics: None,
    }
  }

  pub fn with_metrics(mut self, metrics: Arc<SettlementMetrics>) -> Self {
    self.metrics = Some(metrics);
    self
  }

  /// Validate, sign and submit a withdrawal request.
  ///
  /// # Errors
  /// `WithdrawalRejected` when the bundler refuses the request.
  #[instrument(skip(self), fields(currency = %self.currency.id(), amount = %request.amount))]
  pub async fn withdraw(
    &self,
    request: WithdrawalRequest,
  ) -> Result<WithdrawalReceipt, CurrencyError> {
    let address = self.currency.address().ok_or(CurrencyError::InsufficientAddress)?;
    if request.amount.is_zero() {
      return Err(CurrencyError::InvalidAmount("withdrawal amount must be positive".to_string()));
    }
    if !request.destination.eq_ignore_ascii_case(&address) {
      return Err(CurrencyError::InvalidAddress(format!(
        "withdrawals go to the adapter's own address {address}, not {}",
        request.destination
      )));
    }

    let currency_id = self.currency.id();
    let nonce = self.bundler.withdrawal_nonce(currency_id, &address).await?;
    let payload = self.authorize(request.amount, nonce)?;

    let result = self.bundler.withdraw(&payload).await;
    let outcome = match &result {
      Ok(_) => "accepted",
      Err(CurrencyError::WithdrawalRejected(_)) => "rejected",
      Err(_) => "error",
    };
    if let Some(m) = &self.metrics {
      m.withdrawals.with_label_values(&[currency_id.as_str(), outcome]).inc();
    }

    match &result {
      Ok(receipt) => info!(tx_id = %receipt.tx_id, nonce, "Withdrawal accepted"),
      Err(e) => warn!(error = %e, nonce, "Withdrawal not accepted"),
    }
    result
  }

  /// Signed request body for `amount` at `nonce`.
  pub fn authorize(&self, amount: U256, nonce: u64) -> Result<WithdrawalPayload, CurrencyError> {
    let currency_id = self.currency.id();
    let digest = withdrawal_digest(currency_id.as_str(), amount, nonce);
    let signature = self.currency.sign(&digest)?;
    let public_key = self.currency.get_public_key()?;

    Ok(WithdrawalPayload {
      public_key: URL_SAFE_NO_PAD.encode(public_key),
      currency: currency_id.as_str().to_string(),
      amount: amount.to_string(),
      nonce,
      signature: URL_SAFE_NO_PAD.encode(signature),
      sig_type: currency_id.signature_type(),
    })
  }
}

/// Deep hash of `[currency, amount, nonce]` as decimal strings.
pub fn withdrawal_digest(currency: &str, amount: U256, nonce: u64) -> [u8; 48] {
  deep_hash(&DeepHashItem::List(vec![
    DeepHashItem::from(currency),
    DeepHashItem::blob(amount.to_string()),
    DeepHashItem::blob(nonce.to_string()),
  ]))
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_digest_binds_every_field() {
    let base = withdrawal_digest("matic", U256::from(100u64), 1);
    assert_ne!(base, withdrawal_digest("near", U256::from(100u64), 1));
    assert_ne!(base, withdrawal_digest("matic", U256::from(101u64), 1));
    assert_ne!(base, withdrawal_digest("matic", U256::from(100u64), 2));
    assert_eq!(base, withdrawal_digest("matic", U256::from(100u64), 1));
  }
}
