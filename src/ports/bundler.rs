//! Bundler Port - Settlement Service Boundary
//!
//! The bundler tracks a per-address balance for each currency, exposes
//! the receiving address users fund, authorizes withdrawals from its
//! reserve and resolves NEAR public keys to named accounts. Only the
//! calls the settlement flow needs are modelled here.

use alloy::primitives::U256;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::domain::{CurrencyError, CurrencyId, TxId};

/// Signed withdrawal request body (`POST /account/withdraw`).
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WithdrawalPayload {
  /// Public key, base64url.
  pub public_key: String,
  /// Currency wire name.
  pub currency: String,
  /// Amount in base units, decimal string.
  pub amount: String,
  /// Bundler-issued withdrawal nonce.
  pub nonce: u64,
  /// Signature over the deep hash of `[currency, amount, nonce]`, base64url.
  pub signature: String,
  /// Signature scheme tag.
  pub sig_type: u16,
}

/// Bundler response to an accepted withdrawal.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct WithdrawalReceipt {
  /// On-chain transaction the bundler broadcast from its reserve.
  pub tx_id: String,
  /// Amount requested, base units.
  #[serde(default)]
  pub requested: Option<String>,
  /// Fee the bundler deducted, base units.
  #[serde(default)]
  pub fee: Option<String>,
  /// Amount that left the reserve after fees, base units.
  #[serde(rename = "final", default)]
  pub final_amount: Option<String>,
}

/// Bundler HTTP boundary.
#[async_trait]
pub trait BundlerApi: Send + Sync + 'static {
  /// Bundler-tracked balance of `address`, base units.
  async fn balance(&self, currency: CurrencyId, address: &str) -> Result<U256, CurrencyError>;

  /// Address the bundler receives funding on for `currency`.
  async fn receiving_address(&self, currency: CurrencyId) -> Result<String, CurrencyError>;

  /// Tell the bundler about a funding transfer so it can credit it.
  async fn notify_funding(&self, currency: CurrencyId, tx_id: &TxId) -> Result<(), CurrencyError>;

  /// Resolve an encoded public key to the account the bundler knows it by.
  ///
  /// `Ok(None)` means the bundler has no mapping for the key.
  async fn lookup_address(
    &self,
    currency: CurrencyId,
    public_key: &str,
  ) -> Result<Option<String>, CurrencyError>;

  /// USD price of one whole unit of `ticker`.
  async fn price(&self, ticker: &str) -> Result<f64, CurrencyError>;

  /// Next withdrawal nonce for `address`.
  async fn withdrawal_nonce(&self, currency: CurrencyId, address: &str)
  -> Result<u64, CurrencyError>;

  /// Submit a signed withdrawal. Never retried by implementations.
  ///
  /// # Errors
  /// `WithdrawalRejected` when the bundler refuses (insufficient balance).
  async fn withdraw(&self, payload: &WithdrawalPayload) -> Result<WithdrawalReceipt, CurrencyError>;
}
