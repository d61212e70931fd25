//! Currency Port - Uniform Chain Adapter Contract
//!
//! Every supported network implements [`Currency`]. The registry hands
//! out `Arc<dyn Currency>` and the funding/withdrawal use cases only
//! ever talk to this trait, so chain heterogeneity (nonce schemes,
//! address formats, fee markets) stays inside the adapters.

use alloy::primitives::U256;
use async_trait::async_trait;

use crate::domain::{
  BaseUnit, CurrencyError, CurrencyId, PriceStrategy, SignedTransaction, Tx, TxId,
};

/// Chain adapter: key handling, fees, transaction lifecycle, status.
#[async_trait]
pub trait Currency: Send + Sync + 'static {
  /// Network identifier this adapter was built for.
  fn id(&self) -> CurrencyId;

  /// Display ticker.
  fn ticker(&self) -> &str;

  /// Smallest unit and its exponent.
  fn base(&self) -> BaseUnit;

  /// Blocks past inclusion before a transfer counts as final.
  fn min_confirm(&self) -> u64;

  /// Finality is slow enough that status polling should back off.
  fn is_slow(&self) -> bool;

  /// Effective RPC endpoint (explicit override or network default).
  fn provider_url(&self) -> &str;

  /// How `price()` is resolved.
  fn price_strategy(&self) -> &PriceStrategy;

  /// On-chain address, `None` until resolved by construction or `ready()`.
  fn address(&self) -> Option<String>;

  /// Public key derived from the wallet material.
  fn get_public_key(&self) -> Result<Vec<u8>, CurrencyError>;

  /// Map a public key to the chain's canonical address string.
  fn owner_to_address(&self, owner: &[u8]) -> Result<String, CurrencyError>;

  /// Sign arbitrary bytes with the held key.
  fn sign(&self, data: &[u8]) -> Result<Vec<u8>, CurrencyError>;

  /// Check a signature. Any mismatch or malformed input yields `false`.
  fn verify(&self, public_key: &[u8], data: &[u8], signature: &[u8]) -> bool;

  /// Expected fee, in base units of this currency, for transferring `amount`.
  async fn get_fee(&self, amount: U256, to: Option<&str>) -> Result<U256, CurrencyError>;

  /// Latest height reported by the network.
  async fn get_current_height(&self) -> Result<u64, CurrencyError>;

  /// Build and sign a transfer, reserving a fresh nonce.
  ///
  /// # Errors
  /// `InsufficientAddress` when the sender address is not resolved yet.
  async fn create_tx(
    &self,
    amount: U256,
    to: &str,
    fee: Option<U256>,
  ) -> Result<SignedTransaction, CurrencyError>;

  /// Broadcast a signed transaction, returning the id `get_tx` accepts.
  async fn send_tx(&self, tx: SignedTransaction) -> Result<TxId, CurrencyError>;

  /// Current status of a broadcast transaction.
  ///
  /// # Errors
  /// `TransactionNotFound` (transient) or `TransactionFailed` (terminal).
  async fn get_tx(&self, id: &TxId) -> Result<Tx, CurrencyError>;

  /// One-time asynchronous setup; idempotent.
  async fn ready(&self) -> Result<(), CurrencyError>;

  /// USD price of one whole unit.
  async fn price(&self) -> Result<f64, CurrencyError>;
}
