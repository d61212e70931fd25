//! NEAR RPC Port - Chain Queries and Broadcast for the NEAR Adapter
//!
//! The NEAR adapter owns the transaction state machine; this trait is
//! the narrow set of JSON-RPC calls it needs. The production
//! implementation is `adapters::chain::near_rpc::NearJsonRpc`.

use async_trait::async_trait;

use crate::domain::CurrencyError;

/// Access key state for `(account, public key)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessKeyView {
  /// Last nonce used with this key.
  pub nonce: u64,
  /// Block hash the view was taken at (used as the tx reference block).
  pub block_hash: [u8; 32],
}

/// Execution outcome of a transfer transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NearTxOutcome {
  pub signer_id: String,
  pub receiver_id: String,
  /// Hash of the block the transaction was included in, base58.
  pub block_hash: String,
  /// Attached deposit of the first transfer action, yoctoNEAR.
  pub deposit: u128,
  /// `None` when the first receipt succeeded, the failure otherwise.
  pub failure: Option<String>,
}

/// Block selector.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BlockRef {
  /// Latest final block.
  Final,
  /// Block by base58 hash.
  Hash(String),
}

/// NEAR JSON-RPC operations used by the adapter.
#[async_trait]
pub trait NearRpc: Send + Sync + 'static {
  /// `status` → `sync_info.latest_block_height`.
  async fn latest_height(&self) -> Result<u64, CurrencyError>;

  /// `gas_price` at the latest block, yoctoNEAR per gas unit.
  async fn gas_price(&self) -> Result<u128, CurrencyError>;

  /// `query` / `view_access_key` at final finality.
  async fn view_access_key(
    &self,
    account_id: &str,
    public_key: &str,
  ) -> Result<AccessKeyView, CurrencyError>;

  /// `broadcast_tx_commit`; returns the transaction hash (base58).
  ///
  /// # Errors
  /// `Rejected` for an invalid nonce or signature, an expired block
  /// hash, or a balance that cannot cover the deposit and gas.
  /// `Timeout` or `Rpc` when the outcome is unknown.
  async fn broadcast_tx(&self, signed_tx: &[u8]) -> Result<String, CurrencyError>;

  /// `EXPERIMENTAL_tx_status` for `hash` sent by `sender_id`.
  async fn tx_status(&self, hash: &str, sender_id: &str) -> Result<NearTxOutcome, CurrencyError>;

  /// `block` → `header.height`.
  async fn block_height(&self, block: BlockRef) -> Result<u64, CurrencyError>;
}
