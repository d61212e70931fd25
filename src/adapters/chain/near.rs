//! NEAR Currency Adapter
//!
//! Implements the `Currency` port for NEAR with ed25519 keys and the
//! `NearRpc` port. NEAR accounts are named, so the adapter cannot know
//! its own address from the key alone: `ready()` asks the bundler which
//! account the public key belongs to and falls back to the implicit
//! (hex) account when the bundler has no mapping.
//!
//! Transaction ids are `sender:hash` because status lookups need both.

use std::sync::{Arc, RwLock};
use std::time::Duration;

use alloy::primitives::U256;
use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use tokio::sync::Mutex;
use tracing::{debug, info, instrument, warn};

use super::near_keys::{NearKey, decode_owner, verify_ed25519};
use super::near_rpc::NearJsonRpc;
use super::near_tx::TransferTx;
use super::pricing::PriceSource;
use super::provider::{LazyProvider, rpc_call};
use crate::domain::{
  BaseUnit, CurrencyConfig, CurrencyError, CurrencyId, NonceTracker, PriceStrategy,
  SignedTransaction, Tx, TxId,
};
use crate::ports::{BlockRef, BundlerApi, Currency, NearRpc};

/// yoctoNEAR, 10^24 per NEAR.
pub const YOCTO_NEAR: BaseUnit = BaseUnit::new("yoctoNEAR", 24);

/// Gas units charged for a single transfer action.
pub const TRANSFER_GAS_UNITS: u128 = 450_000_000_000;

type NearProvider = dyn NearRpc;

fn connect_near(url: &str, timeout: Duration) -> Result<Arc<NearProvider>, CurrencyError> {
  let client = NearJsonRpc::new(url, timeout)?;
  info!(url, timeout_ms = timeout.as_millis() as u64, "NEAR RPC client created");
  Ok(Arc::new(client))
}

/// Adapter for the NEAR protocol.
pub struct NearCurrency {
  config: CurrencyConfig,
  key: Option<NearKey>,
  rpc: LazyProvider<NearProvider>,
  bundler: Arc<dyn BundlerApi>,
  prices: PriceSource,
  address: RwLock<Option<String>>,
  last_ready_error: RwLock<Option<String>>,
  nonces: Mutex<NonceTracker>,
}

impl NearCurrency {
  /// Build the adapter; the RPC client is created on first use.
  pub fn new(config: CurrencyConfig, bundler: Arc<dyn BundlerApi>) -> Self {
    let timeout = config.rpc_timeout;
    let rpc = LazyProvider::new(config.provider_url.clone(), move |url: &str| {
      connect_near(url, timeout)
    });
    Self::build(config, rpc, bundler)
  }

  /// Build the adapter around an existing RPC client.
  pub fn with_rpc(
    config: CurrencyConfig,
    rpc: Arc<dyn NearRpc>,
    bundler: Arc<dyn BundlerApi>,
  ) -> Self {
    let rpc = LazyProvider::with_instance(config.provider_url.clone(), rpc);
    Self::build(config, rpc, bundler)
  }

  fn build(
    config: CurrencyConfig,
    rpc: LazyProvider<NearProvider>,
    bundler: Arc<dyn BundlerApi>,
  ) -> Self {
    let key = match NearKey::from_wallet(config.wallet.expose()) {
      Ok(key) => Some(key),
      Err(e) => {
        warn!(error = %e, "No usable NEAR key; signing disabled");
        None
      }
    };
    let prices = PriceSource::new(Some(Arc::clone(&bundler)));

    Self {
      config,
      key,
      rpc,
      bundler,
      prices,
      address: RwLock::new(None),
      last_ready_error: RwLock::new(None),
      nonces: Mutex::new(NonceTracker::new()),
    }
  }

  /// Error recorded by the most recent `ready()` whose lookup failed.
  pub fn last_ready_error(&self) -> Option<String> {
    read_lock(&self.last_ready_error)
  }

  fn key(&self) -> Result<&NearKey, CurrencyError> {
    self
      .key
      .as_ref()
      .ok_or_else(|| CurrencyError::Signing("NEAR key missing or malformed".to_string()))
  }

  fn require_address(&self) -> Result<String, CurrencyError> {
    self.address().ok_or(CurrencyError::InsufficientAddress)
  }

  fn set_address(&self, address: String) {
    write_lock(&self.address, Some(address));
  }
}

fn read_lock(lock: &RwLock<Option<String>>) -> Option<String> {
  match lock.read() {
    Ok(guard) => guard.clone(),
    Err(poisoned) => poisoned.into_inner().clone(),
  }
}

fn write_lock(lock: &RwLock<Option<String>>, value: Option<String>) {
  match lock.write() {
    Ok(mut guard) => *guard = value,
    Err(poisoned) => *poisoned.into_inner() = value,
  }
}

#[async_trait]
impl Currency for NearCurrency {
  fn id(&self) -> CurrencyId {
    CurrencyId::Near
  }

  fn ticker(&self) -> &str {
    self.config.ticker
  }

  fn base(&self) -> BaseUnit {
    YOCTO_NEAR
  }

  fn min_confirm(&self) -> u64 {
    self.config.min_confirm
  }

  fn is_slow(&self) -> bool {
    self.config.is_slow
  }

  fn provider_url(&self) -> &str {
    &self.config.provider_url
  }

  fn price_strategy(&self) -> &PriceStrategy {
    &self.config.price
  }

  fn address(&self) -> Option<String> {
    read_lock(&self.address)
  }

  fn get_public_key(&self) -> Result<Vec<u8>, CurrencyError> {
    Ok(self.key()?.public_key().to_vec())
  }

  fn owner_to_address(&self, owner: &[u8]) -> Result<String, CurrencyError> {
    decode_owner(owner).map(hex::encode)
  }

  fn sign(&self, data: &[u8]) -> Result<Vec<u8>, CurrencyError> {
    Ok(self.key()?.sign(data).to_vec())
  }

  fn verify(&self, public_key: &[u8], data: &[u8], signature: &[u8]) -> bool {
    verify_ed25519(public_key, data, signature)
  }

  async fn get_fee(&self, _amount: U256, _to: Option<&str>) -> Result<U256, CurrencyError> {
    let rpc = self.rpc.get().await?;
    let gas_price = rpc_call("gas_price", self.config.rpc_timeout, rpc.gas_price()).await?;
    let fee = U256::from(gas_price) * U256::from(TRANSFER_GAS_UNITS);
    debug!(gas_price, fee = %fee, "NEAR transfer fee");
    Ok(fee)
  }

  async fn get_current_height(&self) -> Result<u64, CurrencyError> {
    let rpc = self.rpc.get().await?;
    rpc_call("status", self.config.rpc_timeout, rpc.latest_height()).await
  }

  #[instrument(skip(self, fee), fields(currency = "near"))]
  async fn create_tx(
    &self,
    amount: U256,
    to: &str,
    fee: Option<U256>,
  ) -> Result<SignedTransaction, CurrencyError> {
    let sender = self.require_address()?;
    let key = self.key()?;
    let deposit = u128::try_from(amount)
      .map_err(|_| CurrencyError::InvalidAmount(format!("{amount} exceeds u128 yoctoNEAR")))?;
    if to.trim().is_empty() {
      return Err(CurrencyError::InvalidAddress("empty receiver account".to_string()));
    }
    if let Some(fee) = fee {
      debug!(fee = %fee, "NEAR gas price is protocol-set; requested fee ignored");
    }

    let rpc = self.rpc.get().await?;
    let public_key = key.public_key_string();

    let mut nonces = self.nonces.lock().await;
    let access_key = rpc_call(
      "view_access_key",
      self.config.rpc_timeout,
      rpc.view_access_key(&sender, &public_key),
    )
    .await?;
    let nonce = nonces.reserve(access_key.nonce.saturating_add(1));

    let tx = TransferTx {
      signer_id: sender,
      public_key: key.public_key(),
      nonce,
      receiver_id: to.trim().to_string(),
      block_hash: access_key.block_hash,
      deposit,
    };
    let signature = key.sign(&tx.hash());
    drop(nonces);

    debug!(nonce, receiver = %tx.receiver_id, "NEAR transfer signed");
    Ok(SignedTransaction::new(tx.into_signed_borsh(&signature), None, nonce))
  }

  #[instrument(skip(self, tx), fields(currency = "near", nonce = tx.nonce()))]
  async fn send_tx(&self, tx: SignedTransaction) -> Result<TxId, CurrencyError> {
    let sender = self.require_address()?;
    let rpc = self.rpc.get().await?;
    let nonce = tx.nonce();
    let payload = tx.into_payload();

    match rpc_call("broadcast_tx_commit", self.config.rpc_timeout, rpc.broadcast_tx(&payload)).await {
      Ok(hash) => {
        let id = TxId::new(format!("{sender}:{hash}"));
        info!(tx_id = %id, "NEAR transfer broadcast");
        Ok(id)
      }
      Err(e) => {
        // A generic RPC failure may arrive after the node accepted the
        // transaction, so only an explicit fee refusal frees the nonce.
        if matches!(e, CurrencyError::FeeTooLow(_)) {
          self.nonces.lock().await.release(nonce);
        }
        warn!(error = %e, "NEAR broadcast refused");
        Err(e)
      }
    }
  }

  #[instrument(skip(self), fields(currency = "near"))]
  async fn get_tx(&self, id: &TxId) -> Result<Tx, CurrencyError> {
    let (sender, hash) = id
      .as_str()
      .split_once(':')
      .filter(|(s, h)| !s.is_empty() && !h.is_empty())
      .ok_or_else(|| CurrencyError::InvalidTxId(format!("{id} is not sender:hash")))?;

    let rpc = self.rpc.get().await?;
    let limit = self.config.rpc_timeout;
    let outcome = rpc_call("EXPERIMENTAL_tx_status", limit, rpc.tx_status(hash, sender)).await?;

    if let Some(reason) = outcome.failure {
      return Err(CurrencyError::TransactionFailed {
        id: id.to_string(),
        reason,
      });
    }

    let included = rpc_call("block", limit, rpc.block_height(BlockRef::Hash(outcome.block_hash))).await?;
    let latest = rpc_call("block", limit, rpc.block_height(BlockRef::Final)).await?;

    Ok(Tx::included(
      sender.to_string(),
      outcome.receiver_id,
      U256::from(outcome.deposit),
      included,
      latest,
      self.config.min_confirm,
    ))
  }

  /// Resolve the account behind the key through the bundler.
  ///
  /// A failed lookup is logged and recorded, never returned: the
  /// previously resolved address stays in place.
  #[instrument(skip(self), fields(currency = "near"))]
  async fn ready(&self) -> Result<(), CurrencyError> {
    let key = self.key()?;
    let encoded = URL_SAFE_NO_PAD.encode(key.public_key_base58());

    match self.bundler.lookup_address(CurrencyId::Near, &encoded).await {
      Ok(Some(account)) => {
        info!(account = %account, "NEAR account resolved");
        self.set_address(account);
        write_lock(&self.last_ready_error, None);
      }
      Ok(None) => {
        let implicit = key.implicit_account();
        info!(account = %implicit, "No named account for key, using implicit account");
        self.set_address(implicit);
        write_lock(&self.last_ready_error, None);
      }
      Err(e) => {
        warn!(error = %e, previous = ?self.address(), "NEAR account lookup failed, keeping previous address");
        write_lock(&self.last_ready_error, Some(e.to_string()));
      }
    }
    Ok(())
  }

  async fn price(&self) -> Result<f64, CurrencyError> {
    self.prices.price(self.config.ticker, &self.config.price).await
  }
}
