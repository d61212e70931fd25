//! EVM Currency Adapter - Native Coins and ERC-20 Tokens
//!
//! Implements the `Currency` port for every Ethereum-family network via
//! alloy-rs 0.9. One type serves both families: with a token contract
//! configured, transfers become `transfer(address,uint256)` calls and
//! fees are re-expressed in token base units.
//!
//! Transactions are legacy (type 0) with EIP-155 replay protection, so
//! a single gas price is the whole fee and a fee bump is a gas price
//! bump. The nonce critical section covers reading the pending account
//! nonce and signing; `send_tx` gives the nonce back when the node
//! refuses the broadcast for its fee.

use std::str::FromStr;
use std::sync::Arc;

use alloy::consensus::{SignableTransaction, Transaction as _, TxEnvelope, TxLegacy};
use alloy::eips::eip2718::Encodable2718;
use alloy::network::TxSignerSync;
use alloy::primitives::{Address, B256, Bytes, PrimitiveSignature, TxKind, U256};
use alloy::providers::Provider;
use alloy::rpc::types::TransactionRequest;
use alloy::signers::SignerSync;
use alloy::signers::local::PrivateKeySigner;
use alloy::transports::TransportError;
use async_trait::async_trait;
use k256::ecdsa::VerifyingKey;
use tokio::sync::{Mutex, OnceCell};
use tracing::{debug, info, instrument, warn};

use super::erc20::{decode_transfer, encode_transfer};
use super::gas::{GasOracle, NATIVE_TRANSFER_GAS, TOKEN_TRANSFER_GAS, gas_price_for_fee, token_fee};
use super::pricing::PriceSource;
use super::provider::{EvmProvider, LazyProvider, connect_evm, rpc_call};
use crate::domain::{
  BaseUnit, CurrencyConfig, CurrencyError, CurrencyId, NonceTracker, PriceStrategy,
  SignedTransaction, Tx, TxId,
};
use crate::ports::Currency;

/// Base unit of every EVM network and of the supported tokens.
pub const WEI: BaseUnit = BaseUnit::new("wei", 18);

/// Adapter for an EVM network, optionally bound to an ERC-20 contract.
pub struct EvmCurrency {
  config: CurrencyConfig,
  signer: Option<PrivateKeySigner>,
  provider: Arc<LazyProvider<EvmProvider>>,
  gas: GasOracle,
  chain_id: OnceCell<u64>,
  nonces: Mutex<NonceTracker>,
  /// ERC-20 contract; `None` for the network's native coin.
  token: Option<Address>,
  prices: PriceSource,
}

impl EvmCurrency {
  /// Build the adapter. Parses key and contract; performs no network I/O.
  pub fn new(config: CurrencyConfig, prices: PriceSource) -> Result<Self, CurrencyError> {
    let provider = Arc::new(LazyProvider::new(config.provider_url.clone(), connect_evm));
    Self::with_provider(config, provider, prices)
  }

  /// Build the adapter around an existing provider handle.
  pub fn with_provider(
    config: CurrencyConfig,
    provider: Arc<LazyProvider<EvmProvider>>,
    prices: PriceSource,
  ) -> Result<Self, CurrencyError> {
    let token = config
      .contract_address
      .as_deref()
      .map(|addr| {
        Address::from_str(addr).map_err(|e| CurrencyError::InvalidAddress(format!("{addr}: {e}")))
      })
      .transpose()?;

    let signer = parse_signer(config.wallet.expose());
    if signer.is_none() {
      warn!(currency = %config.id, "No usable wallet key; signing disabled");
    }

    let gas = GasOracle::new(Arc::clone(&provider), config.rpc_timeout);

    Ok(Self {
      config,
      signer,
      provider,
      gas,
      chain_id: OnceCell::new(),
      nonces: Mutex::new(NonceTracker::new()),
      token,
      prices,
    })
  }

  fn signer(&self) -> Result<&PrivateKeySigner, CurrencyError> {
    self
      .signer
      .as_ref()
      .ok_or_else(|| CurrencyError::Signing("wallet key missing or malformed".to_string()))
  }

  fn sender(&self) -> Result<Address, CurrencyError> {
    self
      .signer
      .as_ref()
      .map(|s| s.address())
      .ok_or(CurrencyError::InsufficientAddress)
  }

  async fn chain_id(&self, provider: &EvmProvider) -> Result<u64, CurrencyError> {
    self
      .chain_id
      .get_or_try_init(|| {
        rpc_call("eth_chainId", self.config.rpc_timeout, async {
          provider.get_chain_id().await.map_err(map_rpc_error)
        })
      })
      .await
      .copied()
  }

  /// Gas limit of a transfer: fixed for native coins, estimated for tokens.
  async fn transfer_gas(
    &self,
    provider: &EvmProvider,
    from: Option<Address>,
    to: Option<Address>,
    amount: U256,
  ) -> Result<u64, CurrencyError> {
    let (Some(contract), Some(from), Some(to)) = (self.token, from, to) else {
      return Ok(if self.token.is_some() { TOKEN_TRANSFER_GAS } else { NATIVE_TRANSFER_GAS });
    };

    let request = TransactionRequest::default()
      .from(from)
      .to(contract)
      .input(encode_transfer(to, amount).into());
    let estimate = rpc_call("eth_estimateGas", self.config.rpc_timeout, async {
      provider.estimate_gas(&request).await.map_err(map_rpc_error)
    })
    .await;

    match estimate {
      Ok(gas) => Ok(gas),
      Err(e) => {
        debug!(error = %e, "Token gas estimate failed, using default budget");
        Ok(TOKEN_TRANSFER_GAS)
      }
    }
  }

  /// Convert a wei fee into token base units using the configured strategies.
  async fn wei_to_token(&self, fee_wei: U256) -> Result<U256, CurrencyError> {
    let gas_usd = self.prices.gas_asset_price(&self.config.fee).await?;
    let token_usd = self.prices.price(self.config.ticker, &self.config.price).await?;
    token_fee(fee_wei, gas_usd, token_usd, WEI.decimals)
  }

  /// Gas price to sign with, honouring a caller-supplied total fee.
  async fn gas_price_for(&self, fee: Option<U256>, gas_limit: u64) -> Result<U256, CurrencyError> {
    let network = self.gas.gas_price().await?;
    let Some(fee) = fee else {
      return Ok(network);
    };

    if self.token.is_none() {
      return Ok(gas_price_for_fee(fee, gas_limit));
    }

    // Token fees are quoted in token units: scale the network price by
    // how far the requested fee is from the current estimate.
    let estimated = self.wei_to_token(network * U256::from(gas_limit)).await?;
    if estimated.is_zero() {
      return Ok(network);
    }
    Ok((network * fee / estimated).max(U256::from(1u64)))
  }
}

#[async_trait]
impl Currency for EvmCurrency {
  fn id(&self) -> CurrencyId {
    self.config.id
  }

  fn ticker(&self) -> &str {
    self.config.ticker
  }

  fn base(&self) -> BaseUnit {
    WEI
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
    self.signer.as_ref().map(|s| s.address().to_checksum(None))
  }

  fn get_public_key(&self) -> Result<Vec<u8>, CurrencyError> {
    let signer = self.signer()?;
    let point = signer.credential().verifying_key().to_encoded_point(false);
    Ok(point.as_bytes().to_vec())
  }

  fn owner_to_address(&self, owner: &[u8]) -> Result<String, CurrencyError> {
    owner_to_evm_address(owner).map(|a| a.to_checksum(None))
  }

  fn sign(&self, data: &[u8]) -> Result<Vec<u8>, CurrencyError> {
    let sig = self
      .signer()?
      .sign_message_sync(data)
      .map_err(|e| CurrencyError::Signing(e.to_string()))?;
    Ok(sig.as_bytes().to_vec())
  }

  fn verify(&self, public_key: &[u8], data: &[u8], signature: &[u8]) -> bool {
    let Ok(expected) = owner_to_evm_address(public_key) else {
      return false;
    };
    let Ok(sig) = PrimitiveSignature::try_from(signature) else {
      return false;
    };
    sig
      .recover_address_from_msg(data)
      .is_ok_and(|recovered| recovered == expected)
  }

  #[instrument(skip(self), fields(currency = %self.config.id))]
  async fn get_fee(&self, amount: U256, to: Option<&str>) -> Result<U256, CurrencyError> {
    let provider = self.provider.get().await?;
    let to = to.map(parse_address).transpose()?;
    let from = self.signer.as_ref().map(|s| s.address());
    let gas_limit = self.transfer_gas(provider.as_ref(), from, to, amount).await?;
    let fee_wei = self.gas.fee_for(gas_limit).await?;

    if self.token.is_none() {
      return Ok(fee_wei);
    }
    self.wei_to_token(fee_wei).await
  }

  async fn get_current_height(&self) -> Result<u64, CurrencyError> {
    let provider = self.provider.get().await?;
    rpc_call("eth_blockNumber", self.config.rpc_timeout, async {
      provider.get_block_number().await.map_err(map_rpc_error)
    })
    .await
  }

  #[instrument(skip(self, fee), fields(currency = %self.config.id))]
  async fn create_tx(
    &self,
    amount: U256,
    to: &str,
    fee: Option<U256>,
  ) -> Result<SignedTransaction, CurrencyError> {
    let from = self.sender()?;
    let recipient = parse_address(to)?;
    let signer = self.signer()?;
    let provider = self.provider.get().await?;
    let chain_id = self.chain_id(provider.as_ref()).await?;

    let gas_limit = self
      .transfer_gas(provider.as_ref(), Some(from), Some(recipient), amount)
      .await?;
    let gas_price = self.gas_price_for(fee, gas_limit).await?;
    let gas_price = u128::try_from(gas_price)
      .map_err(|_| CurrencyError::InvalidAmount(format!("gas price {gas_price} overflows")))?;

    let (kind, value, input) = match self.token {
      Some(contract) => (TxKind::Call(contract), U256::ZERO, encode_transfer(recipient, amount)),
      None => (TxKind::Call(recipient), amount, Bytes::new()),
    };

    let mut nonces = self.nonces.lock().await;
    let chain_next = rpc_call("eth_getTransactionCount", self.config.rpc_timeout, async {
      provider
        .get_transaction_count(from)
        .pending()
        .await
        .map_err(map_rpc_error)
    })
    .await?;
    let nonce = nonces.reserve(chain_next);

    let mut tx = TxLegacy {
      chain_id: Some(chain_id),
      nonce,
      gas_price,
      gas_limit,
      to: kind,
      value,
      input,
    };
    let signature = match signer.sign_transaction_sync(&mut tx) {
      Ok(sig) => sig,
      Err(e) => {
        nonces.release(nonce);
        return Err(CurrencyError::Signing(e.to_string()));
      }
    };
    drop(nonces);

    let signed = tx.into_signed(signature);
    let hash = format!("{}", signed.hash());
    let envelope = TxEnvelope::Legacy(signed);

    debug!(nonce, gas_price, gas_limit, tx_id = %hash, "Transfer signed");
    Ok(SignedTransaction::new(envelope.encoded_2718(), Some(hash), nonce))
  }

  #[instrument(skip(self, tx), fields(currency = %self.config.id, nonce = tx.nonce()))]
  async fn send_tx(&self, tx: SignedTransaction) -> Result<TxId, CurrencyError> {
    let provider = self.provider.get().await?;
    let nonce = tx.nonce();
    let payload = tx.into_payload();

    let sent = rpc_call("eth_sendRawTransaction", self.config.rpc_timeout, async {
      provider
        .send_raw_transaction(&payload)
        .await
        .map_err(map_rpc_error)
    })
    .await;

    match sent {
      Ok(pending) => {
        let id = TxId::new(format!("{}", pending.tx_hash()));
        info!(tx_id = %id, "Transaction broadcast");
        Ok(id)
      }
      Err(e) => {
        // Only a fee refusal proves the node dropped the transaction.
        if matches!(e, CurrencyError::FeeTooLow(_)) {
          self.nonces.lock().await.release(nonce);
        }
        warn!(error = %e, "Broadcast refused");
        Err(e)
      }
    }
  }

  #[instrument(skip(self), fields(currency = %self.config.id))]
  async fn get_tx(&self, id: &TxId) -> Result<Tx, CurrencyError> {
    let hash = B256::from_str(id.as_str())
      .map_err(|e| CurrencyError::InvalidTxId(format!("{id}: {e}")))?;
    let provider = self.provider.get().await?;
    let limit = self.config.rpc_timeout;

    let found = rpc_call("eth_getTransactionByHash", limit, async {
      provider.get_transaction_by_hash(hash).await.map_err(map_rpc_error)
    })
    .await?
    .ok_or_else(|| CurrencyError::TransactionNotFound(id.to_string()))?;

    let from = found.from.to_checksum(None);
    let (to, amount) = match (self.token, decode_transfer(found.input())) {
      (Some(_), Some((recipient, amount))) => (recipient, amount),
      _ => (found.to().unwrap_or_default(), found.value()),
    };
    let to = to.to_checksum(None);

    let Some(block_height) = found.block_number else {
      return Ok(Tx::pending(from, to, amount));
    };

    let receipt = rpc_call("eth_getTransactionReceipt", limit, async {
      provider.get_transaction_receipt(hash).await.map_err(map_rpc_error)
    })
    .await?;
    let Some(receipt) = receipt else {
      return Ok(Tx::pending(from, to, amount));
    };
    if !receipt.status() {
      return Err(CurrencyError::TransactionFailed {
        id: id.to_string(),
        reason: "execution reverted".to_string(),
      });
    }

    let current = self.get_current_height().await?;
    Ok(Tx::included(from, to, amount, block_height, current, self.config.min_confirm))
  }

  async fn ready(&self) -> Result<(), CurrencyError> {
    if let Some(address) = self.address() {
      debug!(currency = %self.config.id, address, "EVM address derived from key");
    }
    Ok(())
  }

  async fn price(&self) -> Result<f64, CurrencyError> {
    self.prices.price(self.config.ticker, &self.config.price).await
  }
}

/// Parse hex key material (`0x` optional) into a signer.
fn parse_signer(secret: &str) -> Option<PrivateKeySigner> {
  let secret = secret.trim();
  let hex_key = secret.strip_prefix("0x").unwrap_or(secret);
  let bytes = hex::decode(hex_key).ok()?;
  PrivateKeySigner::from_slice(&bytes).ok()
}

fn parse_address(address: &str) -> Result<Address, CurrencyError> {
  Address::from_str(address.trim())
    .map_err(|e| CurrencyError::InvalidAddress(format!("{address}: {e}")))
}

/// Address of a secp256k1 key given as SEC1 bytes (33 or 65) or raw 64 bytes.
pub fn owner_to_evm_address(owner: &[u8]) -> Result<Address, CurrencyError> {
  if owner.len() == 64 {
    return Ok(Address::from_raw_public_key(owner));
  }
  let key = VerifyingKey::from_sec1_bytes(owner)
    .map_err(|e| CurrencyError::InvalidAddress(format!("invalid secp256k1 public key: {e}")))?;
  let point = key.to_encoded_point(false);
  Ok(Address::from_raw_public_key(&point.as_bytes()[1..]))
}

/// Classify a node error by its message.
pub fn map_rpc_error(err: TransportError) -> CurrencyError {
  classify_node_message(&err.to_string())
}

pub(crate) fn classify_node_message(message: &str) -> CurrencyError {
  let lower = message.to_ascii_lowercase();
  if lower.contains("underpriced") || lower.contains("fee too low") || lower.contains("max fee per gas less than") {
    CurrencyError::FeeTooLow(message.to_string())
  } else if lower.contains("nonce too low")
    || lower.contains("already known")
    || lower.contains("invalid sender")
    || lower.contains("insufficient funds")
  {
    CurrencyError::Rejected(message.to_string())
  } else {
    CurrencyError::Rpc(message.to_string())
  }
}
