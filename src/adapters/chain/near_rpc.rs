//! NEAR JSON-RPC Client
//!
//! Implements the `NearRpc` port over plain JSON-RPC 2.0 with reqwest.
//! The HTTP client carries its own request timeout. Node errors are
//! classified from their structured `cause.name` into the currency
//! error taxonomy so the adapter never inspects raw RPC payloads.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use reqwest::Client;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use tracing::{debug, instrument, warn};

use crate::domain::CurrencyError;
use crate::ports::{AccessKeyView, BlockRef, NearRpc, NearTxOutcome};

/// JSON-RPC client bound to one NEAR endpoint.
pub struct NearJsonRpc {
  http: Client,
  url: String,
  timeout: Duration,
  next_id: AtomicU64,
}

#[derive(Debug, Deserialize)]
struct RpcResponse {
  #[serde(default)]
  result: Option<Value>,
  #[serde(default)]
  error: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct StatusView {
  sync_info: SyncInfo,
}

#[derive(Debug, Deserialize)]
struct SyncInfo {
  latest_block_height: u64,
}

#[derive(Debug, Deserialize)]
struct GasPriceView {
  gas_price: String,
}

#[derive(Debug, Deserialize)]
struct AccessKeyResult {
  #[serde(default)]
  nonce: Option<u64>,
  #[serde(default)]
  block_hash: Option<String>,
  /// Older nodes report query failures inside `result`.
  #[serde(default)]
  error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct BlockView {
  header: BlockHeader,
}

#[derive(Debug, Deserialize)]
struct BlockHeader {
  height: u64,
}

#[derive(Debug, Deserialize)]
struct BroadcastView {
  transaction: TransactionHash,
}

#[derive(Debug, Deserialize)]
struct TransactionHash {
  hash: String,
}

impl NearJsonRpc {
  /// Create a client for `url`. No connection is made until the first call.
  pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self, CurrencyError> {
    let http = Client::builder()
      .timeout(timeout)
      .pool_max_idle_per_host(5)
      .build()
      .map_err(|e| CurrencyError::Config(format!("failed to build HTTP client: {e}")))?;

    Ok(Self {
      http,
      url: url.into(),
      timeout,
      next_id: AtomicU64::new(1),
    })
  }

  fn transport_error(&self, method: &'static str, err: reqwest::Error) -> CurrencyError {
    if err.is_timeout() {
      CurrencyError::Timeout {
        operation: method,
        elapsed: self.timeout,
      }
    } else {
      CurrencyError::Rpc(format!("{method}: {err}"))
    }
  }

  async fn call<T: DeserializeOwned>(
    &self,
    method: &'static str,
    params: Value,
  ) -> Result<T, CurrencyError> {
    let id = self.next_id.fetch_add(1, Ordering::Relaxed);
    let body = json!({ "jsonrpc": "2.0", "id": id, "method": method, "params": params });

    let response = self
      .http
      .post(&self.url)
      .json(&body)
      .send()
      .await
      .map_err(|e| self.transport_error(method, e))?;
    let status = response.status();
    if status.is_server_error() && status.as_u16() != 500 {
      return Err(CurrencyError::Rpc(format!("{method}: HTTP {status}")));
    }
    let response: RpcResponse = response
      .json()
      .await
      .map_err(|e| CurrencyError::Rpc(format!("{method}: malformed response: {e}")))?;

    if let Some(error) = response.error {
      let err = classify_rpc_error(method, &error);
      debug!(method, error = %err, "NEAR RPC returned error");
      return Err(err);
    }
    let result = response
      .result
      .ok_or_else(|| CurrencyError::Rpc(format!("{method}: response has no result")))?;
    serde_json::from_value(result)
      .map_err(|e| CurrencyError::Rpc(format!("{method}: unexpected result shape: {e}")))
  }
}

#[async_trait]
impl NearRpc for NearJsonRpc {
  async fn latest_height(&self) -> Result<u64, CurrencyError> {
    let status: StatusView = self.call("status", json!([])).await?;
    Ok(status.sync_info.latest_block_height)
  }

  async fn gas_price(&self) -> Result<u128, CurrencyError> {
    let view: GasPriceView = self.call("gas_price", json!([null])).await?;
    view
      .gas_price
      .parse()
      .map_err(|e| CurrencyError::Rpc(format!("gas_price {:?}: {e}", view.gas_price)))
  }

  #[instrument(skip(self))]
  async fn view_access_key(
    &self,
    account_id: &str,
    public_key: &str,
  ) -> Result<AccessKeyView, CurrencyError> {
    let params = json!({
      "request_type": "view_access_key",
      "finality": "final",
      "account_id": account_id,
      "public_key": public_key,
    });
    let view: AccessKeyResult = self.call("query", params).await?;
    if let Some(error) = view.error {
      return Err(CurrencyError::Rpc(format!("view_access_key: {error}")));
    }

    let nonce = view
      .nonce
      .ok_or_else(|| CurrencyError::Rpc("view_access_key: missing nonce".to_string()))?;
    let block_hash = view
      .block_hash
      .as_deref()
      .ok_or_else(|| CurrencyError::Rpc("view_access_key: missing block_hash".to_string()))
      .and_then(decode_block_hash)?;
    Ok(AccessKeyView { nonce, block_hash })
  }

  #[instrument(skip(self, signed_tx), fields(bytes = signed_tx.len()))]
  async fn broadcast_tx(&self, signed_tx: &[u8]) -> Result<String, CurrencyError> {
    let encoded = STANDARD.encode(signed_tx);
    let view: BroadcastView = self.call("broadcast_tx_commit", json!([encoded])).await?;
    Ok(view.transaction.hash)
  }

  async fn tx_status(&self, hash: &str, sender_id: &str) -> Result<NearTxOutcome, CurrencyError> {
    let view: Value = self
      .call("EXPERIMENTAL_tx_status", json!([hash, sender_id]))
      .await?;
    parse_tx_outcome(&view)
  }

  async fn block_height(&self, block: BlockRef) -> Result<u64, CurrencyError> {
    let params = match block {
      BlockRef::Final => json!({ "finality": "final" }),
      BlockRef::Hash(hash) => json!({ "block_id": hash }),
    };
    let view: BlockView = self.call("block", params).await?;
    Ok(view.header.height)
  }
}

fn decode_block_hash(encoded: &str) -> Result<[u8; 32], CurrencyError> {
  let bytes = bs58::decode(encoded)
    .into_vec()
    .map_err(|e| CurrencyError::Rpc(format!("block hash {encoded}: {e}")))?;
  <[u8; 32]>::try_from(bytes.as_slice())
    .map_err(|_| CurrencyError::Rpc(format!("block hash {encoded} has {} bytes", bytes.len())))
}

/// Map a JSON-RPC error object onto the currency error taxonomy.
pub fn classify_rpc_error(method: &'static str, error: &Value) -> CurrencyError {
  let cause = error
    .pointer("/cause/name")
    .and_then(Value::as_str)
    .unwrap_or_default();
  let detail = error
    .get("data")
    .map(|d| d.to_string())
    .or_else(|| error.get("message").map(|m| m.to_string()))
    .unwrap_or_else(|| error.to_string());

  match cause {
    "UNKNOWN_TRANSACTION" => CurrencyError::TransactionNotFound(detail),
    "TIMEOUT_ERROR" => CurrencyError::Timeout {
      operation: method,
      elapsed: Duration::ZERO,
    },
    "INVALID_TRANSACTION" => {
      if detail.contains("NotEnoughBalance") || detail.contains("LackBalanceForState") {
        warn!(method, "Account cannot cover transfer and gas");
      }
      CurrencyError::Rejected(detail)
    }
    _ if detail.contains("InvalidNonce") || detail.contains("Expired") => {
      CurrencyError::Rejected(detail)
    }
    _ => CurrencyError::Rpc(format!("{method}: {detail}")),
  }
}

/// Extract the fields the adapter needs from an `EXPERIMENTAL_tx_status` result.
pub fn parse_tx_outcome(view: &Value) -> Result<NearTxOutcome, CurrencyError> {
  let text = |path: &str| -> Result<String, CurrencyError> {
    view
      .pointer(path)
      .and_then(Value::as_str)
      .map(str::to_string)
      .ok_or_else(|| CurrencyError::Rpc(format!("tx status is missing {path}")))
  };

  let signer_id = text("/transaction/signer_id")?;
  let receiver_id = text("/transaction/receiver_id")?;
  let block_hash = text("/transaction_outcome/block_hash")?;

  let failure = match view.pointer("/receipts_outcome/0/outcome/status") {
    Some(status) if status.get("SuccessValue").and_then(Value::as_str) == Some("") => None,
    Some(status) => Some(
      status
        .get("Failure")
        .map(|f| f.to_string())
        .unwrap_or_else(|| status.to_string()),
    ),
    None => {
      return Err(CurrencyError::TransactionNotFound(format!(
        "{signer_id}: no receipt outcome yet"
      )));
    }
  };

  let deposit = view
    .pointer("/receipts/0/receipt/Action/actions/0/Transfer/deposit")
    .and_then(Value::as_str)
    .map(|d| {
      d.parse::<u128>()
        .map_err(|e| CurrencyError::Rpc(format!("deposit {d}: {e}")))
    })
    .transpose()?
    .unwrap_or(0);

  Ok(NearTxOutcome {
    signer_id,
    receiver_id,
    block_hash,
    deposit,
    failure,
  })
}
