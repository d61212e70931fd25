//! Bundler HTTP Client - Retrying REST Client
//!
//! Wraps reqwest with a concurrency limit and exponential-backoff
//! retries for every bundler route the settlement flow uses. Reads and
//! the idempotent funding notice retry on 429/5xx and transport errors;
//! the withdrawal POST is sent exactly once.

use std::sync::Arc;
use std::time::Duration;

use alloy::primitives::U256;
use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use tokio::sync::Semaphore;
use tokio::time::sleep;
use tracing::{debug, info, instrument, warn};

use super::types::{
  BalanceResponse, FundNotice, InfoResponse, LookupResponse, PriceResponse, parse_amount,
};
use crate::domain::{CurrencyError, CurrencyId, TxId};
use crate::ports::{BundlerApi, WithdrawalPayload, WithdrawalReceipt};

/// Configuration for the bundler HTTP client.
#[derive(Debug, Clone)]
pub struct BundlerClientConfig {
  /// Base URL of the bundler node.
  pub base_url: String,
  /// Per-request timeout.
  pub timeout: Duration,
  /// Maximum concurrent requests.
  pub max_concurrent: usize,
  /// Maximum retries on transient errors.
  pub max_retries: u32,
  /// Base delay between retries (exponential backoff).
  pub retry_base_delay: Duration,
}

impl Default for BundlerClientConfig {
  fn default() -> Self {
    Self {
      base_url: "https://node1.bundlr.network".to_string(),
      timeout: Duration::from_secs(30),
      max_concurrent: 10,
      max_retries: 3,
      retry_base_delay: Duration::from_millis(200),
    }
  }
}

/// Whether a request may be sent more than once.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Retry {
  Transient,
  Never,
}

/// HTTP client for one bundler node.
pub struct BundlerClient {
  http: Client,
  config: BundlerClientConfig,
  semaphore: Arc<Semaphore>,
}

impl BundlerClient {
  pub fn new(mut config: BundlerClientConfig) -> Result<Self, CurrencyError> {
    let http = Client::builder()
      .timeout(config.timeout)
      .pool_max_idle_per_host(5)
      .build()
      .map_err(|e| CurrencyError::Config(format!("failed to build HTTP client: {e}")))?;

    config.base_url = config.base_url.trim_end_matches('/').to_string();
    let semaphore = Arc::new(Semaphore::new(config.max_concurrent.max(1)));

    Ok(Self {
      http,
      config,
      semaphore,
    })
  }

  fn url(&self, path: &str) -> String {
    format!("{}{}", self.config.base_url, path)
  }

  async fn get_json<T: DeserializeOwned>(
    &self,
    path: &str,
    query: &[(&str, &str)],
  ) -> Result<T, CurrencyError> {
    let request = self.http.get(self.url(path)).query(query);
    let response = self.execute(request, "GET", path, Retry::Transient).await?;
    let response = expect_success(response, path).await?;
    decode(response, path).await
  }

  /// Execute with the concurrency limit and, when allowed, retries.
  ///
  /// Returns the first response that is not retriable, whatever its
  /// status; callers map statuses to errors.
  async fn execute(
    &self,
    request: RequestBuilder,
    method: &str,
    path: &str,
    retry: Retry,
  ) -> Result<Response, CurrencyError> {
    let _permit = self
      .semaphore
      .acquire()
      .await
      .map_err(|_| CurrencyError::Bundler("client is shut down".to_string()))?;

    let attempts = match retry {
      Retry::Transient => self.config.max_retries,
      Retry::Never => 0,
    };
    let mut last_error = None;

    for attempt in 0..=attempts {
      if attempt > 0 {
        let delay = self.config.retry_base_delay * 2u32.pow(attempt - 1);
        debug!(attempt, delay_ms = delay.as_millis() as u64, method, path, "Retrying bundler request");
        sleep(delay).await;
      }

      let req = request
        .try_clone()
        .ok_or_else(|| CurrencyError::Bundler(format!("{method} {path}: request not cloneable")))?;

      match req.send().await {
        Ok(response) => match response.status() {
          StatusCode::TOO_MANY_REQUESTS if retry == Retry::Transient => {
            warn!(path, "Rate limited by bundler, backing off");
            last_error = Some(CurrencyError::Bundler(format!("{method} {path}: rate limited")));
          }
          status if status.is_server_error() && retry == Retry::Transient => {
            warn!(status = %status, path, "Bundler server error, retrying");
            last_error = Some(CurrencyError::Bundler(format!("{method} {path}: {status}")));
          }
          _ => return Ok(response),
        },
        Err(e) => {
          warn!(error = %e, attempt, path, "Bundler request failed");
          last_error = Some(if e.is_timeout() {
            CurrencyError::Timeout {
              operation: "bundler request",
              elapsed: self.config.timeout,
            }
          } else {
            CurrencyError::Bundler(format!("{method} {path}: {e}"))
          });
        }
      }
    }

    Err(last_error.unwrap_or_else(|| CurrencyError::Bundler("max retries exceeded".to_string())))
  }
}

async fn expect_success(response: Response, path: &str) -> Result<Response, CurrencyError> {
  let status = response.status();
  if status.is_success() {
    return Ok(response);
  }
  let body = response.text().await.unwrap_or_default();
  Err(CurrencyError::Bundler(format!("{path}: {status}: {body}")))
}

async fn decode<T: DeserializeOwned>(response: Response, path: &str) -> Result<T, CurrencyError> {
  response
    .json::<T>()
    .await
    .map_err(|e| CurrencyError::Bundler(format!("{path}: malformed response: {e}")))
}

/// Map a non-success withdrawal response to the error taxonomy.
pub fn withdrawal_error(status: StatusCode, body: &str) -> CurrencyError {
  if status == StatusCode::BAD_REQUEST && body.to_ascii_lowercase().contains("balance") {
    CurrencyError::WithdrawalRejected(body.trim().to_string())
  } else {
    CurrencyError::Bundler(format!("withdraw: {status}: {}", body.trim()))
  }
}

#[async_trait]
impl BundlerApi for BundlerClient {
  #[instrument(skip(self))]
  async fn balance(&self, currency: CurrencyId, address: &str) -> Result<U256, CurrencyError> {
    let path = format!("/account/balance/{currency}");
    let body: BalanceResponse = self.get_json(&path, &[("address", address)]).await?;
    parse_amount(&body.balance)
  }

  async fn receiving_address(&self, currency: CurrencyId) -> Result<String, CurrencyError> {
    let info: InfoResponse = self.get_json("/info", &[]).await?;
    info
      .addresses
      .get(currency.as_str())
      .cloned()
      .ok_or_else(|| CurrencyError::Bundler(format!("bundler does not accept {currency}")))
  }

  #[instrument(skip(self))]
  async fn notify_funding(&self, currency: CurrencyId, tx_id: &TxId) -> Result<(), CurrencyError> {
    let path = format!("/account/balance/{currency}");
    let request = self
      .http
      .post(self.url(&path))
      .json(&FundNotice { tx_id: tx_id.as_str() });
    let response = self.execute(request, "POST", &path, Retry::Transient).await?;
    expect_success(response, &path).await?;
    info!(currency = %currency, tx_id = %tx_id, "Bundler notified of funding transfer");
    Ok(())
  }

  async fn lookup_address(
    &self,
    currency: CurrencyId,
    public_key: &str,
  ) -> Result<Option<String>, CurrencyError> {
    let path = format!("/account/{currency}/lookup");
    let request = self.http.get(self.url(&path)).query(&[("address", public_key)]);
    let response = self.execute(request, "GET", &path, Retry::Transient).await?;
    if response.status() == StatusCode::NOT_FOUND {
      return Ok(None);
    }
    let response = expect_success(response, &path).await?;
    let body: LookupResponse = decode(response, &path).await?;
    Ok(body.address.filter(|a| !a.is_empty()))
  }

  async fn price(&self, ticker: &str) -> Result<f64, CurrencyError> {
    let path = format!("/price/{}/usd", ticker.to_ascii_lowercase());
    let body: PriceResponse = self.get_json(&path, &[]).await?;
    if !body.usd.is_finite() || body.usd <= 0.0 {
      return Err(CurrencyError::Bundler(format!("{ticker} price {} is not positive", body.usd)));
    }
    Ok(body.usd)
  }

  async fn withdrawal_nonce(
    &self,
    currency: CurrencyId,
    address: &str,
  ) -> Result<u64, CurrencyError> {
    let path = format!("/account/withdrawals/{currency}");
    let request = self.http.get(self.url(&path)).query(&[("address", address)]);
    let response = self.execute(request, "GET", &path, Retry::Transient).await?;
    let response = expect_success(response, &path).await?;
    let text = response
      .text()
      .await
      .map_err(|e| CurrencyError::Bundler(format!("{path}: {e}")))?;
    text
      .trim()
      .trim_matches('"')
      .parse()
      .map_err(|e| CurrencyError::Bundler(format!("{path}: nonce {text:?}: {e}")))
  }

  #[instrument(skip(self, payload), fields(currency = %payload.currency, amount = %payload.amount))]
  async fn withdraw(&self, payload: &WithdrawalPayload) -> Result<WithdrawalReceipt, CurrencyError> {
    let path = "/account/withdraw";
    let request = self.http.post(self.url(path)).json(payload);
    let response = self.execute(request, "POST", path, Retry::Never).await?;

    let status = response.status();
    if !status.is_success() {
      let body = response.text().await.unwrap_or_default();
      return Err(withdrawal_error(status, &body));
    }
    decode(response, path).await
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_withdrawal_error_mapping() {
    assert!(matches!(
      withdrawal_error(StatusCode::BAD_REQUEST, "Not enough balance for requested withdrawal"),
      CurrencyError::WithdrawalRejected(_)
    ));
    assert!(matches!(
      withdrawal_error(StatusCode::BAD_REQUEST, "invalid signature"),
      CurrencyError::Bundler(_)
    ));
    assert!(matches!(
      withdrawal_error(StatusCode::INTERNAL_SERVER_ERROR, "balance service down"),
      CurrencyError::Bundler(_)
    ));
  }

  #[test]
  fn test_base_url_trailing_slash_trimmed() {
    let client = BundlerClient::new(BundlerClientConfig {
      base_url: "https://node1.bundlr.network/".to_string(),
      ..Default::default()
    })
    .unwrap();
    assert_eq!(client.url("/info"), "https://node1.bundlr.network/info");
  }

  #[tokio::test]
  async fn test_unreachable_bundler_exhausts_retries() {
    let client = BundlerClient::new(BundlerClientConfig {
      base_url: "http://127.0.0.1:1".to_string(),
      timeout: Duration::from_millis(200),
      max_retries: 1,
      retry_base_delay: Duration::from_millis(1),
      ..Default::default()
    })
    .unwrap();
    let err = client.receiving_address(CurrencyId::Matic).await.unwrap_err();
    assert!(err.is_retriable());
  }
}
