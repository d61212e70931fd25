//! Bundler API Request/Response Types
//!
//! Serialization types for the bundler's REST routes. Amounts arrive
//! either as decimal strings or as JSON numbers depending on the route,
//! so they are kept as raw JSON values and parsed by [`parse_amount`].

use std::collections::HashMap;

use alloy::primitives::U256;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::domain::CurrencyError;

/// `GET /info`.
#[derive(Debug, Clone, Deserialize)]
pub struct InfoResponse {
  /// Receiving address per currency wire name.
  #[serde(default)]
  pub addresses: HashMap<String, String>,
}

/// `GET /account/balance/{currency}`.
#[derive(Debug, Clone, Deserialize)]
pub struct BalanceResponse {
  pub balance: Value,
}

/// `POST /account/balance/{currency}`.
#[derive(Debug, Clone, Serialize)]
pub struct FundNotice<'a> {
  pub tx_id: &'a str,
}

/// `GET /account/{currency}/lookup`.
#[derive(Debug, Clone, Deserialize)]
pub struct LookupResponse {
  #[serde(default)]
  pub address: Option<String>,
}

/// `GET /price/{ticker}/usd`.
#[derive(Debug, Clone, Deserialize)]
pub struct PriceResponse {
  pub usd: f64,
}

/// Parse a base-unit amount given as a decimal string or a JSON integer.
pub fn parse_amount(value: &Value) -> Result<U256, CurrencyError> {
  match value {
    Value::String(s) => U256::from_str_radix(s.trim(), 10)
      .map_err(|e| CurrencyError::Bundler(format!("amount {s:?}: {e}"))),
    Value::Number(n) => n
      .as_u64()
      .map(U256::from)
      .ok_or_else(|| CurrencyError::Bundler(format!("amount {n} is not a non-negative integer"))),
    other => Err(CurrencyError::Bundler(format!("amount has unexpected type: {other}"))),
  }
}

#[cfg(test)]
mod tests {
  use serde_json::json;

  use super::*;

  #[test]
  fn test_parse_amount_forms() {
    assert_eq!(parse_amount(&json!("123456789012345678901234")).unwrap(),
      U256::from_str_radix("123456789012345678901234", 10).unwrap());
    assert_eq!(parse_amount(&json!(42)).unwrap(), U256::from(42u64));
    assert!(parse_amount(&json!(-1)).is_err());
    assert!(parse_amount(&json!(1.5)).is_err());
    assert!(parse_amount(&json!(null)).is_err());
  }

  #[test]
  fn test_info_addresses() {
    let info: InfoResponse =
      serde_json::from_value(json!({ "addresses": { "matic": "0xabc" }, "version": "0.2.0" })).unwrap();
    assert_eq!(info.addresses.get("matic").map(String::as_str), Some("0xabc"));
  }
}
