//! Configuration Loader - File Loading and Validation
//!
//! Handles loading `config.toml`, validating all parameters,
//! and providing clear error messages for misconfiguration.

use std::path::Path;

use anyhow::{Context, Result};
use tracing::info;

use super::AppConfig;
use crate::domain::units::MAX_FEE_BUMP;
use crate::domain::{CurrencyId, WalletMaterial};

/// Load and validate configuration from a TOML file.
///
/// # Errors
/// Returns detailed error if:
/// - File doesn't exist or can't be read
/// - TOML parsing fails
/// - Validation rules are violated
pub fn load_config(path: &str) -> Result<AppConfig> {
  let path = Path::new(path);

  let content = std::fs::read_to_string(path)
    .with_context(|| format!("Failed to read config file: {}", path.display()))?;

  let config = parse_config(&content)?;

  info!(
    currency = %config.currency.name,
    bundler = %config.bundler.url,
    await_confirmation = config.funding.await_confirmation,
    "Configuration loaded successfully"
  );

  Ok(config)
}

/// Parse and validate TOML text.
pub fn parse_config(content: &str) -> Result<AppConfig> {
  let config: AppConfig = toml::from_str(content).with_context(|| "Failed to parse config.toml")?;
  validate_config(&config)?;
  Ok(config)
}

/// Read the wallet secret from the variable `wallet_env` names.
pub fn load_wallet(config: &AppConfig) -> Result<WalletMaterial> {
  let name = &config.currency.wallet_env;
  let secret = std::env::var(name).with_context(|| format!("Wallet variable {name} is not set"))?;
  let wallet = WalletMaterial::new(secret);
  anyhow::ensure!(!wallet.is_empty(), "Wallet variable {name} is empty");
  Ok(wallet)
}

fn validate_config(config: &AppConfig) -> Result<()> {
  // Bundler validation
  reqwest::Url::parse(&config.bundler.url)
    .with_context(|| format!("Bundler URL {} is invalid", config.bundler.url))?;
  anyhow::ensure!(config.bundler.timeout_ms > 0, "bundler.timeout_ms must be positive");
  anyhow::ensure!(
    config.bundler.max_retries <= 10,
    "bundler.max_retries must be at most 10, got {}",
    config.bundler.max_retries
  );

  // Currency validation
  config
    .currency
    .name
    .parse::<CurrencyId>()
    .with_context(|| format!("currency.name {} is not supported", config.currency.name))?;
  anyhow::ensure!(
    !config.currency.wallet_env.trim().is_empty(),
    "currency.wallet_env must name an environment variable"
  );
  anyhow::ensure!(config.currency.rpc_timeout_ms > 0, "currency.rpc_timeout_ms must be positive");

  // Confirmation validation
  anyhow::ensure!(
    config.confirmation.poll_interval_ms > 0,
    "confirmation.poll_interval_ms must be positive"
  );
  anyhow::ensure!(
    config.confirmation.timeout_secs > 0,
    "confirmation.timeout_secs must be positive"
  );

  // Funding validation
  anyhow::ensure!(
    config.funding.fee_bump_multiplier.is_finite()
      && config.funding.fee_bump_multiplier > 1.0
      && config.funding.fee_bump_multiplier <= MAX_FEE_BUMP,
    "funding.fee_bump_multiplier must be in (1, {MAX_FEE_BUMP}], got {}",
    config.funding.fee_bump_multiplier
  );

  Ok(())
}

#[cfg(test)]
mod tests {
  use super::*;

  const MINIMAL: &str = r#"
[bundler]
url = "https://node1.bundlr.network"

[currency]
name = "matic"
wallet_env = "BUNDLR_WALLET"
"#;

  #[test]
  fn test_load_nonexistent_file() {
    let result = load_config("nonexistent.toml");
    assert!(result.is_err());
  }

  #[test]
  fn test_minimal_config_takes_defaults() {
    let config = parse_config(MINIMAL).unwrap();
    assert_eq!(config.client.log_level, "info");
    assert_eq!(config.bundler.max_retries, 3);
    assert_eq!(config.currency.rpc_timeout_ms, 30_000);
    assert_eq!(config.confirmation.timeout_secs, 600);
    assert!(config.funding.await_confirmation);

    let funding = config.funding_config();
    assert_eq!(funding.fee_bump_multiplier, 1.5);
    assert_eq!(funding.poll.interval.as_millis(), 5_000);
  }

  #[test]
  fn test_unknown_currency_rejected() {
    let content = MINIMAL.replace("matic", "dogecoin");
    assert!(parse_config(&content).is_err());
  }

  #[test]
  fn test_fee_bump_has_upper_bound() {
    let content = format!("{MINIMAL}\n[funding]\nfee_bump_multiplier = 1e23\n");
    assert!(parse_config(&content).is_err());

    let content = format!("{MINIMAL}\n[funding]\nfee_bump_multiplier = 10.0\n");
    assert!(parse_config(&content).is_ok());
  }

  #[test]
  fn test_fee_bump_must_increase() {
    let content = format!("{MINIMAL}\n[funding]\nfee_bump_multiplier = 0.9\n");
    assert!(parse_config(&content).is_err());
  }

  #[test]
  fn test_settings_carry_overrides() {
    let content = MINIMAL.replace(
      "wallet_env = \"BUNDLR_WALLET\"",
      "wallet_env = \"BUNDLR_WALLET\"\nmin_confirm = 9\nprovider_url = \"http://localhost:8545\"",
    );
    let config = parse_config(&content).unwrap();
    let settings = config
      .currency
      .settings(WalletMaterial::new("0x01"), &config.bundler.url);
    assert_eq!(settings.min_confirm, Some(9));
    assert_eq!(settings.provider_url.as_deref(), Some("http://localhost:8545"));
    assert_eq!(settings.bundler_url.as_deref(), Some("https://node1.bundlr.network"));
  }
}
