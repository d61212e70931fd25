//! Configuration Module - TOML-based Client Configuration
//!
//! Loads and validates configuration from `config.toml`. Wallet keys
//! never live in the file: `[currency] wallet_env` names the environment
//! variable that holds them.

pub mod loader;

use std::time::Duration;

use serde::Deserialize;

use crate::adapters::bundler::BundlerClientConfig;
use crate::domain::{CurrencySettings, WalletMaterial};
use crate::usecases::{FundingConfig, PollConfig};

/// Top-level client configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
  #[serde(default)]
  pub client: ClientConfig,
  pub bundler: BundlerConfig,
  pub currency: CurrencySection,
  #[serde(default)]
  pub confirmation: ConfirmationConfig,
  #[serde(default)]
  pub funding: FundingSection,
}

/// Process-wide settings.
#[derive(Debug, Clone, Deserialize)]
pub struct ClientConfig {
  /// Log level (trace, debug, info, warn, error).
  #[serde(default = "default_log_level")]
  pub log_level: String,
}

impl Default for ClientConfig {
  fn default() -> Self {
    Self {
      log_level: default_log_level(),
    }
  }
}

/// Bundler node endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct BundlerConfig {
  pub url: String,
  #[serde(default = "default_timeout_ms")]
  pub timeout_ms: u64,
  #[serde(default = "default_max_retries")]
  pub max_retries: u32,
  #[serde(default = "default_retry_base_delay_ms")]
  pub retry_base_delay_ms: u64,
}

impl BundlerConfig {
  pub fn client_config(&self) -> BundlerClientConfig {
    BundlerClientConfig {
      base_url: self.url.clone(),
      timeout: Duration::from_millis(self.timeout_ms),
      max_retries: self.max_retries,
      retry_base_delay: Duration::from_millis(self.retry_base_delay_ms),
      ..Default::default()
    }
  }
}

/// Which adapter to build and how.
#[derive(Debug, Clone, Deserialize)]
pub struct CurrencySection {
  /// Network identifier (`matic`, `near`, ...).
  pub name: String,
  /// Environment variable holding the private key or seed phrase.
  pub wallet_env: String,
  pub provider_url: Option<String>,
  pub contract_address: Option<String>,
  pub min_confirm: Option<u64>,
  #[serde(default = "default_rpc_timeout_ms")]
  pub rpc_timeout_ms: u64,
}

impl CurrencySection {
  /// Adapter settings around already-loaded wallet material.
  pub fn settings(&self, wallet: WalletMaterial, bundler_url: &str) -> CurrencySettings {
    let mut settings = CurrencySettings::new(wallet).with_bundler_url(bundler_url);
    settings.provider_url = self.provider_url.clone();
    settings.contract_address = self.contract_address.clone();
    settings.min_confirm = self.min_confirm;
    settings.rpc_timeout = Duration::from_millis(self.rpc_timeout_ms);
    settings
  }
}

/// Confirmation polling.
#[derive(Debug, Clone, Deserialize)]
pub struct ConfirmationConfig {
  #[serde(default = "default_poll_interval_ms")]
  pub poll_interval_ms: u64,
  #[serde(default = "default_confirmation_timeout")]
  pub timeout_secs: u64,
}

impl Default for ConfirmationConfig {
  fn default() -> Self {
    Self {
      poll_interval_ms: default_poll_interval_ms(),
      timeout_secs: default_confirmation_timeout(),
    }
  }
}

impl ConfirmationConfig {
  pub fn poll_config(&self) -> PollConfig {
    PollConfig {
      interval: Duration::from_millis(self.poll_interval_ms),
      timeout: Duration::from_secs(self.timeout_secs),
    }
  }
}

/// Funding behaviour.
#[derive(Debug, Clone, Deserialize)]
pub struct FundingSection {
  #[serde(default = "default_fee_bump")]
  pub fee_bump_multiplier: f64,
  #[serde(default = "default_true")]
  pub await_confirmation: bool,
}

impl Default for FundingSection {
  fn default() -> Self {
    Self {
      fee_bump_multiplier: default_fee_bump(),
      await_confirmation: true,
    }
  }
}

impl AppConfig {
  pub fn funding_config(&self) -> FundingConfig {
    FundingConfig {
      fee_bump_multiplier: self.funding.fee_bump_multiplier,
      await_confirmation: self.funding.await_confirmation,
      poll: self.confirmation.poll_config(),
    }
  }
}

// Default value functions for serde

fn default_log_level() -> String {
  "info".to_string()
}

fn default_true() -> bool {
  true
}

fn default_timeout_ms() -> u64 {
  30_000
}

fn default_max_retries() -> u32 {
  3
}

fn default_retry_base_delay_ms() -> u64 {
  200
}

fn default_rpc_timeout_ms() -> u64 {
  30_000
}

fn default_poll_interval_ms() -> u64 {
  5_000
}

fn default_confirmation_timeout() -> u64 {
  600
}

fn default_fee_bump() -> f64 {
  1.5
}
