//! Currency identifiers and construction parameters.
//!
//! [`CurrencyId`] is the closed set of networks this crate can build an
//! adapter for. [`CurrencySettings`] is what a caller supplies;
//! [`CurrencyConfig`] is the fully resolved, immutable configuration an
//! adapter owns after the registry applied per-network defaults.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::error::CurrencyError;

/// Supported networks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CurrencyId {
    Ethereum,
    Matic,
    Bnb,
    Fantom,
    Avalanche,
    BobaEth,
    Arbitrum,
    Boba,
    Chainlink,
    Kyve,
    Near,
}

impl CurrencyId {
    pub const ALL: [CurrencyId; 11] = [
        Self::Ethereum,
        Self::Matic,
        Self::Bnb,
        Self::Fantom,
        Self::Avalanche,
        Self::BobaEth,
        Self::Arbitrum,
        Self::Boba,
        Self::Chainlink,
        Self::Kyve,
        Self::Near,
    ];

    /// Wire name used by the bundler routes.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ethereum => "ethereum",
            Self::Matic => "matic",
            Self::Bnb => "bnb",
            Self::Fantom => "fantom",
            Self::Avalanche => "avalanche",
            Self::BobaEth => "boba-eth",
            Self::Arbitrum => "arbitrum",
            Self::Boba => "boba",
            Self::Chainlink => "chainlink",
            Self::Kyve => "kyve",
            Self::Near => "near",
        }
    }

    /// Chain mechanics shared by every identifier in the family.
    pub fn family(&self) -> CurrencyFamily {
        match self {
            Self::Boba | Self::Chainlink | Self::Kyve => CurrencyFamily::Erc20,
            Self::Near => CurrencyFamily::Near,
            _ => CurrencyFamily::EvmNative,
        }
    }

    /// Signature scheme tag the bundler expects alongside signed requests.
    pub fn signature_type(&self) -> u16 {
        match self.family() {
            CurrencyFamily::Near => 2,
            CurrencyFamily::EvmNative | CurrencyFamily::Erc20 => 3,
        }
    }
}

impl fmt::Display for CurrencyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CurrencyId {
    type Err = CurrencyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|id| id.as_str() == wanted)
            .ok_or_else(|| CurrencyError::UnsupportedCurrency(s.to_string()))
    }
}

/// Adapter implementation serving a group of identifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CurrencyFamily {
    /// Native coin on an EVM chain.
    EvmNative,
    /// ERC-20 token on an EVM chain.
    Erc20,
    /// NEAR protocol.
    Near,
}

/// Secret key material. Never printed.
#[derive(Clone, PartialEq, Eq)]
pub struct WalletMaterial(String);

impl WalletMaterial {
    pub fn new(secret: impl Into<String>) -> Self {
        Self(secret.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl fmt::Debug for WalletMaterial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("WalletMaterial(<redacted>)")
    }
}

/// How an adapter obtains the USD price of its ticker.
#[derive(Debug, Clone, PartialEq)]
pub enum PriceStrategy {
    /// Ask the bundler's price endpoint.
    Bundler,
    /// Fixed stand-in for assets without a live feed (testnets, pre-mainnet tokens).
    Fixed(f64),
}

/// How a token adapter values the gas asset its fees are paid in.
#[derive(Debug, Clone, PartialEq)]
pub enum FeeStrategy {
    /// Quote the gas asset (by ticker) through the bundler's price endpoint.
    Bundler { gas_ticker: String },
    /// Fixed USD price of the gas asset.
    Fixed(f64),
}

/// Caller-supplied construction parameters. Unset fields take network defaults.
#[derive(Debug, Clone)]
pub struct CurrencySettings {
    pub wallet: WalletMaterial,
    pub provider_url: Option<String>,
    pub contract_address: Option<String>,
    pub min_confirm: Option<u64>,
    pub bundler_url: Option<String>,
    pub price: Option<PriceStrategy>,
    pub fee: Option<FeeStrategy>,
    pub rpc_timeout: Duration,
}

impl CurrencySettings {
    pub fn new(wallet: WalletMaterial) -> Self {
        Self {
            wallet,
            provider_url: None,
            contract_address: None,
            min_confirm: None,
            bundler_url: None,
            price: None,
            fee: None,
            rpc_timeout: DEFAULT_RPC_TIMEOUT,
        }
    }

    pub fn with_provider_url(mut self, url: impl Into<String>) -> Self {
        self.provider_url = Some(url.into());
        self
    }

    pub fn with_bundler_url(mut self, url: impl Into<String>) -> Self {
        self.bundler_url = Some(url.into());
        self
    }

    pub fn with_min_confirm(mut self, min_confirm: u64) -> Self {
        self.min_confirm = Some(min_confirm);
        self
    }

    pub fn with_contract_address(mut self, address: impl Into<String>) -> Self {
        self.contract_address = Some(address.into());
        self
    }
}

/// Default bound on a single chain RPC round trip.
pub const DEFAULT_RPC_TIMEOUT: Duration = Duration::from_secs(30);

/// Resolved, immutable adapter configuration.
#[derive(Debug, Clone)]
pub struct CurrencyConfig {
    pub id: CurrencyId,
    pub ticker: &'static str,
    pub wallet: WalletMaterial,
    pub provider_url: String,
    pub contract_address: Option<String>,
    pub min_confirm: u64,
    pub price: PriceStrategy,
    pub fee: FeeStrategy,
    pub bundler_url: Option<String>,
    pub rpc_timeout: Duration,
    /// Network is slow to finalize; callers should poll less aggressively.
    pub is_slow: bool,
}
