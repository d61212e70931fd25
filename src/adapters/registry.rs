//! Currency Registry - Identifier to Adapter Construction
//!
//! Maps a network identifier plus caller settings to a ready-to-use
//! `Arc<dyn Currency>`. Per-network defaults (ticker, RPC endpoint,
//! confirmation depth, token contract, price and fee strategies) live
//! in one table; caller settings override them. Construction is pure:
//! no RPC connection or bundler request happens here.

use std::sync::Arc;

use reqwest::Url;
use tracing::info;

use super::bundler::{BundlerClient, BundlerClientConfig};
use super::chain::{EvmCurrency, NearCurrency, PriceSource};
use crate::domain::{
    CurrencyConfig, CurrencyError, CurrencyFamily, CurrencyId, CurrencySettings, FeeStrategy,
    PriceStrategy,
};
use crate::ports::{BundlerApi, Currency};

/// Default minimum confirmation depth.
pub const DEFAULT_MIN_CONFIRM: u64 = 5;

/// Built-in defaults for one network identifier.
#[derive(Debug, Clone, PartialEq)]
pub struct NetworkDefaults {
    pub ticker: &'static str,
    pub provider_url: &'static str,
    pub min_confirm: u64,
    pub contract_address: Option<&'static str>,
    pub price: PriceStrategy,
    pub fee: FeeStrategy,
    pub is_slow: bool,
}

impl NetworkDefaults {
    fn native(ticker: &'static str, provider_url: &'static str) -> Self {
        Self {
            ticker,
            provider_url,
            min_confirm: DEFAULT_MIN_CONFIRM,
            contract_address: None,
            price: PriceStrategy::Bundler,
            fee: FeeStrategy::Bundler {
                gas_ticker: ticker.to_string(),
            },
            is_slow: false,
        }
    }

    fn token(
        ticker: &'static str,
        provider_url: &'static str,
        contract: &'static str,
        gas_ticker: &str,
    ) -> Self {
        Self {
            contract_address: Some(contract),
            fee: FeeStrategy::Bundler {
                gas_ticker: gas_ticker.to_string(),
            },
            ..Self::native(ticker, provider_url)
        }
    }

    fn min_confirm(mut self, min_confirm: u64) -> Self {
        self.min_confirm = min_confirm;
        self
    }
}

/// Defaults for `id`.
pub fn network_defaults(id: CurrencyId) -> NetworkDefaults {
    match id {
        CurrencyId::Ethereum => NetworkDefaults::native("ETH", "https://cloudflare-eth.com/"),
        CurrencyId::Matic => NetworkDefaults::native("MATIC", "https://polygon-rpc.com/").min_confirm(1),
        CurrencyId::Bnb => NetworkDefaults::native("BNB", "https://bsc-dataseed.binance.org/"),
        CurrencyId::Fantom => NetworkDefaults::native("FTM", "https://rpc.ftm.tools/"),
        CurrencyId::Avalanche => {
            NetworkDefaults::native("AVAX", "https://api.avax-test.network/ext/bc/C/rpc/")
        }
        CurrencyId::BobaEth => {
            NetworkDefaults::native("ETH", "https://mainnet.boba.network/").min_confirm(1)
        }
        CurrencyId::Arbitrum => NetworkDefaults::native("ETH", "https://arb1.arbitrum.io/rpc/"),
        CurrencyId::Boba => NetworkDefaults::token(
            "BOBA",
            "https://mainnet.boba.network/",
            "0xa18bF3994C0Cc6E3b63ac420308E5383f53120D7",
            "ETH",
        )
        .min_confirm(1),
        CurrencyId::Chainlink => NetworkDefaults::token(
            "LINK",
            "https://main-light.eth.linkpool.io/",
            "0x514910771AF9Ca656af840dff83E8264EcF986CA",
            "ETH",
        ),
        // Testnet token without a live feed: both prices are fixed stand-ins.
        CurrencyId::Kyve => NetworkDefaults {
            price: PriceStrategy::Fixed(100.0),
            fee: FeeStrategy::Fixed(100.0),
            is_slow: true,
            ..NetworkDefaults::token(
                "KYVE",
                "https://moonbeam-alpha.api.onfinality.io/public",
                "0x3cf97096ccdb7c3a1d741973e351cb97a2ede2c1",
                "DEV",
            )
            .min_confirm(0)
        },
        CurrencyId::Near => NetworkDefaults::native("NEAR", "https://rpc.mainnet.near.org"),
    }
}

/// Apply network defaults to caller settings. Pure.
pub fn resolve_config(
    id: CurrencyId,
    settings: CurrencySettings,
) -> Result<CurrencyConfig, CurrencyError> {
    let defaults = network_defaults(id);

    let provider_url = settings
        .provider_url
        .filter(|u| !u.trim().is_empty())
        .unwrap_or_else(|| defaults.provider_url.to_string());
    Url::parse(&provider_url)
        .map_err(|e| CurrencyError::Config(format!("invalid provider URL {provider_url}: {e}")))?;

    let contract_address = match id.family() {
        CurrencyFamily::Erc20 => settings
            .contract_address
            .or_else(|| defaults.contract_address.map(str::to_string)),
        CurrencyFamily::EvmNative | CurrencyFamily::Near => None,
    };

    Ok(CurrencyConfig {
        id,
        ticker: defaults.ticker,
        wallet: settings.wallet,
        provider_url,
        contract_address,
        min_confirm: settings.min_confirm.unwrap_or(defaults.min_confirm),
        price: settings.price.unwrap_or(defaults.price),
        fee: settings.fee.unwrap_or(defaults.fee),
        bundler_url: settings.bundler_url,
        rpc_timeout: settings.rpc_timeout,
        is_slow: defaults.is_slow,
    })
}

/// Build the adapter for `name`, creating a bundler client from
/// `settings.bundler_url` when one is given.
pub fn build_currency(
    name: &str,
    settings: CurrencySettings,
) -> Result<Arc<dyn Currency>, CurrencyError> {
    let bundler = match settings.bundler_url.as_deref() {
        Some(url) => Some(Arc::new(BundlerClient::new(BundlerClientConfig {
            base_url: url.to_string(),
            ..Default::default()
        })?) as Arc<dyn BundlerApi>),
        None => None,
    };
    build_currency_with(name, settings, bundler)
}

/// Build the adapter for `name` sharing an existing bundler client.
pub fn build_currency_with(
    name: &str,
    settings: CurrencySettings,
    bundler: Option<Arc<dyn BundlerApi>>,
) -> Result<Arc<dyn Currency>, CurrencyError> {
    let id: CurrencyId = name.parse()?;
    let config = resolve_config(id, settings)?;

    info!(
        currency = %id,
        provider_url = %config.provider_url,
        min_confirm = config.min_confirm,
        "Building currency adapter"
    );

    match id.family() {
        CurrencyFamily::EvmNative | CurrencyFamily::Erc20 => {
            let adapter = EvmCurrency::new(config, PriceSource::new(bundler))?;
            Ok(Arc::new(adapter))
        }
        CurrencyFamily::Near => {
            let bundler = bundler.ok_or_else(|| {
                CurrencyError::Config("near requires a bundler URL to resolve its account".into())
            })?;
            Ok(Arc::new(NearCurrency::new(config, bundler)))
        }
    }
}
