//! Gas Oracle - Legacy Gas-Price Fee Estimation for EVM Adapters
//!
//! Queries the network gas price through the adapter's lazy provider
//! and turns it into a transfer fee. Native transfers cost a fixed
//! 21k gas; token transfers are estimated against the contract and
//! their fee is re-expressed in token base units through USD quotes of
//! the gas asset and the token.

use std::sync::Arc;
use std::time::Duration;

use alloy::primitives::U256;
use rust_decimal::Decimal;
use rust_decimal::prelude::*;
use tracing::{debug, instrument};

use super::evm::map_rpc_error;
use super::provider::{EvmProvider, LazyProvider, rpc_call};
use crate::domain::CurrencyError;
use crate::domain::units::{from_decimal, to_decimal};

/// Gas used by a plain value transfer.
pub const NATIVE_TRANSFER_GAS: u64 = 21_000;

/// Gas budget for an ERC-20 `transfer` when no recipient is known to estimate against.
pub const TOKEN_TRANSFER_GAS: u64 = 65_000;

/// Gas price source for one EVM adapter.
pub struct GasOracle {
    provider: Arc<LazyProvider<EvmProvider>>,
    rpc_timeout: Duration,
}

impl GasOracle {
    pub fn new(provider: Arc<LazyProvider<EvmProvider>>, rpc_timeout: Duration) -> Self {
        Self {
            provider,
            rpc_timeout,
        }
    }

    /// Current gas price in wei.
    #[instrument(skip(self))]
    pub async fn gas_price(&self) -> Result<U256, CurrencyError> {
        let provider = self.provider.get().await?;
        let wei = rpc_call("eth_gasPrice", self.rpc_timeout, async {
            provider.get_gas_price().await.map_err(map_rpc_error)
        })
        .await?;

        debug!(gas_price_wei = %wei, "Gas price updated");
        Ok(U256::from(wei))
    }

    /// Fee in wei for `gas_limit` at the current gas price.
    pub async fn fee_for(&self, gas_limit: u64) -> Result<U256, CurrencyError> {
        Ok(self.gas_price().await? * U256::from(gas_limit))
    }
}

/// Gas price that makes `gas_limit` cost exactly `fee` (floored, at least 1 wei).
pub fn gas_price_for_fee(fee: U256, gas_limit: u64) -> U256 {
    let limit = U256::from(gas_limit.max(1));
    (fee / limit).max(U256::from(1u64))
}

/// Re-express a fee paid in the gas asset (wei) in token base units.
///
/// `fee_wei / 1e18 * gas_asset_usd / token_usd * 10^token_decimals`, rounded up.
pub fn token_fee(
    fee_wei: U256,
    gas_asset_usd: f64,
    token_usd: f64,
    token_decimals: u8,
) -> Result<U256, CurrencyError> {
    let gas_usd = positive_price("gas asset", gas_asset_usd)?;
    let token = positive_price("token", token_usd)?;

    let wei = to_decimal(fee_wei)?;
    let token_scale = Decimal::from_i128_with_scale(10i128.pow(u32::from(token_decimals)), 0);
    let ether = Decimal::from_i128_with_scale(10i128.pow(18), 0);

    let fee_usd = wei
        .checked_mul(gas_usd)
        .and_then(|v| v.checked_div(ether))
        .ok_or_else(|| CurrencyError::InvalidAmount("gas fee out of range".to_string()))?;
    let fee_tokens = fee_usd
        .checked_div(token)
        .and_then(|v| v.checked_mul(token_scale))
        .ok_or_else(|| CurrencyError::InvalidAmount("token fee out of range".to_string()))?;

    from_decimal(fee_tokens)
}

fn positive_price(label: &str, price: f64) -> Result<Decimal, CurrencyError> {
    Decimal::from_f64(price)
        .filter(|p| p.is_sign_positive() && !p.is_zero())
        .ok_or_else(|| CurrencyError::Config(format!("{label} price must be positive, got {price}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gas_price_for_fee() {
        let fee = U256::from(21_000u64 * 30_000_000_000u64);
        assert_eq!(
            gas_price_for_fee(fee, NATIVE_TRANSFER_GAS),
            U256::from(30_000_000_000u64)
        );
        assert_eq!(gas_price_for_fee(U256::ZERO, NATIVE_TRANSFER_GAS), U256::from(1u64));
    }

    #[test]
    fn test_token_fee_same_price_same_decimals() {
        // Equal prices and 18 decimals: fee in token units equals fee in wei.
        let fee = U256::from(1_000_000_000_000u64);
        assert_eq!(token_fee(fee, 100.0, 100.0, 18).unwrap(), fee);
    }

    #[test]
    fn test_token_fee_scales_with_price_ratio() {
        // Gas asset worth 2000 USD, token worth 1 USD, token has 6 decimals.
        // 0.001 ETH fee = 2 USD = 2 tokens = 2_000_000 base units.
        let fee = U256::from(1_000_000_000_000_000u64);
        assert_eq!(token_fee(fee, 2000.0, 1.0, 6).unwrap(), U256::from(2_000_000u64));
    }

    #[test]
    fn test_token_fee_rejects_zero_price() {
        assert!(token_fee(U256::from(1u64), 0.0, 1.0, 18).is_err());
        assert!(token_fee(U256::from(1u64), 1.0, -3.0, 18).is_err());
    }
}
