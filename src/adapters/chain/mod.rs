//! Chain Adapters - Per-Network Currency Implementations
//!
//! Provides the `Currency` port for each supported chain family:
//! - EVM networks and ERC-20 tokens via alloy-rs 0.9 (`evm`, `erc20`, `gas`)
//! - NEAR via ed25519 keys and JSON-RPC (`near`, `near_keys`, `near_tx`, `near_rpc`)
//! - Lazy, once-initialized RPC handles and call timeouts (`provider`)
//! - Strategy-driven USD pricing (`pricing`)

pub mod erc20;
pub mod evm;
pub mod gas;
pub mod near;
pub mod near_keys;
pub mod near_rpc;
pub mod near_tx;
pub mod pricing;
pub mod provider;

pub use evm::EvmCurrency;
pub use gas::GasOracle;
pub use near::NearCurrency;
pub use near_keys::NearKey;
pub use near_rpc::NearJsonRpc;
pub use pricing::PriceSource;
pub use provider::LazyProvider;
