//! Ports Layer - Hexagonal Architecture Boundaries
//!
//! Defines the interfaces (traits) that the use cases require from the
//! outside world. Adapters implement these traits.
//!
//! Port categories:
//! - `Currency`: uniform chain adapter contract
//! - `BundlerApi`: bundler balance, funding, lookup and withdrawal routes
//! - `NearRpc`: NEAR JSON-RPC calls behind the NEAR adapter

pub mod bundler;
pub mod currency;
pub mod near_rpc;

pub use bundler::{BundlerApi, WithdrawalPayload, WithdrawalReceipt};
pub use currency::Currency;
pub use near_rpc::{AccessKeyView, BlockRef, NearRpc, NearTxOutcome};
