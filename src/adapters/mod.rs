//! Adapters Layer - Hexagonal Architecture Outer Ring
//!
//! Implements the port traits defined in `crate::ports` with concrete
//! external dependencies (chain RPC, bundler HTTP, Prometheus).
//!
//! Adapter categories:
//! - `chain`: EVM (alloy-rs) and NEAR currency adapters
//! - `bundler`: bundler REST client
//! - `registry`: identifier → adapter construction with network defaults
//! - `metrics`: Prometheus settlement metrics

pub mod bundler;
pub mod chain;
pub mod metrics;
pub mod registry;

pub use registry::{build_currency, build_currency_with};
