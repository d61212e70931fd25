//! Bundler Adapters - Settlement Service REST Client
//!
//! Implements the `BundlerApi` port over the bundler's HTTP routes.

pub mod client;
pub mod types;

pub use client::{BundlerClient, BundlerClientConfig};
