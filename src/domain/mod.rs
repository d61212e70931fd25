//! Domain layer - currency types, units, transaction records and errors.
//!
//! Pure types with no network access (hexagonal architecture inner ring).
//! Ports and adapters build on these; nothing here performs I/O.

pub mod currency;
pub mod deep_hash;
pub mod error;
pub mod nonce;
pub mod tx;
pub mod units;

// Re-export core types for convenience
pub use currency::{
    CurrencyConfig, CurrencyFamily, CurrencyId, CurrencySettings, FeeStrategy, PriceStrategy,
    WalletMaterial,
};
pub use deep_hash::{DeepHashItem, deep_hash};
pub use error::CurrencyError;
pub use nonce::NonceTracker;
pub use tx::{ConfirmationState, SignedTransaction, Tx, TxId, is_confirmed};
pub use units::BaseUnit;
