//! Currency error taxonomy.
//!
//! Every adapter, the registry and both coordinators report failures
//! through [`CurrencyError`]. Variants map one-to-one onto the recovery
//! a caller should attempt (retry, call `ready()`, build a new
//! transaction, give up).

use std::time::Duration;

/// Errors raised by currency adapters and the settlement coordinators.
#[derive(Debug, thiserror::Error)]
pub enum CurrencyError {
    /// Unknown identifier. Fatal; the caller must not retry.
    #[error("unknown/unsupported currency {0}")]
    UnsupportedCurrency(String),

    /// Wallet material is missing or malformed. Fatal.
    #[error("signing failed: {0}")]
    Signing(String),

    /// An operation needed the on-chain address before `ready()` resolved it.
    #[error("address is undefined - missing wallet or ready() has not completed")]
    InsufficientAddress,

    /// The network has no record of the transaction (yet).
    #[error("transaction {0} not found")]
    TransactionNotFound(String),

    /// The network reports the transaction as reverted/failed. Terminal.
    #[error("transaction {id} failed: {reason}")]
    TransactionFailed { id: String, reason: String },

    /// The bundler refused the withdrawal (typically insufficient balance).
    #[error("withdrawal rejected: {0}")]
    WithdrawalRejected(String),

    /// A network round trip or a confirmation wait exceeded its bound.
    #[error("{operation} timed out after {elapsed:?}")]
    Timeout {
        operation: &'static str,
        elapsed: Duration,
    },

    /// The network refused a broadcast (stale nonce, duplicate, bad signature).
    #[error("transaction rejected by network: {0}")]
    Rejected(String),

    /// The network refused a broadcast because the fee was too low.
    #[error("fee too low: {0}")]
    FeeTooLow(String),

    #[error("invalid address {0}")]
    InvalidAddress(String),

    #[error("malformed transaction id {0}")]
    InvalidTxId(String),

    #[error("invalid amount: {0}")]
    InvalidAmount(String),

    #[error("invalid configuration: {0}")]
    Config(String),

    /// Chain RPC failure that is neither a rejection nor a missing record.
    #[error("rpc error: {0}")]
    Rpc(String),

    /// Bundler HTTP boundary failure.
    #[error("bundler error: {0}")]
    Bundler(String),

    /// The caller cancelled a confirmation wait.
    #[error("operation cancelled")]
    Cancelled,
}

impl CurrencyError {
    /// Whether the same call may succeed if repeated later.
    pub fn is_retriable(&self) -> bool {
        matches!(
            self,
            Self::TransactionNotFound(_)
                | Self::InsufficientAddress
                | Self::Timeout { .. }
                | Self::Rpc(_)
                | Self::Bundler(_)
        )
    }

    /// Whether the error ends the life of a transaction.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::TransactionFailed { .. } | Self::Rejected(_) | Self::WithdrawalRejected(_)
        )
    }
}
