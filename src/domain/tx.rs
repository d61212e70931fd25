//! Transaction records shared by every chain family.

use std::fmt;

use alloy::primitives::U256;
use serde::{Deserialize, Serialize};

/// Opaque, chain-defined transaction identifier returned by `send_tx`.
///
/// Callers store and hand it back to `get_tx`; only the adapter that
/// produced it interprets the contents.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TxId(String);

impl TxId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TxId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for TxId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// Status of a transfer as reported by the chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Tx {
    pub from: String,
    pub to: String,
    /// Amount in base units.
    pub amount: U256,
    /// Inclusion height; zero while pending.
    pub block_height: u64,
    pub pending: bool,
    pub confirmed: bool,
}

impl Tx {
    /// Build a record for an included transaction, deriving `confirmed`.
    pub fn included(
        from: String,
        to: String,
        amount: U256,
        block_height: u64,
        current_height: u64,
        min_confirm: u64,
    ) -> Self {
        Self {
            from,
            to,
            amount,
            block_height,
            pending: false,
            confirmed: is_confirmed(current_height, block_height, min_confirm),
        }
    }

    /// Build a record for a transaction the network knows but has not included.
    pub fn pending(from: String, to: String, amount: U256) -> Self {
        Self {
            from,
            to,
            amount,
            block_height: 0,
            pending: true,
            confirmed: false,
        }
    }
}

/// `current - block >= min_confirm`; a block ahead of `current` is never confirmed.
pub fn is_confirmed(current_height: u64, block_height: u64, min_confirm: u64) -> bool {
    current_height
        .checked_sub(block_height)
        .is_some_and(|depth| depth >= min_confirm)
}

/// A signed, ready-to-broadcast transaction.
///
/// Deliberately not `Clone`: `send_tx` takes it by value so a payload
/// cannot be broadcast twice with the same nonce.
#[derive(Debug, PartialEq, Eq)]
pub struct SignedTransaction {
    payload: Vec<u8>,
    tx_id: Option<String>,
    nonce: u64,
}

impl SignedTransaction {
    pub fn new(payload: Vec<u8>, tx_id: Option<String>, nonce: u64) -> Self {
        Self {
            payload,
            tx_id,
            nonce,
        }
    }

    /// Chain-assigned id known before broadcast, if the chain has one.
    pub fn tx_id(&self) -> Option<&str> {
        self.tx_id.as_deref()
    }

    /// Account sequence/nonce the payload was signed with.
    pub fn nonce(&self) -> u64 {
        self.nonce
    }

    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    pub fn into_payload(self) -> Vec<u8> {
        self.payload
    }
}

/// Where a broadcast transaction stands in the confirmation lifecycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfirmationState {
    /// Broadcast, but the network does not report it yet.
    Submitted,
    /// Known to the network, not yet deep enough.
    Pending(Tx),
    /// At least `min_confirm` blocks deep. Terminal.
    Confirmed(Tx),
    /// Reverted or rejected. Terminal.
    Failed(String),
}

impl ConfirmationState {
    pub fn from_tx(tx: Tx) -> Self {
        if tx.confirmed {
            Self::Confirmed(tx)
        } else {
            Self::Pending(tx)
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Confirmed(_) | Self::Failed(_))
    }
}
