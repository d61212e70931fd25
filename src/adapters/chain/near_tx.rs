//! NEAR transfer transactions in borsh wire form.
//!
//! Only the shapes a funding transfer needs are encoded: a transaction
//! with a single `Transfer` action, and its signed envelope. Layout
//! follows borsh: little-endian integers, `u32`-length-prefixed strings
//! and vectors, one tag byte per enum.

use sha2::{Digest, Sha256};

const KEY_TYPE_ED25519: u8 = 0;
const ACTION_TRANSFER: u8 = 3;

/// Unsigned transfer transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferTx {
    pub signer_id: String,
    pub public_key: [u8; 32],
    pub nonce: u64,
    pub receiver_id: String,
    pub block_hash: [u8; 32],
    /// Attached deposit, yoctoNEAR.
    pub deposit: u128,
}

impl TransferTx {
    pub fn to_borsh(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(
            4 + self.signer_id.len() + 33 + 8 + 4 + self.receiver_id.len() + 32 + 4 + 17,
        );
        write_string(&mut out, &self.signer_id);
        out.push(KEY_TYPE_ED25519);
        out.extend_from_slice(&self.public_key);
        out.extend_from_slice(&self.nonce.to_le_bytes());
        write_string(&mut out, &self.receiver_id);
        out.extend_from_slice(&self.block_hash);
        out.extend_from_slice(&1u32.to_le_bytes());
        out.push(ACTION_TRANSFER);
        out.extend_from_slice(&self.deposit.to_le_bytes());
        out
    }

    /// SHA-256 of the borsh encoding; both the signing digest and the tx hash.
    pub fn hash(&self) -> [u8; 32] {
        Sha256::digest(self.to_borsh()).into()
    }

    /// Borsh-encoded `SignedTransaction` carrying `signature` over [`Self::hash`].
    pub fn into_signed_borsh(self, signature: &[u8; 64]) -> Vec<u8> {
        let mut out = self.to_borsh();
        out.push(KEY_TYPE_ED25519);
        out.extend_from_slice(signature);
        out
    }
}

fn write_string(out: &mut Vec<u8>, value: &str) {
    // Account ids are at most 64 bytes.
    out.extend_from_slice(&(value.len() as u32).to_le_bytes());
    out.extend_from_slice(value.as_bytes());
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> TransferTx {
        TransferTx {
            signer_id: "alice.near".into(),
            public_key: [7u8; 32],
            nonce: 42,
            receiver_id: "bob.near".into(),
            block_hash: [9u8; 32],
            deposit: 1_000_000_000_000_000_000_000_000,
        }
    }

    #[test]
    fn test_borsh_layout() {
        let bytes = sample().to_borsh();
        assert_eq!(&bytes[..4], &10u32.to_le_bytes());
        assert_eq!(&bytes[4..14], b"alice.near");
        assert_eq!(bytes[14], 0);
        assert_eq!(&bytes[15..47], &[7u8; 32]);
        assert_eq!(&bytes[47..55], &42u64.to_le_bytes());
        assert_eq!(&bytes[55..59], &8u32.to_le_bytes());
        assert_eq!(&bytes[59..67], b"bob.near");
        assert_eq!(&bytes[67..99], &[9u8; 32]);
        assert_eq!(&bytes[99..103], &1u32.to_le_bytes());
        assert_eq!(bytes[103], 3);
        assert_eq!(&bytes[104..], &10u128.pow(24).to_le_bytes());
    }

    #[test]
    fn test_signed_envelope_appends_signature() {
        let tx = sample();
        let unsigned = tx.to_borsh();
        let signed = tx.into_signed_borsh(&[5u8; 64]);
        assert_eq!(&signed[..unsigned.len()], unsigned.as_slice());
        assert_eq!(signed[unsigned.len()], 0);
        assert_eq!(signed.len(), unsigned.len() + 65);
    }

    #[test]
    fn test_hash_changes_with_nonce() {
        let a = sample();
        let mut b = sample();
        b.nonce += 1;
        assert_ne!(a.hash(), b.hash());
    }
}
