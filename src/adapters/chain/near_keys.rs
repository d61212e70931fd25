//! NEAR key material.
//!
//! Accepts either an `ed25519:<base58>` secret key (64-byte
//! secret‖public or a bare 32-byte seed) or a BIP-39 seed phrase, which
//! is derived along `m/44'/397'/0'` with SLIP-0010 for ed25519.

use bip39::{Language, Mnemonic};
use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};
use hmac::{Hmac, Mac};
use sha2::Sha512;

use crate::domain::CurrencyError;

type HmacSha512 = Hmac<Sha512>;

/// Hardened derivation path NEAR wallets use for seed phrases.
pub const NEAR_DERIVATION_PATH: [u32; 3] = [44, 397, 0];

const KEY_PREFIX: &str = "ed25519:";
const HARDENED: u32 = 0x8000_0000;

/// An ed25519 key pair in NEAR's encodings.
#[derive(Clone)]
pub struct NearKey {
    signing: SigningKey,
}

impl NearKey {
    /// Parse wallet material: `ed25519:` secret key or seed phrase.
    pub fn from_wallet(secret: &str) -> Result<Self, CurrencyError> {
        let secret = secret.trim();
        if secret.is_empty() {
            return Err(CurrencyError::Signing("wallet key missing".to_string()));
        }
        match secret.strip_prefix(KEY_PREFIX) {
            Some(encoded) => Self::from_secret_key(encoded),
            None => Self::from_seed_phrase(secret),
        }
    }

    fn from_secret_key(encoded: &str) -> Result<Self, CurrencyError> {
        let bytes = bs58::decode(encoded)
            .into_vec()
            .map_err(|e| CurrencyError::Signing(format!("secret key is not base58: {e}")))?;

        let seed: [u8; 32] = bytes
            .get(..32)
            .and_then(|s| s.try_into().ok())
            .ok_or_else(|| CurrencyError::Signing(format!("secret key has {} bytes", bytes.len())))?;
        let signing = SigningKey::from_bytes(&seed);

        match bytes.len() {
            32 => {}
            64 if bytes[32..] == signing.verifying_key().to_bytes() => {}
            64 => {
                return Err(CurrencyError::Signing(
                    "secret key does not match its embedded public key".to_string(),
                ));
            }
            n => return Err(CurrencyError::Signing(format!("secret key has {n} bytes"))),
        }
        Ok(Self { signing })
    }

    fn from_seed_phrase(phrase: &str) -> Result<Self, CurrencyError> {
        let normalized = phrase
            .split_whitespace()
            .map(str::to_lowercase)
            .collect::<Vec<_>>()
            .join(" ");
        let mnemonic = Mnemonic::parse_in(Language::English, &normalized)
            .map_err(|e| CurrencyError::Signing(format!("invalid seed phrase: {e}")))?;
        let seed = mnemonic.to_seed("");
        let key = derive_slip10_ed25519(&seed, &NEAR_DERIVATION_PATH)?;
        Ok(Self {
            signing: SigningKey::from_bytes(&key),
        })
    }

    pub fn public_key(&self) -> [u8; 32] {
        self.signing.verifying_key().to_bytes()
    }

    /// `ed25519:<base58 public key>`, the form NEAR RPC expects.
    pub fn public_key_string(&self) -> String {
        format!("{KEY_PREFIX}{}", bs58::encode(self.public_key()).into_string())
    }

    /// Base58 public key without the curve prefix.
    pub fn public_key_base58(&self) -> String {
        bs58::encode(self.public_key()).into_string()
    }

    /// `ed25519:<base58 secret‖public>`.
    pub fn secret_key_string(&self) -> String {
        let mut bytes = self.signing.to_bytes().to_vec();
        bytes.extend_from_slice(&self.public_key());
        format!("{KEY_PREFIX}{}", bs58::encode(bytes).into_string())
    }

    /// Implicit account id: lowercase hex of the public key.
    pub fn implicit_account(&self) -> String {
        hex::encode(self.public_key())
    }

    pub fn sign(&self, data: &[u8]) -> [u8; 64] {
        self.signing.sign(data).to_bytes()
    }
}

impl std::fmt::Debug for NearKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NearKey")
            .field("public_key", &self.public_key_string())
            .finish()
    }
}

/// Verify an ed25519 signature. Malformed inputs are a mismatch.
pub fn verify_ed25519(public_key: &[u8], data: &[u8], signature: &[u8]) -> bool {
    let Ok(pk) = <[u8; 32]>::try_from(public_key) else {
        return false;
    };
    let Ok(key) = VerifyingKey::from_bytes(&pk) else {
        return false;
    };
    let Ok(sig) = Signature::from_slice(signature) else {
        return false;
    };
    key.verify(data, &sig).is_ok()
}

/// Decode an owner given as raw 32 bytes or as `ed25519:`/bare base58 text.
pub fn decode_owner(owner: &[u8]) -> Result<[u8; 32], CurrencyError> {
    if let Ok(raw) = <[u8; 32]>::try_from(owner) {
        return Ok(raw);
    }
    let text = std::str::from_utf8(owner)
        .map_err(|_| CurrencyError::InvalidAddress("owner is neither 32 bytes nor text".into()))?;
    let encoded = text.trim().trim_start_matches(KEY_PREFIX);
    let bytes = bs58::decode(encoded)
        .into_vec()
        .map_err(|e| CurrencyError::InvalidAddress(format!("owner is not base58: {e}")))?;
    <[u8; 32]>::try_from(bytes.as_slice())
        .map_err(|_| CurrencyError::InvalidAddress(format!("owner has {} bytes", bytes.len())))
}

/// SLIP-0010 ed25519 derivation (hardened indices only).
pub fn derive_slip10_ed25519(seed: &[u8], path: &[u32]) -> Result<[u8; 32], CurrencyError> {
    let (mut key, mut chain_code) = hmac_split(b"ed25519 seed", &[seed])?;

    for &index in path {
        let hardened = (index | HARDENED).to_be_bytes();
        (key, chain_code) = hmac_split(&chain_code, &[&[0u8], &key, &hardened])?;
    }
    Ok(key)
}

fn hmac_split(key: &[u8], parts: &[&[u8]]) -> Result<([u8; 32], [u8; 32]), CurrencyError> {
    let mut mac = HmacSha512::new_from_slice(key)
        .map_err(|e| CurrencyError::Signing(format!("hmac init: {e}")))?;
    for part in parts {
        mac.update(part);
    }
    let out = mac.finalize().into_bytes();

    let mut left = [0u8; 32];
    let mut right = [0u8; 32];
    left.copy_from_slice(&out[..32]);
    right.copy_from_slice(&out[32..]);
    Ok((left, right))
}

#[cfg(test)]
mod tests {
    use super::*;

    const PHRASE: &str =
        "abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon about";

    #[test]
    fn test_slip10_master_vector() {
        // SLIP-0010 test vector 1 for ed25519, chain m.
        let seed = hex::decode("000102030405060708090a0b0c0d0e0f").unwrap();
        let key = derive_slip10_ed25519(&seed, &[]).unwrap();
        assert_eq!(
            hex::encode(key),
            "2b4be7f19ee27bbf30c667b642d5f4aa69fd169872f8fc3059c08ebae2eb19e7"
        );
        let child = derive_slip10_ed25519(&seed, &[0]).unwrap();
        assert_eq!(
            hex::encode(child),
            "68e0fe46dfb67e368c75379acec591dad19df3cde26e63b93a8e704f1dade7a3"
        );
    }

    #[test]
    fn test_seed_phrase_is_deterministic_and_normalized() {
        let a = NearKey::from_wallet(PHRASE).unwrap();
        let b = NearKey::from_wallet(&format!("  {}  ", PHRASE.to_uppercase())).unwrap();
        assert_eq!(a.public_key(), b.public_key());
    }

    #[test]
    fn test_secret_key_string_round_trip() {
        let key = NearKey::from_wallet(PHRASE).unwrap();
        let again = NearKey::from_wallet(&key.secret_key_string()).unwrap();
        assert_eq!(key.public_key(), again.public_key());
        assert!(key.public_key_string().starts_with("ed25519:"));
        assert_eq!(key.implicit_account().len(), 64);
    }

    #[test]
    fn test_mismatched_secret_key_rejected() {
        let key = NearKey::from_wallet(PHRASE).unwrap();
        let mut bytes = bs58::decode(key.secret_key_string().trim_start_matches("ed25519:"))
            .into_vec()
            .unwrap();
        bytes[40] ^= 0xff;
        let tampered = format!("ed25519:{}", bs58::encode(bytes).into_string());
        assert!(matches!(NearKey::from_wallet(&tampered), Err(CurrencyError::Signing(_))));
    }

    #[test]
    fn test_bad_material_is_signing_error() {
        assert!(matches!(NearKey::from_wallet(""), Err(CurrencyError::Signing(_))));
        assert!(matches!(NearKey::from_wallet("not a phrase"), Err(CurrencyError::Signing(_))));
        assert!(matches!(NearKey::from_wallet("ed25519:0OIl"), Err(CurrencyError::Signing(_))));
    }

    #[test]
    fn test_sign_verify() {
        let key = NearKey::from_wallet(PHRASE).unwrap();
        let sig = key.sign(b"payload");
        assert!(verify_ed25519(&key.public_key(), b"payload", &sig));
        assert!(!verify_ed25519(&key.public_key(), b"tampered", &sig));
        assert!(!verify_ed25519(&[1, 2, 3], b"payload", &sig));
    }

    #[test]
    fn test_decode_owner_forms() {
        let key = NearKey::from_wallet(PHRASE).unwrap();
        let pk = key.public_key();
        assert_eq!(decode_owner(&pk).unwrap(), pk);
        assert_eq!(decode_owner(key.public_key_string().as_bytes()).unwrap(), pk);
        assert_eq!(decode_owner(key.public_key_base58().as_bytes()).unwrap(), pk);
    }
}
