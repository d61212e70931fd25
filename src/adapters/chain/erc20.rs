//! ERC-20 `transfer` calldata.
//!
//! Hand-encoded the same way the rest of the chain layer builds raw
//! calls: 4-byte selector from `keccak256(signature)` followed by
//! 32-byte words.

use alloy::primitives::{Address, Bytes, U256, keccak256};

const TRANSFER_SIGNATURE: &[u8] = b"transfer(address,uint256)";

/// Selector of `transfer(address,uint256)` (`0xa9059cbb`).
pub fn transfer_selector() -> [u8; 4] {
    let hash = keccak256(TRANSFER_SIGNATURE);
    [hash[0], hash[1], hash[2], hash[3]]
}

/// Calldata for `transfer(to, amount)`.
pub fn encode_transfer(to: Address, amount: U256) -> Bytes {
    let mut data = Vec::with_capacity(4 + 64);
    data.extend_from_slice(&transfer_selector());
    data.extend_from_slice(&[0u8; 12]);
    data.extend_from_slice(to.as_slice());
    data.extend_from_slice(&amount.to_be_bytes::<32>());
    Bytes::from(data)
}

/// Recipient and amount of a `transfer` call, `None` for any other calldata.
pub fn decode_transfer(input: &[u8]) -> Option<(Address, U256)> {
    if input.len() != 4 + 64 || input[..4] != transfer_selector() {
        return None;
    }
    let to_word = &input[4..36];
    if to_word[..12].iter().any(|b| *b != 0) {
        return None;
    }
    let to = Address::from_slice(&to_word[12..]);
    let amount = U256::from_be_slice(&input[36..68]);
    Some((to, amount))
}
