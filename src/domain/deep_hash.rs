//! Deep hash: the tagged SHA-384 tree hash bundler requests are signed over.
//!
//! A blob hashes as `H(H("blob" ‖ len) ‖ H(bytes))`. A list folds its
//! items into an accumulator seeded with `H("list" ‖ count)`:
//! `acc = H(acc ‖ deep_hash(item))`. Lengths are decimal ASCII.

use sha2::{Digest, Sha384};

/// A node of the structure being hashed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeepHashItem {
    Blob(Vec<u8>),
    List(Vec<DeepHashItem>),
}

impl DeepHashItem {
    pub fn blob(bytes: impl Into<Vec<u8>>) -> Self {
        Self::Blob(bytes.into())
    }
}

impl From<&str> for DeepHashItem {
    fn from(value: &str) -> Self {
        Self::Blob(value.as_bytes().to_vec())
    }
}

pub fn deep_hash(item: &DeepHashItem) -> [u8; 48] {
    match item {
        DeepHashItem::Blob(bytes) => {
            let tag = sha384(&[b"blob", bytes.len().to_string().as_bytes()]);
            let data = sha384(&[bytes]);
            sha384(&[&tag, &data])
        }
        DeepHashItem::List(items) => {
            let seed = sha384(&[b"list", items.len().to_string().as_bytes()]);
            items
                .iter()
                .fold(seed, |acc, item| sha384(&[&acc, &deep_hash(item)]))
        }
    }
}

fn sha384(parts: &[&[u8]]) -> [u8; 48] {
    let mut hasher = Sha384::new();
    for part in parts {
        hasher.update(part);
    }
    hasher.finalize().into()
}
