//! Settlement Benchmarks — Signing Hot Paths
//!
//! Benchmarks the work done locally for every funding transfer and
//! withdrawal request: NEAR transaction encoding and signing, and the
//! deep hash a withdrawal signature covers.
//!
//! Run with: cargo bench --bench settlement_bench

use alloy::primitives::U256;
use criterion::{Criterion, black_box, criterion_group, criterion_main};

use bundlr_currency::adapters::chain::NearKey;
use bundlr_currency::adapters::chain::near_tx::TransferTx;
use bundlr_currency::usecases::withdrawal::withdrawal_digest;

const SEED_PHRASE: &str =
    "abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon about";

fn transfer(key: &NearKey) -> TransferTx {
    TransferTx {
        signer_id: "alice.near".to_string(),
        public_key: key.public_key(),
        nonce: 42,
        receiver_id: "bundler.near".to_string(),
        block_hash: [7u8; 32],
        deposit: 1_000_000_000_000_000_000_000_000,
    }
}

/// Benchmark borsh encoding of a transfer.
fn bench_near_encode(c: &mut Criterion) {
    let key = NearKey::from_wallet(SEED_PHRASE).expect("valid seed phrase");
    let tx = transfer(&key);

    c.bench_function("near_transfer_borsh", |b| {
        b.iter(|| black_box(&tx).to_borsh());
    });
}

/// Benchmark hash + ed25519 signature + signed envelope.
fn bench_near_sign(c: &mut Criterion) {
    let key = NearKey::from_wallet(SEED_PHRASE).expect("valid seed phrase");

    c.bench_function("near_transfer_sign", |b| {
        b.iter(|| {
            let tx = transfer(&key);
            let signature = key.sign(&tx.hash());
            tx.into_signed_borsh(&signature)
        });
    });
}

/// Benchmark the withdrawal deep hash.
fn bench_withdrawal_digest(c: &mut Criterion) {
    let amount = U256::from(123_456_789_000_000_000u64);

    c.bench_function("withdrawal_deep_hash", |b| {
        b.iter(|| withdrawal_digest(black_box("matic"), black_box(amount), black_box(17)));
    });
}

criterion_group!(benches, bench_near_encode, bench_near_sign, bench_withdrawal_digest);
criterion_main!(benches);
