//! NEAR Adapter Tests - Account Resolution, Nonces and Status Mapping
//!
//! Runs `NearCurrency` against mockall doubles of the NEAR RPC and the
//! bundler, so nothing here touches a network.

use std::sync::Arc;

use alloy::primitives::U256;
use async_trait::async_trait;
use mockall::mock;

use bundlr_currency::adapters::chain::NearCurrency;
use bundlr_currency::adapters::chain::near::{TRANSFER_GAS_UNITS, YOCTO_NEAR};
use bundlr_currency::adapters::registry::resolve_config;
use bundlr_currency::domain::{
  CurrencyError, CurrencyId, CurrencySettings, TxId, WalletMaterial,
};
use bundlr_currency::ports::{
  AccessKeyView, BlockRef, BundlerApi, Currency, NearRpc, NearTxOutcome, WithdrawalPayload,
  WithdrawalReceipt,
};

// ---- Mock Definitions ----

mock! {
  pub Rpc {}

  #[async_trait]
  impl NearRpc for Rpc {
    async fn latest_height(&self) -> Result<u64, CurrencyError>;
    async fn gas_price(&self) -> Result<u128, CurrencyError>;
    async fn view_access_key(
      &self,
      account_id: &str,
      public_key: &str,
    ) -> Result<AccessKeyView, CurrencyError>;
    async fn broadcast_tx(&self, signed_tx: &[u8]) -> Result<String, CurrencyError>;
    async fn tx_status(&self, hash: &str, sender_id: &str) -> Result<NearTxOutcome, CurrencyError>;
    async fn block_height(&self, block: BlockRef) -> Result<u64, CurrencyError>;
  }
}

mock! {
  pub Bundler {}

  #[async_trait]
  impl BundlerApi for Bundler {
    async fn balance(&self, currency: CurrencyId, address: &str) -> Result<U256, CurrencyError>;
    async fn receiving_address(&self, currency: CurrencyId) -> Result<String, CurrencyError>;
    async fn notify_funding(&self, currency: CurrencyId, tx_id: &TxId) -> Result<(), CurrencyError>;
    async fn lookup_address(
      &self,
      currency: CurrencyId,
      public_key: &str,
    ) -> Result<Option<String>, CurrencyError>;
    async fn price(&self, ticker: &str) -> Result<f64, CurrencyError>;
    async fn withdrawal_nonce(&self, currency: CurrencyId, address: &str) -> Result<u64, CurrencyError>;
    async fn withdraw(&self, payload: &WithdrawalPayload) -> Result<WithdrawalReceipt, CurrencyError>;
  }
}

const SEED_PHRASE: &str =
  "abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon about";

fn adapter(rpc: MockRpc, bundler: MockBundler) -> NearCurrency {
  let settings = CurrencySettings::new(WalletMaterial::new(SEED_PHRASE));
  let config = resolve_config(CurrencyId::Near, settings).unwrap();
  NearCurrency::with_rpc(config, Arc::new(rpc), Arc::new(bundler))
}

fn named_account_bundler() -> MockBundler {
  let mut bundler = MockBundler::new();
  bundler
    .expect_lookup_address()
    .returning(|_, _| Ok(Some("alice.near".to_string())));
  bundler
}

fn access_key(nonce: u64) -> AccessKeyView {
  AccessKeyView {
    nonce,
    block_hash: [9u8; 32],
  }
}

// ---- Account resolution ----

#[tokio::test]
async fn test_create_tx_before_ready_needs_address() {
  let near = adapter(MockRpc::new(), MockBundler::new());

  let err = near
    .create_tx(U256::from(1u64), "bob.near", None)
    .await
    .unwrap_err();

  assert!(matches!(err, CurrencyError::InsufficientAddress));
  assert!(near.address().is_none());
}

#[tokio::test]
async fn test_ready_resolves_named_account() {
  let mut bundler = MockBundler::new();
  bundler
    .expect_lookup_address()
    .withf(|c, key| *c == CurrencyId::Near && !key.is_empty() && !key.contains('='))
    .times(1)
    .returning(|_, _| Ok(Some("alice.near".to_string())));
  let near = adapter(MockRpc::new(), bundler);

  near.ready().await.unwrap();

  assert_eq!(near.address().as_deref(), Some("alice.near"));
  assert!(near.last_ready_error().is_none());
}

#[tokio::test]
async fn test_ready_without_mapping_uses_implicit_account() {
  let mut bundler = MockBundler::new();
  bundler.expect_lookup_address().returning(|_, _| Ok(None));
  let near = adapter(MockRpc::new(), bundler);

  near.ready().await.unwrap();

  let address = near.address().unwrap();
  assert_eq!(address.len(), 64);
  assert_eq!(address, near.owner_to_address(&near.get_public_key().unwrap()).unwrap());
}

#[tokio::test]
async fn test_failed_lookup_keeps_previous_address() {
  let mut bundler = MockBundler::new();
  let mut seq = mockall::Sequence::new();
  bundler
    .expect_lookup_address()
    .times(1)
    .in_sequence(&mut seq)
    .returning(|_, _| Ok(Some("alice.near".to_string())));
  bundler
    .expect_lookup_address()
    .times(1)
    .in_sequence(&mut seq)
    .returning(|_, _| Err(CurrencyError::Bundler("connection reset".into())));
  let near = adapter(MockRpc::new(), bundler);

  near.ready().await.unwrap();
  near.ready().await.unwrap();

  assert_eq!(near.address().as_deref(), Some("alice.near"));
  assert!(near.last_ready_error().unwrap().contains("connection reset"));
}

// ---- Fees and units ----

#[tokio::test]
async fn test_fee_is_gas_price_times_transfer_gas() {
  let mut rpc = MockRpc::new();
  rpc.expect_gas_price().returning(|| Ok(100_000_000));
  let near = adapter(rpc, MockBundler::new());

  let fee = near.get_fee(U256::from(1u64), None).await.unwrap();

  assert_eq!(fee, U256::from(100_000_000u128 * TRANSFER_GAS_UNITS));
}

#[test]
fn test_one_near_is_ten_to_the_24() {
  let one = YOCTO_NEAR.to_base_units("1").unwrap();
  assert_eq!(one.to_string(), "1000000000000000000000000");
}

// ---- Nonces ----

#[tokio::test]
async fn test_concurrent_transfers_get_distinct_nonces() {
  let mut rpc = MockRpc::new();
  rpc
    .expect_view_access_key()
    .withf(|account, _| account == "alice.near")
    .times(2)
    .returning(|_, _| Ok(access_key(10)));
  let near = Arc::new(adapter(rpc, named_account_bundler()));
  near.ready().await.unwrap();

  let (a, b) = tokio::join!(
    near.create_tx(U256::from(1u64), "bob.near", None),
    near.create_tx(U256::from(2u64), "bob.near", None),
  );

  let mut nonces = vec![a.unwrap().nonce(), b.unwrap().nonce()];
  nonces.sort_unstable();
  assert_eq!(nonces, vec![11, 12]);
}

#[tokio::test]
async fn test_stale_nonce_is_rejected() {
  let mut rpc = MockRpc::new();
  rpc.expect_view_access_key().returning(|_, _| Ok(access_key(3)));
  rpc
    .expect_broadcast_tx()
    .times(1)
    .returning(|_| Err(CurrencyError::Rejected("InvalidNonce { tx_nonce: 4, ak_nonce: 7 }".into())));
  let near = adapter(rpc, named_account_bundler());
  near.ready().await.unwrap();

  let tx = near.create_tx(U256::from(1u64), "bob.near", None).await.unwrap();
  assert_eq!(tx.nonce(), 4);
  let err = near.send_tx(tx).await.unwrap_err();

  assert!(matches!(err, CurrencyError::Rejected(_)));
}

#[tokio::test]
async fn test_ambiguous_broadcast_failure_keeps_nonce_reserved() {
  let mut rpc = MockRpc::new();
  rpc.expect_view_access_key().returning(|_, _| Ok(access_key(20)));
  rpc
    .expect_broadcast_tx()
    .times(1)
    .returning(|_| Err(CurrencyError::Rpc("broadcast_tx_commit: connection reset".into())));
  let near = adapter(rpc, named_account_bundler());
  near.ready().await.unwrap();

  let first = near.create_tx(U256::from(1u64), "bob.near", None).await.unwrap();
  assert_eq!(first.nonce(), 21);
  let err = near.send_tx(first).await.unwrap_err();
  assert!(matches!(err, CurrencyError::Rpc(_)));

  let second = near.create_tx(U256::from(1u64), "bob.near", None).await.unwrap();
  assert_eq!(second.nonce(), 22);
}

#[tokio::test]
async fn test_fee_refusal_returns_nonce() {
  let mut rpc = MockRpc::new();
  rpc.expect_view_access_key().returning(|_, _| Ok(access_key(20)));
  rpc
    .expect_broadcast_tx()
    .times(1)
    .returning(|_| Err(CurrencyError::FeeTooLow("gas price below minimum".into())));
  let near = adapter(rpc, named_account_bundler());
  near.ready().await.unwrap();

  let first = near.create_tx(U256::from(1u64), "bob.near", None).await.unwrap();
  near.send_tx(first).await.unwrap_err();

  let second = near.create_tx(U256::from(1u64), "bob.near", None).await.unwrap();
  assert_eq!(second.nonce(), 21);
}

#[tokio::test]
async fn test_broadcast_returns_sender_scoped_id() {
  let mut rpc = MockRpc::new();
  rpc.expect_view_access_key().returning(|_, _| Ok(access_key(0)));
  rpc
    .expect_broadcast_tx()
    .withf(|payload| !payload.is_empty())
    .returning(|_| Ok("9Hk2fq7".to_string()));
  let near = adapter(rpc, named_account_bundler());
  near.ready().await.unwrap();

  let tx = near.create_tx(U256::from(5u64), "bob.near", None).await.unwrap();
  let id = near.send_tx(tx).await.unwrap();

  assert_eq!(id, TxId::new("alice.near:9Hk2fq7"));
}

// ---- Status ----

fn outcome(failure: Option<&str>) -> NearTxOutcome {
  NearTxOutcome {
    signer_id: "alice.near".into(),
    receiver_id: "bob.near".into(),
    block_hash: "BLOCK".into(),
    deposit: 5,
    failure: failure.map(str::to_string),
  }
}

#[tokio::test]
async fn test_failed_receipt_is_terminal() {
  let mut rpc = MockRpc::new();
  rpc
    .expect_tx_status()
    .withf(|hash, sender| hash == "9Hk2fq7" && sender == "alice.near")
    .returning(|_, _| Ok(outcome(Some("LackBalanceForState"))));
  let near = adapter(rpc, MockBundler::new());

  let err = near.get_tx(&TxId::new("alice.near:9Hk2fq7")).await.unwrap_err();

  assert!(matches!(err, CurrencyError::TransactionFailed { reason, .. } if reason == "LackBalanceForState"));
}

#[tokio::test]
async fn test_included_transfer_confirms_at_depth() {
  let mut rpc = MockRpc::new();
  rpc.expect_tx_status().returning(|_, _| Ok(outcome(None)));
  rpc.expect_block_height().returning(|block| match block {
    BlockRef::Hash(_) => Ok(100),
    BlockRef::Final => Ok(105),
  });
  let near = adapter(rpc, MockBundler::new());

  let tx = near.get_tx(&TxId::new("alice.near:9Hk2fq7")).await.unwrap();

  assert_eq!(tx.from, "alice.near");
  assert_eq!(tx.to, "bob.near");
  assert_eq!(tx.amount, U256::from(5u64));
  assert_eq!(tx.block_height, 100);
  assert!(tx.confirmed);
}

#[tokio::test]
async fn test_unknown_transaction_not_found() {
  let mut rpc = MockRpc::new();
  rpc
    .expect_tx_status()
    .returning(|hash, _| Err(CurrencyError::TransactionNotFound(hash.to_string())));
  let near = adapter(rpc, MockBundler::new());

  let err = near.get_tx(&TxId::new("alice.near:missing")).await.unwrap_err();
  assert!(matches!(err, CurrencyError::TransactionNotFound(_)));
}

#[tokio::test]
async fn test_malformed_id_rejected_without_rpc() {
  let near = adapter(MockRpc::new(), MockBundler::new());

  let err = near.get_tx(&TxId::new("no-separator")).await.unwrap_err();
  assert!(matches!(err, CurrencyError::InvalidTxId(_)));
}

// ---- Keys ----

#[test]
fn test_sign_and_verify_with_adapter_key() {
  let near = adapter(MockRpc::new(), MockBundler::new());
  let public_key = near.get_public_key().unwrap();
  let signature = near.sign(b"withdrawal").unwrap();

  assert_eq!(public_key.len(), 32);
  assert!(near.verify(&public_key, b"withdrawal", &signature));
  assert!(!near.verify(&public_key, b"tampered", &signature));
}
