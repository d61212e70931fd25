//! Confirmation Tracker - Broadcast to Finality
//!
//! Drives a broadcast transaction through
//! `Submitted → Pending → Confirmed` (or `Failed`) by polling the
//! adapter's `get_tx`. Confirmation is latched per identifier: once a
//! transaction has been seen at depth, later reports cannot demote it.
//!
//! Polling cadence and the overall deadline are caller configuration;
//! slow-finality networks poll less often. A wait stops at the next
//! poll boundary when the shutdown channel fires (or its sender is
//! dropped). Transient status errors never end a wait early.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::broadcast;
use tokio::time::{Instant, sleep};
use tracing::{debug, info, instrument, warn};

use crate::domain::{ConfirmationState, CurrencyError, Tx, TxId};
use crate::ports::Currency;

/// Polling cadence and maximum wait.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollConfig {
  pub interval: Duration,
  pub timeout: Duration,
}

/// Interval multiplier for networks flagged slow.
const SLOW_POLL_FACTOR: u32 = 3;

/// Confirmed transactions remembered per tracker.
const LATCH_CAPACITY: usize = 1024;

impl PollConfig {
  /// Cadence for a network, backing off when its finality is slow.
  pub fn for_network(self, slow: bool) -> Self {
    if !slow {
      return self;
    }
    Self {
      interval: self.interval.saturating_mul(SLOW_POLL_FACTOR).min(self.timeout),
      timeout: self.timeout,
    }
  }
}

impl Default for PollConfig {
  fn default() -> Self {
    Self {
      interval: Duration::from_secs(5),
      timeout: Duration::from_secs(600),
    }
  }
}

/// Insertion-ordered set of confirmed transactions; the oldest entry is
/// evicted once `capacity` is reached.
struct ConfirmedLatch {
  entries: HashMap<TxId, Tx>,
  order: VecDeque<TxId>,
  capacity: usize,
}

impl ConfirmedLatch {
  fn with_capacity(capacity: usize) -> Self {
    Self {
      entries: HashMap::new(),
      order: VecDeque::new(),
      capacity: capacity.max(1),
    }
  }

  fn get(&self, id: &TxId) -> Option<Tx> {
    self.entries.get(id).cloned()
  }

  fn insert(&mut self, id: &TxId, tx: &Tx) {
    if self.entries.insert(id.clone(), tx.clone()).is_some() {
      return;
    }
    self.order.push_back(id.clone());
    while self.order.len() > self.capacity {
      if let Some(oldest) = self.order.pop_front() {
        self.entries.remove(&oldest);
      }
    }
  }

  #[cfg(test)]
  fn len(&self) -> usize {
    self.entries.len()
  }
}

/// Confirmation state queries for one adapter.
pub struct ConfirmationTracker<C: ?Sized + Currency> {
  currency: Arc<C>,
  config: PollConfig,
  confirmed: Mutex<ConfirmedLatch>,
}

impl<C: ?Sized + Currency> ConfirmationTracker<C> {
  pub fn new(currency: Arc<C>, config: PollConfig) -> Self {
    let config = config.for_network(currency.is_slow());
    Self {
      currency,
      config,
      confirmed: Mutex::new(ConfirmedLatch::with_capacity(LATCH_CAPACITY)),
    }
  }

  fn latched(&self, id: &TxId) -> Option<Tx> {
    match self.confirmed.lock() {
      Ok(latch) => latch.get(id),
      Err(poisoned) => poisoned.into_inner().get(id),
    }
  }

  fn latch(&self, id: &TxId, tx: &Tx) {
    match self.confirmed.lock() {
      Ok(mut latch) => latch.insert(id, tx),
      Err(poisoned) => poisoned.into_inner().insert(id, tx),
    }
  }

  /// One status query.
  ///
  /// `TransactionNotFound` means the network has not picked the
  /// transaction up yet and maps to `Submitted`; a revert maps to
  /// `Failed`. Any other error is returned.
  pub async fn check(&self, id: &TxId) -> Result<ConfirmationState, CurrencyError> {
    if let Some(tx) = self.latched(id) {
      return Ok(ConfirmationState::Confirmed(tx));
    }

    match self.currency.get_tx(id).await {
      Ok(tx) => {
        let state = ConfirmationState::from_tx(tx);
        if let ConfirmationState::Confirmed(tx) = &state {
          self.latch(id, tx);
        }
        Ok(state)
      }
      Err(CurrencyError::TransactionNotFound(_)) => Ok(ConfirmationState::Submitted),
      Err(CurrencyError::TransactionFailed { reason, .. }) => Ok(ConfirmationState::Failed(reason)),
      Err(e) => Err(e),
    }
  }

  /// Poll until confirmed, failed, timed out or cancelled.
  ///
  /// Retriable query errors (RPC hiccups, per-call timeouts) count as
  /// "not visible yet"; only terminal errors end the wait early.
  #[instrument(skip(self, shutdown), fields(currency = %self.currency.id(), tx_id = %id))]
  pub async fn wait(
    &self,
    id: &TxId,
    shutdown: &mut broadcast::Receiver<()>,
  ) -> Result<Tx, CurrencyError> {
    let started = Instant::now();
    let deadline = started + self.config.timeout;

    loop {
      let state = match self.check(id).await {
        Ok(state) => state,
        Err(e) if e.is_retriable() => {
          warn!(error = %e, "Status query failed, polling again");
          ConfirmationState::Submitted
        }
        Err(e) => return Err(e),
      };

      match state {
        ConfirmationState::Confirmed(tx) => {
          info!(
            block_height = tx.block_height,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Transaction confirmed"
          );
          return Ok(tx);
        }
        ConfirmationState::Failed(reason) => {
          warn!(reason = %reason, "Transaction failed on-chain");
          return Err(CurrencyError::TransactionFailed {
            id: id.to_string(),
            reason,
          });
        }
        ConfirmationState::Pending(tx) => {
          debug!(block_height = tx.block_height, "Waiting for confirmations");
        }
        ConfirmationState::Submitted => debug!("Not yet visible on-chain"),
      }

      let now = Instant::now();
      if now >= deadline {
        return Err(CurrencyError::Timeout {
          operation: "confirmation",
          elapsed: now - started,
        });
      }

      let pause = self.config.interval.min(deadline - now);
      tokio::select! {
        _ = shutdown.recv() => {
          info!("Shutdown signal received, abandoning confirmation wait");
          return Err(CurrencyError::Cancelled);
        }
        _ = sleep(pause) => {}
      }
    }
  }
}


#[cfg(test)]
mod tests {
  use alloy::primitives::U256;

  use super::*;

  fn confirmed(n: u64) -> Tx {
    Tx::included("a".into(), "b".into(), U256::from(n), 10, 20, 1)
  }

  #[test]
  fn test_latch_evicts_oldest_at_capacity() {
    let mut latch = ConfirmedLatch::with_capacity(2);
    latch.insert(&TxId::new("0x1"), &confirmed(1));
    latch.insert(&TxId::new("0x2"), &confirmed(2));
    latch.insert(&TxId::new("0x3"), &confirmed(3));

    assert_eq!(latch.len(), 2);
    assert!(latch.get(&TxId::new("0x1")).is_none());
    assert_eq!(latch.get(&TxId::new("0x3")), Some(confirmed(3)));
  }

  #[test]
  fn test_relatching_does_not_grow_or_evict() {
    let mut latch = ConfirmedLatch::with_capacity(2);
    latch.insert(&TxId::new("0x1"), &confirmed(1));
    latch.insert(&TxId::new("0x2"), &confirmed(2));
    latch.insert(&TxId::new("0x1"), &confirmed(1));

    assert_eq!(latch.len(), 2);
    assert!(latch.get(&TxId::new("0x1")).is_some());
    assert!(latch.get(&TxId::new("0x2")).is_some());
  }

  #[test]
  fn test_slow_network_polls_less_often() {
    let base = PollConfig {
      interval: Duration::from_secs(5),
      timeout: Duration::from_secs(600),
    };
    assert_eq!(base.for_network(false), base);
    assert_eq!(base.for_network(true).interval, Duration::from_secs(15));
    assert_eq!(base.for_network(true).timeout, base.timeout);

    let short = PollConfig {
      interval: Duration::from_secs(5),
      timeout: Duration::from_secs(8),
    };
    assert_eq!(short.for_network(true).interval, Duration::from_secs(8));
  }
}
