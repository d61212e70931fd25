//! Per-account nonce reservation.
//!
//! The chain only learns about a nonce once the transaction carrying it
//! is broadcast, so two `create_tx` calls racing on the same adapter
//! would read the same on-chain sequence. Adapters keep a
//! `NonceTracker` behind a mutex and reserve through it while still
//! holding the lock.

/// Remembers the highest nonce handed out for one account.
#[derive(Debug, Default, Clone)]
pub struct NonceTracker {
    last_issued: Option<u64>,
}

impl NonceTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reserve the next nonce given the lowest value the chain would accept.
    ///
    /// Returns `max(chain_next, last_issued + 1)` and records it.
    pub fn reserve(&mut self, chain_next: u64) -> u64 {
        let next = match self.last_issued {
            Some(last) => chain_next.max(last.saturating_add(1)),
            None => chain_next,
        };
        self.last_issued = Some(next);
        next
    }

    /// Give back a nonce whose transaction never reached the network.
    ///
    /// Only the most recent reservation can be returned; older ones are
    /// left alone because a later nonce may already be in flight.
    pub fn release(&mut self, nonce: u64) {
        if self.last_issued == Some(nonce) {
            self.last_issued = nonce.checked_sub(1);
        }
    }

    pub fn last_issued(&self) -> Option<u64> {
        self.last_issued
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reserve_never_repeats_when_chain_lags() {
        let mut tracker = NonceTracker::new();
        assert_eq!(tracker.reserve(7), 7);
        assert_eq!(tracker.reserve(7), 8);
        assert_eq!(tracker.reserve(7), 9);
    }

    #[test]
    fn test_reserve_follows_chain_when_it_moves_ahead() {
        let mut tracker = NonceTracker::new();
        assert_eq!(tracker.reserve(3), 3);
        assert_eq!(tracker.reserve(10), 10);
    }

    #[test]
    fn test_release_only_latest() {
        let mut tracker = NonceTracker::new();
        tracker.reserve(4);
        tracker.reserve(4);
        tracker.release(4);
        assert_eq!(tracker.last_issued(), Some(5));
        tracker.release(5);
        assert_eq!(tracker.last_issued(), Some(4));
        assert_eq!(tracker.reserve(4), 5);
    }
}
