// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! In-memory anti-replay store.
//!
//! Remembers every accepted `(client_id, nonce)` pair until it can no longer
//! pass the timestamp check. The check-for-existing and insert happen inside
//! one mutex critical section, so two concurrent submissions of the same
//! signed request cannot both succeed.
//!
//! ## Expiry
//!
//! An entry expires at `max(seen_at, request_timestamp) + window` and is
//! still remembered at that second; it is dropped only once `now` is past it.
//! The skew check accepts `|now - timestamp| == tolerance`, so with
//! `window >= clock skew tolerance` a replayed request is always either still
//! remembered or already rejected as stale.
//!
//! Expired entries are dropped lazily at the start of every call and by the
//! background [`NonceSweeper`]. Eviction pops a min-heap ordered by expiry,
//! so each call only touches entries that actually expired.

use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::clock::Clock;
use super::error::AuthError;

type NonceKey = (String, String);

#[derive(Default)]
struct NonceState {
    /// Live entries and their expiry time.
    entries: HashMap<NonceKey, i64>,
    /// Expiry queue. May hold stale keys already removed from `entries`.
    expiries: BinaryHeap<Reverse<(i64, NonceKey)>>,
}

impl NonceState {
    fn evict_expired(&mut self, now: i64) -> usize {
        let mut evicted = 0;
        while let Some(Reverse((expires_at, _))) = self.expiries.peek() {
            if *expires_at >= now {
                break;
            }
            let Some(Reverse((expires_at, key))) = self.expiries.pop() else {
                break;
            };
            if self.entries.get(&key) == Some(&expires_at) {
                self.entries.remove(&key);
                evicted += 1;
            }
        }
        evicted
    }
}

/// Tracks recently used nonces per client.
pub struct NonceStore {
    window: i64,
    clock: Arc<dyn Clock>,
    state: Mutex<NonceState>,
}

impl NonceStore {
    /// Create a store that remembers nonces for `window`.
    pub fn new(window: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            window: i64::try_from(window.as_secs()).unwrap_or(i64::MAX),
            clock,
            state: Mutex::new(NonceState::default()),
        }
    }

    fn lock(&self) -> Result<MutexGuard<'_, NonceState>, AuthError> {
        self.state
            .lock()
            .map_err(|_| AuthError::InternalFault("nonce store lock poisoned".to_string()))
    }

    /// Record `nonce` for `client_id`, or fail with [`AuthError::Replay`] if
    /// the pair is still remembered.
    pub fn check_and_record(
        &self,
        client_id: &str,
        nonce: &str,
        timestamp: i64,
    ) -> Result<(), AuthError> {
        let now = self.clock.now();
        let mut state = self.lock()?;
        state.evict_expired(now);

        let key = (client_id.to_string(), nonce.to_string());
        if state.entries.contains_key(&key) {
            return Err(AuthError::Replay);
        }

        let expires_at = now.max(timestamp).saturating_add(self.window);
        state.entries.insert(key.clone(), expires_at);
        state.expiries.push(Reverse((expires_at, key)));
        Ok(())
    }

    /// Drop every expired entry. Returns how many were removed.
    pub fn sweep(&self) -> Result<usize, AuthError> {
        let now = self.clock.now();
        Ok(self.lock()?.evict_expired(now))
    }

    /// Number of live (possibly not yet swept) entries.
    pub fn len(&self) -> usize {
        match self.state.lock() {
            Ok(state) => state.entries.len(),
            Err(poisoned) => poisoned.into_inner().entries.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// False once a panic while holding the lock has poisoned the store.
    pub fn is_healthy(&self) -> bool {
        !self.state.is_poisoned()
    }
}

/// Background task that periodically evicts expired nonces, so memory is
/// released even when no login requests arrive.
pub struct NonceSweeper {
    store: Arc<NonceStore>,
    interval: Duration,
}

impl NonceSweeper {
    pub fn new(store: Arc<NonceStore>, interval: Duration) -> Self {
        Self { store, interval }
    }

    /// Run until the cancellation token is triggered.
    ///
    /// ```rust,ignore
    /// tokio::spawn(sweeper.run(shutdown.clone()));
    /// ```
    pub async fn run(self, shutdown: CancellationToken) {
        info!(
            interval_secs = self.interval.as_secs(),
            "Nonce sweeper starting"
        );

        loop {
            tokio::select! {
                _ = tokio::time::sleep(self.interval) => {},
                _ = shutdown.cancelled() => {
                    info!("Nonce sweeper shutting down");
                    return;
                }
            }

            match self.store.sweep() {
                Ok(0) => {}
                Ok(evicted) => debug!(
                    evicted,
                    remaining = self.store.len(),
                    "Evicted expired nonces"
                ),
                Err(e) => warn!(error = %e, "Nonce sweep failed"),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::clock::ManualClock;

    const T0: i64 = 1_700_000_000;

    fn store(window: u64) -> (NonceStore, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new(T0));
        (NonceStore::new(Duration::from_secs(window), clock.clone()), clock)
    }

    #[test]
    fn first_use_accepted_second_rejected() {
        let (store, clock) = store(60);
        store.check_and_record("c1", "n1", T0).unwrap();

        clock.advance(1);
        let err = store.check_and_record("c1", "n1", T0).unwrap_err();
        assert!(matches!(err, AuthError::Replay));
    }

    #[test]
    fn same_nonce_different_clients_are_independent() {
        let (store, _) = store(60);
        store.check_and_record("c1", "n1", T0).unwrap();
        store.check_and_record("c2", "n1", T0).unwrap();
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn nonce_reusable_after_window() {
        let (store, clock) = store(60);
        store.check_and_record("c1", "n1", T0).unwrap();

        clock.advance(60);
        assert!(matches!(
            store.check_and_record("c1", "n1", T0),
            Err(AuthError::Replay)
        ));

        clock.advance(1);
        store.check_and_record("c1", "n1", T0 + 61).unwrap();
    }

    #[test]
    fn future_timestamp_extends_retention() {
        let (store, clock) = store(60);
        // Client clock 50s ahead of the server.
        store.check_and_record("c1", "n1", T0 + 50).unwrap();

        clock.advance(100);
        assert!(matches!(
            store.check_and_record("c1", "n1", T0 + 50),
            Err(AuthError::Replay)
        ));

        clock.advance(10);
        assert!(store.check_and_record("c1", "n1", T0 + 50).is_err());

        clock.advance(1);
        store.check_and_record("c1", "n1", T0 + 50).unwrap();
    }

    #[test]
    fn access_evicts_expired_entries() {
        let (store, clock) = store(60);
        for i in 0..10 {
            store.check_and_record("c1", &format!("n{i}"), T0).unwrap();
        }
        assert_eq!(store.len(), 10);

        clock.advance(61);
        store.check_and_record("c1", "fresh", T0 + 61).unwrap();
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn sweep_reports_evicted_count() {
        let (store, clock) = store(30);
        store.check_and_record("c1", "a", T0).unwrap();
        clock.advance(10);
        store.check_and_record("c1", "b", T0 + 10).unwrap();

        clock.advance(25);
        assert_eq!(store.sweep().unwrap(), 1);
        assert_eq!(store.len(), 1);
        assert_eq!(store.sweep().unwrap(), 0);
    }

    #[test]
    fn concurrent_replays_admit_exactly_one() {
        let (store, _) = store(60);
        let store = Arc::new(store);

        let handles: Vec<_> = (0..16)
            .map(|_| {
                let store = store.clone();
                std::thread::spawn(move || store.check_and_record("c1", "shared", T0).is_ok())
            })
            .collect();

        let accepted = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|ok| *ok)
            .count();
        assert_eq!(accepted, 1);
    }

    #[test]
    fn poisoned_lock_keeps_count_and_fails_closed() {
        let (store, _) = store(60);
        let store = Arc::new(store);
        store.check_and_record("c1", "n1", T0).unwrap();
        store.check_and_record("c1", "n2", T0).unwrap();

        let poisoner = store.clone();
        let _ = std::thread::spawn(move || {
            let _guard = poisoner.state.lock().unwrap();
            panic!("poison nonce store");
        })
        .join();

        assert!(!store.is_healthy());
        assert_eq!(store.len(), 2);
        assert!(matches!(
            store.check_and_record("c1", "n3", T0),
            Err(AuthError::InternalFault(_))
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn sweeper_stops_on_cancel() {
        let (store, clock) = store(10);
        let store = Arc::new(store);
        store.check_and_record("c1", "n1", T0).unwrap();
        clock.advance(11);

        let shutdown = CancellationToken::new();
        let handle = tokio::spawn(
            NonceSweeper::new(store.clone(), Duration::from_secs(1)).run(shutdown.clone()),
        );

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert!(store.is_empty());

        shutdown.cancel();
        handle.await.unwrap();
    }
}
