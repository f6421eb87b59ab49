//! Per-key single-flight registry.
//!
//! Concurrent request handlers frequently ask for the same expensive
//! upstream result (a provider history refresh, a proxied translation).
//! The registry maps a request key to the one in-flight operation for it:
//! the first caller becomes the leader and performs the work, everyone
//! else subscribes to the leader's outcome. The entry never outlives its
//! operation — the leader removes it on completion, and a leader dropped
//! without completing closes the channel so waiters observe the failure
//! and may retry with a fresh flight.

use std::collections::HashMap;
use std::hash::Hash;
use std::sync::{Arc, Mutex, MutexGuard};

use tokio::sync::broadcast;

type Registry<K, V> = Arc<Mutex<HashMap<K, broadcast::Sender<V>>>>;

/// Tracks one in-flight operation per key.
pub struct InflightRegistry<K, V> {
    inner: Registry<K, V>,
}

/// What [`InflightRegistry::begin`] handed this caller.
pub enum Flight<K: Eq + Hash, V: Clone> {
    /// This caller performs the work and publishes the outcome.
    Leader(FlightLeader<K, V>),
    /// Another caller is already on it; wait for its outcome.
    Follower(FlightWaiter<V>),
}

/// Leadership of one in-flight operation.
pub struct FlightLeader<K: Eq + Hash, V: Clone> {
    registry: Registry<K, V>,
    key: Option<K>,
    tx: broadcast::Sender<V>,
}

/// A subscription to another caller's in-flight operation.
pub struct FlightWaiter<V> {
    rx: broadcast::Receiver<V>,
}

impl<K, V> InflightRegistry<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<K, broadcast::Sender<V>>> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Join the flight for `key`, starting one if none is in progress.
    pub fn begin(&self, key: K) -> Flight<K, V> {
        let mut map = self.lock();
        if let Some(tx) = map.get(&key) {
            return Flight::Follower(FlightWaiter {
                rx: tx.subscribe(),
            });
        }
        let (tx, _) = broadcast::channel(1);
        map.insert(key.clone(), tx.clone());
        Flight::Leader(FlightLeader {
            registry: Arc::clone(&self.inner),
            key: Some(key),
            tx,
        })
    }

    /// Number of operations currently in flight.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }
}

impl<K, V> Default for InflightRegistry<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<K: Eq + Hash, V: Clone> FlightLeader<K, V> {
    /// Publish the outcome to every waiter and retire the flight.
    ///
    /// The entry is removed before the send, so a caller arriving after
    /// completion starts a fresh flight instead of waiting on a finished
    /// one.
    pub fn complete(mut self, value: V) {
        self.remove_entry();
        // Waiters hold their receivers already; a send with no waiters is
        // not an error.
        let _ = self.tx.send(value);
    }

    fn remove_entry(&mut self) {
        if let Some(key) = self.key.take() {
            let mut map = self.registry.lock().unwrap_or_else(|e| e.into_inner());
            map.remove(&key);
        }
    }
}

impl<K: Eq + Hash, V: Clone> Drop for FlightLeader<K, V> {
    fn drop(&mut self) {
        // Leader abandoned without completing: removing the entry drops
        // the sender, closing the channel under every waiter.
        self.remove_entry();
    }
}

impl<V: Clone> FlightWaiter<V> {
    /// Wait for the leader's outcome.
    ///
    /// Returns `None` when the leader was dropped without completing; the
    /// caller may retry with a fresh [`InflightRegistry::begin`].
    pub async fn wait(mut self) -> Option<V> {
        self.rx.recv().await.ok()
    }
}
