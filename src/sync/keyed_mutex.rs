//! Keyed Async Mutex
//!
//! At most one holder per key. Waiters park on a watch channel whose sender
//! lives in the entry, so removing the entry (release or sweep) wakes them.

use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::sync::watch;
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::error::{RelayError, Result};

struct MutexEntry {
    id: u64,
    acquired_at: Instant,
    // Dropping the sender is the release signal
    released: watch::Sender<()>,
}

/// Outcome of [`KeyedMutex::try_acquire`].
pub enum Acquire<'a> {
    Acquired(MutexPermit<'a>),
    Busy(PendingRelease),
}

/// Held while the computation for a key runs; releases on drop.
pub struct MutexPermit<'a> {
    owner: &'a KeyedMutex,
    key: String,
    id: u64,
}

impl MutexPermit<'_> {
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Releases the key explicitly. Equivalent to dropping the permit.
    pub fn release(self) {}
}

impl Drop for MutexPermit<'_> {
    fn drop(&mut self) {
        self.owner.remove_if_current(&self.key, self.id);
    }
}

/// Resolves once the current holder of a key releases it or is swept.
pub struct PendingRelease {
    receiver: watch::Receiver<()>,
}

impl PendingRelease {
    pub async fn wait(mut self) {
        // Only ever errors, when the sender is dropped
        while self.receiver.changed().await.is_ok() {}
    }
}

// == Keyed Mutex ==
pub struct KeyedMutex {
    entries: Mutex<HashMap<String, MutexEntry>>,
    max_age: Duration,
    next_id: AtomicU64,
}

impl KeyedMutex {
    /// Creates a mutex map whose entries are reclaimable after `max_age`.
    pub fn new(max_age: Duration) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            max_age,
            next_id: AtomicU64::new(1),
        }
    }

    // == Try Acquire ==
    /// Takes the key if free, otherwise returns a handle on the current hold.
    pub fn try_acquire(&self, key: &str) -> Acquire<'_> {
        let mut entries = self.lock();
        if let Some(entry) = entries.get(key) {
            return Acquire::Busy(PendingRelease {
                receiver: entry.released.subscribe(),
            });
        }

        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (sender, _) = watch::channel(());
        entries.insert(
            key.to_string(),
            MutexEntry {
                id,
                acquired_at: Instant::now(),
                released: sender,
            },
        );
        debug!(key, "mutex acquired");

        Acquire::Acquired(MutexPermit {
            owner: self,
            key: key.to_string(),
            id,
        })
    }

    // == Await Existing ==
    /// Waits for the current holder of `key`, if any.
    pub async fn await_existing(&self, key: &str) {
        let pending = self.lock().get(key).map(|entry| PendingRelease {
            receiver: entry.released.subscribe(),
        });
        if let Some(pending) = pending {
            pending.wait().await;
        }
    }

    // == With Mutex ==
    /// Runs `operation` under the key's lock.
    ///
    /// `recheck` consults the cache the operation fills. It runs once the lock
    /// is taken and again after every wait on another holder; a hit is
    /// returned without running `operation`. A waiter that still finds nothing
    /// competes for the lock and runs `operation` itself, so a failure is only
    /// returned to the caller whose execution produced it.
    pub async fn with_mutex<T, R, RFut, F, Fut>(
        &self,
        key: &str,
        mut recheck: R,
        operation: F,
    ) -> Result<T>
    where
        R: FnMut() -> RFut,
        RFut: Future<Output = Option<T>>,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        loop {
            match self.try_acquire(key) {
                Acquire::Acquired(permit) => {
                    if let Some(hit) = recheck().await {
                        debug!(key, "populated before lock was taken");
                        return Ok(hit);
                    }
                    let result = operation().await;
                    permit.release();
                    return result;
                }
                Acquire::Busy(pending) => {
                    debug!(key, "waiting on in-progress computation");
                    pending.wait().await;
                    if let Some(hit) = recheck().await {
                        return Ok(hit);
                    }
                }
            }
        }
    }

    // == Sweep ==
    /// Reclaims entries held longer than the max age, returning their keys.
    pub fn sweep(&self) -> Vec<String> {
        let now = Instant::now();
        let mut entries = self.lock();
        let stale: Vec<String> = entries
            .iter()
            .filter(|(_, entry)| now.duration_since(entry.acquired_at) >= self.max_age)
            .map(|(key, _)| key.clone())
            .collect();

        for key in &stale {
            entries.remove(key);
            let err = RelayError::MutexAbandoned(key.clone());
            warn!(error = %err, max_age_secs = self.max_age.as_secs(), "reclaimed stale mutex");
        }
        stale
    }

    pub fn is_held(&self, key: &str) -> bool {
        self.lock().contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, MutexEntry>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn remove_if_current(&self, key: &str, id: u64) {
        let mut entries = self.lock();
        if entries.get(key).is_some_and(|entry| entry.id == id) {
            entries.remove(key);
            debug!(key, "mutex released");
        }
    }
}
