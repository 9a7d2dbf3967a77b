//! In-Flight Request Deduplicator
//!
//! Concurrent callers asking for the same canonical key share one pending
//! future. The entry is dropped as soon as that future settles, so the next
//! request for the key starts fresh.

use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use futures::future::{BoxFuture, FutureExt, Shared};
use tracing::debug;

use crate::error::Result;

type SharedResult<T> = Shared<BoxFuture<'static, Result<T>>>;

struct Pending<T> {
    id: u64,
    future: SharedResult<T>,
}

// == In Flight ==
pub struct InFlight<T> {
    pending: Mutex<HashMap<String, Pending<T>>>,
    next_id: AtomicU64,
}

impl<T> Default for InFlight<T>
where
    T: Clone + Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<T> InFlight<T>
where
    T: Clone + Send + Sync + 'static,
{
    pub fn new() -> Self {
        Self {
            pending: Mutex::new(HashMap::new()),
            next_id: AtomicU64::new(1),
        }
    }

    /// Canonical key for a fetch of `ids`: sorted, de-duplicated, tagged with
    /// the routing variant.
    pub fn canonical_key(prefix: &str, ids: &[String], variant: &str) -> String {
        let mut ids: Vec<&str> = ids.iter().map(String::as_str).collect();
        ids.sort_unstable();
        ids.dedup();
        format!("{}_{}_{}", prefix, ids.join(","), variant)
    }

    /// Runs `operation` for `key` unless an identical call is already pending,
    /// in which case its outcome (success or failure) is shared.
    pub async fn run<F, Fut>(&self, key: &str, operation: F) -> Result<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T>> + Send + 'static,
    {
        let (id, future) = {
            let mut pending = self.lock();
            match pending.get(key) {
                Some(existing) => {
                    debug!(key, "joining in-flight request");
                    (existing.id, existing.future.clone())
                }
                None => {
                    let id = self.next_id.fetch_add(1, Ordering::Relaxed);
                    let future = operation().boxed().shared();
                    pending.insert(
                        key.to_string(),
                        Pending {
                            id,
                            future: future.clone(),
                        },
                    );
                    (id, future)
                }
            }
        };

        let _settled = Settled {
            owner: self,
            key,
            id,
        };
        future.await
    }

    /// Number of keys with a pending call.
    pub fn in_flight_count(&self) -> usize {
        self.lock().len()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, Pending<T>>> {
        self.pending.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Removes the entry for `key` only if it is still the one `id` joined.
    fn forget(&self, key: &str, id: u64) {
        let mut pending = self.lock();
        if pending.get(key).is_some_and(|entry| entry.id == id) {
            pending.remove(key);
        }
    }
}

/// Clears the entry once its caller stops waiting, whether the future settled
/// or the caller was cancelled.
struct Settled<'a, T>
where
    T: Clone + Send + Sync + 'static,
{
    owner: &'a InFlight<T>,
    key: &'a str,
    id: u64,
}

impl<T> Drop for Settled<'_, T>
where
    T: Clone + Send + Sync + 'static,
{
    fn drop(&mut self) {
        self.owner.forget(self.key, self.id);
    }
}
