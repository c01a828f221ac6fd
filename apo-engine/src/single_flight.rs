//! Single-flight request collapsing
//!
//! Concurrent calls with the same key share one in-flight future. The entry is
//! removed once the shared future completes, so later calls start fresh.

use futures::future::{BoxFuture, FutureExt, Shared};
use std::collections::HashMap;
use std::future::Future;
use std::sync::Mutex;

type InFlight<V> = Shared<BoxFuture<'static, V>>;

pub struct SingleFlight<V>
where
    V: Clone + Send + Sync + 'static,
{
    inflight: Mutex<HashMap<String, InFlight<V>>>,
}

impl<V> Default for SingleFlight<V>
where
    V: Clone + Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<V> SingleFlight<V>
where
    V: Clone + Send + Sync + 'static,
{
    pub fn new() -> Self {
        Self {
            inflight: Mutex::new(HashMap::new()),
        }
    }

    /// Run `make()` for `key` unless a call for the same key is already in flight,
    /// in which case wait for and share its output
    pub async fn run<F, Fut>(&self, key: &str, make: F) -> V
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = V> + Send + 'static,
    {
        let shared = {
            let mut inflight = self.inflight.lock().unwrap_or_else(|e| e.into_inner());
            match inflight.get(key) {
                Some(existing) => {
                    tracing::debug!(key = %key, "Joining in-flight computation");
                    existing.clone()
                }
                None => {
                    let shared = make().boxed().shared();
                    inflight.insert(key.to_string(), shared.clone());
                    shared
                }
            }
        };

        let _cleanup = Cleanup {
            inflight: &self.inflight,
            key,
            shared: shared.clone(),
        };

        shared.await
    }

    /// Number of keys currently in flight
    pub fn in_flight(&self) -> usize {
        self.inflight.lock().unwrap_or_else(|e| e.into_inner()).len()
    }
}

/// Removes a completed flight from the map when any participant finishes
struct Cleanup<'a, V>
where
    V: Clone + Send + Sync + 'static,
{
    inflight: &'a Mutex<HashMap<String, InFlight<V>>>,
    key: &'a str,
    shared: InFlight<V>,
}

impl<V> Drop for Cleanup<'_, V>
where
    V: Clone + Send + Sync + 'static,
{
    fn drop(&mut self) {
        if self.shared.peek().is_none() {
            return;
        }
        let mut inflight = self.inflight.lock().unwrap_or_else(|e| e.into_inner());
        if inflight
            .get(self.key)
            .is_some_and(|current| current.ptr_eq(&self.shared))
        {
            inflight.remove(self.key);
        }
    }
}
