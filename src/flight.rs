//! Request Coalescing
//!
//! Collapses concurrent loads of the same key into a single execution. The
//! first caller for a key becomes the leader and runs the producer; callers
//! arriving while it runs park on the call's condition variable and receive a
//! clone of the leader's result.
//!
//! ```text
//!  caller A ──▶ register ──▶ producer() ──▶ publish ──▶ remove ──▶ return
//!  caller B ──▶ found ─────▶ wait ────────────┘
//!  caller C ──▶ found ─────▶ wait ────────────┘
//! ```
//!
//! Deduplication only spans the in-flight window: once the leader removes
//! the key, the next caller runs the producer again.

use std::collections::HashMap;
use std::hash::Hash;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::{Condvar, Mutex};

use crate::error::{Error, Result};

/// One pending computation
struct Call<T> {
    result: Mutex<Option<Result<T>>>,
    done: Condvar,
}

impl<T: Clone> Call<T> {
    fn new() -> Self {
        Self {
            result: Mutex::new(None),
            done: Condvar::new(),
        }
    }

    fn wait(&self) -> Result<T> {
        let mut slot = self.result.lock();
        loop {
            if let Some(result) = slot.as_ref() {
                return result.clone();
            }
            self.done.wait(&mut slot);
        }
    }

    fn publish(&self, result: Result<T>) {
        *self.result.lock() = Some(result);
        self.done.notify_all();
    }
}

type CallTable<K, T> = Mutex<HashMap<K, Arc<Call<T>>>>;

/// Leader-side handle; publishes a failure if the producer unwinds
struct Leader<'a, K: Hash + Eq, T: Clone> {
    calls: &'a CallTable<K, T>,
    key: K,
    call: Arc<Call<T>>,
    finished: bool,
}

impl<K: Hash + Eq, T: Clone> Leader<'_, K, T> {
    fn finish(mut self, result: &Result<T>) {
        self.call.publish(result.clone());
        self.calls.lock().remove(&self.key);
        self.finished = true;
    }
}

impl<K: Hash + Eq, T: Clone> Drop for Leader<'_, K, T> {
    fn drop(&mut self) {
        if !self.finished {
            self.call
                .publish(Err(Error::Internal("in-flight load panicked".to_string())));
            self.calls.lock().remove(&self.key);
        }
    }
}

/// Merges concurrent same-key requests into one execution
pub struct RequestCoalescer<K, T> {
    calls: CallTable<K, T>,
    executions: AtomicU64,
    deduplicated: AtomicU64,
}

impl<K, T> Default for RequestCoalescer<K, T> {
    fn default() -> Self {
        Self {
            calls: Mutex::new(HashMap::new()),
            executions: AtomicU64::new(0),
            deduplicated: AtomicU64::new(0),
        }
    }
}

impl<K, T> RequestCoalescer<K, T>
where
    K: Hash + Eq + Clone,
    T: Clone,
{
    /// Create an empty coalescer
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `producer` for `key` unless a call for `key` is already in flight
    pub fn execute<F>(&self, key: K, producer: F) -> Result<T>
    where
        F: FnOnce() -> Result<T>,
    {
        self.execute_tracked(key, producer).0
    }

    /// Like [`execute`](Self::execute), also reporting whether the result was
    /// shared from another caller's execution
    pub fn execute_tracked<F>(&self, key: K, producer: F) -> (Result<T>, bool)
    where
        F: FnOnce() -> Result<T>,
    {
        let leader = {
            let mut calls = self.calls.lock();
            if let Some(call) = calls.get(&key) {
                let call = Arc::clone(call);
                drop(calls);
                self.deduplicated.fetch_add(1, Ordering::Relaxed);
                return (call.wait(), true);
            }

            let call = Arc::new(Call::new());
            calls.insert(key.clone(), Arc::clone(&call));
            Leader {
                calls: &self.calls,
                key,
                call,
                finished: false,
            }
        };

        self.executions.fetch_add(1, Ordering::Relaxed);
        let result = producer();
        leader.finish(&result);
        (result, false)
    }

    /// Number of keys with a call in flight
    pub fn in_flight(&self) -> usize {
        self.calls.lock().len()
    }

    /// Producer invocations so far
    pub fn executions(&self) -> u64 {
        self.executions.load(Ordering::Relaxed)
    }

    /// Callers that received a shared result instead of executing
    pub fn deduplicated(&self) -> u64 {
        self.deduplicated.load(Ordering::Relaxed)
    }
}

impl<K, T> std::fmt::Debug for RequestCoalescer<K, T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestCoalescer")
            .field("in_flight", &self.calls.lock().len())
            .field("executions", &self.executions.load(Ordering::Relaxed))
            .finish()
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::sync::mpsc;
    use std::thread;
    use std::time::{Duration, Instant};

    fn wait_for(mut condition: impl FnMut() -> bool) {
        let deadline = Instant::now() + Duration::from_secs(10);
        while !condition() {
            assert!(Instant::now() < deadline, "condition not reached in time");
            thread::sleep(Duration::from_millis(1));
        }
    }

    #[test]
    fn test_single_call_runs_producer() {
        let coalescer = RequestCoalescer::<String, String>::new();
        let result = coalescer.execute("key".to_string(), || Ok("value".to_string()));

        assert_eq!(result.unwrap(), "value");
        assert_eq!(coalescer.in_flight(), 0);
        assert_eq!(coalescer.executions(), 1);
    }

    #[test]
    fn test_concurrent_callers_share_one_execution() {
        const CALLERS: usize = 16;

        let coalescer = Arc::new(RequestCoalescer::<String, String>::new());
        let invocations = Arc::new(AtomicUsize::new(0));

        let handles: Vec<_> = (0..CALLERS)
            .map(|_| {
                let coalescer = Arc::clone(&coalescer);
                let invocations = Arc::clone(&invocations);
                thread::spawn(move || {
                    let waiting = Arc::clone(&coalescer);
                    coalescer.execute("hot".to_string(), move || {
                        invocations.fetch_add(1, Ordering::SeqCst);
                        wait_for(|| waiting.deduplicated() == (CALLERS - 1) as u64);
                        Ok("shared".to_string())
                    })
                })
            })
            .collect();

        let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();

        assert_eq!(invocations.load(Ordering::SeqCst), 1);
        assert!(results.iter().all(|r| r.as_deref() == Ok("shared")));
        assert_eq!(coalescer.in_flight(), 0);
    }

    #[test]
    fn test_errors_are_broadcast() {
        let coalescer = Arc::new(RequestCoalescer::<String, String>::new());
        let (started_tx, started_rx) = mpsc::channel();

        let leader = {
            let coalescer = Arc::clone(&coalescer);
            thread::spawn(move || {
                let waiting = Arc::clone(&coalescer);
                coalescer.execute("k".to_string(), move || {
                    started_tx.send(()).unwrap();
                    wait_for(|| waiting.deduplicated() == 1);
                    Err(Error::SourceMiss {
                        group: "g".into(),
                        key: "k".into(),
                    })
                })
            })
        };

        started_rx.recv().unwrap();
        let (follower, shared) =
            coalescer.execute_tracked("k".to_string(), || Ok("never".to_string()));

        assert!(shared);
        assert_eq!(follower, leader.join().unwrap());
        assert!(matches!(follower, Err(Error::SourceMiss { .. })));
    }

    #[test]
    fn test_deduplication_is_burst_scoped() {
        let coalescer = RequestCoalescer::<String, u32>::new();
        let mut runs = 0;

        coalescer.execute("k".to_string(), || {
            runs += 1;
            Ok(1)
        })
        .unwrap();
        coalescer.execute("k".to_string(), || {
            runs += 1;
            Ok(2)
        })
        .unwrap();

        assert_eq!(runs, 2);
    }

    #[test]
    fn test_distinct_keys_do_not_block_each_other() {
        let coalescer = RequestCoalescer::<(String, String), String>::new();

        let outer = coalescer.execute(("a".into(), "k".into()), || {
            coalescer.execute(("b".into(), "k".into()), || Ok("inner".to_string()))
        });

        assert_eq!(outer.unwrap(), "inner");
        assert_eq!(coalescer.executions(), 2);
    }

    #[test]
    fn test_panicking_producer_releases_waiters() {
        let coalescer = Arc::new(RequestCoalescer::<String, String>::new());
        let (started_tx, started_rx) = mpsc::channel();

        let leader = {
            let coalescer = Arc::clone(&coalescer);
            thread::spawn(move || {
                let waiting = Arc::clone(&coalescer);
                coalescer.execute("k".to_string(), move || -> Result<String> {
                    started_tx.send(()).unwrap();
                    wait_for(|| waiting.deduplicated() == 1);
                    panic!("producer failed");
                })
            })
        };

        started_rx.recv().unwrap();
        let follower = coalescer.execute("k".to_string(), || Ok("unused".to_string()));

        assert!(leader.join().is_err());
        assert!(matches!(follower, Err(Error::Internal(_))));
        assert_eq!(coalescer.in_flight(), 0);
    }
}
