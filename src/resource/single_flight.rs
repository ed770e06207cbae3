//! # Single-Flight Execution
//!
//! Collapses concurrent executions of the same keyed operation into one.
//!
//! The first caller for a key becomes the leader and runs the work; every caller that
//! arrives while the leader is running waits on a `watch` channel and receives a clone
//! of the leader's result. Once the leader finishes, the key is released and the next
//! call starts a fresh flight, so failures are never cached.
//!
//! If the leader's future is dropped before it finishes, its guard releases the key
//! and closes the channel; waiters wake up and one of them leads a new flight.

use crate::error::{DataManagerError, Result};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::future::Future;
use tokio::sync::watch;
use tracing::debug;

type Outcome<T> = Option<Result<T>>;

/// Per-key in-flight call table.
pub struct SingleFlight<T> {
    calls: DashMap<String, watch::Receiver<Outcome<T>>>,
}

enum Role<T> {
    Leader(watch::Sender<Outcome<T>>),
    Follower(watch::Receiver<Outcome<T>>),
}

/// Releases the leader's key when the flight ends, including on cancellation.
struct FlightGuard<'a, T> {
    calls: &'a DashMap<String, watch::Receiver<Outcome<T>>>,
    key: &'a str,
    sender: watch::Sender<Outcome<T>>,
}

impl<T> FlightGuard<'_, T> {
    fn publish(&self, outcome: Result<T>) {
        self.sender.send_replace(Some(outcome));
    }
}

impl<T> Drop for FlightGuard<'_, T> {
    fn drop(&mut self) {
        // The sender is dropped after this runs, so waiters only observe a closed
        // channel once the key is free for a new leader.
        self.calls.remove(self.key);
    }
}

impl<T> SingleFlight<T>
where
    T: Clone + Send + Sync + 'static,
{
    pub fn new() -> Self {
        Self {
            calls: DashMap::new(),
        }
    }

    /// Run `work` for `key` unless a flight for `key` is already running, in which
    /// case wait for that flight and return its outcome.
    pub async fn run<F, Fut>(&self, key: &str, work: F) -> Result<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let mut work = Some(work);

        loop {
            let role = match self.calls.entry(key.to_string()) {
                Entry::Occupied(entry) => Role::Follower(entry.get().clone()),
                Entry::Vacant(entry) => {
                    let (sender, receiver) = watch::channel(None);
                    entry.insert(receiver);
                    Role::Leader(sender)
                }
            };

            match role {
                Role::Leader(sender) => {
                    let Some(work) = work.take() else {
                        return Err(DataManagerError::Internal(format!(
                            "single-flight work for '{key}' already consumed"
                        )));
                    };
                    let guard = FlightGuard {
                        calls: &self.calls,
                        key,
                        sender,
                    };
                    let outcome = work().await;
                    guard.publish(outcome.clone());
                    return outcome;
                }
                Role::Follower(mut receiver) => {
                    match receiver.wait_for(|outcome| outcome.is_some()).await {
                        Ok(outcome) => {
                            if let Some(result) = &*outcome {
                                return result.clone();
                            }
                        }
                        Err(_) => {
                            debug!(key = %key, "Single-flight leader abandoned, retrying");
                        }
                    }
                }
            }
        }
    }

    /// Number of flights currently running.
    pub fn in_flight(&self) -> usize {
        self.calls.len()
    }
}

impl<T> Default for SingleFlight<T>
where
    T: Clone + Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    #[tokio::test]
    async fn test_concurrent_calls_share_one_execution() {
        let flight = Arc::new(SingleFlight::<usize>::new());
        let executions = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::new();
        for _ in 0..8 {
            let flight = flight.clone();
            let executions = executions.clone();
            handles.push(tokio::spawn(async move {
                flight
                    .run("key", || async move {
                        tokio::time::sleep(Duration::from_millis(50)).await;
                        Ok(executions.fetch_add(1, Ordering::SeqCst) + 1)
                    })
                    .await
            }));
        }

        for handle in handles {
            assert_eq!(handle.await.unwrap().unwrap(), 1);
        }
        assert_eq!(executions.load(Ordering::SeqCst), 1);
        assert_eq!(flight.in_flight(), 0);
    }

    #[tokio::test]
    async fn test_waiters_receive_the_same_failure() {
        let flight = Arc::new(SingleFlight::<usize>::new());

        let leader = {
            let flight = flight.clone();
            tokio::spawn(async move {
                flight
                    .run("key", || async {
                        tokio::time::sleep(Duration::from_millis(50)).await;
                        Err(DataManagerError::ResourceCreation("unreachable".to_string()))
                    })
                    .await
            })
        };
        tokio::time::sleep(Duration::from_millis(10)).await;
        let follower = flight.run("key", || async { Ok(7) }).await;

        let leader = leader.await.unwrap();
        assert_eq!(leader, follower);
        assert_eq!(
            follower.unwrap_err(),
            DataManagerError::ResourceCreation("unreachable".to_string())
        );
    }

    #[tokio::test]
    async fn test_failure_is_not_cached() {
        let flight = SingleFlight::<usize>::new();

        let first = flight
            .run("key", || async {
                Err(DataManagerError::ResourceCreation("first".to_string()))
            })
            .await;
        let second = flight.run("key", || async { Ok(2) }).await;

        assert!(first.is_err());
        assert_eq!(second.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_cancelled_leader_hands_over() {
        let flight = Arc::new(SingleFlight::<usize>::new());

        let leader = {
            let flight = flight.clone();
            tokio::spawn(async move {
                flight
                    .run("key", || async {
                        tokio::time::sleep(Duration::from_secs(60)).await;
                        Ok(1)
                    })
                    .await
            })
        };
        tokio::time::sleep(Duration::from_millis(10)).await;

        let follower = {
            let flight = flight.clone();
            tokio::spawn(async move { flight.run("key", || async { Ok(2) }).await })
        };
        tokio::time::sleep(Duration::from_millis(10)).await;
        leader.abort();

        let result = tokio::time::timeout(Duration::from_secs(5), follower)
            .await
            .expect("follower should not hang")
            .unwrap();
        assert_eq!(result.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_distinct_keys_do_not_serialize() {
        let flight = Arc::new(SingleFlight::<usize>::new());
        let started = std::time::Instant::now();

        let mut handles = Vec::new();
        for index in 0..4 {
            let flight = flight.clone();
            handles.push(tokio::spawn(async move {
                flight
                    .run(&format!("key-{index}"), || async move {
                        tokio::time::sleep(Duration::from_millis(100)).await;
                        Ok(index)
                    })
                    .await
            }));
        }
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        assert!(started.elapsed() < Duration::from_millis(350));
    }
}
