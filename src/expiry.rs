//! # Log Expiry
//!
//! Periodic cleanup of expired log lines in an external log store.
//!
//! [`LogExpiryTask`] sweeps once as soon as it starts and then once per interval
//! until it receives a shutdown signal. A failed sweep is logged and the task keeps
//! going; it owns no state shared with the resource manager.

use crate::error::{DataManagerError, Result};
use crate::logging::log_error;
use async_trait::async_trait;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info};

/// How long log lines are kept.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetentionPolicy {
    /// Lines older than this many days are expired
    pub outdate_days: u32,
    /// Lines always kept per key, newest first, regardless of age
    pub min_log_num: usize,
}

impl Default for RetentionPolicy {
    fn default() -> Self {
        Self {
            outdate_days: 10,
            min_log_num: 10,
        }
    }
}

impl RetentionPolicy {
    /// Timestamp before which a line counts as expired.
    pub fn cutoff(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        now - ChronoDuration::days(i64::from(self.outdate_days))
    }

    /// How many of `recorded` (oldest first) may be dropped from the front.
    ///
    /// Stops at the first line newer than `cutoff` and never eats into the newest
    /// `min_log_num` lines.
    pub fn expired_prefix<I>(&self, recorded: I, cutoff: DateTime<Utc>) -> usize
    where
        I: ExactSizeIterator<Item = DateTime<Utc>>,
    {
        let removable = recorded.len().saturating_sub(self.min_log_num);
        recorded
            .take(removable)
            .take_while(|recorded_at| *recorded_at < cutoff)
            .count()
    }
}

/// A log store that can drop expired lines.
#[async_trait]
pub trait LogExpiry: Send + Sync {
    /// Remove lines expired under `policy`, returning how many were removed.
    async fn clear_expired(&self, policy: &RetentionPolicy) -> Result<usize>;
}

/// Handle to the running expiry loop.
pub struct LogExpiryTask {
    shutdown: Option<oneshot::Sender<()>>,
    handle: JoinHandle<()>,
}

impl LogExpiryTask {
    /// Spawn the sweep loop on the current runtime. `interval` must be non-zero.
    pub fn spawn(
        store: Arc<dyn LogExpiry>,
        policy: RetentionPolicy,
        interval: Duration,
    ) -> Result<Self> {
        if interval.is_zero() {
            return Err(DataManagerError::ConfigurationError(
                "log expiry interval must be greater than zero".to_string(),
            ));
        }

        let (shutdown, mut shutdown_rx) = oneshot::channel();

        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            info!(
                interval_secs = interval.as_secs(),
                outdate_days = policy.outdate_days,
                min_log_num = policy.min_log_num,
                "🧹 Log expiry task started"
            );

            loop {
                tokio::select! {
                    _ = &mut shutdown_rx => break,
                    _ = ticker.tick() => {
                        match store.clear_expired(&policy).await {
                            Ok(removed) => debug!(removed, "Log expiry sweep finished"),
                            Err(e) => log_error("log_expiry", "clear_expired", &e.to_string(), None),
                        }
                    }
                }
            }

            info!("Log expiry task stopped");
        });

        Ok(Self {
            shutdown: Some(shutdown),
            handle,
        })
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Signal the loop to stop and wait for it to exit.
    pub async fn stop(mut self) {
        if let Some(shutdown) = self.shutdown.take() {
            let _ = shutdown.send(());
        }
        if let Err(e) = self.handle.await {
            log_error("log_expiry", "stop", &e.to_string(), None);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingStore {
        sweeps: AtomicUsize,
        fail: bool,
    }

    #[async_trait]
    impl LogExpiry for CountingStore {
        async fn clear_expired(&self, _policy: &RetentionPolicy) -> Result<usize> {
            self.sweeps.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                Err(DataManagerError::Internal("store offline".to_string()))
            } else {
                Ok(0)
            }
        }
    }

    #[test]
    fn test_cutoff_subtracts_outdate_days() {
        let policy = RetentionPolicy {
            outdate_days: 3,
            min_log_num: 0,
        };
        let now = Utc::now();
        assert_eq!(now - policy.cutoff(now), ChronoDuration::days(3));
    }

    #[test]
    fn test_expired_prefix_respects_cutoff_and_minimum() {
        let now = Utc::now();
        let policy = RetentionPolicy {
            outdate_days: 10,
            min_log_num: 2,
        };
        let cutoff = policy.cutoff(now);
        let out_of_order = [
            now - ChronoDuration::days(40),
            now - ChronoDuration::days(1),
            now - ChronoDuration::days(30),
            now - ChronoDuration::days(20),
            now - ChronoDuration::days(15),
        ];
        let all_old = [
            now - ChronoDuration::days(40),
            now - ChronoDuration::days(30),
            now - ChronoDuration::days(20),
        ];

        // Stops at the first fresh line even though older ones follow it.
        assert_eq!(policy.expired_prefix(out_of_order.iter().copied(), cutoff), 1);
        // The newest two always stay.
        assert_eq!(policy.expired_prefix(all_old.iter().copied(), cutoff), 1);
        assert_eq!(policy.expired_prefix(std::iter::empty(), cutoff), 0);
    }

    #[tokio::test]
    async fn test_zero_interval_is_rejected() {
        let store = Arc::new(CountingStore {
            sweeps: AtomicUsize::new(0),
            fail: false,
        });

        let result = LogExpiryTask::spawn(store.clone(), RetentionPolicy::default(), Duration::ZERO);

        assert!(matches!(
            result,
            Err(DataManagerError::ConfigurationError(_))
        ));
        tokio::task::yield_now().await;
        assert_eq!(store.sweeps.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_sweeps_immediately_then_every_interval() {
        let store = Arc::new(CountingStore {
            sweeps: AtomicUsize::new(0),
            fail: false,
        });
        let task = LogExpiryTask::spawn(
            store.clone(),
            RetentionPolicy::default(),
            Duration::from_secs(3600),
        )
        .unwrap();

        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(store.sweeps.load(Ordering::SeqCst), 1);

        tokio::time::sleep(Duration::from_secs(3600 * 2)).await;
        assert_eq!(store.sweeps.load(Ordering::SeqCst), 3);

        task.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_sweep_does_not_stop_the_task() {
        let store = Arc::new(CountingStore {
            sweeps: AtomicUsize::new(0),
            fail: true,
        });
        let task = LogExpiryTask::spawn(
            store.clone(),
            RetentionPolicy::default(),
            Duration::from_secs(60),
        )
        .unwrap();

        tokio::time::sleep(Duration::from_secs(61)).await;
        assert_eq!(store.sweeps.load(Ordering::SeqCst), 2);
        assert!(!task.is_finished());

        task.stop().await;
    }
}
