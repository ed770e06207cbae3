//! In-memory keyed transport
//!
//! Lines are grouped by [`line_key`]. Each key holds at most `capacity` lines; when a key is
//! full its oldest line is dropped and counted.

use crate::error::Result;
use crate::expiry::{LogExpiry, RetentionPolicy};
use crate::transport::{line_key, Transport};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Debug, Clone)]
struct LogEntry {
    recorded_at: DateTime<Utc>,
    line: String,
}

#[derive(Debug)]
pub struct MemoryTransport {
    lines: DashMap<String, VecDeque<LogEntry>>,
    capacity: usize,
    dropped: AtomicU64,
}

impl MemoryTransport {
    pub fn new(capacity: usize) -> Self {
        Self {
            lines: DashMap::new(),
            capacity: capacity.max(1),
            dropped: AtomicU64::new(0),
        }
    }

    /// Append a line with an explicit timestamp.
    pub fn save_at(&self, line: &str, recorded_at: DateTime<Utc>) {
        let mut entries = self.lines.entry(line_key(line).to_string()).or_default();
        if entries.len() >= self.capacity {
            entries.pop_front();
            self.dropped.fetch_add(1, Ordering::Relaxed);
        }
        entries.push_back(LogEntry {
            recorded_at,
            line: line.to_string(),
        });
    }

    pub fn keys(&self) -> Vec<String> {
        self.lines.iter().map(|entry| entry.key().clone()).collect()
    }

    /// Total number of lines held across all keys.
    pub fn len(&self) -> usize {
        self.lines.iter().map(|entry| entry.value().len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl Transport for MemoryTransport {
    fn name(&self) -> &'static str {
        "memory"
    }

    fn save(&self, line: &str) {
        self.save_at(line, Utc::now());
    }

    async fn load(&self, key: &str) -> Result<Vec<String>> {
        Ok(self
            .lines
            .get(key)
            .map(|entries| entries.iter().map(|entry| entry.line.clone()).collect())
            .unwrap_or_default())
    }

    fn dropped_lines(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl LogExpiry for MemoryTransport {
    async fn clear_expired(&self, policy: &RetentionPolicy) -> Result<usize> {
        let cutoff = policy.cutoff(Utc::now());
        let mut removed = 0;

        for mut entries in self.lines.iter_mut() {
            let expired =
                policy.expired_prefix(entries.iter().map(|entry| entry.recorded_at), cutoff);
            entries.drain(..expired);
            removed += expired;
        }
        self.lines.retain(|_, entries| !entries.is_empty());

        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[tokio::test]
    async fn test_load_returns_lines_oldest_first() {
        let transport = MemoryTransport::new(10);
        transport.save("users: first");
        transport.save("orders: other");
        transport.save("users: second");

        assert_eq!(
            transport.load("users").await.unwrap(),
            vec!["users: first".to_string(), "users: second".to_string()]
        );
        assert!(transport.load("missing").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_full_key_drops_oldest_and_counts() {
        let transport = MemoryTransport::new(2);
        transport.save("k: 1");
        transport.save("k: 2");
        transport.save("k: 3");

        assert_eq!(
            transport.load("k").await.unwrap(),
            vec!["k: 2".to_string(), "k: 3".to_string()]
        );
        assert_eq!(transport.dropped_lines(), 1);
    }

    #[tokio::test]
    async fn test_expiry_keeps_minimum_lines() {
        let transport = MemoryTransport::new(100);
        let old = Utc::now() - Duration::days(30);
        for index in 0..5 {
            transport.save_at(&format!("users: old {index}"), old);
        }
        transport.save("users: fresh");

        let policy = RetentionPolicy {
            outdate_days: 10,
            min_log_num: 3,
        };
        let removed = transport.clear_expired(&policy).await.unwrap();

        assert_eq!(removed, 3);
        assert_eq!(
            transport.load("users").await.unwrap(),
            vec![
                "users: old 3".to_string(),
                "users: old 4".to_string(),
                "users: fresh".to_string(),
            ]
        );
    }

    #[tokio::test]
    async fn test_expiry_removes_empty_keys() {
        let transport = MemoryTransport::new(100);
        transport.save_at("gone: x", Utc::now() - Duration::days(11));

        let policy = RetentionPolicy {
            outdate_days: 10,
            min_log_num: 0,
        };
        assert_eq!(transport.clear_expired(&policy).await.unwrap(), 1);
        assert!(transport.is_empty());
        assert!(transport.keys().is_empty());
    }
}
