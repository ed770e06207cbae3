//! In-process key/value driver.

use crate::driver::Driver;
use crate::error::Result;
use async_trait::async_trait;
use dashmap::DashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Shared handle to the store behind a [`MemoryDriver`].
pub type MemoryStore = Arc<DashMap<String, Vec<u8>>>;

#[derive(Debug)]
pub struct MemoryDriver {
    name: String,
    store: Option<MemoryStore>,
    closed: AtomicBool,
}

impl MemoryDriver {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            store: None,
            closed: AtomicBool::new(false),
        }
    }
}

#[async_trait]
impl Driver for MemoryDriver {
    type Handle = MemoryStore;

    fn name(&self) -> &str {
        &self.name
    }

    async fn ping(&self) -> bool {
        self.store.is_some() && !self.closed.load(Ordering::Acquire)
    }

    async fn initial(&mut self) -> Result<()> {
        if self.store.is_none() {
            self.store = Some(Arc::new(DashMap::new()));
        }
        self.closed.store(false, Ordering::Release);
        Ok(())
    }

    fn connection(&self) -> Option<MemoryStore> {
        if self.closed.load(Ordering::Acquire) {
            return None;
        }
        self.store.clone()
    }

    async fn close(&self) -> Result<()> {
        if !self.closed.swap(true, Ordering::AcqRel) {
            if let Some(store) = &self.store {
                store.clear();
            }
        }
        Ok(())
    }
}
