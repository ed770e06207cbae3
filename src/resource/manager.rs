//! # Resource Manager
//!
//! Concurrent keyed registry of live resources with deduplicated creation and
//! aggregate shutdown.
//!
//! ## Key Features
//!
//! - **One resource per key**: a warm key is served from the map under a shared lock
//! - **Single-flight creation**: racing callers on a cold key share one factory call
//! - **No negative caching**: a failed factory leaves the key free for the next caller
//! - **Aggregate close**: every resource is closed, every failure lands in a [`BatchError`]
//!
//! After [`ResourceManager::close`] the manager rejects further requests with
//! [`DataManagerError::ManagerClosed`].

use crate::error::{BatchError, DataManagerError, Result};
use crate::logging::log_resource_operation;
use crate::resource::single_flight::SingleFlight;
use crate::resource::Resource;
use futures::future::join_all;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Registry of live resources keyed by caller-chosen strings.
pub struct ResourceManager<R: Resource + ?Sized = dyn Resource> {
    /// Live resources; `None` once the manager has been closed
    resources: RwLock<Option<HashMap<String, Arc<R>>>>,
    /// Creations currently in progress
    flights: SingleFlight<Arc<R>>,
}

impl<R: Resource + ?Sized> ResourceManager<R> {
    pub fn new() -> Self {
        Self {
            resources: RwLock::new(Some(HashMap::new())),
            flights: SingleFlight::new(),
        }
    }

    /// Return the resource stored under `key`, creating it with `create` if needed.
    ///
    /// Concurrent callers for the same missing key wait for a single invocation of
    /// `create` and all observe its outcome. Factory errors are returned as-is and
    /// are not remembered.
    pub async fn get_resource<F, Fut>(&self, key: &str, create: F) -> Result<Arc<R>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Arc<R>>>,
    {
        if let Some(existing) = self.lookup(key)? {
            return Ok(existing);
        }

        self.flights
            .run(key, || async move {
                // Another flight may have finished between the fast path and here.
                if let Some(existing) = self.lookup(key)? {
                    return Ok(existing);
                }

                let started = Instant::now();
                let resource = match create().await {
                    Ok(resource) => resource,
                    Err(e) => {
                        warn!(key = %key, error = %e, "Resource creation failed");
                        return Err(e);
                    }
                };

                self.insert(key, resource.clone()).await?;
                log_resource_operation(
                    "create",
                    key,
                    "ok",
                    Some(&format!("{}ms", started.elapsed().as_millis())),
                );
                Ok(resource)
            })
            .await
    }

    fn lookup(&self, key: &str) -> Result<Option<Arc<R>>> {
        let resources = self.resources.read();
        match resources.as_ref() {
            Some(map) => Ok(map.get(key).cloned()),
            None => Err(DataManagerError::ManagerClosed),
        }
    }

    async fn insert(&self, key: &str, resource: Arc<R>) -> Result<()> {
        let stored = {
            let mut resources = self.resources.write();
            match resources.as_mut() {
                Some(map) => {
                    map.insert(key.to_string(), resource.clone());
                    true
                }
                None => false,
            }
        };

        if stored {
            return Ok(());
        }

        // Created while the manager was shutting down; nobody else will close it.
        warn!(key = %key, "Manager closed during creation, closing orphaned resource");
        if let Err(e) = resource.close().await {
            warn!(key = %key, error = %e, "Failed to close orphaned resource");
        }
        Err(DataManagerError::ManagerClosed)
    }

    /// Close every managed resource and discard the set.
    ///
    /// All closes are attempted regardless of earlier failures. Returns `Ok(())` when
    /// every close succeeded, otherwise a [`BatchError`] with one entry per failure.
    /// Closing an already closed manager is a no-op.
    pub async fn close(&self) -> std::result::Result<(), BatchError> {
        let detached = self.resources.write().take();
        let Some(resources) = detached else {
            debug!("Resource manager already closed");
            return Ok(());
        };

        info!(count = resources.len(), "Closing managed resources");

        let closes = resources.into_iter().map(|(key, resource)| async move {
            let result = resource.close().await;
            match &result {
                Ok(()) => log_resource_operation("close", &key, "ok", None),
                Err(e) => log_resource_operation("close", &key, "failed", Some(&e.to_string())),
            }
            result
        });

        let mut batch = BatchError::new();
        for result in join_all(closes).await {
            batch.add_result(result);
        }

        if !batch.is_empty() {
            warn!(failures = batch.len(), "Some resources failed to close");
        }
        batch.into_result()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.resources
            .read()
            .as_ref()
            .is_some_and(|map| map.contains_key(key))
    }

    pub fn len(&self) -> usize {
        self.resources.read().as_ref().map_or(0, HashMap::len)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Keys of the live resources, in no particular order.
    pub fn keys(&self) -> Vec<String> {
        self.resources
            .read()
            .as_ref()
            .map(|map| map.keys().cloned().collect())
            .unwrap_or_default()
    }

    pub fn is_closed(&self) -> bool {
        self.resources.read().is_none()
    }
}

impl<R: Resource + ?Sized> Default for ResourceManager<R> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R: Resource + ?Sized> std::fmt::Debug for ResourceManager<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResourceManager")
            .field("resources", &self.len())
            .field("closed", &self.is_closed())
            .field("in_flight", &self.flights.in_flight())
            .finish()
    }
}
