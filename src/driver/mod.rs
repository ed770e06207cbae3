//! # Drivers
//!
//! Capability contract for pluggable backend connections.
//!
//! ## Overview
//!
//! A [`Driver`] wraps one connection-like backend: it can check connectivity, set
//! itself up, hand out a typed connection handle and shut down. Drivers are not owned
//! by the resource manager directly; [`DriverResource`] adapts an adopted driver into
//! a [`Resource`] so it can be stored under a key.
//!
//! ## Available Drivers
//!
//! - **PostgresDriver**: sqlx `PgPool`, handed out as-is since the pool manages itself
//! - **MemoryDriver**: in-process key/value store for embedding and tests
//!
//! ## Usage
//!
//! ```rust,no_run
//! use datamanager_core::driver::{DriverResource, MemoryDriver};
//! use datamanager_core::resource::ResourceManager;
//!
//! # async fn example() -> datamanager_core::Result<()> {
//! let manager = ResourceManager::<DriverResource<MemoryDriver>>::new();
//! let resource = manager
//!     .get_resource("cache", || DriverResource::adopt(MemoryDriver::new("cache")))
//!     .await?;
//! let store = resource.connection().expect("adopted driver has a handle");
//! store.insert("k".to_string(), b"v".to_vec());
//! # Ok(())
//! # }
//! ```

pub mod memory;
pub mod postgres;

pub use memory::{MemoryDriver, MemoryStore};
pub use postgres::{PostgresConfig, PostgresDriver};

use crate::error::{DataManagerError, Result};
use crate::logging::log_driver_operation;
use crate::resource::Resource;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Instant;

/// One pluggable backend connection.
#[async_trait]
pub trait Driver: Send + Sync + 'static {
    /// Connection handle given to the resource's users.
    type Handle: Clone + Send + Sync + 'static;

    /// Name used in logs and errors.
    fn name(&self) -> &str;

    /// Connectivity check. Bounded in time and free of observable side effects.
    async fn ping(&self) -> bool;

    /// One-time setup before first use.
    async fn initial(&mut self) -> Result<()>;

    /// The connection handle, or `None` before a successful [`Driver::initial`].
    fn connection(&self) -> Option<Self::Handle>;

    /// Release the backend. Idempotence is up to the implementation.
    async fn close(&self) -> Result<()>;
}

/// Initialize `driver` and confirm it answers a ping.
///
/// Either failure aborts adoption; a driver that initialized but does not answer is
/// closed before the error is returned.
pub async fn adopt_driver<D: Driver>(mut driver: D) -> Result<D> {
    let started = Instant::now();

    if let Err(e) = driver.initial().await {
        log_driver_operation("initial", driver.name(), "failed", None, Some(&e.to_string()));
        return Err(e);
    }

    if !driver.ping().await {
        let name = driver.name().to_string();
        log_driver_operation("ping", &name, "failed", None, None);
        if let Err(e) = driver.close().await {
            log_driver_operation("close", &name, "failed", None, Some(&e.to_string()));
        }
        return Err(DataManagerError::DriverUnavailable(format!(
            "{name} did not answer after initialization"
        )));
    }

    log_driver_operation(
        "adopt",
        driver.name(),
        "ok",
        Some(started.elapsed().as_millis() as u64),
        None,
    );
    Ok(driver)
}

/// An adopted driver stored in a [`ResourceManager`](crate::resource::ResourceManager).
pub struct DriverResource<D: Driver> {
    driver: D,
}

impl<D: Driver> DriverResource<D> {
    /// Wrap a driver that has already been initialized.
    pub fn new(driver: D) -> Self {
        Self { driver }
    }

    /// Adopt `driver` and wrap it, ready to be returned from a resource factory.
    pub async fn adopt(driver: D) -> Result<Arc<Self>> {
        let driver = adopt_driver(driver).await?;
        Ok(Arc::new(Self::new(driver)))
    }

    pub fn driver(&self) -> &D {
        &self.driver
    }

    pub fn connection(&self) -> Option<D::Handle> {
        self.driver.connection()
    }

    pub async fn ping(&self) -> bool {
        self.driver.ping().await
    }
}

#[async_trait]
impl<D: Driver> Resource for DriverResource<D> {
    async fn close(&self) -> Result<()> {
        self.driver.close().await
    }
}
