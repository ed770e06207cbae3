//! # DataManager Runtime
//!
//! Ties configuration, the service registry, the shared resource manager and the log
//! transport into one start/stop lifecycle.
//!
//! ## Lifecycle
//!
//! 1. `start()` registers every service concurrently; the first failure aborts startup.
//! 2. Registered services are marked running and, when the transport keeps lines,
//!    the log-expiry task is spawned.
//! 3. `shutdown()` stops the expiry task, marks services stopped, flushes the
//!    transport and closes every managed resource, reporting all close failures together.

use crate::config::DataManagerConfig;
use crate::error::{DataManagerError, Result};
use crate::expiry::LogExpiryTask;
use crate::logging::log_error;
use crate::registry::{
    ServiceRegistry, ServiceStats, ServiceStatus, StartupReport, StartupSupervisor,
};
use crate::resource::ResourceManager;
use crate::transport::{Transport, TransportProvider};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{info, warn};

/// Runtime handle for the data manager
pub struct DataManager {
    config: DataManagerConfig,
    registry: Arc<ServiceRegistry>,
    resources: Arc<ResourceManager>,
    transport: Arc<TransportProvider>,
    expiry: Mutex<Option<LogExpiryTask>>,
    running: AtomicBool,
}

impl DataManager {
    /// Validate `config` and build the configured transport.
    pub fn new(config: DataManagerConfig, registry: ServiceRegistry) -> Result<Self> {
        Self::with_resources(config, registry, Arc::new(ResourceManager::new()))
    }

    /// Use a resource manager the services already hold a handle to.
    pub fn with_resources(
        config: DataManagerConfig,
        registry: ServiceRegistry,
        resources: Arc<ResourceManager>,
    ) -> Result<Self> {
        config.validate()?;
        let transport = Arc::new(TransportProvider::from_config(&config)?);
        Ok(Self {
            config,
            registry: Arc::new(registry),
            resources,
            transport,
            expiry: Mutex::new(None),
            running: AtomicBool::new(false),
        })
    }

    /// Register all services and start background maintenance.
    pub async fn start(&self) -> Result<StartupReport> {
        if self.running.swap(true, Ordering::SeqCst) {
            return Err(DataManagerError::Internal(
                "data manager already started".to_string(),
            ));
        }

        info!(
            environment = %self.config.environment,
            services = self.registry.len(),
            "🚀 Starting data manager"
        );

        let report = match StartupSupervisor::new().register_all(&self.registry).await {
            Ok(report) => report,
            Err(e) => {
                self.running.store(false, Ordering::SeqCst);
                return Err(e);
            }
        };
        self.registry
            .transition_all(ServiceStatus::Registered, ServiceStatus::Running);

        if let Some(store) = self.transport.expiry_store() {
            let task = match LogExpiryTask::spawn(
                store,
                self.config.retention,
                self.config.log_expiry_interval(),
            ) {
                Ok(task) => task,
                Err(e) => {
                    self.registry
                        .transition_all(ServiceStatus::Running, ServiceStatus::Registered);
                    self.running.store(false, Ordering::SeqCst);
                    return Err(e);
                }
            };
            *self.expiry.lock() = Some(task);
        }

        info!(
            registered = report.registered.len(),
            elapsed_ms = report.elapsed.as_millis() as u64,
            "✅ Data manager started"
        );
        Ok(report)
    }

    /// Shared resource manager for services to obtain connections from.
    pub fn resources(&self) -> Arc<ResourceManager> {
        self.resources.clone()
    }

    pub fn transport(&self) -> Arc<TransportProvider> {
        self.transport.clone()
    }

    pub fn registry(&self) -> Arc<ServiceRegistry> {
        self.registry.clone()
    }

    pub fn config(&self) -> &DataManagerConfig {
        &self.config
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Stop background work and close every managed resource.
    ///
    /// Close failures come back as a single [`DataManagerError::Batch`]. Calling this
    /// more than once is harmless.
    pub async fn shutdown(&self) -> Result<()> {
        if !self.running.swap(false, Ordering::SeqCst) {
            warn!("Data manager shutdown requested while not running");
        }

        let expiry = self.expiry.lock().take();
        if let Some(task) = expiry {
            task.stop().await;
        }

        self.registry
            .transition_all(ServiceStatus::Running, ServiceStatus::Stopped);

        if let Err(e) = self.transport.flush().await {
            log_error("runtime", "flush_transport", &e.to_string(), None);
        }

        self.resources.close().await?;
        info!("🛑 Data manager stopped");
        Ok(())
    }

    pub fn status(&self) -> RuntimeStatus {
        RuntimeStatus {
            running: self.is_running(),
            environment: self.config.environment.clone(),
            transport: self.transport.name(),
            open_resources: self.resources.len(),
            dropped_log_lines: self.transport.dropped_lines(),
            services: self.registry.stats(),
        }
    }
}

/// Point-in-time view of the runtime
#[derive(Debug, Clone)]
pub struct RuntimeStatus {
    pub running: bool,
    pub environment: String,
    pub transport: &'static str,
    pub open_resources: usize,
    pub dropped_log_lines: u64,
    pub services: ServiceStats,
}
