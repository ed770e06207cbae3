//! # Service Registry
//!
//! Ordered collection of independently implemented application services.
//!
//! ## Overview
//!
//! Each [`Service`] exposes a name and a one-shot registration action. The registry
//! keeps services in insertion order, rejects duplicate names and tracks the
//! lifecycle [`ServiceStatus`] of each one. Registration itself is driven by the
//! [`StartupSupervisor`](crate::registry::StartupSupervisor).
//!
//! ## Usage
//!
//! ```rust
//! use datamanager_core::registry::{Service, ServiceRegistry, ServiceStatus};
//! use std::sync::Arc;
//!
//! struct AuditService;
//!
//! #[async_trait::async_trait]
//! impl Service for AuditService {
//!     fn name(&self) -> &str {
//!         "audit"
//!     }
//!
//!     async fn register(&self) -> datamanager_core::Result<()> {
//!         Ok(())
//!     }
//! }
//!
//! # fn example() -> datamanager_core::Result<()> {
//! let mut registry = ServiceRegistry::new();
//! registry.add(Arc::new(AuditService))?;
//! assert_eq!(registry.status("audit"), Some(ServiceStatus::Unregistered));
//! # Ok(())
//! # }
//! ```

use crate::error::{DataManagerError, Result};
use async_trait::async_trait;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info};

/// A unit with a single startup registration action.
#[async_trait]
pub trait Service: Send + Sync + 'static {
    /// Unique service name
    fn name(&self) -> &str;

    /// Register the service. Called once, at startup.
    async fn register(&self) -> Result<()>;
}

/// Service lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ServiceStatus {
    Unregistered,
    Registered,
    Running,
    Stopped,
}

impl fmt::Display for ServiceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ServiceStatus::Unregistered => "unregistered",
            ServiceStatus::Registered => "registered",
            ServiceStatus::Running => "running",
            ServiceStatus::Stopped => "stopped",
        };
        f.write_str(label)
    }
}

/// Registry of services, in the order they were added
#[derive(Default)]
pub struct ServiceRegistry {
    services: Vec<Arc<dyn Service>>,
    statuses: DashMap<String, ServiceStatus>,
}

impl ServiceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a service. Names must be unique.
    pub fn add(&mut self, service: Arc<dyn Service>) -> Result<()> {
        let name = service.name().to_string();
        if self.statuses.contains_key(&name) {
            return Err(DataManagerError::DuplicateService(name));
        }

        self.statuses.insert(name.clone(), ServiceStatus::Unregistered);
        self.services.push(service);
        info!("Added service '{}'", name);
        Ok(())
    }

    /// All services in insertion order
    pub fn services(&self) -> &[Arc<dyn Service>] {
        &self.services
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Service>> {
        self.services
            .iter()
            .find(|service| service.name() == name)
            .cloned()
    }

    pub fn status(&self, name: &str) -> Option<ServiceStatus> {
        self.statuses.get(name).map(|status| *status)
    }

    /// Record a lifecycle transition; unknown names are ignored.
    pub fn set_status(&self, name: &str, status: ServiceStatus) {
        if let Some(mut current) = self.statuses.get_mut(name) {
            debug!(service = %name, from = %*current, to = %status, "Service status changed");
            *current = status;
        }
    }

    /// Move every service currently in `from` to `to`.
    pub fn transition_all(&self, from: ServiceStatus, to: ServiceStatus) {
        for mut entry in self.statuses.iter_mut() {
            if *entry.value() == from {
                *entry.value_mut() = to;
            }
        }
    }

    pub fn len(&self) -> usize {
        self.services.len()
    }

    pub fn is_empty(&self) -> bool {
        self.services.is_empty()
    }

    pub fn stats(&self) -> ServiceStats {
        let mut stats = ServiceStats::default();

        for entry in self.statuses.iter() {
            stats.total_services += 1;
            match entry.value() {
                ServiceStatus::Unregistered => stats.unregistered_services += 1,
                ServiceStatus::Registered => stats.registered_services += 1,
                ServiceStatus::Running => stats.running_services += 1,
                ServiceStatus::Stopped => stats.stopped_services += 1,
            }
        }

        stats
    }
}

impl fmt::Debug for ServiceRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<&str> = self.services.iter().map(|service| service.name()).collect();
        f.debug_struct("ServiceRegistry")
            .field("services", &names)
            .finish()
    }
}

/// Statistics about registered services
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ServiceStats {
    pub total_services: usize,
    pub unregistered_services: usize,
    pub registered_services: usize,
    pub running_services: usize,
    pub stopped_services: usize,
}
