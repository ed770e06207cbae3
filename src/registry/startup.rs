//! # Startup Supervisor
//!
//! Runs every service's registration concurrently and treats the first failure as
//! fatal.
//!
//! Each registration runs as its own task on a `JoinSet`. As soon as one of them
//! returns an error or panics, the remaining tasks are aborted and awaited, and the
//! failure is returned as [`DataManagerError::ServiceRegistration`]. There is no
//! partial-start mode and services that already registered are not rolled back; the
//! caller is expected to report the error and halt.

use crate::error::{DataManagerError, Result};
use crate::logging::{log_error, log_service_operation};
use crate::registry::{ServiceRegistry, ServiceStatus};
use futures::FutureExt;
use std::panic::AssertUnwindSafe;
use std::time::{Duration, Instant};
use tokio::task::JoinSet;
use tracing::info;

/// Outcome of a successful startup.
#[derive(Debug, Clone)]
pub struct StartupReport {
    /// Service names in the order their registration completed
    pub registered: Vec<String>,
    pub elapsed: Duration,
}

#[derive(Debug, Default, Clone, Copy)]
pub struct StartupSupervisor;

impl StartupSupervisor {
    pub fn new() -> Self {
        Self
    }

    /// Register every service in `registry` concurrently.
    pub async fn register_all(&self, registry: &ServiceRegistry) -> Result<StartupReport> {
        let started = Instant::now();
        let mut tasks = JoinSet::new();

        for service in registry.services() {
            let service = service.clone();
            tasks.spawn(async move {
                let name = service.name().to_string();
                let result = match AssertUnwindSafe(service.register()).catch_unwind().await {
                    Ok(result) => result,
                    Err(_) => Err(DataManagerError::Internal(
                        "registration panicked".to_string(),
                    )),
                };
                (name, result)
            });
        }

        let mut registered = Vec::with_capacity(registry.len());

        while let Some(joined) = tasks.join_next().await {
            let failure = match joined {
                Ok((name, Ok(()))) => {
                    registry.set_status(&name, ServiceStatus::Registered);
                    log_service_operation("register", &name, "ok", None);
                    registered.push(name);
                    continue;
                }
                Ok((name, Err(e))) => DataManagerError::ServiceRegistration {
                    service: name,
                    message: e.to_string(),
                },
                Err(join_error) => DataManagerError::Internal(format!(
                    "registration task failed: {join_error}"
                )),
            };

            log_error("startup", "register", &failure.to_string(), None);
            tasks.shutdown().await;
            return Err(failure);
        }

        let elapsed = started.elapsed();
        info!(
            services = registered.len(),
            elapsed_ms = elapsed.as_millis() as u64,
            "🚀 All services registered"
        );
        Ok(StartupReport {
            registered,
            elapsed,
        })
    }
}
