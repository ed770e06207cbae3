#![allow(clippy::missing_errors_doc)] // Allow public functions without # Errors sections
#![allow(clippy::must_use_candidate)] // Allow methods without must_use when context is clear

//! # DataManager Core
//!
//! Lifecycle plumbing for a data-management service built from pluggable backends.
//!
//! ## Overview
//!
//! Backends (database pools, log stores, remote clients) are expensive to open and
//! must be released explicitly. This crate keeps exactly one live instance per key,
//! deduplicates concurrent creation, and closes everything together on shutdown while
//! reporting every failure.
//!
//! ## Module Organization
//!
//! - [`resource`] - Keyed resource registry with single-flight creation and aggregate close
//! - [`driver`] - Backend driver contract, adoption and built-in drivers
//! - [`transport`] - Log-line sinks with optional keyed read-back
//! - [`registry`] - Services and concurrent, fail-fast startup
//! - [`expiry`] - Retention policy and the periodic log-expiry task
//! - [`runtime`] - The start/stop lifecycle tying it all together
//! - [`config`] - Layered configuration
//! - [`error`] - Structured error handling
//! - [`logging`] - Structured logging
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use datamanager_core::config::DataManagerConfig;
//! use datamanager_core::registry::ServiceRegistry;
//! use datamanager_core::runtime::DataManager;
//!
//! # async fn example() -> datamanager_core::Result<()> {
//! datamanager_core::logging::init_structured_logging();
//!
//! let config = DataManagerConfig::load(None)?;
//! let manager = DataManager::new(config, ServiceRegistry::new())?;
//! manager.start().await?;
//! // ... serve ...
//! manager.shutdown().await?;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod driver;
pub mod error;
pub mod expiry;
pub mod logging;
pub mod registry;
pub mod resource;
pub mod runtime;
pub mod transport;

pub use config::{DataManagerConfig, TransportKind};
pub use driver::{adopt_driver, Driver, DriverResource};
pub use error::{BatchError, DataManagerError, Result};
pub use expiry::{LogExpiry, LogExpiryTask, RetentionPolicy};
pub use registry::{Service, ServiceRegistry, ServiceStatus, StartupSupervisor};
pub use resource::{Resource, ResourceManager};
pub use runtime::DataManager;
pub use transport::{Transport, TransportProvider};
