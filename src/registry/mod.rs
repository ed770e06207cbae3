//! # Service Registry
//!
//! Services and their startup orchestration.
//!
//! ## Architecture
//!
//! ```text
//! Registry
//! ├── ServiceRegistry     (ordered services + lifecycle status)
//! └── StartupSupervisor   (concurrent registration, fail-fast)
//! ```

pub mod service_registry;
pub mod startup;

pub use service_registry::{Service, ServiceRegistry, ServiceStats, ServiceStatus};
pub use startup::{StartupReport, StartupSupervisor};
