//! # Resource Management
//!
//! Keyed lifecycle registry for live, closable backend resources.
//!
//! ## Overview
//!
//! A [`Resource`] is anything that must be released explicitly: a database pool, a
//! log store handle, an adopted [`Driver`](crate::driver::Driver). The
//! [`ResourceManager`] keeps at most one live resource per caller-chosen key and
//! creates missing ones through a caller-supplied factory.
//!
//! ## Architecture
//!
//! ```text
//! ResourceManager<R>
//! ├── resources: RwLock<Option<HashMap<String, Arc<R>>>>   (None once closed)
//! └── flights:   SingleFlight<Arc<R>>                       (one creation per key)
//! ```
//!
//! ## Usage
//!
//! ```rust
//! use datamanager_core::resource::{Resource, ResourceManager};
//! use datamanager_core::Result;
//! use std::sync::Arc;
//!
//! struct Connection;
//!
//! #[async_trait::async_trait]
//! impl Resource for Connection {
//!     async fn close(&self) -> Result<()> {
//!         Ok(())
//!     }
//! }
//!
//! # async fn example() -> Result<()> {
//! let manager: ResourceManager = ResourceManager::new();
//! let conn = manager
//!     .get_resource("primary", || async {
//!         Ok(Arc::new(Connection) as Arc<dyn Resource>)
//!     })
//!     .await?;
//! # let _ = conn;
//! manager.close().await?;
//! # Ok(())
//! # }
//! ```

pub mod manager;
pub mod single_flight;

pub use manager::ResourceManager;
pub use single_flight::SingleFlight;

use crate::error::Result;
use async_trait::async_trait;

/// A closable entity owned by a [`ResourceManager`].
#[async_trait]
pub trait Resource: Send + Sync + 'static {
    /// Release everything the resource holds.
    ///
    /// Called exactly once by [`ResourceManager::close`]. Repeated calls from other
    /// owners are the implementation's concern.
    async fn close(&self) -> Result<()>;
}
