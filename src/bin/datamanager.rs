//! # DataManager
//!
//! Starts the data manager runtime and runs until Ctrl-C.
//!
//! Usage: `datamanager [CONFIG_FILE]`. Without a path an optional `datamanager.toml`
//! in the working directory is used; `DATAMANAGER_*` variables override both.

use anyhow::Context;
use async_trait::async_trait;
use datamanager_core::config::DataManagerConfig;
use datamanager_core::driver::{DriverResource, PostgresConfig, PostgresDriver};
use datamanager_core::logging::init_structured_logging;
use datamanager_core::registry::{Service, ServiceRegistry};
use datamanager_core::resource::{Resource, ResourceManager};
use datamanager_core::runtime::DataManager;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, error, info};

/// Key the primary database pool is stored under.
const PRIMARY_DATABASE: &str = "primary";

/// Opens the primary database pool during startup so a bad URL fails fast.
struct DatabaseService {
    resources: Arc<ResourceManager>,
    config: PostgresConfig,
}

#[async_trait]
impl Service for DatabaseService {
    fn name(&self) -> &str {
        "database"
    }

    async fn register(&self) -> datamanager_core::Result<()> {
        let config = self.config.clone();
        self.resources
            .get_resource(PRIMARY_DATABASE, || async move {
                let resource = DriverResource::adopt(PostgresDriver::new(config)).await?;
                Ok(resource as Arc<dyn Resource>)
            })
            .await?;
        Ok(())
    }
}

#[tokio::main]
async fn main() {
    init_structured_logging();

    if let Err(e) = run().await {
        error!("❌ datamanager failed: {e:#}");
        std::process::exit(1);
    }
}

async fn run() -> anyhow::Result<()> {
    let config_path = std::env::args().nth(1).map(PathBuf::from);
    let config = DataManagerConfig::load(config_path.as_deref())
        .context("failed to load configuration")?;
    debug!(
        config = %serde_json::to_string(&redacted(&config)).unwrap_or_default(),
        "Effective configuration"
    );

    let resources = Arc::new(ResourceManager::new());
    let mut registry = ServiceRegistry::new();
    if let Some(database_url) = &config.database_url {
        registry.add(Arc::new(DatabaseService {
            resources: resources.clone(),
            config: PostgresConfig::new(database_url.clone()),
        }))?;
    }

    let manager = DataManager::with_resources(config, registry, resources)
        .context("failed to build runtime")?;
    manager.start().await.context("startup failed")?;

    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for shutdown signal")?;
    info!("Shutdown signal received");

    manager.shutdown().await.context("shutdown failed")?;
    Ok(())
}

fn redacted(config: &DataManagerConfig) -> DataManagerConfig {
    let mut config = config.clone();
    config.database_url = config
        .database_url
        .map(|url| PostgresConfig::new(url).redacted_url());
    config
}
