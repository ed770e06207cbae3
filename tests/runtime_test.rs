//! DataManager runtime integration tests
//!
//! Services registering against a shared resource manager, fail-fast startup and
//! the log-expiry task running against the in-memory transport.

use async_trait::async_trait;
use chrono::{Duration as ChronoDuration, Utc};
use datamanager_core::config::{DataManagerConfig, TransportKind};
use datamanager_core::driver::{DriverResource, MemoryDriver};
use datamanager_core::expiry::RetentionPolicy;
use datamanager_core::registry::{Service, ServiceRegistry, ServiceStatus};
use datamanager_core::resource::{Resource, ResourceManager};
use datamanager_core::runtime::DataManager;
use datamanager_core::transport::{Transport, TransportProvider};
use datamanager_core::{DataManagerError, Result};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Registers by opening the shared key/value store.
struct StoreBackedService {
    name: &'static str,
    resources: Arc<ResourceManager>,
    adoptions: Arc<AtomicUsize>,
}

#[async_trait]
impl Service for StoreBackedService {
    fn name(&self) -> &str {
        self.name
    }

    async fn register(&self) -> Result<()> {
        let adoptions = self.adoptions.clone();
        self.resources
            .get_resource("kv", || async move {
                adoptions.fetch_add(1, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(20)).await;
                let resource = DriverResource::adopt(MemoryDriver::new("kv")).await?;
                Ok(resource as Arc<dyn Resource>)
            })
            .await?;
        Ok(())
    }
}

struct RejectingService;

#[async_trait]
impl Service for RejectingService {
    fn name(&self) -> &str {
        "policy"
    }

    async fn register(&self) -> Result<()> {
        Err(DataManagerError::ConfigurationError(
            "policy table missing".to_string(),
        ))
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn services_share_one_backend_through_the_resource_manager() {
    let resources = Arc::new(ResourceManager::new());
    let adoptions = Arc::new(AtomicUsize::new(0));

    let mut registry = ServiceRegistry::new();
    for name in ["meta", "dblog", "audit"] {
        registry
            .add(Arc::new(StoreBackedService {
                name,
                resources: resources.clone(),
                adoptions: adoptions.clone(),
            }))
            .unwrap();
    }

    let manager =
        DataManager::with_resources(DataManagerConfig::default(), registry, resources).unwrap();
    let report = manager.start().await.unwrap();

    assert_eq!(report.registered.len(), 3);
    assert_eq!(adoptions.load(Ordering::SeqCst), 1);

    let status = manager.status();
    assert!(status.running);
    assert_eq!(status.open_resources, 1);
    assert_eq!(status.services.running_services, 3);

    manager.shutdown().await.unwrap();
    assert_eq!(manager.registry().status("audit"), Some(ServiceStatus::Stopped));
    assert!(manager.resources().is_closed());
}

#[tokio::test]
async fn failing_service_aborts_startup() {
    let mut registry = ServiceRegistry::new();
    registry.add(Arc::new(RejectingService)).unwrap();

    let manager = DataManager::new(DataManagerConfig::default(), registry).unwrap();
    let err = manager.start().await.unwrap_err();

    match err {
        DataManagerError::ServiceRegistration { service, message } => {
            assert_eq!(service, "policy");
            assert!(message.contains("policy table missing"));
        }
        other => panic!("expected registration failure, got {other:?}"),
    }
    assert!(!manager.is_running());
}

#[tokio::test]
async fn expiry_task_sweeps_memory_transport_on_start() {
    let config = DataManagerConfig {
        transport: TransportKind::Memory,
        retention: RetentionPolicy {
            outdate_days: 10,
            min_log_num: 0,
        },
        ..DataManagerConfig::default()
    };
    let manager = DataManager::new(config, ServiceRegistry::new()).unwrap();

    let transport = manager.transport();
    let TransportProvider::Memory(store) = transport.as_ref() else {
        panic!("expected memory transport");
    };
    let stale = Utc::now() - ChronoDuration::days(30);
    for index in 0..3 {
        store.save_at(&format!("audit: stale {index}"), stale);
    }
    transport.save("audit: fresh");

    manager.start().await.unwrap();

    let mut remaining = transport.load("audit").await.unwrap();
    for _ in 0..100 {
        if remaining.len() == 1 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
        remaining = transport.load("audit").await.unwrap();
    }
    assert_eq!(remaining, vec!["audit: fresh".to_string()]);

    manager.shutdown().await.unwrap();
}
