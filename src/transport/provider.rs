//! Transport provider
//!
//! Enum dispatch over the built-in transports, selected from configuration.

use crate::config::{DataManagerConfig, TransportKind};
use crate::error::Result;
use crate::expiry::LogExpiry;
use crate::transport::{FileTransport, MemoryTransport, PlainTransport, Transport};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::info;

#[derive(Debug, Clone)]
pub enum TransportProvider {
    Plain(PlainTransport),
    Memory(Arc<MemoryTransport>),
    File(Arc<FileTransport>),
}

impl TransportProvider {
    pub fn from_config(config: &DataManagerConfig) -> Result<Self> {
        let provider = match config.transport {
            TransportKind::Plain => Self::Plain(PlainTransport::new()),
            TransportKind::Memory => {
                Self::Memory(Arc::new(MemoryTransport::new(config.transport_capacity)))
            }
            TransportKind::File => {
                Self::File(Arc::new(FileTransport::open(&config.log_data_path)?))
            }
        };
        info!(transport = provider.name(), "Log transport selected");
        Ok(provider)
    }

    /// The store the log-expiry task should sweep, if this transport keeps lines.
    pub fn expiry_store(&self) -> Option<Arc<dyn LogExpiry>> {
        match self {
            Self::Plain(_) => None,
            Self::Memory(transport) => Some(transport.clone() as Arc<dyn LogExpiry>),
            Self::File(transport) => Some(transport.clone() as Arc<dyn LogExpiry>),
        }
    }
}

#[async_trait]
impl Transport for TransportProvider {
    fn name(&self) -> &'static str {
        match self {
            Self::Plain(t) => t.name(),
            Self::Memory(t) => t.name(),
            Self::File(t) => t.name(),
        }
    }

    fn save(&self, line: &str) {
        match self {
            Self::Plain(t) => t.save(line),
            Self::Memory(t) => t.save(line),
            Self::File(t) => t.save(line),
        }
    }

    async fn load(&self, key: &str) -> Result<Vec<String>> {
        match self {
            Self::Plain(t) => t.load(key).await,
            Self::Memory(t) => t.load(key).await,
            Self::File(t) => t.load(key).await,
        }
    }

    fn dropped_lines(&self) -> u64 {
        match self {
            Self::Plain(t) => t.dropped_lines(),
            Self::Memory(t) => t.dropped_lines(),
            Self::File(t) => t.dropped_lines(),
        }
    }

    async fn flush(&self) -> Result<()> {
        match self {
            Self::Plain(t) => t.flush().await,
            Self::Memory(t) => t.flush().await,
            Self::File(t) => t.flush().await,
        }
    }
}
