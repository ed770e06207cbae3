//! # Log Transports
//!
//! Pluggable append-only log sinks.
//!
//! ## Architecture
//!
//! ```text
//! TransportProvider (enum)            <- built from configuration
//!   ├── Plain(PlainTransport)         <- structured log output, no read path
//!   ├── Memory(Arc<MemoryTransport>)  <- keyed in-process lines with expiry
//!   └── File(Arc<FileTransport>)      <- keyed JSON-lines files under log_data_path
//! ```
//!
//! ## Design Decisions
//!
//! - **Fire-and-forget writes**: `save` never returns an error and never waits on I/O
//! - **Counted drops**: lines a transport discards show up in `dropped_lines`
//! - **Explicit unsupported reads**: a sink without a read path returns
//!   [`DataManagerError::Unsupported`](crate::error::DataManagerError::Unsupported),
//!   never an empty list

pub mod file;
pub mod memory;
pub mod plain;
pub mod provider;

pub use file::FileTransport;
pub use memory::MemoryTransport;
pub use plain::PlainTransport;
pub use provider::TransportProvider;

use crate::error::Result;
use async_trait::async_trait;

/// An append-only log sink.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Name of the transport, used in logs and errors
    fn name(&self) -> &'static str;

    /// Append one line. Failures stay inside the transport.
    fn save(&self, line: &str);

    /// Lines previously saved under `key`, oldest first.
    async fn load(&self, key: &str) -> Result<Vec<String>>;

    /// Lines accepted by `save` that the transport did not keep.
    fn dropped_lines(&self) -> u64 {
        0
    }

    /// Wait until every line saved so far has been handed to the backing store.
    async fn flush(&self) -> Result<()> {
        Ok(())
    }
}

/// Key a line is stored under: the text before its first `:`, trimmed. Lines without
/// a `:` belong to the empty key.
pub fn line_key(line: &str) -> &str {
    line.split_once(':')
        .map(|(key, _)| key.trim())
        .unwrap_or("")
}
