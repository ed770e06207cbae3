//! Plain transport
//!
//! Forwards every line to the structured log. There is no read path.

use crate::error::{DataManagerError, Result};
use crate::transport::Transport;
use async_trait::async_trait;
use tracing::info;

#[derive(Debug, Clone, Default)]
pub struct PlainTransport;

impl PlainTransport {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Transport for PlainTransport {
    fn name(&self) -> &'static str {
        "plain"
    }

    fn save(&self, line: &str) {
        info!(target: "datamanager::transport", line = %line, "📝 LOG_LINE");
    }

    async fn load(&self, _key: &str) -> Result<Vec<String>> {
        Err(DataManagerError::unsupported(self.name(), "load"))
    }
}
