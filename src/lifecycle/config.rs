//! Per-client session settings.

use crate::batch::DEFAULT_ZONES;
use crate::lifecycle::SessionError;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Settings for one [`DispatchClient`](crate::lifecycle::DispatchClient).
///
/// Every field has a default, so a JSON file only needs the keys it changes:
///
/// ```json
/// { "user": "bodega", "ingest_enabled": true, "poll_interval_ms": 2000 }
/// ```
///
/// Credentials for the ledger are not part of this file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SessionConfig {
    /// Name shown in logs for this client.
    pub user: String,
    /// Whether this client runs the ingestion worker.
    pub ingest_enabled: bool,
    /// Ingestion poll period.
    pub poll_interval_ms: u64,
    /// Bound of the reconciliation command queue.
    pub queue_capacity: usize,
    /// Zones a dispatch may name.
    pub zones: Vec<String>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            user: "default".to_string(),
            ingest_enabled: false,
            poll_interval_ms: 5_000,
            queue_capacity: 256,
            zones: DEFAULT_ZONES.iter().map(|zone| zone.to_string()).collect(),
        }
    }
}

impl SessionConfig {
    pub fn new(user: impl Into<String>) -> Self {
        Self {
            user: user.into(),
            ..Self::default()
        }
    }

    pub fn with_ingest(mut self, enabled: bool) -> Self {
        self.ingest_enabled = enabled;
        self
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval_ms = interval.as_millis() as u64;
        self
    }

    pub fn with_queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = capacity;
        self
    }

    pub fn with_zones<I, S>(mut self, zones: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.zones = zones.into_iter().map(Into::into).collect();
        self
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn from_json_str(text: &str) -> Result<Self, SessionError> {
        let config: Self =
            serde_json::from_str(text).map_err(|e| SessionError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, SessionError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| SessionError::Config(format!("{}: {e}", path.display())))?;
        Self::from_json_str(&text)
    }

    /// Rejects settings the runtime cannot honor.
    pub fn validate(&self) -> Result<(), SessionError> {
        if self.queue_capacity == 0 {
            return Err(SessionError::Config("queue_capacity must be positive".to_string()));
        }
        if self.poll_interval_ms == 0 {
            return Err(SessionError::Config("poll_interval_ms must be positive".to_string()));
        }
        if self.zones.is_empty() {
            return Err(SessionError::Config("zones must not be empty".to_string()));
        }
        if self.zones.iter().any(|zone| zone.trim().is_empty()) {
            return Err(SessionError::Config("zones must not be blank".to_string()));
        }
        Ok(())
    }
}
