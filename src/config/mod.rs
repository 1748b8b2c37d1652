mod defaults;
mod loader;

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use loader::initialize_configuration;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read configuration: {0}")]
    Extraction(#[from] Box<figment::Error>),
}

/// Resolved gateway configuration.
#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    pub http_api: HttpApiConfig,
    pub security: SecurityConfig,
    pub triple_store: TripleStoreConfig,
    pub update_channel: UpdateChannelConfig,
    pub migration: MigrationConfig,
    pub failure_store: FailureStoreConfig,
    pub notification: NotificationConfig,
    pub observability: ObservabilityConfig,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct HttpApiConfig {
    /// Whether the HTTP API server is enabled.
    pub enabled: bool,
    pub port: u16,
    /// Whether the read-only `/public/sparql` endpoint is exposed.
    pub public_endpoint_enabled: bool,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct SecurityConfig {
    /// Whether update authorization is enforced.
    pub enabled: bool,
    /// Roles permitted to submit update operations.
    pub allowed_roles: Vec<String>,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct TripleStoreConfig {
    /// Path for persistent storage. `None` selects an in-memory store.
    pub data_path: Option<PathBuf>,
    /// Upper bound on read query execution, in seconds.
    pub query_timeout_secs: u64,
    /// Number of triples per bulk-insert batch.
    pub batch_size: usize,
    /// Maximum retries for a failed batch insert (attempts = max_retry + 1).
    pub max_retry: u32,
}

impl TripleStoreConfig {
    pub fn query_timeout(&self) -> Duration {
        Duration::from_secs(self.query_timeout_secs)
    }
}

#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct UpdateChannelConfig {
    /// Bounded channel depth; enqueue waits for admission beyond it.
    pub capacity: usize,
    /// Worker concurrency. Low values yield near-FIFO behavior, which is
    /// operationally convenient but never a promised ordering guarantee.
    pub concurrency: usize,
    /// Maximum redeliveries after the initial attempt before dead-lettering.
    pub max_redeliveries: u32,
    /// Base redelivery backoff in milliseconds, scaled by redelivery count.
    pub redelivery_backoff_ms: u64,
}

impl UpdateChannelConfig {
    pub fn redelivery_backoff(&self, redelivery_count: u32) -> Duration {
        Duration::from_millis(
            self.redelivery_backoff_ms
                .saturating_mul(redelivery_count.into()),
        )
    }
}

#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct MigrationConfig {
    /// Whether the migration directory watcher runs.
    pub enabled: bool,
    /// Directory scanned for sidecar, script and data files.
    pub directory: PathBuf,
    /// Target graph for data files without a cached sidecar declaration.
    pub default_graph: String,
    /// Watcher poll interval, in seconds.
    pub poll_interval_secs: u64,
}

impl MigrationConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }
}

#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct FailureStoreConfig {
    /// Directory receiving dead-lettered update bodies.
    pub directory: PathBuf,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct NotificationConfig {
    /// HTTP endpoint receiving notification events. `None` logs them instead.
    pub endpoint: Option<String>,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ObservabilityConfig {
    pub metrics_enabled: bool,
    pub metrics_port: u16,
}
